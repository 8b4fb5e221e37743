//! HTTP gateway for the carechain hub
//!
//! Exposes the hub's three boundary operations to HTTP clients:
//! - `POST /sendTransaction`: fire-and-forget `addBlock` broadcast
//! - `POST /requestData`: correlated network query, 504 on timeout
//! - `POST /addPatient`: `addBlock` broadcast carrying a patient record
//!
//! The gateway never reaches into the registry or leader state directly.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

use carechain_hub::{Hub, HubError, PatientRecord};

/// HTTP gateway server
pub struct GatewayServer {
    hub: Arc<Hub>,
}

impl GatewayServer {
    /// Create a new gateway sharing the given hub
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        // CORS layer to allow browser clients
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/sendTransaction", post(send_transaction))
            .route("/requestData", post(request_data))
            .route("/addPatient", post(add_patient))
            .layer(cors)
            .with_state(self.hub)
    }

    /// Run the server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP gateway listening on {}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Broadcast a transaction to every peer; not correlated
async fn send_transaction(State(hub): State<Arc<Hub>>, Json(payload): Json<Value>) -> StatusCode {
    hub.submit_transaction(payload);
    StatusCode::OK
}

/// Query the network and wait for the first matching response
async fn request_data(State(hub): State<Arc<Hub>>, Json(payload): Json<Value>) -> Response {
    match hub.submit_query(payload).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(HubError::QueryTimeout) => {
            (StatusCode::GATEWAY_TIMEOUT, "Request timed out").into_response()
        }
    }
}

/// Broadcast a patient record as a new ledger block
async fn add_patient(State(hub): State<Arc<Hub>>, Json(record): Json<PatientRecord>) -> StatusCode {
    hub.submit_patient(record);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use carechain_hub::HubConfig;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn request_data_times_out_as_504() {
        let hub = Arc::new(Hub::new(HubConfig {
            query_timeout: Duration::from_millis(50),
        }));

        let response = request_data(State(hub), Json(json!({"patient_id": "p-1"}))).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn send_transaction_is_fire_and_forget() {
        let hub = Arc::new(Hub::default());

        let status = send_transaction(State(hub), Json(json!({"amount": 5}))).await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn add_patient_accepts_a_record() {
        let hub = Arc::new(Hub::default());
        let record: PatientRecord = serde_json::from_value(json!({
            "patient_id": "p-9",
            "name": "Grace",
            "age": 58,
            "condition": "recovering"
        }))
        .unwrap();

        let status = add_patient(State(hub), Json(record)).await;

        assert_eq!(status, StatusCode::OK);
    }
}
