use tonic::Status;

use bscp_api::{
    grpc::Payload,
    remote::{HealthCheckResponse, ResponseTrait, ServerCheckResponse},
};

use crate::{handler::rpc::PayloadHandler, model::Connection};

#[derive(Clone)]
pub struct HealthCheckHandler {}

#[tonic::async_trait]
impl PayloadHandler for HealthCheckHandler {
    async fn handle(
        &self,
        _connection: &Connection,
        _payload: &Payload,
    ) -> Result<Payload, Status> {
        Ok(HealthCheckResponse::new().build_payload())
    }

    fn can_handle(&self) -> &'static str {
        "HealthCheckRequest"
    }
}

/// Answers the probe a sidecar sends before opening its stream, telling it
/// the connection id the server assigned.
#[derive(Clone)]
pub struct ServerCheckHandler {}

#[tonic::async_trait]
impl PayloadHandler for ServerCheckHandler {
    async fn handle(&self, connection: &Connection, _: &Payload) -> Result<Payload, Status> {
        let response = ServerCheckResponse {
            connection_id: connection.meta_info.connection_id.clone(),
            ..ServerCheckResponse::new()
        };

        Ok(response.build_payload())
    }

    fn can_handle(&self) -> &'static str {
        "ServerCheckRequest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_check_returns_connection_id() {
        let mut connection = Connection::default();
        connection.meta_info.connection_id = "1700000000000_10.0.0.1_5000".to_string();

        let reply = ServerCheckHandler {}
            .handle(&connection, &Payload::default())
            .await
            .unwrap();

        let body: serde_json::Value =
            serde_json::from_slice(&reply.body.unwrap().value).unwrap();
        assert_eq!(body["connectionId"], "1700000000000_10.0.0.1_5000");
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_health_check() {
        let reply = HealthCheckHandler {}
            .handle(&Connection::default(), &Payload::default())
            .await
            .unwrap();
        assert_eq!(reply.metadata.unwrap().r#type, "HealthCheckResponse");
    }
}
