// RPC service implementations for gRPC communication
// Unary requests are routed to a PayloadHandler by metadata type; the
// bi-stream carries the signalling session of one sidecar.

use std::{collections::HashMap, pin::Pin, sync::Arc};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, error, info, warn};

use bscp_api::{
    conn::InstanceIdentity,
    grpc::{Payload, bi_request_stream_server::BiRequestStream, request_server},
    remote::{OPERATOR_HEADER, RequestTrait, SignallingSetupRequest},
};

use crate::{
    model::{Connection, Session},
    service::{
        auth::{GrpcAuthContext, GrpcAuthService},
        remote::SessionRegistry,
    },
};

/// Default depth of a session's push queue.
pub const DEFAULT_PUSH_BUFFER: usize = 128;

/// Auth requirement level for handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    /// Public: health checks and sidecar calls.
    None,
    /// Token required; reads only.
    Read,
    /// Token required; the token subject becomes the operator.
    Write,
}

// Trait for handling gRPC payload messages
#[tonic::async_trait]
pub trait PayloadHandler: Send + Sync {
    async fn handle(&self, _connection: &Connection, payload: &Payload) -> Result<Payload, Status> {
        let message_type = payload.metadata.clone().unwrap_or_default().r#type;

        Err(Status::unimplemented(format!(
            "Unknown message type '{}'",
            message_type
        )))
    }

    fn can_handle(&self) -> &'static str {
        ""
    }

    fn auth_requirement(&self) -> AuthRequirement {
        AuthRequirement::None
    }
}

pub fn extract_auth_context_from_payload(
    auth_service: &GrpcAuthService,
    payload: &Payload,
) -> GrpcAuthContext {
    let headers = payload
        .metadata
        .as_ref()
        .map(|m| m.headers.clone())
        .unwrap_or_default();

    auth_service.parse_identity(&headers)
}

pub fn check_authentication(auth_context: &GrpcAuthContext) -> Result<(), Status> {
    if !auth_context.auth_enabled {
        return Ok(());
    }

    if !auth_context.is_authenticated() {
        let error_msg = auth_context
            .auth_error
            .as_deref()
            .unwrap_or("user not authenticated");
        return Err(Status::unauthenticated(error_msg));
    }

    Ok(())
}

/// Authenticate a payload for its handler.
///
/// With auth enabled, the operator header of a Read/Write request is replaced
/// by the token subject, so callers cannot forge the audit columns.
pub fn authorize(
    auth_service: &GrpcAuthService,
    requirement: AuthRequirement,
    payload: &Payload,
) -> Result<Option<Payload>, Status> {
    if requirement == AuthRequirement::None || !auth_service.is_auth_enabled() {
        return Ok(None);
    }

    let auth_context = extract_auth_context_from_payload(auth_service, payload);
    check_authentication(&auth_context)?;

    let mut payload = payload.clone();
    if let Some(metadata) = payload.metadata.as_mut() {
        metadata
            .headers
            .insert(OPERATOR_HEADER.to_string(), auth_context.operator);
    }
    Ok(Some(payload))
}

// Default handler for unregistered message types
#[derive(Clone)]
pub struct DefaultHandler;

#[tonic::async_trait]
impl PayloadHandler for DefaultHandler {
    async fn handle(&self, _connection: &Connection, payload: &Payload) -> Result<Payload, Status> {
        let metadata = payload.metadata.as_ref();
        let message_type = metadata.map(|m| m.r#type.clone()).unwrap_or_default();
        let client_ip = metadata.map(|m| m.client_ip.clone()).unwrap_or_default();

        warn!(
            message_type = %message_type,
            client_ip = %client_ip,
            "No handler registered for message type"
        );

        if message_type.is_empty() {
            return Err(Status::invalid_argument("message type is empty or missing"));
        }
        Err(Status::invalid_argument(format!(
            "unknown message type '{}'",
            message_type
        )))
    }

    fn can_handle(&self) -> &'static str {
        "default"
    }
}

// Registry for managing payload handlers by message type
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn PayloadHandler>>,
    default_handler: Arc<dyn PayloadHandler>,
    auth_service: Arc<GrpcAuthService>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::with_auth(GrpcAuthService::default())
    }

    pub fn with_auth(auth_service: GrpcAuthService) -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler: Arc::new(DefaultHandler {}),
            auth_service: Arc::new(auth_service),
        }
    }

    /// Returns the default handler if no specific handler is registered
    pub fn get_handler(&self, message_type: &str) -> Arc<dyn PayloadHandler> {
        self.handlers
            .get(message_type)
            .unwrap_or(&self.default_handler)
            .clone()
    }

    pub fn register_handler(&mut self, handler: Arc<dyn PayloadHandler>) {
        let message_type = handler.can_handle();
        debug!(message_type = %message_type, "Registering handler");
        self.handlers.insert(message_type.to_string(), handler);
    }

    pub fn registered_message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn auth_service(&self) -> &GrpcAuthService {
        &self.auth_service
    }

    /// Authenticate and run the handler for one payload.
    pub async fn dispatch(&self, connection: &Connection, payload: &Payload) -> Result<Payload, Status> {
        let message_type = payload
            .metadata
            .as_ref()
            .map(|m| m.r#type.as_str())
            .unwrap_or_default();
        let handler = self.get_handler(message_type);

        let started = std::time::Instant::now();
        let result = match authorize(&self.auth_service, handler.auth_requirement(), payload)? {
            Some(authorized) => handler.handle(connection, &authorized).await,
            None => handler.handle(connection, payload).await,
        };

        metrics::histogram!("bscp_rpc_duration_seconds", "type" => message_type.to_string())
            .record(started.elapsed().as_secs_f64());
        result
    }
}

#[derive(Clone)]
pub struct GrpcRequestService {
    handler_registry: Arc<HandlerRegistry>,
}

impl GrpcRequestService {
    pub fn new(handler_registry: HandlerRegistry) -> Self {
        Self {
            handler_registry: Arc::new(handler_registry),
        }
    }

    pub fn from_arc(handler_registry: Arc<HandlerRegistry>) -> Self {
        Self { handler_registry }
    }
}

#[tonic::async_trait]
impl request_server::Request for GrpcRequestService {
    async fn request(
        &self,
        request: tonic::Request<Payload>,
    ) -> std::result::Result<tonic::Response<Payload>, tonic::Status> {
        if request.get_ref().metadata.is_none() {
            warn!("Received gRPC request without metadata");
            return Err(tonic::Status::invalid_argument(
                "invalid request: missing metadata",
            ));
        }

        let connection = request
            .extensions()
            .get::<Connection>()
            .cloned()
            .unwrap_or_default();

        self.handler_registry
            .dispatch(&connection, request.get_ref())
            .await
            .map(Response::new)
    }
}

#[derive(Clone)]
pub struct GrpcBiRequestStreamService {
    handler_registry: Arc<HandlerRegistry>,
    sessions: Arc<SessionRegistry>,
    push_buffer: usize,
}

impl GrpcBiRequestStreamService {
    pub fn from_arc(
        handler_registry: Arc<HandlerRegistry>,
        sessions: Arc<SessionRegistry>,
        push_buffer: usize,
    ) -> Self {
        Self {
            handler_registry,
            sessions,
            push_buffer: push_buffer.max(1),
        }
    }
}

/// Build the instance identity of a setup frame; the client IP falls back
/// to the peer address when the frame carries none.
fn identity_from_setup(
    setup: &SignallingSetupRequest,
    client_ip: &str,
    connection: &Connection,
) -> InstanceIdentity {
    let ip = if client_ip.is_empty() {
        connection.meta_info.remote_ip.clone()
    } else {
        client_ip.to_string()
    };

    InstanceIdentity {
        biz_id: setup.biz_id,
        app_id: setup.app_id,
        cloud_id: setup.cloud_id,
        ip,
        path: setup.path.clone(),
        labels: setup.labels.clone(),
    }
}

#[tonic::async_trait]
impl BiRequestStream for GrpcBiRequestStreamService {
    type requestBiStreamStream =
        Pin<Box<dyn Stream<Item = Result<Payload, Status>> + Send + 'static>>;

    async fn request_bi_stream(
        &self,
        request: Request<Streaming<Payload>>,
    ) -> Result<Response<Self::requestBiStreamStream>, Status> {
        let mut connection = request
            .extensions()
            .get::<Connection>()
            .cloned()
            .unwrap_or_default();
        let connection_id = connection.meta_info.connection_id.clone();
        let mut inbound_stream = request.into_inner();

        let (tx, rx) = mpsc::channel(self.push_buffer);

        let handler_registry = self.handler_registry.clone();
        let sessions = self.sessions.clone();

        tokio::spawn(async move {
            let mut opened = false;

            while let Some(message) = inbound_stream.next().await {
                let payload = match message {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!(connection_id = %connection_id, error = %e, "Signalling stream error");
                        break;
                    }
                };
                let Some(metadata) = payload.metadata.as_ref() else {
                    continue;
                };
                let message_type = metadata.r#type.as_str();

                if message_type == SignallingSetupRequest::REQUEST_TYPE {
                    let setup = match SignallingSetupRequest::from_payload::<SignallingSetupRequest>(
                        &payload,
                    ) {
                        Ok(setup) => setup,
                        Err(e) => {
                            warn!(connection_id = %connection_id, error = %e, "Malformed setup frame");
                            let _ = tx.send(Err(Status::invalid_argument(e.to_string()))).await;
                            break;
                        }
                    };

                    let identity = identity_from_setup(&setup, &metadata.client_ip, &connection);
                    if let Err(e) = identity.validate() {
                        let _ = tx.send(Err(Status::invalid_argument(e.to_string()))).await;
                        break;
                    }

                    connection.meta_info.client_ip = identity.ip.clone();
                    let session = Session::new(
                        connection.clone(),
                        identity,
                        setup.client_version,
                        tx.clone(),
                    );
                    sessions.register(session);
                    opened = true;
                    continue;
                }

                // Acknowledgements of server pushes need no routing.
                if message_type.ends_with("Response") {
                    debug!(connection_id = %connection_id, message_type = %message_type, "Push acknowledged");
                    continue;
                }

                if !opened {
                    warn!(connection_id = %connection_id, message_type = %message_type, "Frame before signalling setup");
                    if tx
                        .send(Err(Status::failed_precondition(
                            "signalling setup required before other frames",
                        )))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }

                let reply = handler_registry.dispatch(&connection, &payload).await;
                if let Err(e) = &reply {
                    error!(connection_id = %connection_id, status = %e, "Stream handler error");
                }
                if tx.send(reply).await.is_err() {
                    break;
                }
            }

            if opened {
                sessions.deregister_stream(&connection_id, &tx);
            }
            info!(connection_id = %connection_id, "Signalling stream ended");
        });

        let output_stream = ReceiverStream::new(rx);

        Ok(Response::new(
            Box::pin(output_stream) as Self::requestBiStreamStream
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bscp_api::grpc::Metadata;

    struct Echo;

    #[tonic::async_trait]
    impl PayloadHandler for Echo {
        async fn handle(&self, _connection: &Connection, payload: &Payload) -> Result<Payload, Status> {
            Ok(payload.clone())
        }

        fn can_handle(&self) -> &'static str {
            "EchoRequest"
        }

        fn auth_requirement(&self) -> AuthRequirement {
            AuthRequirement::Write
        }
    }

    fn payload(message_type: &str, headers: HashMap<String, String>) -> Payload {
        Payload {
            metadata: Some(Metadata {
                r#type: message_type.to_string(),
                client_ip: "10.0.0.1".to_string(),
                headers,
            }),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_type_goes_to_default_handler() {
        let registry = HandlerRegistry::new();
        let err = registry
            .dispatch(&Connection::default(), &payload("NopeRequest", HashMap::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_registered_handler_runs_when_auth_disabled() {
        let mut registry = HandlerRegistry::new();
        registry.register_handler(Arc::new(Echo));
        assert_eq!(registry.registered_message_types(), vec!["EchoRequest"]);

        let headers = HashMap::from([(OPERATOR_HEADER.to_string(), "bob".to_string())]);
        let reply = registry
            .dispatch(&Connection::default(), &payload("EchoRequest", headers))
            .await
            .unwrap();
        assert_eq!(
            reply.metadata.unwrap().headers.get(OPERATOR_HEADER).cloned(),
            Some("bob".to_string())
        );
    }

    #[tokio::test]
    async fn test_write_handler_requires_token_when_auth_enabled() {
        let auth = GrpcAuthService::new(
            true,
            "c2VjcmV0".to_string(),
            crate::service::auth::TokenCache::default(),
        );
        let mut registry = HandlerRegistry::with_auth(auth);
        registry.register_handler(Arc::new(Echo));

        let err = registry
            .dispatch(&Connection::default(), &payload("EchoRequest", HashMap::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn test_authorize_overrides_operator_with_token_subject() {
        let auth = GrpcAuthService::new(
            true,
            "c2VjcmV0".to_string(),
            crate::service::auth::TokenCache::default(),
        );
        auth.cache().insert(
            "tok".to_string(),
            "alice".to_string(),
            chrono::Utc::now().timestamp() + 3600,
        );

        let headers = HashMap::from([
            (OPERATOR_HEADER.to_string(), "mallory".to_string()),
            (
                bscp_api::remote::ACCESS_TOKEN_HEADER.to_string(),
                "tok".to_string(),
            ),
        ]);
        let authorized = authorize(&auth, AuthRequirement::Write, &payload("X", headers))
            .unwrap()
            .unwrap();
        assert_eq!(
            authorized.metadata.unwrap().headers.get(OPERATOR_HEADER).cloned(),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_identity_falls_back_to_peer_address() {
        let mut connection = Connection::default();
        connection.meta_info.remote_ip = "192.168.1.7".to_string();
        let setup = SignallingSetupRequest {
            biz_id: 1,
            app_id: 2,
            ..Default::default()
        };

        assert_eq!(identity_from_setup(&setup, "", &connection).ip, "192.168.1.7");
        assert_eq!(identity_from_setup(&setup, "10.1.1.1", &connection).ip, "10.1.1.1");
    }
}
