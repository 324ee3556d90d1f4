//! Shared fixtures: an app state over in-memory SQLite shards, the full
//! handler registry, and helpers to build and read payloads.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use config::{Config, File, FileFormat};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use tonic::Status;

use bscp_api::{
    conn::InstanceIdentity,
    grpc::{Metadata, Payload},
    prost_types::Any,
    remote::{OPERATOR_HEADER, RequestTrait},
};
use bscp_core::{
    ChannelSignallingBus, Connection, Session, SessionRegistry, handler::rpc::HandlerRegistry,
};
use bscp_persistence::{ShardingRouter, sea_orm::ConnectOptions};
use bscp_release::UncheckedBlobStore;
use bscp_server::{AppState, Configuration, startup::build_handler_registry};

pub const BIZ: i64 = 7;
pub const APP: i64 = 70;

pub fn configuration(yaml: &str) -> Configuration {
    Configuration::from_config(
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap(),
    )
}

pub async fn memory_router(shards: usize) -> Arc<ShardingRouter> {
    let options = (0..shards)
        .map(|_| {
            let mut opt = ConnectOptions::new("sqlite::memory:");
            opt.max_connections(1).min_connections(1).sqlx_logging(false);
            opt
        })
        .collect();

    let router = ShardingRouter::connect(options).await.unwrap();
    router.migrate_all().await.unwrap();
    Arc::new(router)
}

pub struct TestServer {
    pub app_state: Arc<AppState>,
    pub registry: HandlerRegistry,
    pub sessions: Arc<SessionRegistry>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_config("bscp: {}").await
    }

    pub async fn with_config(yaml: &str) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let app_state = Arc::new(AppState::new(
            configuration(yaml),
            memory_router(2).await,
            Arc::new(UncheckedBlobStore),
            Arc::new(ChannelSignallingBus::new()),
            sessions.clone(),
        ));
        app_state.publisher.start().await.unwrap();

        Self {
            registry: build_handler_registry(app_state.clone()),
            app_state,
            sessions,
        }
    }

    /// Dispatch a request as `operator` and decode the reply body.
    pub async fn call<Req, Resp>(&self, request: Req) -> Resp
    where
        Req: RequestTrait + Serialize,
        Resp: DeserializeOwned,
    {
        let payload = self.dispatch(request).await.unwrap();
        read_body(&payload)
    }

    pub async fn dispatch<Req>(&self, mut request: Req) -> Result<Payload, Status>
    where
        Req: RequestTrait + Serialize,
    {
        request.insert_headers(HashMap::from([(
            OPERATOR_HEADER.to_string(),
            "tester".to_string(),
        )]));
        self.registry
            .dispatch(&Connection::default(), &request.to_payload("10.0.0.1"))
            .await
    }

    /// Dispatch a raw JSON body under `request_type`, bypassing the typed
    /// request models.
    pub async fn dispatch_json(
        &self,
        request_type: &str,
        body: serde_json::Value,
    ) -> Result<Payload, Status> {
        let payload = Payload {
            metadata: Some(Metadata {
                r#type: request_type.to_string(),
                client_ip: "10.0.0.1".to_string(),
                headers: HashMap::from([(OPERATOR_HEADER.to_string(), "tester".to_string())]),
            }),
            body: Some(Any {
                type_url: String::new(),
                value: serde_json::to_vec(&body).unwrap(),
            }),
        };
        self.registry
            .dispatch(&Connection::default(), &payload)
            .await
    }

    /// Register an open signalling session and return its push queue.
    pub fn open_session(
        &self,
        connection_id: &str,
        identity: InstanceIdentity,
    ) -> mpsc::Receiver<Result<Payload, Status>> {
        let (tx, rx) = mpsc::channel(8);
        let mut connection = Connection::default();
        connection.meta_info.connection_id = connection_id.to_string();
        self.sessions
            .register(Session::new(connection, identity, "1.0.0".to_string(), tx));
        rx
    }
}

pub fn identity(ip: &str, labels: &[(&str, &str)]) -> InstanceIdentity {
    InstanceIdentity {
        biz_id: BIZ,
        app_id: APP,
        ip: ip.to_string(),
        path: "/data/bscp".to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..Default::default()
    }
}

pub fn read_body<T: DeserializeOwned>(payload: &Payload) -> T {
    serde_json::from_slice(&payload.body.as_ref().unwrap().value).unwrap()
}
