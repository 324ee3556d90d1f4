// Core data models for connections and sidecar sessions

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tonic::Status;

use bscp_api::{EffectInfo, conn::InstanceIdentity, grpc::Payload};

/// Connection meta information assigned by the interceptor
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMeta {
    /// Identify unique connection id.
    pub connection_id: String,

    /// Client IP address as reported in the payload metadata.
    pub client_ip: String,

    /// Remote IP address.
    pub remote_ip: String,

    /// Remote IP port.
    pub remote_port: u16,

    /// Local IP port.
    pub local_port: u16,

    /// Create time.
    pub create_time: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(flatten)]
    pub meta_info: ConnectionMeta,
}

/// Lifecycle of a signalling session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Stream accepted, identity not yet received.
    #[default]
    Connecting,
    /// Identity received; the session receives pushes.
    Open,
    /// Stream gone; the session is no longer in the registry.
    Closed,
}

/// Last state report received from an instance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub effects: Vec<EffectInfo>,
    pub reload_success: bool,
    pub reload_message: String,
    pub reported_at: i64,
}

/// One open signalling stream and the sidecar behind it.
#[derive(Clone)]
pub struct Session {
    pub connection: Connection,
    pub identity: InstanceIdentity,
    pub client_version: String,
    pub state: SessionState,
    pub last_report: Option<SessionReport>,
    pub tx: Sender<Result<Payload, Status>>,
}

impl Session {
    pub fn new(
        connection: Connection,
        identity: InstanceIdentity,
        client_version: String,
        tx: Sender<Result<Payload, Status>>,
    ) -> Self {
        Self {
            connection,
            identity,
            client_version,
            state: SessionState::Connecting,
            last_report: None,
            tx,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection.meta_info.connection_id
    }
}

/// Read-only view of a session used for fan-out matching.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub connection_id: String,
    pub identity: InstanceIdentity,
}
