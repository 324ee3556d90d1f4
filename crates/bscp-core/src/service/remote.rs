use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{Sender, error::TrySendError};
use tonic::{Request, Status};
use tracing::{debug, info, warn};

use bscp_api::{conn::InstanceIdentity, grpc::Payload};

use crate::model::{Connection, Session, SessionReport, SessionSnapshot, SessionState};

pub fn context_interceptor<T>(mut request: Request<T>) -> Result<Request<T>, Status> {
    let mut connection = Connection::default();

    let (remote_ip, remote_port) = match request.remote_addr() {
        Some(addr) => (addr.ip().to_string(), addr.port()),
        None => ("unknown".to_string(), 0),
    };

    let now = chrono::Utc::now().timestamp_millis();

    connection.meta_info.remote_ip = remote_ip.clone();
    connection.meta_info.remote_port = remote_port;
    connection.meta_info.create_time = now;
    connection.meta_info.connection_id = format!("{}_{}_{}", now, remote_ip, remote_port);
    connection.meta_info.local_port = request.local_addr().map(|a| a.port()).unwrap_or(0);

    request.extensions_mut().insert(connection);

    Ok(request)
}

/// Open signalling sessions of this server, keyed by connection id.
///
/// The registry owns every session's push channel; its methods are the only
/// way sessions are added, removed or updated.
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Open a session. Returns false when the connection was already
    /// registered, in which case the new session replaces it.
    pub fn register(&self, mut session: Session) -> bool {
        session.state = SessionState::Open;
        let connection_id = session.connection_id().to_string();
        let biz_id = session.identity.biz_id;
        let app_id = session.identity.app_id;
        let tx = session.tx.clone();

        let previous = self.sessions.insert(connection_id.clone(), session);
        metrics::gauge!("bscp_sessions_open").set(self.sessions.len() as f64);
        match previous {
            None => {
                info!(connection_id = %connection_id, biz_id, app_id, "Session opened");
                true
            }
            Some(previous) if previous.tx.same_channel(&tx) => {
                debug!(connection_id = %connection_id, biz_id, app_id, "Session setup repeated");
                false
            }
            Some(_) => {
                warn!(
                    connection_id = %connection_id,
                    biz_id,
                    app_id,
                    "Connection id reused by another stream, replacing its session"
                );
                false
            }
        }
    }

    /// Close a session and drop its push channel.
    pub fn deregister(&self, connection_id: &str) -> Option<Session> {
        let (_, session) = self.sessions.remove(connection_id)?;
        Some(self.closed(connection_id, session))
    }

    /// Close a session only while it still pushes to `tx`, so a stream
    /// tearing down never removes a newer stream's session.
    pub fn deregister_stream(
        &self,
        connection_id: &str,
        tx: &Sender<Result<Payload, Status>>,
    ) -> Option<Session> {
        let (_, session) = self
            .sessions
            .remove_if(connection_id, |_, s| s.tx.same_channel(tx))?;
        Some(self.closed(connection_id, session))
    }

    fn closed(&self, connection_id: &str, mut session: Session) -> Session {
        session.state = SessionState::Closed;
        metrics::gauge!("bscp_sessions_open").set(self.sessions.len() as f64);
        info!(connection_id = %connection_id, "Session closed");
        session
    }

    /// Close every session, e.g. on server shutdown.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self.sessions.iter().map(|s| s.key().clone()).collect();
        ids.iter().filter(|id| self.deregister(id).is_some()).count()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn count_by_biz(&self, biz_id: i64) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.identity.biz_id == biz_id)
            .count()
    }

    pub fn get(&self, connection_id: &str) -> Option<SessionSnapshot> {
        self.sessions.get(connection_id).map(|s| SessionSnapshot {
            connection_id: s.key().clone(),
            identity: s.identity.clone(),
        })
    }

    /// Point-in-time copy of every open session's identity.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .map(|s| SessionSnapshot {
                connection_id: s.key().clone(),
                identity: s.identity.clone(),
            })
            .collect()
    }

    /// Queue one push on a session's stream.
    ///
    /// A stream that is gone deregisters the session at once; a full queue
    /// drops this push only. Returns whether the push was queued.
    pub fn push(&self, connection_id: &str, payload: Payload) -> bool {
        let tx = match self.sessions.get(connection_id) {
            Some(session) => session.tx.clone(),
            None => return false,
        };

        match tx.try_send(Ok(payload)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                metrics::counter!("bscp_push_dropped_total").increment(1);
                warn!(connection_id = %connection_id, "Push queue full, dropping signalling");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(connection_id = %connection_id, "Push stream closed, removing session");
                self.deregister_stream(connection_id, &tx);
                false
            }
        }
    }

    /// Attach a state report to every session of the reporting instance.
    pub fn record_report(&self, identity: &InstanceIdentity, report: SessionReport) -> usize {
        let mut updated = 0;
        for mut session in self.sessions.iter_mut() {
            let own = &session.identity;
            if own.biz_id == identity.biz_id
                && own.app_id == identity.app_id
                && own.ip == identity.ip
                && own.path == identity.path
            {
                session.last_report = Some(report.clone());
                updated += 1;
            }
        }
        debug!(biz_id = identity.biz_id, ip = %identity.ip, sessions = updated, "Recorded report");
        updated
    }

    pub fn last_report(&self, connection_id: &str) -> Option<SessionReport> {
        self.sessions
            .get(connection_id)
            .and_then(|s| s.last_report.clone())
    }
}
