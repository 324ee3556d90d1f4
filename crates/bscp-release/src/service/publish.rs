//! Publish fan-out
//!
//! Handlers hand Publish, Reload and Rollback events to the bus through
//! [`PublishManager::publish`]. Every connection server subscribes its own
//! manager once, and for each event it pushes a notify frame to the local
//! sessions whose identity the release's strategy matches. Each event is
//! fanned out on its own task, so a paced event does not delay later ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use bscp_api::{
    Signalling,
    remote::{RequestTrait, SignallingNotifyRequest},
};
use bscp_common::{BscpResult, MAX_NICENESS_MS};
use bscp_core::{SessionRegistry, SignallingBus, SignallingHandler, SessionSnapshot};

use crate::model::{LabelMatcher, Predicate};

/// Fan-outs allowed to push at the same time; later events wait their turn.
const MAX_CONCURRENT_FAN_OUTS: usize = 16;

pub struct PublishManager {
    bus: Arc<dyn SignallingBus>,
    sessions: Arc<SessionRegistry>,
    fan_outs: Arc<Semaphore>,
}

impl PublishManager {
    pub fn new(bus: Arc<dyn SignallingBus>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            bus,
            sessions,
            fan_outs: Arc::new(Semaphore::new(MAX_CONCURRENT_FAN_OUTS)),
        }
    }

    /// Hand an event to the bus; returns once the bus accepted it.
    pub async fn publish(&self, signalling: Signalling) -> BscpResult<()> {
        self.bus.publish(&signalling).await?;

        metrics::counter!(
            "bscp_signalling_published_total",
            "type" => signalling.signalling_type.as_str()
        )
        .increment(1);
        info!(
            signalling_type = %signalling.signalling_type,
            biz_id = signalling.publishing.biz_id,
            release_id = signalling.publishing.release_id,
            "Signalling handed to bus"
        );
        Ok(())
    }

    /// Subscribe this server's sessions to the bus.
    pub async fn start(self: &Arc<Self>) -> BscpResult<()> {
        self.bus
            .subscribe(self.clone() as Arc<dyn SignallingHandler>)
            .await
    }

    /// Push one event to every matching local session. Returns the number of
    /// pushes queued.
    pub async fn fan_out(&self, signalling: &Signalling) -> usize {
        fan_out(&self.sessions, signalling).await
    }
}

async fn fan_out(sessions: &SessionRegistry, signalling: &Signalling) -> usize {
    let publishing = &signalling.publishing;
    let predicate = match Predicate::parse_str(&publishing.strategies) {
        Ok(predicate) => predicate,
        Err(e) => {
            warn!(release_id = publishing.release_id, error = %e, "Dropping signalling with unreadable strategy");
            return 0;
        }
    };

    let targets: Vec<SessionSnapshot> = sessions
        .snapshot()
        .into_iter()
        .filter(|s| {
            s.identity.biz_id == publishing.biz_id
                && s.identity.app_id == publishing.app_id
                && predicate.matches(&s.identity.labels)
        })
        .collect();

    let notify = SignallingNotifyRequest {
        signalling: signalling.clone(),
        ..Default::default()
    };
    let niceness = Duration::from_millis(publishing.niceness.min(MAX_NICENESS_MS));

    let mut pushed = 0;
    for (i, target) in targets.iter().enumerate() {
        if i > 0 && !niceness.is_zero() {
            tokio::time::sleep(niceness).await;
        }
        if sessions.push(&target.connection_id, notify.to_payload(&target.identity.ip)) {
            pushed += 1;
        }
    }

    metrics::counter!("bscp_signalling_pushed_total").increment(pushed as u64);
    debug!(
        signalling_type = %signalling.signalling_type,
        release_id = publishing.release_id,
        matched = targets.len(),
        pushed,
        "Signalling fanned out"
    );
    pushed
}

#[async_trait]
impl SignallingHandler for PublishManager {
    async fn handle(&self, signalling: Signalling) {
        let sessions = self.sessions.clone();
        let fan_outs = self.fan_outs.clone();
        tokio::spawn(async move {
            let Ok(_permit) = fan_outs.acquire_owned().await else {
                return;
            };
            fan_out(&sessions, &signalling).await;
        });
    }
}
