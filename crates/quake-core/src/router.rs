//! Event routing
//!
//! [`EventRouter`] owns the aggregators and the event cache and maps
//! every [`EventEnvelope`] variant to its handler with an exhaustive
//! match. [`dispatch`](EventRouter::dispatch) runs the ordered prelude
//! (event cache update) on the caller's task and the handler on a
//! spawned task, so dispatch start follows frame order while completion
//! order is unspecified.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::trace;

use crate::aggregate::{EewAggregator, EventCache, Outcome, QuakeAggregator, stub};
use crate::event::EventEnvelope;

/// Routes envelopes to their aggregators
pub struct EventRouter {
    cache: EventCache,
    quake: QuakeAggregator,
    eew: EewAggregator,
}

impl EventRouter {
    /// Create a router
    pub fn new(quake: QuakeAggregator, eew: EewAggregator) -> Self {
        Self {
            cache: EventCache::new(),
            quake,
            eew,
        }
    }

    /// The cache of quake reports seen so far
    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    /// Start handling an envelope on its own task
    ///
    /// Handler failures and panics stay inside the spawned task.
    pub fn dispatch(self: &Arc<Self>, envelope: EventEnvelope) -> JoinHandle<Outcome> {
        self.begin(&envelope);
        let router = Arc::clone(self);
        tokio::spawn(async move { router.route(envelope).await })
    }

    /// Handle an envelope to completion on the current task
    pub async fn handle(&self, envelope: EventEnvelope) -> Outcome {
        self.begin(&envelope);
        self.route(envelope).await
    }

    fn begin(&self, envelope: &EventEnvelope) {
        trace!("dispatching code {}", envelope.code());
        if let EventEnvelope::JmaQuake(quake) = envelope {
            self.cache.record(quake);
        }
    }

    async fn route(&self, envelope: EventEnvelope) -> Outcome {
        match envelope {
            EventEnvelope::JmaQuake(quake) => self.quake.handle(&quake).await,
            EventEnvelope::JmaTsunami(tsunami) => stub::tsunami(&tsunami),
            EventEnvelope::EewDetection(detection) => stub::eew_detection(&detection),
            EventEnvelope::AreaPeers(peers) => stub::area_peers(&peers),
            EventEnvelope::Eew(eew) => self.eew.handle(&eew).await,
            EventEnvelope::UserQuake(report) => stub::user_quake(&report),
            EventEnvelope::UserQuakeEvaluation(evaluation) => {
                stub::user_quake_evaluation(&evaluation)
            }
            EventEnvelope::Ignored { .. } => Outcome::Ignored,
        }
    }
}
