use axum::extract::FromRef;

use crate::artwork::ArtworkCache;
use crate::download_queue::DownloadQueueStore;
use crate::notifications::NotificationSink;
use crate::qobuz::SearchProvider;
use crate::scheduler::SharedSchedulerStatus;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedQueueStore = Arc<dyn DownloadQueueStore>;
pub type GuardedNotificationSink = Arc<dyn NotificationSink>;
pub type OptionalSearchProvider = Option<Arc<dyn SearchProvider>>;
pub type GuardedArtworkCache = Arc<ArtworkCache>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub queue_store: GuardedQueueStore,
    pub scheduler_status: SharedSchedulerStatus,
    pub notifier: GuardedNotificationSink,
    pub search_provider: OptionalSearchProvider,
    pub artwork: GuardedArtworkCache,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedQueueStore {
    fn from_ref(input: &ServerState) -> Self {
        input.queue_store.clone()
    }
}

impl FromRef<ServerState> for SharedSchedulerStatus {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_status.clone()
    }
}

impl FromRef<ServerState> for GuardedNotificationSink {
    fn from_ref(input: &ServerState) -> Self {
        input.notifier.clone()
    }
}

impl FromRef<ServerState> for OptionalSearchProvider {
    fn from_ref(input: &ServerState) -> Self {
        input.search_provider.clone()
    }
}

impl FromRef<ServerState> for GuardedArtworkCache {
    fn from_ref(input: &ServerState) -> Self {
        input.artwork.clone()
    }
}
