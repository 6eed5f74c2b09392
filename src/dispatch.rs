//! Fire-and-forget dispatch of CI triggers

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};
use uuid::Uuid;

use crate::jenkins::JobParameters;
use crate::relay::RelayClient;

#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn RelayClient>,
    dispatched: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn RelayClient>) -> Self {
        Self {
            client,
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn the trigger on a detached task and return its dispatch id right away.
    /// The outcome only shows up in the logs.
    pub fn dispatch_job(&self, params: JobParameters) -> Uuid {
        let dispatch_id = Uuid::now_v7();
        let client = Arc::clone(&self.client);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            info!(
                "Dispatch {} - triggering Jenkins job for user {}",
                dispatch_id, params.user
            );
            match client.trigger_job(&params).await {
                Ok(()) => info!(
                    "Dispatch {} - triggered Jenkins job for user {}",
                    dispatch_id, params.user
                ),
                Err(e) => error!(
                    "Dispatch {} - JobTriggerFailed for user {}: {}",
                    dispatch_id, params.user, e
                ),
            }
        });

        dispatch_id
    }

    /// Number of triggers dispatched since startup
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}
