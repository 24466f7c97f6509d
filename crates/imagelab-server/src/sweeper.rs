//! Background removal of expired sessions and orphaned files.

use std::sync::Arc;
use std::time::Duration;

use imagelab_session::{ImageLab, LabError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn a task that, every `interval`, removes expired sessions and
/// then deletes unreferenced files older than `max_file_age`.
///
/// The first sweep runs one interval after startup. The task runs until
/// aborted or the runtime shuts down.
pub fn spawn(lab: Arc<ImageLab>, interval: Duration, max_file_age: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let lab = Arc::clone(&lab);
            let sweep = move || {
                let sessions = lab.sweep_expired()?;
                let files = lab.purge_stale_files(max_file_age)?;
                Ok::<_, LabError>((sessions, files))
            };
            match tokio::task::spawn_blocking(sweep).await {
                Ok(Ok((sessions, files))) => debug!(sessions, files, "expiry sweep finished"),
                Ok(Err(err)) => warn!(error = %err, "expiry sweep failed"),
                Err(err) => warn!(error = %err, "expiry sweep task failed"),
            }
        }
    })
}
