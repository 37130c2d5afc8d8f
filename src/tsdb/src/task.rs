use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// BackgroundWork is the periodic hook a host drives. Implementations must
/// catch and report their own failures.
pub trait BackgroundWork: Send + Sync + 'static {
    fn perform_background_work(&self);
}

/// spawn_periodic runs `work` every `period` on the blocking pool until `token`
/// is cancelled. Cancellation is only observed between runs, so a run in
/// progress always completes.
pub fn spawn_periodic<W>(work: Arc<W>, period: Duration, token: CancellationToken) -> JoinHandle<()>
where
    W: BackgroundWork + ?Sized,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("periodic background work cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let w = work.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || w.perform_background_work()).await {
                        error!("background work panicked: {}", e);
                    }
                }
            }
        }
    })
}
