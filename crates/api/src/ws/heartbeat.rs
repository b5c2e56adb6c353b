use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ws::manager::WsManager;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the task that pings every connected alert client until `cancel`
/// fires. Ticks with no clients connected are skipped.
pub fn start_heartbeat(ws_manager: Arc<WsManager>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if ws_manager.connection_count().await == 0 {
                        continue;
                    }
                    let reached = ws_manager.ping_all().await;
                    tracing::debug!(reached, "Pinged alert clients");
                }
            }
        }
        tracing::info!("Heartbeat task stopped");
    })
}
