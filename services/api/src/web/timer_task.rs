//! services/api/src/web/timer_task.rs
//!
//! The background task that drives the reading timer of one connection.

use crate::web::{
    protocol::ServerMessage,
    state::TimerSessionState,
    ws_handler::{send_message, WsSender},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Advances the flow by one second per interval tick and reports the total.
///
/// Runs until cancelled, until the flow stops running, or until the client goes away.
/// Ticks that land while the app is suspended change nothing and are not reported.
pub async fn timer_process(
    session_state_lock: Arc<Mutex<TimerSessionState>>,
    ws_sender: WsSender,
    cancellation_token: CancellationToken,
) {
    info!("Timer task started.");
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Timer task cancelled.");
                return;
            }
            _ = interval.tick() => {}
        }

        let advanced = {
            let mut session = session_state_lock.lock().await;
            if !session.flow.is_running() {
                debug!("Flow no longer running; timer task exiting.");
                return;
            }
            let before = session.flow.elapsed_seconds();
            let after = session.flow.tick();
            (after != before).then_some(after)
        };

        if let Some(elapsed_seconds) = advanced {
            if !send_message(&ws_sender, &ServerMessage::Tick { elapsed_seconds }).await {
                warn!("Failed to send tick to client. Ending timer task.");
                return;
            }
        }
    }
}
