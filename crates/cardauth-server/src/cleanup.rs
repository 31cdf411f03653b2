use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use cardauth_api::state::AppStateInner;

/// Background task that expires cards past their `expires_at`.
///
/// The first tick fires immediately, so stale cards are swept at startup.
pub async fn run_cleanup_loop(state: Arc<AppStateInner>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match state.db.expire_cards(Utc::now()) {
            Ok(0) => {}
            Ok(count) => info!("Cleanup: expired {} cards", count),
            Err(e) => warn!("Cleanup error: {:#}", e),
        }
    }
}
