use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{storage::StorageError, token_store::TokenStore},
    services::{sse_events, sync_service},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep the token store connected, provisioned and mirrored, entering
/// degraded mode whenever the backend is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn TokenStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                if let Err(err) = install(&state, &store).await {
                    warn!(error = %err, "storage connected but could not be prepared");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                    continue;
                }
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
                        Err(err) => {
                            warn!(error = %err, "storage health check failed; entering degraded mode");
                            state.clear_token_store().await;

                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                match install(&state, &store).await {
                                    Ok(()) => {
                                        sleep(HEALTH_POLL_INTERVAL).await;
                                        continue;
                                    }
                                    Err(err) => {
                                        warn!(error = %err, "rehydration after reconnect failed");
                                        break;
                                    }
                                }
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Provision missing rows, hydrate the mirror, then expose the store.
///
/// Mutations stay rejected (degraded) until all three steps succeed, so a
/// half-prepared backend is never observable.
async fn install(state: &SharedState, store: &Arc<dyn TokenStore>) -> Result<(), StorageError> {
    store.provision(state.config().department_ids()).await?;
    sync_service::hydrate_board(state, store).await?;
    state.install_token_store(store.clone()).await;
    info!("storage connection established; leaving degraded mode");
    sse_events::broadcast_board_snapshot(state).await;
    Ok(())
}
