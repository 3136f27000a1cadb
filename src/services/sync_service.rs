use std::sync::Arc;

use tracing::info;

use crate::{
    dao::{storage::StorageError, token_store::TokenStore},
    state::{SharedState, board::TokenBoard},
};

/// Mirror the store snapshot into shared state without losing concurrent writes.
///
/// The feed subscription opens before the snapshot read starts, and whatever
/// it buffered replays on top of the snapshot before the board is installed.
/// A write confirmed mid-read therefore lands either in the snapshot or in
/// the replay, and applying it twice is harmless.
pub async fn hydrate_board(
    state: &SharedState,
    store: &Arc<dyn TokenStore>,
) -> Result<(), StorageError> {
    let mut subscription = state.feed().subscribe();
    let records = store.list_tokens().await?;

    let order = state.config().department_ids();
    let mut board = TokenBoard::from_records(&order, records);

    // Publishers hold the board write lock, so no update can slip between
    // the replay below and the install.
    let mut slot = state.board().write().await;
    for update in subscription.drain() {
        board.apply(&update.department, update.value);
    }
    let departments = board.len();
    *slot = Some(board);
    drop(slot);
    subscription.close();

    info!(departments, "token board hydrated from store snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            pin_verifier::RegistryPinVerifier,
            storage::StorageResult,
            token_store::TokenRecord,
        },
        state::{AppState, feed::{TokenFeed, TokenUpdate}},
    };

    /// Store stub that can publish a feed update while its snapshot is "in flight".
    struct SnapshotStore {
        records: Vec<TokenRecord>,
        publish_during_read: Option<(TokenFeed, TokenUpdate)>,
    }

    impl TokenStore for SnapshotStore {
        fn list_tokens(&self) -> BoxFuture<'static, StorageResult<Vec<TokenRecord>>> {
            let records = self.records.clone();
            let publish = self
                .publish_during_read
                .as_ref()
                .map(|(feed, update)| (feed.clone(), update.clone()));
            Box::pin(async move {
                if let Some((feed, update)) = publish {
                    feed.publish(update);
                }
                Ok(records)
            })
        }

        fn put_token(&self, _department: String, _value: u32) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn provision(&self, _departments: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn test_state() -> SharedState {
        let verifier = Arc::new(RegistryPinVerifier::new(Arc::new(AppConfig::default())));
        AppState::for_tests(AppConfig::default(), verifier, None, None)
    }

    fn record(department: &str, current_token: u32) -> TokenRecord {
        TokenRecord {
            department: department.to_owned(),
            current_token,
        }
    }

    #[tokio::test]
    async fn hydration_installs_the_snapshot() {
        let state = test_state();
        let store: Arc<dyn TokenStore> = Arc::new(SnapshotStore {
            records: vec![record("cs", 3), record("ee", 5)],
            publish_during_read: None,
        });

        hydrate_board(&state, &store).await.unwrap();

        let guard = state.board().read().await;
        let board = guard.as_ref().unwrap();
        assert_eq!(board.value("cs"), Some(3));
        assert_eq!(board.value("ee"), Some(5));
    }

    #[tokio::test]
    async fn writes_confirmed_during_the_read_win_over_the_snapshot() {
        let state = test_state();
        let store: Arc<dyn TokenStore> = Arc::new(SnapshotStore {
            records: vec![record("cs", 3)],
            publish_during_read: Some((
                state.feed().clone(),
                TokenUpdate {
                    department: "cs".into(),
                    value: 9,
                },
            )),
        });

        hydrate_board(&state, &store).await.unwrap();

        let guard = state.board().read().await;
        assert_eq!(guard.as_ref().unwrap().value("cs"), Some(9));
    }

    #[tokio::test]
    async fn updates_published_before_the_subscription_are_ignored() {
        let state = test_state();
        state.feed().publish(TokenUpdate {
            department: "cs".into(),
            value: 77,
        });

        let store: Arc<dyn TokenStore> = Arc::new(SnapshotStore {
            records: vec![record("cs", 3)],
            publish_during_read: None,
        });
        hydrate_board(&state, &store).await.unwrap();

        let guard = state.board().read().await;
        assert_eq!(guard.as_ref().unwrap().value("cs"), Some(3));
    }
}
