use tokio::sync::broadcast;
use tracing::debug;

/// Confirmed token change fanned out to board mirrors and SSE forwarders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUpdate {
    /// Department whose counter changed.
    pub department: String,
    /// Confirmed value after the change.
    pub value: u32,
}

/// In-process change feed carrying confirmed token writes.
///
/// Publishing never blocks; slow subscribers lag and skip rather than stall
/// the writer.
#[derive(Debug, Clone)]
pub struct TokenFeed {
    sender: broadcast::Sender<TokenUpdate>,
}

impl TokenFeed {
    /// Create a feed buffering up to `capacity` undelivered updates per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Open a subscription receiving every update published from now on.
    pub fn subscribe(&self) -> FeedSubscription {
        FeedSubscription {
            receiver: Some(self.sender.subscribe()),
        }
    }

    /// Publish a confirmed update to all live subscriptions.
    pub fn publish(&self, update: TokenUpdate) {
        // Delivery errors only mean nobody is subscribed right now.
        let _ = self.sender.send(update);
    }
}

/// Live handle on the token feed.
///
/// Closing releases the underlying receiver exactly once; further calls are
/// no-ops, and dropping an open subscription closes it as well.
#[derive(Debug)]
pub struct FeedSubscription {
    receiver: Option<broadcast::Receiver<TokenUpdate>>,
}

impl FeedSubscription {
    /// Wait for the next update, skipping over gaps caused by lag.
    ///
    /// Returns `None` once the subscription is closed or the feed is gone.
    pub async fn recv(&mut self) -> Option<TokenUpdate> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "feed subscription lagged; skipping");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain every update already buffered without waiting for more.
    pub fn drain(&mut self) -> Vec<TokenUpdate> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Vec::new();
        };

        let mut updates = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(update) => updates.push(update),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "feed subscription lagged while draining");
                }
                Err(_) => break,
            }
        }

        updates
    }

    /// Release the subscription. Safe to call more than once.
    pub fn close(&mut self) {
        self.receiver = None;
    }

    /// Whether the subscription has been closed.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(department: &str, value: u32) -> TokenUpdate {
        TokenUpdate {
            department: department.to_owned(),
            value,
        }
    }

    #[tokio::test]
    async fn delivers_updates_in_publish_order() {
        let feed = TokenFeed::new(8);
        let mut subscription = feed.subscribe();

        feed.publish(update("cs", 1));
        feed.publish(update("ee", 2));

        assert_eq!(subscription.recv().await, Some(update("cs", 1)));
        assert_eq!(subscription.recv().await, Some(update("ee", 2)));
    }

    #[tokio::test]
    async fn drain_returns_buffered_updates() {
        let feed = TokenFeed::new(8);
        let mut subscription = feed.subscribe();

        feed.publish(update("cs", 1));
        feed.publish(update("cs", 2));

        assert_eq!(
            subscription.drain(),
            vec![update("cs", 1), update("cs", 2)]
        );
        assert!(subscription.drain().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let feed = TokenFeed::new(8);
        let mut subscription = feed.subscribe();

        subscription.close();
        assert!(subscription.is_closed());
        subscription.close();
        assert!(subscription.is_closed());

        feed.publish(update("cs", 1));
        assert_eq!(subscription.recv().await, None);
        assert!(subscription.drain().is_empty());
    }

    #[tokio::test]
    async fn missed_updates_before_subscribe_are_not_delivered() {
        let feed = TokenFeed::new(8);
        feed.publish(update("cs", 1));

        let mut subscription = feed.subscribe();
        assert!(subscription.drain().is_empty());
    }
}
