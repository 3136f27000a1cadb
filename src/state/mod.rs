pub mod board;
pub mod feed;
pub mod session;
mod sse;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        pin_verifier::{PinVerifier, RegistryPinVerifier},
        token_store::TokenStore,
    },
    error::ServiceError,
    state::{board::TokenBoard, feed::TokenFeed, session::AdminSession},
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// Ceiling on the time spent waiting for a PIN verification verdict.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(10);
/// Ceiling on the time spent waiting for a token write to be confirmed.
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(10);
/// Unlocked sessions relock after this much inactivity.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const PUBLIC_SSE_CAPACITY: usize = 16;
const SESSION_SSE_CAPACITY: usize = 16;
const FEED_CAPACITY: usize = 64;

/// Registered admin session: the unlock machine plus the private event hub
/// drained by the SSE stream that created it.
#[derive(Debug)]
pub struct SessionEntry {
    /// Department the session is bound to. Fixed for the session lifetime.
    pub department: String,
    pub session: Mutex<AdminSession>,
    pub events: SseHub,
}

/// Central application state storing the token mirror, live sessions and
/// database handles.
pub struct AppState {
    config: Arc<AppConfig>,
    token_store: RwLock<Option<Arc<dyn TokenStore>>>,
    pin_verifier: Arc<dyn PinVerifier>,
    board: RwLock<Option<TokenBoard>>,
    feed: TokenFeed,
    sessions: DashMap<Uuid, Arc<SessionEntry>>,
    mutation_gates: IndexMap<String, Mutex<()>>,
    public_sse: SseHub,
    degraded: watch::Sender<bool>,
    verify_timeout: Option<Duration>,
    mutation_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed; PINs are checked against the department registry.
    pub fn new(config: AppConfig) -> SharedState {
        let config = Arc::new(config);
        let pin_verifier = Arc::new(RegistryPinVerifier::new(config.clone()));
        Self::build(
            config,
            pin_verifier,
            Some(DEFAULT_VERIFY_TIMEOUT),
            Some(DEFAULT_MUTATION_TIMEOUT),
        )
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        config: AppConfig,
        pin_verifier: Arc<dyn PinVerifier>,
        verify_timeout: Option<Duration>,
        mutation_timeout: Option<Duration>,
    ) -> SharedState {
        Self::build(
            Arc::new(config),
            pin_verifier,
            verify_timeout,
            mutation_timeout,
        )
    }

    fn build(
        config: Arc<AppConfig>,
        pin_verifier: Arc<dyn PinVerifier>,
        verify_timeout: Option<Duration>,
        mutation_timeout: Option<Duration>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let mutation_gates = config
            .department_ids()
            .into_iter()
            .map(|id| (id, Mutex::new(())))
            .collect();

        Arc::new(Self {
            config,
            token_store: RwLock::new(None),
            pin_verifier,
            board: RwLock::new(None),
            feed: TokenFeed::new(FEED_CAPACITY),
            sessions: DashMap::new(),
            mutation_gates,
            public_sse: SseHub::new(PUBLIC_SSE_CAPACITY),
            degraded: degraded_tx,
            verify_timeout,
            mutation_timeout,
        })
    }

    /// Department registry this process serves.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current token store, if one is installed.
    pub async fn token_store(&self) -> Option<Arc<dyn TokenStore>> {
        let guard = self.token_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current token store or fail with [`ServiceError::Degraded`].
    pub async fn require_token_store(&self) -> Result<Arc<dyn TokenStore>, ServiceError> {
        self.token_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new token store implementation and leave degraded mode.
    pub async fn install_token_store(&self, store: Arc<dyn TokenStore>) {
        {
            let mut guard = self.token_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current token store and enter degraded mode.
    ///
    /// The board mirror is left in place so readers keep the last synced
    /// values while the backend is away.
    pub async fn clear_token_store(&self) {
        {
            let mut guard = self.token_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.token_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// PIN verifier handle used by the session services.
    pub fn pin_verifier(&self) -> Arc<dyn PinVerifier> {
        self.pin_verifier.clone()
    }

    /// In-memory mirror of the token table. `None` until the first hydration.
    pub fn board(&self) -> &RwLock<Option<TokenBoard>> {
        &self.board
    }

    /// Change feed carrying confirmed token writes.
    pub fn feed(&self) -> &TokenFeed {
        &self.feed
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// Registry of live admin sessions keyed by their identifier.
    pub fn sessions(&self) -> &DashMap<Uuid, Arc<SessionEntry>> {
        &self.sessions
    }

    /// Create a session for the given department, starting locked.
    pub fn register_session(&self, department: String) -> (Uuid, Arc<SessionEntry>) {
        let id = Uuid::new_v4();
        let entry = Arc::new(SessionEntry {
            department: department.clone(),
            session: Mutex::new(AdminSession::new(department)),
            events: SseHub::new(SESSION_SSE_CAPACITY),
        });
        self.sessions.insert(id, entry.clone());
        (id, entry)
    }

    /// Look up a live session by its identifier.
    pub fn session(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Discard a session. Returns the entry if it was still registered.
    pub fn remove_session(&self, id: &Uuid) -> Option<Arc<SessionEntry>> {
        self.sessions.remove(id).map(|(_, entry)| entry)
    }

    /// Per-department write gate. One in-flight mutation per department.
    pub fn mutation_gate(&self, department: &str) -> Option<&Mutex<()>> {
        self.mutation_gates.get(department)
    }

    /// How long to wait for the PIN verifier before giving up.
    pub fn verify_timeout(&self) -> Option<Duration> {
        self.verify_timeout
    }

    /// How long to wait for a token write before giving up.
    pub fn mutation_timeout(&self) -> Option<Duration> {
        self.mutation_timeout
    }

    /// Update and broadcast the degraded flag when the value changes.
    fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
