use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::admin::SessionStatusResponse,
    error::ServiceError,
    services::sse_events,
    state::{
        SESSION_IDLE_TIMEOUT, SessionEntry, SharedState,
        session::{LockCause, SessionEvent, SessionPhase},
    },
};

/// How often the inactivity watchdog sweeps unlocked sessions.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Register a locked session for `department`.
pub fn open_session(
    state: &SharedState,
    department: &str,
) -> Result<(Uuid, Arc<SessionEntry>), ServiceError> {
    if !state.config().contains(department) {
        return Err(ServiceError::NotFound(format!(
            "unknown department `{department}`"
        )));
    }

    let (id, entry) = state.register_session(department.to_owned());
    info!(session = %id, department, "admin session opened");
    Ok((id, entry))
}

/// Discard a session once its SSE stream has ended.
pub fn close_session(state: &SharedState, id: Uuid) {
    if state.remove_session(&id).is_some() {
        info!(session = %id, "admin session closed");
    }
}

/// Resolve the session named by the header and check it belongs to the
/// department in the path.
pub fn authorize_session(
    state: &SharedState,
    id: Uuid,
    department: &str,
) -> Result<Arc<SessionEntry>, ServiceError> {
    let entry = state
        .session(&id)
        .ok_or_else(|| ServiceError::Unauthorized("unknown or expired session".into()))?;

    if entry.department != department {
        return Err(ServiceError::Unauthorized(
            "session is bound to another department".into(),
        ));
    }

    Ok(entry)
}

/// Like [`authorize_session`], but additionally requires the unlocked phase
/// and counts the call as admin activity.
pub async fn authorize_unlocked(
    state: &SharedState,
    id: Uuid,
    department: &str,
) -> Result<Arc<SessionEntry>, ServiceError> {
    let entry = authorize_session(state, id, department)?;

    let mut session = entry.session.lock().await;
    if !session.is_unlocked() {
        return Err(ServiceError::Unauthorized("session is locked".into()));
    }
    session.record_activity();
    drop(session);

    Ok(entry)
}

/// Run one PIN attempt through the verifier and apply the verdict.
///
/// A submission while a previous attempt is still in flight, or while the
/// session is already unlocked, reports the current status without consulting
/// the verifier again.
pub async fn submit_pin(
    state: &SharedState,
    id: Uuid,
    department: &str,
    pin: String,
) -> Result<SessionStatusResponse, ServiceError> {
    let entry = authorize_session(state, id, department)?;

    {
        let mut session = entry.session.lock().await;
        match session.phase() {
            SessionPhase::Unlocking | SessionPhase::Unlocked => {
                return Ok(SessionStatusResponse::from(&*session));
            }
            SessionPhase::Locked(_) => {
                session.apply(SessionEvent::SubmitPin)?;
            }
        }
    }

    let verdict = verify_with_timeout(state, department, pin).await;

    // Only this request can move the session out of `Unlocking`, so the
    // applies below cannot fail.
    let mut session = entry.session.lock().await;
    match verdict {
        Ok(true) => {
            session.apply(SessionEvent::PinAccepted)?;
            info!(session = %id, department, "admin session unlocked");
            sse_events::broadcast_session_unlocked(&entry.events, department);
            Ok(SessionStatusResponse::from(&*session))
        }
        Ok(false) => {
            session.apply(SessionEvent::PinRejected)?;
            info!(session = %id, department, "PIN rejected");
            sse_events::broadcast_session_locked(&entry.events, department, LockCause::IncorrectPin);
            Err(ServiceError::IncorrectPin)
        }
        Err(err) => {
            session.apply(SessionEvent::PinCheckFailed)?;
            warn!(session = %id, department, error = %err, "PIN verification failed");
            sse_events::broadcast_session_locked(&entry.events, department, LockCause::VerifierError);
            Err(err)
        }
    }
}

/// Relock an unlocked session on explicit admin request.
pub async fn lock_session(
    state: &SharedState,
    id: Uuid,
    department: &str,
) -> Result<SessionStatusResponse, ServiceError> {
    let entry = authorize_session(state, id, department)?;

    let mut session = entry.session.lock().await;
    session.apply(SessionEvent::Lock)?;
    info!(session = %id, department, "admin session locked");
    sse_events::broadcast_session_locked(&entry.events, department, LockCause::Explicit);

    Ok(SessionStatusResponse::from(&*session))
}

/// Record panel activity, pushing back the inactivity deadline while unlocked.
///
/// Activity on a session that is not unlocked is accepted but has no effect.
pub async fn record_activity(
    state: &SharedState,
    id: Uuid,
    department: &str,
) -> Result<SessionStatusResponse, ServiceError> {
    let entry = authorize_session(state, id, department)?;

    let mut session = entry.session.lock().await;
    session.record_activity();

    Ok(SessionStatusResponse::from(&*session))
}

/// Lock every unlocked session idle for at least `ttl`. Returns how many
/// sessions were locked.
pub async fn sweep_inactive(state: &SharedState, ttl: Duration) -> usize {
    // Collect first so no DashMap guard is held across an await point.
    let entries: Vec<(Uuid, Arc<SessionEntry>)> = state
        .sessions()
        .iter()
        .map(|item| (*item.key(), item.value().clone()))
        .collect();

    let mut locked = 0;
    for (id, entry) in entries {
        let mut session = entry.session.lock().await;
        if session.is_unlocked()
            && session.idle_for() >= ttl
            && session.apply(SessionEvent::InactivityElapsed).is_ok()
        {
            info!(session = %id, department = entry.department.as_str(), "session locked after inactivity");
            sse_events::broadcast_session_locked(
                &entry.events,
                &entry.department,
                LockCause::Inactivity,
            );
            locked += 1;
        }
    }

    locked
}

/// Periodically relock unlocked sessions that have gone idle.
pub async fn run_inactivity_watchdog(state: SharedState) {
    let mut ticker = interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_inactive(&state, SESSION_IDLE_TIMEOUT).await;
    }
}

async fn verify_with_timeout(
    state: &SharedState,
    department: &str,
    pin: String,
) -> Result<bool, ServiceError> {
    let verify = state.pin_verifier().verify(department.to_owned(), pin);

    let verdict = match state.verify_timeout() {
        Some(limit) => match timeout(limit, verify).await {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!(department, "PIN verification timed out");
                return Err(ServiceError::Timeout);
            }
        },
        None => verify.await,
    };

    verdict.map_err(ServiceError::VerifierUnavailable)
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::pin_verifier::{PinVerifier, RegistryPinVerifier, VerifierError, VerifierResult},
        state::AppState,
    };

    struct FailingVerifier;

    impl PinVerifier for FailingVerifier {
        fn verify(&self, _department: String, _pin: String) -> BoxFuture<'static, VerifierResult<bool>> {
            Box::pin(async {
                Err(VerifierError::unavailable(
                    "verifier offline".into(),
                    std::io::Error::other("connection refused"),
                ))
            })
        }
    }

    struct NeverVerifier;

    impl PinVerifier for NeverVerifier {
        fn verify(&self, _department: String, _pin: String) -> BoxFuture<'static, VerifierResult<bool>> {
            Box::pin(std::future::pending())
        }
    }

    fn registry_state() -> SharedState {
        let verifier = Arc::new(RegistryPinVerifier::new(Arc::new(AppConfig::default())));
        AppState::for_tests(AppConfig::default(), verifier, None, None)
    }

    fn state_with_verifier(
        verifier: Arc<dyn PinVerifier>,
        verify_timeout: Option<Duration>,
    ) -> SharedState {
        AppState::for_tests(AppConfig::default(), verifier, verify_timeout, None)
    }

    async fn phase_of(entry: &SessionEntry) -> SessionPhase {
        entry.session.lock().await.phase()
    }

    #[tokio::test]
    async fn open_session_rejects_unknown_department() {
        let state = registry_state();
        let err = open_session(&state, "zz").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn correct_pin_unlocks_the_session() {
        let state = registry_state();
        let (id, entry) = open_session(&state, "cs").unwrap();

        let status = submit_pin(&state, id, "cs", "1234".into()).await.unwrap();
        assert_eq!(status.phase, "unlocked");
        assert_eq!(phase_of(&entry).await, SessionPhase::Unlocked);
    }

    #[tokio::test]
    async fn wrong_pin_relocks_and_reports_incorrect() {
        let state = registry_state();
        let (id, entry) = open_session(&state, "cs").unwrap();

        let err = submit_pin(&state, id, "cs", "0000".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::IncorrectPin));
        assert_eq!(
            phase_of(&entry).await,
            SessionPhase::Locked(LockCause::IncorrectPin)
        );
    }

    #[tokio::test]
    async fn verifier_outage_reads_differently_from_a_wrong_pin() {
        let state = state_with_verifier(Arc::new(FailingVerifier), None);
        let (id, entry) = open_session(&state, "cs").unwrap();

        let err = submit_pin(&state, id, "cs", "1234".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::VerifierUnavailable(_)));
        assert_eq!(
            phase_of(&entry).await,
            SessionPhase::Locked(LockCause::VerifierError)
        );
    }

    #[tokio::test]
    async fn verification_timeout_relocks_the_session() {
        let state = state_with_verifier(
            Arc::new(NeverVerifier),
            Some(Duration::from_millis(20)),
        );
        let (id, entry) = open_session(&state, "cs").unwrap();

        let err = submit_pin(&state, id, "cs", "1234".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(
            phase_of(&entry).await,
            SessionPhase::Locked(LockCause::VerifierError)
        );
    }

    #[tokio::test]
    async fn submitting_while_unlocking_is_a_noop() {
        let state = registry_state();
        let (id, entry) = open_session(&state, "cs").unwrap();
        entry
            .session
            .lock()
            .await
            .apply(SessionEvent::SubmitPin)
            .unwrap();

        let status = submit_pin(&state, id, "cs", "1234".into()).await.unwrap();
        assert_eq!(status.phase, "unlocking");
        assert_eq!(phase_of(&entry).await, SessionPhase::Unlocking);
    }

    #[tokio::test]
    async fn submitting_while_unlocked_is_a_noop() {
        let state = registry_state();
        let (id, _entry) = open_session(&state, "cs").unwrap();
        submit_pin(&state, id, "cs", "1234".into()).await.unwrap();

        // A wrong PIN after unlock does not relock or re-verify.
        let status = submit_pin(&state, id, "cs", "0000".into()).await.unwrap();
        assert_eq!(status.phase, "unlocked");
    }

    #[tokio::test]
    async fn explicit_lock_relocks_an_unlocked_session() {
        let state = registry_state();
        let (id, entry) = open_session(&state, "cs").unwrap();
        submit_pin(&state, id, "cs", "1234".into()).await.unwrap();

        let status = lock_session(&state, id, "cs").await.unwrap();
        assert_eq!(status.phase, "locked");
        assert_eq!(status.reason.as_deref(), Some("locked"));
        assert_eq!(
            phase_of(&entry).await,
            SessionPhase::Locked(LockCause::Explicit)
        );
    }

    #[tokio::test]
    async fn lock_while_locked_is_a_conflict() {
        let state = registry_state();
        let (id, _entry) = open_session(&state, "cs").unwrap();

        let err = lock_session(&state, id, "cs").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn sessions_are_bound_to_their_department() {
        let state = registry_state();
        let (id, _entry) = open_session(&state, "cs").unwrap();

        let err = authorize_session(&state, id, "ee").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn authorize_unlocked_rejects_locked_sessions() {
        let state = registry_state();
        let (id, _entry) = open_session(&state, "cs").unwrap();

        let err = authorize_unlocked(&state, id, "cs").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn closed_sessions_no_longer_authorize() {
        let state = registry_state();
        let (id, _entry) = open_session(&state, "cs").unwrap();

        close_session(&state, id);
        let err = authorize_session(&state, id, "cs").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn sweep_locks_idle_unlocked_sessions() {
        let state = registry_state();
        let (id, entry) = open_session(&state, "cs").unwrap();
        submit_pin(&state, id, "cs", "1234".into()).await.unwrap();

        let locked = sweep_inactive(&state, Duration::ZERO).await;
        assert_eq!(locked, 1);
        assert_eq!(
            phase_of(&entry).await,
            SessionPhase::Locked(LockCause::Inactivity)
        );
    }

    #[tokio::test]
    async fn sweep_spares_recently_active_sessions() {
        let state = registry_state();
        let (id, entry) = open_session(&state, "cs").unwrap();
        submit_pin(&state, id, "cs", "1234".into()).await.unwrap();
        record_activity(&state, id, "cs").await.unwrap();

        let locked = sweep_inactive(&state, Duration::from_secs(60)).await;
        assert_eq!(locked, 0);
        assert_eq!(phase_of(&entry).await, SessionPhase::Unlocked);
    }

    #[tokio::test]
    async fn sweep_ignores_locked_sessions() {
        let state = registry_state();
        let (_id, entry) = open_session(&state, "cs").unwrap();

        let locked = sweep_inactive(&state, Duration::ZERO).await;
        assert_eq!(locked, 0);
        assert_eq!(
            phase_of(&entry).await,
            SessionPhase::Locked(LockCause::Initial)
        );
    }
}
