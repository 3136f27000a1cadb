use std::time::{Duration, Instant};

use thiserror::Error;

/// High-level phases an admin session can be in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Mutations are refused; the panel shows the PIN prompt.
    Locked(LockCause),
    /// A PIN verification round-trip is in flight.
    Unlocking,
    /// Mutations for the session's department are allowed.
    Unlocked,
}

/// Why a session is (or returned to) the locked phase.
///
/// Causes surface distinct messages to the admin panel; an incorrect PIN and
/// a verifier outage must never look the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCause {
    /// Fresh session that has not attempted verification yet.
    Initial,
    /// The verifier rejected the submitted PIN.
    IncorrectPin,
    /// The verifier failed or timed out before producing a verdict.
    VerifierError,
    /// The admin locked the panel on purpose.
    Explicit,
    /// The inactivity watchdog locked an idle session.
    Inactivity,
}

/// Events that can be applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Admin submitted a PIN; verification starts.
    SubmitPin,
    /// The verifier approved the PIN.
    PinAccepted,
    /// The verifier rejected the PIN.
    PinRejected,
    /// The verifier could not produce a verdict.
    PinCheckFailed,
    /// The admin locked the panel on purpose.
    Lock,
    /// The inactivity deadline passed without any admin action.
    InactivityElapsed,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the session was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Per-panel unlock state machine guarding one department's mutations.
///
/// Sessions live exactly as long as the admin SSE stream that created them;
/// a reopened panel always starts over in [`SessionPhase::Locked`].
#[derive(Debug, Clone)]
pub struct AdminSession {
    department: String,
    phase: SessionPhase,
    last_activity: Instant,
}

impl AdminSession {
    /// Create a session for the given department, starting locked.
    pub fn new(department: impl Into<String>) -> Self {
        Self {
            department: department.into(),
            phase: SessionPhase::Locked(LockCause::Initial),
            last_activity: Instant::now(),
        }
    }

    /// Department this session is bound to.
    pub fn department(&self) -> &str {
        &self.department
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase.clone()
    }

    /// Whether mutations are currently allowed.
    pub fn is_unlocked(&self) -> bool {
        self.phase == SessionPhase::Unlocked
    }

    /// Time since the last recorded admin action. Meaningful only while unlocked.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Record an admin action, pushing back the inactivity deadline.
    ///
    /// Activity on a session that is not unlocked is ignored; it must not
    /// influence the deadline of a later unlock.
    pub fn record_activity(&mut self) {
        if self.phase == SessionPhase::Unlocked {
            self.last_activity = Instant::now();
        }
    }

    /// Apply an event, moving the session to the next phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (&self.phase, event) {
            (SessionPhase::Locked(_), SessionEvent::SubmitPin) => SessionPhase::Unlocking,
            (SessionPhase::Unlocking, SessionEvent::PinAccepted) => SessionPhase::Unlocked,
            (SessionPhase::Unlocking, SessionEvent::PinRejected) => {
                SessionPhase::Locked(LockCause::IncorrectPin)
            }
            (SessionPhase::Unlocking, SessionEvent::PinCheckFailed) => {
                SessionPhase::Locked(LockCause::VerifierError)
            }
            (SessionPhase::Unlocked, SessionEvent::Lock) => {
                SessionPhase::Locked(LockCause::Explicit)
            }
            (SessionPhase::Unlocked, SessionEvent::InactivityElapsed) => {
                SessionPhase::Locked(LockCause::Inactivity)
            }
            (from, event) => {
                return Err(InvalidTransition {
                    from: from.clone(),
                    event,
                });
            }
        };

        if next == SessionPhase::Unlocked {
            self.last_activity = Instant::now();
        }
        self.phase = next;

        Ok(self.phase.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(session: &mut AdminSession, event: SessionEvent) -> SessionPhase {
        session.apply(event).unwrap()
    }

    fn unlocked_session() -> AdminSession {
        let mut session = AdminSession::new("cs");
        apply(&mut session, SessionEvent::SubmitPin);
        apply(&mut session, SessionEvent::PinAccepted);
        session
    }

    #[test]
    fn new_session_starts_locked() {
        let session = AdminSession::new("cs");
        assert_eq!(session.phase(), SessionPhase::Locked(LockCause::Initial));
        assert!(!session.is_unlocked());
    }

    #[test]
    fn accepted_pin_unlocks() {
        let mut session = AdminSession::new("cs");
        assert_eq!(
            apply(&mut session, SessionEvent::SubmitPin),
            SessionPhase::Unlocking
        );
        assert_eq!(
            apply(&mut session, SessionEvent::PinAccepted),
            SessionPhase::Unlocked
        );
    }

    #[test]
    fn rejected_pin_relocks_with_cause() {
        let mut session = AdminSession::new("cs");
        apply(&mut session, SessionEvent::SubmitPin);
        assert_eq!(
            apply(&mut session, SessionEvent::PinRejected),
            SessionPhase::Locked(LockCause::IncorrectPin)
        );
    }

    #[test]
    fn verifier_failure_relocks_with_distinct_cause() {
        let mut session = AdminSession::new("cs");
        apply(&mut session, SessionEvent::SubmitPin);
        let phase = apply(&mut session, SessionEvent::PinCheckFailed);
        assert_eq!(phase, SessionPhase::Locked(LockCause::VerifierError));
        assert_ne!(phase, SessionPhase::Locked(LockCause::IncorrectPin));
    }

    #[test]
    fn repeated_wrong_pins_never_unlock() {
        let mut session = AdminSession::new("cs");
        for _ in 0..3 {
            apply(&mut session, SessionEvent::SubmitPin);
            apply(&mut session, SessionEvent::PinRejected);
            assert_eq!(
                session.phase(),
                SessionPhase::Locked(LockCause::IncorrectPin)
            );
        }
    }

    #[test]
    fn explicit_lock_from_unlocked() {
        let mut session = unlocked_session();
        assert_eq!(
            apply(&mut session, SessionEvent::Lock),
            SessionPhase::Locked(LockCause::Explicit)
        );
    }

    #[test]
    fn inactivity_lock_from_unlocked() {
        let mut session = unlocked_session();
        assert_eq!(
            apply(&mut session, SessionEvent::InactivityElapsed),
            SessionPhase::Locked(LockCause::Inactivity)
        );
    }

    #[test]
    fn submit_while_unlocking_is_invalid() {
        let mut session = AdminSession::new("cs");
        apply(&mut session, SessionEvent::SubmitPin);
        let err = session.apply(SessionEvent::SubmitPin).unwrap_err();
        assert_eq!(err.from, SessionPhase::Unlocking);
        assert_eq!(err.event, SessionEvent::SubmitPin);
    }

    #[test]
    fn lock_while_locked_is_invalid() {
        let mut session = AdminSession::new("cs");
        assert!(session.apply(SessionEvent::Lock).is_err());
    }

    #[test]
    fn accept_without_pending_submission_is_invalid() {
        let mut session = AdminSession::new("cs");
        assert!(session.apply(SessionEvent::PinAccepted).is_err());
        let mut session = unlocked_session();
        assert!(session.apply(SessionEvent::PinAccepted).is_err());
    }

    #[test]
    fn activity_only_counts_while_unlocked() {
        let mut session = AdminSession::new("cs");
        let before = session.idle_for();
        std::thread::sleep(Duration::from_millis(5));
        session.record_activity();
        assert!(session.idle_for() >= before);

        let mut session = unlocked_session();
        std::thread::sleep(Duration::from_millis(5));
        session.record_activity();
        assert!(session.idle_for() < Duration::from_millis(5));
    }
}
