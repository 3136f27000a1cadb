//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{board::format_token, validation::validate_pin},
    state::session::{AdminSession, LockCause, SessionPhase},
};

/// Payload carrying one PIN attempt for the session's department.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PinSubmission {
    pub pin: String,
}

impl Validate for PinSubmission {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_pin(&self.pin) {
            errors.add("pin", e);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Request to overwrite the counter with an explicit value.
///
/// The field is wider than the counter on purpose; out-of-range submissions
/// are rejected with a validation error instead of a deserialization failure.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetTokenRequest {
    #[validate(range(min = 0, max = 4_294_967_295_i64))]
    pub value: i64,
}

/// Session status reported back to the admin panel after each operation.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    pub department: String,
    /// One of `locked`, `unlocking` or `unlocked`.
    pub phase: String,
    /// Machine-readable lock cause, absent for a fresh session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Prompt the panel can show verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Confirmed counter value returned by the mutation endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenValueResponse {
    pub department: String,
    pub value: u32,
    /// Zero-padded rendering used by the display boards.
    pub display: String,
}

impl TokenValueResponse {
    /// Build the response for a confirmed value.
    pub fn new(department: impl Into<String>, value: u32) -> Self {
        Self {
            department: department.into(),
            value,
            display: format_token(value),
        }
    }
}

impl From<&AdminSession> for SessionStatusResponse {
    fn from(session: &AdminSession) -> Self {
        let (reason, message) = match session.phase() {
            SessionPhase::Locked(cause) => match lock_reason(cause) {
                Some((reason, message)) => (Some(reason.to_owned()), Some(message.to_owned())),
                None => (None, None),
            },
            _ => (None, None),
        };

        Self {
            department: session.department().to_owned(),
            phase: phase_label(&session.phase()).to_owned(),
            reason,
            message,
        }
    }
}

/// Wire label for a session phase.
pub(crate) fn phase_label(phase: &SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Locked(_) => "locked",
        SessionPhase::Unlocking => "unlocking",
        SessionPhase::Unlocked => "unlocked",
    }
}

/// Machine-readable cause and panel prompt for a lock, if one applies.
///
/// An incorrect PIN and a verifier outage deliberately read differently so
/// admins know whether retrying the same PIN can ever succeed.
pub(crate) fn lock_reason(cause: LockCause) -> Option<(&'static str, &'static str)> {
    match cause {
        LockCause::Initial => None,
        LockCause::IncorrectPin => Some(("incorrect_pin", "Incorrect PIN. Please try again.")),
        LockCause::VerifierError => Some((
            "verifier_unavailable",
            "PIN verification is temporarily unavailable. Please try again.",
        )),
        LockCause::Explicit => Some(("locked", "Session locked.")),
        LockCause::Inactivity => Some(("inactivity", "Session locked after inactivity.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::SessionEvent;

    #[test]
    fn pin_submission_rejects_malformed_pins() {
        assert!(PinSubmission { pin: "1234".into() }.validate().is_ok());
        assert!(PinSubmission { pin: "".into() }.validate().is_err());
        assert!(PinSubmission { pin: "12a4".into() }.validate().is_err());
    }

    #[test]
    fn set_token_request_bounds_the_value() {
        assert!(SetTokenRequest { value: 0 }.validate().is_ok());
        assert!(SetTokenRequest { value: 4_294_967_295 }.validate().is_ok());
        assert!(SetTokenRequest { value: -1 }.validate().is_err());
        assert!(SetTokenRequest { value: 4_294_967_296 }.validate().is_err());
    }

    #[test]
    fn fresh_session_status_has_no_reason() {
        let session = AdminSession::new("cs");
        let status = SessionStatusResponse::from(&session);
        assert_eq!(status.phase, "locked");
        assert_eq!(status.reason, None);
    }

    #[test]
    fn rejected_pin_status_carries_reason_and_message() {
        let mut session = AdminSession::new("cs");
        session.apply(SessionEvent::SubmitPin).unwrap();
        session.apply(SessionEvent::PinRejected).unwrap();

        let status = SessionStatusResponse::from(&session);
        assert_eq!(status.phase, "locked");
        assert_eq!(status.reason.as_deref(), Some("incorrect_pin"));
        assert_eq!(status.message.as_deref(), Some("Incorrect PIN. Please try again."));
    }
}
