use crate::{
    dto::board::{DepartmentSummary, DepartmentsResponse, TokenSnapshotResponse},
    error::ServiceError,
    state::SharedState,
};

/// Read the current token snapshot for the public display.
///
/// Fails with [`ServiceError::Degraded`] until the first hydration has run;
/// the board never serves made-up zeroes.
pub async fn token_snapshot(state: &SharedState) -> Result<TokenSnapshotResponse, ServiceError> {
    let degraded = state.is_degraded().await;
    let guard = state.board().read().await;
    let board = guard.as_ref().ok_or(ServiceError::Degraded)?;
    Ok(TokenSnapshotResponse::from_board(board, degraded))
}

/// List registry departments in board order.
pub fn departments(state: &SharedState) -> DepartmentsResponse {
    DepartmentsResponse {
        departments: state
            .config()
            .departments()
            .map(DepartmentSummary::from)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{pin_verifier::RegistryPinVerifier, token_store::TokenRecord},
        state::{AppState, SharedState, board::TokenBoard},
    };

    fn test_state() -> SharedState {
        let verifier = Arc::new(RegistryPinVerifier::new(Arc::new(AppConfig::default())));
        AppState::for_tests(AppConfig::default(), verifier, None, None)
    }

    async fn hydrate(state: &SharedState, records: Vec<TokenRecord>) {
        let order = state.config().department_ids();
        let mut guard = state.board().write().await;
        *guard = Some(TokenBoard::from_records(&order, records));
    }

    #[tokio::test]
    async fn snapshot_fails_until_hydrated() {
        let state = test_state();
        let err = token_snapshot(&state).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn snapshot_reports_values_in_board_order() {
        let state = test_state();
        hydrate(
            &state,
            vec![
                TokenRecord {
                    department: "ee".into(),
                    current_token: 42,
                },
                TokenRecord {
                    department: "cs".into(),
                    current_token: 7,
                },
            ],
        )
        .await;

        let snapshot = token_snapshot(&state).await.unwrap();
        let pairs: Vec<_> = snapshot
            .tokens
            .iter()
            .map(|entry| (entry.department.as_str(), entry.display.as_str()))
            .collect();
        assert_eq!(pairs, vec![("cs", "007"), ("ee", "042")]);
        assert!(snapshot.degraded);
    }

    #[tokio::test]
    async fn departments_never_expose_pins() {
        let state = test_state();
        let response = departments(&state);
        assert_eq!(response.departments.len(), state.config().len());

        let serialized = serde_json::to_string(&response).unwrap();
        assert!(!serialized.contains("\"pin\""));
        for pin in ["1234", "5678", "9012", "3456", "7890", "2468"] {
            assert!(!serialized.contains(pin), "PIN `{pin}` leaked into the response");
        }
    }
}
