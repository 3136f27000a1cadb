//! DTO definitions for the public board read API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::Department,
    dto::format_system_time,
    state::board::TokenBoard,
};

/// Rendered token value for one department.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct TokenEntry {
    pub department: String,
    pub value: u32,
    /// Zero-padded rendering used by the display boards (`7` -> `"007"`).
    pub display: String,
}

/// Snapshot of every tracked token with its freshness timestamp.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenSnapshotResponse {
    pub tokens: Vec<TokenEntry>,
    /// RFC 3339 timestamp of the last applied change.
    pub as_of: String,
    /// Whether the snapshot may be stale because the backend lost its store.
    pub degraded: bool,
}

/// Registry metadata for one department. PINs never leave the server.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentSummary {
    pub id: String,
    pub name: String,
    pub abbr: String,
    pub theme: String,
}

/// Departments in board order.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentsResponse {
    pub departments: Vec<DepartmentSummary>,
}

/// Three-digit zero-padded rendering; wider values keep all their digits.
pub fn format_token(value: u32) -> String {
    format!("{value:03}")
}

impl TokenEntry {
    /// Build an entry for one department value.
    pub fn new(department: impl Into<String>, value: u32) -> Self {
        Self {
            department: department.into(),
            value,
            display: format_token(value),
        }
    }
}

impl TokenSnapshotResponse {
    /// Project a hydrated board into its wire form.
    pub fn from_board(board: &TokenBoard, degraded: bool) -> Self {
        Self {
            tokens: board
                .entries()
                .map(|(department, value)| TokenEntry::new(department, value))
                .collect(),
            as_of: format_system_time(board.as_of()),
            degraded,
        }
    }
}

impl From<(&str, &Department)> for DepartmentSummary {
    fn from((id, department): (&str, &Department)) -> Self {
        Self {
            id: id.to_owned(),
            name: department.name.clone(),
            abbr: department.abbr.clone(),
            theme: department.theme.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_small_values_to_three_digits() {
        assert_eq!(format_token(0), "000");
        assert_eq!(format_token(7), "007");
        assert_eq!(format_token(87), "087");
    }

    #[test]
    fn keeps_wide_values_intact() {
        assert_eq!(format_token(104), "104");
        assert_eq!(format_token(1042), "1042");
    }

    #[test]
    fn entry_carries_display_form() {
        let entry = TokenEntry::new("cs", 7);
        assert_eq!(entry.department, "cs");
        assert_eq!(entry.value, 7);
        assert_eq!(entry.display, "007");
    }
}
