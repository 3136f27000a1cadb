use serde::{Deserialize, Serialize};

use crate::dao::token_store::TokenRecord;

/// Name of the table exposed by the REST API.
pub const TOKENS_TABLE: &str = "tokens";

/// Wire representation of a `tokens` row.
#[derive(Debug, Serialize, Deserialize)]
pub struct RestTokenRow {
    pub department: String,
    pub current_token: u32,
}

impl RestTokenRow {
    /// Zero-valued row used when provisioning a department.
    pub fn provisioned(department: String) -> Self {
        Self {
            department,
            current_token: 0,
        }
    }

    pub fn into_record(self) -> TokenRecord {
        TokenRecord {
            department: self.department,
            current_token: self.current_token,
        }
    }
}

/// PATCH body carrying only the column being updated.
#[derive(Debug, Serialize)]
pub struct TokenPatch {
    pub current_token: u32,
}
