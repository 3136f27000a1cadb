use serde::{Deserialize, Serialize};

use crate::dao::token_store::TokenRecord;

/// Stored shape of a token counter, keyed by department identifier.
#[derive(Debug, Serialize, Deserialize)]
pub struct MongoTokenDocument {
    #[serde(rename = "_id")]
    pub department: String,
    pub current_token: u32,
}

impl From<MongoTokenDocument> for TokenRecord {
    fn from(doc: MongoTokenDocument) -> Self {
        TokenRecord {
            department: doc.department,
            current_token: doc.current_token,
        }
    }
}
