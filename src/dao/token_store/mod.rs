#[cfg(feature = "mongo-store")]
pub mod mongodb;
#[cfg(feature = "rest-store")]
pub mod rest;

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// One row of the `tokens` table: the number a department is currently serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Department identifier the row belongs to.
    pub department: String,
    /// Token value currently being served. Never negative.
    pub current_token: u32,
}

/// Abstraction over the persistence layer for department token counters.
pub trait TokenStore: Send + Sync {
    fn list_tokens(&self) -> BoxFuture<'static, StorageResult<Vec<TokenRecord>>>;
    fn put_token(&self, department: String, value: u32) -> BoxFuture<'static, StorageResult<()>>;
    /// Create zero-valued rows for departments that have none; existing rows are untouched.
    fn provision(&self, departments: Vec<String>) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
