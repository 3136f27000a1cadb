/// PIN verification contract and the registry-backed implementation.
pub mod pin_verifier;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Token counter storage and retrieval operations.
pub mod token_store;
