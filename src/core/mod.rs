//! Core infrastructure for Tollgate.
//!
//! Configuration, error types, the key-value persistence layer and the
//! time source shared by both stores.

mod clock;
mod config;
mod error;
mod storage;
mod subscribers;

pub use clock::{generate_id, Clock, FixedClock, SystemClock, Timestamps};
pub use config::{Config, DisplayConfig, StorageConfig};
pub use error::{StorageError, StorageResult, StoreError};
pub use storage::{
    load_json, save_json, FileStore, KeyValueStore, MemoryStore, PROJECTS_KEY,
    SESSION_KEY_PREFIX, WORKFLOW_SESSION_KEY, WORKFLOW_SETTINGS_KEY,
};
pub use subscribers::{SubscriptionId, Subscribers};
