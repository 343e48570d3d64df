//! Persistence for flowdesk diagrams and tasks.
//!
//! Provides the [`DiagramGateway`] and [`TaskStore`] contracts plus the
//! [`InMemoryStore`] and [`SqliteStore`] backends.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: listing records
//! - [`traits`]: the gateway and task store contracts
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`shared`]: one backend behind a cloneable handle

pub mod error;
pub mod memory;
pub mod schema;
pub mod shared;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use shared::SharedStore;
pub use sqlite::SqliteStore;
pub use traits::{DiagramGateway, TaskStore};
pub use types::DiagramSummary;
