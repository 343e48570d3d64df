//! Stable ID newtypes for diagram entities.
//!
//! All IDs are distinct newtype wrappers over `String`, providing type safety
//! so that a `NodeId` cannot be accidentally used where an `EdgeId` is expected.
//! Node and edge ids are caller-generated; [`NodeId::generate`] and friends
//! hand out collision-free UUID v4 strings.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Allocates a fresh random identifier.
            pub fn generate() -> Self {
                $name(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }
    };
}

string_id!(
    /// Opaque diagram identifier assigned by the persistence gateway.
    DiagramId
);
string_id!(
    /// Node identifier, unique within one diagram.
    NodeId
);
string_id!(
    /// Edge identifier, unique within one diagram.
    EdgeId
);
string_id!(
    /// Identifier of a task owned by the external task store.
    TaskId
);
