//! Type-safe entity identifiers.
//!
//! The backend assigns string identifiers (e.g. `"P1"`, `"alert-42"`).
//! Each entity gets its own newtype so that a patient id can never be
//! passed where an alert id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
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
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id! {
    /// Identifier of a patient; the routing key for vitals, roster entries
    /// and patient chat partitions.
    PatientId
}

string_id! {
    /// Identifier of an alert, assigned by the backend.
    AlertId
}

string_id! {
    /// Identifier of a chat message, unique within the session.
    MessageId
}

impl MessageId {
    /// Generates an id for a message composed locally before the backend
    /// has assigned one.
    #[must_use]
    pub fn local() -> Self {
        Self(format!("user-{}", uuid::Uuid::new_v4()))
    }
}
