//! Strongly typed identifiers shared by every crate.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a random (v4) identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The wrapped UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_newtype! {
    /// Identity of an aggregate root (a student, a course, an order).
    ///
    /// Distinct from [`MessageId`] so the two can never be swapped silently.
    AggregateId
}

uuid_newtype! {
    /// Identity of one message: command, event, notification or wire message.
    MessageId
}

impl AggregateId {
    /// The all-zero ID. Validators treat it as "not provided".
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true for the all-zero ID.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}
