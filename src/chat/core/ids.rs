// File: src/chat/core/ids.rs

//! Identifier types for chat sessions and messages.
//!
//! Strongly-typed UUID newtypes keep session and message identifiers apart at
//! compile time. Message identity is what background tasks use to find their
//! target after the session has been mutated concurrently, so an id is assigned
//! once at creation and never reused.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables time-ordered `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID with good insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Generate a random UUID (v4).
#[inline]
#[must_use]
fn uuid_random() -> Uuid {
    Uuid::new_v4()
}

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        generator = $gen:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self($gen())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// Identifier for a conversation session.
    SessionId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Identifier for a single chat message.
    MessageId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Token returned by a session deletion, used to undo it.
    DeletionToken,
    generator = uuid_random
);

// ===== Model IDs ============================================================

/// Validation errors for [`ModelId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelIdError {
    /// Empty after trimming.
    Empty,
    /// Longer than [`ModelId::MAX_LEN`].
    TooLong {
        /// Allowed maximum.
        max: usize,
        /// Actual length.
        got: usize,
    },
    /// Contains a character outside the allowed set.
    InvalidChar {
        /// Offending character.
        ch: char,
        /// Character index.
        index: usize,
    },
}

impl fmt::Display for ModelIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "model id must not be empty"),
            Self::TooLong { max, got } => write!(f, "model id too long: got {got}, max {max}"),
            Self::InvalidChar { ch, index } => {
                write!(
                    f,
                    "model id contains invalid character {ch:?} at index {index}"
                )
            }
        }
    }
}

impl std::error::Error for ModelIdError {}

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Validated model name, e.g. `gpt-4o` or `Llama-3.1-8B-Instruct-q4f32_1-MLC`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Maximum accepted length in bytes.
    pub const MAX_LEN: usize = 192;

    /// Validate and wrap a model name.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains characters
    /// outside `[A-Za-z0-9._:/+@-]`.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ModelIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(ModelIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }

        for (i, ch) in s.chars().enumerate() {
            let ok =
                ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | ':' | '/' | '-' | '+' | '@');
            if !ok {
                return Err(ModelIdError::InvalidChar { ch, index: i });
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// Borrow the model name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self(DEFAULT_MODEL.to_string())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = ModelIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_round_trip_through_strings() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);

        let parsed: MessageId = a.to_string().parse().unwrap_or_default();
        assert_eq!(parsed, a);
    }

    #[test]
    fn model_id_accepts_webllm_names() {
        let id = ModelId::new(" Llama-3.1-8B-Instruct-q4f32_1-MLC ");
        assert_eq!(
            id.as_ref().map(ModelId::as_str),
            Ok("Llama-3.1-8B-Instruct-q4f32_1-MLC")
        );
    }

    #[test]
    fn model_id_rejects_bad_input() {
        assert_eq!(ModelId::new("   "), Err(ModelIdError::Empty));
        assert!(matches!(
            ModelId::new("gpt 4"),
            Err(ModelIdError::InvalidChar { ch: ' ', index: 3 })
        ));
        let long = "a".repeat(ModelId::MAX_LEN + 1);
        assert!(matches!(ModelId::new(long), Err(ModelIdError::TooLong { .. })));
    }

    #[test]
    fn model_id_deserialization_validates() {
        let ok: Result<ModelId, _> = serde_json::from_str("\"gpt-4o\"");
        assert!(ok.is_ok());
        let bad: Result<ModelId, _> = serde_json::from_str("\"gpt 4o\"");
        assert!(bad.is_err());
    }
}
