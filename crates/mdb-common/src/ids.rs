//! Typed ID wrappers for type safety across mdb.
//!
//! Every archive entity gets a newtype around a UUID so a `FileId` can never be
//! passed where a `ContentUnitId` is expected. The human-facing 8 character
//! UIDs live on the models themselves (see [`crate::uid`]).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
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

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

typed_id!(
    /// Unique identifier for a physical file.
    FileId
);

typed_id!(
    /// Unique identifier for a pipeline operation.
    OperationId
);

typed_id!(
    /// Unique identifier for a content unit.
    ContentUnitId
);

typed_id!(
    /// Unique identifier for a collection of content units.
    CollectionId
);

typed_id!(
    /// Unique identifier for a catalog entry (source, tag, person, publisher).
    CatalogId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_creation() {
        let id1 = FileId::new();
        let id2 = FileId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_from_uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let unit_id = ContentUnitId::from(uuid);
        let back: Uuid = unit_id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_id_parse_and_display() {
        let id = CollectionId::new();
        let parsed: CollectionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<OperationId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = FileId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
