//! Mdb-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across mdb:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for files, operations, units, collections
//! - **Core Types**: Enums for operation, content unit, and collection types
//! - **Properties**: The typed property bag carried by every archive entity
//! - **Identifiers**: Human-facing UID generation and SHA1 normalization
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use mdb_common::{ContentUnitType, Error, FileId, Properties, Result};
//!
//! let file_id = FileId::new();
//!
//! let mut props = Properties::new();
//! props.insert("duration", 812.5);
//!
//! let unit_type: ContentUnitType = "LESSON_PART".parse().unwrap();
//! assert_eq!(unit_type, ContentUnitType::LessonPart);
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("file"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod props;
pub mod sha1;
pub mod types;
pub mod uid;

pub use error::{Error, Result, ResultExt};
pub use ids::*;
pub use props::{PropValue, Properties};
pub use types::*;
