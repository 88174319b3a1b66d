//! Common error types used throughout mdb.
//!
//! Handlers classify failures into a small taxonomy: a required record was not
//! found, the request itself is invalid, or the store failed underneath us.
//! Errors raised deep inside a handler are wrapped with the logical step that
//! failed via [`ResultExt::context`], and [`Error::root`] recovers the original
//! classification through any number of wrappers.

/// Common error type for mdb.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required record (file, unit, collection, operation...) was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A database operation failed (constraint violation, connection error...).
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error annotated with the step that produced it.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Alias for invalid_input (for consistency).
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap this error with a description of the step that failed.
    pub fn context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping all context wrappers.
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether the root cause is a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// Whether the root cause is invalid input.
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::InvalidInput(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach step descriptions to fallible results.
pub trait ResultExt<T> {
    /// Wrap the error (if any) with a fixed context message.
    fn context<S: Into<String>>(self, context: S) -> Result<T>;

    /// Wrap the error (if any) with a lazily built context message.
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}
