//! Database client boundary
//!
//! The tunnel never talks to a database directly. It drives a [`Backend`] that opens one
//! [`Session`] per request, and reads statement output through a [`ResultCursor`].
//! Implementations own the rendering of column values into the bytes the client shows.

#[cfg(feature = "mysql")]
pub mod mysql;

use std::sync::Arc;

use thiserror::Error;

use crate::protocol::{Cell, FieldDescriptor, SessionInfo};

/// Client-side error code for failures the driver cannot attribute to the server.
pub const CR_UNKNOWN_ERROR: u32 = 2000;
/// Client-side error code for a host that cannot be reached.
pub const CR_CONN_HOST_ERROR: u32 = 2003;
/// Client-side error code for a connection lost mid-request.
pub const CR_SERVER_LOST: u32 = 2013;

/// Error reported by the database driver, with its native code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub code: u32,
    pub message: String,
}

impl BackendError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Resolved connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// Outcome of a statement that produced no row set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub affected_rows: u64,
    pub insert_id: u64,
    /// Driver-supplied informational text, e.g. `Records: 3  Duplicates: 0  Warnings: 0`.
    pub info: String,
}

/// Result of executing one statement.
pub enum Execution<'s> {
    Failed(BackendError),
    Completed(Completion),
    Rows(Box<dyn ResultCursor + 's>),
}

/// Live result set of one statement.
///
/// Rows are handed out one at a time; dropping the cursor releases the result.
pub trait ResultCursor {
    fn fields(&self) -> &[FieldDescriptor];

    fn row_count(&self) -> u64;

    fn affected_rows(&self) -> u64 {
        self.row_count()
    }

    fn insert_id(&self) -> u64 {
        0
    }

    /// Next row with exactly `fields().len()` cells, or `None` once drained.
    fn next_row(&mut self) -> Option<Vec<Cell>>;
}

/// One authenticated connection, owned by a single request.
pub trait Session {
    fn set_charset(&mut self, charset: &str) -> Result<(), BackendError>;

    fn select_database(&mut self, name: &str) -> Result<(), BackendError>;

    fn session_info(&mut self) -> SessionInfo;

    fn execute(&mut self, sql: &str) -> Execution<'_>;

    /// Close the connection. Further calls are no-ops.
    fn close(&mut self);
}

/// Factory for sessions.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this build can reach the database at all.
    fn is_available(&self) -> bool {
        true
    }

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, BackendError>;
}

/// Stand-in used when the binary is built without a database client.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

impl Backend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn Session>, BackendError> {
        Err(BackendError::new(
            CR_UNKNOWN_ERROR,
            "no database client compiled in",
        ))
    }
}

/// Backend selected by the build features.
pub fn default_backend() -> Arc<dyn Backend> {
    #[cfg(feature = "mysql")]
    {
        Arc::new(mysql::MysqlBackend::new())
    }
    #[cfg(not(feature = "mysql"))]
    {
        Arc::new(UnavailableBackend)
    }
}
