//! Request handling for the HTTP tunnel
//!
//! One request opens exactly one database session, runs either a connection test or an
//! ordered statement batch, and streams the framed outcome back. Statements never
//! overlap: a statement's full output, separator included, precedes the next one.

pub mod dispatcher;
pub mod request;
pub mod stream;

pub use dispatcher::{Dispatcher, AFFECTED_ROWS_ON_ERROR};
pub use request::{Action, ConnectionRequest, QueryBatch, TunnelForm, TunnelRequest};
pub use stream::{ChannelWriter, ResponseWriter};
