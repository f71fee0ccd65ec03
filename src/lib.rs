pub mod backend;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tunnel;

pub use backend::{default_backend, Backend, BackendError, ConnectParams, Session};
pub use config::{RuntimeVersion, TunnelConfig};
pub use error::{TunnelError, TunnelResult};
pub use server::create_router;
pub use tunnel::{Action, Dispatcher, TunnelForm};
