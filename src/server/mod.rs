pub mod handlers;
pub mod routes;
pub mod test_page;

pub use handlers::{AppState, TUNNEL_CONTENT_TYPE};
pub use routes::{create_router, RouterOptions};
