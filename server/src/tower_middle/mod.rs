/// Tower middleware wrapped around the router.
pub mod tower_timeout_handler;

pub use tower_timeout_handler::{RequestTimeoutLayer, RequestTimeoutService};
