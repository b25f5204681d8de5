pub mod characters;
pub mod routes;
pub mod utils;
pub mod viewers;

pub use routes::{Router, build_router};
