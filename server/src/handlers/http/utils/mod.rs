pub mod deliver_page;
pub mod json_response;
pub mod upgrade;

// Re-export commonly used utilities
pub use deliver_page::*;
pub use json_response::*;
pub use upgrade::*;
