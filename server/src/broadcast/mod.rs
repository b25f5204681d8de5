mod broadcaster;
mod session;
mod websocket;

pub use broadcaster::{BroadcastReport, Broadcaster, Removal};
pub use session::{SessionError, SessionId, ViewerSink};
pub use websocket::{WebSocketSink, serve_viewer};
