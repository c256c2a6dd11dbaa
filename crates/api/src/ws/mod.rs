//! Dashboard WebSocket: the subscriber registry and the upgrade handler.

mod handler;
pub mod subscribers;

pub use handler::ws_handler;
pub use subscribers::Subscribers;
