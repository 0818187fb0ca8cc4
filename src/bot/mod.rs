/// Command and upload handlers
pub mod handlers;
/// Status-message helpers
pub mod messaging;
/// User-to-channel session bindings
pub mod sessions;

pub use sessions::{ChannelRef, SessionRegistry};
