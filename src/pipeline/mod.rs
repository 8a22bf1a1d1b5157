// Forwarding pipeline — filter commit events and shape them into task messages.

pub mod message;
pub mod router;

pub use message::TaskMessage;
pub use router::{route, Router, RouterStats};
