// Skyqueue: Jetstream → RabbitMQ forwarding stage for Bluesky posts and likes.
//
// This is the library root. Each module corresponds to one stage of the
// pipeline: stream client, router/message builder, queue publisher, and
// the lifecycle controller that wires them together.

pub mod config;
pub mod jetstream;
pub mod lifecycle;
pub mod pipeline;
pub mod queue;
pub mod records;
