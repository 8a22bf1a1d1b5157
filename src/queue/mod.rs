// Work-queue publishing — the TaskSink seam and its RabbitMQ implementation.

pub mod publisher;
pub mod sink;

pub use publisher::QueuePublisher;
pub use sink::{StdoutSink, TaskSink, LIKE_QUEUE, POST_QUEUE, QUEUES};
