//! Durable render queue consumer.

pub mod render_worker;
pub mod task;

pub use render_worker::RenderWorker;
pub use task::RenderTask;
