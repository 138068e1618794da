//! Logging abstractions
//!
//! Components take an `Arc<dyn Logger>` so the host application decides
//! where log output goes.

mod console;
mod noop;
mod traits;

pub use console::ConsoleLogger;
pub use noop::NoOpLogger;
pub use traits::{Logger, SharedLogger};
