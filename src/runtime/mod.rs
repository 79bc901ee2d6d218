pub mod shutdown;
pub mod task;

pub use shutdown::{Shutdown, State};
pub use task::{Task, TaskHandle};
