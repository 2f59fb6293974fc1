pub mod registry;
pub mod task;

pub use registry::{Group, User};
pub use task::Task;
