//! Core domain models shared by both engines.

pub mod task;
pub mod value;

pub use task::{DecompositionResult, RecombinationPlan, Strategy, Task, TaskStatus};
pub use value::{Context, Value};
