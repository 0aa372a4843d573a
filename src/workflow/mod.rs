//! Declarative workflow engine: compile a node/edge specification, then run
//! it to completion with guard-gated edge traversal.

pub mod compiler;
pub mod executor;
pub mod export;
pub mod model;

pub use compiler::compile;
pub use executor::WorkflowExecutor;
pub use export::to_visualization_json;
pub use model::{Edge, Node, NodeIo, NodeKind, Workflow};
