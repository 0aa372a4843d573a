//! Node agents: the external capabilities invoked by workflow nodes.
//!
//! Every node type maps to one agent. Agents read the run context, produce
//! a record of outputs, and never mutate the context themselves; merging is
//! the executor's job.

pub mod approval;
pub mod router;
pub mod tool;
pub mod workflow_call;

use std::sync::Arc;

pub use approval::ApprovalAgent;
pub use router::RouterAgent;
pub use tool::ToolAgent;
pub use workflow_call::WorkflowCallAgent;

use crate::core::value::{Context, Value};
use crate::error::Result;
use crate::tools::ToolRegistry;
use crate::workflow::model::{Node, NodeKind};

/// An external capability invoked by one workflow node.
pub trait Agent {
    /// Id of the node this agent was instantiated for.
    fn node_id(&self) -> &str;

    /// Declared output names, used to synthesize dry-run placeholders.
    fn outputs(&self) -> &[String];

    /// Run the agent against the current context, returning produced outputs.
    fn execute(&self, context: &Context) -> Result<Context>;

    /// Simulate execution without side effects.
    fn dry_run(&self, _context: &Context) -> Context {
        let mut produced = Context::new();
        for output in self.outputs() {
            produced.insert(
                output.clone(),
                Value::from(format!("{}:{}:DRY", self.node_id(), output)),
            );
        }
        produced
    }
}

/// Instantiate the agent for a node based on its declared type.
pub fn make_agent(node: &Node, registry: Arc<ToolRegistry>) -> Box<dyn Agent> {
    match node.kind {
        NodeKind::Tool => Box::new(ToolAgent::new(node, registry)),
        NodeKind::Router => Box::new(RouterAgent::new(node)),
        NodeKind::Approval => Box::new(ApprovalAgent::new(node)),
        NodeKind::WorkflowCall => Box::new(WorkflowCallAgent::new(node, registry)),
    }
}
