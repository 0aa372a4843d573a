//! Agent that routes work based on a declared parameter.

use crate::agent::Agent;
use crate::core::value::{Context, Value};
use crate::error::Result;
use crate::workflow::model::Node;

pub struct RouterAgent {
    node_id: String,
    task_type: Option<String>,
    outputs: Vec<String>,
}

impl RouterAgent {
    pub fn new(node: &Node) -> Self {
        Self {
            node_id: node.id.clone(),
            task_type: node
                .params
                .get("task_type")
                .and_then(|v| v.as_str())
                .map(String::from),
            outputs: node.io.outputs.clone(),
        }
    }
}

impl Agent for RouterAgent {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn execute(&self, _context: &Context) -> Result<Context> {
        let routed = match self.task_type.as_deref() {
            Some("type_a") => "Routed to agent A",
            Some("type_b") => "Routed to agent B",
            _ => "No suitable agent found",
        };
        Ok(Context::from([("result", Value::from(routed))]))
    }
}
