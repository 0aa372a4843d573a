//! Agent that produces a boolean approval outcome.

use crate::agent::Agent;
use crate::core::value::{Context, Value};
use crate::error::Result;
use crate::olog_debug;
use crate::workflow::model::Node;

pub struct ApprovalAgent {
    node_id: String,
    timeout_hours: i64,
    outputs: Vec<String>,
}

impl ApprovalAgent {
    pub fn new(node: &Node) -> Self {
        Self {
            node_id: node.id.clone(),
            timeout_hours: node
                .params
                .get("timeout_hours")
                .and_then(Value::as_i64)
                .unwrap_or(24),
            outputs: node.io.outputs.clone(),
        }
    }
}

impl Agent for ApprovalAgent {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn execute(&self, context: &Context) -> Result<Context> {
        // timeout_hours is accepted but not enforced; the engine has no
        // cancellation primitive.
        olog_debug!(
            "approval node {}: timeout_hours={} (unenforced)",
            self.node_id,
            self.timeout_hours
        );
        let approved = context
            .get("approved")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Ok(Context::from([("approved", Value::Bool(approved))]))
    }
}
