//! Agent that wraps a tool from the registry.

use std::sync::Arc;

use crate::agent::Agent;
use crate::core::value::{Context, Value};
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;
use crate::workflow::model::Node;

pub struct ToolAgent {
    node_id: String,
    tool: Option<String>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    registry: Arc<ToolRegistry>,
}

impl ToolAgent {
    pub fn new(node: &Node, registry: Arc<ToolRegistry>) -> Self {
        Self {
            node_id: node.id.clone(),
            tool: node
                .params
                .get("tool")
                .and_then(|v| v.as_str())
                .map(String::from),
            inputs: node.io.inputs.clone(),
            outputs: node.io.outputs.clone(),
            registry,
        }
    }
}

impl Agent for ToolAgent {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn execute(&self, context: &Context) -> Result<Context> {
        let tool = self
            .tool
            .as_deref()
            .ok_or_else(|| Error::MissingToolParameter(self.node_id.clone()))?;

        // Pass only the declared inputs that are actually bound.
        let mut args = Context::new();
        for input in &self.inputs {
            if let Some(value) = context.get(input) {
                args.insert(input.clone(), value.clone());
            }
        }

        let result = self.registry.invoke(tool, &args)?;
        Ok(match result {
            Value::Record(map) => Context::from(map),
            other => Context::from([("result", other)]),
        })
    }
}
