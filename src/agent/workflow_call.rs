//! Agent that compiles and runs a nested workflow.
//!
//! The workflow source comes from an inline `workflow_text` param, a
//! `workflow_file` path, or (failing both) `<workflows_dir>/<node-id>.yaml`.
//! The nested run's declared outputs are returned for merging into the
//! caller's context.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::Agent;
use crate::config::Config;
use crate::core::value::{Context, Value};
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;
use crate::workflow::compiler;
use crate::workflow::executor::WorkflowExecutor;
use crate::workflow::model::Node;

pub struct WorkflowCallAgent {
    node_id: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    workflow_text: Option<String>,
    workflow_file: Option<String>,
    registry: Arc<ToolRegistry>,
}

impl WorkflowCallAgent {
    pub fn new(node: &Node, registry: Arc<ToolRegistry>) -> Self {
        let param_str = |name: &str| {
            node.params
                .get(name)
                .and_then(Value::as_str)
                .map(String::from)
        };
        Self {
            node_id: node.id.clone(),
            inputs: node.io.inputs.clone(),
            outputs: node.io.outputs.clone(),
            workflow_text: param_str("workflow_text"),
            workflow_file: param_str("workflow_file"),
            registry,
        }
    }

    fn workflow_source(&self) -> Result<String> {
        if let Some(text) = &self.workflow_text {
            return Ok(text.clone());
        }
        let path = match &self.workflow_file {
            Some(file) => PathBuf::from(file),
            None => Config::load()
                .unwrap_or_default()
                .effective_workflows_dir()
                .join(format!("{}.yaml", self.node_id)),
        };
        if !path.exists() {
            return Err(Error::WorkflowFileNotFound(path));
        }
        Ok(std::fs::read_to_string(&path)?)
    }
}

impl Agent for WorkflowCallAgent {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    fn execute(&self, context: &Context) -> Result<Context> {
        // Inputs for the nested workflow are the declared io inputs that are
        // bound in the caller's context.
        let mut inputs = Context::new();
        for input in &self.inputs {
            if let Some(value) = context.get(input) {
                inputs.insert(input.clone(), value.clone());
            }
        }

        let workflow = compiler::compile(&self.workflow_source()?)?;
        let executor = WorkflowExecutor::new(Arc::clone(&self.registry));
        executor.run(&workflow, &inputs, false)
    }
}
