//! Executor: runs one atomic task and returns a structured result.

use std::sync::Arc;

use crate::core::task::Task;
use crate::core::value::{Context, Value};
use crate::error::Result;
use crate::tools::ToolRegistry;

/// Capability interface: execute an atomic task.
pub trait Executor {
    fn execute(&mut self, task: &Task) -> Result<Value>;
}

/// Reference executor backed by a tool registry.
///
/// A task whose `params.tool` names a registered tool is invoked through the
/// registry with the task's inputs; non-record results are wrapped as
/// `{result: ...}` and every result is tagged with the task id. Tasks with
/// no tool produce a deterministic placeholder result.
pub struct ToolTaskExecutor {
    registry: Arc<ToolRegistry>,
    execution_count: u64,
}

impl ToolTaskExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            execution_count: 0,
        }
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }
}

impl Executor for ToolTaskExecutor {
    fn execute(&mut self, task: &Task) -> Result<Value> {
        self.execution_count += 1;

        if let Some(tool) = task.params.get("tool").and_then(Value::as_str) {
            let raw = self.registry.invoke(tool, &task.inputs)?;
            let mut record = match raw {
                Value::Record(map) => map,
                other => Context::from([("result", other)]).into_inner(),
            };
            record.insert("task_id".to_string(), Value::from(task.id.clone()));
            return Ok(Value::Record(record));
        }

        Ok(Value::from(Context::from([
            ("task_id", Value::from(task.id.clone())),
            (
                "output",
                Value::from(format!("executed: {}", task.description)),
            ),
            ("execution_count", Value::Int(self.execution_count as i64)),
            ("inputs_received", Value::from(task.inputs.clone())),
        ])))
    }
}
