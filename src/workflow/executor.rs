//! Workflow executor: topological readiness with guard-gated edges.
//!
//! Execution is strictly serial: one node at a time, in FIFO discovery
//! order, even where the graph would permit independent branches to run
//! concurrently. A destination node is enqueued only once every one of its
//! declared predecessors has executed, which lets a non-taken branch be
//! skipped without deadlocking the other side of a fan-in.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::agent::make_agent;
use crate::core::value::{Context, Value};
use crate::error::{Error, Result};
use crate::guard;
use crate::tools::ToolRegistry;
use crate::workflow::model::{Edge, Node, Workflow};
use crate::{olog, olog_debug};

pub struct WorkflowExecutor {
    registry: Arc<ToolRegistry>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Run a compiled workflow to completion and return the subset of the
    /// final context named by the workflow's declared outputs.
    ///
    /// Runtime guard violations (precondition, node test, success criterion,
    /// failure condition) are fatal and abort with no partial output.
    pub fn run(&self, workflow: &Workflow, inputs: &Context, dry_run: bool) -> Result<Context> {
        olog!(
            "running workflow '{}' ({} nodes{})",
            workflow.name,
            workflow.nodes.len(),
            if dry_run { ", dry run" } else { "" }
        );

        // Seed context: literal bindings first so caller inputs win on collision.
        let mut context = Context::new();
        context.insert("none", Value::Null);
        context.insert("true", true);
        context.insert("false", false);
        context.extend(inputs);

        for expression in &workflow.preconditions {
            if !guard::evaluate(expression, &context) {
                return Err(Error::PreconditionFailed(expression.clone()));
            }
        }

        let mut out_edges: HashMap<&str, Vec<&Edge>> = HashMap::new();
        let mut in_edges: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &workflow.edges {
            out_edges.entry(edge.src.as_str()).or_default().push(edge);
            in_edges.entry(edge.dest.as_str()).or_default().push(edge);
        }
        let node_by_id: HashMap<&str, &Node> = workflow
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n))
            .collect();

        let mut executed: HashSet<&str> = HashSet::new();
        let mut ready: VecDeque<&Node> = workflow
            .nodes
            .iter()
            .filter(|n| !in_edges.contains_key(n.id.as_str()))
            .collect();

        while let Some(node) = ready.pop_front() {
            // A node can be enqueued through more than one taken edge.
            if executed.contains(node.id.as_str()) {
                continue;
            }

            olog_debug!("workflow '{}': executing node {}", workflow.name, node.id);
            let agent = make_agent(node, Arc::clone(&self.registry));
            let produced = if dry_run {
                agent.dry_run(&context)
            } else {
                agent.execute(&context)?
            };
            context.extend(&produced);

            for test in &node.tests {
                if !guard::evaluate(test, &context) {
                    return Err(Error::NodeTestFailed {
                        node: node.id.clone(),
                        expression: test.clone(),
                    });
                }
            }

            executed.insert(node.id.as_str());

            if let Some(edges) = out_edges.get(node.id.as_str()) {
                for edge in edges {
                    if !guard::evaluate(&edge.when, &context) {
                        olog_debug!("edge {} -> {} not taken", edge.src, edge.dest);
                        continue;
                    }
                    let Some(&dest) = node_by_id.get(edge.dest.as_str()) else {
                        continue;
                    };
                    let preds_done = in_edges
                        .get(dest.id.as_str())
                        .map(|incoming| incoming.iter().all(|e| executed.contains(e.src.as_str())))
                        .unwrap_or(true);
                    if preds_done {
                        ready.push_back(dest);
                    }
                }
            }
        }

        for expression in &workflow.success_criteria {
            if !guard::evaluate(expression, &context) {
                return Err(Error::SuccessCriteriaFailed(expression.clone()));
            }
        }
        for expression in &workflow.failure_conditions {
            if guard::evaluate(expression, &context) {
                return Err(Error::FailureConditionMet(expression.clone()));
            }
        }

        let mut outputs = Context::new();
        for key in &workflow.outputs {
            outputs.insert(key.clone(), context.get(key).cloned().unwrap_or(Value::Null));
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::compiler::compile;

    fn test_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        // Declares no parameters: receives whatever args the caller mapped.
        registry.register("test.double", &[], |args| {
            let n = args
                .iter()
                .next()
                .and_then(|(_, v)| v.as_i64())
                .unwrap_or(0);
            Ok(Value::from(Context::from([("result", n * 2)])))
        });
        registry.register("test.validate", &["value"], |args| {
            let n = args.get("value").and_then(Value::as_i64).unwrap_or(0);
            Ok(Value::from(Context::from([
                ("is_valid", Value::Bool(n > 0)),
                ("value", Value::Int(n)),
            ])))
        });
        registry.register("test.process_valid", &["value"], |args| {
            let v = args.get("value").cloned().unwrap_or(Value::Null);
            Ok(Value::from(Context::from([(
                "output",
                Value::from(format!("valid:{v}")),
            )])))
        });
        registry.register("test.process_invalid", &["value"], |args| {
            let v = args.get("value").cloned().unwrap_or(Value::Null);
            Ok(Value::from(Context::from([(
                "output",
                Value::from(format!("invalid:{v}")),
            )])))
        });
        Arc::new(registry)
    }

    const SIMPLE_WORKFLOW: &str = r#"
name: simple_workflow
inputs: [input_value]
outputs: [result]
preconditions: []
success_criteria: ["result != none"]
failure_conditions: []

nodes:
  - id: double_it
    type: tool
    params: { tool: "test.double" }
    io: { inputs: [input_value], outputs: [result] }
    tests: ["result != none"]

edges: []
"#;

    #[test]
    fn test_run_simple_workflow() {
        let workflow = compile(SIMPLE_WORKFLOW).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        let outputs = executor
            .run(&workflow, &Context::from([("input_value", 5)]), false)
            .unwrap();

        assert_eq!(outputs.get("result"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_run_dry_run_produces_placeholders() {
        let workflow = compile(SIMPLE_WORKFLOW).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        let outputs = executor
            .run(&workflow, &Context::from([("input_value", 5)]), true)
            .unwrap();

        let result = outputs.get("result").and_then(|v| v.as_str()).unwrap();
        assert!(result.contains("DRY"));
    }

    #[test]
    fn test_run_precondition_failure_is_fatal() {
        let yaml = r#"
name: precondition_test
inputs: [value]
outputs: [result]
preconditions: ["value > 0"]
success_criteria: []
failure_conditions: []

nodes:
  - id: process
    type: tool
    params: { tool: "test.double" }
    io: { inputs: [value], outputs: [result] }

edges: []
"#;
        let workflow = compile(yaml).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        let err = executor
            .run(&workflow, &Context::from([("value", -5)]), false)
            .unwrap_err();
        assert_eq!(err.to_string(), "Precondition failed: value > 0");
    }

    #[test]
    fn test_run_node_test_failure_names_node_and_expression() {
        let yaml = r#"
name: node_test_failure
inputs: [x]
outputs: [result]
preconditions: []
success_criteria: []
failure_conditions: []

nodes:
  - id: process
    type: tool
    params: { tool: "test.double" }
    io: { inputs: [x], outputs: [result] }
    tests: ["result > 10"]

edges: []
"#;
        let workflow = compile(yaml).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        // 3 * 2 = 6, not > 10
        let err = executor
            .run(&workflow, &Context::from([("x", 3)]), false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Test failed for node process: result > 10"
        );
    }

    #[test]
    fn test_run_branching_takes_one_side() {
        let yaml = r#"
name: branching_workflow
inputs: [value]
outputs: [output]
preconditions: []
success_criteria: []
failure_conditions: []

nodes:
  - id: validate
    type: tool
    params: { tool: "test.validate" }
    io: { inputs: [value], outputs: [is_valid, value] }

  - id: process_valid
    type: tool
    params: { tool: "test.process_valid" }
    io: { inputs: [value], outputs: [output] }

  - id: process_invalid
    type: tool
    params: { tool: "test.process_invalid" }
    io: { inputs: [value], outputs: [output] }

edges:
  - { from: validate, to: process_valid, when: "is_valid == true" }
  - { from: validate, to: process_invalid, when: "is_valid == false" }
"#;
        let workflow = compile(yaml).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        let outputs = executor
            .run(&workflow, &Context::from([("value", 5)]), false)
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&Value::from("valid:5")));

        let outputs = executor
            .run(&workflow, &Context::from([("value", -3)]), false)
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&Value::from("invalid:-3")));
    }

    #[test]
    fn test_run_failure_condition_is_fatal() {
        let yaml = r#"
name: failure_condition_test
inputs: [value]
outputs: [result]
preconditions: []
success_criteria: []
failure_conditions: ["result < 0"]

nodes:
  - id: process
    type: tool
    params: { tool: "test.double" }
    io: { inputs: [value], outputs: [result] }

edges: []
"#;
        let workflow = compile(yaml).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        let outputs = executor
            .run(&workflow, &Context::from([("value", 5)]), false)
            .unwrap();
        assert_eq!(outputs.get("result"), Some(&Value::Int(10)));

        let err = executor
            .run(&workflow, &Context::from([("value", -3)]), false)
            .unwrap_err();
        assert_eq!(err.to_string(), "Failure condition met: result < 0");
    }

    #[test]
    fn test_run_undeclared_output_is_null() {
        let yaml = r#"
name: missing_output
inputs: []
outputs: [never_produced]
preconditions: []
success_criteria: []
failure_conditions: []
nodes: []
edges: []
"#;
        let workflow = compile(yaml).unwrap();
        let executor = WorkflowExecutor::new(test_registry());

        let outputs = executor.run(&workflow, &Context::new(), false).unwrap();
        assert_eq!(outputs.get("never_produced"), Some(&Value::Null));
    }
}
