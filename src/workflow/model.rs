//! Compiled workflow model.
//!
//! A `Workflow` is the immutable result of compiling a declarative node/edge
//! specification. It is built once by the compiler and never mutated by the
//! executor; all run state lives in the execution context.

use serde::{Deserialize, Serialize};

use crate::core::value::Context;

/// Recognized node types, each mapping to an agent capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Invoke a registered tool with mapped inputs.
    Tool,
    /// Branch on a parameter.
    Router,
    /// Produce a boolean approval outcome.
    Approval,
    /// Compile and run a nested workflow, merging its outputs back.
    WorkflowCall,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Tool => write!(f, "tool"),
            NodeKind::Router => write!(f, "router"),
            NodeKind::Approval => write!(f, "approval"),
            NodeKind::WorkflowCall => write!(f, "workflow_call"),
        }
    }
}

/// Declared input/output names of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeIo {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// One schedulable step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub params: Context,
    #[serde(default)]
    pub io: NodeIo,
    /// Guard expressions checked against the context right after this node
    /// runs; any false test aborts the whole run.
    #[serde(default)]
    pub tests: Vec<String>,
}

/// A directed edge between two nodes, gated by a guard expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "from")]
    pub src: String,
    #[serde(rename = "to")]
    pub dest: String,
    #[serde(default = "default_when")]
    pub when: String,
}

fn default_when() -> String {
    "true".to_string()
}

/// A compiled, immutable node/edge specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Guards over the seed context; any false precondition aborts the run.
    #[serde(default)]
    pub preconditions: Vec<String>,
    /// Guards over the final context; all must hold.
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Guards over the final context; none may hold.
    #[serde(default)]
    pub failure_conditions: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes with no incoming edges, in declaration order.
    pub fn entry_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| !self.edges.iter().any(|e| e.dest == n.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_display() {
        assert_eq!(format!("{}", NodeKind::Tool), "tool");
        assert_eq!(format!("{}", NodeKind::Router), "router");
        assert_eq!(format!("{}", NodeKind::Approval), "approval");
        assert_eq!(format!("{}", NodeKind::WorkflowCall), "workflow_call");
    }

    #[test]
    fn test_node_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&NodeKind::WorkflowCall).unwrap(),
            r#""workflow_call""#
        );
        let parsed: NodeKind = serde_json::from_str(r#""tool""#).unwrap();
        assert_eq!(parsed, NodeKind::Tool);
    }

    #[test]
    fn test_edge_when_defaults_to_true() {
        let edge: Edge = serde_yaml::from_str("{ from: a, to: b }").unwrap();
        assert_eq!(edge.src, "a");
        assert_eq!(edge.dest, "b");
        assert_eq!(edge.when, "true");
    }

    #[test]
    fn test_node_deserialization() {
        let yaml = r#"
id: double_it
type: tool
summary: Doubles the input
params: { tool: "test.double" }
io: { inputs: [x], outputs: [result] }
tests: ["result != none"]
"#;
        let node: Node = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(node.id, "double_it");
        assert_eq!(node.kind, NodeKind::Tool);
        assert_eq!(node.summary, "Doubles the input");
        assert_eq!(node.io.inputs, vec!["x".to_string()]);
        assert_eq!(node.io.outputs, vec!["result".to_string()]);
        assert_eq!(node.tests, vec!["result != none".to_string()]);
    }

    #[test]
    fn test_entry_nodes() {
        let workflow = Workflow {
            name: "wf".to_string(),
            description: String::new(),
            preconditions: vec![],
            success_criteria: vec![],
            failure_conditions: vec![],
            inputs: vec![],
            outputs: vec![],
            nodes: vec![
                Node {
                    id: "a".to_string(),
                    kind: NodeKind::Tool,
                    summary: String::new(),
                    params: Context::new(),
                    io: NodeIo::default(),
                    tests: vec![],
                },
                Node {
                    id: "b".to_string(),
                    kind: NodeKind::Tool,
                    summary: String::new(),
                    params: Context::new(),
                    io: NodeIo::default(),
                    tests: vec![],
                },
            ],
            edges: vec![Edge {
                src: "a".to_string(),
                dest: "b".to_string(),
                when: "true".to_string(),
            }],
        };

        let entries = workflow.entry_nodes();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "a");
        assert!(workflow.node("b").is_some());
        assert!(workflow.node("zz").is_none());
    }
}
