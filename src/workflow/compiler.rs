//! Workflow compiler: parse, validate, reject malformed or cyclic graphs.
//!
//! Schema and structural errors are compile-time and fatal; a workflow that
//! compiles is guaranteed to reference only known nodes and to be acyclic.

use std::collections::HashMap;
use std::collections::VecDeque;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{Error, Result};
use crate::olog_debug;
use crate::workflow::model::Workflow;

/// Top-level fields every workflow document must declare.
const REQUIRED_FIELDS: [&str; 6] = [
    "name",
    "inputs",
    "nodes",
    "edges",
    "success_criteria",
    "failure_conditions",
];

/// Compile a workflow from its declarative YAML text.
pub fn compile(yaml_text: &str) -> Result<Workflow> {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml_text)?;
    let mapping = raw
        .as_mapping()
        .ok_or_else(|| Error::Validation("workflow document must be a mapping".to_string()))?;

    for field in REQUIRED_FIELDS {
        if !mapping.iter().any(|(key, _)| key.as_str() == Some(field)) {
            return Err(Error::MissingField(field.to_string()));
        }
    }

    let workflow: Workflow = serde_yaml::from_value(raw)?;
    validate(&workflow)?;
    olog_debug!(
        "compiled workflow '{}': {} nodes, {} edges",
        workflow.name,
        workflow.nodes.len(),
        workflow.edges.len()
    );
    Ok(workflow)
}

/// Structural validation: edges must reference known nodes and the induced
/// graph must be acyclic (Kahn in-degree reduction: if fewer nodes are
/// dequeued than exist, the remainder lie on a cycle).
fn validate(workflow: &Workflow) -> Result<()> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in &workflow.nodes {
        index.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }

    for edge in &workflow.edges {
        let (Some(&src), Some(&dest)) = (
            index.get(edge.src.as_str()),
            index.get(edge.dest.as_str()),
        ) else {
            return Err(Error::UnknownEdgeNode {
                src: edge.src.clone(),
                dest: edge.dest.clone(),
            });
        };
        graph.add_edge(src, dest, ());
    }

    let mut indegree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| (idx, graph.edges_directed(idx, Direction::Incoming).count()))
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|idx| indegree[idx] == 0)
        .collect();

    let mut visited = 0usize;
    while let Some(idx) = queue.pop_front() {
        visited += 1;
        for succ in graph.neighbors_directed(idx, Direction::Outgoing) {
            if let Some(deg) = indegree.get_mut(&succ) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(succ);
                }
            }
        }
    }

    if visited != graph.node_count() {
        return Err(Error::CycleDetected);
    }
    Ok(())
}
