//! Export a compiled workflow as visualization JSON (n8n document shape).
//!
//! Every node becomes a pass-through function node laid out in a vertical
//! column, with a manual trigger wired to the entry nodes. Edge guards are
//! not represented; this is for eyeballing the graph, not for execution.

use serde_json::{json, Map, Value as JsonValue};

use crate::workflow::model::Workflow;

pub fn to_visualization_json(workflow: &Workflow) -> JsonValue {
    let mut nodes = Vec::new();
    nodes.push(json!({
        "id": "1",
        "name": "Manual Trigger",
        "type": "n8n-nodes-base.manualTrigger",
        "typeVersion": 1,
        "position": [200, 200],
        "parameters": {}
    }));

    // Simple layout: one vertical column.
    let x = 400;
    let mut y = 200;
    let mut counter = 2;
    for node in &workflow.nodes {
        let mut exported = json!({
            "id": counter.to_string(),
            "name": node.id,
            "type": "n8n-nodes-base.function",
            "typeVersion": 1,
            "position": [x, y],
            "parameters": { "functionCode": "return items;" }
        });
        if !node.summary.is_empty() {
            exported["notesInFlow"] = json!(true);
            exported["notes"] = json!(node.summary);
        }
        nodes.push(exported);
        counter += 1;
        y += 150;
    }

    let mut connections = Map::new();

    let entry_ids: Vec<&str> = workflow
        .entry_nodes()
        .into_iter()
        .map(|n| n.id.as_str())
        .collect();
    if !entry_ids.is_empty() {
        let targets: Vec<JsonValue> = entry_ids
            .iter()
            .map(|id| json!({ "node": id, "type": "main", "index": 0 }))
            .collect();
        connections.insert("Manual Trigger".to_string(), json!({ "main": [targets] }));
    }

    for edge in &workflow.edges {
        let entry = connections
            .entry(edge.src.clone())
            .or_insert_with(|| json!({ "main": [[]] }));
        if let Some(targets) = entry["main"][0].as_array_mut() {
            targets.push(json!({ "node": edge.dest, "type": "main", "index": 0 }));
        }
    }

    json!({
        "name": workflow.name,
        "nodes": nodes,
        "connections": connections,
        "active": false,
        "settings": {}
    })
}
