//! Declarative plan loader: drives the orchestrator from a high-level YAML
//! specification instead of string heuristics.
//!
//! A plan's `decision` node carries a guard list; the first guard whose
//! condition holds against the task's inputs selects an immediate return, a
//! hierarchical decomposition, or a choice among alternative sub-plans.
//! Plans with engine-style `nodes`/`edges` and no decision node map each
//! node to a sub-task in topological order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use serde::Deserialize;

use crate::core::task::{DecompositionResult, RecombinationPlan, Strategy, Task};
use crate::core::value::{Context, Value};
use crate::error::Result;
use crate::guard;
use crate::orchestrator::combine::{Combiner, ConcatCombiner, ResultCombiner};
use crate::orchestrator::decompose::{Decomposer, DecompositionRecord};

#[derive(Debug, Clone, Deserialize)]
pub struct PlanSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub combiner: Option<CombinerSpec>,
    /// Verification criteria attached to the root task.
    #[serde(default)]
    pub tests: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<PlanNode>,
    #[serde(default)]
    pub edges: Vec<PlanEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombinerSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub left_key: Option<String>,
    #[serde(default)]
    pub right_key: Option<String>,
    #[serde(default = "default_output_key")]
    pub output_key: String,
}

fn default_output_key() -> String {
    "result".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default = "default_node_kind")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub params: PlanParams,
    /// Input mapping: task input name -> literal or parent-input name.
    #[serde(default)]
    pub inputs: Option<BTreeMap<String, Value>>,
    /// Output mapping: parent context key -> child result key.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Engine-style io declaration (used without a decision node).
    #[serde(default)]
    pub io: Option<PlanIo>,
    #[serde(default)]
    pub tests: Vec<String>,
}

fn default_node_kind() -> String {
    "tool".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanIo {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanParams {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub behavior: Option<String>,
    #[serde(default)]
    pub guards: Vec<GuardSpec>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardSpec {
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default)]
    pub action: Option<ActionSpec>,
    #[serde(default)]
    pub decomposition: Option<DecompositionSpec>,
}

fn default_condition() -> String {
    "true".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecompositionSpec {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub recombination: Option<String>,
    #[serde(default)]
    pub plan: Vec<PlanNode>,
    #[serde(default)]
    pub alternatives: Vec<AlternativeSpec>,
}

fn default_strategy() -> String {
    "hierarchical".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlternativeSpec {
    #[serde(default)]
    pub plan: Vec<PlanNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanEdge {
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

/// A loaded plan, ready to wire into an orchestrator.
#[derive(Debug, Clone)]
pub struct Plan {
    spec: PlanSpec,
}

impl Plan {
    pub fn load(yaml_text: &str) -> Result<Self> {
        let spec: PlanSpec = serde_yaml::from_str(yaml_text)?;
        Ok(Self { spec })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(&std::fs::read_to_string(path)?)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Root task representing the whole plan invocation.
    pub fn root_task(&self) -> Task {
        Task::new(self.spec.name.clone(), self.spec.description.clone())
            .with_criteria(self.spec.tests.clone())
    }

    pub fn decomposer(&self) -> PlanDecomposer {
        PlanDecomposer::new(self.spec.clone())
    }

    /// Combiner instance selected by the plan's `combiner` spec.
    pub fn combiner(&self) -> Box<dyn Combiner> {
        match &self.spec.combiner {
            Some(spec) if spec.kind == "concatenate" => Box::new(ConcatCombiner::new(
                spec.left_key.clone(),
                spec.right_key.clone(),
                spec.output_key.clone(),
            )),
            _ => Box::new(ResultCombiner::new()),
        }
    }
}

/// Decomposer reading its decisions from a plan's decision node.
pub struct PlanDecomposer {
    spec: PlanSpec,
    decision: Option<PlanNode>,
    history: Vec<DecompositionRecord>,
}

impl PlanDecomposer {
    pub fn new(spec: PlanSpec) -> Self {
        let decision = spec.nodes.iter().find(|n| n.kind == "decision").cloned();
        Self {
            spec,
            decision,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[DecompositionRecord] {
        &self.history
    }

    /// Guard context: the task's inputs, plus a derived `<name>_len` binding
    /// for every list-valued input. The closed guard grammar has no function
    /// calls, so list lengths are exposed as data.
    fn guard_context(task: &Task) -> Context {
        let mut context = task.inputs.clone();
        for (key, value) in task.inputs.iter() {
            if let Value::List(items) = value {
                context.insert(format!("{key}_len"), items.len() as i64);
            }
        }
        context
    }

    fn decide(&self, task: &mut Task) -> DecompositionResult {
        let Some(decision) = &self.decision else {
            // Engine-style spec: map each node to a sub-task.
            if !self.spec.nodes.is_empty() {
                let sub_tasks = self.nodes_to_tasks(task);
                if !sub_tasks.is_empty() {
                    return DecompositionResult::with_sub_tasks(
                        sub_tasks,
                        Strategy::Hierarchical,
                        RecombinationPlan::Merge,
                        "Mapped engine-style nodes into orchestrator sub-tasks",
                    );
                }
            }
            return DecompositionResult::atomic("No decision node in plan");
        };

        let context = Self::guard_context(task);
        for guard_spec in &decision.params.guards {
            if !guard::evaluate(&guard_spec.condition, &context) {
                continue;
            }

            if let Some(action) = &guard_spec.action {
                if action.kind == "return" {
                    let mut resolved = Context::new();
                    for (key, value) in &action.outputs {
                        match value {
                            Value::Str(name) if context.contains(name) => resolved.insert(
                                key.clone(),
                                context.get(name).cloned().unwrap_or(Value::Null),
                            ),
                            other => resolved.insert(key.clone(), other.clone()),
                        }
                    }
                    task.result = Some(Value::from(resolved));
                    return DecompositionResult::atomic(format!(
                        "Return action for guard '{}'",
                        guard_spec.condition
                    ));
                }
            }

            if let Some(decomposition) = &guard_spec.decomposition {
                let plan = recombination_plan(decomposition.recombination.as_deref());
                if decomposition.strategy == "choice" {
                    let alternatives: Vec<Vec<Task>> = decomposition
                        .alternatives
                        .iter()
                        .map(|alt| self.plan_to_tasks(&alt.plan, task))
                        .collect();
                    if alternatives.iter().any(|alt| !alt.is_empty()) {
                        return DecompositionResult::choice(
                            alternatives,
                            plan,
                            "Choice decomposition from plan",
                        );
                    }
                } else {
                    let sub_tasks = self.plan_to_tasks(&decomposition.plan, task);
                    if !sub_tasks.is_empty() {
                        return DecompositionResult::with_sub_tasks(
                            sub_tasks,
                            Strategy::Hierarchical,
                            plan,
                            "Hierarchical decomposition from plan",
                        );
                    }
                }
            }
        }

        DecompositionResult::atomic("No guard matched")
    }

    /// Materialize plan nodes into tasks under a parent. Ids are prefixed
    /// with the parent id to keep them unique within the tree.
    fn plan_to_tasks(&self, plan_nodes: &[PlanNode], parent: &Task) -> Vec<Task> {
        plan_nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let local = node
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("node{}", i + 1));
                let id = format!("{}.{}", parent.id, local);
                let description = node
                    .params
                    .behavior
                    .clone()
                    .or_else(|| node.description.clone())
                    .unwrap_or_else(|| node.kind.clone());

                let mut inputs = Context::new();
                if let Some(declared) = &node.inputs {
                    for (dst, src) in declared {
                        match src {
                            // A name bound in the parent's inputs resolves at
                            // load time; anything else is kept verbatim (it
                            // may name a key of the running context later).
                            Value::Str(name) if parent.inputs.contains(name) => inputs.insert(
                                dst.clone(),
                                parent.inputs.get(name).cloned().unwrap_or(Value::Null),
                            ),
                            other => inputs.insert(dst.clone(), other.clone()),
                        }
                    }
                } else {
                    inputs = parent.inputs.clone();
                }

                let mut params = Context::new();
                if let Some(tool) = &node.params.tool {
                    params.insert("tool", tool.clone());
                }
                for (key, value) in &node.params.extra {
                    params.insert(key.clone(), value.clone());
                }

                let task = Task::new(id, description)
                    .with_inputs(inputs)
                    .with_params(params)
                    .with_criteria(node.tests.clone())
                    .with_outputs(node.outputs.clone())
                    .with_parent(parent.id.clone());

                // Workflow nodes are nested plans and stay decomposable.
                if node.kind == "workflow" {
                    task
                } else {
                    task.atomic()
                }
            })
            .collect()
    }

    /// Engine-style mapper: nodes become atomic sub-tasks in topological
    /// order, carrying io declarations and incoming-edge guards.
    fn nodes_to_tasks(&self, parent: &Task) -> Vec<Task> {
        let nodes = &self.spec.nodes;
        let id_of = |i: usize| {
            nodes[i]
                .id
                .clone()
                .unwrap_or_else(|| format!("node{}", i + 1))
        };

        let order: Vec<usize> = if self.spec.edges.is_empty() {
            (0..nodes.len()).collect()
        } else {
            let index: HashMap<String, usize> =
                (0..nodes.len()).map(|i| (id_of(i), i)).collect();
            let mut indegree = vec![0usize; nodes.len()];
            let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
            for edge in &self.spec.edges {
                if let (Some(&src), Some(&dest)) = (index.get(&edge.src), index.get(&edge.dest)) {
                    adjacency[src].push(dest);
                    indegree[dest] += 1;
                }
            }

            let mut queue: VecDeque<usize> =
                (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
            let mut order = Vec::with_capacity(nodes.len());
            while let Some(current) = queue.pop_front() {
                order.push(current);
                for &next in &adjacency[current] {
                    indegree[next] -= 1;
                    if indegree[next] == 0 {
                        queue.push_back(next);
                    }
                }
            }
            // Tolerate malformed edge declarations: append anything unvisited.
            for i in 0..nodes.len() {
                if !order.contains(&i) {
                    order.push(i);
                }
            }
            order
        };

        order
            .into_iter()
            .map(|i| {
                let node = &nodes[i];
                let local = id_of(i);
                let description = node
                    .description
                    .clone()
                    .or_else(|| node.params.behavior.clone())
                    .unwrap_or_else(|| node.kind.clone());
                let io = node.io.clone().unwrap_or_default();

                let mut inputs = Context::new();
                for name in &io.inputs {
                    inputs.insert(
                        name.clone(),
                        parent.inputs.get(name).cloned().unwrap_or(Value::Null),
                    );
                }

                let mut params = Context::new();
                if let Some(tool) = &node.params.tool {
                    params.insert("tool", tool.clone());
                }
                for (key, value) in &node.params.extra {
                    params.insert(key.clone(), value.clone());
                }

                let outputs: BTreeMap<String, String> = io
                    .outputs
                    .iter()
                    .map(|name| (name.clone(), name.clone()))
                    .collect();

                let mut task = Task::new(format!("{}.{}", parent.id, local), description)
                    .atomic()
                    .with_inputs(inputs)
                    .with_params(params)
                    .with_criteria(node.tests.clone())
                    .with_outputs(outputs)
                    .with_parent(parent.id.clone());
                task.guards = self
                    .spec
                    .edges
                    .iter()
                    .filter(|e| e.dest == local)
                    .map(|e| e.when.clone())
                    .collect();
                task
            })
            .collect()
    }
}

fn recombination_plan(name: Option<&str>) -> RecombinationPlan {
    match name {
        Some("chain") => RecombinationPlan::Chain,
        Some("direct") => RecombinationPlan::Direct,
        _ => RecombinationPlan::Merge,
    }
}

impl Decomposer for PlanDecomposer {
    fn decompose(&mut self, task: &mut Task, depth: usize) -> Result<DecompositionResult> {
        let result = self.decide(task);
        self.history.push(DecompositionRecord {
            task_id: task.id.clone(),
            depth,
            strategy: result.strategy,
            sub_task_count: result.sub_tasks.len(),
            reasoning: result.reasoning.clone(),
        });
        Ok(result)
    }
}
