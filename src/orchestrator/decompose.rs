//! Decomposer: breaks a task into simpler, verifiable sub-tasks.

use serde::Serialize;

use crate::core::task::{DecompositionResult, RecombinationPlan, Strategy, Task};
use crate::core::value::Context;
use crate::error::Result;

/// Capability interface: decide how (or whether) a task decomposes.
///
/// Decomposers may mutate the task directly, e.g. to pre-populate
/// `task.result` for an immediate-return decision.
pub trait Decomposer {
    fn decompose(&mut self, task: &mut Task, depth: usize) -> Result<DecompositionResult>;
}

/// One decomposition decision, kept for later inspection.
#[derive(Debug, Clone, Serialize)]
pub struct DecompositionRecord {
    pub task_id: String,
    pub depth: usize,
    pub strategy: Strategy,
    pub sub_task_count: usize,
    pub reasoning: String,
}

/// Single-action verbs that mark a description as simple enough to execute
/// without further decomposition.
const SIMPLE_ACTION_VERBS: [&str; 7] = [
    "calculate", "fetch", "validate", "check", "send", "get", "set",
];

/// Rule-based reference decomposer driven by description heuristics.
///
/// Splits on the literal `" and "` separator into one atomic sub-task per
/// segment, or on `" then "` with only the first segment inheriting the
/// parent's inputs (later segments are filled by context propagation).
pub struct RuleBasedDecomposer {
    history: Vec<DecompositionRecord>,
}

impl RuleBasedDecomposer {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
        }
    }

    /// Every decomposition decision made so far.
    pub fn history(&self) -> &[DecompositionRecord] {
        &self.history
    }

    fn is_simple_enough(&self, task: &Task) -> bool {
        if task.is_atomic {
            return true;
        }
        let desc = task.description.to_lowercase();
        SIMPLE_ACTION_VERBS.iter().any(|verb| desc.contains(verb)) && !desc.contains(" and ")
    }

    fn heuristic_decompose(&self, task: &Task) -> Vec<Task> {
        let desc = task.description.to_lowercase();

        if desc.contains(" and ") {
            // Conjunction: every segment shares the parent's inputs.
            task.description
                .split(" and ")
                .enumerate()
                .map(|(i, part)| {
                    Task::new(format!("{}.{}", task.id, i + 1), part.trim())
                        .atomic()
                        .with_inputs(task.inputs.clone())
                        .with_parent(task.id.clone())
                })
                .collect()
        } else if desc.contains(" then ") {
            // Sequence: only the first segment starts with the parent's inputs.
            task.description
                .split(" then ")
                .enumerate()
                .map(|(i, part)| {
                    let inputs = if i == 0 {
                        task.inputs.clone()
                    } else {
                        Context::new()
                    };
                    Task::new(format!("{}.{}", task.id, i + 1), part.trim())
                        .atomic()
                        .with_inputs(inputs)
                        .with_parent(task.id.clone())
                })
                .collect()
        } else {
            Vec::new()
        }
    }
}

impl Default for RuleBasedDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

/// Recombination plan chosen by strategy.
pub fn plan_for(strategy: Strategy) -> RecombinationPlan {
    match strategy {
        Strategy::Sequential => RecombinationPlan::Chain,
        Strategy::Parallel => RecombinationPlan::Merge,
        _ => RecombinationPlan::Direct,
    }
}

impl Decomposer for RuleBasedDecomposer {
    fn decompose(&mut self, task: &mut Task, depth: usize) -> Result<DecompositionResult> {
        let result = if self.is_simple_enough(task) {
            DecompositionResult::atomic("Task is already atomic")
        } else {
            let sub_tasks = self.heuristic_decompose(task);
            if sub_tasks.is_empty() {
                DecompositionResult::atomic("No decomposition heuristic applied")
            } else {
                let strategy = Strategy::Sequential;
                let reasoning = format!(
                    "Decomposed into {} sub-tasks using {} strategy",
                    sub_tasks.len(),
                    strategy
                );
                DecompositionResult::with_sub_tasks(
                    sub_tasks,
                    strategy,
                    plan_for(strategy),
                    reasoning,
                )
            }
        };

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
