//! Task tree model for recursive orchestration.
//!
//! A `Task` is a unit of work at some level of decomposition. Composite
//! tasks own their sub-tasks exclusively, forming a tree; `parent_id` is a
//! back-reference for reporting, not ownership. Tasks are mutated in place
//! only by the orchestrator as they move through their lifecycle.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::value::{Context, Value};
use crate::error::{Error, Result};

/// Task status in its lifecycle.
///
/// `pending -> executing -> {completed, failed}`, with `verified` reached
/// when the verifier accepts a completed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
    Verified,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Executing => write!(f, "executing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Verified => write!(f, "verified"),
        }
    }
}

/// How a composite task's sub-tasks relate to each other.
///
/// Sequential, parallel, and hierarchical are AND-combinations: every
/// sub-task must verify. Choice is an ordered OR: alternatives are tried in
/// order and the first fully-verified one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    None,
    Sequential,
    Parallel,
    Hierarchical,
    Choice,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::None => write!(f, "none"),
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Parallel => write!(f, "parallel"),
            Strategy::Hierarchical => write!(f, "hierarchical"),
            Strategy::Choice => write!(f, "choice"),
        }
    }
}

/// Rule for merging sub-task results into a parent result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RecombinationPlan {
    /// Return the first (usually only) sub-result.
    #[default]
    Direct,
    /// Sequential chain: the last sub-result wins.
    Chain,
    /// Aggregate all sub-results into one record.
    Merge,
    /// Search sub-results for two named lists and concatenate them,
    /// preferring any sub-result that already exposes `output_key`.
    Concatenate {
        left_key: Option<String>,
        right_key: Option<String>,
        output_key: String,
    },
}

impl std::fmt::Display for RecombinationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecombinationPlan::Direct => write!(f, "direct"),
            RecombinationPlan::Chain => write!(f, "chain"),
            RecombinationPlan::Merge => write!(f, "merge"),
            RecombinationPlan::Concatenate { output_key, .. } => {
                write!(f, "concatenate -> {}", output_key)
            }
        }
    }
}

/// A unit of work at some level of decomposition, atomic or composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier, unique within one task tree.
    pub id: String,
    /// What the task should accomplish.
    pub description: String,
    /// Name -> value slice of context this task starts from. A string value
    /// naming a key of the running context is resolved by the orchestrator
    /// before the task is solved.
    #[serde(default)]
    pub inputs: Context,
    /// Adapter-specific configuration (e.g. the `tool` to invoke).
    #[serde(default)]
    pub params: Context,
    /// True if the task is directly executable and never decomposed.
    #[serde(default)]
    pub is_atomic: bool,
    /// Criterion strings checked by the verifier.
    #[serde(default)]
    pub verification_criteria: Vec<String>,
    /// Back-reference to the owning task, not ownership.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Declared output mapping: parent context key -> child result key.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Guard expressions attached by a declarative loader; the task is
    /// skipped when none of them hold against the running context.
    #[serde(default)]
    pub guards: Vec<String>,

    // Execution state
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub sub_tasks: Vec<Task>,
    #[serde(default)]
    pub execution_time: Duration,
    #[serde(default)]
    pub verification_log: Vec<String>,
}

impl Task {
    /// Create a pending task with the given id and description.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            inputs: Context::new(),
            params: Context::new(),
            is_atomic: false,
            verification_criteria: Vec::new(),
            parent_id: None,
            outputs: BTreeMap::new(),
            guards: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            sub_tasks: Vec::new(),
            execution_time: Duration::ZERO,
            verification_log: Vec::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Context) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_params(mut self, params: Context) -> Self {
        self.params = params;
        self
    }

    pub fn atomic(mut self) -> Self {
        self.is_atomic = true;
        self
    }

    pub fn with_criteria(mut self, criteria: Vec<String>) -> Self {
        self.verification_criteria = criteria;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_outputs(mut self, outputs: BTreeMap<String, String>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Begin executing the task.
    pub fn start(&mut self) {
        self.status = TaskStatus::Executing;
    }

    /// Record a successful execution result.
    pub fn complete(&mut self, result: Value) {
        self.result = Some(result);
        self.status = TaskStatus::Completed;
    }

    /// Mark the task as failed.
    pub fn fail(&mut self) {
        self.status = TaskStatus::Failed;
    }

    /// Promote a completed task to verified.
    pub fn mark_verified(&mut self) {
        self.status = TaskStatus::Verified;
    }

    /// Check if the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Verified
        )
    }
}

/// Result of decomposing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    /// Sub-tasks to solve, empty for atomic / choice / return decisions.
    pub sub_tasks: Vec<Task>,
    pub strategy: Strategy,
    pub plan: RecombinationPlan,
    /// Diagnostic text only; never drives behavior.
    pub reasoning: String,
    /// Alternative sub-plans, populated only for the choice strategy.
    pub alternatives: Vec<Vec<Task>>,
}

impl DecompositionResult {
    /// No decomposition: the task is treated as atomic.
    pub fn atomic(reasoning: impl Into<String>) -> Self {
        Self {
            sub_tasks: Vec::new(),
            strategy: Strategy::None,
            plan: RecombinationPlan::Direct,
            reasoning: reasoning.into(),
            alternatives: Vec::new(),
        }
    }

    /// Decomposition into an ordered list of sub-tasks.
    pub fn with_sub_tasks(
        sub_tasks: Vec<Task>,
        strategy: Strategy,
        plan: RecombinationPlan,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            sub_tasks,
            strategy,
            plan,
            reasoning: reasoning.into(),
            alternatives: Vec::new(),
        }
    }

    /// Ordered-fallback decomposition among alternative sub-plans.
    pub fn choice(
        alternatives: Vec<Vec<Task>>,
        plan: RecombinationPlan,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            sub_tasks: Vec::new(),
            strategy: Strategy::Choice,
            plan,
            reasoning: reasoning.into(),
            alternatives,
        }
    }

    /// Check the structural invariants:
    /// alternatives are non-empty iff the strategy is choice, and
    /// sub_tasks are empty iff the strategy is none or choice.
    pub fn validate(&self) -> Result<()> {
        let has_alternatives = !self.alternatives.is_empty();
        if has_alternatives != (self.strategy == Strategy::Choice) {
            return Err(Error::Validation(format!(
                "alternatives present: {}, but strategy is {}",
                has_alternatives, self.strategy
            )));
        }
        let expects_empty = matches!(self.strategy, Strategy::None | Strategy::Choice);
        if expects_empty != self.sub_tasks.is_empty() {
            return Err(Error::Validation(format!(
                "strategy {} with {} sub-tasks",
                self.strategy,
                self.sub_tasks.len()
            )));
        }
        Ok(())
    }
}
