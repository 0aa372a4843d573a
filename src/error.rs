use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Missing required top-level field: {0}")]
    MissingField(String),

    #[error("Edge references unknown node: {src} -> {dest}")]
    UnknownEdgeNode { src: String, dest: String },

    #[error("Cycle detected in workflow DAG")]
    CycleDetected,

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Test failed for node {node}: {expression}")]
    NodeTestFailed { node: String, expression: String },

    #[error("Success criteria failed: {0}")]
    SuccessCriteriaFailed(String),

    #[error("Failure condition met: {0}")]
    FailureConditionMet(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool {tool} missing required parameter: {param}")]
    MissingParameter { tool: String, param: String },

    #[error("Node {0} is missing the 'tool' parameter")]
    MissingToolParameter(String),

    #[error("Workflow file not found: {0}")]
    WorkflowFileNotFound(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
