//! Stubbed LLM client for the spec-to-workflow pipeline.
//!
//! The pipeline is: human spec (free text) -> intermediate spec (structured
//! summary) -> workflow YAML. This client produces deterministic,
//! template-based output so the rest of the system can be exercised without
//! a provider; swap `generate` for a real backend to make it live.

use serde::Serialize;

/// What the client is being asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationTask {
    IntermediateSpec,
    YamlGeneration,
}

/// A drafted workflow plus generator warnings.
#[derive(Debug, Clone, Serialize)]
pub struct Draft {
    pub yaml_text: String,
    pub warnings: Vec<String>,
}

pub struct LlmClient {
    pub model: String,
    pub temperature: f64,
}

impl LlmClient {
    /// Deterministic stand-in client.
    pub fn stub() -> Self {
        Self {
            model: "stubbed-llm".to_string(),
            temperature: 0.0,
        }
    }

    /// Template-based generation. This is NOT a real LLM call.
    pub fn generate(&self, task: GenerationTask, input: &str) -> String {
        match task {
            GenerationTask::IntermediateSpec => {
                let mut out = String::from("# Intermediate spec\n\n");
                for fragment in fragments(input) {
                    out.push_str(&format!("- {}\n", fragment));
                }
                out
            }
            GenerationTask::YamlGeneration => draft_yaml(input),
        }
    }

    /// Draft a skeletal workflow from free-form spec text.
    pub fn draft_workflow(&self, spec_text: &str) -> Draft {
        let yaml_text = self.generate(GenerationTask::YamlGeneration, spec_text);
        Draft {
            yaml_text,
            warnings: vec![
                "tool names are placeholders; register real tools before running".to_string(),
                "io declarations were inferred; review inputs and outputs".to_string(),
            ],
        }
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::stub()
    }
}

/// Sentence-ish fragments of the spec text, at most five.
fn fragments(text: &str) -> Vec<String> {
    text.split(['.', ';'])
        .flat_map(|part| part.split(" then "))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .take(5)
        .map(String::from)
        .collect()
}

fn slug(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let mut out = String::new();
    for piece in cleaned.split('_').filter(|p| !p.is_empty()).take(4) {
        if !out.is_empty() {
            out.push('_');
        }
        out.push_str(piece);
    }
    if out.is_empty() {
        "drafted_workflow".to_string()
    } else {
        out
    }
}

fn draft_yaml(spec_text: &str) -> String {
    let steps = fragments(spec_text);
    let name = slug(spec_text);

    let mut yaml = String::new();
    yaml.push_str(&format!("name: {}\n", name));
    yaml.push_str("description: Drafted from a human spec; review before use\n");
    yaml.push_str("inputs: []\n");
    yaml.push_str("outputs: []\n");
    yaml.push_str("preconditions: []\n");
    yaml.push_str("success_criteria: []\n");
    yaml.push_str("failure_conditions: []\n");

    if steps.is_empty() {
        yaml.push_str("nodes: []\nedges: []\n");
        return yaml;
    }

    yaml.push_str("\nnodes:\n");
    for (i, step) in steps.iter().enumerate() {
        yaml.push_str(&format!("  - id: step{}\n", i + 1));
        yaml.push_str("    type: tool\n");
        yaml.push_str(&format!("    summary: \"{}\"\n", step.replace('"', "'")));
        yaml.push_str(&format!(
            "    params: {{ tool: \"todo.{}\" }}\n",
            slug(step)
        ));
        yaml.push_str("    io: { inputs: [], outputs: [] }\n");
        yaml.push_str("    tests: []\n");
    }

    yaml.push_str("\nedges:\n");
    if steps.len() == 1 {
        yaml.push_str("  []\n");
    } else {
        for i in 1..steps.len() {
            yaml.push_str(&format!(
                "  - {{ from: step{}, to: step{} }}\n",
                i,
                i + 1
            ));
        }
    }
    yaml
}
