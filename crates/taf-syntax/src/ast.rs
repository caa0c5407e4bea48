use crate::error::Position;
use serde::Serialize;

/// A validated test script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    pub issue: Issue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markers: Option<Markers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Hooks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Hooks>,
    pub steps: Vec<Step>,
    pub position: Position,
}

impl Script {
    /// Finds a top-level step by identifier.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Every step in execution order: script hooks, then steps, each step
    /// preceded by its own before-hooks and followed by its after-hooks.
    pub fn all_steps(&self) -> Vec<&Step> {
        let mut out = Vec::new();
        let before = self.before.iter().flat_map(|h| h.steps.iter());
        let after = self.after.iter().flat_map(|h| h.steps.iter());

        for step in before.chain(self.steps.iter()).chain(after) {
            step.collect_into(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Markers {
    pub names: Vec<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hooks {
    pub steps: Vec<Step>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_env: Option<SkipEnv>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Skip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markers: Option<Markers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaky: Option<Flaky>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameterize: Option<Parameterize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Hooks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Hooks>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub uses: Option<Use>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Vec<Param>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<Param>>,
    pub position: Position,
}

impl Step {
    pub fn new(id: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            skip_env: None,
            skip: None,
            markers: None,
            flaky: None,
            parameterize: None,
            before: None,
            after: None,
            uses: None,
            input: None,
            output: None,
            position,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a Step>) {
        for hook in self.before.iter().flat_map(|h| h.steps.iter()) {
            hook.collect_into(out);
        }
        out.push(self);
        for hook in self.after.iter().flat_map(|h| h.steps.iter()) {
            hook.collect_into(out);
        }
    }
}

/// Skip the step when the named environment is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipEnv {
    pub env: String,
    pub position: Position,
}

/// Unconditional skip, with an optional reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skip {
    pub reason: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flaky {
    pub retries: u32,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterizeMode {
    Parameterize,
    Foreach,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameterize {
    pub mode: ParameterizeMode,
    pub payload: Param,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Use {
    pub call: String,
    pub position: Position,
}

/// An opaque user payload, kept exactly as written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub object: serde_json::Value,
    pub position: Position,
}
