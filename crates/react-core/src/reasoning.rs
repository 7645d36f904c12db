//! Reasoning Data Model
//!
//! What the model is asked for each turn ([`PromptData`]), what it answers
//! ([`Reasoning`]), and the history the loop accumulates ([`ThoughtIteration`]).
//! [`ReasoningValidator`] is the layer that refuses structurally invalid answers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::predictor::Predictor;
use crate::tool::{normalize_tool_name, ToolRegistry, ToolSchema};

/// One reasoning step from the model
///
/// A validated step carries exactly one of `action` or `final_answer`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Reasoning<T> {
    /// The model's explanation of what it is doing
    #[serde(default)]
    pub thought: String,

    /// Tool to invoke
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Raw input handed to the tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// The answer to the goal; ends the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<T>,
}

impl<T> Reasoning<T> {
    /// A step that invokes a tool
    pub fn act(
        thought: impl Into<String>,
        action: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: Some(action.into()),
            input: Some(input.into()),
            final_answer: None,
        }
    }

    /// A step that answers the goal
    pub fn answer(thought: impl Into<String>, final_answer: T) -> Self {
        Self {
            thought: thought.into(),
            action: None,
            input: None,
            final_answer: Some(final_answer),
        }
    }
}

impl<T> Default for Reasoning<T> {
    fn default() -> Self {
        Self {
            thought: String::new(),
            action: None,
            input: None,
            final_answer: None,
        }
    }
}

/// A reasoning step together with what came of it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ThoughtIteration<T> {
    #[serde(flatten)]
    pub reasoning: Reasoning<T>,

    /// Tool output, or `ERROR: ...` when the step failed
    #[serde(default)]
    pub observation: String,
}

impl<T> ThoughtIteration<T> {
    pub fn new(reasoning: Reasoning<T>, observation: impl Into<String>) -> Self {
        Self {
            reasoning,
            observation: observation.into(),
        }
    }
}

/// Everything the prompt needs for one turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptData<T> {
    pub goal: String,
    pub tools: Vec<ToolSchema>,
    pub iterations: Vec<ThoughtIteration<T>>,
}

// ============================================================================
// Structural validation
// ============================================================================

/// Rejects reasoning that is missing a thought, sets both or neither of
/// `action`/`final_answer`, or names a tool that is not registered.
///
/// Accepted actions are rewritten to their normalized tool name.
pub struct ReasoningValidator<P> {
    inner: P,
    registry: Arc<ToolRegistry>,
}

impl<P> ReasoningValidator<P> {
    pub fn new(inner: P, registry: Arc<ToolRegistry>) -> Self {
        Self { inner, registry }
    }
}

#[async_trait]
impl<T, P> Predictor<PromptData<T>, Reasoning<T>> for ReasoningValidator<P>
where
    T: Send + Sync,
    P: Predictor<PromptData<T>, Reasoning<T>>,
{
    async fn predict(&self, ctx: &Context, req: &PromptData<T>) -> Result<Reasoning<T>> {
        let reasoning = self.inner.predict(ctx, req).await?;
        validate(reasoning, &self.registry)
    }
}

/// Check one reasoning step against the rules above
pub fn validate<T>(mut reasoning: Reasoning<T>, registry: &ToolRegistry) -> Result<Reasoning<T>> {
    if reasoning.thought.is_empty() {
        return Err(AgentError::Parse("missing thought".into()));
    }

    // "action": "" is how models usually say "no action"
    reasoning.action = reasoning.action.filter(|a| !a.is_empty());

    let action = match (reasoning.action.take(), reasoning.final_answer.is_some()) {
        (None, false) => {
            return Err(AgentError::Parse(
                "either action or final_answer must be set".into(),
            ));
        }
        (Some(_), true) => {
            return Err(AgentError::Parse("both action and final_answer are set".into()));
        }
        (None, true) => return Ok(reasoning),
        (Some(action), false) => normalize_tool_name(&action),
    };

    if !registry.contains(&action) {
        return Err(AgentError::InvalidTool {
            action,
            thought: reasoning.thought,
            input: reasoning.input,
        });
    }

    reasoning.action = Some(action);
    Ok(reasoning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePredictor;
    use crate::tool::{FnTool, Tool};

    fn registry() -> Arc<ToolRegistry> {
        let tool: Arc<dyn Tool> = Arc::new(FnTool::new(
            ToolSchema::new("Foo_ TOOL", "does foo"),
            |_, input| async move { Ok(input) },
        ));
        Arc::new(ToolRegistry::new([tool]).unwrap())
    }

    #[test]
    fn test_reasoning_wire_format() {
        let r: Reasoning<String> =
            serde_json::from_str(r#"{"thought": "t", "action": "a", "input": "i"}"#).unwrap();
        assert_eq!(r, Reasoning::act("t", "a", "i"));

        let json = serde_json::to_string(&Reasoning::answer("t", 7)).unwrap();
        assert_eq!(json, r#"{"thought":"t","final_answer":7}"#);
    }

    #[test]
    fn test_thought_iteration_is_flat() {
        let it = ThoughtIteration::new(Reasoning::<String>::act("t", "a", "x"), "seen");
        let json = serde_json::to_string(&it).unwrap();
        assert_eq!(json, r#"{"thought":"t","action":"a","input":"x","observation":"seen"}"#);

        let back: ThoughtIteration<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, it);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Verdict {
        value: i32,
    }

    #[test]
    fn test_answer_type_needs_no_default() {
        let r: Reasoning<Verdict> =
            serde_json::from_str(r#"{"thought": "t", "final_answer": {"value": 3}}"#).unwrap();
        assert_eq!(r, Reasoning::answer("t", Verdict { value: 3 }));

        let it: ThoughtIteration<Verdict> =
            serde_json::from_str(r#"{"thought": "t", "action": "a", "observation": "o"}"#).unwrap();
        assert_eq!(it.reasoning.action.as_deref(), Some("a"));
        assert_eq!(it.reasoning.final_answer, None);
        assert_eq!(it.observation, "o");
    }

    #[test]
    fn test_whitespace_thought_is_kept() {
        let r = Reasoning::answer(" ", "a".to_string());
        assert_eq!(validate(r.clone(), &registry()).unwrap(), r);
    }

    #[test]
    fn test_valid_reasoning_passes_with_normalized_action() {
        let out = validate(Reasoning::<String>::act("t", "FOO tool", "x"), &registry()).unwrap();
        assert_eq!(out.action.as_deref(), Some("foo-tool"));
        assert_eq!(out.input.as_deref(), Some("x"));
        assert_eq!(out.thought, "t");

        let answer = Reasoning::answer("t", "done".to_string());
        assert_eq!(validate(answer.clone(), &registry()).unwrap(), answer);
    }

    #[test]
    fn test_structural_failures_are_parse_errors() {
        let reg = registry();
        let cases: Vec<Reasoning<String>> = vec![
            Reasoning {
                thought: String::new(),
                ..Reasoning::answer("", "x".to_string())
            },
            Reasoning {
                thought: "t".into(),
                ..Reasoning::default()
            },
            Reasoning {
                final_answer: Some("x".into()),
                ..Reasoning::act("t", "foo-tool", "i")
            },
        ];

        for case in cases {
            let err = validate(case, &reg).unwrap_err();
            assert!(matches!(err, AgentError::Parse(_)), "{err}");
        }
    }

    #[test]
    fn test_empty_action_counts_as_unset() {
        let r = Reasoning {
            action: Some(String::new()),
            ..Reasoning::answer("t", "done".to_string())
        };
        let out = validate(r, &registry()).unwrap();
        assert_eq!(out.action, None);
    }

    #[test]
    fn test_unknown_action_is_invalid_tool() {
        let err = validate(Reasoning::<String>::act("t", "bogus", "x"), &registry()).unwrap_err();
        match err {
            AgentError::InvalidTool {
                action,
                thought,
                input,
            } => {
                assert_eq!(action, "bogus");
                assert_eq!(thought, "t");
                assert_eq!(input.as_deref(), Some("x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_validator_wraps_predictor() {
        let inner = FakePredictor::new([Ok(Reasoning::<String>::act("t", "Foo Tool", ""))]);
        let validator = ReasoningValidator::new(inner, registry());

        let req = PromptData {
            goal: "g".into(),
            tools: Vec::new(),
            iterations: Vec::new(),
        };
        let out = validator.predict(&Context::new(), &req).await.unwrap();
        assert_eq!(out.action.as_deref(), Some("foo-tool"));
    }
}
