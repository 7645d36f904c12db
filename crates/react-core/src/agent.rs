//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! Each turn the model sees the goal, the tools and everything that happened
//! so far; it either picks a tool or answers. Tool output is folded back into
//! the history as an observation and the loop goes around again.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::chain::Chain;
use crate::context::Context;
use crate::display::CliLogger;
use crate::error::{AgentError, Result};
use crate::predictor::{Predictor, Retrier};
use crate::reasoning::{PromptData, Reasoning, ReasoningValidator, ThoughtIteration};
use crate::tool::{Tool, ToolRegistry};

type DynPredictor<T> = Box<dyn Predictor<PromptData<T>, Reasoning<T>>>;

/// Agent configuration
#[derive(Clone, Debug, Default)]
pub struct AgentConfig {
    /// Maximum number of predictions per run; `None` runs until the model
    /// produces a final answer
    pub max_iterations: Option<usize>,
}

/// The main Agent struct
pub struct Agent<T> {
    predictor: DynPredictor<T>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl<T> std::fmt::Debug for Agent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T> Agent<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Wrap `predictor` in validation and retry and bind it to `tools`
    pub fn new<P, I>(predictor: P, tools: I) -> Result<Self>
    where
        P: Predictor<PromptData<T>, Reasoning<T>> + 'static,
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        Self::builder().predictor(predictor).tools(tools).build()
    }

    pub fn builder() -> AgentBuilder<T> {
        AgentBuilder::new()
    }

    /// Run the loop until the model answers `goal`.
    ///
    /// Tool failures and unknown tools are shown to the model and never end
    /// the run. Everything else the prediction pipeline gives up on does.
    pub async fn run(&self, ctx: &Context, goal: &str) -> Result<T> {
        if goal.is_empty() {
            return Err(AgentError::EmptyGoal);
        }

        let span = tracing::info_span!("agent_run", run_id = %Uuid::new_v4(), goal);
        self.run_loop(ctx, goal).instrument(span).await
    }

    async fn run_loop(&self, ctx: &Context, goal: &str) -> Result<T> {
        let mut history: Vec<ThoughtIteration<T>> = Vec::new();
        let mut predictions = 0;

        loop {
            ctx.check()?;

            if let Some(max) = self.config.max_iterations {
                if predictions >= max {
                    tracing::warn!(max, "iteration cap reached without a final answer");
                    return Err(AgentError::MaxIterations(max));
                }
            }
            predictions += 1;

            let request = PromptData {
                goal: goal.to_string(),
                tools: self.tools.schemas().to_vec(),
                iterations: history,
            };
            let result = self.predictor.predict(ctx, &request).await;
            history = request.iterations;

            let reasoning = match result {
                Ok(reasoning) => reasoning,
                Err(AgentError::InvalidTool {
                    action,
                    thought,
                    input,
                }) => {
                    tracing::debug!(iteration = predictions, %action, "model picked an unknown tool");
                    let observation = error_observation(&AgentError::InvalidTool {
                        action: action.clone(),
                        thought: thought.clone(),
                        input: input.clone(),
                    });
                    let rejected = Reasoning {
                        thought,
                        action: Some(action),
                        input,
                        final_answer: None,
                    };
                    history.push(ThoughtIteration::new(rejected, observation));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let Some(action) = reasoning.action.as_deref() else {
                tracing::debug!(iterations = predictions, "final answer reached");
                return reasoning
                    .final_answer
                    .ok_or_else(|| AgentError::Parse("either action or final_answer must be set".into()));
            };

            tracing::debug!(iteration = predictions, action, "running tool");
            let observation = self
                .act(ctx, action, reasoning.input.as_deref().unwrap_or_default())
                .await?;
            history.push(ThoughtIteration::new(reasoning, observation));
        }
    }

    /// Run one tool and turn its outcome into an observation
    async fn act(&self, ctx: &Context, action: &str, input: &str) -> Result<String> {
        let Some(tool) = self.tools.lookup(action) else {
            return Ok(error_observation(&AgentError::InvalidTool {
                action: action.to_string(),
                thought: String::new(),
                input: Some(input.to_string()),
            }));
        };

        // Only the run's own context ends the run; a tool's private timeout is an observation
        match ctx.guard(tool.run(ctx, input)).await? {
            Ok(output) => Ok(output),
            Err(e) => {
                ctx.check()?;
                tracing::debug!(tool = action, error = %e, "tool failed");
                Ok(error_observation(&e))
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

fn error_observation(err: &AgentError) -> String {
    format!("ERROR: {}", err)
}

#[async_trait]
impl<T> Chain<String, T> for Agent<T>
where
    T: Serialize + Send + Sync + 'static,
{
    async fn run(&self, ctx: &Context, goal: String) -> Result<T> {
        Agent::run(self, ctx, &goal).await
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder<T> {
    predictor: Option<DynPredictor<T>>,
    tools: Vec<Arc<dyn Tool>>,
    display: Option<Box<dyn Write + Send>>,
    display_prefix: Option<String>,
    config: AgentConfig,
}

impl<T> Default for AgentBuilder<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AgentBuilder<T>
where
    T: Serialize + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            predictor: None,
            tools: Vec::new(),
            display: None,
            display_prefix: None,
            config: AgentConfig::default(),
        }
    }

    /// The base predictor; validation and retry are layered on in `build`
    pub fn predictor<P>(mut self, predictor: P) -> Self
    where
        P: Predictor<PromptData<T>, Reasoning<T>> + 'static,
    {
        self.predictor = Some(Box::new(predictor));
        self
    }

    pub fn tool<U: Tool + 'static>(mut self, tool: U) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tools<I>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        self.tools.extend(tools);
        self
    }

    /// Echo every accepted reasoning step to `out`
    pub fn display(mut self, out: impl Write + Send + 'static) -> Self {
        self.display = Some(Box::new(out));
        self
    }

    pub fn display_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.display_prefix = Some(prefix.into());
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = Some(max);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Agent<T>> {
        let base = self
            .predictor
            .ok_or_else(|| AgentError::Config("predictor is required".into()))?;
        let tools = Arc::new(ToolRegistry::new(self.tools)?);

        let checked = Retrier::new(ReasoningValidator::new(base, tools.clone()));
        let predictor: DynPredictor<T> = match self.display {
            Some(out) => {
                let mut logger = CliLogger::new(checked, out);
                if let Some(prefix) = self.display_prefix {
                    logger = logger.with_prefix(prefix);
                }
                Box::new(logger)
            }
            None => Box::new(checked),
        };

        Ok(Agent {
            predictor,
            tools,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::chain::Pipeline;
    use crate::testing::{FakePredictor, SharedBuffer};
    use crate::tool::{FnTool, ToolSchema};

    type Fake = FakePredictor<PromptData<String>, Reasoning<String>>;

    fn foo_tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            ToolSchema::new("foo tool", "does foo"),
            |_, input| async move { Ok(format!("foo({})", input)) },
        ))
    }

    fn failing_tool() -> Arc<dyn Tool> {
        Arc::new(FnTool::new(
            ToolSchema::new("breaker", "always fails"),
            |_, _| async { Err(AgentError::ToolExecution("boom".into())) },
        ))
    }

    fn agent(fake: &Arc<Fake>) -> Agent<String> {
        Agent::new(fake.clone(), [foo_tool(), failing_tool()]).unwrap()
    }

    #[tokio::test]
    async fn test_tool_then_final_answer() {
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t1", "foo tool", "x")),
            Ok(Reasoning::answer("t2", "done".to_string())),
        ]));

        let answer = agent(&fake).run(&Context::new(), "some goal").await.unwrap();
        assert_eq!(answer, "done");

        let requests = fake.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].goal, "some goal");
        assert!(requests[0].iterations.is_empty());
        assert_eq!(requests[0].tools[0].name, "foo-tool");

        assert_eq!(requests[1].iterations.len(), 1);
        let step = &requests[1].iterations[0];
        assert_eq!(step.observation, "foo(x)");
        assert_eq!(step.reasoning.action.as_deref(), Some("foo-tool"));
        assert_eq!(step.reasoning.thought, "t1");
    }

    #[tokio::test]
    async fn test_empty_goal_rejected_without_prediction() {
        let fake = Arc::new(Fake::new([]));

        let err = agent(&fake).run(&Context::new(), "").await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyGoal));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_goal_is_not_empty() {
        let fake = Arc::new(Fake::new([Ok(Reasoning::answer("t", "done".to_string()))]));

        let answer = agent(&fake).run(&Context::new(), " ").await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(fake.requests()[0].goal, " ");
    }

    #[tokio::test]
    async fn test_invalid_tool_becomes_observation() {
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t1", "bogus", "x")),
            Ok(Reasoning::answer("t2", "gave up".to_string())),
        ]));

        let answer = agent(&fake).run(&Context::new(), "some goal").await.unwrap();
        assert_eq!(answer, "gave up");
        assert_eq!(fake.calls(), 2);

        let step = &fake.requests()[1].iterations[0];
        assert!(step.observation.starts_with("ERROR: "));
        assert!(step.observation.contains("bogus"));
        assert_eq!(step.reasoning.thought, "t1");
        assert_eq!(step.reasoning.input.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_tool_error_becomes_observation() {
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t1", "breaker", "")),
            Ok(Reasoning::answer("t2", "done".to_string())),
        ]));

        agent(&fake).run(&Context::new(), "some goal").await.unwrap();
        assert_eq!(fake.calls(), 2);
        assert_eq!(fake.requests()[1].iterations[0].observation, "ERROR: boom");
    }

    #[tokio::test]
    async fn test_missing_input_runs_tool_with_empty_string() {
        let fake = Arc::new(Fake::new([
            Ok(Reasoning {
                input: None,
                ..Reasoning::act("t1", "foo-tool", "")
            }),
            Ok(Reasoning::answer("t2", "done".to_string())),
        ]));

        agent(&fake).run(&Context::new(), "some goal").await.unwrap();
        assert_eq!(fake.requests()[1].iterations[0].observation, "foo()");
    }

    #[tokio::test]
    async fn test_malformed_reasoning_is_retried_then_fatal() {
        let bad = || Ok(Reasoning::<String>::default());
        let fake = Arc::new(Fake::new([bad(), bad(), bad(), bad()]));

        let err = agent(&fake).run(&Context::new(), "some goal").await.unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_within_one_iteration() {
        let fake = Arc::new(Fake::new([
            Err(AgentError::Llm("flaky".into())),
            Ok(Reasoning::answer("t", "done".to_string())),
        ]));

        let answer = agent(&fake).run(&Context::new(), "some goal").await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_hydrate_error_is_fatal_immediately() {
        let fake = Arc::new(Fake::new([Err(AgentError::Hydrate("bad template".into()))]));

        let err = agent(&fake).run(&Context::new(), "some goal").await.unwrap_err();
        assert!(matches!(err, AgentError::Hydrate(_)));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let fake = Arc::new(Fake::new(
            (0..5).map(|i| Ok(Reasoning::act(format!("t{}", i), "foo-tool", "x"))),
        ));
        let agent = Agent::builder()
            .predictor(fake.clone())
            .tools([foo_tool()])
            .max_iterations(2)
            .build()
            .unwrap();

        let err = agent.run(&Context::new(), "some goal").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(2)));
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_prediction() {
        let fake = Arc::new(Fake::new([Ok(Reasoning::answer("t", "done".to_string()))]));
        let ctx = Context::new();
        ctx.cancel();

        let err = agent(&fake).run(&ctx, "some goal").await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_tool_call() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let blocking: Arc<dyn Tool> = Arc::new(FnTool::new(
            ToolSchema::new("wait", "waits for cancellation"),
            move |ctx, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    ctx.cancel();
                    std::future::pending::<()>().await;
                    Ok(String::new())
                }
            },
        ));
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t", "wait", "")),
            Ok(Reasoning::answer("t", "never".to_string())),
        ]));
        let agent = Agent::new(fake.clone(), [blocking]).unwrap();

        let err = agent.run(&Context::new(), "some goal").await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_timeout_becomes_observation() {
        let impatient: Arc<dyn Tool> = Arc::new(FnTool::new(
            ToolSchema::new("impatient", "gives up after a millisecond"),
            |ctx, _| async move {
                ctx.child()
                    .with_timeout(Duration::from_millis(1))
                    .guard(tokio::time::sleep(Duration::from_secs(5)))
                    .await?;
                Ok("slept".to_string())
            },
        ));
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t1", "impatient", "")),
            Ok(Reasoning::answer("t2", "done".to_string())),
        ]));
        let agent = Agent::new(fake.clone(), [impatient]).unwrap();

        let answer = agent.run(&Context::new(), "some goal").await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(fake.calls(), 2);
        assert_eq!(
            fake.requests()[1].iterations[0].observation,
            "ERROR: deadline exceeded"
        );
    }

    #[tokio::test]
    async fn test_run_deadline_during_tool_call_is_fatal() {
        let slow: Arc<dyn Tool> = Arc::new(FnTool::new(
            ToolSchema::new("slow", "sleeps"),
            |_, _| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("slept".to_string())
            },
        ));
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t1", "slow", "")),
            Ok(Reasoning::answer("t2", "never".to_string())),
        ]));
        let agent = Agent::new(fake.clone(), [slow]).unwrap();
        let ctx = Context::new().with_timeout(Duration::from_millis(20));

        let err = agent.run(&ctx, "some goal").await.unwrap_err();
        assert!(matches!(err, AgentError::DeadlineExceeded));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_display_echoes_steps() {
        let buf = SharedBuffer::default();
        let fake = Arc::new(Fake::new([
            Ok(Reasoning::act("t1", "foo tool", "x")),
            Ok(Reasoning::answer("t2", "done".to_string())),
        ]));
        let agent = Agent::builder()
            .predictor(fake)
            .tools([foo_tool()])
            .display(buf.clone())
            .display_prefix("editor")
            .build()
            .unwrap();

        agent.run(&Context::new(), "some goal").await.unwrap();
        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#"Action: "foo-tool""#));
        assert!(lines[1].contains("FinalAnswer: done"));
        assert!(lines.iter().all(|l| l.contains("[editor]")));
    }

    #[tokio::test]
    async fn test_agent_as_pipeline_stage() {
        let fake = Arc::new(Fake::new([Ok(Reasoning::answer("t", "done".to_string()))]));
        let pipeline = Pipeline::<String, String>::builder()
            .stage(agent(&fake))
            .build()
            .unwrap();

        let out = pipeline.run(&Context::new(), "some goal".into()).await.unwrap();
        assert_eq!(out, "done");
    }

    #[test]
    fn test_build_requires_predictor_and_tools() {
        let err = Agent::<String>::builder().tools([foo_tool()]).build().unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));

        let err = Agent::builder()
            .predictor(Fake::new([]))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
