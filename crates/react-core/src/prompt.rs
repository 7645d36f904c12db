//! Default ReAct Prompt
//!
//! Renders [`PromptData`] into the JSONL-style ReAct prompt: tool catalogue,
//! rules, worked examples, the goal, and the history so far with one JSON
//! object per line. The model is expected to append exactly one more line,
//! which [`default_parser`] decodes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::Context;
use crate::error::{AgentError, Result};
use crate::parser::JsonParser;
use crate::prompter::{Hydrated, Prompter};
use crate::provider::GenerationOptions;
use crate::reasoning::{PromptData, Reasoning, ThoughtIteration};
use crate::tool::ToolSchema;

const DEFAULT_PREAMBLE: &str =
    "What's the next thing you should do to answer the question with the given tools.";

const DEFAULT_RULES: &[&str] = &[
    "When using a tool, make sure you read the description to ensure it's the right tool and it's used correctly.",
    "If the user asks what you are capable of doing, give them a summary of the tools you have available and what they do.",
    "If the user asks you to do something, make sure you have a tool that can do it. If not, tell the user you can't do it.",
    "When using these tools, if it returns an \"ERROR:\", then the tool failed and needs to be used differently.",
    "Each thought must follow a plan and should be based on previous thoughts and actions.",
    "If you get stuck, ask the user a question via the user-input tool.",
    "Use the following JSONL format by only appending a single (thought plus action and input) OR (a thought plus a final answer).",
];

/// A worked example shown to the model, already rendered as JSON lines
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptExample {
    pub question: String,
    pub context: Vec<String>,
    pub output: String,
}

impl PromptExample {
    pub fn new(question: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: Vec::new(),
            output: output.into(),
        }
    }

    pub fn with_context<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Build an example from typed history and output
    pub fn from_steps<T: Serialize>(
        question: impl Into<String>,
        context: &[ThoughtIteration<T>],
        output: &Reasoning<T>,
    ) -> Result<Self> {
        let context = context
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            question: question.into(),
            context,
            output: serde_json::to_string(output)?,
        })
    }
}

fn default_examples() -> Vec<PromptExample> {
    vec![
        PromptExample::new(
            "Add a table",
            r#"{"thought": "I should figure out what the table should be called", "action": "user-input", "input": "What should the table be named?", "observation": ""}"#,
        ),
        PromptExample::new(
            "Help the user edit their app",
            r#"{"thought": "I have finished adding the table employees", "final_answer": "I have finished adding the table employees"}"#,
        )
        .with_context([
            r#"{"thought": "I should figure out what the table should be called", "action": "user-input", "input": "What should the table be named?", "observation": "employees"}"#,
            r#"{"thought": "I need to add the table employees", "action": "add-table", "input": "employees", "observation": ""}"#,
        ]),
        PromptExample::new(
            "Build me a space ship",
            r#"{"thought": "I don't have the tools to build a space ship", "final_answer": "I don't have the tools to build a space ship"}"#,
        ),
    ]
}

/// The default ReAct prompter
#[derive(Clone, Debug)]
pub struct ReactPrompter {
    options: GenerationOptions,
    preamble: String,
    rules: Vec<String>,
    examples: Vec<PromptExample>,
}

impl ReactPrompter {
    pub fn new(options: GenerationOptions) -> Self {
        Self {
            options,
            preamble: DEFAULT_PREAMBLE.into(),
            rules: DEFAULT_RULES.iter().map(|r| (*r).to_string()).collect(),
            examples: default_examples(),
        }
    }

    /// Replace the opening instruction
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Replace the rule list
    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = rules.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the worked examples
    pub fn with_examples(mut self, examples: Vec<PromptExample>) -> Self {
        self.examples = examples;
        self
    }

    /// Render the prompt text for one turn
    pub fn render<T: Serialize>(&self, data: &PromptData<T>) -> Result<String> {
        let mut prompt = String::new();

        prompt.push_str(&self.preamble);
        prompt.push_str("\n\nTools:\n");
        for tool in &data.tools {
            render_tool(&mut prompt, tool);
        }

        prompt.push_str("\nRules:\n");
        for rule in &self.rules {
            prompt.push_str(&format!("* {}\n", rule));
        }

        let names: Vec<&str> = data.tools.iter().map(|t| t.name.as_str()).collect();
        prompt.push_str("\nFormat explanation:\n\n");
        prompt.push_str("  Question: the input question you must answer\n");
        prompt.push_str(&format!(
            "  {{\"thought\": \"you should always think about what to do and describe your thought process\", \"action\": \"the action to take, should be one of [{}]\", \"input\": \"the input to the action, it must be included and be on one line.\", \"observation\": \"the result of the action. You never add this.\"}}\n\n",
            names.join(", ")
        ));
        prompt.push_str("  ... (this Thought/Action/Action Input/Observation can repeat N times but only add a single iteration)\n\n");
        prompt.push_str("  {\"thought\": \"I now know the final answer\", \"final_answer\": \"the final answer to the original input question. This can only occur if there are no more actions.\"}\n");

        if !self.examples.is_empty() {
            prompt.push_str("\nExamples:\n");
            for (i, example) in self.examples.iter().enumerate() {
                render_example(&mut prompt, i + 1, example);
            }
        }

        prompt.push_str("\nBegin!\n\nInput:\n");
        prompt.push_str(&format!("Question: {}\n\nPrevious context:\n", data.goal));
        if data.iterations.is_empty() {
            prompt.push_str("null\n");
        }
        for iteration in &data.iterations {
            let line = serde_json::to_string(iteration)
                .map_err(|e| AgentError::Hydrate(format!("iteration is not serializable: {}", e)))?;
            prompt.push_str(&line);
            prompt.push('\n');
        }
        prompt.push_str("\nOutput:\n");

        Ok(prompt)
    }
}

fn render_tool(prompt: &mut String, tool: &ToolSchema) {
    prompt.push_str(&format!("  {}: {}\n", tool.name, tool.description));

    if !tool.args.is_empty() {
        let usage: String = tool.args.iter().map(|a| format!("[{}]", a)).collect();
        prompt.push_str(&format!("\n    Usage: {}\n", usage));
    }
    if !tool.examples.is_empty() {
        prompt.push_str("\n    Examples:\n");
        for example in &tool.examples {
            prompt.push_str(&format!("    {}\n", example));
        }
    }
}

fn render_example(prompt: &mut String, n: usize, example: &PromptExample) {
    prompt.push_str(&format!("\n  Example {}:\n  Input:\n", n));
    prompt.push_str(&format!("  Question: {}\n\n  Previous context:", example.question));
    if example.context.is_empty() {
        prompt.push_str(" null\n");
    } else {
        prompt.push('\n');
        for line in &example.context {
            prompt.push_str(&format!("  {}\n", line));
        }
    }
    prompt.push_str(&format!("\n  Output:\n  {}\n", example.output));
}

#[async_trait]
impl<T> Prompter<PromptData<T>> for ReactPrompter
where
    T: Serialize + Sync,
{
    async fn hydrate(&self, _ctx: &Context, req: &PromptData<T>) -> Result<Hydrated> {
        Ok(Hydrated::new(self.render(req)?, self.options.clone()))
    }
}

/// Parser matching [`ReactPrompter`]'s output format
pub fn default_parser<T: DeserializeOwned>() -> JsonParser<Reasoning<T>> {
    JsonParser::new()
}
