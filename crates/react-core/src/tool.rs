//! Tool System
//!
//! Tools are the only way the agent acts on the world. The registry indexes
//! them by normalized name and is validated once, when it is built.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{AgentError, Result};

/// Tool descriptor shown to the model
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Example inputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,

    /// Usage hints, one per positional argument
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            examples: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's descriptor
    fn schema(&self) -> ToolSchema;

    /// Run the tool with the raw input chosen by the model.
    ///
    /// Errors are shown to the model as an observation and never end the run.
    async fn run(&self, ctx: &Context, input: &str) -> Result<String>;
}

/// A tool backed by a closure
pub struct FnTool {
    schema: ToolSchema,
    f: Box<dyn Fn(Context, String) -> BoxFuture<'static, Result<String>> + Send + Sync>,
}

impl FnTool {
    pub fn new<F, Fut>(schema: ToolSchema, f: F) -> Self
    where
        F: Fn(Context, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            schema,
            f: Box::new(move |ctx, input| Box::pin(f(ctx, input))),
        }
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool").field("schema", &self.schema).finish()
    }
}

#[async_trait]
impl Tool for FnTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn run(&self, ctx: &Context, input: &str) -> Result<String> {
        (self.f)(ctx.clone(), input.to_string()).await
    }
}

/// Canonical form of a tool name: lower-cased, with every run of whitespace
/// and underscores collapsed into a single hyphen.
pub fn normalize_tool_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.chars() {
        if c.is_whitespace() || c == '_' {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
            continue;
        }
        in_separator = false;
        out.extend(c.to_lowercase());
    }

    out
}

/// Registry for available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    ordered: Vec<Arc<dyn Tool>>,
    schemas: Vec<ToolSchema>,
}

impl ToolRegistry {
    /// Build the registry, rejecting an empty tool set, tools without a name
    /// or description, and names that collide after normalization.
    pub fn new<I>(tools: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        let mut map = HashMap::new();
        let mut ordered = Vec::new();
        let mut schemas = Vec::new();

        for (i, tool) in tools.into_iter().enumerate() {
            let mut schema = tool.schema();
            if schema.name.is_empty() {
                return Err(AgentError::Config(format!("{}: tool name is empty", i)));
            }
            if schema.description.is_empty() {
                return Err(AgentError::Config(format!(
                    "{}: tool description is empty",
                    i
                )));
            }

            let name = normalize_tool_name(&schema.name);
            if map.contains_key(&name) {
                return Err(AgentError::Config(format!(
                    "{}: multiple tools with the same name were used: {:?}",
                    i, name
                )));
            }

            schema.name = name.clone();
            map.insert(name, tool.clone());
            ordered.push(tool);
            schemas.push(schema);
        }

        if ordered.is_empty() {
            return Err(AgentError::Config("no tools provided".into()));
        }

        tracing::debug!(count = ordered.len(), "tool registry built");

        Ok(Self {
            tools: map,
            ordered,
            schemas,
        })
    }

    /// Get a tool by its normalized name
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether the normalized name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tools in registration order
    pub fn all(&self) -> &[Arc<dyn Tool>] {
        &self.ordered
    }

    /// Tool descriptors in registration order, names normalized
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.schemas.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
