//! Toy app-editor tool set.
//!
//! The agent edits an in-memory [`AppTemplate`]: it can list, add and remove
//! tables and save the result as JSON. Adding or removing a table asks the
//! user for confirmation first.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use react_core::{
    chain::{Chain, Pipeline},
    context::Context,
    error::{AgentError, Result},
    provider::{GenerationOptions, LlmProvider},
    tool::{Tool, ToolSchema},
};
use react_runtime::{confirmation_chain, Confirmation, Console, UserInputTool};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTemplate {
    pub tables: Vec<AppTable>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTable {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<AppColumn>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

type SharedTemplate = Arc<Mutex<AppTemplate>>;
type Confirm = Arc<Pipeline<String, Confirmation>>;

fn lock(template: &SharedTemplate) -> MutexGuard<'_, AppTemplate> {
    template.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The one whitespace-free word a tool expects as input
fn single_input(input: &str) -> Result<&str> {
    let mut parts = input.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(word), None) => Ok(word),
        _ => Err(AgentError::InvalidToolInput("should only get one input".into())),
    }
}

async fn confirm(confirm: &Confirm, ctx: &Context, message: String) -> Result<()> {
    confirm.run(ctx, message).await?.into_result()
}

/// Build the full tool set around one shared template and console.
pub fn tool_set(
    provider: Arc<dyn LlmProvider>,
    console: Arc<Console>,
    options: GenerationOptions,
    template: SharedTemplate,
) -> Result<Vec<Arc<dyn Tool>>> {
    let confirmation: Confirm = Arc::new(confirmation_chain(provider, console.clone(), options)?);

    Ok(vec![
        Arc::new(UserInputTool::new(console)),
        Arc::new(ListTablesTool {
            template: template.clone(),
        }),
        Arc::new(AddTableTool {
            template: template.clone(),
            confirm: confirmation.clone(),
        }),
        Arc::new(RemoveTableTool {
            template: template.clone(),
            confirm: confirmation,
        }),
        Arc::new(SaveAppTemplateTool { template }),
    ])
}

pub struct ListTablesTool {
    template: SharedTemplate,
}

#[async_trait]
impl Tool for ListTablesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "list-tables",
            "List the tables in the app. It does not take any input.",
        )
    }

    async fn run(&self, _ctx: &Context, _input: &str) -> Result<String> {
        let names: Vec<String> = lock(&self.template)
            .tables
            .iter()
            .map(|t| t.name.clone())
            .collect();
        Ok(names.join(","))
    }
}

pub struct AddTableTool {
    template: SharedTemplate,
    confirm: Confirm,
}

#[async_trait]
impl Tool for AddTableTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "add-table",
            "Add a table within the app. The input is the name of the table.",
        )
        .with_examples(["some-table-name"])
        .with_args(["table name"])
    }

    async fn run(&self, ctx: &Context, input: &str) -> Result<String> {
        let name = single_input(input)?;
        confirm(&self.confirm, ctx, format!("Adding table {}", name)).await?;

        lock(&self.template).tables.push(AppTable {
            name: name.to_string(),
            columns: Vec::new(),
        });
        tracing::info!(table = name, "table added");
        Ok(format!("Table {} added", name))
    }
}

pub struct RemoveTableTool {
    template: SharedTemplate,
    confirm: Confirm,
}

#[async_trait]
impl Tool for RemoveTableTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "remove-table",
            "Remove a table within the app. The input is the name of the table.",
        )
        .with_examples(["some-table-name"])
        .with_args(["table name"])
    }

    async fn run(&self, ctx: &Context, input: &str) -> Result<String> {
        let name = single_input(input)?;
        confirm(&self.confirm, ctx, format!("Removing table {}", name)).await?;

        let mut template = lock(&self.template);
        let index = template
            .tables
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| AgentError::ToolExecution(format!("Table {} not found", name)))?;
        template.tables.remove(index);
        drop(template);

        tracing::info!(table = name, "table removed");
        Ok(format!("Table {} removed", name))
    }
}

pub struct SaveAppTemplateTool {
    template: SharedTemplate,
}

#[async_trait]
impl Tool for SaveAppTemplateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("save-app-template", "Save the app template. The input is the file name.")
            .with_examples(["some/file/name"])
            .with_args(["file name"])
    }

    async fn run(&self, ctx: &Context, input: &str) -> Result<String> {
        let path = Path::new(single_input(input)?);
        let json = serde_json::to_string_pretty(&*lock(&self.template))?;

        ctx.guard(tokio::fs::write(path, json)).await??;
        tracing::info!(path = %path.display(), "app template saved");
        Ok("successfully wrote AppTemplate".into())
    }
}
