//! The `user-input` tool: lets the model ask the person at the console.

use std::sync::Arc;

use async_trait::async_trait;
use react_core::{
    context::Context,
    error::Result,
    tool::{Tool, ToolSchema},
};

use crate::console::Console;

pub struct UserInputTool {
    console: Arc<Console>,
}

impl UserInputTool {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl Tool for UserInputTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "user-input",
            "Ask the user a question. The input is what is displayed to the user.",
        )
        .with_examples(["some question to the user"])
    }

    async fn run(&self, ctx: &Context, input: &str) -> Result<String> {
        self.console.ask(ctx, &format!("AI: {}\nYou: ", input)).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_relays_question_and_answer() {
        let (output, mut screen) = tokio::io::duplex(1024);
        let tool = UserInputTool::new(Arc::new(Console::new(&b"employees\n"[..], output)));

        let answer = tool
            .run(&Context::new(), "What should the table be named?")
            .await
            .unwrap();
        assert_eq!(answer, "employees");

        drop(tool);
        let mut shown = String::new();
        screen.read_to_string(&mut shown).await.unwrap();
        assert_eq!(shown, "AI: What should the table be named?\nYou: ");
    }

    #[test]
    fn test_schema() {
        let tool = UserInputTool::new(Arc::new(Console::new(&b""[..], tokio::io::sink())));
        let schema = tool.schema();
        assert_eq!(schema.name, "user-input");
        assert_eq!(schema.examples, vec!["some question to the user".to_string()]);
    }
}
