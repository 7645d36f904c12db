//! Confirmation Chain
//!
//! Shows a message, asks "Do you want to continue?" and lets the model decide
//! whether the free-form reply was a yes, a no, or a change of plan.

use std::sync::Arc;

use react_core::{
    chain::{ChainFn, Pipeline},
    context::Context,
    error::{AgentError, Result},
    parser::JsonParser,
    predictor::{LlmPredictor, PredictorChain, Retrier},
    prompter::FnPrompter,
    provider::{GenerationOptions, LlmProvider},
};
use serde::{Deserialize, Serialize};

use crate::console::Console;

const CONFIRMATION_PROMPT: &str = r#"Check if the input signals that the user said some form of yes.

Example 1:
Input: "yes"
Output: {"result": true}

Example 2:
Input: "no"
Output: {"result": false}

Example 3:
Input: "yea"
Output: {"result": true}

Example 4:
Input: "nevermind, lets add a table instead"
Output: {"error": "user wants to do something different: lets add a table instead"}

Begin!

"#;

/// The model's reading of the user's reply
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub result: bool,

    /// Set when the user asked for something else instead
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Confirmation {
    /// `Ok` only for a plain yes
    pub fn into_result(self) -> Result<()> {
        if !self.error.is_empty() {
            return Err(AgentError::ToolExecution(self.error));
        }
        if !self.result {
            return Err(AgentError::ToolExecution("user changed their mind".into()));
        }
        Ok(())
    }
}

#[allow(clippy::ptr_arg)]
fn render_confirmation(reply: &String) -> Result<String> {
    Ok(format!("{}Input: {}\nOutput:\n", CONFIRMATION_PROMPT, reply))
}

/// Build the two-stage confirmation pipeline: ask on the console, then classify.
pub fn confirmation_chain(
    provider: Arc<dyn LlmProvider>,
    console: Arc<Console>,
    options: GenerationOptions,
) -> Result<Pipeline<String, Confirmation>> {
    let ask = ChainFn::new(move |ctx: Context, message: String| {
        let console = Arc::clone(&console);
        async move {
            console
                .ask(&ctx, &format!("{}\n\nDo you want to continue?: ", message))
                .await
        }
    });

    let classify = PredictorChain::new(Retrier::new(LlmPredictor::new(
        provider,
        FnPrompter::new(options, render_confirmation),
        JsonParser::<Confirmation>::new(),
    )));

    Pipeline::builder()
        .stage::<_, String, String>(ask)
        .stage::<_, String, Confirmation>(classify)
        .build()
}

#[cfg(test)]
mod tests {
    use react_core::chain::Chain;
    use react_core::testing::FakeProvider;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn console(input: &'static [u8]) -> Arc<Console> {
        Arc::new(Console::new(input, tokio::io::sink()))
    }

    async fn confirm(provider: FakeProvider, reply: &'static [u8]) -> Result<Confirmation> {
        let chain = confirmation_chain(Arc::new(provider), console(reply), GenerationOptions::default())?;
        chain.run(&Context::new(), "Adding table employees".into()).await
    }

    #[tokio::test]
    async fn test_yes() {
        let confirmation = confirm(FakeProvider::always(r#"{"result":true}"#), b"yea\n")
            .await
            .unwrap();
        assert!(confirmation.result);
        assert!(confirmation.clone().into_result().is_ok());
    }

    #[tokio::test]
    async fn test_no() {
        let confirmation = confirm(FakeProvider::always(r#"{"result":false}"#), b"no\n")
            .await
            .unwrap();
        let err = confirmation.into_result().unwrap_err();
        assert_eq!(err.to_string(), "user changed their mind");
    }

    #[tokio::test]
    async fn test_change_of_plan() {
        let confirmation = confirm(FakeProvider::always(r#"{"error":"some-user-error"}"#), b"wait\n")
            .await
            .unwrap();
        assert_eq!(confirmation.error, "some-user-error");
        assert_eq!(confirmation.into_result().unwrap_err().to_string(), "some-user-error");
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let err = confirm(FakeProvider::failing("some error"), b"y\n").await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[tokio::test]
    async fn test_garbage_is_retried_then_fails() {
        let provider = Arc::new(FakeProvider::always("garbage"));
        let chain = confirmation_chain(provider.clone(), console(b"y\n"), GenerationOptions::default())
            .unwrap();

        let err = chain.run(&Context::new(), "Adding table x".into()).await.unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_reply_reaches_the_model() {
        let provider = Arc::new(FakeProvider::always(r#"{"result":true}"#));
        let (output, mut screen) = tokio::io::duplex(1024);
        let chain = confirmation_chain(
            provider.clone(),
            Arc::new(Console::new(&b"sure thing\n"[..], output)),
            GenerationOptions::default(),
        )
        .unwrap();

        chain.run(&Context::new(), "Removing table x".into()).await.unwrap();

        let prompts = provider.prompts();
        let prompt = &prompts[0];
        assert!(prompt.starts_with("Check if the input signals"));
        assert!(prompt.ends_with("Input: sure thing\nOutput:\n"));

        drop(chain);
        let mut shown = String::new();
        screen.read_to_string(&mut shown).await.unwrap();
        assert_eq!(shown, "Removing table x\n\nDo you want to continue?: ");
    }

    #[tokio::test]
    async fn test_closed_input() {
        let err = confirm(FakeProvider::always(r#"{"result":true}"#), b"").await.unwrap_err();
        assert_eq!(err.to_string(), "unable to get input from user");
    }
}
