//! Console I/O
//!
//! A line-oriented terminal shared by every tool that talks to the user.
//! Reads honour the run context, so a cancelled run stops waiting for input.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use react_core::{
    context::Context,
    error::{AgentError, Result},
};

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

pub struct Console {
    reader: Mutex<Reader>,
    writer: Mutex<Writer>,
}

impl Console {
    pub fn new(
        input: impl AsyncBufRead + Send + Unpin + 'static,
        output: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Mutex::new(Box::new(input)),
            writer: Mutex::new(Box::new(output)),
        }
    }

    /// Process stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    /// Write `text` as-is and flush
    pub async fn say(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Show `prompt` and wait for one line of input, without its line ending.
    ///
    /// End of input is an error: there is no one left to answer.
    pub async fn ask(&self, ctx: &Context, prompt: &str) -> Result<String> {
        self.say(prompt).await?;

        let mut reader = self.reader.lock().await;
        let mut line = String::new();
        let read = ctx.guard(reader.read_line(&mut line)).await??;
        if read == 0 {
            return Err(AgentError::ToolExecution("unable to get input from user".into()));
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
