//! Response Parsing
//!
//! Model output is untrusted text. Parsers turn it into a typed value or a
//! [`AgentError::Parse`], which the retry layer treats as worth another attempt.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::error::{AgentError, Result};

/// Text → structured value
pub trait Parser<T>: Send + Sync {
    fn parse(&self, text: &str) -> Result<T>;
}

/// Returns the model output unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct TextParser;

impl Parser<String> for TextParser {
    fn parse(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Decodes the first JSON value in the model output.
///
/// Models like to wrap JSON in prose or markdown fences, and sometimes keep
/// going after the object is closed. Everything before the first `{` or `[`
/// and everything after the first complete value is ignored.
pub struct JsonParser<T> {
    _type: PhantomData<fn() -> T>,
}

impl<T> JsonParser<T> {
    pub fn new() -> Self {
        Self { _type: PhantomData }
    }
}

impl<T> Default for JsonParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonParser<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Parser<T> for JsonParser<T> {
    fn parse(&self, text: &str) -> Result<T> {
        let start = text
            .find(|c| c == '{' || c == '[')
            .ok_or_else(|| AgentError::Parse("no JSON value found in response".into()))?;

        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<T>();
        match values.next() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(AgentError::Parse(e.to_string())),
            None => Err(AgentError::Parse("empty response".into())),
        }
    }
}
