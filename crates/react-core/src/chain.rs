//! Pipeline Composer
//!
//! Chains independently written stages into one typed call. Each stage is a
//! [`Chain<I, O>`]; the [`Pipeline`] erases the intermediate types, so the
//! stages do not have to agree on anything at compile time except their own
//! signatures. Compatibility is checked once, when the pipeline is built:
//!
//! ```text
//!   I ──▶ [stage 0: I → A] ──▶ [stage 1: A → B] ──▶ [stage 2: B → O] ──▶ O
//!          ▲ input must be I     ▲ input must be A     ▲ output must be O
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = Pipeline::<String, usize>::builder()
//!     .stage(ChainFn::new(|_, s: String| async move { Ok(s.trim().to_string()) }))
//!     .stage(ChainFn::new(|_, s: String| async move { Ok(s.len()) }))
//!     .build()?;
//!
//! let len = pipeline.run(&ctx, "  hi ".into()).await?;
//! ```

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{AgentError, Result};

/// One unit of work: context and typed value in, typed value or error out
#[async_trait]
pub trait Chain<I, O>: Send + Sync
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, ctx: &Context, input: I) -> Result<O>;
}

/// A [`Chain`] backed by a closure
pub struct ChainFn<F>(F);

impl<F> ChainFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut, I, O> Chain<I, O> for ChainFn<F>
where
    F: Fn(Context, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O>> + Send,
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, ctx: &Context, input: I) -> Result<O> {
        (self.0)(ctx.clone(), input).await
    }
}

/// Runtime identity of a stage's input or output type
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type AnyValue = Box<dyn Any + Send>;

#[async_trait]
trait ErasedStage: Send + Sync {
    fn input_type(&self) -> TypeTag;
    fn output_type(&self) -> TypeTag;
    async fn run_erased(&self, ctx: &Context, input: AnyValue) -> Result<AnyValue>;
}

struct Typed<C, I, O> {
    chain: C,
    _types: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<C, I, O> ErasedStage for Typed<C, I, O>
where
    C: Chain<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    fn input_type(&self) -> TypeTag {
        TypeTag::of::<I>()
    }

    fn output_type(&self) -> TypeTag {
        TypeTag::of::<O>()
    }

    async fn run_erased(&self, ctx: &Context, input: AnyValue) -> Result<AnyValue> {
        let input = input.downcast::<I>().map_err(|_| {
            AgentError::Config(format!("stage received a value that is not {}", type_name::<I>()))
        })?;
        let output = self.chain.run(ctx, *input).await?;
        Ok(Box::new(output))
    }
}

/// A type-erased pipeline stage with its declared input/output types
pub struct Stage {
    inner: Box<dyn ErasedStage>,
}

impl Stage {
    pub fn new<C, I, O>(chain: C) -> Self
    where
        C: Chain<I, O> + 'static,
        I: Send + 'static,
        O: Send + 'static,
    {
        Self {
            inner: Box::new(Typed {
                chain,
                _types: PhantomData,
            }),
        }
    }

    pub fn input_type(&self) -> TypeTag {
        self.inner.input_type()
    }

    pub fn output_type(&self) -> TypeTag {
        self.inner.output_type()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage({} -> {})", self.input_type(), self.output_type())
    }
}

/// Stages composed into a single `I -> O` call
pub struct Pipeline<I, O> {
    stages: Vec<Stage>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Pipeline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Assemble `stages`, failing if the list is empty or any adjacent pair of
    /// types (including the pipeline's own boundaries) does not line up.
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        validate::<I, O>(&stages)?;
        Ok(Self {
            stages,
            _types: PhantomData,
        })
    }

    pub fn builder() -> PipelineBuilder<I, O> {
        PipelineBuilder {
            stages: Vec::new(),
            _types: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

fn validate<I: 'static, O: 'static>(stages: &[Stage]) -> Result<()> {
    if stages.is_empty() {
        return Err(AgentError::Config("no stages provided".into()));
    }

    let mut last_out = TypeTag::of::<I>();
    for (i, stage) in stages.iter().enumerate() {
        let input = stage.input_type();
        if input != last_out {
            return Err(AgentError::Config(format!(
                "stage {}: expected input type {}, got {}",
                i, last_out, input
            )));
        }
        last_out = stage.output_type();
    }

    let expected = TypeTag::of::<O>();
    if last_out != expected {
        return Err(AgentError::Config(format!(
            "invalid output type: expected {}, got {}",
            expected, last_out
        )));
    }

    Ok(())
}

#[async_trait]
impl<I, O> Chain<I, O> for Pipeline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn run(&self, ctx: &Context, input: I) -> Result<O> {
        let mut value: AnyValue = Box::new(input);

        for (i, stage) in self.stages.iter().enumerate() {
            ctx.check()?;
            tracing::trace!(stage = i, input = %stage.input_type(), "running stage");
            value = stage.inner.run_erased(ctx, value).await?;
        }

        value.downcast::<O>().map(|out| *out).map_err(|_| {
            AgentError::Config(format!("pipeline did not produce {}", type_name::<O>()))
        })
    }
}

impl<I, O> fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.stages).finish()
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder<I, O> {
    stages: Vec<Stage>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> PipelineBuilder<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn stage<C, A, B>(mut self, chain: C) -> Self
    where
        C: Chain<A, B> + 'static,
        A: Send + 'static,
        B: Send + 'static,
    {
        self.stages.push(Stage::new(chain));
        self
    }

    pub fn build(self) -> Result<Pipeline<I, O>> {
        Pipeline::new(self.stages)
    }
}
