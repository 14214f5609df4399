//! Statement transforms.
//!
//! A transform sees every compiled statement before it leaves the
//! translator and may rewrite or reject it. Transforms run in the order
//! they were added.

mod validate;

pub use validate::StatementValidator;

use crate::error::TransformError;
use crate::render::CompiledStatement;
use std::sync::Arc;

/// Trait for post-emission statement passes.
pub trait StatementTransform: Send + Sync {
    /// Unique name for this transform
    fn name(&self) -> &'static str;

    /// Rewrite or reject one statement
    fn transform(&self, statement: CompiledStatement) -> Result<CompiledStatement, TransformError>;
}

/// Ordered list of transforms applied to every statement
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn StatementTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transform: impl StatementTransform + 'static) -> Self {
        self.push(Arc::new(transform));
        self
    }

    pub fn push(&mut self, transform: Arc<dyn StatementTransform>) {
        self.transforms.push(transform);
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn run(&self, mut statement: CompiledStatement) -> Result<CompiledStatement, TransformError> {
        for transform in &self.transforms {
            statement = transform.transform(statement)?;
        }
        Ok(statement)
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("transforms", &self.names())
            .finish()
    }
}
