//! Request translation entry point.
//!
//! [`Translator`] ties the stages together: plan the request against the
//! model, emit clauses into a fresh scope, render, then run the transform
//! pipeline over the finished statement.

use crate::annotation::{AuthOperation, AuthStage};
use crate::auth;
use crate::context::{AuthContext, TranslationContext};
use crate::error::TranslateResult;
use crate::mutation::MutationPlanner;
use crate::plan::{OperationPlanner, PlannedRoot};
use crate::render::read::ReadEmitter;
use crate::render::write::WriteEmitter;
use crate::render::{Block, CompiledStatement};
use crate::request::{OperationKind, OperationRequest};
use crate::schema::SchemaModel;
use crate::subscription::{SubscriptionPlan, SubscriptionPlanner};
use crate::transform::{StatementTransform, TransformPipeline};
use graphloom_config::TranslatorConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What one request translates to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Translation {
    Statement(CompiledStatement),
    Subscription(SubscriptionPlan),
}

impl Translation {
    pub fn statement(&self) -> Option<&CompiledStatement> {
        match self {
            Translation::Statement(statement) => Some(statement),
            Translation::Subscription(_) => None,
        }
    }

    pub fn subscription(&self) -> Option<&SubscriptionPlan> {
        match self {
            Translation::Subscription(plan) => Some(plan),
            Translation::Statement(_) => None,
        }
    }
}

/// Translates requests against one immutable model.
///
/// Holds no per-request state; share it freely across threads.
pub struct Translator<'m> {
    model: &'m SchemaModel,
    config: &'m TranslatorConfig,
    transforms: TransformPipeline,
}

impl<'m> Translator<'m> {
    pub fn new(model: &'m SchemaModel, config: &'m TranslatorConfig) -> Self {
        Self {
            model,
            config,
            transforms: TransformPipeline::new(),
        }
    }

    /// Append a transform run over every compiled statement
    pub fn with_transform(mut self, transform: impl StatementTransform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn transforms(&self) -> &TransformPipeline {
        &self.transforms
    }

    pub fn translate(&self, request: &OperationRequest, auth: &AuthContext) -> TranslateResult<Translation> {
        debug!(
            operation = request.operation.name(),
            target = %request.target,
            authenticated = auth.is_authenticated(),
            "translating request"
        );

        match request.operation {
            OperationKind::Subscribe => self.subscribe(request, auth).map(Translation::Subscription),
            _ => self.compile(request, auth).map(Translation::Statement),
        }
    }

    /// Translate a statement-producing request
    pub fn compile(&self, request: &OperationRequest, auth: &AuthContext) -> TranslateResult<CompiledStatement> {
        let mut ctx = TranslationContext::new(self.model, self.config, auth);
        let (block, events) = match request.operation {
            OperationKind::Read | OperationKind::Aggregate => {
                let tree = OperationPlanner::new(self.model, self.config).plan(request)?;
                let mut emitter = ReadEmitter::new(&mut ctx);
                let block = match &tree.root {
                    PlannedRoot::Read(selection) => emitter.root(selection)?,
                    PlannedRoot::Aggregate {
                        node,
                        filter,
                        selection,
                    } => emitter.root_aggregate(*node, filter.as_ref(), selection)?,
                };
                (block, Vec::new())
            }
            OperationKind::Create | OperationKind::Update | OperationKind::Delete => {
                let plan = MutationPlanner::new(self.model, self.config).plan(request)?;
                let mut emitter = WriteEmitter::new(&mut ctx);
                let block = emitter.root(&plan)?;
                (block, emitter.into_events())
            }
            OperationKind::Subscribe => {
                return Err(crate::error::TranslateError::invalid_input(
                    "operation",
                    "subscribe requests produce a subscription plan, not a statement",
                ))
            }
        };

        let statement = self.finish(ctx, block, events);
        debug!(
            operation = request.operation.name(),
            params = statement.params.len(),
            events = statement.events.len(),
            "compiled statement"
        );
        Ok(self.transforms.run(statement)?)
    }

    /// Translate a subscribe request
    pub fn subscribe(&self, request: &OperationRequest, auth: &AuthContext) -> TranslateResult<SubscriptionPlan> {
        let plan = SubscriptionPlanner::new(self.model, self.config).plan(request)?;
        if let Some(node) = self.model.node(&plan.type_name) {
            let ctx = TranslationContext::new(self.model, self.config, auth);
            auth::ensure_authenticated(&ctx, node, AuthOperation::Subscribe, AuthStage::Before, &[])?;
        }
        Ok(plan)
    }

    fn finish(
        &self,
        ctx: TranslationContext<'_>,
        block: Block,
        events: Vec<crate::subscription::EventDescriptor>,
    ) -> CompiledStatement {
        let auth = ctx.auth;
        let statement = CompiledStatement {
            text: block.render(self.config.emit.indent),
            params: ctx.scope.into_params(auth.jwt_value(), auth.is_authenticated()),
            events,
        };
        #[cfg(debug_assertions)]
        {
            let problems = crate::transform::StatementValidator::problems(&statement);
            debug_assert!(problems.is_empty(), "inconsistent statement: {:?}", problems);
        }
        statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransformError, TranslateError};
    use crate::request::SelectionSet;
    use crate::schema::{SchemaDeclarations, TypeDeclaration};
    use serde_json::json;

    fn model() -> SchemaModel {
        let decls = SchemaDeclarations {
            nodes: vec![TypeDeclaration::new("Movie")
                .field("title", "String!")
                .field("views", "Int")],
            ..Default::default()
        };
        SchemaModel::build(&decls).unwrap()
    }

    struct Reject;

    impl StatementTransform for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn transform(&self, _: CompiledStatement) -> Result<CompiledStatement, TransformError> {
            Err(TransformError::Rejected {
                transform: "reject".into(),
                message: "no".into(),
            })
        }
    }

    #[test]
    fn test_read_translates_to_statement() {
        let model = model();
        let config = TranslatorConfig::default();
        let request = OperationRequest::new(OperationKind::Read, "Movie")
            .with_selection(SelectionSet::of(["title"]))
            .with_where(json!({ "title": "Matrix" }));
        let translation = Translator::new(&model, &config)
            .translate(&request, &AuthContext::anonymous())
            .unwrap();

        let statement = translation.statement().unwrap();
        assert!(statement.text.starts_with("MATCH (this:Movie)"));
        assert!(statement.text.contains("this.title = $param0"));
        assert_eq!(statement.params["param0"], json!("Matrix"));
        assert_eq!(statement.params["jwt"], json!({}));
        assert_eq!(statement.params["isAuthenticated"], json!(false));
        assert!(translation.subscription().is_none());
    }

    #[test]
    fn test_subscribe_translates_to_plan() {
        let model = model();
        let config = TranslatorConfig::default();
        let request = OperationRequest::new(OperationKind::Subscribe, "Movie");
        let translation = Translator::new(&model, &config)
            .translate(&request, &AuthContext::anonymous())
            .unwrap();
        let plan = translation.subscription().unwrap();
        assert_eq!(plan.type_name, "Movie");

        let value = serde_json::to_value(&translation).unwrap();
        assert_eq!(value["kind"], json!("subscription"));
    }

    #[test]
    fn test_compile_rejects_subscribe() {
        let model = model();
        let config = TranslatorConfig::default();
        let request = OperationRequest::new(OperationKind::Subscribe, "Movie");
        let err = Translator::new(&model, &config)
            .compile(&request, &AuthContext::anonymous())
            .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput { .. }));
    }

    #[test]
    fn test_transform_failure_surfaces_as_internal() {
        let model = model();
        let config = TranslatorConfig::default();
        let translator = Translator::new(&model, &config).with_transform(Reject);
        assert_eq!(translator.transforms().names(), vec!["reject"]);

        let request = OperationRequest::new(OperationKind::Read, "Movie").with_selection(SelectionSet::of(["title"]));
        let err = translator.translate(&request, &AuthContext::anonymous()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
    }
}
