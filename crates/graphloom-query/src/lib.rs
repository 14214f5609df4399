//! # graphloom query
//!
//! Schema model and Cypher translation engine. A [`SchemaModel`] is built
//! once from declarations and shared read-only; each request is planned,
//! narrowed by authorization rules and emitted as a parameterized
//! statement with its parameter map.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphloom_config::TranslatorConfig;
//! use graphloom_query::{AuthContext, OperationKind, OperationRequest, SchemaDeclarations,
//!     SchemaModel, SelectionSet, TypeDeclaration, Translator};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let declarations = SchemaDeclarations {
//!         nodes: vec![TypeDeclaration::new("Movie").field("title", "String!")],
//!         ..Default::default()
//!     };
//!     let model = SchemaModel::build(&declarations)?;
//!     let config = TranslatorConfig::default();
//!
//!     let request = OperationRequest::new(OperationKind::Read, "Movie")
//!         .with_selection(SelectionSet::of(["title"]));
//!     let translation = Translator::new(&model, &config)
//!         .translate(&request, &AuthContext::anonymous())?;
//!     println!("{:?}", translation);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod annotation;
mod auth;
pub mod context;
pub mod error;
pub mod mutation;
pub mod plan;
pub mod predicate;
pub mod render;
pub mod request;
pub mod schema;
pub mod subscription;
pub mod transform;
mod translate;

pub use annotation::{AuthOperation, AuthStage, Authorization, RuleEffect, SubscriptionEvent};
pub use context::AuthContext;
pub use error::{
    AnnotationError, ErrorKind, ModelError, ModelResult, TransformError, TranslateError,
    TranslateResult,
};
pub use render::CompiledStatement;
pub use request::{
    Field, FieldArguments, FilterArgs, OperationArguments, OperationKind, OperationRequest,
    SelectionSet,
};
pub use schema::{
    FieldDeclaration, RawAnnotation, SchemaBuilder, SchemaDeclarations, SchemaModel,
    TypeDeclaration,
};
pub use subscription::{EventDescriptor, EventFilter, SubscriptionPlan};
pub use transform::{StatementTransform, StatementValidator, TransformPipeline};
pub use translate::{Translation, Translator};
