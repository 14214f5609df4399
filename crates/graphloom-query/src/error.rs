//! Error types for model building and translation.
//!
//! `ModelError` and `AnnotationError` are startup failures. `TranslateError`
//! is the per-request taxonomy; every variant is deterministic for a given
//! input, so none of them are worth retrying.

use thiserror::Error;

/// Schema declarations are inconsistent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("duplicate type name '{name}'")]
    DuplicateType { name: String },

    #[error("duplicate field '{field}' on type '{type_name}'")]
    DuplicateField { type_name: String, field: String },

    #[error("'{owner}.{field}' references undeclared type '{referenced}'")]
    UndeclaredType {
        owner: String,
        field: String,
        referenced: String,
    },

    #[error("type '{type_name}' implements undeclared interface '{interface}'")]
    UndeclaredInterface { type_name: String, interface: String },

    #[error("type '{type_name}' implements '{interface}' but does not declare its field '{field}'")]
    MissingInterfaceField {
        type_name: String,
        interface: String,
        field: String,
    },

    #[error("union '{union}' has member '{member}' that is not a node type")]
    InvalidUnionMember { union: String, member: String },

    #[error("conflicting annotations on '{target}': {message}")]
    ConflictingAnnotations { target: String, message: String },

    #[error("computed field '{owner}.{field}' does not declare a result column")]
    MissingResultColumn { owner: String, field: String },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid type reference '{reference}' on '{owner}.{field}': {reason}")]
    InvalidTypeReference {
        owner: String,
        field: String,
        reference: String,
        reason: String,
    },

    #[error("invalid relationship '{owner}.{field}': {reason}")]
    InvalidRelationship {
        owner: String,
        field: String,
        reason: String,
    },

    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}

/// A declarative annotation occurrence is malformed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationError {
    #[error("unknown annotation '@{annotation}' on '{target}'")]
    Unknown { annotation: String, target: String },

    #[error("annotation '@{annotation}' is not allowed on {location} '{target}'")]
    WrongLocation {
        annotation: String,
        location: String,
        target: String,
    },

    #[error("annotation '@{annotation}' on '{target}' has unknown argument '{argument}'")]
    UnknownArgument {
        annotation: String,
        target: String,
        argument: String,
    },

    #[error("annotation '@{annotation}' on '{target}' is missing required argument '{argument}'")]
    MissingArgument {
        annotation: String,
        target: String,
        argument: String,
    },

    #[error("annotation '@{annotation}' on '{target}': invalid value for '{argument}': {reason}")]
    InvalidValue {
        annotation: String,
        target: String,
        argument: String,
        reason: String,
    },
}

/// Result type for model building
pub type ModelResult<T> = Result<T, ModelError>;

/// How a caller should surface a [`TranslateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request: the input itself is wrong
    ClientInput,
    /// The input is well formed but violates a declared invariant
    BusinessRule,
    /// Access denied
    Forbidden,
    /// The translator produced something it should not have
    Internal,
}

/// Per-request translation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error("unknown field '{field}' on type '{type_name}'")]
    UnknownField { type_name: String, field: String },

    #[error("invalid filter '{key}' on '{type_name}': {message}")]
    Filter {
        type_name: String,
        key: String,
        message: String,
    },

    #[error("relationship cardinality violated on '{type_name}.{field}': {message}")]
    Cardinality {
        type_name: String,
        field: String,
        message: String,
    },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("operation '{operation}' is disabled for type '{type_name}'")]
    OperationDisabled { type_name: String, operation: String },

    #[error("invalid input for '{path}': {message}")]
    InvalidInput { path: String, message: String },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// A statement transform rejected or failed to rewrite a statement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("transform '{transform}' rejected the statement: {message}")]
    Rejected { transform: String, message: String },
}

impl TranslateError {
    /// Classification used to pick a response category
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslateError::UnknownField { .. }
            | TranslateError::Filter { .. }
            | TranslateError::OperationDisabled { .. }
            | TranslateError::InvalidInput { .. } => ErrorKind::ClientInput,
            TranslateError::Cardinality { .. } => ErrorKind::BusinessRule,
            TranslateError::Forbidden { .. } => ErrorKind::Forbidden,
            TranslateError::Transform(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn filter(
        type_name: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TranslateError::Filter {
            type_name: type_name.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(path: impl Into<String>, message: impl Into<String>) -> Self {
        TranslateError::InvalidInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify an error raised by the store while running a compiled
    /// statement.
    ///
    /// Guards emitted into statements raise messages starting with
    /// `<prefix>/FORBIDDEN` or `<prefix>/RELATIONSHIP-...`; anything else is
    /// not ours and yields `None`.
    pub fn from_store_message(prefix: &str, message: &str) -> Option<Self> {
        let start = message.find(prefix)?;
        let rest = message[start + prefix.len()..].strip_prefix('/')?;

        if let Some(detail) = rest.strip_prefix(crate::render::FORBIDDEN_CODE) {
            return Some(TranslateError::Forbidden {
                message: detail.trim_start_matches(':').trim().to_string(),
            });
        }

        for code in [crate::render::REQUIRED_CODE, crate::render::SINGLE_CODE] {
            if let Some(detail) = rest.strip_prefix(code) {
                let detail = detail.trim_start_matches(':').trim();
                // "<Type>.<field> <message>"
                let (target, msg) = detail.split_once(' ').unwrap_or((detail, ""));
                let (type_name, field) = target.split_once('.').unwrap_or((target, ""));
                return Some(TranslateError::Cardinality {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    message: msg.to_string(),
                });
            }
        }
        None
    }
}

/// Result type for translation
pub type TranslateResult<T> = Result<T, TranslateError>;
