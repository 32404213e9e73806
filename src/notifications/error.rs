//! Error types for notification construction, templates and delivery.
//!
//! Two phases are expected to fail: building a [`NotificationContext`] from
//! raw job attributes, and loading a template. Loading renders each layout
//! once, so the built-in layouts always render; only a custom layout whose
//! logic depends on particular values can still fail at render time.
//!
//! [`NotificationContext`]: super::NotificationContext

use std::fmt;

use thiserror::Error;

/// What is wrong with a single input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    /// Required field absent or null
    Missing,
    /// Required string field present but empty
    Empty,
    /// Present with the wrong JSON type
    WrongType { expected: &'static str },
    /// Present with the right type but an unusable value (bad URL, out of range)
    Malformed(String),
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "is required"),
            Self::Empty => write!(f, "must not be empty"),
            Self::WrongType { expected } => write!(f, "must be {}", expected),
            Self::Malformed(reason) => write!(f, "{}", reason),
        }
    }
}

/// A field path together with its problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the field, e.g. `links.docs_url` or `stages[1].image_tag`
    pub field: String,
    pub problem: FieldProblem,
}

/// Raised when raw job attributes cannot be turned into a notification context.
///
/// Every offending field is reported, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid notification input: {}", join_field_errors(.errors))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// All field errors in the order they were found
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Paths of the offending fields
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    /// Whether the given field path was reported
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.problem))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Builder for collecting multiple field errors before failing
#[derive(Debug, Default)]
pub struct ValidationErrorBuilder {
    errors: Vec<FieldError>,
}

impl ValidationErrorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem for a field
    pub fn add(&mut self, field: impl Into<String>, problem: FieldProblem) -> &mut Self {
        self.errors.push(FieldError {
            field: field.into(),
            problem,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert into an error; used when a required value is known to be unset
    pub(crate) fn into_error(self) -> ValidationError {
        ValidationError {
            errors: self.errors,
        }
    }

    /// Return Ok(()) if nothing was recorded, otherwise the collected error
    pub fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

/// Problems with a notification layout
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid layout syntax: {message}")]
    Syntax { message: String },

    #[error("{layout} layout failed to render: {message}")]
    Render { layout: &'static str, message: String },

    #[error("{layout} layout is missing required slot '{slot}'")]
    MissingSlot { layout: &'static str, slot: &'static str },

    #[error("failed to read template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for the notification pipeline
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("job {job_id} is {status}; notifications are only sent for finished jobs")]
    JobNotFinished { job_id: String, status: String },

    #[error("failed to deliver notification: {0}")]
    Delivery(String),
}
