//! Job completion notifications.
//!
//! This module turns a finished job into an email: the raw attributes are
//! validated into a [`NotificationContext`], rendered against a layout into a
//! [`RenderedDocument`], and delivered through a [`NotificationSender`].

pub mod context;
pub mod email;
pub mod error;
pub mod job;
pub mod render;
pub mod service;
pub mod template;

pub use context::{validate_absolute_url, Branding, JobOutcome, Links, NotificationContext, Stage};
pub use email::{build_message, LogSender, NotificationSender, SmtpSender};
pub use error::{
    FieldError, FieldProblem, NotificationError, TemplateError, ValidationError,
    ValidationErrorBuilder,
};
pub use job::{
    format_duration, format_timestamp, AttributeDefaults, JobOwner, JobRecord, JobStatus,
    NotificationLinks, StageSpec,
};
pub use render::{render, Branch, NotificationRenderer, RenderedDocument};
pub use service::NotificationService;
pub use template::{
    DirectoryTemplateResolver, EmbeddedTemplateResolver, LayoutFormat, NotificationTemplate, Slot,
    TemplateResolver,
};
