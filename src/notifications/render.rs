//! Notification rendering.
//!
//! Turns a validated [`NotificationContext`] into an HTML document, a
//! plain-text alternative and a subject line. Rendering is a pure function of
//! the context and the template: it holds no state and gives byte-identical
//! output for the same input. Templates are checked when they are loaded, so
//! the only failure left is a layout that breaks on real values.
//!
//! Content depends on exactly one discriminant, the job outcome. There are two
//! branches and no fallback: [`Branch::Success`] lists the artifacts a
//! finished job produces, [`Branch::Failure`] shows the optional error detail
//! and troubleshooting tips. Every free-text value is HTML-escaped before it
//! reaches the HTML layout.

use std::fmt::Write as _;
use std::sync::Arc;

use super::context::NotificationContext;
use super::error::TemplateError;
use super::template::{LayoutFormat, NotificationTemplate, Slot, TemplateResolver};

/// What a successful job always delivers
const SUCCESS_ARTIFACTS: [&str; 4] = [
    "Execution logs for every stage",
    "Output files produced by your code",
    "A signed Transparent Research Object (TRO) describing the run",
    "A resource usage report (CPU, memory and network)",
];

/// Generic advice included with every failure notification
const TROUBLESHOOTING_TIPS: [&str; 4] = [
    "Review the execution log of the failing stage for the first reported error",
    "Check that the main file name and path match your uploaded package",
    "Make sure every data file your code reads is included in the upload",
    "Confirm the selected container image and tag provide the software versions you need",
];

/// The rendering path, selected solely by the job outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Success,
    Failure,
}

impl Branch {
    pub fn of(context: &NotificationContext) -> Self {
        if context.is_success() {
            Branch::Success
        } else {
            Branch::Failure
        }
    }

    /// Banner label
    pub fn label(&self) -> &'static str {
        match self {
            Branch::Success => "SUCCESS",
            Branch::Failure => "FAILED",
        }
    }

    /// Visual treatment token used as the banner's CSS class
    pub fn css_class(&self) -> &'static str {
        match self {
            Branch::Success => "status-success",
            Branch::Failure => "status-failure",
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            Branch::Success => "completed successfully",
            Branch::Failure => "failed",
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            Branch::Success => "Job Completed",
            Branch::Failure => "Job Failed",
        }
    }

    /// Label of the primary action link; both branches point at the submission URL
    pub fn action_label(&self) -> &'static str {
        match self {
            Branch::Success => "View Results",
            Branch::Failure => "View Details",
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branch::Success => write!(f, "success"),
            Branch::Failure => write!(f, "failure"),
        }
    }
}

/// Output handed to the delivery collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub branch: Branch,
    /// Subject line, plain text on a single line
    pub subject: String,
    /// The job's status label, unchanged
    pub status_text: String,
    pub html: String,
    pub text: String,
}

/// Render a context with the given template
pub fn render(
    context: &NotificationContext,
    template: &NotificationTemplate,
) -> Result<RenderedDocument, TemplateError> {
    let branch = Branch::of(context);

    let html = template.fill(LayoutFormat::Html, |slot| {
        html_slot(slot, branch, context, template)
    })?;
    let text = template.fill(LayoutFormat::Text, |slot| {
        text_slot(slot, branch, context, template)
    })?;

    Ok(RenderedDocument {
        branch,
        subject: subject_line(branch, context, template),
        status_text: context.status_text().to_string(),
        html,
        text,
    })
}

/// Renderer bound to a template loaded once at startup.
///
/// Cloning is cheap and the renderer is `Send + Sync`, so one instance can
/// serve any number of concurrent renders.
#[derive(Debug, Clone)]
pub struct NotificationRenderer {
    template: Arc<NotificationTemplate>,
}

impl NotificationRenderer {
    pub fn new(template: Arc<NotificationTemplate>) -> Self {
        Self { template }
    }

    pub fn from_resolver(resolver: &dyn TemplateResolver) -> Result<Self, TemplateError> {
        Ok(Self::new(resolver.resolve()?))
    }

    pub fn template(&self) -> &NotificationTemplate {
        &self.template
    }

    pub fn render(&self, context: &NotificationContext) -> Result<RenderedDocument, TemplateError> {
        render(context, &self.template)
    }
}

fn subject_line(
    branch: Branch,
    context: &NotificationContext,
    template: &NotificationTemplate,
) -> String {
    let subject = format!(
        "[{}] Job {} {}",
        template.product_name,
        context.job_id(),
        branch.summary()
    );
    // Header values must stay on one line
    subject
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Optional job detail rows, in display order
fn detail_rows(context: &NotificationContext) -> Vec<(&'static str, &str)> {
    let mut rows = vec![
        ("Job ID:", context.job_id()),
        ("Status:", context.status_text()),
    ];
    if let Some(submitted) = context.submission_time() {
        rows.push(("Submitted:", submitted));
    }
    if let Some(completed) = context.completion_time() {
        rows.push(("Completed:", completed));
    }
    if let Some(elapsed) = context.execution_time() {
        rows.push(("Execution Time:", elapsed));
    }
    rows
}

fn html_slot(
    slot: Slot,
    branch: Branch,
    context: &NotificationContext,
    template: &NotificationTemplate,
) -> String {
    let product = html_escape(&template.product_name);

    match slot {
        Slot::Title => format!("{} {}", product, branch.heading()),
        Slot::Logo => context
            .logo_url()
            .map(|url| {
                format!(
                    r#"<img src="{}" alt="{} logo" class="logo">"#,
                    html_escape(url),
                    product
                )
            })
            .unwrap_or_default(),
        Slot::StatusBanner => format!(
            r#"<div class="status-banner {}">{}</div>"#,
            branch.css_class(),
            branch.label()
        ),
        Slot::Greeting => {
            let sentence = match branch {
                Branch::Success => format!("Your {} job has {}.", product, branch.summary()),
                Branch::Failure => format!("Unfortunately, your {} job has {}.", product, branch.summary()),
            };
            format!(
                "<p>Dear {},</p>\n<p>{}</p>",
                html_escape(context.recipient_name()),
                sentence
            )
        }
        Slot::JobDetails => {
            let mut out = String::from(r#"<table class="details">"#);
            for (i, (label, value)) in detail_rows(context).into_iter().enumerate() {
                let value = if i == 0 {
                    format!("<code>{}</code>", html_escape(value))
                } else {
                    html_escape(value)
                };
                let _ = write!(out, "\n<tr><th>{}</th><td>{}</td></tr>", label, value);
            }
            out.push_str("\n</table>");
            out
        }
        Slot::Stages => match context.stages() {
            None => String::new(),
            Some(stages) => {
                let mut out = String::from("<div class=\"stages\">\n<strong>Stages:</strong>\n<ol>");
                for stage in stages {
                    let _ = write!(
                        out,
                        "\n<li><code>{} - {}:{}</code></li>",
                        html_escape(&stage.main_file),
                        html_escape(&stage.image_name),
                        html_escape(&stage.image_tag)
                    );
                }
                out.push_str("\n</ol>\n</div>");
                out
            }
        },
        Slot::BranchContent => match branch {
            Branch::Success => {
                format!("<p>Your results include:</p>\n{}", html_list(&SUCCESS_ARTIFACTS))
            }
            Branch::Failure => {
                let mut out = String::new();
                if let Some(message) = context.error_message() {
                    let _ = write!(
                        out,
                        "<div class=\"error-block\"><strong>Error details:</strong><pre>{}</pre></div>\n",
                        html_escape(message)
                    );
                }
                let _ = write!(
                    out,
                    "<p>Troubleshooting tips:</p>\n{}",
                    html_list(&TROUBLESHOOTING_TIPS)
                );
                out
            }
        },
        Slot::Action => format!(
            r#"<div class="button-container"><a href="{}" class="button">{}</a></div>"#,
            html_escape(&context.links().submission_url),
            branch.action_label()
        ),
        Slot::Footer => {
            let links = context.links();
            let support = html_escape(&template.support_email);
            format!(
                "<p><a href=\"{}\">Documentation</a> &middot; <a href=\"{}\">{}</a></p>\n\
                 <p>Questions? Contact us at <a href=\"mailto:{}\">{}</a>.</p>\n\
                 <p>&copy; {} {}. All rights reserved.</p>",
                html_escape(&links.docs_url),
                html_escape(&links.base_url),
                product,
                support,
                support,
                context.current_year(),
                product
            )
        }
    }
}

fn text_slot(
    slot: Slot,
    branch: Branch,
    context: &NotificationContext,
    template: &NotificationTemplate,
) -> String {
    let product = &template.product_name;

    match slot {
        Slot::Title => format!("{} {}", product, branch.heading()),
        Slot::Logo => String::new(),
        Slot::StatusBanner => format!("Result: {}", branch.label()),
        Slot::Greeting => {
            let sentence = match branch {
                Branch::Success => format!("Your {} job has {}.", product, branch.summary()),
                Branch::Failure => format!("Unfortunately, your {} job has {}.", product, branch.summary()),
            };
            format!("Dear {},\n\n{}", context.recipient_name(), sentence)
        }
        Slot::JobDetails => detail_rows(context)
            .into_iter()
            .map(|(label, value)| format!("{} {}", label, value))
            .collect::<Vec<_>>()
            .join("\n"),
        Slot::Stages => match context.stages() {
            None => String::new(),
            Some(stages) => {
                let mut out = String::from("Stages:");
                for (i, stage) in stages.iter().enumerate() {
                    let _ = write!(out, "\n  {}. {}", i + 1, stage.line());
                }
                out
            }
        },
        Slot::BranchContent => match branch {
            Branch::Success => format!("Your results include:\n{}", text_list(&SUCCESS_ARTIFACTS)),
            Branch::Failure => {
                let mut out = String::new();
                if let Some(message) = context.error_message() {
                    let _ = write!(out, "Error details:\n{}\n\n", message);
                }
                let _ = write!(out, "Troubleshooting tips:\n{}", text_list(&TROUBLESHOOTING_TIPS));
                out
            }
        },
        Slot::Action => format!("{}: {}", branch.action_label(), context.links().submission_url),
        Slot::Footer => {
            let links = context.links();
            format!(
                "Documentation: {}\n{}: {}\nSupport: {}\n(c) {} {}. All rights reserved.",
                links.docs_url,
                product,
                links.base_url,
                template.support_email,
                context.current_year(),
                product
            )
        }
    }
}

fn html_list(items: &[&str]) -> String {
    let mut out = String::from("<ul>");
    for item in items {
        let _ = write!(out, "\n<li>{}</li>", html_escape(item));
    }
    out.push_str("\n</ul>");
    out
}

fn text_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("  - {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
