//! Notification templates and the slot contract.
//!
//! A template is static content: an HTML layout, a plain-text layout and a
//! little branding. Layouts are tera templates that print named slots with
//! `{{ slot }}`. Both layouts are registered once when loaded, and every
//! problem (syntax error, unknown slot, missing slot) is reported then.
//!
//! Slot values reach tera as finished fragments: the renderer has already
//! escaped whatever goes into the HTML layout, so autoescaping is off. Tera
//! prints values as they are and never parses them as template source.

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tera::{Context, Tera};

use super::error::TemplateError;

/// Default layouts compiled into the binary
const DEFAULT_HTML_LAYOUT: &str = include_str!("../../templates/notification.html");
const DEFAULT_TEXT_LAYOUT: &str = include_str!("../../templates/notification.txt");

/// File names looked up by [`DirectoryTemplateResolver`], also used as the
/// tera template names
pub const HTML_LAYOUT_FILE: &str = "notification.html";
pub const TEXT_LAYOUT_FILE: &str = "notification.txt";

/// Named insertion points a layout exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Title,
    Logo,
    StatusBanner,
    Greeting,
    JobDetails,
    Stages,
    BranchContent,
    Action,
    Footer,
}

impl Slot {
    pub const ALL: [Slot; 9] = [
        Slot::Title,
        Slot::Logo,
        Slot::StatusBanner,
        Slot::Greeting,
        Slot::JobDetails,
        Slot::Stages,
        Slot::BranchContent,
        Slot::Action,
        Slot::Footer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Title => "title",
            Slot::Logo => "logo",
            Slot::StatusBanner => "status_banner",
            Slot::Greeting => "greeting",
            Slot::JobDetails => "job_details",
            Slot::Stages => "stages",
            Slot::BranchContent => "branch_content",
            Slot::Action => "action",
            Slot::Footer => "footer",
        }
    }

    /// Whether a layout of the given format must contain this slot.
    /// Plain text has nowhere to put an image, so it may leave out the logo.
    pub fn required_in(&self, format: LayoutFormat) -> bool {
        !matches!((self, format), (Slot::Logo, LayoutFormat::Text))
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutFormat {
    Html,
    Text,
}

impl LayoutFormat {
    fn label(&self) -> &'static str {
        match self {
            LayoutFormat::Html => "html",
            LayoutFormat::Text => "text",
        }
    }

    fn template_name(&self) -> &'static str {
        match self {
            LayoutFormat::Html => HTML_LAYOUT_FILE,
            LayoutFormat::Text => TEXT_LAYOUT_FILE,
        }
    }
}

/// Static template content shared by every render
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    engine: Tera,
    /// Product name used in the subject, greeting and copyright line
    pub product_name: String,
    /// Support address shown in the footer
    pub support_email: String,
}

impl NotificationTemplate {
    /// Register both layouts and check the slot contract
    pub fn from_sources(
        html_source: &str,
        text_source: &str,
        product_name: impl Into<String>,
        support_email: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let mut engine = Tera::default();
        engine.autoescape_on(vec![]);
        engine
            .add_raw_templates(vec![
                (HTML_LAYOUT_FILE, html_source),
                (TEXT_LAYOUT_FILE, text_source),
            ])
            .map_err(|e| TemplateError::Syntax {
                message: describe(&e),
            })?;

        let template = Self {
            engine,
            product_name: product_name.into(),
            support_email: support_email.into(),
        };
        template.check_slots(LayoutFormat::Html)?;
        template.check_slots(LayoutFormat::Text)?;
        Ok(template)
    }

    /// Render one layout with the value supplied for every slot
    pub fn fill<F>(&self, format: LayoutFormat, mut value: F) -> Result<String, TemplateError>
    where
        F: FnMut(Slot) -> String,
    {
        let mut context = Context::new();
        for slot in Slot::ALL {
            context.insert(slot.as_str(), &value(slot));
        }

        self.engine
            .render(format.template_name(), &context)
            .map_err(|e| TemplateError::Render {
                layout: format.label(),
                message: describe(&e),
            })
    }

    /// Render with a marker per slot and confirm every required marker shows up.
    /// Also rejects layouts that print variables outside the slot set.
    fn check_slots(&self, format: LayoutFormat) -> Result<(), TemplateError> {
        let rendered = self.fill(format, slot_marker)?;
        for slot in Slot::ALL {
            if slot.required_in(format) && !rendered.contains(&slot_marker(slot)) {
                return Err(TemplateError::MissingSlot {
                    layout: format.label(),
                    slot: slot.as_str(),
                });
            }
        }
        Ok(())
    }
}

fn slot_marker(slot: Slot) -> String {
    format!("\u{1}slot:{}\u{1}", slot)
}

/// Tera keeps the useful detail (line, variable name) in the source chain
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Supplies the static template the renderer fills in
pub trait TemplateResolver: Send + Sync {
    fn resolve(&self) -> Result<Arc<NotificationTemplate>, TemplateError>;
}

/// Resolver backed by the layouts compiled into the binary
#[derive(Debug, Clone)]
pub struct EmbeddedTemplateResolver {
    product_name: String,
    support_email: String,
}

impl EmbeddedTemplateResolver {
    pub fn new(product_name: impl Into<String>, support_email: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            support_email: support_email.into(),
        }
    }
}

impl TemplateResolver for EmbeddedTemplateResolver {
    fn resolve(&self) -> Result<Arc<NotificationTemplate>, TemplateError> {
        let template = NotificationTemplate::from_sources(
            DEFAULT_HTML_LAYOUT,
            DEFAULT_TEXT_LAYOUT,
            self.product_name.clone(),
            self.support_email.clone(),
        )?;
        Ok(Arc::new(template))
    }
}

/// Resolver that reads `notification.html` and `notification.txt` from a directory
#[derive(Debug, Clone)]
pub struct DirectoryTemplateResolver {
    dir: PathBuf,
    product_name: String,
    support_email: String,
}

impl DirectoryTemplateResolver {
    pub fn new(
        dir: impl Into<PathBuf>,
        product_name: impl Into<String>,
        support_email: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            product_name: product_name.into(),
            support_email: support_email.into(),
        }
    }

    fn read(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.dir.join(name);
        std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: display_path(&path),
            source,
        })
    }
}

impl TemplateResolver for DirectoryTemplateResolver {
    fn resolve(&self) -> Result<Arc<NotificationTemplate>, TemplateError> {
        let html = self.read(HTML_LAYOUT_FILE)?;
        let text = self.read(TEXT_LAYOUT_FILE)?;
        let template = NotificationTemplate::from_sources(
            &html,
            &text,
            self.product_name.clone(),
            self.support_email.clone(),
        )?;

        tracing::info!(dir = %self.dir.display(), "Loaded notification templates");
        Ok(Arc::new(template))
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_slots_html() -> String {
        Slot::ALL
            .iter()
            .map(|slot| format!("<div>{{{{ {} }}}}</div>", slot))
            .collect()
    }

    fn all_slots_text() -> String {
        Slot::ALL
            .iter()
            .filter(|slot| slot.required_in(LayoutFormat::Text))
            .map(|slot| format!("{{{{{}}}}}\n", slot))
            .collect()
    }

    fn load(html: &str, text: &str) -> Result<NotificationTemplate, TemplateError> {
        NotificationTemplate::from_sources(html, text, "Acme", "help@acme.test")
    }

    #[test]
    fn test_embedded_layouts_are_valid() {
        let template = EmbeddedTemplateResolver::new("SIVACOR", "support@sivacor.org")
            .resolve()
            .unwrap();
        assert_eq!(template.product_name, "SIVACOR");

        let html = template.fill(LayoutFormat::Html, slot_marker).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(&slot_marker(Slot::Logo)));

        let text = template.fill(LayoutFormat::Text, slot_marker).unwrap();
        assert!(text.contains(&slot_marker(Slot::Footer)));
        assert!(!text.contains(&slot_marker(Slot::Logo)));
    }

    #[test]
    fn test_fill_accepts_spacing_inside_markers() {
        let template = load(&all_slots_html(), &all_slots_text()).unwrap();
        let filled = template
            .fill(LayoutFormat::Html, |slot| slot.as_str().to_uppercase())
            .unwrap();
        assert!(filled.contains("<div>STATUS_BANNER</div>"));
        assert!(!filled.contains("{{"));
    }

    #[test]
    fn test_fill_does_not_escape_fragments() {
        let template = load(&all_slots_html(), &all_slots_text()).unwrap();
        let filled = template
            .fill(LayoutFormat::Html, |slot| match slot {
                Slot::StatusBanner => r#"<div class="status-banner">SUCCESS</div>"#.to_string(),
                _ => String::new(),
            })
            .unwrap();
        assert!(filled.contains(r#"<div><div class="status-banner">SUCCESS</div></div>"#));
    }

    #[test]
    fn test_unknown_slot_rejected_at_load() {
        let html = format!("{}{{{{ recipient_email }}}}", all_slots_html());
        let err = load(&html, &all_slots_text()).unwrap_err();
        match err {
            TemplateError::Render { layout, message } => {
                assert_eq!(layout, "html");
                assert!(message.contains("recipient_email"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unterminated_marker_rejected_at_load() {
        let html = format!("{}{{{{ footer", all_slots_html());
        let err = load(&html, &all_slots_text()).unwrap_err();
        match err {
            TemplateError::Syntax { message } => assert!(message.contains(HTML_LAYOUT_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_slot_rejected_at_load() {
        let html = all_slots_html().replace("{{ action }}", "");
        let err = load(&html, &all_slots_text()).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::MissingSlot { layout: "html", slot: "action" }
        ));
    }

    #[test]
    fn test_slot_hidden_behind_condition_is_missing() {
        let html = all_slots_html().replace("{{ footer }}", "{% if false %}{{ footer }}{% endif %}");
        let err = load(&html, &all_slots_text()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingSlot { slot: "footer", .. }));
    }

    #[test]
    fn test_text_layout_may_omit_logo() {
        assert!(load(&all_slots_html(), &all_slots_text()).is_ok());
        // the same source is not a valid HTML layout
        assert!(matches!(
            load(&all_slots_text(), &all_slots_text()).unwrap_err(),
            TemplateError::MissingSlot { layout: "html", slot: "logo" }
        ));
    }

    #[test]
    fn test_fill_never_parses_values() {
        let template = load(&all_slots_html(), &all_slots_text()).unwrap();
        let filled = template
            .fill(LayoutFormat::Text, |slot| match slot {
                Slot::Greeting => "{{ footer }} {% if true %}x{% endif %}".to_string(),
                Slot::Footer => "FOOTER".to_string(),
                _ => String::new(),
            })
            .unwrap();
        assert!(filled.contains("{{ footer }} {% if true %}x{% endif %}"));
        assert_eq!(filled.matches("FOOTER").count(), 1);
    }

    #[test]
    fn test_directory_resolver_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HTML_LAYOUT_FILE), all_slots_html()).unwrap();
        std::fs::write(dir.path().join(TEXT_LAYOUT_FILE), all_slots_text()).unwrap();

        let resolver = DirectoryTemplateResolver::new(dir.path(), "Acme", "help@acme.test");
        let template = resolver.resolve().unwrap();
        assert_eq!(template.support_email, "help@acme.test");
    }

    #[test]
    fn test_directory_resolver_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HTML_LAYOUT_FILE), all_slots_html()).unwrap();

        let err = DirectoryTemplateResolver::new(dir.path(), "Acme", "help@acme.test")
            .resolve()
            .unwrap_err();
        match err {
            TemplateError::Io { path, .. } => assert!(path.ends_with(TEXT_LAYOUT_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }
}
