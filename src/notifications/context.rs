//! Notification context: the validated view of a finished job.
//!
//! The job tracker hands over a loosely typed attribute map. This module turns
//! it into a [`NotificationContext`] whose optional values are real `Option`s
//! and whose outcome is a two-variant enum, so the renderer can rely on
//! presence instead of truthiness. Construction is the only step that can
//! fail; a context that exists is always renderable.

use serde_json::{Map, Value};
use url::Url;

use super::error::{FieldProblem, ValidationError, ValidationErrorBuilder};

/// One execution stage of a job, in run order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub main_file: String,
    pub image_name: String,
    pub image_tag: String,
}

impl Stage {
    /// The display line for this stage: `main_file - image_name:image_tag`
    pub fn line(&self) -> String {
        format!("{} - {}:{}", self.main_file, self.image_name, self.image_tag)
    }
}

/// Links used by the action button and footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    pub submission_url: String,
    pub docs_url: String,
    pub base_url: String,
}

/// Optional branding assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branding {
    pub logo_url: Option<String>,
}

/// How the job ended. The only source of truth for status-dependent content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure { error_message: Option<String> },
}

/// Validated, immutable snapshot of one job used to render one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContext {
    recipient_name: String,
    job_id: String,
    outcome: JobOutcome,
    status_text: String,
    submission_time: Option<String>,
    completion_time: Option<String>,
    execution_time: Option<String>,
    stages: Option<Vec<Stage>>,
    links: Links,
    branding: Branding,
    current_year: i32,
}

impl NotificationContext {
    /// Build a context from a raw attribute map.
    ///
    /// All problems are collected before returning, so the error names every
    /// missing or malformed field.
    pub fn from_attributes(attrs: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut errors = ValidationErrorBuilder::new();
        let fields = Fields::new(attrs);

        let recipient_name = fields.required_str("recipient_name", &mut errors);
        let job_id = fields.required_str("job_id", &mut errors);
        let is_success = fields.required_bool("is_success", &mut errors);
        let status_text = fields.required_str("status_text", &mut errors);
        let submission_time = fields.optional_str("submission_time", &mut errors);
        let completion_time = fields.optional_str("completion_time", &mut errors);
        let execution_time = fields.optional_str("execution_time", &mut errors);
        let error_message = fields.optional_str("error_message", &mut errors);
        let stages = parse_stages(attrs.get("stages"), &mut errors);
        let links = parse_links(attrs.get("links"), &mut errors);
        let branding = parse_branding(attrs.get("branding"), &mut errors);
        let current_year = fields.required_year("current_year", &mut errors);

        let (
            Some(recipient_name),
            Some(job_id),
            Some(is_success),
            Some(status_text),
            Some(links),
            Some(current_year),
        ) = (recipient_name, job_id, is_success, status_text, links, current_year)
        else {
            return Err(errors.into_error());
        };
        errors.finish()?;

        let outcome = if is_success {
            if error_message.is_some() {
                tracing::debug!(
                    job_id = %job_id,
                    "Ignoring error_message on a successful job"
                );
            }
            JobOutcome::Success
        } else {
            JobOutcome::Failure { error_message }
        };

        Ok(Self {
            recipient_name,
            job_id,
            outcome,
            status_text,
            submission_time,
            completion_time,
            execution_time,
            stages,
            links,
            branding: branding.unwrap_or_default(),
            current_year,
        })
    }

    pub fn recipient_name(&self) -> &str {
        &self.recipient_name
    }

    /// Opaque job identifier, rendered verbatim
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn outcome(&self) -> &JobOutcome {
        &self.outcome
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success)
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn submission_time(&self) -> Option<&str> {
        self.submission_time.as_deref()
    }

    pub fn completion_time(&self) -> Option<&str> {
        self.completion_time.as_deref()
    }

    pub fn execution_time(&self) -> Option<&str> {
        self.execution_time.as_deref()
    }

    /// Error detail, only ever present on a failed job
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Success => None,
            JobOutcome::Failure { error_message } => error_message.as_deref(),
        }
    }

    /// Stages in execution order; `Some` is never empty
    pub fn stages(&self) -> Option<&[Stage]> {
        self.stages.as_deref()
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn logo_url(&self) -> Option<&str> {
        self.branding.logo_url.as_deref()
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }
}

/// Typed field lookup over a JSON object, with dotted error paths
struct Fields<'a> {
    map: &'a Map<String, Value>,
    prefix: String,
}

impl<'a> Fields<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            prefix: String::new(),
        }
    }

    fn nested(map: &'a Map<String, Value>, prefix: impl Into<String>) -> Self {
        Self {
            map,
            prefix: prefix.into(),
        }
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn required_str(&self, key: &str, errors: &mut ValidationErrorBuilder) -> Option<String> {
        match self.get(key) {
            None => {
                errors.add(self.path(key), FieldProblem::Missing);
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                errors.add(self.path(key), FieldProblem::Empty);
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.add(self.path(key), FieldProblem::WrongType { expected: "a string" });
                None
            }
        }
    }

    /// Absent, null, empty and whitespace-only values all normalize to `None`
    fn optional_str(&self, key: &str, errors: &mut ValidationErrorBuilder) -> Option<String> {
        match self.get(key) {
            None => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                errors.add(self.path(key), FieldProblem::WrongType { expected: "a string" });
                None
            }
        }
    }

    fn required_bool(&self, key: &str, errors: &mut ValidationErrorBuilder) -> Option<bool> {
        match self.get(key) {
            None => {
                errors.add(self.path(key), FieldProblem::Missing);
                None
            }
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                errors.add(self.path(key), FieldProblem::WrongType { expected: "a boolean" });
                None
            }
        }
    }

    fn required_year(&self, key: &str, errors: &mut ValidationErrorBuilder) -> Option<i32> {
        match self.get(key) {
            None => {
                errors.add(self.path(key), FieldProblem::Missing);
                None
            }
            Some(Value::Number(n)) => match n.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Some(year) => Some(year),
                None => {
                    errors.add(
                        self.path(key),
                        FieldProblem::Malformed(format!("must be a whole year, got {}", n)),
                    );
                    None
                }
            },
            Some(_) => {
                errors.add(self.path(key), FieldProblem::WrongType { expected: "an integer" });
                None
            }
        }
    }

    fn required_url(&self, key: &str, errors: &mut ValidationErrorBuilder) -> Option<String> {
        let raw = self.required_str(key, errors)?;
        self.check_url(key, raw, errors)
    }

    fn optional_url(&self, key: &str, errors: &mut ValidationErrorBuilder) -> Option<String> {
        let raw = self.optional_str(key, errors)?;
        self.check_url(key, raw, errors)
    }

    fn check_url(
        &self,
        key: &str,
        raw: String,
        errors: &mut ValidationErrorBuilder,
    ) -> Option<String> {
        let trimmed = raw.trim();
        match validate_absolute_url(trimmed) {
            Ok(()) => Some(trimmed.to_string()),
            Err(reason) => {
                errors.add(self.path(key), FieldProblem::Malformed(reason));
                None
            }
        }
    }
}

/// Check that a URL is an absolute `http`/`https` URL with a host.
/// Links end up in `href` and `src` attributes, so other schemes are refused.
pub fn validate_absolute_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("must be an absolute URL ({})", e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("must use http or https, got '{}'", url.scheme()));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(format!("must include a host, got scheme '{}' only", url.scheme())),
    }
}

fn parse_stages(value: Option<&Value>, errors: &mut ValidationErrorBuilder) -> Option<Vec<Stage>> {
    let items = match value {
        None | Some(Value::Null) => return None,
        Some(Value::Array(items)) => items,
        Some(_) => {
            errors.add("stages", FieldProblem::WrongType { expected: "an array" });
            return None;
        }
    };

    if items.is_empty() {
        return None;
    }

    let mut stages = Vec::with_capacity(items.len());
    let mut complete = true;

    for (index, item) in items.iter().enumerate() {
        let path = format!("stages[{}]", index);
        let Value::Object(map) = item else {
            errors.add(path, FieldProblem::WrongType { expected: "an object" });
            complete = false;
            continue;
        };

        let fields = Fields::nested(map, path);
        let main_file = fields.required_str("main_file", errors);
        let image_name = fields.required_str("image_name", errors);
        let image_tag = fields.required_str("image_tag", errors);

        match (main_file, image_name, image_tag) {
            (Some(main_file), Some(image_name), Some(image_tag)) => stages.push(Stage {
                main_file,
                image_name,
                image_tag,
            }),
            _ => complete = false,
        }
    }

    // All-or-nothing: a single bad stage has already failed construction
    complete.then_some(stages)
}

fn parse_links(value: Option<&Value>, errors: &mut ValidationErrorBuilder) -> Option<Links> {
    let map = match value {
        None | Some(Value::Null) => {
            errors.add("links", FieldProblem::Missing);
            return None;
        }
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.add("links", FieldProblem::WrongType { expected: "an object" });
            return None;
        }
    };

    let fields = Fields::nested(map, "links");
    let submission_url = fields.required_url("submission_url", errors);
    let docs_url = fields.required_url("docs_url", errors);
    let base_url = fields.required_url("base_url", errors);

    Some(Links {
        submission_url: submission_url?,
        docs_url: docs_url?,
        base_url: base_url?,
    })
}

fn parse_branding(value: Option<&Value>, errors: &mut ValidationErrorBuilder) -> Option<Branding> {
    let map = match value {
        None | Some(Value::Null) => return None,
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.add("branding", FieldProblem::WrongType { expected: "an object" });
            return None;
        }
    };

    let fields = Fields::nested(map, "branding");
    Some(Branding {
        logo_url: fields.optional_url("logo_url", errors),
    })
}
