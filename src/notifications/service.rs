//! Notification service: job record in, delivered email out.
//!
//! Ties the pieces together in the order the job tracker needs them:
//! attributes from the job record, a validated context, a rendered document,
//! and finally delivery. Delivery is only attempted once a complete document
//! exists; a construction failure never reaches the sender.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use super::context::NotificationContext;
use super::email::NotificationSender;
use super::error::NotificationError;
use super::job::{AttributeDefaults, JobRecord};
use super::render::{NotificationRenderer, RenderedDocument};

pub struct NotificationService {
    renderer: NotificationRenderer,
    defaults: AttributeDefaults,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationService {
    pub fn new(
        renderer: NotificationRenderer,
        defaults: AttributeDefaults,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            renderer,
            defaults,
            sender,
        }
    }

    /// Build and render the notification for a finished job without sending it
    pub fn prepare(&self, job: &JobRecord) -> Result<RenderedDocument, NotificationError> {
        let attrs = job.to_attributes(&self.defaults, Utc::now())?;
        self.render_attributes(&attrs)
    }

    /// Validate a raw attribute map and render it
    pub fn render_attributes(
        &self,
        attrs: &Map<String, Value>,
    ) -> Result<RenderedDocument, NotificationError> {
        let job_id = attrs
            .get("job_id")
            .and_then(Value::as_str)
            .unwrap_or("<missing>");

        let context = NotificationContext::from_attributes(attrs).map_err(|e| {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                "Notification input failed validation"
            );
            e
        })?;

        let document = self.renderer.render(&context)?;
        tracing::debug!(
            job_id = %job_id,
            branch = %document.branch,
            "Rendered job notification"
        );
        Ok(document)
    }

    /// Deliver an already rendered document
    pub async fn deliver(
        &self,
        recipient: &str,
        document: &RenderedDocument,
    ) -> Result<(), NotificationError> {
        self.sender.send(recipient, document).await
    }

    /// Render and deliver the notification to the job owner
    pub async fn notify(&self, job: &JobRecord) -> Result<RenderedDocument, NotificationError> {
        let document = self.prepare(job)?;
        self.deliver(&job.owner.email, &document).await?;

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            "Job notification sent"
        );
        Ok(document)
    }

    /// Like [`notify`](Self::notify), but failures are logged and swallowed so
    /// a broken notification never affects the job itself. Returns whether the
    /// notification was delivered.
    pub async fn notify_best_effort(&self, job: &JobRecord) -> bool {
        match self.notify(job).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    error = %e,
                    "Failed to send job notification"
                );
                false
            }
        }
    }
}
