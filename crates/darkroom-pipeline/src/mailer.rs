//! Outbound mail
//!
//! Handles confirmation and rejection notifications. The transport is a
//! trait so deployments can post to an HTTP mail API while tests capture
//! messages in memory. Notifications are fire-and-forget: callers at the
//! pipeline boundary log transport failures and move on, and a failed
//! notification never re-triggers the stage that produced it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use tracing::info;

use darkroom_core::types::{MetadataRecord, NotificationKind, NotificationMessage, ObjectEvent};
use darkroom_core::{Error, Result};

use crate::metrics::names;

/// Outbound mail capability
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, from: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Transport posting to a JSON mail API endpoint
pub struct HttpMailTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMailTransport {
    /// The HTTP client is created once at startup and reused across sends.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, to: &str, from: &str, subject: &str, html_body: &str) -> Result<()> {
        let payload = serde_json::json!({
            "to": to,
            "from": from,
            "subject": subject,
            "html": html_body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Transport(format!(
                "mail API returned {}",
                response.status()
            )))
        }
    }
}

/// Transport that only logs; the default when no endpoint is configured
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, to: &str, _from: &str, subject: &str, _html_body: &str) -> Result<()> {
        info!("mail to {}: {}", to, subject);
        Ok(())
    }
}

/// A captured outbound mail
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
}

/// Transport capturing mail in memory, for tests
#[derive(Default)]
pub struct MemoryMailTransport {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MailTransport for MemoryMailTransport {
    async fn send(&self, to: &str, from: &str, subject: &str, html_body: &str) -> Result<()> {
        self.sent.lock().push(SentMail {
            to: to.to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Renders and sends acceptance/rejection notifications
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    from: String,
    to: String,
    accepted_formats: Vec<String>,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        from: impl Into<String>,
        to: impl Into<String>,
        accepted_formats: Vec<String>,
    ) -> Self {
        Self {
            transport,
            from: from.into(),
            to: to.into(),
            accepted_formats,
        }
    }

    /// Send a confirmation for a freshly recorded upload
    pub async fn confirm(&self, record: &MetadataRecord) -> Result<()> {
        self.send(self.render_confirm(record)).await
    }

    /// Send a rejection for a terminally failed event
    pub async fn reject(&self, event: &ObjectEvent, reason: &str) -> Result<()> {
        self.send(self.render_reject(event, reason)).await
    }

    /// Deterministic confirmation template; states the store path.
    pub fn render_confirm(&self, record: &MetadataRecord) -> NotificationMessage {
        let body = format!(
            r#"<html>
  <body>
    <h2>✅ Image Upload Confirmed</h2>
    <p>Hello,</p>
    <p><strong>Your image upload has been recorded. The file is stored at {}.</strong></p>
    <hr />
    <p><strong>Sent by:</strong> Darkroom Ingestion Pipeline</p>
    <p><strong>Contact:</strong> {}</p>
  </body>
</html>"#,
            record.store_uri(),
            self.from,
        );

        NotificationMessage {
            kind: NotificationKind::Confirm,
            recipient: self.to.clone(),
            subject: "Image Upload Confirmed".to_string(),
            html_body: body,
        }
    }

    /// Deterministic rejection template; states the offending key and the
    /// accepted formats.
    pub fn render_reject(&self, event: &ObjectEvent, reason: &str) -> NotificationMessage {
        let formats = self.accepted_formats.join("\" or \"");
        let body = format!(
            r#"<html>
  <body>
    <h2>❌ Image Upload Rejected</h2>
    <p>Hello,</p>
    <p><strong>Your upload of {} to {} was rejected because {}.
    Accepted formats are "{}". Please check the file before uploading again.</strong></p>
    <hr />
    <p><strong>Sent by:</strong> Darkroom Ingestion Pipeline</p>
    <p><strong>Contact:</strong> {}</p>
  </body>
</html>"#,
            event.key,
            event.store_uri(),
            reason,
            formats,
            self.from,
        );

        NotificationMessage {
            kind: NotificationKind::Reject,
            recipient: self.to.clone(),
            subject: "Invalid Image Upload Rejected".to_string(),
            html_body: body,
        }
    }

    async fn send(&self, message: NotificationMessage) -> Result<()> {
        let kind = message.kind.as_str();
        let result = self
            .transport
            .send(&message.recipient, &self.from, &message.subject, &message.html_body)
            .await;

        match &result {
            Ok(()) => counter!(names::MAILS_SENT_TOTAL, "kind" => kind).increment(1),
            Err(_) => counter!(names::MAILS_FAILED_TOTAL, "kind" => kind).increment(1),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::types::EventKind;

    fn notifier(transport: Arc<MemoryMailTransport>) -> Notifier {
        Notifier::new(
            transport,
            "pipeline@example.com",
            "uploads@example.com",
            vec![".jpeg".to_string(), ".png".to_string()],
        )
    }

    #[test]
    fn test_confirm_states_store_path() {
        let message = notifier(Arc::new(MemoryMailTransport::new()))
            .render_confirm(&MetadataRecord::new("photo.png", "b"));

        assert_eq!(message.kind, NotificationKind::Confirm);
        assert!(message.html_body.contains("s3://b/photo.png"));
    }

    #[test]
    fn test_reject_states_key_and_formats() {
        let event = ObjectEvent::new(EventKind::Created, "b", "doc.pdf");
        let message = notifier(Arc::new(MemoryMailTransport::new()))
            .render_reject(&event, "it is not an accepted image format");

        assert_eq!(message.kind, NotificationKind::Reject);
        assert!(message.html_body.contains("doc.pdf"));
        assert!(message.html_body.contains(".jpeg"));
        assert!(message.html_body.contains(".png"));
    }

    #[test]
    fn test_templates_are_deterministic() {
        let notifier = notifier(Arc::new(MemoryMailTransport::new()));
        let record = MetadataRecord::new("photo.png", "b");
        assert_eq!(notifier.render_confirm(&record), notifier.render_confirm(&record));
    }

    #[tokio::test]
    async fn test_send_through_transport() {
        let transport = Arc::new(MemoryMailTransport::new());
        let notifier = notifier(transport.clone());

        notifier
            .confirm(&MetadataRecord::new("photo.png", "b"))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "uploads@example.com");
        assert_eq!(sent[0].subject, "Image Upload Confirmed");
    }
}
