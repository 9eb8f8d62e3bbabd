//! Outbound email
//!
//! OTP and password-reset messages go through the `Mailer` trait. Delivery
//! failures surface to the caller as a hard error.

use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn otp(from: &str, to: &str, name: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Your one-time login code".to_string(),
            body: format!(
                "Hello {},\n\nYour verification code is {}. It expires in {} minutes.\n",
                name, code, ttl_minutes
            ),
        }
    }

    pub fn password_reset(from: &str, to: &str, name: &str, link: &str, ttl_minutes: i64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body: format!(
                "Hello {},\n\nUse the link below to choose a new password. It is valid for {} minutes.\n\n{}\n",
                name, ttl_minutes, link
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email dispatched");
        tracing::debug!(body = %message.body, "Email body");
        Ok(())
    }
}

/// Keeps every message in memory; used by tests to read OTP codes and reset links
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<EmailMessage>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails
    pub fn failing() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::Delivery("mail server unavailable".to_string()));
        }
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer
            .send(EmailMessage::otp("bank@test", "ada@example.com", "Ada", "042042", 10))
            .await
            .unwrap();

        let last = mailer.last_to("ada@example.com").unwrap();
        assert!(last.body.contains("042042"));
        assert!(last.body.contains("10 minutes"));
        assert!(mailer.last_to("other@example.com").is_none());
    }

    #[tokio::test]
    async fn test_failing_mailer() {
        let mailer = MemoryMailer::failing();
        let result = mailer
            .send(EmailMessage::password_reset("a", "b", "c", "http://x", 60))
            .await;
        assert!(result.is_err());
        assert!(mailer.sent().is_empty());
    }
}
