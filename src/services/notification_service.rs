use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::SmtpConfig;
use crate::errors::{AppError, Result};
use crate::models::kyc::{SubmissionStatus, UserInfo};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, recipients: &[String], subject: &str, body: &str, is_plain_text: bool) -> Result<()>;
}

/// Subject and plain-text body for the decision e-mail sent to an applicant.
pub fn status_email(
    package_name: &str,
    user: &UserInfo,
    submission_id: &Uuid,
    status: SubmissionStatus,
) -> (String, String) {
    let subject = format!("KYC Check - {}", package_name);
    let body = match status {
        SubmissionStatus::Accepted => format!(
            "Dear {} {},\n\nWe are glad to inform you that your application {} with {} has been accepted.",
            user.first_name, user.last_name, submission_id, package_name
        ),
        SubmissionStatus::Rejected => format!(
            "Dear {} {},\n\nWe regret to inform you that your application {} with {} has been rejected.",
            user.first_name, user.last_name, submission_id, package_name
        ),
        SubmissionStatus::Queued => format!(
            "Dear {} {},\n\nYour application {} with {} is being processed.",
            user.first_name, user.last_name, submission_id, package_name
        ),
    };
    (subject, body)
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, from_email: &str, timeout: Duration) -> Result<Self> {
        let from = from_email
            .parse::<Mailbox>()
            .map_err(|e| AppError::ConfigurationError(format!("Invalid FROM_EMAIL: {}", e)))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::ConfigurationError(format!("SMTP relay error: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_email(&self, recipients: &[String], subject: &str, body: &str, is_plain_text: bool) -> Result<()> {
        if recipients.is_empty() {
            return Err(AppError::NotificationError("No recipients".to_string()));
        }

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            let to = recipient
                .parse::<Mailbox>()
                .map_err(|e| AppError::NotificationError(format!("Invalid recipient {}: {}", recipient, e)))?;
            builder = builder.to(to);
        }

        let content_type = if is_plain_text { ContentType::TEXT_PLAIN } else { ContentType::TEXT_HTML };
        let email = builder.header(content_type).body(body.to_string())?;

        self.mailer.send(email).await?;
        info!(action = "email_sent", recipients = recipients.len(), subject = %subject);
        Ok(())
    }
}

/// Used when SMTP is not configured: the message is written to the log instead.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_email(&self, recipients: &[String], subject: &str, body: &str, _is_plain_text: bool) -> Result<()> {
        info!(action = "email_logged", recipients = ?recipients, subject = %subject, body = %body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_email_content() {
        let user = UserInfo {
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            ..Default::default()
        };
        let id = Uuid::new_v4();

        let (subject, body) = status_email("Student Visa", &user, &id, SubmissionStatus::Accepted);
        assert_eq!(subject, "KYC Check - Student Visa");
        assert!(body.starts_with("Dear Ada Obi,"));
        assert!(body.contains("has been accepted"));
        assert!(body.contains(&id.to_string()));

        let (_, body) = status_email("Student Visa", &user, &id, SubmissionStatus::Rejected);
        assert!(body.contains("regret"));
        assert!(body.contains("has been rejected"));
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let result = LogNotifier
            .send_email(&["ada@example.com".to_string()], "subject", "body", true)
            .await;
        assert!(result.is_ok());
    }
}
