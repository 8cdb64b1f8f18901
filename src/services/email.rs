//! Email notifications for account events

use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Welcome a newly registered user (fire-and-forget)
    pub fn send_welcome(&self, to: &str, name: &str, username: &str) {
        let subject = "Welcome to the school library";
        let body = format!(
            r#"
Hello {name},

Your library account has been created. Your username is: {username}

You can now log in to see your borrowed books and the revision papers shared with your class.
"#,
            name = name,
            username = username
        );

        self.dispatch(to, subject, body);
    }

    /// Send a temporary password after a reset request (fire-and-forget)
    pub fn send_temporary_password(&self, to: &str, username: &str, password: &str) {
        let subject = "Your temporary library password";
        let body = format!(
            r#"
A password reset was requested for the library account {username}.

Your temporary password is: {password}

Log in with it and change it from your profile page. If you didn't request this, please contact the library.
"#,
            username = username,
            password = password
        );

        self.dispatch(to, subject, body);
    }

    /// Send in the background; failures are logged, never returned
    fn dispatch(&self, to: &str, subject: &str, body: String) {
        if !self.config.enabled {
            tracing::info!(to, subject, "Email delivery disabled, message not sent");
            return;
        }

        let service = self.clone();
        let to = to.to_string();
        let subject = subject.to_string();
        tokio::spawn(async move {
            if let Err(e) = service.send_email(&to, &subject, &body).await {
                tracing::warn!(to = %to, error = %e, "Failed to send email");
            }
        });
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("School Library");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><p>{}</p></body></html>"#,
                                body.trim().replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        let transport = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let transport = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                transport.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => transport,
        };

        // The SMTP transport blocks
        let mailer = transport.build();
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        tracing::debug!(to, subject, "Email sent");
        Ok(())
    }
}
