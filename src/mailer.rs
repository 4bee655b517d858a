#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::transport::smtp::client::{Tls, TlsParameters};
#[cfg(feature = "web")]
use lettre::{Message, SmtpTransport, Transport};
use log::info;
use rand::Rng;
use thiserror::Error;

#[cfg(feature = "web")]
use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    Address(String),

    #[error("Failed to initialize mailer: {0}")]
    Transport(String),

    #[error("Failed to send email: {0}")]
    Send(String),
}

/// Delivers password reset codes
pub trait ResetMailer: Send + Sync {
    fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), MailError>;
}

#[cfg(feature = "web")]
pub struct SmtpMailer {
    smtp: SmtpTransport,
    from: String,
}

#[cfg(feature = "web")]
impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let tls_parameters = TlsParameters::new(config.host.clone())
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let smtp = SmtpTransport::relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .credentials(creds)
            .port(465)
            .tls(Tls::Wrapper(tls_parameters))
            .build();

        Ok(SmtpMailer {
            smtp,
            from: config.from.clone(),
        })
    }
}

#[cfg(feature = "web")]
impl ResetMailer for SmtpMailer {
    fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|_| MailError::Address(self.from.clone()))?,
            )
            .to(to_email
                .parse()
                .map_err(|_| MailError::Address(to_email.to_string()))?)
            .subject("Password Reset Request")
            .body(format!(
                "Your password reset code is: {}\nThis code will expire in 1 hour.",
                reset_code
            ))
            .map_err(|e| MailError::Send(e.to_string()))?;

        self.smtp
            .send(&email)
            .map_err(|e| MailError::Send(e.to_string()))?;

        info!("Sent password reset code to {to_email}");
        Ok(())
    }
}

/// Used when no SMTP server is configured: the code only reaches the log.
pub struct LogMailer;

impl ResetMailer for LogMailer {
    fn send_password_reset(&self, to_email: &str, reset_code: &str) -> Result<(), MailError> {
        info!("Password reset code for {to_email}: {reset_code}");
        Ok(())
    }
}

pub fn generate_reset_code() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();

    (0..8)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
