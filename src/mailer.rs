//! Outgoing mail
//!
//! Services compose a [`Mail`] and hand it to whatever [`Mailer`] the binary
//! wired in. The crate ships [`LogMailer`], which only writes the message to
//! the log; real delivery lives behind the same trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Display name plus address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailInfo {
    pub name: String,
    pub email: String,
}

impl EmailInfo {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mail {
    pub from: EmailInfo,
    pub to: Vec<EmailInfo>,
    pub subject: String,
    pub plain_text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<()>;
}

pub type SharedMailer = Arc<dyn Mailer>;

/// Logs each message instead of delivering it
#[derive(Debug, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        let recipients: Vec<&str> = mail.to.iter().map(|r| r.email.as_str()).collect();
        log::info!(
            "Mail from {} to {:?}: {}",
            mail.from.email,
            recipients,
            mail.subject
        );
        // Bodies can carry single-use links
        log::debug!("Mail body:\n{}", mail.plain_text);
        Ok(())
    }
}
