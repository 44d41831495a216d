use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Outbound mail request handed to the dispatch queue.
#[derive(Clone, Debug)]
pub struct EmailSendRequest {
    pub to: String,
    pub subject: String,
    pub body_html: String,
}

pub trait EmailSender: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if delivery fails; the worker logs and moves on.
    fn send(&self, message: &EmailSendRequest) -> Result<()>;
}

/// Sender that only logs. Stands in until an SMTP relay is wired up.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailSendRequest) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

/// Handle for enqueueing mail without waiting on delivery.
#[derive(Clone, Debug)]
pub struct Mailer {
    tx: mpsc::Sender<EmailSendRequest>,
}

impl Mailer {
    /// Fire-and-forget: a full queue drops the message with an error
    /// log instead of blocking the credential operation.
    pub fn enqueue(&self, message: EmailSendRequest) {
        if let Err(err) = self.tx.try_send(message) {
            error!("email queue full, dropping message: {err}");
        }
    }
}

/// Spawn the mail worker draining a bounded queue. The worker stops
/// once every [`Mailer`] clone is dropped and the queue is drained.
pub fn spawn_sender_worker(
    sender: Arc<dyn EmailSender>,
    capacity: usize,
) -> (Mailer, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(capacity);

    let handle = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(err) = sender.send(&message) {
                error!("email delivery failed: {err}");
            }
        }
    });

    (Mailer { tx }, handle)
}

/// Confirmation email body with the account activation link.
#[must_use]
pub fn confirm_email_body(link: &str) -> String {
    format!(
        "<p>Welcome! Please confirm your account by clicking the link below.</p>\
         <p><a href=\"{link}\">Confirm my account</a></p>"
    )
}

/// Password-reset email body with the one-hour reset link.
#[must_use]
pub fn reset_email_body(link: &str) -> String {
    format!(
        "<p>You requested a password reset. The link below is valid for a limited time.</p>\
         <p><a href=\"{link}\">Reset my password</a></p>\
         <p>If you did not request this, you can ignore this email.</p>"
    )
}
