//! Lifecycle notifications.
//!
//! The engine hands each event to a bounded queue and moves on; a worker
//! task renders and delivers them. A full queue, a closed queue and a
//! failed delivery are all logged and dropped. Nothing is retried.

mod mailer;

pub use mailer::{HttpMailer, LogMailer, MailError, Mailer, MemoryMailer};

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::{Investment, UserProfile};

/// A lifecycle event worth an email.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    InvestmentCreated {
        admin_email: String,
        owner: UserProfile,
        investment: Investment,
    },
    InvestmentApproved {
        owner: UserProfile,
        investment: Investment,
    },
    InvestmentRejected {
        owner: UserProfile,
        investment: Investment,
    },
    InvestmentMatured {
        owner: UserProfile,
        investment: Investment,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::InvestmentCreated { .. } => "investment_created",
            Notification::InvestmentApproved { .. } => "investment_approved",
            Notification::InvestmentRejected { .. } => "investment_rejected",
            Notification::InvestmentMatured { .. } => "investment_matured",
        }
    }

    pub fn investment(&self) -> &Investment {
        match self {
            Notification::InvestmentCreated { investment, .. }
            | Notification::InvestmentApproved { investment, .. }
            | Notification::InvestmentRejected { investment, .. }
            | Notification::InvestmentMatured { investment, .. } => investment,
        }
    }

    pub fn render(&self, frontend_url: &str) -> EmailMessage {
        let inv = self.investment();
        let summary = format!(
            "Investment ID: {}\nPlan: {}\nAmount: {:.2}\nStart date: {}\nEnd date: {}\nMaturity amount: {:.2}",
            inv.id,
            inv.plan,
            inv.amount,
            inv.start_date.format("%Y-%m-%d"),
            inv.end_date.format("%Y-%m-%d"),
            inv.maturity_amount,
        );

        match self {
            Notification::InvestmentCreated {
                admin_email, owner, ..
            } => EmailMessage {
                to: admin_email.clone(),
                subject: "New Investment Approval Required".to_string(),
                body: format!(
                    "{} ({}) has requested a new investment.\n\n{summary}\n\nReview it at {}/admin/investments/{}",
                    owner.name,
                    owner.email,
                    frontend_url.trim_end_matches('/'),
                    inv.id,
                ),
            },
            Notification::InvestmentApproved { owner, .. } => EmailMessage {
                to: owner.email.clone(),
                subject: "Your Investment Has Been Approved!".to_string(),
                body: format!(
                    "Hello {},\n\nYour investment has been approved and is now active.\n\n{summary}",
                    owner.name
                ),
            },
            Notification::InvestmentRejected { owner, .. } => EmailMessage {
                to: owner.email.clone(),
                subject: "Your Investment Has Been Rejected".to_string(),
                body: format!(
                    "Hello {},\n\nYour investment request was not approved. No funds were deducted from your balance.\n\n{summary}",
                    owner.name
                ),
            },
            Notification::InvestmentMatured { owner, .. } => EmailMessage {
                to: owner.email.clone(),
                subject: "Your Investment Has Matured".to_string(),
                body: format!(
                    "Hello {},\n\nYour investment has reached maturity and the payout has been credited.\n\n{summary}",
                    owner.name
                ),
            },
        }
    }
}

/// Sending half of the notification queue, held by the lifecycle engine.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotificationDispatcher {
    /// Queues `notification` without waiting.
    pub fn dispatch(&self, notification: Notification) {
        let investment_id = notification.investment().id;
        match self.tx.try_send(notification) {
            Ok(()) => debug!(%investment_id, "Notification queued"),
            Err(TrySendError::Full(n)) => warn!(
                kind = n.kind(),
                %investment_id,
                "Notification queue full, dropping notification"
            ),
            Err(TrySendError::Closed(n)) => warn!(
                kind = n.kind(),
                %investment_id,
                "Notification worker stopped, dropping notification"
            ),
        }
    }
}

pub fn notification_channel(
    capacity: usize,
) -> (NotificationDispatcher, mpsc::Receiver<Notification>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationDispatcher { tx }, rx)
}

/// Drains the notification queue into a [`Mailer`].
pub struct NotificationWorker {
    rx: mpsc::Receiver<Notification>,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<Notification>,
        mailer: Arc<dyn Mailer>,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            rx,
            mailer,
            frontend_url: frontend_url.into(),
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs until every sender is dropped or `shutdown` fires. On shutdown,
    /// notifications already queued are still delivered.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Notification worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.rx.close();
                    while let Some(notification) = self.rx.recv().await {
                        self.deliver(notification).await;
                    }
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => break,
                },
            }
        }
        info!("Notification worker stopped");
    }

    async fn deliver(&self, notification: Notification) {
        let message = notification.render(&self.frontend_url);
        let investment_id = notification.investment().id;
        match self.mailer.send(&message).await {
            Ok(()) => info!(
                kind = notification.kind(),
                %investment_id,
                to = %message.to,
                "Notification email sent"
            ),
            Err(e) => error!(
                kind = notification.kind(),
                %investment_id,
                to = %message.to,
                error = %e,
                "Failed to send notification email"
            ),
        }
    }
}
