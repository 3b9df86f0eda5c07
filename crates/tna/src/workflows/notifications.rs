//! Workflow events and the dispatcher that turns them into mail.
//!
//! Services publish a [`WorkflowEvent`] only after their state change is stored. Delivery runs
//! on a separate task fed by a bounded channel, so a slow or failing mail transport never
//! affects a committed decision.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::directory::{Directory, UserId};
use super::survey::domain::SurveyId;
use super::training::domain::{Decision, RequestId, RequestNumber, Stage, TrainingStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A new request is waiting on `notify`.
    RequestSubmitted {
        request_id: RequestId,
        request_number: RequestNumber,
        status: TrainingStatus,
        submitter: UserId,
        notify: UserId,
    },
    /// A reviewer decided; `notify` is the submitter.
    RequestAdvanced {
        request_id: RequestId,
        request_number: RequestNumber,
        stage: Stage,
        decision: Decision,
        new_status: TrainingStatus,
        reviewer: UserId,
        notify: UserId,
    },
    SurveyAssigned {
        survey_id: SurveyId,
        title: String,
        notify: UserId,
    },
}

impl WorkflowEvent {
    pub fn recipient(&self) -> &UserId {
        match self {
            WorkflowEvent::RequestSubmitted { notify, .. }
            | WorkflowEvent::RequestAdvanced { notify, .. }
            | WorkflowEvent::SurveyAssigned { notify, .. } => notify,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::RequestSubmitted { .. } => "request_submitted",
            WorkflowEvent::RequestAdvanced { .. } => "request_advanced",
            WorkflowEvent::SurveyAssigned { .. } => "survey_assigned",
        }
    }

    /// Renders the mail for a recipient called `name` at `address`.
    pub fn render(&self, name: &str, address: &str) -> Notification {
        let (subject, body) = match self {
            WorkflowEvent::RequestSubmitted {
                request_number,
                status,
                ..
            } => (
                format!("Training request {request_number} awaits your review"),
                format!(
                    "Dear {name},\n\nTraining request {request_number} has been submitted and is \
                     now {status}. Please log in to the TNA portal to review it."
                ),
            ),
            WorkflowEvent::RequestAdvanced {
                request_number,
                stage,
                decision,
                new_status,
                ..
            } => {
                let verdict = match decision {
                    Decision::Approve => "approved",
                    Decision::Reject => "rejected",
                };
                (
                    format!("Training request {request_number} {verdict} by {stage}"),
                    format!(
                        "Dear {name},\n\nYour training request {request_number} was {verdict} at \
                         the {stage} stage. Its status is now {new_status}."
                    ),
                )
            }
            WorkflowEvent::SurveyAssigned { title, .. } => (
                format!("New Feedback Survey Assigned: {title}"),
                format!(
                    "Dear {name},\n\nA new feedback form titled \"{title}\" has been assigned \
                     to you. Please log in to the TNA portal to complete the survey."
                ),
            ),
        };

        Notification {
            to: address.to_string(),
            subject,
            body,
        }
    }
}

/// Sink the services publish to. Must not block.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("notification queue is full")]
    Saturated,
    #[error("notification dispatcher has stopped")]
    Closed,
}

/// Publisher half of the notification channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<WorkflowEvent>,
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
        self.sender.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PublishError::Saturated,
            mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
        })
    }
}

/// Bounded event channel; `capacity` is clamped to at least one slot.
pub fn channel(capacity: usize) -> (ChannelPublisher, mpsc::Receiver<WorkflowEvent>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (ChannelPublisher { sender }, receiver)
}

/// Rendered outbound mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail transport.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Counters reported when the dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Skipped,
    Failed,
}

/// Consumes [`WorkflowEvent`]s, addresses them through the directory and hands them to the
/// notifier. Runs until every publisher is dropped.
pub struct NotificationDispatcher<D, N> {
    directory: Arc<D>,
    notifier: Arc<N>,
}

impl<D, N> NotificationDispatcher<D, N>
where
    D: Directory + 'static,
    N: Notifier + 'static,
{
    pub fn new(directory: Arc<D>, notifier: Arc<N>) -> Self {
        Self {
            directory,
            notifier,
        }
    }

    pub fn spawn(self, receiver: mpsc::Receiver<WorkflowEvent>) -> JoinHandle<DispatchSummary> {
        tokio::spawn(self.run(receiver))
    }

    pub async fn run(self, mut receiver: mpsc::Receiver<WorkflowEvent>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        while let Some(event) = receiver.recv().await {
            match self.deliver(&event) {
                Delivery::Delivered => summary.delivered += 1,
                Delivery::Skipped => summary.skipped += 1,
                Delivery::Failed => summary.failed += 1,
            }
        }
        info!(
            delivered = summary.delivered,
            skipped = summary.skipped,
            failed = summary.failed,
            "notification dispatcher stopped"
        );
        summary
    }

    fn deliver(&self, event: &WorkflowEvent) -> Delivery {
        let recipient = event.recipient();
        let user = match self.directory.user(recipient) {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(event = event.kind(), %recipient, "notification recipient not in directory");
                return Delivery::Skipped;
            }
            Err(err) => {
                warn!(event = event.kind(), %recipient, error = %err, "directory lookup failed");
                return Delivery::Failed;
            }
        };

        let Some(address) = user.email.as_deref() else {
            debug!(event = event.kind(), %recipient, "recipient has no email address");
            return Delivery::Skipped;
        };

        let notification = event.render(&user.name, address);
        match self.notifier.notify(&notification) {
            Ok(()) => Delivery::Delivered,
            Err(err) => {
                warn!(event = event.kind(), %recipient, error = %err, "notification not sent");
                Delivery::Failed
            }
        }
    }
}
