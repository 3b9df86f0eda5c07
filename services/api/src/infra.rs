use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tna::config::DirectoryConfig;
use tna::error::AppError;
use tna::workflows::directory::{
    Department, DirectorySeedError, DirectoryUser, InMemoryDirectory, Role, UserId,
};
use tna::workflows::notifications::{ChannelPublisher, Notification, Notifier, NotifyError};
use tna::workflows::survey::{InMemorySurveyRepository, SurveyService};
use tna::workflows::training::{HodScope, InMemoryTrainingNeedRepository, TrainingRequestService};
use tracing::{debug, info};

pub(crate) type TrainingService =
    TrainingRequestService<InMemoryTrainingNeedRepository, InMemoryDirectory, ChannelPublisher>;
pub(crate) type FeedbackService =
    SurveyService<InMemorySurveyRepository, InMemoryDirectory, ChannelPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Both workflow services over the in-process stores, publishing to one channel.
pub(crate) struct Services {
    pub(crate) training: Arc<TrainingService>,
    pub(crate) surveys: Arc<FeedbackService>,
}

pub(crate) fn build_services(
    directory: Arc<InMemoryDirectory>,
    publisher: ChannelPublisher,
    hod_scope: HodScope,
) -> Services {
    let publisher = Arc::new(publisher);
    let training = TrainingRequestService::new(
        Arc::new(InMemoryTrainingNeedRepository::default()),
        directory.clone(),
        publisher.clone(),
    )
    .with_hod_scope(hod_scope);
    let surveys = SurveyService::new(
        Arc::new(InMemorySurveyRepository::default()),
        directory,
        publisher,
    );
    Services {
        training: Arc::new(training),
        surveys: Arc::new(surveys),
    }
}

/// Writes rendered mail to the log instead of a mail server.
pub(crate) struct LogNotifier {
    mail_from: String,
}

impl LogNotifier {
    pub(crate) fn new(mail_from: impl Into<String>) -> Self {
        Self {
            mail_from: mail_from.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            from = %self.mail_from,
            to = %notification.to,
            subject = %notification.subject,
            "notification sent"
        );
        debug!(body = %notification.body, "notification body");
        Ok(())
    }
}

/// Keeps every rendered mail for printing after a demo run.
#[derive(Default)]
pub(crate) struct OutboxNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Transport("outbox lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Seed file when configured, the sample organisation otherwise.
pub(crate) fn load_directory(config: &DirectoryConfig) -> Result<InMemoryDirectory, AppError> {
    let directory = match &config.seed_file {
        Some(path) => {
            let directory = InMemoryDirectory::from_path(path)?;
            let users = directory.len()?;
            info!(path = %path.display(), users, "directory seeded from file");
            directory
        }
        None => {
            let directory = demo_directory()?;
            let users = directory.len()?;
            info!(users, "directory seeded with sample organisation");
            directory
        }
    };
    Ok(directory)
}

fn member(
    id: &str,
    name: &str,
    role: Role,
    department: &str,
    manager: Option<&str>,
    hod: Option<&str>,
) -> DirectoryUser {
    DirectoryUser {
        id: UserId::new(id),
        name: name.to_string(),
        email: Some(format!("{id}@tna.local")),
        role,
        department: Some(Department::new(department)),
        manager: manager.map(UserId::new),
        hod: hod.map(UserId::new),
    }
}

pub(crate) fn demo_directory() -> Result<InMemoryDirectory, DirectorySeedError> {
    InMemoryDirectory::from_users([
        member("admin-1", "Amara Okafor", Role::Admin, "Administration", None, None),
        member("hr-1", "Hana Takeda", Role::Hr, "Human Resources", None, None),
        member("hod-it", "Ivan Petrov", Role::Hod, "IT", None, None),
        member("hod-fin", "Farah Malik", Role::Hod, "Finance", None, None),
        member("mgr-it", "Maya Chen", Role::Manager, "IT", None, Some("hod-it")),
        member("mgr-fin", "Tomas Silva", Role::Manager, "Finance", None, Some("hod-fin")),
        member(
            "emp-it-1",
            "Eli Novak",
            Role::Employee,
            "IT",
            Some("mgr-it"),
            Some("hod-it"),
        ),
        member(
            "emp-fin-1",
            "Noor Haddad",
            Role::Employee,
            "Finance",
            Some("mgr-fin"),
            Some("hod-fin"),
        ),
    ])
}
