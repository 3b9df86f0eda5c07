use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::directory::{Department, Role, UserId};

/// Store-assigned identifier of a training request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable request number, `TRN-<time suffix>-<random>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestNumber(pub String);

impl fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of the approval chain, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Manager,
    Hod,
    Hr,
    Admin,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Manager, Stage::Hod, Stage::Hr, Stage::Admin];

    pub const fn label(self) -> &'static str {
        match self {
            Stage::Manager => "Manager",
            Stage::Hod => "HOD",
            Stage::Hr => "HR",
            Stage::Admin => "Admin",
        }
    }

    /// Stage a reviewer of `role` acts on. Employees review nothing.
    pub const fn for_role(role: Role) -> Option<Stage> {
        match role {
            Role::Employee => None,
            Role::Manager => Some(Stage::Manager),
            Role::Hod => Some(Stage::Hod),
            Role::Hr => Some(Stage::Hr),
            Role::Admin => Some(Stage::Admin),
        }
    }

    /// Statuses in which a record is waiting on this stage.
    ///
    /// HR picks up records the HOD approved, and Admin picks up records HR approved, so those
    /// hand-off states count as intake alongside the explicit pending state.
    pub fn intake(self) -> &'static [TrainingStatus] {
        match self {
            Stage::Manager => &[TrainingStatus::PENDING_MANAGER],
            Stage::Hod => &[TrainingStatus::PENDING_HOD],
            Stage::Hr => &[TrainingStatus::PENDING_HR, TrainingStatus::APPROVED_BY_HOD],
            Stage::Admin => &[TrainingStatus::APPROVED_BY_HR, TrainingStatus::PENDING_ADMIN],
        }
    }

    pub fn accepts(self, status: TrainingStatus) -> bool {
        self.intake().contains(&status)
    }

    /// Status a record moves to once this stage has decided.
    pub const fn resolve(self, decision: Decision) -> TrainingStatus {
        match (self, decision) {
            (Stage::Manager, Decision::Approve) => TrainingStatus::PENDING_HOD,
            (Stage::Hod, Decision::Approve) => TrainingStatus::APPROVED_BY_HOD,
            (Stage::Hr, Decision::Approve) => TrainingStatus::PENDING_ADMIN,
            (Stage::Admin, Decision::Approve) => TrainingStatus::APPROVED_BY_ADMIN,
            (stage, Decision::Reject) => TrainingStatus::new(stage, StageOutcome::Rejected),
        }
    }

    const fn ordinal(self) -> u8 {
        match self {
            Stage::Manager => 0,
            Stage::Hod => 1,
            Stage::Hr => 2,
            Stage::Admin => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a stage stands for a given record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageOutcome {
    Pending,
    Approved,
    Rejected,
}

/// A reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

/// Status of a training request: the stage it is at and the outcome there.
///
/// Serialized with the historical labels (`Pending_HOD`, `Rejected_By_HR`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TrainingStatus {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

impl TrainingStatus {
    pub const PENDING_MANAGER: Self = Self::new(Stage::Manager, StageOutcome::Pending);
    pub const APPROVED_BY_MANAGER: Self = Self::new(Stage::Manager, StageOutcome::Approved);
    pub const REJECTED_BY_MANAGER: Self = Self::new(Stage::Manager, StageOutcome::Rejected);
    pub const PENDING_HOD: Self = Self::new(Stage::Hod, StageOutcome::Pending);
    pub const APPROVED_BY_HOD: Self = Self::new(Stage::Hod, StageOutcome::Approved);
    pub const REJECTED_BY_HOD: Self = Self::new(Stage::Hod, StageOutcome::Rejected);
    pub const PENDING_HR: Self = Self::new(Stage::Hr, StageOutcome::Pending);
    pub const APPROVED_BY_HR: Self = Self::new(Stage::Hr, StageOutcome::Approved);
    pub const REJECTED_BY_HR: Self = Self::new(Stage::Hr, StageOutcome::Rejected);
    pub const PENDING_ADMIN: Self = Self::new(Stage::Admin, StageOutcome::Pending);
    pub const APPROVED_BY_ADMIN: Self = Self::new(Stage::Admin, StageOutcome::Approved);
    pub const REJECTED_BY_ADMIN: Self = Self::new(Stage::Admin, StageOutcome::Rejected);

    pub const fn new(stage: Stage, outcome: StageOutcome) -> Self {
        Self { stage, outcome }
    }

    /// Status a new request starts in, by submitter role. Admins do not submit.
    pub const fn initial_for(role: Role) -> Option<Self> {
        match role {
            Role::Employee => Some(Self::PENDING_MANAGER),
            Role::Manager => Some(Self::PENDING_HOD),
            Role::Hod => Some(Self::PENDING_HR),
            Role::Hr => Some(Self::PENDING_ADMIN),
            Role::Admin => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            (self.stage, self.outcome),
            (_, StageOutcome::Rejected) | (Stage::Admin, StageOutcome::Approved)
        )
    }

    /// Position along the chain. A valid transition always strictly increases it.
    pub const fn progress(self) -> u8 {
        let settled = match self.outcome {
            StageOutcome::Pending => 0,
            StageOutcome::Approved | StageOutcome::Rejected => 1,
        };
        self.stage.ordinal() * 2 + settled
    }

    pub const fn label(self) -> &'static str {
        match (self.stage, self.outcome) {
            (Stage::Manager, StageOutcome::Pending) => "Pending_Manager",
            (Stage::Manager, StageOutcome::Approved) => "Approved_By_Manager",
            (Stage::Manager, StageOutcome::Rejected) => "Rejected_By_Manager",
            (Stage::Hod, StageOutcome::Pending) => "Pending_HOD",
            (Stage::Hod, StageOutcome::Approved) => "Approved_By_HOD",
            (Stage::Hod, StageOutcome::Rejected) => "Rejected_By_HOD",
            (Stage::Hr, StageOutcome::Pending) => "Pending_HR",
            (Stage::Hr, StageOutcome::Approved) => "Approved_By_HR",
            (Stage::Hr, StageOutcome::Rejected) => "Rejected_By_HR",
            (Stage::Admin, StageOutcome::Pending) => "Pending_Admin",
            (Stage::Admin, StageOutcome::Approved) => "Approved_By_Admin",
            (Stage::Admin, StageOutcome::Rejected) => "Rejected_By_Admin",
        }
    }
}

impl fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown training status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for TrainingStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .flat_map(|stage| {
                [
                    StageOutcome::Pending,
                    StageOutcome::Approved,
                    StageOutcome::Rejected,
                ]
                .map(|outcome| TrainingStatus::new(*stage, outcome))
            })
            .find(|status| status.label() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

impl From<TrainingStatus> for String {
    fn from(value: TrainingStatus) -> Self {
        value.label().to_string()
    }
}

impl TryFrom<String> for TrainingStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Free-form answers of the training needs form. Opaque to the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingNeedPayload(pub BTreeMap<String, String>);

impl TrainingNeedPayload {
    /// Keys owned by the workflow; a submitted form may not set them.
    pub const RESERVED_KEYS: [&'static str; 11] = [
        "id",
        "status",
        "requestNumber",
        "submitter",
        "department",
        "assignedManager",
        "reviewedByManager",
        "reviewedByHOD",
        "reviewedByHR",
        "reviewedByAdmin",
        "createdAt",
    ];

    pub fn reserved_keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|key| Self::RESERVED_KEYS.contains(key))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for TrainingNeedPayload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Reviewer per stage. Each slot is written once, when that stage decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub reviewed_by_manager: Option<UserId>,
    pub reviewed_by_hod: Option<UserId>,
    pub reviewed_by_hr: Option<UserId>,
    pub reviewed_by_admin: Option<UserId>,
}

impl AuditTrail {
    pub fn reviewer(&self, stage: Stage) -> Option<&UserId> {
        match stage {
            Stage::Manager => self.reviewed_by_manager.as_ref(),
            Stage::Hod => self.reviewed_by_hod.as_ref(),
            Stage::Hr => self.reviewed_by_hr.as_ref(),
            Stage::Admin => self.reviewed_by_admin.as_ref(),
        }
    }

    /// Records `reviewer` for `stage`. Returns `false` and leaves the trail untouched when the
    /// stage already has a reviewer.
    pub fn record(&mut self, stage: Stage, reviewer: UserId) -> bool {
        let slot = match stage {
            Stage::Manager => &mut self.reviewed_by_manager,
            Stage::Hod => &mut self.reviewed_by_hod,
            Stage::Hr => &mut self.reviewed_by_hr,
            Stage::Admin => &mut self.reviewed_by_admin,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(reviewer);
        true
    }

    pub fn decided_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| self.reviewer(*stage).is_some())
            .collect()
    }
}

/// Everything the engine hands the store when a request is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrainingNeed {
    pub request_number: RequestNumber,
    pub submitter: UserId,
    pub department: Option<Department>,
    pub assigned_manager: Option<UserId>,
    pub status: TrainingStatus,
    pub payload: TrainingNeedPayload,
}

/// Persisted training request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingNeedRecord {
    pub id: RequestId,
    pub request_number: RequestNumber,
    pub submitter: UserId,
    pub department: Option<Department>,
    pub assigned_manager: Option<UserId>,
    pub payload: TrainingNeedPayload,
    pub status: TrainingStatus,
    #[serde(flatten)]
    pub audit: AuditTrail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
