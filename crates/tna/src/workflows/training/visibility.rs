use std::fmt;
use std::str::FromStr;

use crate::workflows::directory::{DirectoryUser, Role};

use super::domain::{Stage, TrainingNeedRecord, TrainingStatus};
use super::repository::RequestFilter;

/// Whether HODs are limited to requests from their own department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HodScope {
    /// Any HOD sees and decides any `Pending_HOD` request.
    #[default]
    Any,
    Department,
}

impl fmt::Display for HodScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HodScope::Any => f.write_str("any"),
            HodScope::Department => f.write_str("department"),
        }
    }
}

impl FromStr for HodScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" | "global" => Ok(Self::Any),
            "department" | "dept" => Ok(Self::Department),
            other => Err(other.to_string()),
        }
    }
}

/// Why a caller cannot build a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityDenied {
    NotAReviewer(Role),
    HodWithoutDepartment,
}

impl fmt::Display for VisibilityDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisibilityDenied::NotAReviewer(role) => {
                write!(f, "role {role} does not review training requests")
            }
            VisibilityDenied::HodWithoutDepartment => {
                f.write_str("department-scoped HOD has no department")
            }
        }
    }
}

/// Maps a caller to the requests they may see.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityPolicy {
    hod_scope: HodScope,
}

impl VisibilityPolicy {
    pub fn new(hod_scope: HodScope) -> Self {
        Self { hod_scope }
    }

    pub fn hod_scope(&self) -> HodScope {
        self.hod_scope
    }

    /// Role-wide listing. Employees get their own submissions.
    pub fn list_filter(&self, caller: &DirectoryUser) -> Result<RequestFilter, VisibilityDenied> {
        match caller.role {
            Role::Employee => Ok(Self::own_filter(caller)),
            Role::Manager => Ok(RequestFilter::assigned_to(caller.id.clone())),
            Role::Hod => self.hod_filter(caller),
            Role::Hr => Ok(RequestFilter::with_statuses([
                TrainingStatus::PENDING_HR,
                TrainingStatus::APPROVED_BY_HOD,
            ])),
            Role::Admin => Ok(RequestFilter::with_statuses([
                TrainingStatus::APPROVED_BY_HR,
                TrainingStatus::PENDING_ADMIN,
            ])),
        }
    }

    /// Requests the caller can decide right now.
    pub fn review_filter(&self, caller: &DirectoryUser) -> Result<RequestFilter, VisibilityDenied> {
        let stage =
            Stage::for_role(caller.role).ok_or(VisibilityDenied::NotAReviewer(caller.role))?;
        let mut filter = RequestFilter::with_statuses(stage.intake().iter().copied());
        match stage {
            Stage::Manager => filter.assigned_manager = Some(caller.id.clone()),
            Stage::Hod => filter.department = self.hod_filter(caller)?.department,
            Stage::Hr | Stage::Admin => {}
        }
        Ok(filter)
    }

    pub fn own_filter(caller: &DirectoryUser) -> RequestFilter {
        RequestFilter::submitted_by(caller.id.clone())
    }

    /// Single-record check behind direct lookups.
    pub fn can_view(&self, caller: &DirectoryUser, record: &TrainingNeedRecord) -> bool {
        if caller.role == Role::Admin || record.submitter == caller.id {
            return true;
        }
        self.list_filter(caller)
            .map(|filter| filter.matches(record))
            .unwrap_or(false)
    }

    /// Department check applied when an HOD decides.
    pub fn hod_may_decide(&self, caller: &DirectoryUser, record: &TrainingNeedRecord) -> bool {
        match self.hod_scope {
            HodScope::Any => true,
            HodScope::Department => {
                caller.department.is_some() && caller.department == record.department
            }
        }
    }

    fn hod_filter(&self, caller: &DirectoryUser) -> Result<RequestFilter, VisibilityDenied> {
        let filter = RequestFilter::with_statuses([TrainingStatus::PENDING_HOD]);
        match self.hod_scope {
            HodScope::Any => Ok(filter),
            HodScope::Department => caller
                .department
                .clone()
                .map(|department| filter.in_department(department))
                .ok_or(VisibilityDenied::HodWithoutDepartment),
        }
    }
}
