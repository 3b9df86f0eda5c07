//! Read-only view of the identity store.
//!
//! The workflow never owns user records. It asks a [`Directory`] for a caller's role,
//! department and reporting links, and for "some user holding role X" when a request has to
//! be routed to the next reviewer.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Identifier of a user in the identity store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Organisational unit a user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Department(pub String);

impl Department {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of roles known to the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Manager,
    Hod,
    Hr,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Hod => "hod",
            Role::Hr => "hr",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Directory entry for a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub manager: Option<UserId>,
    #[serde(default)]
    pub hod: Option<UserId>,
}

/// Lookup capability injected into the workflow and survey services.
pub trait Directory: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Users holding `role`, ordered by id. `department` narrows the search when present.
    fn users_with_role(
        &self,
        role: Role,
        department: Option<&Department>,
    ) -> Result<Vec<DirectoryUser>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while seeding an [`InMemoryDirectory`] from JSON.
#[derive(Debug, thiserror::Error)]
pub enum DirectorySeedError {
    #[error("unable to read directory seed: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory seed is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("directory seed lists user {0} more than once")]
    DuplicateUser(UserId),
}

/// Directory held in process memory, seeded at start-up.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<BTreeMap<UserId, DirectoryUser>>>,
}

impl InMemoryDirectory {
    pub fn from_users(
        users: impl IntoIterator<Item = DirectoryUser>,
    ) -> Result<Self, DirectorySeedError> {
        let mut map = BTreeMap::new();
        for user in users {
            if map.contains_key(&user.id) {
                return Err(DirectorySeedError::DuplicateUser(user.id));
            }
            map.insert(user.id.clone(), user);
        }
        Ok(Self {
            users: Arc::new(RwLock::new(map)),
        })
    }

    /// Reads a JSON array of [`DirectoryUser`] entries.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DirectorySeedError> {
        let users: Vec<DirectoryUser> = serde_json::from_reader(reader)?;
        Self::from_users(users)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DirectorySeedError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn len(&self) -> Result<usize, DirectoryError> {
        let guard = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> Result<bool, DirectoryError> {
        Ok(self.len()? == 0)
    }

    /// All users in id order.
    pub fn users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let guard = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }
}

impl Directory for InMemoryDirectory {
    fn user(&self, id: &UserId) -> Result<Option<DirectoryUser>, DirectoryError> {
        let guard = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn users_with_role(
        &self,
        role: Role,
        department: Option<&Department>,
    ) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let guard = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|user| user.role == role)
            .filter(|user| match department {
                Some(department) => user.department.as_ref() == Some(department),
                None => true,
            })
            .cloned()
            .collect())
    }
}
