//! Session identity.
//!
//! The upload workflow only ever reads who is signed in (for greeting text and portal routing).
//! Identity is therefore modelled as an explicitly passed [`Session`] rather than process-wide
//! state:
//!
//! - [`Session::init`] reads the persisted user once at startup
//! - [`Session::login`] checks the [`UserDirectory`] and persists the user
//! - [`Session::logout`] clears memory and removes the persisted record
//!
//! The directory is a fixed list of demonstration accounts. Passwords are not verified.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Patient, Role::Doctor, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    /// Landing page for the role after login.
    pub fn portal_path(self) -> &'static str {
        match self {
            Role::Patient => "/patient-portal",
            Role::Doctor => "/doctor-portal",
            Role::Admin => "/admin-dashboard",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "unknown role {other:?} (expected patient, doctor or admin)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub avatar: String,
}

impl User {
    pub fn greeting(&self) -> String {
        format!("Welcome, {}", self.name)
    }
}

/// Known accounts.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// The three demonstration accounts, one per role.
    pub fn mock() -> Self {
        fn user(id: &str, email: &str, name: &str, role: Role, photo: &str) -> User {
            User {
                id: id.into(),
                email: email.into(),
                name: name.into(),
                role,
                avatar: format!(
                    "https://images.pexels.com/photos/{photo}/pexels-photo-{photo}.jpeg?auto=compress&cs=tinysrgb&w=150"
                ),
            }
        }

        Self::new(vec![
            user("1", "patient@xinsight.com", "John Patient", Role::Patient, "220453"),
            user("2", "doctor@xinsight.com", "Dr. Sarah Wilson", Role::Doctor, "5452293"),
            user("3", "admin@xinsight.com", "Admin User", Role::Admin, "2182970"),
        ])
    }

    /// Finds the user with this email and role.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidCredentials` when no account matches or the password is
    /// blank.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<&User, SessionError> {
        if password.trim().is_empty() {
            return Err(SessionError::InvalidCredentials);
        }
        let email = email.trim();
        self.users
            .iter()
            .find(|u| u.role == role && u.email.eq_ignore_ascii_case(email))
            .ok_or(SessionError::InvalidCredentials)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }
}

/// File-backed persistence of the signed-in user.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the persisted user; a missing file means nobody is signed in.
    pub fn load(&self) -> Result<Option<User>, SessionError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::FileRead(e)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(SessionError::Deserialization)
    }

    pub fn save(&self, user: &User) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(user).map_err(SessionError::Serialization)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(SessionError::FileWrite)?;
        }
        fs::write(&self.path, json).map_err(SessionError::FileWrite)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::FileRemove(e)),
        }
    }
}

/// The current user, passed explicitly to whatever needs it.
#[derive(Debug)]
pub struct Session {
    store: SessionStore,
    directory: UserDirectory,
    current: Option<User>,
}

impl Session {
    /// Reads the persisted user once.
    ///
    /// A corrupt session file is treated as signed out and removed.
    pub fn init(store: SessionStore, directory: UserDirectory) -> Result<Self, SessionError> {
        let current = match store.load() {
            Ok(user) => user,
            Err(SessionError::Deserialization(e)) => {
                tracing::warn!(path = %store.path().display(), "discarding unreadable session: {}", e);
                store.clear()?;
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            store,
            directory,
            current,
        })
    }

    pub fn login(&mut self, email: &str, password: &str, role: Role) -> Result<&User, SessionError> {
        let user = self.directory.authenticate(email, password, role)?.clone();
        self.store.save(&user)?;
        tracing::info!(user_id = %user.id, role = %user.role, "signed in");
        Ok(&*self.current.insert(user))
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        if let Some(user) = self.current.take() {
            tracing::info!(user_id = %user.id, "signed out");
        }
        self.store.clear()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// The signed-in user, if their role matches.
    pub fn require_role(&self, role: Role) -> Result<&User, SessionError> {
        let user = self.current_user().ok_or(SessionError::NotSignedIn)?;
        if user.role != role {
            return Err(SessionError::WrongRole { required: role });
        }
        Ok(user)
    }
}
