use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::auth::service::{Credential, CredentialStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// What the API returns for a user; never carries the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(User),
    NotFound,
    EmailTaken,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsersFile {
    users: Vec<User>,
}

pub struct UserStore {
    file_path: PathBuf,
    users: Vec<User>,
}

impl UserStore {
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        let users = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: UsersFile = serde_json::from_str(&content)?;
            file.users
        } else {
            Vec::new()
        };

        Ok(UserStore {
            file_path: path.to_path_buf(),
            users,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        let file = UsersFile {
            users: self.users.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Returns `Ok(None)` when the email is already taken.
    pub fn add(
        &mut self,
        name: String,
        email: String,
        password_hash: String,
    ) -> anyhow::Result<Option<User>> {
        if self.find_by_email(&email).is_some() {
            return Ok(None);
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
        };
        self.users.push(user.clone());
        self.save()?;
        Ok(Some(user))
    }

    pub fn update(&mut self, id: &str, name: String, email: String) -> anyhow::Result<UpdateOutcome> {
        if self.get(id).is_none() {
            return Ok(UpdateOutcome::NotFound);
        }
        if self.users.iter().any(|u| u.email == email && u.id != id) {
            return Ok(UpdateOutcome::EmailTaken);
        }
        let Some(user) = self.users.iter_mut().find(|u| u.id == id) else {
            return Ok(UpdateOutcome::NotFound);
        };

        user.name = name;
        user.email = email;
        let updated = user.clone();
        self.save()?;
        Ok(UpdateOutcome::Updated(updated))
    }

    pub fn set_password(&mut self, id: &str, password_hash: String) -> anyhow::Result<bool> {
        if let Some(user) = self.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash;
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn remove(&mut self, id: &str) -> anyhow::Result<bool> {
        let before = self.users.len();
        self.users.retain(|u| u.id != id);
        if self.users.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn list(&self) -> &[User] {
        &self.users
    }
}

#[async_trait]
impl CredentialStore for RwLock<UserStore> {
    async fn find_by_identity(&self, identity: &str) -> anyhow::Result<Option<Credential>> {
        Ok(self.read().await.find_by_email(identity).map(|u| Credential {
            identity: u.email.clone(),
            display_name: u.name.clone(),
            internal_id: u.id.clone(),
            password_hash: u.password_hash.clone(),
        }))
    }
}
