//! Identity store collaborator.

use crate::error::SessionResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trestle_core::{Identity, Role};

/// Provider id of accounts that sign in with a local password.
pub const LOCAL_PROVIDER: &str = "local";

const REDACTED: &str = "******";

/// An account a session token can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub provider: String,
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Password hash for local accounts, current access token for external ones.
    #[serde(rename = "password")]
    pub secret: String,
}

impl Subject {
    /// A local account. `password_hash` is what [`PasswordHasher::hash`] returned.
    ///
    /// [`PasswordHasher::hash`]: crate::PasswordHasher::hash
    pub fn local(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let email = email.into();
        Self {
            provider: LOCAL_PROVIDER.to_string(),
            id: id.into(),
            tenant_id: tenant_id.into(),
            name: email.clone(),
            email,
            role: Role::Subscriber,
            secret: password_hash.into(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_local(&self) -> bool {
        self.provider == LOCAL_PROVIDER
    }

    /// The identity bound to a request context.
    pub fn identity(&self) -> Identity {
        Identity {
            provider: self.provider.clone(),
            subject_id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    /// Copy safe to hand to templates or serialize to clients.
    pub fn redacted(&self) -> Self {
        Self {
            secret: REDACTED.to_string(),
            ..self.clone()
        }
    }
}

/// Lookup of subjects and their current secrets.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_subject(&self, provider: &str, subject_id: &str)
    -> SessionResult<Option<Subject>>;

    /// Local account of `tenant_id` registered under `email`.
    async fn find_by_email(&self, tenant_id: &str, email: &str) -> SessionResult<Option<Subject>>;

    /// Current secret of a subject, used to check token digests.
    async fn get_subject_secret(
        &self,
        provider: &str,
        subject_id: &str,
    ) -> SessionResult<Option<String>> {
        Ok(self
            .find_subject(provider, subject_id)
            .await?
            .map(|subject| subject.secret))
    }
}

/// In-memory identity store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    subjects: RwLock<HashMap<(String, String), Subject>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a subject.
    pub fn insert(&self, subject: Subject) {
        self.subjects
            .write()
            .insert((subject.provider.clone(), subject.id.clone()), subject);
    }

    /// Rotate a subject's secret. Returns false if the subject is unknown.
    pub fn set_secret(&self, provider: &str, subject_id: &str, secret: impl Into<String>) -> bool {
        let mut subjects = self.subjects.write();
        match subjects.get_mut(&(provider.to_string(), subject_id.to_string())) {
            Some(subject) => {
                subject.secret = secret.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, provider: &str, subject_id: &str) -> Option<Subject> {
        self.subjects
            .write()
            .remove(&(provider.to_string(), subject_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.subjects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.read().is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_subject(
        &self,
        provider: &str,
        subject_id: &str,
    ) -> SessionResult<Option<Subject>> {
        Ok(self
            .subjects
            .read()
            .get(&(provider.to_string(), subject_id.to_string()))
            .cloned())
    }

    async fn find_by_email(&self, tenant_id: &str, email: &str) -> SessionResult<Option<Subject>> {
        Ok(self
            .subjects
            .read()
            .values()
            .find(|s| s.is_local() && s.tenant_id == tenant_id && s.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let store = MemoryIdentityStore::new();
        store.insert(Subject::local("1", "t1", "ada@example.com", "hash"));
        store.insert(Subject::local("2", "t2", "ada@example.com", "hash2"));

        let found = store.find_by_email("t2", "ADA@example.com").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some("2".to_string()));
        assert!(store.find_by_email("t3", "ada@example.com").await.unwrap().is_none());

        let secret = store.get_subject_secret(LOCAL_PROVIDER, "1").await.unwrap();
        assert_eq!(secret.as_deref(), Some("hash"));
        assert!(store.get_subject_secret("github", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_and_remove() {
        let store = MemoryIdentityStore::new();
        store.insert(Subject::local("1", "t1", "ada@example.com", "old"));
        assert!(store.set_secret(LOCAL_PROVIDER, "1", "new"));
        assert!(!store.set_secret(LOCAL_PROVIDER, "9", "new"));
        let secret = store.get_subject_secret(LOCAL_PROVIDER, "1").await.unwrap();
        assert_eq!(secret.as_deref(), Some("new"));

        assert!(store.remove(LOCAL_PROVIDER, "1").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_redacted() {
        let subject = Subject::local("1", "t1", "ada@example.com", "$argon2id$...")
            .with_role(Role::Editor);
        let json = serde_json::to_value(subject.redacted()).unwrap();
        assert_eq!(json["password"], "******");
        assert_eq!(json["role"], "editor");
        assert_eq!(subject.identity().role, Role::Editor);
    }
}
