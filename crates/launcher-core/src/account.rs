use async_trait::async_trait;
use md5::{Digest, Md5};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Sign-in was declined")]
    Declined,
    #[error("Authorization code was rejected: {0}")]
    BadCode(String),
    #[error("Network error during sign-in: {0}")]
    Network(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Offline,
    Microsoft,
}

/// Identity the game is launched under.
///
/// Implementations may refresh tokens inside `authenticate`; the accessors
/// are read after it succeeds.
#[async_trait]
pub trait Account: Send + Sync {
    async fn authenticate(&mut self) -> Result<(), AuthError>;
    fn username(&self) -> &str;
    fn uuid(&self) -> Uuid;
    fn access_token(&self) -> &str;
    fn kind(&self) -> AccountKind;
}

#[derive(Debug, Clone)]
pub struct OfflineAccount {
    username: String,
    uuid: Uuid,
}

impl OfflineAccount {
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let uuid = offline_uuid(&username);
        Self { username, uuid }
    }
}

#[async_trait]
impl Account for OfflineAccount {
    async fn authenticate(&mut self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() {
            return Err(AuthError::Other("Offline username is empty".to_string()));
        }
        Ok(())
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn access_token(&self) -> &str {
        "-"
    }

    fn kind(&self) -> AccountKind {
        AccountKind::Offline
    }
}

/// Name-based (version 3) UUID derived from `OfflineAccount:<name>`.
pub fn offline_uuid(username: &str) -> Uuid {
    let mut hasher = Md5::new();
    hasher.update(format!("OfflineAccount:{username}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hasher.finalize());
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}
