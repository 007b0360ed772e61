//! Catalog credential sessions and the stores that keep them between runs.

pub(crate) mod auth_keyring;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::Platform;
use crate::config::Config;
use crate::config_persistence;

/// Live credential state for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
}

impl AuthSession {
    /// True when both tokens needed to skip the authorization-code exchange are present.
    pub fn is_refreshable(&self) -> bool {
        !self.access_token.is_empty()
            && self
                .refresh_token
                .as_deref()
                .is_some_and(|token| !token.is_empty())
    }
}

/// Durable token persistence injected into catalog clients.
pub trait AuthStore {
    fn get(&self, platform: Platform) -> Result<Option<AuthSession>, String>;
    fn put(&mut self, platform: Platform, session: &AuthSession) -> Result<(), String>;
}

pub type SharedAuthStore = Rc<RefCell<dyn AuthStore>>;

/// Run-scoped store; nothing outlives the process.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    sessions: HashMap<Platform, AuthSession>,
}

#[cfg(test)]
impl MemoryAuthStore {
    pub fn with_session(platform: Platform, session: AuthSession) -> Self {
        let mut sessions = HashMap::new();
        sessions.insert(platform, session);
        Self { sessions }
    }
}

#[cfg(test)]
impl AuthStore for MemoryAuthStore {
    fn get(&self, platform: Platform) -> Result<Option<AuthSession>, String> {
        Ok(self.sessions.get(&platform).cloned())
    }

    fn put(&mut self, platform: Platform, session: &AuthSession) -> Result<(), String> {
        let merged = merge_refresh_token(session, self.sessions.get(&platform));
        self.sessions.insert(platform, merged);
        Ok(())
    }
}

/// A session without a refresh token keeps the one stored before it.
fn merge_refresh_token(session: &AuthSession, previous: Option<&AuthSession>) -> AuthSession {
    let mut merged = session.clone();
    if merged.refresh_token.is_none() {
        merged.refresh_token = previous.and_then(|previous| previous.refresh_token.clone());
    }
    merged
}

/// Keeps tokens in the config file's platform sections.
pub struct ConfigFileAuthStore {
    path: PathBuf,
    sessions: HashMap<Platform, AuthSession>,
}

impl ConfigFileAuthStore {
    pub fn new(path: PathBuf, config: &Config) -> Self {
        let mut sessions = HashMap::new();
        let spotify = &config.spotify;
        if !spotify.access_token.is_empty() || !spotify.refresh_token.is_empty() {
            sessions.insert(
                Platform::Spotify,
                AuthSession {
                    access_token: spotify.access_token.clone(),
                    refresh_token: Some(spotify.refresh_token.clone())
                        .filter(|token| !token.is_empty()),
                    expires_in: 0,
                },
            );
        }
        Self { path, sessions }
    }
}

impl AuthStore for ConfigFileAuthStore {
    fn get(&self, platform: Platform) -> Result<Option<AuthSession>, String> {
        Ok(self.sessions.get(&platform).cloned())
    }

    fn put(&mut self, platform: Platform, session: &AuthSession) -> Result<(), String> {
        let merged = merge_refresh_token(session, self.sessions.get(&platform));
        config_persistence::persist_platform_session(&self.path, platform, session)?;
        debug!(
            "Persisted {} tokens to {}",
            platform,
            self.path.display()
        );
        self.sessions.insert(platform, merged);
        Ok(())
    }
}
