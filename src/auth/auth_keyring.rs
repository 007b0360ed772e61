//! OS keyring token store.

use keyring::Entry;

use crate::auth::{AuthSession, AuthStore};
use crate::catalog::Platform;

const SERVICE_NAME_PREFIX: &str = "newmusicrelease.catalog";
const SESSION_ENTRY_USER: &str = "session";

fn service_name(platform: Platform) -> String {
    format!("{SERVICE_NAME_PREFIX}.{}", platform.config_key())
}

fn session_entry(platform: Platform) -> Result<Entry, String> {
    Entry::new(&service_name(platform), SESSION_ENTRY_USER)
        .map_err(|err| format!("failed to create keyring entry for {platform}: {err}"))
}

fn keyring_error_hint(error: &str) -> Option<String> {
    if error.contains("org.freedesktop.DBus.Error.ServiceUnknown") {
        return Some(
            "no Secret Service provider is available. Start GNOME Keyring or KeePassXC Secret Service, or set token_store = \"config\"."
                .to_string(),
        );
    }
    None
}

fn format_keyring_error(operation: &str, platform: Platform, error: &str) -> String {
    let base = format!("{operation} failed in system keyring for {platform}: {error}");
    match keyring_error_hint(error) {
        Some(hint) => format!("{base}. Hint: {hint}"),
        None => base,
    }
}

/// Stores each platform session as one JSON secret.
#[derive(Debug, Default)]
pub struct KeyringAuthStore;

impl AuthStore for KeyringAuthStore {
    fn get(&self, platform: Platform) -> Result<Option<AuthSession>, String> {
        let entry = session_entry(platform)?;
        match entry.get_password() {
            Ok(secret) => serde_json::from_str(&secret)
                .map(Some)
                .map_err(|err| format!("stored {platform} session is unreadable: {err}")),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => {
                let detail = format!("failed to get keyring secret: {err}");
                Err(format_keyring_error(
                    "load token session",
                    platform,
                    detail.as_str(),
                ))
            }
        }
    }

    fn put(&mut self, platform: Platform, session: &AuthSession) -> Result<(), String> {
        let mut stored = session.clone();
        if stored.refresh_token.is_none() {
            stored.refresh_token = self
                .get(platform)?
                .and_then(|previous| previous.refresh_token);
        }
        let secret = serde_json::to_string(&stored)
            .map_err(|err| format!("failed to serialize {platform} session: {err}"))?;
        let entry = session_entry(platform)?;
        entry.set_password(&secret).map_err(|err| {
            let detail = format!("failed to set keyring secret: {err}");
            format_keyring_error("save token session", platform, detail.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{format_keyring_error, service_name};
    use crate::catalog::Platform;

    #[test]
    fn test_service_name_is_per_platform() {
        assert_eq!(
            service_name(Platform::Spotify),
            "newmusicrelease.catalog.spotify"
        );
    }

    #[test]
    fn test_format_keyring_error_adds_secret_service_hint() {
        let message = format_keyring_error(
            "load token session",
            Platform::Spotify,
            "org.freedesktop.DBus.Error.ServiceUnknown: no provider",
        );
        assert!(message.contains("Hint:"));
        assert!(message.contains("token_store = \"config\""));
    }
}
