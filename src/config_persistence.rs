use std::path::Path;

use log::{info, warn};
use toml_edit::{value, DocumentMut, Item, Table};

use crate::{
    auth::AuthSession,
    catalog::Platform,
    config::{sanitize_config, Config},
};

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn ensure_section_table(document: &mut DocumentMut, key: &str) {
    let root = document.as_table_mut();
    let should_replace = !matches!(root.get(key), Some(item) if item.is_table());
    if should_replace {
        root.insert(key, Item::Table(Table::new()));
    }
}

fn write_session_to_document(
    document: &mut DocumentMut,
    platform: Platform,
    session: &AuthSession,
) -> Result<(), String> {
    let section = platform.config_key();
    ensure_section_table(document, section);
    let table = document[section]
        .as_table_mut()
        .ok_or_else(|| format!("[{section}] should be a table"))?;
    set_table_value_preserving_decor(
        table,
        "access_token",
        value(session.access_token.clone()),
    );
    // A refresh response may omit the refresh token; the stored one stays valid.
    if let Some(refresh_token) = &session.refresh_token {
        set_table_value_preserving_decor(table, "refresh_token", value(refresh_token.clone()));
    }
    Ok(())
}

/// Rewrites only the token keys of `platform`'s section, keeping comments and layout.
pub fn serialize_session_with_preserved_comments(
    existing_text: &str,
    platform: Platform,
    session: &AuthSession,
) -> Result<String, String> {
    let mut document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;
    write_session_to_document(&mut document, platform, session)?;
    Ok(document.to_string())
}

pub fn persist_platform_session(
    path: &Path,
    platform: Platform,
    session: &AuthSession,
) -> Result<(), String> {
    let existing_text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        // Writing over an unreadable file would drop every other setting.
        Err(err) => return Err(format!("failed to read {}: {}", path.display(), err)),
    };
    let config_text = serialize_session_with_preserved_comments(&existing_text, platform, session)?;
    std::fs::write(path, config_text)
        .map_err(|err| format!("failed to persist {} tokens to {}: {}", platform, path.display(), err))
}

/// Writes the default config when `path` does not exist. Returns whether it did.
pub fn ensure_config_file(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    info!(
        "Config file not found. Creating default config. path={}",
        path.display()
    );
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| format!("failed to create {}: {}", parent.display(), err))?;
    }
    let default_text = toml::to_string(&Config::default())
        .map_err(|err| format!("failed to serialize default config: {}", err))?;
    std::fs::write(path, default_text)
        .map_err(|err| format!("failed to write default config {}: {}", path.display(), err))?;
    Ok(true)
}

pub fn parse_config_text(config_text: &str) -> Result<Config, String> {
    toml::from_str::<Config>(config_text)
        .map(sanitize_config)
        .map_err(|err| format!("failed to parse config: {}", err))
}

pub fn load_config_file(path: &Path) -> Result<Config, String> {
    let config_text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    parse_config_text(&config_text).map_err(|err| {
        warn!("Config at {} is invalid", path.display());
        err
    })
}
