//! API key lookup for the chat-completions client.
//!
//! Sources are tried in a fixed order: the inline config value, then a key
//! file (mounted container secrets), then an environment variable. Empty
//! strings count as absent so a blank `api_key` in the config file does not
//! shadow the environment.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key source configured")]
    Missing,

    #[error("Cannot read API key file '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{}' is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("Environment variable '{0}' is not set")]
    EnvVarMissing(String),

    #[error("Environment variable '{0}' is not valid UTF-8")]
    EnvVarInvalid(String),
}

/// Where an API key may be found.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySources<'a> {
    pub inline: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> KeySources<'a> {
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(key) = present(self.inline) {
            return Ok(SecretString::from(key.to_string()));
        }
        if let Some(file) = present(self.file) {
            return read_key_file(expand_home(file));
        }
        if let Some(name) = present(self.env_var) {
            return read_env_var(name);
        }
        Err(SecretError::Missing)
    }

    /// `Ok(None)` when no source is configured at all. A configured source
    /// that fails is still an error.
    pub fn try_resolve(&self) -> Result<Option<SecretString>, SecretError> {
        match self.resolve() {
            Ok(key) => Ok(Some(key)),
            Err(SecretError::Missing) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn read_key_file(path: PathBuf) -> Result<SecretString, SecretError> {
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(source) => return Err(SecretError::Unreadable { path, source }),
    };
    match content.trim() {
        "" => Err(SecretError::EmptyFile { path }),
        key => Ok(SecretString::from(key.to_string())),
    }
}

fn read_env_var(name: &str) -> Result<SecretString, SecretError> {
    match std::env::var(name) {
        // trailing newline from `$(cat keyfile)`
        Ok(value) => Ok(SecretString::from(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarMissing(name.to_string())),
        Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarInvalid(name.to_string())),
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
