//! Two-line credential file: account identifier, then API key.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("could not read credential file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("credential file has no account identifier on line 1")]
    MissingUsername,
    #[error("credential file has no API key on line 2")]
    MissingApiKey,
}

#[derive(Clone)]
pub struct Credentials {
    username: String,
    api_key: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, CredentialsError> {
        let mut lines = text.lines().map(|line| line.trim_end_matches('\r'));
        let username = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or(CredentialsError::MissingUsername)?;
        let api_key = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or(CredentialsError::MissingApiKey)?;
        Ok(Self::new(username, api_key))
    }

    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let mut text = fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = Self::parse(&text);
        text.zeroize();
        parsed
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}
