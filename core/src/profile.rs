//! Endpoint profiles for the two sides of a sync.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Database connection facts for one side of a sync.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseProfile {
    pub host: String,
    #[serde(default = "default_management_system")]
    pub management_system: String,
    /// Logical database name.
    pub name: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_management_system() -> String {
    "mysql".to_string()
}

impl fmt::Debug for DatabaseProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseProfile")
            .field("host", &self.host)
            .field("management_system", &self.management_system)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote shell transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SshProfile {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub user: String,
    /// Private key path; a leading `~` is expanded at connect time.
    pub key: PathBuf,
}

fn default_ssh_port() -> u16 {
    22
}

impl SshProfile {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// A resolved profile: database plus transport, under the profile's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub database: DatabaseProfile,
    pub ssh: SshProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}
