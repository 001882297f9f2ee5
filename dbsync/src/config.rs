use dbsync_core::{is_safe_identifier, Blacklist, DatabaseProfile, Endpoint, FailurePolicy, SshProfile};
use pipeline::{SyncContext, SyncOptions, DEFAULT_CONCURRENCY};
use remote_exec::CommandSet;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG: &str = "dbsync.yaml";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no {section} profile named {name:?}")]
    UnknownProfile { section: &'static str, name: String },
    #[error("source and target are the same profile {0:?}")]
    SameProfile(String),
    #[error("profile {profile:?} has unsafe database name {name:?}")]
    UnsafeDatabase { profile: String, name: String },
    #[error("{0} concurrency must be at least 1")]
    ZeroConcurrency(&'static str),
    #[error("profile {profile:?} uses unsupported management system {engine:?}; provide `commands` templates")]
    UnsupportedEngine { profile: String, engine: String },
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ConcurrencyConfig {
    pub fetch: Option<usize>,
    pub delete: Option<usize>,
    pub load: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub database: HashMap<String, DatabaseProfile>,
    #[serde(default)]
    pub ssh: HashMap<String, SshProfile>,
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    pub task_timeout_secs: Option<u64>,
    pub ssh_connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    pub commands: Option<CommandSet>,
}

/// Command-line values that win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub fetch_concurrency: Option<usize>,
    pub delete_concurrency: Option<usize>,
    pub load_concurrency: Option<usize>,
    pub task_timeout_secs: Option<u64>,
    pub abort_on_error: bool,
    pub staging_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let s = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&s).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn parse(s: &str) -> Result<Config, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh_connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS))
    }

    fn endpoint(&self, name: &str) -> Result<Endpoint, ConfigError> {
        let database = self
            .database
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { section: "database", name: name.to_string() })?;
        let ssh = self
            .ssh
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { section: "ssh", name: name.to_string() })?;
        if !is_safe_identifier(&database.name) {
            return Err(ConfigError::UnsafeDatabase { profile: name.to_string(), name: database.name.clone() });
        }
        Ok(Endpoint { name: name.to_string(), database: database.clone(), ssh: ssh.clone() })
    }

    fn commands_for(&self, source: &Endpoint, target: &Endpoint) -> Result<CommandSet, ConfigError> {
        if let Some(c) = &self.commands {
            return Ok(c.clone());
        }
        let builtin = |ep: &Endpoint| {
            CommandSet::for_engine(&ep.database.management_system).ok_or_else(|| ConfigError::UnsupportedEngine {
                profile: ep.name.clone(),
                engine: ep.database.management_system.clone(),
            })
        };
        builtin(target)?;
        builtin(source)
    }

    /// Resolve both profiles and every run setting into a context.
    pub fn resolve(&self, from: &str, to: &str, overrides: &Overrides) -> Result<SyncContext, ConfigError> {
        if from == to {
            return Err(ConfigError::SameProfile(from.to_string()));
        }
        let source = self.endpoint(from)?;
        let target = self.endpoint(to)?;
        let commands = self.commands_for(&source, &target)?;

        let limit = |name: &'static str, flag: Option<usize>, file: Option<usize>| match flag
            .or(file)
            .unwrap_or(DEFAULT_CONCURRENCY)
        {
            0 => Err(ConfigError::ZeroConcurrency(name)),
            n => Ok(n),
        };
        let options = SyncOptions {
            staging_base: overrides
                .staging_dir
                .clone()
                .or_else(|| self.staging_dir.clone())
                .unwrap_or_else(std::env::temp_dir),
            fetch_concurrency: limit("fetch", overrides.fetch_concurrency, self.concurrency.fetch)?,
            delete_concurrency: limit("delete", overrides.delete_concurrency, self.concurrency.delete)?,
            load_concurrency: limit("load", overrides.load_concurrency, self.concurrency.load)?,
            task_timeout: overrides.task_timeout_secs.or(self.task_timeout_secs).map(Duration::from_secs),
            failure_policy: if overrides.abort_on_error { FailurePolicy::Abort } else { self.failure_policy },
        };

        Ok(SyncContext {
            source,
            target,
            blacklist: Blacklist::default().with_extra(self.exclude_tables.iter().cloned()),
            commands,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
database:
  prod:
    host: 10.0.0.5
    name: shop
    user: app
    password: s3cret
    offset: 0
  stage:
    host: 10.0.1.5
    management_system: mysql
    name: shop_stage
    user: app
ssh:
  prod:
    host: prod.example
    user: deploy
    key: ~/.ssh/id_prod
  stage:
    host: stage.example
    port: 2222
    user: deploy
    key: /keys/id_stage
concurrency:
  delete: 5
exclude_tables: [audit_log]
"#;

    fn sample() -> Config {
        Config::parse(SAMPLE).unwrap()
    }

    #[test]
    fn resolves_profiles_with_defaults() {
        let ctx = sample().resolve("prod", "stage", &Overrides::default()).unwrap();
        assert_eq!(ctx.source.database.name, "shop");
        assert_eq!(ctx.source.ssh.port, 22);
        assert_eq!(ctx.target.ssh.port, 2222);
        assert_eq!(ctx.target.database.password, "");
        assert_eq!(ctx.options.fetch_concurrency, 3);
        assert_eq!(ctx.options.delete_concurrency, 5);
        assert_eq!(ctx.options.task_timeout, None);
        assert_eq!(ctx.options.failure_policy, FailurePolicy::Continue);
        assert!(ctx.blacklist.contains("audit_log"));
        assert!(ctx.blacklist.contains("repli_clock"));
        assert_eq!(ctx.commands, CommandSet::mysql());
    }

    #[test]
    fn overrides_win_over_file() {
        let o = Overrides {
            delete_concurrency: Some(1),
            task_timeout_secs: Some(30),
            abort_on_error: true,
            staging_dir: Some(PathBuf::from("/var/tmp/dbsync")),
            ..Default::default()
        };
        let ctx = sample().resolve("prod", "stage", &o).unwrap();
        assert_eq!(ctx.options.delete_concurrency, 1);
        assert_eq!(ctx.options.task_timeout, Some(Duration::from_secs(30)));
        assert_eq!(ctx.options.failure_policy, FailurePolicy::Abort);
        assert_eq!(ctx.options.staging_base, PathBuf::from("/var/tmp/dbsync"));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let err = sample().resolve("prod", "qa", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { section: "database", .. }));
    }

    #[test]
    fn missing_ssh_section_is_rejected() {
        let mut cfg = sample();
        cfg.ssh.remove("stage");
        let err = cfg.resolve("prod", "stage", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { section: "ssh", .. }));
    }

    #[test]
    fn same_profile_is_rejected() {
        let err = sample().resolve("prod", "prod", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::SameProfile(_)));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let o = Overrides { load_concurrency: Some(0), ..Default::default() };
        let err = sample().resolve("prod", "stage", &o).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroConcurrency("load")));
    }

    #[test]
    fn unsafe_database_name_is_rejected() {
        let mut cfg = sample();
        if let Some(db) = cfg.database.get_mut("stage") {
            db.name = "shop; drop".into();
        }
        let err = cfg.resolve("prod", "stage", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsafeDatabase { .. }));
    }

    #[test]
    fn unknown_engine_needs_command_templates() {
        let mut cfg = sample();
        if let Some(db) = cfg.database.get_mut("prod") {
            db.management_system = "postgres".into();
        }
        let err = cfg.resolve("prod", "stage", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedEngine { .. }));

        cfg.commands = Some(CommandSet {
            list: "psql -At -c '\\dt' {db}".into(),
            dump: "dump {db} {table}".into(),
            delete: "truncate {db} {table}".into(),
            load: "load {file}".into(),
        });
        assert!(cfg.resolve("prod", "stage", &Overrides::default()).is_ok());
    }

    #[test]
    fn failure_policy_parses_lowercase() {
        let cfg = Config::parse("failure_policy: abort\n").unwrap();
        assert_eq!(cfg.failure_policy, FailurePolicy::Abort);
        assert!(Config::parse("failure_policy: maybe\n").is_err());
    }
}
