//! Command templates for listing, dumping, clearing and loading tables.
//!
//! Templates are opaque shell text. Placeholders: `{db}`, `{table}`, `{user}`,
//! `{password}`, `{password_flag}`, `{host}`, `{file}`. Database and table names
//! are checked with [`is_safe_identifier`] before substitution.

use dbsync_core::{is_safe_identifier, DatabaseProfile, ExecError};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandSet {
    /// Runs on the source; prints one table name per line.
    pub list: String,
    /// Runs on the source; prints the table's rows.
    pub dump: String,
    /// Runs on the target; empties the table.
    pub delete: String,
    /// Runs locally; bulk-loads a dump file into the target table.
    pub load: String,
}

impl CommandSet {
    pub fn mysql() -> Self {
        CommandSet {
            list: "mysql {db} -u{user} {password_flag} -B -N -e 'show tables'".into(),
            dump: "mysql -u{user} {password_flag} -B -N -e 'SELECT * FROM {db}.{table}'".into(),
            delete: "mysql -u{user} {password_flag} -B -N -e 'DELETE FROM {db}.{table}'".into(),
            load: "mysql -u{user} {password_flag} -h{host} --enable-local-infile \
                   --execute=\"LOAD DATA LOCAL INFILE '{file}' INTO TABLE {db}.{table}\""
                .into(),
        }
    }

    /// Built-in templates for a `management_system` value.
    pub fn for_engine(engine: &str) -> Option<Self> {
        match engine.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::mysql()),
            _ => None,
        }
    }

    pub fn list_command(&self, db: &DatabaseProfile) -> Result<String, ExecError> {
        checked(&db.name)?;
        Ok(render(&self.list, db, None, None, None))
    }

    pub fn dump_command(&self, db: &DatabaseProfile, table: &str) -> Result<String, ExecError> {
        checked(&db.name)?;
        checked(table)?;
        Ok(render(&self.dump, db, Some(table), None, None))
    }

    pub fn delete_command(&self, db: &DatabaseProfile, table: &str) -> Result<String, ExecError> {
        checked(&db.name)?;
        checked(table)?;
        Ok(render(&self.delete, db, Some(table), None, None))
    }

    /// `host` is the machine the target database listens on.
    pub fn load_command(&self, db: &DatabaseProfile, host: &str, table: &str, file: &Path) -> Result<String, ExecError> {
        checked(&db.name)?;
        checked(table)?;
        Ok(render(&self.load, db, Some(table), Some(host), Some(file)))
    }
}

fn checked(name: &str) -> Result<(), ExecError> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        Err(ExecError::UnsafeIdentifier(name.to_string()))
    }
}

fn render(template: &str, db: &DatabaseProfile, table: Option<&str>, host: Option<&str>, file: Option<&Path>) -> String {
    let password_flag = if db.password.is_empty() { String::new() } else { format!("-p{}", shell_quote(&db.password)) };
    let file = file.map(|f| f.to_string_lossy().into_owned());
    let vars: [(&str, Option<&str>); 7] = [
        ("db", Some(db.name.as_str())),
        ("user", Some(db.user.as_str())),
        ("password", Some(db.password.as_str())),
        ("password_flag", Some(password_flag.as_str())),
        ("table", table),
        ("host", host),
        ("file", file.as_deref()),
    ];
    let template = if db.password.is_empty() { template.replace(" {password_flag}", "") } else { template.to_string() };

    // Single pass, so substituted values are never re-expanded.
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template.as_str();
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        match vars.iter().find(|(k, _)| *k == &tail[1..close]) {
            Some((_, Some(value))) => out.push_str(value),
            _ => out.push_str(&tail[..=close]),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Mask `secret`, raw or shell-quoted, in a command before it is logged.
pub fn redact(command: &str, secret: &str) -> String {
    if secret.is_empty() {
        command.to_string()
    } else {
        command.replace(&shell_quote(secret), "'***'").replace(secret, "***")
    }
}
