//! Table blacklist and the per-run working table set.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Replication and migration bookkeeping tables that are never synced.
pub const RESERVED_TABLES: [&str; 3] = ["schema_migrations", "repli_chk", "repli_clock"];

/// Set of table names excluded from every phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blacklist {
    names: HashSet<String>,
}

impl Default for Blacklist {
    fn default() -> Self {
        Blacklist { names: RESERVED_TABLES.iter().map(|s| s.to_string()).collect() }
    }
}

impl Blacklist {
    /// Reserved tables plus operator-supplied extras.
    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(extra.into_iter().map(Into::into));
        self
    }

    pub fn contains(&self, table: &str) -> bool {
        self.names.contains(table)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Ordered, duplicate-free set of tables a run works on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSet(Vec<String>);

impl TableSet {
    /// Parse raw listing output (one name per line) and drop blacklisted names.
    /// Listing order is kept; blank lines and repeats are ignored.
    pub fn from_listing(raw: &str, blacklist: &Blacklist) -> Self {
        Self::from_names(
            raw.lines()
                .map(|l| l.trim_end_matches('\r').trim())
                .filter(|l| !l.is_empty())
                .filter(|l| !blacklist.contains(l)),
        )
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for name in names {
            let name = name.into();
            if seen.insert(name.clone()) {
                tables.push(name);
            }
        }
        TableSet(tables)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// True when `name` can be spliced into a shell command as a database or table identifier.
pub fn is_safe_identifier(name: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let re = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z0-9_$]+$").expect("identifier pattern is valid"));
    re.is_match(name)
}
