//! Registry and ledger settings
use super::index::{DEFAULT_INDEX_KEY, DEFAULT_MAX_ATTEMPTS, IdentifierIndex};
use super::ledger::SledLedger;
use super::types::LoanId;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

pub const PATH_VAR: &str = "LOAN_REGISTRY_PATH";
pub const INDEX_KEY_VAR: &str = "LOAN_REGISTRY_INDEX_KEY";
pub const MAX_INDEX_ATTEMPTS_VAR: &str = "LOAN_REGISTRY_MAX_INDEX_ATTEMPTS";

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    path: Option<PathBuf>,
    temporary: bool,
    index_key: String,
    max_index_attempts: u32,
    flush_every_ms: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            temporary: false,
            index_key: DEFAULT_INDEX_KEY.to_string(),
            max_index_attempts: DEFAULT_MAX_ATTEMPTS,
            flush_every_ms: Some(500), // sled's own default
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `LOAN_REGISTRY_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::new().overlay_env()
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Self::new().overlay(lookup)
    }

    /// Apply any `LOAN_REGISTRY_*` environment variables on top of `self`.
    pub fn overlay_env(self) -> anyhow::Result<Self> {
        self.overlay(|name| std::env::var(name).ok())
    }

    /// Apply the variables `lookup` knows about on top of `self`. Only values
    /// that fail to parse are errors here; completeness is checked by
    /// [`RegistryConfig::validate`] when the ledger is opened.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(path) = lookup(PATH_VAR) {
            self = self.set_path(path);
        }
        if let Some(key) = lookup(INDEX_KEY_VAR) {
            self = self.set_index_key(key);
        }
        if let Some(attempts) = lookup(MAX_INDEX_ATTEMPTS_VAR) {
            let attempts = attempts
                .trim()
                .parse::<u32>()
                .with_context(|| format!("{MAX_INDEX_ATTEMPTS_VAR}={attempts:?} is not a count"))?;
            self = self.set_max_index_attempts(attempts);
        }

        Ok(self)
    }

    pub fn set_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
    pub fn set_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }
    pub fn set_index_key(mut self, key: impl Into<String>) -> Self {
        self.index_key = key.into();
        self
    }
    pub fn set_max_index_attempts(mut self, attempts: u32) -> Self {
        self.max_index_attempts = attempts;
        self
    }
    pub fn set_flush_every_ms(mut self, every: Option<u64>) -> Self {
        self.flush_every_ms = every;
        self
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// The index key shares the key space with loans, so it must never look like one.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.index_key.is_empty() {
            anyhow::bail!("index key must not be empty");
        }
        if LoanId::is_valid(&self.index_key) {
            anyhow::bail!(
                "index key {:?} collides with the loan identifier format",
                self.index_key
            );
        }
        if self.max_index_attempts == 0 {
            anyhow::bail!("max index attempts must be at least 1");
        }
        if self.path.is_none() && !self.temporary {
            anyhow::bail!("no ledger path configured, set {PATH_VAR} or use a temporary ledger");
        }
        Ok(())
    }

    pub fn index(&self) -> IdentifierIndex {
        IdentifierIndex::new(self.index_key.clone(), self.max_index_attempts)
    }

    pub fn open_ledger(&self) -> anyhow::Result<SledLedger> {
        self.validate()?;

        let mut sled_config = sled::Config::new()
            .temporary(self.temporary)
            .flush_every_ms(self.flush_every_ms);
        if let Some(path) = &self.path {
            sled_config = sled_config.path(path);
        }

        let db = sled_config
            .open()
            .with_context(|| format!("failed to open ledger at {:?}", self.path))?;
        tracing::info!(path = ?self.path, temporary = self.temporary, "ledger opened");

        Ok(SledLedger::new(Arc::new(db)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn reads_overrides() {
        let config = RegistryConfig::from_lookup(lookup(&[
            (PATH_VAR, "/tmp/loans.db"),
            (INDEX_KEY_VAR, "allLoans"),
            (MAX_INDEX_ATTEMPTS_VAR, "3"),
        ]))
        .unwrap();

        assert_eq!(config.index_key(), "allLoans");
        assert_eq!(config.index().key(), "allLoans");
        assert_eq!(config.max_index_attempts, 3);
    }

    #[test]
    fn requires_a_path_or_temporary() {
        let config = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.validate().is_err());
        assert!(config.open_ledger().is_err());
        assert!(RegistryConfig::new().set_temporary(true).validate().is_ok());
    }

    #[test]
    fn temporary_ledger_takes_env_overrides() {
        let config = RegistryConfig::new()
            .set_temporary(true)
            .overlay(lookup(&[(INDEX_KEY_VAR, "allLoans")]))
            .unwrap();

        assert!(config.temporary);
        assert_eq!(config.index_key(), "allLoans");
        assert!(config.open_ledger().is_ok());
    }

    #[test]
    fn temporary_ledger_opens_without_any_env() {
        let config = RegistryConfig::new()
            .set_temporary(true)
            .overlay(lookup(&[]))
            .unwrap();

        assert!(config.open_ledger().is_ok());
    }

    #[test]
    fn rejects_index_key_shaped_like_a_loan() {
        let config = RegistryConfig::new()
            .set_temporary(true)
            .set_index_key("ZZ0000000");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unparsable_attempts() {
        let result = RegistryConfig::from_lookup(lookup(&[
            (PATH_VAR, "/tmp/loans.db"),
            (MAX_INDEX_ATTEMPTS_VAR, "many"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn opens_temporary_ledger() {
        let ledger = RegistryConfig::new().set_temporary(true).open_ledger();
        assert!(ledger.is_ok());
    }
}
