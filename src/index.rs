//! Authoritative list of every loan identifier, kept as one ledger record
use super::codec::{self, IndexRecord};
use super::error::{RegistryError, Result};
use super::ledger::{Ledger, Swap};

pub const DEFAULT_INDEX_KEY: &str = "loansCreated";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
pub struct IdentifierIndex {
    key: String,
    max_attempts: u32,
}

impl Default for IdentifierIndex {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_KEY, DEFAULT_MAX_ATTEMPTS)
    }
}

impl IdentifierIndex {
    pub fn new(key: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            key: key.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current index record together with the raw bytes it was read from.
    fn read(&self, ledger: &impl Ledger) -> Result<(IndexRecord, Option<Vec<u8>>)> {
        match ledger.get(&self.key)? {
            Some(bytes) => Ok((codec::decode(&self.key, &bytes)?, Some(bytes))),
            None => Ok((IndexRecord::default(), None)),
        }
    }

    /// Every identifier in creation order. An absent record is an empty index.
    pub fn load(&self, ledger: &impl Ledger) -> Result<Vec<String>> {
        Ok(self.read(ledger)?.0.identifiers)
    }

    /// Write an empty index if none exists yet. Returns the number of entries.
    pub fn initialise(&self, ledger: &impl Ledger) -> Result<usize> {
        let (record, raw) = self.read(ledger)?;
        if raw.is_some() {
            return Ok(record.identifiers.len());
        }

        let encoded = codec::encode(&self.key, &record)?;
        match ledger.compare_and_swap(&self.key, None, &encoded)? {
            Swap::Applied => Ok(0),
            // someone else initialised (or appended) first
            Swap::Conflict { .. } => Ok(self.load(ledger)?.len()),
        }
    }

    /// Read-check-write append. Re-reads and re-checks for duplicates whenever
    /// another writer got in between, up to the configured number of attempts.
    pub fn append(&self, ledger: &impl Ledger, identifier: &str) -> Result<u64> {
        for attempt in 1..=self.max_attempts {
            let (mut record, raw) = self.read(ledger)?;

            if record.identifiers.iter().any(|existing| existing == identifier) {
                return Err(RegistryError::DuplicateIdentifier(identifier.to_string()));
            }

            record.identifiers.push(identifier.to_string());
            record.version += 1;
            let encoded = codec::encode(&self.key, &record)?;

            match ledger.compare_and_swap(&self.key, raw.as_deref(), &encoded)? {
                Swap::Applied => {
                    tracing::debug!(
                        identifier,
                        version = record.version,
                        "appended to identifier index"
                    );
                    return Ok(record.version);
                }
                Swap::Conflict { .. } => {
                    tracing::warn!(identifier, attempt, "identifier index changed, re-reading");
                }
            }
        }

        Err(RegistryError::ConcurrentModification(self.key.clone()))
    }

    /// Take back an identifier whose loan record never got written. Returns
    /// whether an entry was removed; an identifier that is not listed is left alone.
    pub fn retract(&self, ledger: &impl Ledger, identifier: &str) -> Result<bool> {
        for attempt in 1..=self.max_attempts {
            let (mut record, raw) = self.read(ledger)?;

            let before = record.identifiers.len();
            record.identifiers.retain(|existing| existing != identifier);
            if record.identifiers.len() == before {
                return Ok(false);
            }

            record.version += 1;
            let encoded = codec::encode(&self.key, &record)?;

            match ledger.compare_and_swap(&self.key, raw.as_deref(), &encoded)? {
                Swap::Applied => {
                    tracing::debug!(
                        identifier,
                        version = record.version,
                        "retracted from identifier index"
                    );
                    return Ok(true);
                }
                Swap::Conflict { .. } => {
                    tracing::warn!(identifier, attempt, "identifier index changed, re-reading");
                }
            }
        }

        Err(RegistryError::ConcurrentModification(self.key.clone()))
    }
}
