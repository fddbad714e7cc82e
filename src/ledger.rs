//! Point access to the key-value ledger the registry is recorded in
use super::error::{RegistryError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Swap {
    Applied,
    /// Someone else wrote first, `current` is what is stored now.
    Conflict { current: Option<Vec<u8>> },
}

/// Storage substrate. Reads of a missing key return `Ok(None)`, never an error.
pub trait Ledger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Unconditional write. The registry itself always writes through
    /// `compare_and_swap`; this is for seeding and repair tooling.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write `value` only if the key currently holds `expected` (`None` meaning absent).
    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, value: &[u8]) -> Result<Swap>;
}

impl<L: Ledger + ?Sized> Ledger for &L {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }
    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, value: &[u8]) -> Result<Swap> {
        (**self).compare_and_swap(key, expected, value)
    }
}

#[derive(Clone)]
pub struct SledLedger {
    instance: Arc<sled::Db>,
}

impl SledLedger {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.instance.flush()?)
    }
}

impl Ledger for SledLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.instance.get(key.as_bytes())?.map(|value| value.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.instance.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, value: &[u8]) -> Result<Swap> {
        match self
            .instance
            .compare_and_swap(key.as_bytes(), expected, Some(value))?
        {
            Ok(()) => Ok(Swap::Applied),
            Err(conflict) => Ok(Swap::Conflict {
                current: conflict.current.map(|current| current.to_vec()),
            }),
        }
    }
}

/// In-process ledger for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.records
            .lock()
            .map_err(|_| RegistryError::LedgerUnavailable("memory ledger lock poisoned".into()))
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.records()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn compare_and_swap(&self, key: &str, expected: Option<&[u8]>, value: &[u8]) -> Result<Swap> {
        let mut records = self.records()?;
        let current = records.get(key).map(Vec::as_slice);

        if current != expected {
            return Ok(Swap::Conflict {
                current: current.map(<[u8]>::to_vec),
            });
        }

        records.insert(key.to_string(), value.to_vec());
        Ok(Swap::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(ledger: &impl Ledger) {
        assert_eq!(ledger.get("missing").unwrap(), None);

        assert_eq!(
            ledger.compare_and_swap("k", None, b"one").unwrap(),
            Swap::Applied
        );
        assert_eq!(
            ledger.compare_and_swap("k", None, b"two").unwrap(),
            Swap::Conflict {
                current: Some(b"one".to_vec())
            }
        );
        assert_eq!(
            ledger.compare_and_swap("k", Some(&b"one"[..]), b"two").unwrap(),
            Swap::Applied
        );

        ledger.put("k", b"three").unwrap();
        assert_eq!(ledger.get("k").unwrap(), Some(b"three".to_vec()));
    }

    #[test]
    fn memory_ledger_semantics() {
        exercise(&MemoryLedger::new());
    }

    #[test]
    fn sled_ledger_semantics() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        exercise(&SledLedger::new(Arc::new(db)));
    }
}
