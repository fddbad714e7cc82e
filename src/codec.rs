//! CBOR record codec for everything the registry keeps in the ledger
use super::error::{RegistryError, Result};
use super::types::Loan;

/// The single ledger record holding every loan identifier ever created.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
#[cbor(map)]
pub struct IndexRecord {
    #[n(0)]
    pub version: u64, // bumped on every append
    #[n(1)]
    pub identifiers: Vec<String>,
}

/// Serialise any record type. `key` only labels the error.
pub fn encode<T>(key: &str, record: &T) -> Result<Vec<u8>>
where
    T: minicbor::Encode<()>,
{
    minicbor::to_vec(record).map_err(|err| RegistryError::corrupt(key, err))
}

pub fn decode<T>(key: &str, bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|err| RegistryError::corrupt(key, err))
}

/// Decode a loan and make sure it is the one stored under `key`.
pub fn decode_loan(key: &str, bytes: &[u8]) -> Result<Loan> {
    let loan: Loan = decode(key, bytes)?;

    if loan.identifier != key {
        return Err(RegistryError::corrupt(
            key,
            format!("record names loan {}", loan.identifier),
        ));
    }

    Ok(loan)
}

/// sha256 of an encoded record, hex encoded. Logged with every write.
pub fn fingerprint(bytes: &[u8]) -> String {
    sha256::digest(bytes)
}
