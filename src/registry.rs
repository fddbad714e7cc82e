//! Loan registry: creation, retrieval, field mutation and listing
use super::codec;
use super::config::RegistryConfig;
use super::error::{RegistryError, Result};
use super::index::IdentifierIndex;
use super::ledger::{Ledger, Swap};
use super::lifecycle;
use super::types::{Caller, FieldUpdate, Loan, LoanField, LoanId, LoanListing, TimeStamp};

/// Sole writer of loan records and of the identifier index.
///
/// Every write is a compare-and-swap against the bytes the operation read, so
/// two callers racing on the same record cannot silently overwrite each other.
pub struct LoanRegistry<L: Ledger> {
    ledger: L,
    index: IdentifierIndex,
}

impl<L: Ledger> LoanRegistry<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_index(ledger, IdentifierIndex::default())
    }

    pub fn with_index(ledger: L, index: IdentifierIndex) -> Self {
        Self { ledger, index }
    }

    pub fn with_config(ledger: L, config: &RegistryConfig) -> Self {
        Self::with_index(ledger, config.index())
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn index(&self) -> &IdentifierIndex {
        &self.index
    }

    /// Make sure the identifier index exists. Never discards existing entries.
    pub fn initialise(&self) -> Result<usize> {
        let count = self.index.initialise(&self.ledger)?;
        tracing::info!(count, index = self.index.key(), "registry initialised");
        Ok(count)
    }

    /// Record a new loan in `INIT` with the caller as borrower.
    ///
    /// The identifier is claimed in the index before the loan record is
    /// written: a successful append is what makes the identifier ours, so a
    /// failed create never leaves a loan record that the index does not know.
    /// If the record write then fails the claim is retracted, so the
    /// identifier can be created again.
    pub fn create(&self, caller: &Caller, identifier: &str) -> Result<Loan> {
        let id = LoanId::parse(identifier)?;

        if let Err(err) = lifecycle::authorize_create(caller.affiliation) {
            tracing::warn!(identifier, caller = %caller.identity, %err, "create rejected");
            return Err(err);
        }
        if self.ledger.get(id.as_str())?.is_some() {
            return Err(RegistryError::DuplicateIdentifier(identifier.to_string()));
        }

        let loan = Loan::new(&id, caller.identity.as_str());
        let encoded = codec::encode(id.as_str(), &loan)?;

        let version = self.index.append(&self.ledger, id.as_str())?;

        let err = match self.ledger.compare_and_swap(id.as_str(), None, &encoded) {
            Ok(Swap::Applied) => {
                tracing::info!(
                    identifier,
                    borrower = %loan.borrower,
                    index_version = version,
                    fingerprint = %codec::fingerprint(&encoded),
                    "loan created"
                );
                return Ok(loan);
            }
            Ok(Swap::Conflict { .. }) => {
                tracing::warn!(identifier, "loan record appeared after index append");
                RegistryError::ConcurrentModification(identifier.to_string())
            }
            Err(err) => err,
        };

        self.release_claim(identifier);
        Err(err)
    }

    // a failed retract is only logged, the create reports its own error
    fn release_claim(&self, identifier: &str) {
        match self.index.retract(&self.ledger, identifier) {
            Ok(_) => tracing::warn!(identifier, "create failed, index entry retracted"),
            Err(err) => {
                tracing::warn!(identifier, %err, "create failed and index entry could not be retracted")
            }
        }
    }

    fn read_loan(&self, identifier: &str) -> Result<(Loan, Vec<u8>)> {
        let bytes = self
            .ledger
            .get(identifier)?
            .ok_or_else(|| RegistryError::NotFound(identifier.to_string()))?;

        Ok((codec::decode_loan(identifier, &bytes)?, bytes))
    }

    pub fn retrieve(&self, identifier: &str) -> Result<Loan> {
        let (loan, _) = self.read_loan(identifier)?;
        tracing::debug!(identifier, status = %loan.status, "loan retrieved");
        Ok(loan)
    }

    /// True when nothing is recorded under `identifier`.
    pub fn check_unique(&self, identifier: &str) -> Result<bool> {
        match self.retrieve(identifier) {
            Ok(_) => Ok(false),
            Err(RegistryError::NotFound(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// Parse `value` for `field` and apply it.
    pub fn update_field(
        &self,
        identifier: &str,
        caller: &Caller,
        field: LoanField,
        value: &str,
    ) -> Result<Loan> {
        self.mutate(identifier, caller, || FieldUpdate::parse(field, value))
    }

    pub fn apply_update(
        &self,
        identifier: &str,
        caller: &Caller,
        update: &FieldUpdate,
    ) -> Result<Loan> {
        self.mutate(identifier, caller, || Ok(update.clone()))
    }

    // existence is checked before the value is parsed, so a bad value on a
    // missing loan reports NotFound
    fn mutate(
        &self,
        identifier: &str,
        caller: &Caller,
        update: impl FnOnce() -> Result<FieldUpdate>,
    ) -> Result<Loan> {
        let (mut loan, stored) = self.read_loan(identifier)?;
        let update = update()?;
        let previous = loan.status;

        if let Err(err) = lifecycle::authorize(previous, caller.affiliation, &update) {
            tracing::warn!(
                identifier,
                caller = %caller.identity,
                affiliation = %caller.affiliation,
                field = %update.field(),
                %err,
                "update rejected"
            );
            return Err(err);
        }

        loan.apply(&update);
        loan.check_amounts()?;
        loan.updated_at = TimeStamp::new();

        let encoded = codec::encode(identifier, &loan)?;
        match self
            .ledger
            .compare_and_swap(identifier, Some(stored.as_slice()), &encoded)?
        {
            Swap::Applied => {}
            Swap::Conflict { .. } => {
                tracing::warn!(identifier, field = %update.field(), "loan changed underneath update");
                return Err(RegistryError::ConcurrentModification(identifier.to_string()));
            }
        }

        if loan.status != previous {
            tracing::info!(identifier, from = %previous, to = %loan.status, "loan status advanced");
        } else {
            tracing::debug!(
                identifier,
                field = %update.field(),
                fingerprint = %codec::fingerprint(&encoded),
                "loan field updated"
            );
        }

        Ok(loan)
    }

    pub fn update_status(&self, identifier: &str, caller: &Caller, value: &str) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::Status, value)
    }

    pub fn update_loan_amount(&self, identifier: &str, caller: &Caller, value: &str) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::LoanAmount, value)
    }

    pub fn update_disbursed_amount(
        &self,
        identifier: &str,
        caller: &Caller,
        value: &str,
    ) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::DisbursedAmount, value)
    }

    pub fn update_repayed_amount(
        &self,
        identifier: &str,
        caller: &Caller,
        value: &str,
    ) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::RepayedAmount, value)
    }

    pub fn update_borrower(&self, identifier: &str, caller: &Caller, value: &str) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::Borrower, value)
    }

    pub fn update_lead_arranger(
        &self,
        identifier: &str,
        caller: &Caller,
        value: &str,
    ) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::LeadArranger, value)
    }

    pub fn update_participating_bank(
        &self,
        identifier: &str,
        caller: &Caller,
        value: &str,
    ) -> Result<Loan> {
        self.update_field(identifier, caller, LoanField::ParticipatingBank, value)
    }

    /// Every loan in index order. Entries that are missing or fail to decode
    /// are skipped and named in `omitted`; a ledger failure fails the call.
    pub fn list(&self, caller: &Caller) -> Result<LoanListing> {
        let mut listing = LoanListing::default();

        for identifier in self.index.load(&self.ledger)? {
            match self.read_loan(&identifier) {
                Ok((loan, _)) => listing.loans.push(loan),
                Err(err @ (RegistryError::CorruptRecord { .. } | RegistryError::NotFound(_))) => {
                    tracing::warn!(%identifier, %err, "omitting loan from listing");
                    listing.omitted.push(identifier);
                }
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(
            caller = %caller.identity,
            loans = listing.loans.len(),
            omitted = listing.omitted_count(),
            "loans listed"
        );
        Ok(listing)
    }

    /// Number of loans ever created.
    pub fn count(&self) -> Result<usize> {
        Ok(self.index.load(&self.ledger)?.len())
    }

    pub fn identifiers(&self) -> Result<Vec<String>> {
        self.index.load(&self.ledger)
    }
}
