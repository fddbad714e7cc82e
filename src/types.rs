//! Core loan entity, lifecycle status and caller types
use super::error::{RegistryError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Placeholder the ledger has always shown for fields nobody has set yet.
pub const UNDEFINED: &str = "UNDEFINED";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoanId(String);

impl LoanId {
    /// Two ASCII letters followed by seven ASCII digits, e.g. `AB1234567`.
    pub fn is_valid(raw: &str) -> bool {
        let bytes = raw.as_bytes();

        bytes.len() == 9
            && bytes[..2].iter().all(u8::is_ascii_alphabetic)
            && bytes[2..].iter().all(u8::is_ascii_digit)
    }
    pub fn parse(raw: &str) -> Result<Self> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(RegistryError::InvalidIdentifier(raw.to_string()))
        }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LoanId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Declaration order is lifecycle order, the derived `Ord` relies on it.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cbor(index_only)]
pub enum LoanStatus {
    #[n(0)]
    Init,
    #[n(1)]
    LeadArrangerAccepted,
    #[n(2)]
    ParticipatingBankInvited,
    #[n(3)]
    ParticipatingBankAccepted,
    #[n(4)]
    Disbursed,
    #[n(5)]
    Repayed,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 6] = [
        LoanStatus::Init,
        LoanStatus::LeadArrangerAccepted,
        LoanStatus::ParticipatingBankInvited,
        LoanStatus::ParticipatingBankAccepted,
        LoanStatus::Disbursed,
        LoanStatus::Repayed,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }
    /// The only state a status update may name, `None` once repayed.
    pub fn next(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
    pub fn as_str(self) -> &'static str {
        match self {
            LoanStatus::Init => "INIT",
            LoanStatus::LeadArrangerAccepted => "LEAD_ARRANGER_ACCEPTED",
            LoanStatus::ParticipatingBankInvited => "PARTICIPATING_BANK_INVITED",
            LoanStatus::ParticipatingBankAccepted => "PARTICIPATING_BANK_ACCEPTED",
            LoanStatus::Disbursed => "DISBURSED",
            LoanStatus::Repayed => "REPAYED",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = RegistryError;

    /// Accepts the ordinal (`"1"`) or the state name (`"LEAD_ARRANGER_ACCEPTED"`).
    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();

        if let Ok(ordinal) = raw.parse::<u8>() {
            return Self::from_ordinal(ordinal).ok_or_else(|| {
                RegistryError::invalid_value("status", s, "no lifecycle state with that ordinal")
            });
        }

        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| RegistryError::invalid_value("status", s, "unknown lifecycle state"))
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.ordinal())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affiliation {
    Regulator,
    Borrower,
    LeadArranger,
    ParticipatingBank,
}

impl Affiliation {
    pub const ALL: [Affiliation; 4] = [
        Affiliation::Regulator,
        Affiliation::Borrower,
        Affiliation::LeadArranger,
        Affiliation::ParticipatingBank,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Affiliation::Regulator => "regulator",
            Affiliation::Borrower => "borrower",
            Affiliation::LeadArranger => "leadArranger",
            Affiliation::ParticipatingBank => "participatingBank",
        }
    }
}

impl FromStr for Affiliation {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|affiliation| affiliation.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                RegistryError::IdentityUnavailable(format!("unrecognised affiliation {s:?}"))
            })
    }
}

impl fmt::Display for Affiliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and role of whoever invoked the current operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub identity: String,
    pub affiliation: Affiliation,
}

impl Caller {
    pub fn new(identity: impl Into<String>, affiliation: Affiliation) -> Self {
        Self {
            identity: identity.into(),
            affiliation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoanField {
    Status,
    LoanAmount,
    DisbursedAmount,
    RepayedAmount,
    Borrower,
    LeadArranger,
    ParticipatingBank,
}

impl LoanField {
    pub const ALL: [LoanField; 7] = [
        LoanField::Status,
        LoanField::LoanAmount,
        LoanField::DisbursedAmount,
        LoanField::RepayedAmount,
        LoanField::Borrower,
        LoanField::LeadArranger,
        LoanField::ParticipatingBank,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LoanField::Status => "status",
            LoanField::LoanAmount => "loanAmount",
            LoanField::DisbursedAmount => "disbursedAmount",
            LoanField::RepayedAmount => "repayedAmount",
            LoanField::Borrower => "borrower",
            LoanField::LeadArranger => "leadArranger",
            LoanField::ParticipatingBank => "participatingBank",
        }
    }
}

impl FromStr for LoanField {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| RegistryError::invalid_value("field", s, "not a mutable loan field"))
    }
}

impl fmt::Display for LoanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed mutation, one variant per mutable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Status(LoanStatus),
    LoanAmount(u64),
    DisbursedAmount(u64),
    RepayedAmount(u64),
    Borrower(String),
    LeadArranger(String),
    ParticipatingBank(String),
}

impl FieldUpdate {
    /// Parse the raw string argument for `field` into a typed update.
    pub fn parse(field: LoanField, raw: &str) -> Result<Self> {
        let update = match field {
            LoanField::Status => FieldUpdate::Status(raw.parse()?),
            LoanField::LoanAmount => FieldUpdate::LoanAmount(parse_amount(field, raw)?),
            LoanField::DisbursedAmount => FieldUpdate::DisbursedAmount(parse_amount(field, raw)?),
            LoanField::RepayedAmount => FieldUpdate::RepayedAmount(parse_amount(field, raw)?),
            LoanField::Borrower => FieldUpdate::Borrower(parse_party(field, raw)?),
            LoanField::LeadArranger => FieldUpdate::LeadArranger(parse_party(field, raw)?),
            LoanField::ParticipatingBank => {
                FieldUpdate::ParticipatingBank(parse_party(field, raw)?)
            }
        };

        Ok(update)
    }
    pub fn field(&self) -> LoanField {
        match self {
            FieldUpdate::Status(_) => LoanField::Status,
            FieldUpdate::LoanAmount(_) => LoanField::LoanAmount,
            FieldUpdate::DisbursedAmount(_) => LoanField::DisbursedAmount,
            FieldUpdate::RepayedAmount(_) => LoanField::RepayedAmount,
            FieldUpdate::Borrower(_) => LoanField::Borrower,
            FieldUpdate::LeadArranger(_) => LoanField::LeadArranger,
            FieldUpdate::ParticipatingBank(_) => LoanField::ParticipatingBank,
        }
    }
}

fn parse_amount(field: LoanField, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        RegistryError::invalid_value(field.as_str(), raw, "expected a non-negative integer")
    })
}

fn parse_party(field: LoanField, raw: &str) -> Result<String> {
    let party = raw.trim();

    if party.is_empty() || party.eq_ignore_ascii_case(UNDEFINED) {
        return Err(RegistryError::invalid_value(
            field.as_str(),
            raw,
            "expected a participant identity",
        ));
    }

    Ok(party.to_string())
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn from_nanos(nanos: i64) -> Self {
        Self(DateTime::from_timestamp_nanos(nanos))
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

// Stored as signed nanoseconds since the epoch, which covers 1677..2262.
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> std::result::Result<(), minicbor::encode::Error<W::Error>> {
        let nanos = self.0.timestamp_nanos_opt().ok_or_else(|| {
            minicbor::encode::Error::<W::Error>::message("timestamp outside the nanosecond range")
        })?;
        e.i64(nanos)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _: &mut C,
    ) -> std::result::Result<Self, minicbor::decode::Error> {
        d.i64().map(Self::from_nanos)
    }
}

/// A loan as stored under its identifier in the ledger.
///
/// Monetary and party fields are `None` until first set, which is what the
/// ledger shows as `UNDEFINED`. Unset amounts count as zero.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
#[cbor(map)]
pub struct Loan {
    #[n(0)]
    pub identifier: String,
    #[n(1)]
    pub loan_amount: Option<u64>,
    #[n(2)]
    pub disbursed_amount: Option<u64>,
    #[n(3)]
    pub repayed_amount: Option<u64>,
    #[n(4)]
    pub borrower: String,
    #[n(5)]
    pub lead_arranger: Option<String>,
    #[n(6)]
    pub participating_bank: Option<String>,
    #[n(7)]
    pub status: LoanStatus,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub updated_at: TimeStamp<Utc>,
}

impl Loan {
    pub fn new(identifier: &LoanId, borrower: impl Into<String>) -> Self {
        let now = TimeStamp::new();

        Self {
            identifier: identifier.as_str().to_string(),
            loan_amount: None,
            disbursed_amount: None,
            repayed_amount: None,
            borrower: borrower.into(),
            lead_arranger: None,
            participating_bank: None,
            status: LoanStatus::Init,
            created_at: now.clone(),
            updated_at: now,
        }
    }
    /// Sets exactly one field. Authorisation and invariants are the caller's concern.
    pub fn apply(&mut self, update: &FieldUpdate) {
        match update {
            FieldUpdate::Status(status) => self.status = *status,
            FieldUpdate::LoanAmount(amount) => self.loan_amount = Some(*amount),
            FieldUpdate::DisbursedAmount(amount) => self.disbursed_amount = Some(*amount),
            FieldUpdate::RepayedAmount(amount) => self.repayed_amount = Some(*amount),
            FieldUpdate::Borrower(party) => self.borrower = party.clone(),
            FieldUpdate::LeadArranger(party) => self.lead_arranger = Some(party.clone()),
            FieldUpdate::ParticipatingBank(party) => {
                self.participating_bank = Some(party.clone())
            }
        }
    }
    /// `repayed <= disbursed <= loan`, unset amounts counting as zero.
    pub fn check_amounts(&self) -> Result<()> {
        let loan = self.loan_amount.unwrap_or(0);
        let disbursed = self.disbursed_amount.unwrap_or(0);
        let repayed = self.repayed_amount.unwrap_or(0);

        if disbursed > loan {
            return Err(RegistryError::invalid_value(
                LoanField::DisbursedAmount.as_str(),
                disbursed.to_string(),
                format!("exceeds loan amount {loan}"),
            ));
        }
        if repayed > disbursed {
            return Err(RegistryError::invalid_value(
                LoanField::RepayedAmount.as_str(),
                repayed.to_string(),
                format!("exceeds disbursed amount {disbursed}"),
            ));
        }

        Ok(())
    }
}

/// Result of a full-index scan. Identifiers that could not be read are
/// reported in `omitted` rather than failing the whole listing.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
#[cbor(map)]
pub struct LoanListing {
    #[n(0)]
    pub loans: Vec<Loan>,
    #[n(1)]
    pub omitted: Vec<String>,
}

impl LoanListing {
    pub fn omitted_count(&self) -> usize {
        self.omitted.len()
    }
}
