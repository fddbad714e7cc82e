//! Property-based tests for the loan registry
//!
//! These use proptest to check the registry's invariants over generated
//! identifiers, loans and call sequences: the record codec round-trips,
//! status only ever moves one step forward, and the monetary ordering
//! `repayed <= disbursed <= loan` survives any sequence of amount updates.

use loan_registry::{
    Affiliation, Caller, FieldUpdate, Ledger, Loan, LoanId, LoanRegistry, LoanStatus,
    MemoryLedger, RegistryError, codec, types::TimeStamp,
};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

/// Identifiers in the required two letters plus seven digits shape
fn valid_identifier_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z]{2}[0-9]{7}"
}

/// Identifiers that miss the shape in one of several ways
fn invalid_identifier_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{0,12}",           // no letter prefix at all
        "[A-Z]{1}[0-9]{7}",      // one letter short
        "[A-Z]{2}[0-9]{1,6}",    // too few digits
        "[A-Z]{2}[0-9]{8,10}",   // too many digits
        "[A-Z]{3,5}[0-9]{7}",    // too many letters
    ]
}

fn status_strategy() -> impl Strategy<Value = LoanStatus> {
    (0u8..=5).prop_map(|ordinal| LoanStatus::from_ordinal(ordinal).unwrap())
}

fn affiliation_strategy() -> impl Strategy<Value = Affiliation> {
    prop::sample::select(Affiliation::ALL.to_vec())
}

fn party_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{3,8}1[a-z0-9]{10,20}")
}

/// Nanosecond timestamps between 1970 and 2100
fn timestamp_strategy() -> impl Strategy<Value = i64> {
    0i64..4_102_444_800_000_000_000
}

/// Any loan the codec might be asked to store
fn loan_strategy() -> impl Strategy<Value = Loan> {
    (
        valid_identifier_strategy(),
        (
            prop::option::of(any::<u64>()),
            prop::option::of(any::<u64>()),
            prop::option::of(any::<u64>()),
        ),
        ("[a-z]{3,8}1[a-z0-9]{10,20}", party_strategy(), party_strategy()),
        status_strategy(),
        (timestamp_strategy(), timestamp_strategy()),
    )
        .prop_map(
            |(identifier, amounts, parties, status, (created, updated))| Loan {
                identifier,
                loan_amount: amounts.0,
                disbursed_amount: amounts.1,
                repayed_amount: amounts.2,
                borrower: parties.0,
                lead_arranger: parties.1,
                participating_bank: parties.2,
                status,
                created_at: TimeStamp::from_nanos(created),
                updated_at: TimeStamp::from_nanos(updated),
            },
        )
}

#[derive(Debug, Clone)]
enum AmountChange {
    Loan(u64),
    Disbursed(u64),
    Repayed(u64),
}

fn amount_change_strategy() -> impl Strategy<Value = AmountChange> {
    prop_oneof![
        (0u64..1_000).prop_map(AmountChange::Loan),
        (0u64..1_000).prop_map(AmountChange::Disbursed),
        (0u64..1_000).prop_map(AmountChange::Repayed),
    ]
}

fn regulator() -> Caller {
    Caller::new("reg_1", Affiliation::Regulator)
}

// PROPERTY TESTS
proptest! {
    /// Property: every well-formed identifier creates a fresh INIT loan owned by its creator
    #[test]
    fn prop_valid_identifier_creates_init_loan(identifier in valid_identifier_strategy()) {
        let registry = LoanRegistry::new(MemoryLedger::new());

        registry.create(&regulator(), &identifier).unwrap();
        let loan = registry.retrieve(&identifier).unwrap();

        prop_assert_eq!(loan.status, LoanStatus::Init);
        prop_assert_eq!(loan.borrower.as_str(), "reg_1");
        prop_assert_eq!(loan.loan_amount.unwrap_or(0), 0);
        prop_assert_eq!(loan.disbursed_amount.unwrap_or(0), 0);
        prop_assert_eq!(loan.repayed_amount.unwrap_or(0), 0);
        prop_assert!(!registry.check_unique(&identifier).unwrap());
    }

    /// Property: malformed identifiers are rejected and leave the index empty
    #[test]
    fn prop_invalid_identifier_rejected(identifier in invalid_identifier_strategy()) {
        let registry = LoanRegistry::new(MemoryLedger::new());

        let err = registry.create(&regulator(), &identifier).unwrap_err();
        prop_assert_eq!(err, RegistryError::InvalidIdentifier(identifier.clone()));
        prop_assert_eq!(registry.count().unwrap(), 0);
    }

    /// Property: decode(encode(loan)) == loan
    #[test]
    fn prop_loan_roundtrip(loan in loan_strategy()) {
        let bytes = codec::encode(&loan.identifier, &loan).unwrap();
        let decoded = codec::decode_loan(&loan.identifier, &bytes).unwrap();

        prop_assert_eq!(decoded, loan);
    }

    /// Property: the identifier index is an append-only list without duplicates
    #[test]
    fn prop_index_has_no_duplicates(
        identifiers in prop::collection::vec(valid_identifier_strategy(), 1..12)
    ) {
        let registry = LoanRegistry::new(MemoryLedger::new());
        let mut expected: Vec<String> = Vec::new();

        for identifier in &identifiers {
            match registry.create(&regulator(), identifier) {
                Ok(_) => expected.push(identifier.clone()),
                Err(err) => {
                    prop_assert!(expected.contains(identifier));
                    prop_assert_eq!(err, RegistryError::DuplicateIdentifier(identifier.clone()));
                }
            }
        }

        prop_assert_eq!(registry.identifiers().unwrap(), expected.clone());
        prop_assert_eq!(registry.list(&regulator()).unwrap().loans.len(), expected.len());
    }

    /// Property: whatever status updates are attempted by whoever, the status
    /// only ever moves to its immediate successor, and rejected attempts leave
    /// the stored record untouched
    #[test]
    fn prop_status_only_steps_forward(
        attempts in prop::collection::vec((affiliation_strategy(), status_strategy()), 1..40)
    ) {
        let registry = LoanRegistry::new(MemoryLedger::new());
        registry.create(&regulator(), "AB1234567").unwrap();

        for (affiliation, target) in attempts {
            let before = registry.ledger().get("AB1234567").unwrap().unwrap();
            let current = registry.retrieve("AB1234567").unwrap().status;
            let caller = Caller::new("anyone", affiliation);

            match registry.apply_update("AB1234567", &caller, &FieldUpdate::Status(target)) {
                Ok(loan) => {
                    prop_assert_eq!(Some(loan.status), current.next());
                    prop_assert!(loan.status > current);
                }
                Err(RegistryError::InvalidTransition { .. }) => {
                    prop_assert_ne!(Some(target), current.next());
                    prop_assert_eq!(registry.ledger().get("AB1234567").unwrap().unwrap(), before);
                }
                Err(RegistryError::PermissionDenied { .. }) => {
                    prop_assert_eq!(registry.ledger().get("AB1234567").unwrap().unwrap(), before);
                }
                Err(other) => prop_assert!(false, "unexpected failure {other}"),
            }
        }
    }

    /// Property: the monetary ordering holds after every successful update and
    /// a violating update changes nothing, byte for byte
    #[test]
    fn prop_amounts_stay_ordered(
        changes in prop::collection::vec(amount_change_strategy(), 1..30)
    ) {
        let registry = LoanRegistry::new(MemoryLedger::new());
        registry.create(&regulator(), "AB1234567").unwrap();
        let arranger = Caller::new("arranger_1", Affiliation::LeadArranger);

        let (mut loan, mut disbursed, mut repayed) = (0u64, 0u64, 0u64);

        for change in changes {
            let before = registry.ledger().get("AB1234567").unwrap().unwrap();
            let (update, next) = match change {
                AmountChange::Loan(v) => (FieldUpdate::LoanAmount(v), (v, disbursed, repayed)),
                AmountChange::Disbursed(v) => (FieldUpdate::DisbursedAmount(v), (loan, v, repayed)),
                AmountChange::Repayed(v) => (FieldUpdate::RepayedAmount(v), (loan, disbursed, v)),
            };
            let allowed = next.1 <= next.0 && next.2 <= next.1;

            match registry.apply_update("AB1234567", &arranger, &update) {
                Ok(stored) => {
                    prop_assert!(allowed);
                    (loan, disbursed, repayed) = next;
                    prop_assert!(stored.check_amounts().is_ok());
                }
                Err(err) => {
                    prop_assert!(!allowed);
                    let is_invalid_value = matches!(err, RegistryError::InvalidValue { .. });
                    prop_assert!(is_invalid_value);
                    prop_assert_eq!(registry.ledger().get("AB1234567").unwrap().unwrap(), before);
                }
            }
        }

        let stored = registry.retrieve("AB1234567").unwrap();
        prop_assert!(stored.repayed_amount.unwrap_or(0) <= stored.disbursed_amount.unwrap_or(0));
        prop_assert!(stored.disbursed_amount.unwrap_or(0) <= stored.loan_amount.unwrap_or(0));
    }

    /// Property: LoanId::parse agrees with the generated shapes
    #[test]
    fn prop_identifier_parse_agrees(identifier in valid_identifier_strategy()) {
        let parsed = LoanId::parse(&identifier).unwrap();
        prop_assert_eq!(parsed.as_str(), identifier.as_str());
    }
}
