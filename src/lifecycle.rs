//! Which affiliation may touch which field at each stage of a loan's life
use super::error::{RegistryError, Result};
use super::types::{Affiliation, FieldUpdate, LoanField, LoanStatus};

/// Affiliations allowed to act on a loan in `status`. Empty once repayed.
pub fn allowed_affiliations(status: LoanStatus) -> &'static [Affiliation] {
    match status {
        LoanStatus::Init | LoanStatus::LeadArrangerAccepted => &[Affiliation::LeadArranger],
        LoanStatus::ParticipatingBankInvited => &[Affiliation::ParticipatingBank],
        LoanStatus::ParticipatingBankAccepted => {
            &[Affiliation::ParticipatingBank, Affiliation::LeadArranger]
        }
        LoanStatus::Disbursed => &[Affiliation::Borrower],
        LoanStatus::Repayed => &[],
    }
}

/// Only the regulator may create loans.
pub fn authorize_create(affiliation: Affiliation) -> Result<()> {
    if affiliation == Affiliation::Regulator {
        return Ok(());
    }

    Err(RegistryError::PermissionDenied {
        affiliation: affiliation.to_string(),
        field: "loan".into(),
        status: "unrecorded".into(),
    })
}

/// Checks `update` against a loan currently in `current` for a caller with `affiliation`.
///
/// A status update must name the immediate next state, anything else is an
/// `InvalidTransition` regardless of who asks. The borrower can only be
/// reassigned by the regulator before the lead arranger accepts; every other
/// field follows the transition table keyed on the current status.
pub fn authorize(current: LoanStatus, affiliation: Affiliation, update: &FieldUpdate) -> Result<()> {
    if let FieldUpdate::Status(requested) = update {
        if current.next() != Some(*requested) {
            return Err(RegistryError::InvalidTransition {
                from: current.to_string(),
                requested: requested.to_string(),
            });
        }
    }

    let field = update.field();
    let permitted = match field {
        LoanField::Borrower => {
            current == LoanStatus::Init && affiliation == Affiliation::Regulator
        }
        _ => allowed_affiliations(current).contains(&affiliation),
    };

    if permitted {
        Ok(())
    } else {
        Err(RegistryError::PermissionDenied {
            affiliation: affiliation.to_string(),
            field: field.to_string(),
            status: current.to_string(),
        })
    }
}
