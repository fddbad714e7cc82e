//! Routes a named operation and its string arguments to the registry
use super::codec;
use super::error::RegistryError;
use super::identity::{IdentityResolver, InvocationContext};
use super::ledger::Ledger;
use super::registry::LoanRegistry;
use super::types::LoanField;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Received unknown function invocation: {0}")]
    UnknownOperation(String),
    #[error("Incorrect number of arguments for {operation}. Expecting {expected}, got {got}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Create,
    Retrieve,
    Update(LoanField),
    List,
    CheckUnique,
    Count,
    Identifiers,
}

impl Operation {
    pub fn arity(self) -> usize {
        match self {
            Operation::Init | Operation::List | Operation::Count | Operation::Identifiers => 0,
            Operation::Create | Operation::Retrieve | Operation::CheckUnique => 1,
            Operation::Update(_) => 2,
        }
    }
}

impl FromStr for Operation {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operation = match s {
            "init" => Operation::Init,
            "create" | "create_loan" => Operation::Create,
            "retrieve" | "get_loan_details" | "get_loan_detials" => Operation::Retrieve,
            "list" => Operation::List,
            "check_unique" => Operation::CheckUnique,
            "count" | "get_noOfLoansCreated" => Operation::Count,
            "identifiers" | "get_loansCreated" => Operation::Identifiers,
            other => other
                .strip_prefix("update_")
                .and_then(|field| field.parse::<LoanField>().ok())
                .map(Operation::Update)
                .ok_or_else(|| DispatchError::UnknownOperation(s.to_string()))?,
        };

        Ok(operation)
    }
}

/// Success payload handed back across the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// An encoded loan, listing or identifier list.
    Record(Vec<u8>),
    Flag(bool),
    Count(u64),
}

pub struct Dispatcher<L: Ledger, R: IdentityResolver> {
    registry: LoanRegistry<L>,
    resolver: R,
}

impl<L: Ledger, R: IdentityResolver> Dispatcher<L, R> {
    pub fn new(registry: LoanRegistry<L>, resolver: R) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &LoanRegistry<L> {
        &self.registry
    }

    pub fn invoke(
        &self,
        context: &InvocationContext,
        operation: &str,
        args: &[&str],
    ) -> Result<Payload, DispatchError> {
        tracing::debug!(operation, args = args.len(), "invoke");

        let parsed: Operation = operation.parse()?;
        if args.len() != parsed.arity() {
            return Err(DispatchError::ArgumentCount {
                operation: operation.to_string(),
                expected: parsed.arity(),
                got: args.len(),
            });
        }

        let registry = &self.registry;
        let payload = match parsed {
            Operation::Init => Payload::Count(registry.initialise()? as u64),
            Operation::Create => {
                let caller = self.resolver.resolve(context)?;
                let loan = registry.create(&caller, args[0])?;
                Payload::Record(codec::encode(&loan.identifier, &loan)?)
            }
            Operation::Retrieve => {
                let loan = registry.retrieve(args[0])?;
                Payload::Record(codec::encode(&loan.identifier, &loan)?)
            }
            Operation::Update(field) => {
                let caller = self.resolver.resolve(context)?;
                let loan = registry.update_field(args[0], &caller, field, args[1])?;
                Payload::Record(codec::encode(&loan.identifier, &loan)?)
            }
            Operation::List => {
                let caller = self.resolver.resolve(context)?;
                let listing = registry.list(&caller)?;
                Payload::Record(codec::encode(registry.index().key(), &listing)?)
            }
            Operation::CheckUnique => Payload::Flag(registry.check_unique(args[0])?),
            Operation::Count => Payload::Count(registry.count()? as u64),
            Operation::Identifiers => {
                let identifiers = registry.identifiers()?;
                Payload::Record(codec::encode(registry.index().key(), &identifiers)?)
            }
        };

        Ok(payload)
    }
}
