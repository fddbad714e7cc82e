pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod index;
pub mod ledger;
pub mod lifecycle;
pub mod registry;
pub mod types;

pub use config::RegistryConfig;
pub use dispatch::{DispatchError, Dispatcher, Payload};
pub use error::RegistryError;
pub use identity::{AttributeResolver, IdentityResolver, InvocationContext};
pub use ledger::{Ledger, MemoryLedger, SledLedger};
pub use registry::LoanRegistry;
pub use types::{Affiliation, Caller, FieldUpdate, Loan, LoanField, LoanId, LoanListing, LoanStatus};
