//! Walks one syndicated loan from creation to repayment through the dispatcher.
//!
//! Run with `cargo run --example walkthrough`; set `RUST_LOG=debug` to see
//! index appends and record fingerprints.
use loan_registry::{
    Affiliation, AttributeResolver, Dispatcher, InvocationContext, LoanListing, LoanRegistry,
    Payload, RegistryConfig, codec, identity::new_participant_id,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RegistryConfig::new().set_temporary(true).overlay_env()?;
    let registry = LoanRegistry::with_config(config.open_ledger()?, &config);
    let shell = Dispatcher::new(registry, AttributeResolver::default());

    let regulator = InvocationContext::for_caller(&new_participant_id("reg")?, Affiliation::Regulator);
    let borrower_id = new_participant_id("borrower")?;
    let borrower = InvocationContext::for_caller(&borrower_id, Affiliation::Borrower);
    let arranger_id = new_participant_id("arranger")?;
    let arranger = InvocationContext::for_caller(&arranger_id, Affiliation::LeadArranger);
    let bank_id = new_participant_id("bank")?;
    let bank = InvocationContext::for_caller(&bank_id, Affiliation::ParticipatingBank);

    shell.invoke(&regulator, "init", &[])?;
    shell.invoke(&regulator, "create_loan", &["AB1234567"])?;
    shell.invoke(&regulator, "update_borrower", &["AB1234567", borrower_id.as_str()])?;

    shell.invoke(&arranger, "update_leadArranger", &["AB1234567", arranger_id.as_str()])?;
    shell.invoke(&arranger, "update_loanAmount", &["AB1234567", "5000000"])?;
    shell.invoke(&arranger, "update_status", &["AB1234567", "LEAD_ARRANGER_ACCEPTED"])?;
    shell.invoke(&arranger, "update_participatingBank", &["AB1234567", bank_id.as_str()])?;
    shell.invoke(&arranger, "update_status", &["AB1234567", "PARTICIPATING_BANK_INVITED"])?;

    shell.invoke(&bank, "update_status", &["AB1234567", "PARTICIPATING_BANK_ACCEPTED"])?;
    shell.invoke(&bank, "update_disbursedAmount", &["AB1234567", "5000000"])?;
    shell.invoke(&arranger, "update_status", &["AB1234567", "DISBURSED"])?;

    shell.invoke(&borrower, "update_repayedAmount", &["AB1234567", "5000000"])?;
    shell.invoke(&borrower, "update_status", &["AB1234567", "REPAYED"])?;

    if let Err(err) = shell.invoke(&arranger, "update_loanAmount", &["AB1234567", "1"]) {
        tracing::info!(%err, "repayed loans are read-only");
    }

    if let Payload::Record(bytes) = shell.invoke(&regulator, "list", &[])? {
        let listing: LoanListing = codec::decode("listing", &bytes)?;
        println!("{listing:#?}");
    }
    if let Payload::Count(count) = shell.invoke(&regulator, "get_noOfLoansCreated", &[])? {
        println!("loans created: {count}");
    }

    Ok(())
}
