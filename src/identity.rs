//! Resolving who is calling from the invocation context
use super::error::{RegistryError, Result};
use super::types::{Affiliation, Caller};
use anyhow::Context;
use bech32::Bech32m;
use std::collections::BTreeMap;
use uuid7::uuid7;

pub const IDENTITY_ATTRIBUTE: &str = "identity";
pub const AFFILIATION_ATTRIBUTE: &str = "affiliation";

/// Attributes the substrate attached to the current invocation, already verified upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub attributes: BTreeMap<String, String>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
    /// Context carrying the default identity and affiliation attributes.
    pub fn for_caller(identity: impl Into<String>, affiliation: Affiliation) -> Self {
        Self::new()
            .with_attribute(IDENTITY_ATTRIBUTE, identity)
            .with_attribute(AFFILIATION_ATTRIBUTE, affiliation.as_str())
    }
}

pub trait IdentityResolver {
    fn resolve(&self, context: &InvocationContext) -> Result<Caller>;
}

/// Reads the caller from two named context attributes.
#[derive(Debug, Clone)]
pub struct AttributeResolver {
    identity_attribute: String,
    affiliation_attribute: String,
}

impl Default for AttributeResolver {
    fn default() -> Self {
        Self::new(IDENTITY_ATTRIBUTE, AFFILIATION_ATTRIBUTE)
    }
}

impl AttributeResolver {
    pub fn new(identity_attribute: impl Into<String>, affiliation_attribute: impl Into<String>) -> Self {
        Self {
            identity_attribute: identity_attribute.into(),
            affiliation_attribute: affiliation_attribute.into(),
        }
    }

    fn attribute<'c>(&self, context: &'c InvocationContext, name: &str) -> Result<&'c str> {
        context
            .attributes
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RegistryError::IdentityUnavailable(format!("missing {name} attribute")))
    }
}

impl IdentityResolver for AttributeResolver {
    fn resolve(&self, context: &InvocationContext) -> Result<Caller> {
        let identity = self.attribute(context, &self.identity_attribute)?;
        let affiliation = self
            .attribute(context, &self.affiliation_attribute)?
            .parse::<Affiliation>()?;

        Ok(Caller::new(identity, affiliation))
    }
}

/// Mint a fresh participant identity: a time-ordered uuid7 rendered as a
/// bech32m string under `hrp`, e.g. `bank1...`.
pub fn new_participant_id(hrp: &str) -> anyhow::Result<String> {
    let prefix = bech32::Hrp::parse(hrp)
        .with_context(|| format!("{hrp:?} is not a usable participant prefix"))?;
    let id = uuid7();

    Ok(bech32::encode::<Bech32m>(prefix, id.as_bytes())?)
}
