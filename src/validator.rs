//! The value validator: an optional, application-supplied predicate run on
//! every value a `FIND_VALUE` turns up. Policy — what makes a value valid
//! for a given key — is entirely the application's concern.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::hash::Id;

/// Validates a value returned under a given key. If no validator is
/// supplied to the router, every value is accepted.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, key: &Id, value: &[u8]) -> bool;
}

/// The implicit validator used when the caller supplies none: accepts
/// everything.
pub struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(&self, _key: &Id, _value: &[u8]) -> bool {
        true
    }
}
