//! Redefinition policies: what happens when two producers compete for one
//! attribute.
//!
//! The publication pipeline consults the reactor's [`RedefinitionPolicy`]
//! whenever a rule publishes a value for an attribute that already holds a
//! non-error value. The default, [`FailOnRedefinition`], treats this as a
//! specification bug and aborts -- under it, every rule fires at most once.
//! [`RedefineAndRenotify`] instead enables incremental attribute computation:
//! the new value replaces the old and dependent rules re-fire with it.
//!
//! Policies act through two privileged reactor operations:
//! [`Reactor::redefine`] (swap the stored value) and
//! [`Reactor::supply_to_dependents`] (re-notify, re-firing rules that
//! already ran). Recursive publications from inside a policy are supported
//! up to a depth bound; past it the run aborts with
//! [`ReactorError::RedefinitionCycle`].

use semaflow_core::{Attribute, AttrValue, NodeKey, ReactorError};

use crate::reactor::Reactor;

/// Decides the outcome when an attribute that already has a non-error value
/// receives another one. Note that when the policy is consulted the original
/// value is still the stored one and no dependent has been notified.
pub trait RedefinitionPolicy<N: NodeKey> {
    fn on_redefinition(
        &self,
        reactor: &Reactor<N>,
        attribute: &Attribute<N>,
        old: &AttrValue<N>,
        new: &AttrValue<N>,
    ) -> Result<(), ReactorError>;
}

/// Default policy: redefinition is a fatal error. Guarantees that every
/// attribute has a single producer and every rule fires at most once.
pub struct FailOnRedefinition;

impl<N: NodeKey> RedefinitionPolicy<N> for FailOnRedefinition {
    fn on_redefinition(
        &self,
        _reactor: &Reactor<N>,
        attribute: &Attribute<N>,
        _old: &AttrValue<N>,
        _new: &AttrValue<N>,
    ) -> Result<(), ReactorError> {
        Err(ReactorError::AttributeRedefinition {
            attribute: attribute.to_string(),
        })
    }
}

/// Incremental policy: store the new value and re-notify dependents, causing
/// rules that already fired to fire again with the updated value. The
/// at-most-once firing guarantee intentionally lapses under this policy.
pub struct RedefineAndRenotify;

impl<N: NodeKey> RedefinitionPolicy<N> for RedefineAndRenotify {
    fn on_redefinition(
        &self,
        reactor: &Reactor<N>,
        attribute: &Attribute<N>,
        _old: &AttrValue<N>,
        new: &AttrValue<N>,
    ) -> Result<(), ReactorError> {
        reactor.redefine(attribute, new.clone());
        reactor.supply_to_dependents(attribute, new);
        Ok(())
    }
}
