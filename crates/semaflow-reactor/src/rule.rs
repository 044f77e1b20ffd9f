//! Rules: declarative computations over attributes.
//!
//! A rule declares which attributes it consumes (*dependencies*) and which it
//! produces (*exports*), plus a computation that fills the exports from the
//! dependencies. Rules are built through [`Reactor::rule`] and the fluent
//! [`RuleBuilder`]; they cannot be invoked manually. The reactor fires a rule
//! once every dependency slot has a value.
//!
//! # Rule computation contract
//!
//! On every firing, a computation must either set all of the rule's exports
//! (via [`RuleCtx::set`] and variants), or signal a semantic error assigning
//! an error value to every export (via [`RuleCtx::error`] /
//! [`RuleCtx::error_for`]). A mix is fine as long as every export slot is
//! filled at return; an unfilled slot is a fatal [`ReactorError::UnsetExport`].
//!
//! # Lazy rules
//!
//! A computation may register further rules through [`RuleCtx::reactor`],
//! typically when the node carrying an attribute is itself the result of a
//! lookup. Such rules are ordinary rules that happen to be registered mid-run;
//! if their dependencies are already available they fire within the same run.
//! When an error prevents a lazy rule from being instantiated at all, signal
//! it with [`RuleCtx::error_for`] on the attributes the lazy rule would have
//! exported, so downstream rules are tainted rather than left dangling.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use semaflow_core::{Attribute, AttrValue, NodeKey, ReactorError, SemanticError};

use crate::reactor::Reactor;

/// A rule computation. Receives the rule's [`RuleCtx`]; returns an error only
/// for fatal contract violations (semantic errors go through
/// [`RuleCtx::error`] and friends).
pub(crate) type Computation<N> =
    Rc<dyn for<'a, 'b> Fn(&'a mut RuleCtx<'b, N>) -> Result<(), ReactorError>>;

/// Shared handle to a rule. The same rule sits in one dependency bucket per
/// dependency occurrence, and in the ready-queue while awaiting firing.
pub(crate) type RuleRef<N> = Rc<RefCell<RuleInner<N>>>;

/// Schema and runtime state of a rule.
pub(crate) struct RuleInner<N: NodeKey> {
    pub(crate) exports: Vec<Attribute<N>>,
    pub(crate) dependencies: Vec<Attribute<N>>,
    pub(crate) export_values: Vec<Option<AttrValue<N>>>,
    pub(crate) dependency_values: Vec<Option<AttrValue<N>>>,
    /// Dependency slots still lacking a value.
    pub(crate) unsatisfied: usize,
    /// Whether this rule has run at least once.
    pub(crate) fired: bool,
    pub(crate) computation: Computation<N>,
}

impl<N: NodeKey> RuleInner<N> {
    fn new(
        exports: Vec<Attribute<N>>,
        dependencies: Vec<Attribute<N>>,
        computation: Computation<N>,
    ) -> Self {
        let unsatisfied = dependencies.len();
        RuleInner {
            export_values: vec![None; exports.len()],
            dependency_values: vec![None; dependencies.len()],
            exports,
            dependencies,
            unsatisfied,
            fired: false,
            computation,
        }
    }
}

impl<N: NodeKey> fmt::Display for RuleInner<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |attributes: &[Attribute<N>], values: &[Option<AttrValue<N>>]| {
            attributes
                .iter()
                .zip(values)
                .map(|(attribute, value)| match value {
                    Some(value) => format!("{attribute} = {value}"),
                    None => attribute.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "Rule {{\n  deps: [{}]\n  exports: [{}]\n}}",
            render(&self.dependencies, &self.dependency_values),
            render(&self.exports, &self.export_values),
        )
    }
}

/// The handle a computation uses to talk to its rule and reactor: read
/// dependencies, write exports, signal errors, register lazy rules.
pub struct RuleCtx<'a, N: NodeKey> {
    reactor: &'a Reactor<N>,
    rule: &'a RuleRef<N>,
}

impl<'a, N: NodeKey> RuleCtx<'a, N> {
    pub(crate) fn new(reactor: &'a Reactor<N>, rule: &'a RuleRef<N>) -> Self {
        RuleCtx { reactor, rule }
    }

    /// The reactor this rule runs under, for registering lazy rules.
    pub fn reactor(&self) -> &'a Reactor<N> {
        self.reactor
    }

    /// The value of the given dependency.
    ///
    /// If the matching slot has not been supplied yet (possible when the rule
    /// is being re-fired under a re-notifying redefinition policy), the value
    /// is looked up in the reactor's store and cached in the slot.
    pub fn get(&self, dependency: &Attribute<N>) -> Result<AttrValue<N>, ReactorError> {
        let mut inner = self.rule.borrow_mut();
        let index = inner
            .dependencies
            .iter()
            .position(|d| d == dependency)
            .ok_or_else(|| ReactorError::NotADependency {
                attribute: dependency.to_string(),
            })?;
        if inner.dependency_values[index].is_none() {
            inner.dependency_values[index] = self.reactor.get(dependency);
        }
        inner.dependency_values[index]
            .clone()
            .ok_or_else(|| ReactorError::UnsatisfiedDependency {
                attribute: dependency.to_string(),
            })
    }

    /// The value of the dependency at the given index.
    pub fn get_at(&self, index: usize) -> Result<AttrValue<N>, ReactorError> {
        let inner = self.rule.borrow();
        let count = inner.dependencies.len();
        let slot = inner
            .dependency_values
            .get(index)
            .ok_or(ReactorError::DependencyIndexOutOfRange { index, count })?;
        slot.clone().ok_or_else(|| ReactorError::UnsatisfiedDependency {
            attribute: inner.dependencies[index].to_string(),
        })
    }

    /// Shorthand for [`get`](Self::get) on `(node, name)`.
    pub fn get_named(&self, node: N, name: &str) -> Result<AttrValue<N>, ReactorError> {
        self.get(&Attribute::new(node, name))
    }

    /// Sets the value of the given export. Repeated writes overwrite; only
    /// the state at return is published.
    pub fn set(&mut self, export: &Attribute<N>, value: AttrValue<N>) -> Result<(), ReactorError> {
        let mut inner = self.rule.borrow_mut();
        let index = inner
            .exports
            .iter()
            .position(|e| e == export)
            .ok_or_else(|| ReactorError::NotAnExport {
                attribute: export.to_string(),
            })?;
        inner.export_values[index] = Some(value);
        Ok(())
    }

    /// Sets the value of the export at the given index.
    pub fn set_at(&mut self, index: usize, value: AttrValue<N>) -> Result<(), ReactorError> {
        let mut inner = self.rule.borrow_mut();
        let count = inner.exports.len();
        let slot = inner
            .export_values
            .get_mut(index)
            .ok_or(ReactorError::ExportIndexOutOfRange { index, count })?;
        *slot = Some(value);
        Ok(())
    }

    /// Shorthand for [`set`](Self::set) on `(node, name)`.
    pub fn set_named(
        &mut self,
        node: N,
        name: &str,
        value: AttrValue<N>,
    ) -> Result<(), ReactorError> {
        self.set(&Attribute::new(node, name), value)
    }

    /// Copies the value of dependency 0 to export 0, the most common
    /// single-attribute forwarding.
    pub fn copy_first(&mut self) -> Result<(), ReactorError> {
        let value = self.get_at(0)?;
        self.set_at(0, value)
    }

    /// Signals a semantic error that precludes the computation of *all* of
    /// this rule's exports. With no exports, the error is reported to the
    /// reactor unattached so it is not lost.
    pub fn error(&mut self, description: impl Into<String>, location: Option<N>) {
        self.error_value(Rc::new(SemanticError::new(description, location)));
    }

    /// Like [`error`](Self::error), for a pre-built error.
    pub fn error_value(&mut self, error: Rc<SemanticError<N>>) {
        let mut inner = self.rule.borrow_mut();
        if inner.exports.is_empty() {
            drop(inner);
            self.reactor.report_unattached(error);
            return;
        }
        for slot in inner.export_values.iter_mut() {
            *slot = Some(AttrValue::Error(error.clone()));
        }
    }

    /// Signals a semantic error that precludes the computation of the given
    /// attributes (possibly none, in which case the error is reported
    /// unattached).
    ///
    /// The affected attributes need not be exports of this rule: attributes
    /// of a lazy rule that could not be instantiated are routed straight to
    /// the reactor, pre-failing them for any dependent.
    pub fn error_for(
        &mut self,
        error: Rc<SemanticError<N>>,
        affected: &[Attribute<N>],
    ) -> Result<(), ReactorError> {
        if affected.is_empty() {
            self.reactor.report_unattached(error);
            return Ok(());
        }
        let mut out_of_band = Vec::new();
        {
            let mut inner = self.rule.borrow_mut();
            for attribute in affected {
                match inner.exports.iter().position(|e| e == attribute) {
                    Some(index) => {
                        inner.export_values[index] = Some(AttrValue::Error(error.clone()));
                    }
                    None => out_of_band.push(attribute.clone()),
                }
            }
        }
        for attribute in out_of_band {
            self.reactor.report_error(error.clone(), Some(&attribute))?;
        }
        Ok(())
    }

    /// Like [`error_for`](Self::error_for), constructing the error from a
    /// description and location.
    pub fn error_for_described(
        &mut self,
        description: impl Into<String>,
        location: Option<N>,
        affected: &[Attribute<N>],
    ) -> Result<(), ReactorError> {
        self.error_for(Rc::new(SemanticError::new(description, location)), affected)
    }
}

/// Fluent builder for rules; created by [`Reactor::rule`] /
/// [`Reactor::rule_for`]. `using` is optional (zero dependencies by
/// default); [`by`](RuleBuilder::by) finalizes registration.
#[must_use = "a rule is only registered once `by` is called"]
pub struct RuleBuilder<'a, N: NodeKey> {
    reactor: &'a Reactor<N>,
    exports: Vec<Attribute<N>>,
    dependencies: Vec<Attribute<N>>,
}

impl<'a, N: NodeKey> RuleBuilder<'a, N> {
    pub(crate) fn new(reactor: &'a Reactor<N>, exports: Vec<Attribute<N>>) -> Self {
        RuleBuilder {
            reactor,
            exports,
            dependencies: Vec::new(),
        }
    }

    /// Declares the rule's dependencies. Duplicate attributes are allowed;
    /// every occurrence is a slot of its own.
    pub fn using(mut self, dependencies: impl IntoIterator<Item = Attribute<N>>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// Declares a single `(node, name)` dependency.
    pub fn using_one(self, node: N, name: impl Into<String>) -> Self {
        self.using([Attribute::new(node, name)])
    }

    /// Supplies the computation and registers the rule with the reactor.
    pub fn by<F>(self, computation: F)
    where
        F: for<'c, 'r> Fn(&'c mut RuleCtx<'r, N>) -> Result<(), ReactorError> + 'static,
    {
        let inner = RuleInner::new(self.exports, self.dependencies, Rc::new(computation));
        self.reactor.register(Rc::new(RefCell::new(inner)));
    }
}
