//! The reactor: a single-threaded dataflow engine over attributes and rules.
//!
//! A [`Reactor`] owns a store of attribute values, an index from attributes
//! to the rules depending on them, and a FIFO queue of rules ready to fire.
//! Eagerly-known values are installed with [`Reactor::set`]; rules are
//! registered through the [`Reactor::rule`] builder. [`Reactor::run`] then
//! drives everything to a fixed point:
//!
//! 1. **Seed**: every value already in the store is supplied to the rules
//!    depending on it, and rules without dependencies are enqueued.
//! 2. **Drain**: while the queue is non-empty, pop a rule, invoke its
//!    computation, and publish its exports. Published values unblock further
//!    rules; published errors taint every transitive dependent with derived
//!    `missing dependency` errors.
//! 3. **Diagnose**: rules that never fired and are not silenced by an
//!    upstream error indicate an underspecified analysis; a root `missing
//!    attribute` error is synthesized for each dependency that was never
//!    supplied and cannot be supplied by another stuck rule.
//!
//! Errors produced along the way are inspected with [`Reactor::errors`]
//! (root errors -- the natural summary) and [`Reactor::all_errors`]
//! (including derived errors, for deep diagnostics). Evaluation order is
//! deterministic: the store and index preserve insertion order, and the
//! queue is FIFO.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use semaflow_core::{Attribute, AttrValue, NodeKey, ReactorError, SemanticError};

use crate::policy::{FailOnRedefinition, RedefinitionPolicy};
use crate::report::RunReport;
use crate::rule::{RuleBuilder, RuleCtx, RuleRef};

/// Nesting bound for recursive redefinitions triggered from a
/// [`RedefinitionPolicy`]; past this depth the run aborts with
/// [`ReactorError::RedefinitionCycle`].
const REDEFINITION_DEPTH_LIMIT: usize = 1_000;

/// Identity key for semantic errors: two errors are the same entry exactly
/// when they are the same allocation.
struct ErrorKey<N>(Rc<SemanticError<N>>);

impl<N> PartialEq for ErrorKey<N> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<N> Eq for ErrorKey<N> {}

impl<N> Hash for ErrorKey<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// The dataflow engine. See the [module documentation](self) for the
/// evaluation model.
pub struct Reactor<N: NodeKey> {
    /// Attribute store. A stored value is never "null": absence is a missing
    /// key, and an error value means the attribute is tainted.
    attributes: RefCell<IndexMap<Attribute<N>, AttrValue<N>>>,
    /// Dependency index: attribute -> rules depending on it. A rule appears
    /// once per occurrence of the attribute in its dependency array.
    dependencies: RefCell<IndexMap<Attribute<N>, Vec<RuleRef<N>>>>,
    /// Rules with no dependencies at all; enqueued when `run` starts.
    no_deps: RefCell<Vec<RuleRef<N>>>,
    queue: RefCell<VecDeque<RuleRef<N>>>,
    root_errors: RefCell<IndexSet<ErrorKey<N>>>,
    /// Derived errors signaled without any affected attribute; kept here so
    /// they are not lost.
    attributeless_derived: RefCell<IndexSet<ErrorKey<N>>>,
    running: Cell<bool>,
    redefinition_depth: Cell<usize>,
    policy: Box<dyn RedefinitionPolicy<N>>,
}

impl<N: NodeKey> Reactor<N> {
    /// A reactor with the default redefinition policy
    /// ([`FailOnRedefinition`]): every attribute has at most one producer,
    /// and every rule fires at most once.
    pub fn new() -> Self {
        Self::with_policy(FailOnRedefinition)
    }

    /// A reactor with a custom [`RedefinitionPolicy`].
    pub fn with_policy(policy: impl RedefinitionPolicy<N> + 'static) -> Self {
        Reactor {
            attributes: RefCell::new(IndexMap::new()),
            dependencies: RefCell::new(IndexMap::new()),
            no_deps: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            root_errors: RefCell::new(IndexSet::new()),
            attributeless_derived: RefCell::new(IndexSet::new()),
            running: Cell::new(false),
            redefinition_depth: Cell::new(0),
            policy: Box::new(policy),
        }
    }

    // --- Inspection -----------------------------------------------------

    /// The stored value of the given attribute (possibly an error), or
    /// `None` if it has not been computed.
    pub fn get(&self, attribute: &Attribute<N>) -> Option<AttrValue<N>> {
        self.attributes.borrow().get(attribute).cloned()
    }

    /// Shorthand for [`get`](Self::get) on `(node, name)`.
    pub fn get_named(&self, node: N, name: &str) -> Option<AttrValue<N>> {
        self.get(&Attribute::new(node, name))
    }

    /// All (attribute, value) pairs for attributes of the given node, in
    /// store order.
    pub fn get_all(&self, node: N) -> Vec<(Attribute<N>, AttrValue<N>)> {
        self.attributes
            .borrow()
            .iter()
            .filter(|(attribute, _)| attribute.node() == Some(node))
            .map(|(attribute, value)| (attribute.clone(), value.clone()))
            .collect()
    }

    /// The set of valued attributes, in store order.
    pub fn attributes(&self) -> Vec<Attribute<N>> {
        self.attributes.borrow().keys().cloned().collect()
    }

    /// Root errors: errors not caused by another error (plus nothing else --
    /// use [`all_errors`](Self::all_errors) for the derived ones).
    pub fn errors(&self) -> Vec<Rc<SemanticError<N>>> {
        self.root_errors
            .borrow()
            .iter()
            .map(|key| key.0.clone())
            .collect()
    }

    /// Every error the run produced: root errors, derived errors stored as
    /// attribute values, and derived errors that had no attribute to attach
    /// to. Root errors appear once even when stored under an attribute.
    pub fn all_errors(&self) -> Vec<Rc<SemanticError<N>>> {
        let mut list = self.errors();
        for value in self.attributes.borrow().values() {
            if let AttrValue::Error(error) = value {
                if error.cause().is_some() {
                    list.push(error.clone());
                }
            }
        }
        list.extend(
            self.attributeless_derived
                .borrow()
                .iter()
                .map(|key| key.0.clone()),
        );
        list
    }

    /// Formats the root errors, printing each description followed by its
    /// effective location rendered through `print_location`. Empty string
    /// when there are no errors.
    pub fn report_errors(&self, print_location: impl Fn(&N) -> String) -> String {
        let mut out = String::new();
        for error in self.errors() {
            out.push_str(error.description());
            if let Some(location) = error.effective_location() {
                out.push_str("\nlocation: ");
                out.push_str(&print_location(&location));
            }
            out.push_str("\n\n");
        }
        out.pop();
        out
    }

    // --- Eager suppliers ------------------------------------------------

    /// Sets the value of an attribute known statically, before running the
    /// reactor. Not for use inside rules (use [`RuleCtx::set`] there);
    /// calling this while the reactor runs is a fatal error.
    pub fn set(&self, attribute: Attribute<N>, value: AttrValue<N>) -> Result<(), ReactorError> {
        if self.running.get() {
            return Err(ReactorError::SetWhileRunning {
                attribute: attribute.to_string(),
            });
        }
        self.attributes.borrow_mut().insert(attribute, value);
        Ok(())
    }

    /// Shorthand for [`set`](Self::set) on `(node, name)`.
    pub fn set_named(
        &self,
        node: N,
        name: impl Into<String>,
        value: AttrValue<N>,
    ) -> Result<(), ReactorError> {
        self.set(Attribute::new(node, name), value)
    }

    /// Reports a semantic error affecting the given attributes (possibly
    /// none), without going through a rule. Typical for "syntactic" checks
    /// done while walking the tree, before evaluation.
    pub fn error(
        &self,
        error: Rc<SemanticError<N>>,
        affected: &[Attribute<N>],
    ) -> Result<(), ReactorError> {
        if affected.is_empty() {
            self.report_unattached(error);
            return Ok(());
        }
        for attribute in affected {
            self.report_error(error.clone(), Some(attribute))?;
        }
        Ok(())
    }

    // --- Building rules -------------------------------------------------

    /// A builder for a rule exporting the given attributes (possibly none).
    pub fn rule(&self, exports: impl IntoIterator<Item = Attribute<N>>) -> RuleBuilder<'_, N> {
        RuleBuilder::new(self, exports.into_iter().collect())
    }

    /// A builder for a rule exporting the single attribute `(node, name)`.
    pub fn rule_for(&self, node: N, name: impl Into<String>) -> RuleBuilder<'_, N> {
        RuleBuilder::new(self, vec![Attribute::new(node, name)])
    }

    /// Called by [`RuleBuilder::by`]. Attaches the rule to the dependency
    /// index; while running, already-available dependency values are
    /// supplied immediately so a lazily-registered rule can fire within the
    /// same run.
    pub(crate) fn register(&self, rule: RuleRef<N>) {
        let dependencies: Vec<Attribute<N>> = rule.borrow().dependencies.clone();
        if dependencies.is_empty() {
            self.no_deps.borrow_mut().push(rule.clone());
            if self.running.get() {
                self.enqueue(rule);
            }
            return;
        }
        for dependency in &dependencies {
            self.dependencies
                .borrow_mut()
                .entry(dependency.clone())
                .or_default()
                .push(rule.clone());
            if self.running.get() {
                if let Some(value) = self.get(dependency) {
                    self.supply(&rule, dependency, &value);
                }
            }
        }
    }

    // --- Run loop -------------------------------------------------------

    /// Runs every rule that can be run, directly or transitively as rules
    /// make new attributes available, then synthesizes `missing attribute`
    /// errors for dependencies no rule ever supplied.
    ///
    /// Returns a [`RunReport`] summary; all state stays inspectable on the
    /// reactor. A second `run` with no new rules or eager values is a no-op.
    pub fn run(&self) -> Result<RunReport, ReactorError> {
        self.running.set(true);
        let result = self.run_to_fixed_point();
        self.running.set(false);
        result
    }

    fn run_to_fixed_point(&self) -> Result<RunReport, ReactorError> {
        let mut report = RunReport::default();

        let seeded: Vec<(Attribute<N>, AttrValue<N>)> = self
            .attributes
            .borrow()
            .iter()
            .map(|(attribute, value)| (attribute.clone(), value.clone()))
            .collect();
        for (attribute, value) in &seeded {
            self.supply_to_dependents(attribute, value);
        }

        let independent: Vec<RuleRef<N>> = self
            .no_deps
            .borrow()
            .iter()
            .filter(|rule| !rule.borrow().fired)
            .cloned()
            .collect();
        for rule in independent {
            self.enqueue(rule);
        }

        self.drain_queue(&mut report)?;
        self.handle_missing_attributes(&mut report)?;

        report.root_errors = self.root_errors.borrow().len();
        report.derived_errors = self.all_errors().len() - report.root_errors;
        Ok(report)
    }

    fn enqueue(&self, rule: RuleRef<N>) {
        trace!(rule = %rule.borrow(), "enqueue");
        self.queue.borrow_mut().push_back(rule);
    }

    /// Loops on the queue until it is empty, firing each rule and publishing
    /// its exports (which may enqueue further rules).
    fn drain_queue(&self, report: &mut RunReport) -> Result<(), ReactorError> {
        loop {
            let rule = self.queue.borrow_mut().pop_front();
            let Some(rule) = rule else { break };

            let computation = rule.borrow().computation.clone();
            let mut ctx = RuleCtx::new(self, &rule);
            (*computation)(&mut ctx).map_err(|source| ReactorError::RuleFailed {
                rule: rule.borrow().to_string(),
                source: Box::new(source),
            })?;
            rule.borrow_mut().fired = true;
            report.fired_rules += 1;
            debug!(rule = %rule.borrow(), "fired");

            let (exports, values) = {
                let inner = rule.borrow();
                (inner.exports.clone(), inner.export_values.clone())
            };
            for (attribute, value) in exports.iter().zip(values) {
                let Some(value) = value else {
                    return Err(ReactorError::UnsetExport {
                        attribute: attribute.to_string(),
                        rule: rule.borrow().to_string(),
                    });
                };
                self.set_value(attribute, value)?;
                report.published_attributes += 1;
            }
        }
        Ok(())
    }

    /// The publication pipeline, put-if-absent on the store:
    ///
    /// - prior error value: keep the first reported error, silently drop the
    ///   newcomer (dependents never see it);
    /// - prior non-error value: consult the redefinition policy;
    /// - new error: record it, store it, and taint every dependent;
    /// - otherwise: store and notify dependents.
    fn set_value(&self, attribute: &Attribute<N>, value: AttrValue<N>) -> Result<(), ReactorError> {
        let old = {
            let mut attributes = self.attributes.borrow_mut();
            match attributes.entry(attribute.clone()) {
                indexmap::map::Entry::Occupied(entry) => Some(entry.get().clone()),
                indexmap::map::Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                    None
                }
            }
        };

        match old {
            Some(AttrValue::Error(_)) => Ok(()),
            Some(old) => self.redefinition_attempt(attribute, &old, &value),
            None => {
                if let AttrValue::Error(error) = &value {
                    trace!(attribute = %attribute, error = %error, "tainted");
                    if error.cause().is_none() {
                        self.root_errors
                            .borrow_mut()
                            .insert(ErrorKey(error.clone()));
                    }
                    self.propagate_error(error, attribute)
                } else {
                    trace!(attribute = %attribute, value = %value, "published");
                    self.supply_to_dependents(attribute, &value);
                    Ok(())
                }
            }
        }
    }

    fn redefinition_attempt(
        &self,
        attribute: &Attribute<N>,
        old: &AttrValue<N>,
        new: &AttrValue<N>,
    ) -> Result<(), ReactorError> {
        let depth = self.redefinition_depth.get();
        if depth >= REDEFINITION_DEPTH_LIMIT {
            return Err(ReactorError::RedefinitionCycle {
                attribute: attribute.to_string(),
                limit: REDEFINITION_DEPTH_LIMIT,
            });
        }
        self.redefinition_depth.set(depth + 1);
        let result = self.policy.on_redefinition(self, attribute, old, new);
        self.redefinition_depth.set(depth);
        result
    }

    /// Swaps the stored value of an already-defined attribute. A privileged
    /// extension point, meant to be called from a [`RedefinitionPolicy`];
    /// it performs no notification (pair with
    /// [`supply_to_dependents`](Self::supply_to_dependents)).
    pub fn redefine(&self, attribute: &Attribute<N>, value: AttrValue<N>) {
        self.attributes
            .borrow_mut()
            .insert(attribute.clone(), value);
    }

    /// Notifies every rule depending on the attribute of a (new) value,
    /// possibly enqueueing rules that become ready -- or, from a
    /// [`RedefinitionPolicy`] after [`redefine`](Self::redefine), re-firing
    /// rules that already ran.
    pub fn supply_to_dependents(&self, attribute: &Attribute<N>, value: &AttrValue<N>) {
        let dependents: Vec<RuleRef<N>> = self
            .dependencies
            .borrow()
            .get(attribute)
            .cloned()
            .unwrap_or_default();
        for rule in &dependents {
            self.supply(rule, attribute, value);
        }
    }

    /// Supplies one dependency value to one rule, filling every matching
    /// slot. A slot filled for the first time decrements the rule's
    /// unsatisfied count; the rule is enqueued when that count is (or
    /// remains) zero after a slot actually changed. Re-delivery of the
    /// identical value is a no-op, so the extra notifications caused by
    /// duplicate dependency attributes do not enqueue the rule twice.
    fn supply(&self, rule: &RuleRef<N>, dependency: &Attribute<N>, value: &AttrValue<N>) {
        let mut ready = false;
        {
            let mut inner = rule.borrow_mut();
            for index in 0..inner.dependencies.len() {
                if inner.dependencies[index] != *dependency {
                    continue;
                }
                let was_empty = inner.dependency_values[index].is_none();
                let unchanged = matches!(
                    &inner.dependency_values[index],
                    Some(old) if old.same(value)
                );
                if unchanged {
                    continue;
                }
                inner.dependency_values[index] = Some(value.clone());
                if was_empty {
                    inner.unsatisfied -= 1;
                }
                if inner.unsatisfied == 0 {
                    ready = true;
                }
            }
        }
        if ready {
            self.enqueue(rule.clone());
        }
    }

    // --- Errors ---------------------------------------------------------

    /// Records an error. Unattached errors (`affected` is `None`) go to the
    /// root or attributeless-derived set so they are not lost; attached ones
    /// become the value of the affected attribute through the publication
    /// pipeline. Callable from a [`RedefinitionPolicy`].
    pub fn report_error(
        &self,
        error: Rc<SemanticError<N>>,
        affected: Option<&Attribute<N>>,
    ) -> Result<(), ReactorError> {
        match affected {
            None => {
                self.report_unattached(error);
                Ok(())
            }
            Some(attribute) => self.set_value(attribute, AttrValue::Error(error)),
        }
    }

    pub(crate) fn report_unattached(&self, error: Rc<SemanticError<N>>) {
        if error.cause().is_none() {
            self.root_errors.borrow_mut().insert(ErrorKey(error));
        } else {
            self.attributeless_derived
                .borrow_mut()
                .insert(ErrorKey(error));
        }
    }

    /// Propagates an error precluding the computation of `affected`: every
    /// export of every rule depending on `affected` receives a derived
    /// `missing dependency` error, cascading transitively. Rules without
    /// exports are skipped -- the propagated error would have nowhere to
    /// attach, and the root stays visible. Callable from a
    /// [`RedefinitionPolicy`].
    pub fn propagate_error(
        &self,
        error: &Rc<SemanticError<N>>,
        affected: &Attribute<N>,
    ) -> Result<(), ReactorError> {
        let dependents: Vec<RuleRef<N>> = self
            .dependencies
            .borrow()
            .get(affected)
            .cloned()
            .unwrap_or_default();
        for rule in &dependents {
            let exports: Vec<Attribute<N>> = rule.borrow().exports.clone();
            for export in exports {
                let derived = Rc::new(SemanticError::derived(
                    format!("missing dependency {affected}"),
                    error.clone(),
                    None,
                ));
                self.report_error(derived, Some(&export))?;
            }
        }
        Ok(())
    }

    // --- Missing-attribute diagnostic -----------------------------------

    /// After the queue drains, rules that never fired fall in two groups:
    /// those with an error-valued dependency are correctly silenced by an
    /// upstream failure; the rest point at a dependency the user never
    /// supplied. For each such dependency that is neither in the store nor
    /// exported by another stuck rule, synthesize a root `missing attribute`
    /// error located at the dependency's node. Error propagation then taints
    /// all transitive dependents; nothing new becomes runnable.
    fn handle_missing_attributes(&self, report: &mut RunReport) -> Result<(), ReactorError> {
        let mut untriggered: Vec<RuleRef<N>> = Vec::new();
        {
            let dependencies = self.dependencies.borrow();
            let attributes = self.attributes.borrow();
            for bucket in dependencies.values() {
                for rule in bucket {
                    if untriggered.iter().any(|seen| Rc::ptr_eq(seen, rule)) {
                        continue;
                    }
                    let inner = rule.borrow();
                    if inner.unsatisfied == 0 {
                        continue;
                    }
                    let silenced = inner.dependencies.iter().any(|dependency| {
                        matches!(attributes.get(dependency), Some(AttrValue::Error(_)))
                    });
                    if !silenced {
                        untriggered.push(rule.clone());
                    }
                }
            }
        }

        let mut untriggered_exports: IndexSet<Attribute<N>> = IndexSet::new();
        for rule in &untriggered {
            untriggered_exports.extend(rule.borrow().exports.iter().cloned());
        }

        let mut unsupplied: Vec<Attribute<N>> = Vec::new();
        for rule in &untriggered {
            for dependency in rule.borrow().dependencies.iter() {
                if untriggered_exports.contains(dependency) || unsupplied.contains(dependency) {
                    continue;
                }
                unsupplied.push(dependency.clone());
            }
        }

        for dependency in unsupplied {
            // Re-check the store each time: an earlier synthesized error may
            // already have cascaded onto this attribute.
            if self.attributes.borrow().contains_key(&dependency) {
                continue;
            }
            debug!(attribute = %dependency, "missing attribute");
            report.missing_attributes.push(dependency.to_string());
            let error = Rc::new(SemanticError::new(
                format!("missing attribute {dependency}"),
                dependency.node(),
            ));
            self.set_value(&dependency, AttrValue::Error(error))?;
        }
        Ok(())
    }
}

impl<N: NodeKey> Default for Reactor<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct NodeId(u32);

    fn attr(node: u32, name: &str) -> Attribute<NodeId> {
        Attribute::new(NodeId(node), name)
    }

    #[test]
    fn eager_values_are_stored_and_inspectable() {
        let reactor: Reactor<NodeId> = Reactor::new();
        reactor.set(attr(1, "type"), AttrValue::of("int")).unwrap();
        reactor.set_named(NodeId(1), "scope", AttrValue::of("root")).unwrap();

        let value = reactor.get(&attr(1, "type")).unwrap();
        assert_eq!(*value.downcast_ref::<&str>().unwrap(), "int");
        assert_eq!(reactor.get_all(NodeId(1)).len(), 2);
        assert_eq!(reactor.attributes().len(), 2);
        assert!(reactor.get(&attr(2, "type")).is_none());
    }

    #[test]
    fn eager_set_overwrites_before_run() {
        let reactor: Reactor<NodeId> = Reactor::new();
        reactor.set(attr(1, "type"), AttrValue::of("int")).unwrap();
        reactor.set(attr(1, "type"), AttrValue::of("float")).unwrap();

        let value = reactor.get(&attr(1, "type")).unwrap();
        assert_eq!(*value.downcast_ref::<&str>().unwrap(), "float");
    }

    #[test]
    fn eager_unattached_error_is_a_root() {
        let reactor: Reactor<NodeId> = Reactor::new();
        let error = Rc::new(SemanticError::new("standalone", Some(NodeId(4))));
        reactor.error(error.clone(), &[]).unwrap();

        let roots = reactor.errors();
        assert_eq!(roots.len(), 1);
        assert!(Rc::ptr_eq(&roots[0], &error));
        assert!(reactor.attributes().is_empty());
    }

    #[test]
    fn eager_attached_error_taints_the_attribute() {
        let reactor: Reactor<NodeId> = Reactor::new();
        let error = Rc::new(SemanticError::new("bad decl", Some(NodeId(2))));
        reactor.error(error.clone(), &[attr(2, "decl")]).unwrap();

        let stored = reactor.get(&attr(2, "decl")).unwrap();
        assert!(Rc::ptr_eq(stored.as_error().unwrap(), &error));
        assert_eq!(reactor.errors().len(), 1);
    }

    #[test]
    fn same_root_error_on_many_attributes_is_recorded_once() {
        let reactor: Reactor<NodeId> = Reactor::new();
        let error = Rc::new(SemanticError::new("bad", None));
        reactor
            .error(error, &[attr(1, "a"), attr(2, "b")])
            .unwrap();

        assert_eq!(reactor.errors().len(), 1);
        assert_eq!(reactor.all_errors().len(), 1);
    }

    #[test]
    fn report_errors_includes_effective_locations() {
        let reactor: Reactor<NodeId> = Reactor::new();
        reactor
            .error(Rc::new(SemanticError::new("bad type", Some(NodeId(3)))), &[])
            .unwrap();
        reactor
            .error(Rc::new(SemanticError::new("floating", None)), &[])
            .unwrap();

        let report = reactor.report_errors(|node| format!("node #{}", node.0));
        assert_eq!(report, "bad type\nlocation: node #3\n\nfloating\n");
    }

    #[test]
    fn report_errors_empty_when_clean() {
        let reactor: Reactor<NodeId> = Reactor::new();
        assert_eq!(reactor.report_errors(|_| String::new()), "");
    }
}
