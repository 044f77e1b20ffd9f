//! Error types for the semaflow framework.
//!
//! Two very different kinds of error live here:
//!
//! - [`SemanticError`]: an error *value*. Semantic errors are ordinary
//!   attribute values flowing through the reactor; they never abort a run.
//!   They form cause chains (a derived error wraps the strictly older error
//!   that triggered it) and are compared by identity, not by content.
//! - [`ReactorError`]: a fatal contract violation (a rule left an export
//!   unset, an attribute was redefined under the default policy, ...). These
//!   use `thiserror` and abort the run immediately.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::attribute::NodeKey;

/// An error produced while computing attribute values.
///
/// Semantic errors are first-class attribute values: when a rule signals one,
/// it becomes the stored value of the affected attributes, and every
/// dependent attribute is tainted with a *derived* error whose `cause` is
/// this one. Cause chains are acyclic by construction -- a derived error is
/// always created after, and wraps, its cause.
///
/// Two instances with identical text are distinct errors; the reactor keys
/// its error sets by `Rc` identity.
#[derive(Debug)]
pub struct SemanticError<N> {
    description: String,
    cause: Option<Rc<SemanticError<N>>>,
    location: Option<N>,
}

impl<N: NodeKey> SemanticError<N> {
    /// A root error: no cause, originated by user logic or a diagnostic pass.
    pub fn new(description: impl Into<String>, location: Option<N>) -> Self {
        SemanticError {
            description: description.into(),
            cause: None,
            location,
        }
    }

    /// An error derived from an older one.
    pub fn derived(
        description: impl Into<String>,
        cause: Rc<SemanticError<N>>,
        location: Option<N>,
    ) -> Self {
        SemanticError {
            description: description.into(),
            cause: Some(cause),
            location,
        }
    }

    /// Human-readable description of the error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The older error that triggered this one, if any.
    pub fn cause(&self) -> Option<&Rc<SemanticError<N>>> {
        self.cause.as_ref()
    }

    /// The location recorded on this error itself, ignoring the cause chain.
    pub fn own_location(&self) -> Option<N> {
        self.location
    }

    /// The location of this error, falling back to the nearest located error
    /// up the cause chain. The walk is finite because cause chains are
    /// acyclic.
    pub fn effective_location(&self) -> Option<N> {
        match (self.location, &self.cause) {
            (Some(location), _) => Some(location),
            (None, Some(cause)) => cause.effective_location(),
            (None, None) => None,
        }
    }
}

impl<N: NodeKey> fmt::Display for SemanticError<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Fatal framework errors: contract violations that abort the run.
///
/// Unlike [`SemanticError`], these are not values -- they signal a bug in the
/// user's rule setup or an attempt to use the reactor outside its discipline.
/// Variants carry pre-rendered attribute/rule names so the enum stays
/// non-generic.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// Eager `set` while the reactor is running.
    #[error("cannot set attribute {attribute} while the reactor is running")]
    SetWhileRunning { attribute: String },

    /// Two producers for one attribute under the default policy.
    #[error("attempting to redefine attribute {attribute}")]
    AttributeRedefinition { attribute: String },

    /// A fired rule returned without supplying one of its exports.
    #[error("rule did not provide exported attribute {attribute}:\n{rule}")]
    UnsetExport { attribute: String, rule: String },

    /// A computation addressed an attribute that is not among its exports.
    #[error("attribute {attribute} is not an export of this rule")]
    NotAnExport { attribute: String },

    /// A computation addressed an attribute that is not among its
    /// dependencies.
    #[error("attribute {attribute} is not a dependency of this rule")]
    NotADependency { attribute: String },

    /// Index addressing past the end of the export array.
    #[error("export index {index} out of range for rule with {count} exports")]
    ExportIndexOutOfRange { index: usize, count: usize },

    /// Index addressing past the end of the dependency array.
    #[error("dependency index {index} out of range for rule with {count} dependencies")]
    DependencyIndexOutOfRange { index: usize, count: usize },

    /// A computation read a dependency that has no value anywhere.
    #[error("dependency {attribute} has no value")]
    UnsatisfiedDependency { attribute: String },

    /// A redefinition policy recursed past the depth limit.
    #[error("redefinition of {attribute} exceeded the recursion limit ({limit})")]
    RedefinitionCycle { attribute: String, limit: usize },

    /// An error escaped a rule computation; names the offending rule.
    #[error("error while running rule: {rule}")]
    RuleFailed {
        rule: String,
        #[source]
        source: Box<ReactorError>,
    },
}
