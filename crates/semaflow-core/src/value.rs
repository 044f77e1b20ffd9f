//! Heterogeneous attribute values.
//!
//! Attribute values are arbitrary user data -- type descriptors, scopes,
//! resolved declarations -- or semantic errors. [`AttrValue`] is the tagged
//! sum the framework traffics in: a dynamic payload or an error. Framework
//! code only ever discriminates error vs. non-error; consumers of a payload
//! are expected to know its concrete type and downcast at the use site.
//!
//! There is no null value. Absence of an attribute is a missing key in the
//! reactor's store, and every stored [`AttrValue`] holds real data.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::attribute::NodeKey;
use crate::error::SemanticError;

/// Bound for dynamic attribute payloads: any `'static` type with a `Debug`
/// rendering (used by rule and tree dumps). Blanket-implemented.
pub trait AnalysisValue: Any + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug> AnalysisValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The value of an attribute: a computed payload, or the semantic error that
/// precluded its computation. Cloning is cheap (reference-counted).
#[derive(Debug, Clone)]
pub enum AttrValue<N> {
    /// A computed analysis result.
    Data(Rc<dyn AnalysisValue>),
    /// The error that tainted this attribute.
    Error(Rc<SemanticError<N>>),
}

impl<N: NodeKey> AttrValue<N> {
    /// Boxes an arbitrary payload.
    pub fn of<T: AnalysisValue>(value: T) -> Self {
        AttrValue::Data(Rc::new(value))
    }

    /// Wraps a semantic error as a value.
    pub fn error(error: SemanticError<N>) -> Self {
        AttrValue::Error(Rc::new(error))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AttrValue::Error(_))
    }

    /// The wrapped error, if this value is one.
    pub fn as_error(&self) -> Option<&Rc<SemanticError<N>>> {
        match self {
            AttrValue::Error(error) => Some(error),
            AttrValue::Data(_) => None,
        }
    }

    /// Downcasts the payload to a concrete type. `None` for errors and for
    /// payloads of a different type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            AttrValue::Data(data) => data.as_any().downcast_ref(),
            AttrValue::Error(_) => None,
        }
    }

    /// Whether two values are the same underlying allocation.
    ///
    /// This is the identity the engine uses to tell a genuine redefinition
    /// apart from the same value arriving again through a second placement of
    /// a rule in a dependency bucket.
    pub fn same(&self, other: &AttrValue<N>) -> bool {
        match (self, other) {
            (AttrValue::Data(a), AttrValue::Data(b)) => Rc::ptr_eq(a, b),
            (AttrValue::Error(a), AttrValue::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<N: NodeKey> fmt::Display for AttrValue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Data(data) => write!(f, "{:?}", data),
            AttrValue::Error(error) => write!(f, "error({})", error.description()),
        }
    }
}
