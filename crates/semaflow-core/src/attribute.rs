//! Attribute handles: the (node, name) pairs that key every value the
//! framework computes.
//!
//! An [`Attribute`] is an identity, not a value. It is used as the key of the
//! reactor's value store and as the edge label of its dependency index. The
//! node half is an opaque handle supplied by the user (see [`NodeKey`]); the
//! name half is a short string compared by value.

use std::fmt;
use std::hash::Hash;

/// Bound for the opaque node handles the framework keys attributes by.
///
/// The framework never inspects nodes; it only compares and hashes them.
/// Implementors are expected to be *identity* handles -- an id newtype such
/// as `NodeId(u32)`, an arena index, or a wrapped pointer -- so that two
/// handles compare equal exactly when they designate the same AST node. Two
/// distinct nodes with equal contents must still have distinct handles.
///
/// Blanket-implemented for every eligible type.
pub trait NodeKey: Copy + Eq + Hash + fmt::Debug + 'static {}

impl<T: Copy + Eq + Hash + fmt::Debug + 'static> NodeKey for T {}

/// A (node, name) pair acting as the handle for one attribute of one node.
///
/// `node` is `None` for "global" attributes that are not tied to any AST
/// node. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute<N> {
    node: Option<N>,
    name: String,
}

impl<N: NodeKey> Attribute<N> {
    /// An attribute of the given node.
    pub fn new(node: N, name: impl Into<String>) -> Self {
        Attribute {
            node: Some(node),
            name: name.into(),
        }
    }

    /// A global attribute, tied to no node.
    pub fn global(name: impl Into<String>) -> Self {
        Attribute {
            node: None,
            name: name.into(),
        }
    }

    /// The node this attribute belongs to, if any.
    pub fn node(&self) -> Option<N> {
        self.node
    }

    /// The attribute's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<N: NodeKey> fmt::Display for Attribute<N> {
    /// Compact `(node :: name)` rendering used in diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "({:?} :: {})", node, self.name),
            None => write!(f, "(<global> :: {})", self.name),
        }
    }
}
