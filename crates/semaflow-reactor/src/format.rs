//! Attributed-tree dumps.
//!
//! [`format_attribute_tree`] renders an AST as an indented tree where every
//! node line is followed by the attributes the reactor computed for it,
//! before its children. Useful for eyeballing what an analysis produced:
//!
//! ```text
//! fn main
//!   :: scope = "root"
//!   :: type = "() -> int"
//!   return 0
//!     :: type = "int"
//! ```

use semaflow_core::NodeKey;

use crate::reactor::Reactor;

const INDENT: usize = 2;

/// Child enumeration for the tree walk. The framework treats nodes as opaque
/// identities, so traversal is the caller's knowledge.
pub trait TreeWalker<N: NodeKey> {
    fn children(&self, node: N) -> Vec<N>;
}

/// Renders the tree rooted at `root`: each node printed through
/// `print_node`, followed by one `:: name = value` line per attribute the
/// reactor holds for it (in store order), followed by its children, two
/// spaces deeper.
pub fn format_attribute_tree<N: NodeKey>(
    root: N,
    reactor: &Reactor<N>,
    walker: &impl TreeWalker<N>,
    print_node: &impl Fn(&N) -> String,
) -> String {
    let mut out = String::new();
    format_node(root, reactor, walker, print_node, 0, &mut out);
    out
}

fn format_node<N: NodeKey>(
    node: N,
    reactor: &Reactor<N>,
    walker: &impl TreeWalker<N>,
    print_node: &impl Fn(&N) -> String,
    indent: usize,
    out: &mut String,
) {
    out.push_str(&" ".repeat(indent));
    out.push_str(&print_node(&node));
    for (attribute, value) in reactor.get_all(node) {
        out.push('\n');
        out.push_str(&" ".repeat(indent + INDENT));
        out.push_str(":: ");
        out.push_str(attribute.name());
        out.push_str(" = ");
        out.push_str(&value.to_string());
    }
    out.push('\n');
    for child in walker.children(node) {
        format_node(child, reactor, walker, print_node, indent + INDENT, out);
    }
}
