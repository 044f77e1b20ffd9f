//! Test harness for semantic analyses.
//!
//! Implement [`AnalysisFixture`] in a test module to get `success`/`failure`
//! assertions over a configured reactor: supply the rule configuration in
//! [`configure`](AnalysisFixture::configure) and a node rendering in
//! [`node_to_string`](AnalysisFixture::node_to_string), then hand ASTs to
//! the provided methods. Assertions inspect root errors only -- derived
//! errors are a consequence, not a finding.

use semaflow_core::NodeKey;

use crate::reactor::Reactor;

/// A reusable success/failure harness for a semantic analysis.
///
/// The provided assertion methods panic with a formatted report, which is
/// the right behavior inside `#[test]` functions.
pub trait AnalysisFixture<N: NodeKey> {
    /// The AST (or AST root) handed to the assertions.
    type Ast;

    /// Configures a fresh reactor for the given AST by instantiating rules
    /// on it, so the fixture can subsequently run it.
    fn configure(&self, reactor: &Reactor<N>, ast: &Self::Ast);

    /// Renders an AST node for failure messages. Keep it short but
    /// identifying -- a node type plus a source position works well.
    fn node_to_string(&self, node: &N) -> String;

    /// Configures and runs a reactor over the AST. Panics on fatal errors
    /// (contract violations are test bugs, not analysis outcomes).
    fn analyze(&self, ast: &Self::Ast) -> Reactor<N> {
        let reactor = Reactor::new();
        self.configure(&reactor, ast);
        if let Err(error) = reactor.run() {
            panic!("reactor failed: {error}");
        }
        reactor
    }

    /// Asserts the AST passes semantic analysis without errors.
    fn success(&self, ast: &Self::Ast) {
        let reactor = self.analyze(ast);
        if !reactor.errors().is_empty() {
            panic!(
                "expected successful analysis, got errors:\n{}",
                reactor.report_errors(|node| self.node_to_string(node))
            );
        }
    }

    /// Asserts the AST fails semantic analysis (at least one root error).
    fn failure(&self, ast: &Self::Ast) {
        let reactor = self.analyze(ast);
        if reactor.errors().is_empty() {
            panic!("expected errors, but semantic analysis succeeded");
        }
    }

    /// Asserts the analysis fails with errors located (effectively, i.e.
    /// walking cause chains) at every one of the given nodes, and nowhere
    /// else.
    fn failure_at(&self, ast: &Self::Ast, locations: &[N]) {
        self.failure_located(ast, locations, true);
    }

    /// Like [`failure_at`](Self::failure_at), but tolerates additional
    /// errors at other locations.
    fn failure_including_at(&self, ast: &Self::Ast, locations: &[N]) {
        self.failure_located(ast, locations, false);
    }

    /// Underpins the location assertions; `only_those` selects the strict
    /// variant. Exposed so fixtures can wrap it in their own helpers.
    fn failure_located(&self, ast: &Self::Ast, locations: &[N], only_those: bool) {
        assert!(
            !locations.is_empty(),
            "no locations passed to a failure_at assertion"
        );
        let reactor = self.analyze(ast);
        let errors = reactor.errors();
        if errors.is_empty() {
            panic!("expected errors, but semantic analysis succeeded");
        }

        for location in locations {
            if !errors
                .iter()
                .any(|error| error.effective_location() == Some(*location))
            {
                panic!(
                    "no error for location: {}\nactual errors:\n{}",
                    self.node_to_string(location),
                    reactor.report_errors(|node| self.node_to_string(node))
                );
            }
        }

        if !only_those {
            return;
        }
        for error in &errors {
            let located = error.effective_location();
            if !locations.iter().any(|loc| located == Some(*loc)) {
                panic!("unexpected error: {}", error.description());
            }
        }
    }

    /// Asserts the analysis fails with errors whose descriptions contain the
    /// given fragments -- every fragment must match some error, and every
    /// error must match some fragment.
    fn failure_with(&self, ast: &Self::Ast, fragments: &[&str]) {
        self.failure_described(ast, fragments, true);
    }

    /// Like [`failure_with`](Self::failure_with), but tolerates additional
    /// errors with unrelated descriptions.
    fn failure_including_with(&self, ast: &Self::Ast, fragments: &[&str]) {
        self.failure_described(ast, fragments, false);
    }

    /// Underpins the description assertions; `only_those` selects the strict
    /// variant.
    fn failure_described(&self, ast: &Self::Ast, fragments: &[&str], only_those: bool) {
        assert!(
            !fragments.is_empty(),
            "no description fragments passed to a failure_with assertion"
        );
        let reactor = self.analyze(ast);
        let errors = reactor.errors();
        if errors.is_empty() {
            panic!("expected errors, but semantic analysis succeeded");
        }

        for fragment in fragments {
            if !errors
                .iter()
                .any(|error| error.description().contains(fragment))
            {
                panic!(
                    "no error contains description fragment {fragment:?}\nactual errors:\n{}",
                    reactor.report_errors(|node| self.node_to_string(node))
                );
            }
        }

        if !only_those {
            return;
        }
        for error in &errors {
            if !fragments
                .iter()
                .any(|fragment| error.description().contains(fragment))
            {
                panic!("unexpected error: {}", error.description());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semaflow_core::{Attribute, AttrValue, SemanticError};
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct NodeId(u32);

    /// A toy analysis: every declared name must be distinct. The "AST" is a
    /// list of (node, name) declarations.
    struct DistinctNames;

    impl AnalysisFixture<NodeId> for DistinctNames {
        type Ast = Vec<(NodeId, &'static str)>;

        fn configure(&self, reactor: &Reactor<NodeId>, ast: &Self::Ast) {
            for (index, (node, name)) in ast.iter().enumerate() {
                let clash = ast[..index].iter().find(|(_, earlier)| earlier == name);
                let export = Attribute::new(*node, "decl");
                match clash {
                    None => {
                        let name = *name;
                        reactor.rule([export]).by(move |ctx| {
                            ctx.set_at(0, AttrValue::of(name.to_string()))
                        });
                    }
                    Some(_) => {
                        reactor
                            .error(
                                Rc::new(SemanticError::new(
                                    format!("duplicate declaration of {name}"),
                                    Some(*node),
                                )),
                                &[export],
                            )
                            .unwrap();
                    }
                }
            }
        }

        fn node_to_string(&self, node: &NodeId) -> String {
            format!("decl #{}", node.0)
        }
    }

    #[test]
    fn success_passes_on_clean_analysis() {
        DistinctNames.success(&vec![(NodeId(0), "x"), (NodeId(1), "y")]);
    }

    #[test]
    fn failure_assertions_see_the_reported_error() {
        let ast = vec![(NodeId(0), "x"), (NodeId(1), "x")];
        DistinctNames.failure(&ast);
        DistinctNames.failure_at(&ast, &[NodeId(1)]);
        DistinctNames.failure_with(&ast, &["duplicate declaration"]);
        DistinctNames.failure_including_with(&ast, &["duplicate"]);
    }

    #[test]
    #[should_panic(expected = "expected errors")]
    fn failure_panics_on_clean_analysis() {
        DistinctNames.failure(&vec![(NodeId(0), "x")]);
    }

    #[test]
    #[should_panic(expected = "expected successful analysis")]
    fn success_panics_on_failed_analysis() {
        DistinctNames.success(&vec![(NodeId(0), "x"), (NodeId(1), "x")]);
    }
}
