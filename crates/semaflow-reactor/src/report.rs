//! Run summaries.

use serde::{Deserialize, Serialize};

/// Summary returned by [`Reactor::run`](crate::Reactor::run).
///
/// Purely informational -- the full attribute store and error sets stay
/// inspectable on the reactor. Serializable so hosts can log or ship it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Rule firings, counting re-firings under a re-notifying policy.
    pub fired_rules: usize,
    /// Export publications processed by the value pipeline.
    pub published_attributes: usize,
    /// Root errors recorded by the end of the run.
    pub root_errors: usize,
    /// Derived errors (attached or attributeless) by the end of the run.
    pub derived_errors: usize,
    /// Rendered names of dependencies the missing-attribute diagnostic
    /// reported, in diagnosis order.
    #[serde(default)]
    pub missing_attributes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip() {
        let report = RunReport {
            fired_rules: 4,
            published_attributes: 5,
            root_errors: 1,
            derived_errors: 2,
            missing_attributes: vec!["(NodeId(0) :: type)".to_string()],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }

    #[test]
    fn missing_attributes_defaults_to_empty() {
        let back: RunReport = serde_json::from_str(
            r#"{"fired_rules":0,"published_attributes":0,"root_errors":0,"derived_errors":0}"#,
        )
        .unwrap();
        assert!(back.missing_attributes.is_empty());
    }
}
