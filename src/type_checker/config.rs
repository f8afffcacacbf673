use serde::{Deserialize, Serialize};

use crate::diagnostics::diagnostics::DiagnosticFilter;

/// Knobs of a checking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Drop every `AttributeError` and `ClassAttributeError`.
    pub suppress_attribute_errors: bool,
    /// Files whose path contains one of these get no diagnostics.
    pub ignored_path_fragments: Vec<String>,
    /// No diagnostics for `.pyi` files.
    pub ignore_stub_files: bool,
    /// Confidence of an inferred expression with no better source.
    pub default_confidence: f64,
    /// Check fully annotated functions once at their definition.
    pub eager_check_annotated: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        let filter = DiagnosticFilter::default();
        CheckConfig {
            suppress_attribute_errors: filter.suppress_attribute_errors,
            ignored_path_fragments: filter.ignored_path_fragments,
            ignore_stub_files: filter.ignore_stub_files,
            default_confidence: 0.5,
            eager_check_annotated: true,
        }
    }
}

impl CheckConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn filter(&self) -> DiagnosticFilter {
        DiagnosticFilter {
            ignored_path_fragments: self.ignored_path_fragments.clone(),
            ignore_stub_files: self.ignore_stub_files,
            suppress_attribute_errors: self.suppress_attribute_errors,
        }
    }
}
