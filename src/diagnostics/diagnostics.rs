use std::{fmt::Display, rc::Rc};

use serde::{Deserialize, Serialize};

use super::dedup::Deduplicator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    AttributeError,
    ClassAttributeError,
    TypeError,
    SubTypeError,
    OverrideTypeError,
    ValueAnnotationMismatch,
    ReturnValueMissing,
    ArgTypeError,
    ArgLenTypeError,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::AttributeError => "AttributeError",
            DiagnosticKind::ClassAttributeError => "ClassAttributeError",
            DiagnosticKind::TypeError => "TypeError",
            DiagnosticKind::SubTypeError => "SubTypeError",
            DiagnosticKind::OverrideTypeError => "OverrideTypeError",
            DiagnosticKind::ValueAnnotationMismatch => "ValueAnnotationMismatch",
            DiagnosticKind::ReturnValueMissing => "ReturnValueMissing",
            DiagnosticKind::ArgTypeError => "ArgTypeError",
            DiagnosticKind::ArgLenTypeError => "ArgLenTypeError",
        }
    }
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reported inconsistency in a checked program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    pub line: u32,
    pub identifier: String,
    pub confidence: f64,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}:{} {} <<{}>> {}",
            self.kind,
            self.file,
            self.line,
            self.identifier,
            (self.confidence * 1_000_000.0).round() / 1_000_000.0,
            self.message
        )
    }
}

/// Reported confidence of an error raised by a value whose type was
/// inferred with probability `confidence`.
pub fn error_probability(confidence: f64) -> f64 {
    (1.0 - confidence).clamp(0.0, 1.0)
}

/// Receiver of accepted diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.push(diagnostic.clone());
    }
}

/// Sink that only writes through `log`.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        log::warn!(target: "probcheck::report", "{}", diagnostic);
    }
}

/// Which reports are dropped before deduplication.
#[derive(Debug, Clone)]
pub struct DiagnosticFilter {
    pub ignored_path_fragments: Vec<String>,
    pub ignore_stub_files: bool,
    pub suppress_attribute_errors: bool,
}

impl Default for DiagnosticFilter {
    fn default() -> Self {
        DiagnosticFilter {
            ignored_path_fragments: vec![String::from("site-packages"), String::from("lib/python")],
            ignore_stub_files: true,
            suppress_attribute_errors: false,
        }
    }
}

impl DiagnosticFilter {
    pub fn ignores_file(&self, file: &str) -> bool {
        (self.ignore_stub_files && file.ends_with(".pyi"))
            || self
                .ignored_path_fragments
                .iter()
                .any(|fragment| !fragment.is_empty() && file.contains(fragment.as_str()))
    }
}

/// Current source location of the check.
#[derive(Debug, Clone)]
pub struct Cursor {
    pub file: Rc<String>,
    pub line: u32,
}

/// Per-run diagnostic hub.
///
/// Reports go through the ignored-path filter, the scoped suppression
/// stack and the deduplicator, in that order. Accepted diagnostics are
/// logged and queued until [`Diagnostics::drain`] hands them to a sink.
#[derive(Debug)]
pub struct Diagnostics {
    dedup: Deduplicator,
    cursor: Cursor,
    suppressions: Vec<Vec<DiagnosticKind>>,
    filter: DiagnosticFilter,
    accepted: Vec<Diagnostic>,
    total: usize,
}

impl Diagnostics {
    pub fn new(file: Rc<String>, filter: DiagnosticFilter) -> Self {
        Diagnostics {
            dedup: Deduplicator::new(),
            cursor: Cursor { file, line: 0 },
            suppressions: vec![],
            filter,
            accepted: vec![],
            total: 0,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn file(&self) -> Rc<String> {
        Rc::clone(&self.cursor.file)
    }

    pub fn line(&self) -> u32 {
        self.cursor.line
    }

    pub fn set_line(&mut self, line: u32) {
        self.cursor.line = line;
    }

    /// Moves the cursor and returns the previous location.
    pub fn move_to(&mut self, file: Rc<String>, line: u32) -> Cursor {
        std::mem::replace(&mut self.cursor, Cursor { file, line })
    }

    pub fn restore(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    pub fn push_suppression(&mut self, kinds: Vec<DiagnosticKind>) {
        log::trace!("suppressing {:?}", kinds);
        self.suppressions.push(kinds);
    }

    pub fn pop_suppression(&mut self) {
        self.suppressions.pop();
    }

    pub fn is_suppressed(&self, kind: DiagnosticKind) -> bool {
        let attribute = matches!(
            kind,
            DiagnosticKind::AttributeError | DiagnosticKind::ClassAttributeError
        );
        (attribute && self.filter.suppress_attribute_errors)
            || self.suppressions.iter().any(|frame| frame.contains(&kind))
    }

    /// Reports at the cursor. Returns whether the diagnostic was accepted.
    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        identifier: &str,
        confidence: f64,
        message: String,
    ) -> bool {
        let file = Rc::clone(&self.cursor.file);
        let line = self.cursor.line;
        self.report_at(kind, &file, line, identifier, confidence, message)
    }

    pub fn report_at(
        &mut self,
        kind: DiagnosticKind,
        file: &str,
        line: u32,
        identifier: &str,
        confidence: f64,
        message: String,
    ) -> bool {
        if self.filter.ignores_file(file) || self.is_suppressed(kind) {
            return false;
        }
        if !self.dedup.report(kind.as_str(), file, line, identifier) {
            return false;
        }

        let diagnostic = Diagnostic {
            kind,
            file: file.to_string(),
            line,
            identifier: identifier.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            message,
        };
        log::error!("{}", diagnostic);
        self.accepted.push(diagnostic);
        self.total += 1;
        true
    }

    /// Hands the queued diagnostics over, oldest first.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.accepted)
    }

    pub fn pending(&self) -> &[Diagnostic] {
        &self.accepted
    }

    /// Number of diagnostics accepted during the run.
    pub fn total(&self) -> usize {
        self.total
    }
}
