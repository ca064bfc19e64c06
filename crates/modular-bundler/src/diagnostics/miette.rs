//! Rendering compile diagnostics with source frames.

use std::fmt;
use std::path::Path;

use miette::{
    Diagnostic, GraphicalReportHandler, GraphicalTheme, LabeledSpan, NamedSource, Severity,
};

use crate::diagnostics::{DiagnosticKind, DiagnosticSeverity, ExtractedDiagnostic};

/// Convert a 1-based line and column to a byte offset.
pub fn line_col_to_offset(source: &str, line: u32, column: u32) -> Option<usize> {
    let line_idx = (line as usize).checked_sub(1)?;
    let mut offset = 0;
    for (idx, text) in source.split_inclusive('\n').enumerate() {
        if idx == line_idx {
            let col_bytes = match (column as usize).checked_sub(1) {
                None => 0,
                Some(col) => text
                    .char_indices()
                    .nth(col)
                    .map_or(text.trim_end_matches('\n').len(), |(pos, _)| pos),
            };
            return Some(offset + col_bytes);
        }
        offset += text.len();
    }
    None
}

/// Length of the identifier starting at `offset`, at least one byte.
fn span_length(source: &str, offset: usize) -> usize {
    source
        .get(offset..)
        .and_then(|rest| {
            rest.char_indices()
                .find(|(_, c)| !c.is_alphanumeric() && *c != '_' && *c != '$')
                .map(|(pos, _)| pos)
        })
        .unwrap_or(1)
        .max(1)
}

/// Wrapper that lets miette render an [`ExtractedDiagnostic`].
#[derive(Debug)]
pub struct DiagnosticError {
    diag: ExtractedDiagnostic,
    source_code: Option<NamedSource<String>>,
    span: Option<(usize, usize)>,
}

impl DiagnosticError {
    pub fn new(diag: ExtractedDiagnostic, source: Option<String>) -> Self {
        let span = match (&source, diag.line, diag.column) {
            (Some(src), Some(line), Some(column)) => line_col_to_offset(src, line, column)
                .map(|offset| (offset, span_length(src, offset))),
            _ => None,
        };
        let source_code = match (source, &diag.file) {
            (Some(src), Some(file)) if span.is_some() => Some(NamedSource::new(file, src)),
            _ => None,
        };
        Self {
            diag,
            source_code,
            span,
        }
    }
}

impl std::error::Error for DiagnosticError {}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diag.location() {
            Some(location) if self.source_code.is_none() => {
                write!(f, "{} ({location})", self.diag.message)
            }
            _ => write!(f, "{}", self.diag.message),
        }
    }
}

impl Diagnostic for DiagnosticError {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(self.diag.kind.to_string()))
    }

    fn severity(&self) -> Option<Severity> {
        Some(match self.diag.severity {
            DiagnosticSeverity::Error => Severity::Error,
            DiagnosticSeverity::Warning => Severity::Warning,
        })
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        self.diag
            .help
            .as_ref()
            .map(|h| Box::new(h.clone()) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_code
            .as_ref()
            .map(|s| s as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let (offset, len) = self.span?;
        let label = match &self.diag.kind {
            DiagnosticKind::MissingExport => "missing export",
            DiagnosticKind::ParseError => "parse error",
            DiagnosticKind::UnresolvedEntry => "unresolved entry",
            DiagnosticKind::UnresolvedImport => "unresolved import",
            DiagnosticKind::Plugin => "plugin error",
            DiagnosticKind::Other(_) => "here",
        };
        Some(Box::new(std::iter::once(LabeledSpan::new(
            Some(label.to_string()),
            offset,
            len,
        ))))
    }
}

/// Render one diagnostic, with a code frame when its source can be read.
///
/// Relative file paths are resolved against `modular_root`.
pub async fn format_diagnostic(diag: &ExtractedDiagnostic, modular_root: &Path) -> String {
    let source = match &diag.file {
        Some(file) => tokio::fs::read_to_string(modular_root.join(file)).await.ok(),
        None => None,
    };
    let error = DiagnosticError::new(diag.clone(), source);

    let mut rendered = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    if handler.render_report(&mut rendered, &error).is_err() {
        rendered = error.to_string();
    }
    rendered
}

/// Render every diagnostic; source reads run concurrently.
pub async fn format_diagnostics(
    diagnostics: &[ExtractedDiagnostic],
    modular_root: &Path,
) -> Vec<String> {
    futures::future::join_all(
        diagnostics
            .iter()
            .map(|diag| format_diagnostic(diag, modular_root)),
    )
    .await
}
