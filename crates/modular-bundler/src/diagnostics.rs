//! Structured compile diagnostics.
//!
//! The bundler reports failures as a list of diagnostics. This module holds
//! them in a cloneable, serializable form that does not depend on the
//! bundler's own error types, and extracts them from Rolldown errors.

mod miette;

pub use miette::{DiagnosticError, format_diagnostic, format_diagnostics, line_col_to_offset};

use std::fmt;

use serde::{Deserialize, Serialize};

/// One diagnostic reported by the bundler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDiagnostic {
    pub kind: DiagnosticKind,
    pub severity: DiagnosticSeverity,
    pub message: String,
    /// Source file, absolute or relative to the modular root.
    pub file: Option<String>,
    /// 1-based line.
    pub line: Option<u32>,
    /// 1-based column.
    pub column: Option<u32>,
    pub help: Option<String>,
}

impl ExtractedDiagnostic {
    /// An error diagnostic with no location.
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            help: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// `file:line:column`, as far as known.
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(column)) => format!("{file}:{line}:{column}"),
            (Some(line), None) => format!("{file}:{line}"),
            _ => file.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MissingExport,
    ParseError,
    UnresolvedEntry,
    UnresolvedImport,
    Plugin,
    Other(String),
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MissingExport => write!(f, "MissingExport"),
            DiagnosticKind::ParseError => write!(f, "ParseError"),
            DiagnosticKind::UnresolvedEntry => write!(f, "UnresolvedEntry"),
            DiagnosticKind::UnresolvedImport => write!(f, "UnresolvedImport"),
            DiagnosticKind::Plugin => write!(f, "Plugin"),
            DiagnosticKind::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// Extract diagnostics from a Rolldown error.
///
/// Rolldown's batched error type is not stable across releases, so this works
/// from its debug rendering: each batch member becomes one diagnostic.
pub fn extract_from_rolldown_error(error: &dyn fmt::Debug) -> Vec<ExtractedDiagnostic> {
    let error_str = format!("{error:?}");

    let parts: Vec<&str> = error_str
        .split("BuildDiagnostic")
        .map(str::trim)
        .filter(|s| {
            let word = s.trim_matches(|c: char| !c.is_alphanumeric());
            !word.is_empty() && word != "Batched"
        })
        .collect();

    if parts.len() > 1 {
        parts.into_iter().map(extract_single).collect()
    } else {
        vec![extract_single(&error_str)]
    }
}

fn extract_single(text: &str) -> ExtractedDiagnostic {
    let kind = if text.contains("MissingExport") {
        DiagnosticKind::MissingExport
    } else if text.contains("Parse error") || text.contains("Syntax") || text.contains("Expected")
    {
        DiagnosticKind::ParseError
    } else if text.contains("UnresolvedEntry") {
        DiagnosticKind::UnresolvedEntry
    } else if text.contains("UnresolvedImport") || text.contains("Could not resolve") {
        DiagnosticKind::UnresolvedImport
    } else if text.contains("Plugin") {
        DiagnosticKind::Plugin
    } else {
        DiagnosticKind::Other("BundlerError".to_string())
    };

    let severity = if text.contains("Warning") {
        DiagnosticSeverity::Warning
    } else {
        DiagnosticSeverity::Error
    };

    let (line, column) = extract_line_col(text).unzip();

    ExtractedDiagnostic {
        kind,
        severity,
        message: text.to_string(),
        file: extract_file_path(text),
        line,
        column,
        help: extract_help_text(text),
    }
}

/// Look for a quoted or whitespace-delimited path with a script extension.
fn extract_file_path(text: &str) -> Option<String> {
    for ext in [".tsx", ".ts", ".jsx", ".js", ".mjs", ".cjs", ".css"] {
        let Some(pos) = text.find(ext) else {
            continue;
        };
        let end = pos + ext.len();
        let start = text[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '(')
            .map_or(0, |i| i + 1);
        let candidate = text[start..end].trim();
        if !candidate.is_empty() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// First `:<line>:<column>` pair in the text.
fn extract_line_col(text: &str) -> Option<(u32, u32)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while let Some(offset) = text[i..].find(':') {
        let start = i + offset + 1;
        let line_len = bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();
        let after_line = start + line_len;
        if line_len > 0 && bytes.get(after_line) == Some(&b':') {
            let col_start = after_line + 1;
            let col_len = bytes[col_start..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if col_len > 0 {
                let line = text[start..after_line].parse().ok()?;
                let column = text[col_start..col_start + col_len].parse().ok()?;
                return Some((line, column));
            }
        }
        i = start;
    }
    None
}

fn extract_help_text(text: &str) -> Option<String> {
    ["help: ", "Help: ", "hint: ", "Hint: "]
        .iter()
        .find_map(|indicator| {
            let pos = text.find(indicator)?;
            let help = text[pos + indicator.len()..].lines().next()?.trim();
            (!help.is_empty()).then(|| help.to_string())
        })
}
