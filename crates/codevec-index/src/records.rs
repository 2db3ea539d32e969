//! Structural records produced by the Java parser.
//!
//! A parse produces one [`FileRecord`] owning its classes, which own their
//! fields and methods, which own their parameters. Records are built once
//! and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Inclusive 1-indexed line range of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// First line (1-indexed)
    pub start_line: usize,

    /// Last line (1-indexed), never before `start_line`
    pub end_line: usize,
}

impl Span {
    /// Build a span, clamping `end_line` so it never precedes `start_line`.
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    /// Number of lines covered.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// A formal parameter of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub declared_type: String,
    pub span: Span,
    pub raw_text: String,
}

/// A method declared in a class body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<ParameterRecord>,
    pub modifiers: Vec<String>,
    pub span: Span,
    pub raw_text: String,
}

/// A field declared in a class body.
///
/// Only the first declarator of `int a, b;` is captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    pub declared_type: String,
    pub modifiers: Vec<String>,
    pub span: Span,
    pub raw_text: String,
}

/// A top-level class declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub modifiers: Vec<String>,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
    pub span: Span,
    pub raw_text: String,
}

impl ClassRecord {
    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.clone()).collect()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Result of parsing one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path the file was read from
    pub file_path: String,

    /// Package name, empty for the default package
    pub package_name: String,

    /// Imported names in source order
    pub imports: Vec<String>,

    /// Top-level classes in document order
    pub classes: Vec<ClassRecord>,

    /// Full file text
    pub content: String,

    /// Number of lines in `content`
    pub size_in_lines: usize,
}

impl FileRecord {
    /// The first class in document order, if any.
    pub fn primary_class(&self) -> Option<&ClassRecord> {
        self.classes.first()
    }
}

/// Metadata stored next to a file's embedding.
///
/// Class-derived fields come from the first class only; a file with several
/// classes does not surface the later ones here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub file_path: String,
    pub package_name: String,
    pub primary_class_name: String,
    pub method_names: Vec<String>,
    pub field_names: Vec<String>,
}

/// Text to embed together with the metadata stored beside its vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUnit {
    /// Text sent to the embedding backend
    pub transfer_body: String,

    pub metadata: VectorMetadata,

    /// Line count of the source file
    pub size_in_lines: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_clamps_inverted_range() {
        let span = Span::new(10, 4);
        assert_eq!(span.start_line, 10);
        assert_eq!(span.end_line, 10);
        assert_eq!(span.line_count(), 1);
    }

    #[test]
    fn test_span_contains() {
        let outer = Span::new(1, 20);
        assert!(outer.contains(&Span::new(3, 5)));
        assert!(outer.contains(&Span::new(1, 20)));
        assert!(!outer.contains(&Span::new(15, 21)));
    }
}
