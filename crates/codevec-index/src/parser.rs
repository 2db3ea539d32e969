//! Java structure extraction using tree-sitter.
//!
//! Turns one source file into a [`FileRecord`]: package, imports and the
//! top-level classes with their fields, methods and parameters. Declarations
//! missing a required token are dropped rather than reported.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::{Language, Node, Parser};

use crate::records::{
    ClassRecord, FieldRecord, FileRecord, MethodRecord, ParameterRecord, Span,
};
use crate::walker::SourceWalker;

/// Default advisory size limit, in lines.
pub const DEFAULT_MAX_FILE_LINES: usize = 1000;

/// Errors that can occur while parsing a single file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8: {source}")]
    DecodeError {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    GrammarParseError { path: String, reason: String },

    #[error("Failed to load Java grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

/// Parser settings.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Files longer than this are logged; parsing still proceeds.
    pub max_file_lines: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_file_lines: DEFAULT_MAX_FILE_LINES,
        }
    }
}

/// Tree-sitter backed Java parser.
pub struct JavaParser {
    parser: Parser,
    config: ParserConfig,
}

impl JavaParser {
    /// Create a parser with the Java grammar loaded.
    pub fn new(config: ParserConfig) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        let language: Language = tree_sitter_java::LANGUAGE.into();
        parser.set_language(&language)?;

        Ok(Self { parser, config })
    }

    /// Create a parser with default settings.
    pub fn with_defaults() -> Result<Self, ParseError> {
        Self::new(ParserConfig::default())
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Read and parse one file.
    pub fn parse(&mut self, path: &Path) -> Result<FileRecord, ParseError> {
        let file_path = path.to_string_lossy().to_string();

        let bytes = fs::read(path).map_err(|source| ParseError::Io {
            path: file_path.clone(),
            source,
        })?;
        let source = String::from_utf8(bytes).map_err(|source| ParseError::DecodeError {
            path: file_path.clone(),
            source,
        })?;

        self.parse_source(&source, &file_path)
    }

    /// Parse already-decoded source text.
    pub fn parse_source(&mut self, source: &str, file_path: &str) -> Result<FileRecord, ParseError> {
        let size_in_lines = source.lines().count();
        if size_in_lines > self.config.max_file_lines {
            warn!(
                "File {} has {} lines, exceeding the {} line limit",
                file_path, size_in_lines, self.config.max_file_lines
            );
        }

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseError::GrammarParseError {
                path: file_path.to_string(),
                reason: "parser produced no tree".to_string(),
            })?;

        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(root.start_position().row + 1);
            return Err(ParseError::GrammarParseError {
                path: file_path.to_string(),
                reason: format!("syntax error near line {}", line),
            });
        }

        let mut package_name = String::new();
        let mut imports = Vec::new();
        let mut classes = Vec::new();

        for child in root.children(&mut root.walk()) {
            match child.kind() {
                "package_declaration" => {
                    if package_name.is_empty() {
                        if let Some(name) = qualified_name(child, source) {
                            package_name = name;
                        }
                    }
                }
                "import_declaration" => {
                    if let Some(import) = import_name(child, source) {
                        imports.push(import);
                    }
                }
                "class_declaration" => {
                    if let Some(class) = extract_class(child, source) {
                        classes.push(class);
                    }
                }
                _ => {}
            }
        }

        debug!(
            "Parsed {}: package={:?}, {} imports, {} classes",
            file_path,
            package_name,
            imports.len(),
            classes.len()
        );

        Ok(FileRecord {
            file_path: file_path.to_string(),
            package_name,
            imports,
            classes,
            content: source.to_string(),
            size_in_lines,
        })
    }

    /// Parse every source file the walker finds under `root`.
    ///
    /// Files that fail to parse are logged and left out.
    pub fn parse_directory(&mut self, root: &Path, walker: &SourceWalker) -> Vec<FileRecord> {
        let mut records = Vec::new();

        for path in walker.find_source_files(root) {
            match self.parse(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping {:?}: {}", path, e),
            }
        }

        records
    }
}

fn extract_class(node: Node, source: &str) -> Option<ClassRecord> {
    let name = field_text(node, "name", source)?;
    let modifiers = modifiers_of(node, source);

    let mut fields = Vec::new();
    let mut methods = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        for member in body.children(&mut body.walk()) {
            match member.kind() {
                "field_declaration" => {
                    if let Some(field) = extract_field(member, source) {
                        fields.push(field);
                    }
                }
                "method_declaration" => {
                    if let Some(method) = extract_method(member, source) {
                        methods.push(method);
                    }
                }
                _ => {}
            }
        }
    }

    Some(ClassRecord {
        name,
        modifiers,
        fields,
        methods,
        span: span_of(node),
        raw_text: node_text(node, source),
    })
}

fn extract_field(node: Node, source: &str) -> Option<FieldRecord> {
    let declared_type = field_text(node, "type", source)?;

    // First declarator wins for `int a, b;`
    let declarator = node.child_by_field_name("declarator")?;
    let name = field_text(declarator, "name", source)?;

    Some(FieldRecord {
        name,
        declared_type,
        modifiers: modifiers_of(node, source),
        span: span_of(node),
        raw_text: node_text(node, source),
    })
}

fn extract_method(node: Node, source: &str) -> Option<MethodRecord> {
    let name = field_text(node, "name", source)?;
    let return_type = field_text(node, "type", source)?;

    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| extract_parameters(params, source))
        .unwrap_or_default();

    Some(MethodRecord {
        name,
        return_type,
        parameters,
        modifiers: modifiers_of(node, source),
        span: span_of(node),
        raw_text: node_text(node, source),
    })
}

fn extract_parameters(params: Node, source: &str) -> Vec<ParameterRecord> {
    let mut parameters = Vec::new();

    for child in params.children(&mut params.walk()) {
        let pair = match child.kind() {
            "formal_parameter" => {
                field_text(child, "type", source).zip(field_text(child, "name", source))
            }
            "spread_parameter" => spread_parameter(child, source),
            _ => continue,
        };

        match pair {
            Some((declared_type, name)) => parameters.push(ParameterRecord {
                name,
                declared_type,
                span: span_of(child),
                raw_text: node_text(child, source),
            }),
            None => debug!(
                "Dropping incomplete parameter at line {}",
                child.start_position().row + 1
            ),
        }
    }

    parameters
}

/// `String... args`: the type is a direct child, the name sits in a declarator.
fn spread_parameter(node: Node, source: &str) -> Option<(String, String)> {
    let mut declared_type = None;
    let mut name = None;

    for child in node.children(&mut node.walk()) {
        match child.kind() {
            "variable_declarator" => name = field_text(child, "name", source),
            "modifiers" | "..." => {}
            _ if child.is_named() && declared_type.is_none() => {
                declared_type = Some(format!("{}...", node_text(child, source)));
            }
            _ => {}
        }
    }

    declared_type.zip(name)
}

fn qualified_name(node: Node, source: &str) -> Option<String> {
    node.children(&mut node.walk())
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|c| node_text(c, source))
}

fn import_name(node: Node, source: &str) -> Option<String> {
    let name = qualified_name(node, source)?;
    let wildcard = node
        .children(&mut node.walk())
        .any(|c| c.kind() == "asterisk");

    if wildcard {
        Some(format!("{}.*", name))
    } else {
        Some(name)
    }
}

/// Keyword modifiers in source order; annotations are skipped.
fn modifiers_of(node: Node, source: &str) -> Vec<String> {
    let Some(modifiers) = node
        .children(&mut node.walk())
        .find(|c| c.kind() == "modifiers")
    else {
        return Vec::new();
    };

    modifiers
        .children(&mut modifiers.walk())
        .filter(|c| !matches!(c.kind(), "marker_annotation" | "annotation"))
        .map(|c| node_text(c, source))
        .collect()
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field).map(|c| node_text(c, source))
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

fn span_of(node: Node) -> Span {
    Span::new(node.start_position().row + 1, node.end_position().row + 1)
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row + 1);
    }
    if !node.has_error() {
        return None;
    }
    node.children(&mut node.walk()).find_map(first_error_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_SERVICE: &str = r#"package com.example.demo.service;

import java.util.List;
import java.util.Map;
import static java.util.Collections.*;

public class UserService {
    private final UserRepository repository;
    private static int counter = 0, other = 1;

    public UserService(UserRepository repository) {
        this.repository = repository;
    }

    public List<User> findAll() {
        return repository.findAll();
    }

    @Override
    public static synchronized User findById(Long id, String... tags) {
        return null;
    }

    void reset(final int value, Map<String, User> cache) {
        counter = value;
    }
}
"#;

    fn parse(source: &str) -> FileRecord {
        let mut parser = JavaParser::with_defaults().unwrap();
        parser.parse_source(source, "UserService.java").unwrap()
    }

    #[test]
    fn test_package_and_imports() {
        let record = parse(USER_SERVICE);
        assert_eq!(record.package_name, "com.example.demo.service");
        assert_eq!(
            record.imports,
            vec![
                "java.util.List".to_string(),
                "java.util.Map".to_string(),
                "java.util.Collections.*".to_string(),
            ]
        );
        assert_eq!(record.size_in_lines, USER_SERVICE.lines().count());
        assert_eq!(record.content, USER_SERVICE);
    }

    #[test]
    fn test_class_fields_first_declarator_wins() {
        let record = parse(USER_SERVICE);
        assert_eq!(record.classes.len(), 1);

        let class = &record.classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.modifiers, vec!["public".to_string()]);

        assert_eq!(class.fields.len(), 2);
        assert_eq!(class.fields[0].name, "repository");
        assert_eq!(class.fields[0].declared_type, "UserRepository");
        assert_eq!(
            class.fields[0].modifiers,
            vec!["private".to_string(), "final".to_string()]
        );
        assert_eq!(class.fields[1].name, "counter");
        assert_eq!(class.fields[1].declared_type, "int");
    }

    #[test]
    fn test_methods_skip_constructors() {
        let record = parse(USER_SERVICE);
        let class = &record.classes[0];

        let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["findAll", "findById", "reset"]);

        let find_all = &class.methods[0];
        assert_eq!(find_all.return_type, "List<User>");
        assert!(find_all.parameters.is_empty());
        assert_eq!(find_all.span, Span::new(15, 17));
    }

    #[test]
    fn test_method_modifiers_exclude_annotations() {
        let record = parse(USER_SERVICE);
        let find_by_id = &record.classes[0].methods[1];
        assert_eq!(
            find_by_id.modifiers,
            vec![
                "public".to_string(),
                "static".to_string(),
                "synchronized".to_string()
            ]
        );
        assert_eq!(find_by_id.return_type, "User");
    }

    #[test]
    fn test_parameters_including_varargs() {
        let record = parse(USER_SERVICE);
        let class = &record.classes[0];

        let find_by_id = &class.methods[1];
        assert_eq!(find_by_id.parameters.len(), 2);
        assert_eq!(find_by_id.parameters[0].name, "id");
        assert_eq!(find_by_id.parameters[0].declared_type, "Long");
        assert_eq!(find_by_id.parameters[1].name, "tags");
        assert_eq!(find_by_id.parameters[1].declared_type, "String...");

        let reset = &class.methods[2];
        assert_eq!(reset.return_type, "void");
        assert_eq!(reset.parameters[0].name, "value");
        assert_eq!(reset.parameters[0].declared_type, "int");
        assert_eq!(reset.parameters[0].raw_text, "final int value");
        assert_eq!(reset.parameters[1].declared_type, "Map<String, User>");
        assert!(reset.modifiers.is_empty());
    }

    #[test]
    fn test_return_type_not_taken_from_parameters() {
        let record = parse("class A { void m(Foo foo) {} }");
        let method = &record.classes[0].methods[0];
        assert_eq!(method.return_type, "void");
        assert_eq!(method.parameters[0].declared_type, "Foo");
    }

    #[test]
    fn test_class_span_contains_members() {
        let record = parse(USER_SERVICE);
        let class = &record.classes[0];

        for field in &class.fields {
            assert!(class.span.contains(&field.span));
        }
        for method in &class.methods {
            assert!(class.span.contains(&method.span));
            for param in &method.parameters {
                assert!(method.span.contains(&param.span));
            }
        }
    }

    #[test]
    fn test_multiple_classes_in_document_order() {
        let record = parse("class First { int a; }\nclass Second { void b() {} }\n");
        let names: Vec<&str> = record.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert!(record.package_name.is_empty());
    }

    #[test]
    fn test_interface_only_file_has_no_classes() {
        let record = parse("package p;\npublic interface Greeter { String greet(); }\n");
        assert_eq!(record.package_name, "p");
        assert!(record.classes.is_empty());
    }

    #[test]
    fn test_syntax_error_is_grammar_parse_error() {
        let mut parser = JavaParser::with_defaults().unwrap();
        let result = parser.parse_source("public class Broken { void m( { }", "Broken.java");
        assert!(matches!(result, Err(ParseError::GrammarParseError { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::with_suffix(".java").unwrap();
        file.write_all(&[0x63, 0x6c, 0x61, 0xff, 0xfe]).unwrap();
        file.flush().unwrap();

        let mut parser = JavaParser::with_defaults().unwrap();
        let result = parser.parse(file.path());
        assert!(matches!(result, Err(ParseError::DecodeError { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut parser = JavaParser::with_defaults().unwrap();
        let result = parser.parse(Path::new("/definitely/not/here/A.java"));
        assert!(matches!(result, Err(ParseError::Io { .. })));
    }

    #[test]
    fn test_oversized_file_still_parses() {
        let mut parser = JavaParser::new(ParserConfig { max_file_lines: 2 }).unwrap();
        let source = "package p;\n\nclass Big {\n    int x;\n}\n";
        let record = parser.parse_source(source, "Big.java").unwrap();
        assert_eq!(record.classes[0].name, "Big");
        assert_eq!(record.size_in_lines, 5);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let first = parse(USER_SERVICE);
        let second = parse(USER_SERVICE);
        assert_eq!(first, second);
    }
}
