//! Flattening of parsed files into embeddable units.
//!
//! Chunking is whole-file: each parsed file becomes exactly one unit whose
//! text is the file content.

use crate::records::{EmbeddingUnit, FileRecord, VectorMetadata};

impl VectorMetadata {
    /// Project a parsed file into the metadata stored with its vector.
    ///
    /// Class-derived fields come from `classes[0]` only and are empty when
    /// the file has no classes.
    pub fn from_file_record(record: &FileRecord) -> Self {
        let (primary_class_name, method_names, field_names) = match record.primary_class() {
            Some(class) => (class.name.clone(), class.method_names(), class.field_names()),
            None => (String::new(), Vec::new(), Vec::new()),
        };

        Self {
            file_path: record.file_path.clone(),
            package_name: record.package_name.clone(),
            primary_class_name,
            method_names,
            field_names,
        }
    }
}

/// Map one parsed file to its embedding unit.
pub fn to_embedding_unit(record: &FileRecord) -> EmbeddingUnit {
    EmbeddingUnit {
        transfer_body: record.content.clone(),
        metadata: VectorMetadata::from_file_record(record),
        size_in_lines: record.size_in_lines,
    }
}

/// Map a batch of parsed files, preserving order.
pub fn to_embedding_units(records: &[FileRecord]) -> Vec<EmbeddingUnit> {
    records.iter().map(to_embedding_unit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::JavaParser;

    fn parse(source: &str, path: &str) -> FileRecord {
        JavaParser::with_defaults()
            .unwrap()
            .parse_source(source, path)
            .unwrap()
    }

    #[test]
    fn test_unit_carries_whole_file() {
        let source = "package com.x;\nclass A { private int n; public void m(int x) {} }\n";
        let unit = to_embedding_unit(&parse(source, "/p/src/A.java"));

        assert_eq!(unit.transfer_body, source);
        assert_eq!(unit.size_in_lines, 2);
        assert_eq!(unit.metadata.file_path, "/p/src/A.java");
        assert_eq!(unit.metadata.package_name, "com.x");
        assert_eq!(unit.metadata.primary_class_name, "A");
        assert_eq!(unit.metadata.method_names, vec!["m".to_string()]);
        assert_eq!(unit.metadata.field_names, vec!["n".to_string()]);
    }

    #[test]
    fn test_only_first_class_reaches_metadata() {
        let source = r#"
class First {
    String label;
    void alpha() {}
}

class Second {
    int hidden;
    void beta() {}
    void gamma() {}
}
"#;
        let metadata = VectorMetadata::from_file_record(&parse(source, "Two.java"));

        assert_eq!(metadata.primary_class_name, "First");
        assert_eq!(metadata.method_names, vec!["alpha".to_string()]);
        assert_eq!(metadata.field_names, vec!["label".to_string()]);
        assert!(!metadata.method_names.contains(&"beta".to_string()));
        assert!(!metadata.field_names.contains(&"hidden".to_string()));
    }

    #[test]
    fn test_file_without_classes() {
        let unit = to_embedding_unit(&parse("package empty;\n", "package-info.java"));
        assert_eq!(unit.metadata.package_name, "empty");
        assert!(unit.metadata.primary_class_name.is_empty());
        assert!(unit.metadata.method_names.is_empty());
        assert!(unit.metadata.field_names.is_empty());
    }

    #[test]
    fn test_batch_preserves_order() {
        let records = vec![
            parse("class B {}", "B.java"),
            parse("class A {}", "A.java"),
        ];
        let units = to_embedding_units(&records);
        let paths: Vec<&str> = units.iter().map(|u| u.metadata.file_path.as_str()).collect();
        assert_eq!(paths, vec!["B.java", "A.java"]);
    }
}
