//! Rendered manifest handling
//!
//! Two pieces live here:
//! - [`split_file`] / [`split_tree`]: break multi-document YAML files into one
//!   file per object, keeping every kept document byte-for-byte
//! - [`ManifestObject`]: a single decoded object whose mapping keeps field
//!   order, so labeling and re-encoding never shuffles unrelated fields

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Prefix used for files produced by splitting
pub const PART_PREFIX: &str = "part";

/// A single decoded Kubernetes object
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    /// The full document. `serde_yaml::Mapping` preserves insertion order.
    pub document: Value,
    /// `kind`, empty when absent
    pub kind: String,
    /// `metadata.name`, empty when absent
    pub name: String,
    /// File the object was read from
    pub source_file: PathBuf,
}

impl ManifestObject {
    /// Read and decode a single-document file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Decode a single document
    ///
    /// Empty documents around it (a trailing `---`, comment-only segments)
    /// are skipped, so a file [`split_file`] returned untouched decodes too.
    pub fn parse(content: &str, source_file: &Path) -> Result<Self> {
        let decode_error = |message: String| CoreError::ManifestDecode {
            path: source_file.display().to_string(),
            message,
        };

        let mut found = None;
        for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
            let value = Value::deserialize(document).map_err(|e| decode_error(e.to_string()))?;
            if value.is_null() {
                continue;
            }
            if found.is_some() {
                return Err(decode_error(format!(
                    "expected a single document, found another at document {}",
                    index + 1
                )));
            }
            found = Some(value);
        }
        let document = found.ok_or_else(|| decode_error("file holds no document".to_string()))?;

        if !document.is_mapping() {
            return Err(decode_error("document is not a mapping".to_string()));
        }

        let kind = document
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = document
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            document,
            kind,
            name,
            source_file: source_file.to_path_buf(),
        })
    }

    /// Look up an annotation value
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get("annotations"))
            .and_then(|a| a.get(key))
            .and_then(Value::as_str)
    }

    /// Look up a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.document
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(|l| l.get(key))
            .and_then(Value::as_str)
    }

    /// Set `metadata.labels[key]`, creating the map if needed
    pub fn set_label(&mut self, key: &str, value: &str) {
        insert_string(self.metadata_section("labels"), key, value);
    }

    /// Set `metadata.annotations[key]`, creating the map if needed
    pub fn set_annotation(&mut self, key: &str, value: &str) {
        insert_string(self.metadata_section("annotations"), key, value);
    }

    /// Re-encode the document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.document).map_err(|e| CoreError::ManifestEncode {
            path: self.source_file.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Re-encode and overwrite the source file
    pub fn write(&self) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(&self.source_file, yaml)?;
        Ok(())
    }

    /// `metadata.<section>` as a mutable mapping, replacing anything that isn't one
    fn metadata_section(&mut self, section: &str) -> &mut Mapping {
        let metadata = child_mapping(&mut self.document, "metadata");
        let slot = metadata
            .entry(Value::String(section.to_string()))
            .or_insert(Value::Mapping(Mapping::new()));
        if !slot.is_mapping() {
            *slot = Value::Mapping(Mapping::new());
        }
        match slot {
            Value::Mapping(map) => map,
            _ => unreachable!("slot was just made a mapping"),
        }
    }
}

fn child_mapping<'a>(value: &'a mut Value, key: &str) -> &'a mut Mapping {
    if !value.is_mapping() {
        *value = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(parent) = value else {
        unreachable!("value was just made a mapping")
    };
    let slot = parent
        .entry(Value::String(key.to_string()))
        .or_insert(Value::Mapping(Mapping::new()));
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    match slot {
        Value::Mapping(map) => map,
        _ => unreachable!("slot was just made a mapping"),
    }
}

fn insert_string(map: &mut Mapping, key: &str, value: &str) {
    map.insert(
        Value::String(key.to_string()),
        Value::String(value.to_string()),
    );
}

/// Split raw text on `---` separator lines
///
/// Segments are returned verbatim (separator lines excluded), including
/// blank and comment-only ones.
pub fn split_documents(content: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if line.trim_end() == "---" {
            segments.push(&content[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    segments.push(&content[start..]);

    segments
}

/// True for segments holding nothing but whitespace and comments
pub fn is_blank(segment: &str) -> bool {
    segment
        .lines()
        .all(|l| l.trim().is_empty() || l.trim().starts_with('#'))
}

/// Split one manifest file into single-document files
///
/// Blank or comment-only segments are dropped. When exactly one document is
/// left, `path` itself is returned untouched. Otherwise each kept segment is
/// written to a sibling `part<N>-<file name>`, where `N` is the 1-based index
/// of the segment in the source (so numbering can skip), and the source file
/// is removed. An existing sibling with that name is an error, never
/// overwritten. A file with no documents at all is removed.
pub fn split_file<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let mut documents = Vec::new();
    for (index, segment) in split_documents(&content).into_iter().enumerate() {
        if is_blank(segment) {
            continue;
        }

        let value: Value =
            serde_yaml::from_str(segment).map_err(|e| CoreError::ManifestParse {
                path: path.display().to_string(),
                segment: index + 1,
                message: e.to_string(),
            })?;

        if value.is_null() {
            continue;
        }
        documents.push((index + 1, segment));
    }

    if documents.len() == 1 {
        return Ok(vec![path.to_path_buf()]);
    }
    if documents.is_empty() {
        std::fs::remove_file(path)?;
        tracing::debug!(file = %path.display(), "removed manifest without documents");
        return Ok(Vec::new());
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    let mut parts = Vec::with_capacity(documents.len());
    for (number, segment) in documents {
        let part = parent.join(format!("{}{}-{}", PART_PREFIX, number, file_name));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part)
            .map_err(|e| {
                std::io::Error::new(e.kind(), format!("{}: {}", part.display(), e))
            })?;
        file.write_all(segment.as_bytes())?;
        parts.push(part);
    }

    std::fs::remove_file(path)?;
    tracing::debug!(file = %path.display(), parts = parts.len(), "split manifest");

    Ok(parts)
}

/// Split every YAML file under `dir`, walking in lexical path order
pub fn split_tree<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut produced = Vec::new();
    for file in manifest_files(dir)? {
        produced.extend(split_file(&file)?);
    }
    Ok(produced)
}

/// All `*.yaml` / `*.yml` files under `dir`, sorted by path
pub fn manifest_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if entry.file_type().is_file() && is_manifest(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const THREE_DOCS: &str = r#"# leading comment only
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: first # keep me
data:
  a: "1"
---

---
apiVersion: v1
kind: Secret
metadata:
  name: second
---
# just a comment
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: third
"#;

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_split_documents_raw_segments() {
        let segments = split_documents("a: 1\n---\nb: 2\n---   \nc: 3");
        assert_eq!(segments, vec!["a: 1\n", "b: 2\n", "c: 3"]);
    }

    #[test]
    fn test_separator_must_be_whole_line() {
        let segments = split_documents("a: '---'\nb: --- x\n");
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_split_discards_blank_and_comment_segments() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("f.yaml");
        std::fs::write(&source, THREE_DOCS).unwrap();

        let parts = split_file(&source).unwrap();

        assert_eq!(parts.len(), 3);
        assert!(!source.exists());
        assert_eq!(file_names(&parts), vec!["part2-f.yaml", "part4-f.yaml", "part6-f.yaml"]);

        // Exactly three files in the directory, nothing spurious
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_split_round_trip_preserves_structure() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("f.yaml");
        std::fs::write(&source, THREE_DOCS).unwrap();

        let parts = split_file(&source).unwrap();
        let expected: Vec<Value> = split_documents(THREE_DOCS)
            .into_iter()
            .filter(|s| !is_blank(s))
            .map(|s| serde_yaml::from_str::<Value>(s).unwrap())
            .collect();

        let decoded: Vec<Value> = parts
            .iter()
            .map(|p| serde_yaml::from_str(&std::fs::read_to_string(p).unwrap()).unwrap())
            .collect();

        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_split_keeps_comments_verbatim() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("f.yaml");
        std::fs::write(&source, THREE_DOCS).unwrap();

        let parts = split_file(&source).unwrap();
        let first = std::fs::read_to_string(&parts[0]).unwrap();
        assert!(first.contains("name: first # keep me"));
    }

    #[test]
    fn test_single_document_returns_original_path() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("svc.yaml");
        let content = "---\n# comment\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web\n";
        std::fs::write(&source, content).unwrap();

        let parts = split_file(&source).unwrap();

        assert_eq!(parts, vec![source.clone()]);
        assert_eq!(std::fs::read_to_string(&source).unwrap(), content);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_single_document_file_decodes_after_split() {
        let service = "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n";
        for content in [
            format!("---\n# comment\n---\n{service}"),
            format!("{service}---\n# trailing comment\n"),
            format!("{service}---\n"),
        ] {
            let dir = TempDir::new().unwrap();
            let source = dir.path().join("svc.yaml");
            std::fs::write(&source, &content).unwrap();

            let parts = split_file(&source).unwrap();
            assert_eq!(parts, vec![source.clone()]);

            let obj = ManifestObject::from_file(&parts[0]).unwrap();
            assert_eq!(obj.kind, "Service", "{content:?}");
            assert_eq!(obj.name, "web");
        }
    }

    #[test]
    fn test_parse_rejects_two_documents() {
        let err = ManifestObject::parse("kind: A\n---\nkind: B\n", Path::new("two.yaml"))
            .unwrap_err();
        assert!(matches!(err, CoreError::ManifestDecode { .. }));
    }

    #[test]
    fn test_split_never_overwrites_existing_part() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("f.yaml");
        std::fs::write(&source, "kind: A\n---\nkind: B\n").unwrap();
        let taken = dir.path().join("part2-f.yaml");
        std::fs::write(&taken, "kind: Existing\n").unwrap();

        let err = split_file(&source).unwrap_err();

        assert!(matches!(err, CoreError::Io(_)), "got {err:?}");
        assert_eq!(std::fs::read_to_string(&taken).unwrap(), "kind: Existing\n");
        assert!(source.exists());
    }

    #[test]
    fn test_file_without_documents_is_removed() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("empty.yaml");
        std::fs::write(&source, "# nothing\n---\n\n---\n").unwrap();

        let parts = split_file(&source).unwrap();

        assert!(parts.is_empty());
        assert!(!source.exists());
    }

    #[test]
    fn test_split_invalid_segment_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("bad.yaml");
        std::fs::write(&source, "kind: ConfigMap\n---\nkey: [unclosed\n").unwrap();

        let err = split_file(&source).unwrap_err();
        match err {
            CoreError::ManifestParse { segment, .. } => assert_eq!(segment, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_split_tree_is_lexically_ordered() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("chart").join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("b.yaml"), "kind: A\n---\nkind: B\n").unwrap();
        std::fs::write(templates.join("a.yaml"), "kind: C\n").unwrap();
        std::fs::write(templates.join("NOTES.txt"), "not yaml: [").unwrap();

        let produced = split_tree(dir.path()).unwrap();
        assert_eq!(file_names(&produced), vec!["a.yaml", "part1-b.yaml", "part2-b.yaml"]);
    }

    #[test]
    fn test_manifest_object_accessors() {
        let obj = ManifestObject::parse(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n  labels:\n    app: web\n  annotations:\n    helm.sh/hook: pre-install\n",
            Path::new("cfg.yaml"),
        )
        .unwrap();

        assert_eq!(obj.kind, "ConfigMap");
        assert_eq!(obj.name, "cfg");
        assert_eq!(obj.label("app"), Some("web"));
        assert_eq!(obj.annotation("helm.sh/hook"), Some("pre-install"));
        assert_eq!(obj.annotation("missing"), None);
    }

    #[test]
    fn test_labeling_preserves_field_order() {
        let source = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n  labels:\n    zeta: z\n    alpha: a\ndata:\n  z: last\n  a: first\n";
        let mut obj = ManifestObject::parse(source, Path::new("cfg.yaml")).unwrap();

        obj.set_label("zeta", "updated");
        obj.set_label("new", "n");
        obj.set_annotation("note", "x");

        let encoded = obj.to_yaml().unwrap();
        let reparsed: Value = serde_yaml::from_str(&encoded).unwrap();

        let top: Vec<&str> = reparsed
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(top, vec!["apiVersion", "kind", "metadata", "data"]);

        let labels: Vec<&str> = reparsed["metadata"]["labels"]
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["zeta", "alpha", "new"]);
        assert_eq!(reparsed["metadata"]["labels"]["zeta"], Value::from("updated"));

        let data: Vec<&str> = reparsed["data"]
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap())
            .collect();
        assert_eq!(data, vec!["z", "a"]);
    }

    #[test]
    fn test_labels_created_when_absent_or_null() {
        let mut obj =
            ManifestObject::parse("kind: Service\nmetadata:\n  labels:\n", Path::new("s.yaml"))
                .unwrap();
        obj.set_label("release", "web");
        assert_eq!(obj.label("release"), Some("web"));

        let mut bare = ManifestObject::parse("kind: Service\n", Path::new("s.yaml")).unwrap();
        bare.set_annotation("chart", "nginx");
        assert_eq!(bare.annotation("chart"), Some("nginx"));
    }

    #[test]
    fn test_non_mapping_document_is_decode_error() {
        let err = ManifestObject::parse("- a\n- b\n", Path::new("list.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ManifestDecode { .. }));
    }
}
