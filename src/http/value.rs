//! Tagged values for decoded request bodies and key-path resolution.
//!
//! # Responsibilities
//! - Represent decoded JSON / form / multipart data as one nested model
//! - Resolve dot-delimited key paths with `key[]` fallback
//! - Render any value as the string form handlers read through `input`
//!
//! # Design Decisions
//! - Maps are ordered (`BTreeMap`) so rendered JSON is deterministic
//! - Resolution is total: every miss or shape mismatch yields `None`
//! - Uploaded files are opaque handles carried inside the same tree

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use axum::body::Bytes;

/// A file received in a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Form field the file was submitted under.
    pub field: String,
    /// Client supplied file name.
    pub filename: String,
    /// Declared content type of the part, if any.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub data: Bytes,
}

impl UploadedFile {
    /// Size of the uploaded contents in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lower-cased extension taken from the client file name.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.filename.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }
}

/// One node of a decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    File(UploadedFile),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Value::File(file) => Some(file),
            _ => None,
        }
    }

    /// Converts to a JSON value. Files are represented by their file name.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::File(file) => serde_json::Value::String(file.filename.clone()),
        }
    }

    /// Flattens the value into a list of strings.
    ///
    /// Arrays yield one entry per element, an empty string yields an empty
    /// list, and every other value yields a single rendered entry.
    pub fn to_string_vec(&self) -> Vec<String> {
        match self {
            Value::Null => Vec::new(),
            Value::String(s) if s.is_empty() => Vec::new(),
            Value::Array(items) => items.iter().map(Value::to_string).collect(),
            other => vec![other.to_string()],
        }
    }

    /// Renders a map value as string pairs. Non-map values yield an empty map.
    pub fn to_string_map(&self) -> HashMap<String, String> {
        match self {
            Value::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.to_string())).collect(),
            _ => HashMap::new(),
        }
    }
}

/// String coercion used by `input`: maps render as JSON, arrays as
/// comma-joined elements, scalars as their plain text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Map(_) => write!(f, "{}", self.to_json()),
            Value::File(file) => f.write_str(&file.filename),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Self {
        Value::Array(values.into_iter().map(Value::String).collect())
    }
}

/// Top-level decoded request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBody(BTreeMap<String, Value>);

impl ParsedBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Top-level lookup without path traversal or bracket fallback.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Resolves a dot-delimited key path.
    ///
    /// Each segment is looked up literally, then as `segment[]`. Inside an
    /// array a segment must parse as an index. Descending into a scalar,
    /// a non-numeric array segment, or an out-of-range index is a miss.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = lookup(&self.0, segments.next()?)?;

        for segment in segments {
            current = match current {
                Value::Map(map) => lookup(map, segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}

impl FromIterator<(String, Value)> for ParsedBody {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ParsedBody {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn lookup<'a>(map: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| map.get(&format!("{}[]", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_body(raw: &str) -> ParsedBody {
        match Value::from(serde_json::from_str::<serde_json::Value>(raw).unwrap()) {
            Value::Map(map) => map.into_iter().collect(),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_path_and_map_rendering() {
        let body = json_body(r#"{"a":{"b":"c"}}"#);

        assert_eq!(body.resolve("a.b").unwrap().to_string(), "c");
        assert_eq!(body.resolve("a").unwrap().to_string(), r#"{"b":"c"}"#);
    }

    #[test]
    fn test_bracket_suffix_fallback() {
        let mut body = ParsedBody::new();
        body.insert("name[]", vec!["x".to_string(), "y".to_string()]);

        assert_eq!(body.resolve("name[]").unwrap().to_string(), "x,y");
        assert_eq!(body.resolve("name").unwrap().to_string(), "x,y");
        assert_eq!(body.resolve("name.0").unwrap().to_string(), "x");
        assert_eq!(body.resolve("name[].0").unwrap().to_string(), "x");
        assert_eq!(body.resolve("name.1").unwrap().to_string(), "y");
    }

    #[test]
    fn test_literal_key_wins_over_bracket_key() {
        let mut body = ParsedBody::new();
        body.insert("tag", "literal");
        body.insert("tag[]", vec!["a".to_string()]);

        assert_eq!(body.resolve("tag").unwrap().to_string(), "literal");
    }

    #[test]
    fn test_array_index_misses() {
        let body = json_body(r#"{"list":["a","b"],"users":[{"name":"ann"}]}"#);

        assert!(body.resolve("list.2").is_none());
        assert!(body.resolve("list.-1").is_none());
        assert!(body.resolve("list.first").is_none());
        assert_eq!(body.resolve("users.0.name").unwrap().to_string(), "ann");
        assert!(body.resolve("users.1.name").is_none());
    }

    #[test]
    fn test_resolution_is_total() {
        let body = json_body(r#"{"s":"x","n":1,"b":true,"z":null,"m":{},"l":[]}"#);

        for path in [
            "", ".", "s.x", "n.0", "b.c", "z.y", "m.k", "m.k.j", "l.0", "l.0.x", "missing", "missing.x",
        ] {
            assert!(body.resolve(path).is_none(), "path {:?} should miss", path);
        }
        assert!(body.resolve("z").unwrap().is_null());
    }

    #[test]
    fn test_scalar_rendering() {
        let body = json_body(r#"{"n":12,"f":1.5,"b":false,"mixed":[1,"two",{"k":"v"}]}"#);

        assert_eq!(body.resolve("n").unwrap().to_string(), "12");
        assert_eq!(body.resolve("f").unwrap().to_string(), "1.5");
        assert_eq!(body.resolve("b").unwrap().to_string(), "false");
        assert_eq!(body.resolve("mixed").unwrap().to_string(), r#"1,two,{"k":"v"}"#);
    }

    #[test]
    fn test_string_vec_and_map_views() {
        let body = json_body(r#"{"empty":"","one":"a","m":{"x":1,"y":"z"}}"#);

        assert!(body.resolve("empty").unwrap().to_string_vec().is_empty());
        assert_eq!(body.resolve("one").unwrap().to_string_vec(), vec!["a"]);

        let map = body.resolve("m").unwrap().to_string_map();
        assert_eq!(map.get("x").map(String::as_str), Some("1"));
        assert_eq!(map.get("y").map(String::as_str), Some("z"));
        assert!(body.resolve("one").unwrap().to_string_map().is_empty());
    }

    #[test]
    fn test_uploaded_file_extension() {
        let file = UploadedFile {
            field: "avatar".into(),
            filename: "Me.PNG".into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"\x89PNG"),
        };
        assert_eq!(file.extension().as_deref(), Some("png"));
        assert_eq!(file.size(), 4);
        assert_eq!(Value::File(file).to_string(), "Me.PNG");
    }
}
