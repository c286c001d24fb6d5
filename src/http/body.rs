//! Content-type driven request body decoding.
//!
//! # Responsibilities
//! - Decode JSON, url-encoded and multipart bodies into a [`ParsedBody`]
//! - Leave other content types untouched for direct binding
//!
//! # Design Decisions
//! - Bodies arrive fully buffered, so decoding never performs I/O and the
//!   raw bytes stay available for a later `bind`
//! - Repeated form fields become arrays, single fields stay scalar strings
//! - Multipart decoding drives `multer` over an in-memory stream; the stream
//!   is always ready so the decode completes on its first poll

use std::collections::BTreeMap;

use axum::body::Bytes;
use futures_util::FutureExt;

use crate::error::{Error, Result};
use crate::http::value::{ParsedBody, UploadedFile, Value};

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const MULTIPART: &str = "multipart/form-data";

/// Decodes buffered request bodies by content type.
pub struct BodyParser;

impl BodyParser {
    /// Parse a buffered body according to its `Content-Type` header.
    ///
    /// An absent or empty body yields an empty result, as does any content
    /// type other than JSON, url-encoded form or multipart form.
    pub fn parse(content_type: Option<&str>, body: &Bytes) -> Result<ParsedBody> {
        if body.is_empty() {
            return Ok(ParsedBody::default());
        }

        let Some(content_type) = content_type else {
            return Ok(ParsedBody::default());
        };

        match media_type(content_type).as_str() {
            JSON => parse_json(body),
            FORM => Ok(parse_form(body)),
            MULTIPART => parse_multipart(content_type, body),
            _ => Ok(ParsedBody::default()),
        }
    }
}

/// Media type without parameters, lower-cased (`text/html; charset=utf-8` -> `text/html`).
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn parse_json(body: &Bytes) -> Result<ParsedBody> {
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| Error::body(JSON, e))?;

    Ok(object.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

fn parse_form(body: &Bytes) -> ParsedBody {
    let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        fields.entry(key.into_owned()).or_default().push(value.into_owned());
    }

    fields.into_iter().map(|(k, v)| (k, collapse(v))).collect()
}

fn parse_multipart(content_type: &str, body: &Bytes) -> Result<ParsedBody> {
    let boundary = multer::parse_boundary(content_type).map_err(|e| Error::body(MULTIPART, e))?;
    let stream = futures_util::stream::iter([Ok::<Bytes, std::io::Error>(body.clone())]);
    let mut multipart = multer::Multipart::new(stream, boundary);

    let decode = async move {
        let mut texts: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut files: BTreeMap<String, Vec<UploadedFile>> = BTreeMap::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(|m| m.to_string());
                    let data = field.bytes().await?;
                    files.entry(name.clone()).or_default().push(UploadedFile {
                        field: name,
                        filename,
                        content_type,
                        data,
                    });
                }
                None => {
                    let text = field.text().await?;
                    texts.entry(name).or_default().push(text);
                }
            }
        }

        Ok::<_, multer::Error>((texts, files))
    };

    let (texts, files) = decode
        .now_or_never()
        .ok_or_else(|| Error::body(MULTIPART, "multipart stream did not complete"))?
        .map_err(|e| Error::body(MULTIPART, e))?;

    let mut parsed: ParsedBody = texts.into_iter().map(|(k, v)| (k, collapse(v))).collect();
    for (name, mut uploads) in files {
        let value = if uploads.len() == 1 {
            Value::File(uploads.remove(0))
        } else {
            Value::Array(uploads.into_iter().map(Value::File).collect())
        };
        parsed.insert(name, value);
    }

    Ok(parsed)
}

fn collapse(mut values: Vec<String>) -> Value {
    if values.len() == 1 {
        Value::String(values.remove(0))
    } else {
        Value::from(values)
    }
}
