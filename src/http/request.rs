//! Read accessors over route params, query string and parsed body.
//!
//! # Responsibilities
//! - Decode the query string and body once per request ([`RequestData`])
//! - Resolve `input` lookups with body > query > route > default precedence
//! - Coerce values to integers and booleans without surfacing parse errors
//! - Bind the buffered body or query into typed structs
//! - Assemble validation input and hand it to the configured engine
//!
//! # Design Decisions
//! - A malformed body is logged and treated as empty; the request proceeds
//! - An explicit `Null` in the body counts as absent so lookups fall through
//! - Numeric accessors fall back to the default (or zero) on absence and on
//!   parse failure alike

use std::collections::{BTreeMap, HashMap};

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::http::body::{self, BodyParser};
use crate::http::context::{Context, RequestSource};
use crate::http::validation::{FormRequest, Rules, ValidationData, ValidationErrors, ValidationOptions, Validator};
use crate::http::value::{ParsedBody, UploadedFile, Value};

const TRUTHY: [&str; 4] = ["1", "true", "on", "yes"];

/// Decoded request inputs, built lazily on first access and memoized.
#[derive(Debug, Default)]
pub(crate) struct RequestData {
    body: ParsedBody,
    query: BTreeMap<String, Vec<String>>,
}

impl RequestData {
    pub(crate) fn build(source: &RequestSource) -> Self {
        let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(raw) = source.parts.uri.query() {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                query.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }

        let content_type = source
            .parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let body = match BodyParser::parse(content_type, &source.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    method = %source.parts.method,
                    path = %source.parts.uri.path(),
                    error = %e,
                    "Request body could not be parsed, treating it as empty"
                );
                ParsedBody::default()
            }
        };

        Self { body, query }
    }
}

/// Request accessors for one in-flight request.
pub struct RequestView<'a> {
    ctx: &'a Context,
    data: &'a RequestData,
}

impl<'a> RequestView<'a> {
    pub(crate) fn new(ctx: &'a Context, data: &'a RequestData) -> Self {
        Self { ctx, data }
    }

    fn source(&self) -> &'a RequestSource {
        self.ctx.source()
    }

    pub fn method(&self) -> &'a Method {
        &self.source().parts.method
    }

    pub fn path(&self) -> &'a str {
        self.source().parts.uri.path()
    }

    /// Path plus query string as received.
    pub fn url(&self) -> &'a str {
        let uri = &self.source().parts.uri;
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path())
    }

    /// Absolute URL, or an empty string when the host is unknown.
    pub fn full_url(&self) -> String {
        let host = self.host();
        if host.is_empty() {
            return String::new();
        }
        let scheme = self.source().parts.uri.scheme_str().unwrap_or("http");
        format!("{}://{}{}", scheme, host, self.url())
    }

    pub fn host(&self) -> &'a str {
        let parts = &self.source().parts;
        parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default()
    }

    /// Client address, honouring `X-Forwarded-For` and `X-Real-IP`.
    pub fn ip(&self) -> String {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
        if let Some(ip) = self.header("x-real-ip").map(str::trim).filter(|v| !v.is_empty()) {
            return ip.to_string();
        }
        self.source()
            .remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    pub fn header(&self, key: &str) -> Option<&'a str> {
        self.source().parts.headers.get(key).and_then(|v| v.to_str().ok())
    }

    pub fn header_or(&self, key: &str, default: &str) -> String {
        self.header(key).unwrap_or(default).to_string()
    }

    pub fn headers(&self) -> &'a HeaderMap {
        &self.source().parts.headers
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.source()
            .parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| cookie::Cookie::split_parse_encoded(v))
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_string())
    }

    pub fn cookie_or(&self, name: &str, default: &str) -> String {
        self.cookie(name).unwrap_or_else(|| default.to_string())
    }

    /// First query value for `key`.
    pub fn query(&self, key: &str) -> Option<&'a str> {
        self.data.query.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn query_or(&self, key: &str, default: &str) -> String {
        self.query(key).unwrap_or(default).to_string()
    }

    pub fn query_int(&self, key: &str) -> i32 {
        self.query_int_or(key, 0)
    }

    pub fn query_int_or(&self, key: &str, default: i32) -> i32 {
        parse_or(self.query(key), default)
    }

    pub fn query_int64(&self, key: &str) -> i64 {
        self.query_int64_or(key, 0)
    }

    pub fn query_int64_or(&self, key: &str, default: i64) -> i64 {
        parse_or(self.query(key), default)
    }

    pub fn query_bool(&self, key: &str) -> bool {
        self.query_bool_or(key, false)
    }

    pub fn query_bool_or(&self, key: &str, default: bool) -> bool {
        self.query(key).map(is_truthy).unwrap_or(default)
    }

    /// Every value given for `key`.
    pub fn query_array(&self, key: &str) -> Vec<String> {
        self.data.query.get(key).cloned().unwrap_or_default()
    }

    /// Values submitted as `key[sub]=value`, keyed by `sub`.
    pub fn query_map(&self, key: &str) -> HashMap<String, String> {
        self.data
            .query
            .iter()
            .filter_map(|(name, values)| {
                let sub = name.strip_prefix(key)?.strip_prefix('[')?.strip_suffix(']')?;
                Some((sub.to_string(), values.first()?.clone()))
            })
            .collect()
    }

    /// All query parameters, repeated values comma-joined.
    pub fn queries(&self) -> HashMap<String, String> {
        self.data
            .query
            .iter()
            .map(|(k, v)| (k.clone(), v.join(",")))
            .collect()
    }

    /// Route parameter, or an empty string when the route has none by that name.
    pub fn route(&self, key: &str) -> &'a str {
        self.route_param(key).unwrap_or_default()
    }

    pub fn route_int(&self, key: &str) -> i32 {
        parse_or(self.route_param(key), 0)
    }

    pub fn route_int64(&self, key: &str) -> i64 {
        parse_or(self.route_param(key), 0)
    }

    fn route_param(&self, key: &str) -> Option<&'a str> {
        self.source()
            .params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Body value, then query value, then route parameter.
    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(value) = self.body_value(key) {
            return Some(value.to_string());
        }
        self.query(key)
            .or_else(|| self.route_param(key))
            .map(str::to_string)
    }

    fn body_value(&self, key: &str) -> Option<&'a Value> {
        self.data.body.resolve(key).filter(|v| !v.is_null())
    }

    pub fn input(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    pub fn input_or(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }

    pub fn input_array(&self, key: &str) -> Vec<String> {
        self.input_array_or(key, Vec::new())
    }

    pub fn input_array_or(&self, key: &str, default: Vec<String>) -> Vec<String> {
        if let Some(value) = self.body_value(key) {
            return value.to_string_vec();
        }
        if let Some(values) = self.data.query.get(key) {
            if values.len() == 1 && values[0].is_empty() {
                return Vec::new();
            }
            return values.clone();
        }
        if let Some(value) = self.route_param(key) {
            return value.split(',').map(str::to_string).collect();
        }
        default
    }

    pub fn input_map(&self, key: &str) -> HashMap<String, String> {
        self.input_map_or(key, HashMap::new())
    }

    pub fn input_map_or(&self, key: &str, default: HashMap<String, String>) -> HashMap<String, String> {
        if let Some(value) = self.body_value(key) {
            return value.to_string_map();
        }
        let from_query = self.query_map(key);
        if !from_query.is_empty() {
            return from_query;
        }
        default
    }

    pub fn input_int(&self, key: &str) -> i32 {
        self.input_int_or(key, 0)
    }

    pub fn input_int_or(&self, key: &str, default: i32) -> i32 {
        parse_or(self.lookup(key).as_deref(), default)
    }

    pub fn input_int64(&self, key: &str) -> i64 {
        self.input_int64_or(key, 0)
    }

    pub fn input_int64_or(&self, key: &str, default: i64) -> i64 {
        parse_or(self.lookup(key).as_deref(), default)
    }

    pub fn input_bool(&self, key: &str) -> bool {
        self.input_bool_or(key, false)
    }

    /// `default` applies only when no source carries `key`.
    pub fn input_bool_or(&self, key: &str, default: bool) -> bool {
        match self.lookup(key) {
            Some(value) => is_truthy(&value),
            None => default,
        }
    }

    /// Route params, then query values, then top-level body keys; later
    /// sources overwrite earlier ones.
    pub fn all(&self) -> BTreeMap<String, Value> {
        let mut merged: BTreeMap<String, Value> = self
            .source()
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        for (key, values) in &self.data.query {
            merged.insert(key.clone(), Value::String(values.join(",")));
        }
        for (key, value) in self.data.body.iter() {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    fn media_type(&self) -> String {
        self.header(header::CONTENT_TYPE.as_str()).map(body::media_type).unwrap_or_default()
    }

    /// Posted form field from a url-encoded or multipart body. Repeated
    /// fields yield their first value; other content types yield `None`.
    pub fn form(&self, key: &str) -> Option<String> {
        if !matches!(self.media_type().as_str(), body::FORM | body::MULTIPART) {
            return None;
        }
        match self.data.body.get(key)? {
            Value::Array(items) => items.iter().find(|v| v.as_file().is_none()).map(ToString::to_string),
            Value::File(_) | Value::Null => None,
            value => Some(value.to_string()),
        }
    }

    pub fn form_or(&self, key: &str, default: &str) -> String {
        self.form(key).unwrap_or_else(|| default.to_string())
    }

    /// Top-level key of a JSON body, rendered as `input` renders it.
    /// Other content types yield `None`.
    pub fn json(&self, key: &str) -> Option<String> {
        if self.media_type() != body::JSON {
            return None;
        }
        self.data.body.get(key).filter(|v| !v.is_null()).map(ToString::to_string)
    }

    pub fn json_or(&self, key: &str, default: &str) -> String {
        self.json(key).unwrap_or_else(|| default.to_string())
    }

    pub fn body(&self) -> &'a ParsedBody {
        &self.data.body
    }

    /// The buffered body bytes, untouched by parsing.
    pub fn raw_body(&self) -> &'a Bytes {
        &self.source().body
    }

    /// First file uploaded under `name`.
    pub fn file(&self, name: &str) -> Result<UploadedFile> {
        self.files(name)
            .into_iter()
            .next()
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    pub fn files(&self, name: &str) -> Vec<UploadedFile> {
        match self.data.body.resolve(name) {
            Some(Value::File(file)) => vec![file.clone()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_file).cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Deserialize the body according to its content type. A request
    /// without a body binds from the query string.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.raw_body();
        if raw.is_empty() {
            return self.bind_query();
        }

        match self.media_type().as_str() {
            body::JSON => serde_json::from_slice(raw).map_err(|e| Error::Bind(e.to_string())),
            body::FORM => serde_urlencoded::from_bytes(raw).map_err(|e| Error::Bind(e.to_string())),
            body::MULTIPART => serde_json::from_value(self.data.body.to_json()).map_err(|e| Error::Bind(e.to_string())),
            other => Err(Error::Bind(format!("unsupported content type {:?}", other))),
        }
    }

    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self.source().parts.uri.query().unwrap_or_default();
        serde_urlencoded::from_str(raw).map_err(|e| Error::Bind(e.to_string()))
    }

    pub fn abort_with_status(&self, status: StatusCode) -> Response {
        status.into_response()
    }

    pub fn abort_with_status_json<T: Serialize>(&self, status: StatusCode, value: &T) -> Response {
        self.ctx.response().json(status, value)
    }

    /// Run `rules` over the request inputs with the configured engine.
    pub fn validate(&self, rules: &Rules) -> Result<Box<dyn Validator>> {
        self.validate_with(rules, ValidationOptions::default())
    }

    pub fn validate_with(&self, rules: &Rules, options: ValidationOptions) -> Result<Box<dyn Validator>> {
        self.run_validation(rules, self.validation_data(), options)
    }

    /// Authorize, prepare and validate a [`FormRequest`].
    pub fn validate_request(&self, request: &dyn FormRequest) -> Result<ValidationErrors> {
        request.authorize(self.ctx)?;

        let rules = request.rules(self.ctx);
        let options = ValidationOptions {
            messages: request.messages(self.ctx),
            attributes: request.attributes(self.ctx),
        };
        let mut data = self.validation_data();
        request.prepare_for_validation(self.ctx, &mut data);

        let validator = self.run_validation(&rules, data, options)?;
        Ok(validator.errors().clone())
    }

    fn run_validation(
        &self,
        rules: &Rules,
        data: ValidationData,
        options: ValidationOptions,
    ) -> Result<Box<dyn Validator>> {
        if rules.is_empty() {
            return Err(Error::EmptyRules);
        }
        let engine = self.ctx.validation().ok_or(Error::ValidationUnavailable)?;
        engine.make(data, rules, options)
    }

    /// Body fields, then query values and route params for keys the body lacks.
    fn validation_data(&self) -> ValidationData {
        let mut data: ValidationData = self
            .data
            .body
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, values) in &self.data.query {
            data.entry(key.clone())
                .or_insert_with(|| Value::String(values.join(",")));
        }
        for (key, value) in &self.source().params {
            data.entry(key.clone()).or_insert_with(|| Value::from(value.as_str()));
        }
        data
    }
}

fn is_truthy(value: &str) -> bool {
    TRUTHY.contains(&value)
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use serde::Deserialize;

    use super::*;
    use crate::http::context::ContextInner;
    use crate::http::validation::Validation;

    fn context(method: &str, uri: &str, content_type: Option<&str>, body: &str, params: &[(&str, &str)]) -> Context {
        let mut builder = Request::builder().method(method).uri(uri).header(header::HOST, "example.com");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let request = builder.body(Bytes::from(body.to_string())).unwrap();
        let params = params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Context::from_request(request, params)
    }

    #[test]
    fn test_form_reads_only_posted_fields() {
        let ctx = context("POST", "/?q=query", Some(body::FORM), "name=ann&tag=a&tag=b", &[("id", "1")]);
        let req = ctx.request();

        assert_eq!(req.form("name").as_deref(), Some("ann"));
        assert_eq!(req.form("tag").as_deref(), Some("a"));
        assert_eq!(req.form("q"), None);
        assert_eq!(req.form_or("id", "none"), "none");

        let json = context("POST", "/", Some(body::JSON), r#"{"name":"ann"}"#, &[]);
        assert_eq!(json.request().form("name"), None);
    }

    #[test]
    fn test_json_reads_top_level_keys() {
        let ctx = context(
            "POST",
            "/?name=query",
            Some("application/json; charset=utf-8"),
            r#"{"name":"ann","age":30,"address":{"city":"Oslo"},"gone":null}"#,
            &[],
        );
        let req = ctx.request();

        assert_eq!(req.json("name").as_deref(), Some("ann"));
        assert_eq!(req.json("age").as_deref(), Some("30"));
        assert_eq!(req.json("address").as_deref(), Some(r#"{"city":"Oslo"}"#));
        assert_eq!(req.json_or("gone", "d"), "d");
        assert_eq!(req.json_or("missing", "d"), "d");

        let form = context("POST", "/", Some(body::FORM), "name=ann", &[]);
        assert_eq!(form.request().json_or("name", "d"), "d");
    }

    #[test]
    fn test_input_precedence_body_query_route_default() {
        let ctx = context(
            "POST",
            "/users/7?name=query&page=2",
            Some(body::JSON),
            r#"{"name":"body","gone":null}"#,
            &[("name", "route"), ("id", "7")],
        );
        let req = ctx.request();

        assert_eq!(req.input("name"), "body");
        assert_eq!(req.input("page"), "2");
        assert_eq!(req.input("id"), "7");
        assert_eq!(req.input_or("missing", "fallback"), "fallback");
        assert_eq!(req.input("missing"), "");
        // Null in the body does not shadow other sources.
        assert_eq!(req.input_or("gone", "d"), "d");
    }

    #[test]
    fn test_input_is_stable_across_calls() {
        let ctx = context("POST", "/?a=1", Some(body::JSON), r#"{"a":{"b":[1,2]}}"#, &[]);
        let first = ctx.request().input("a");
        let second = ctx.request().input("a");

        assert_eq!(first, r#"{"b":[1,2]}"#);
        assert_eq!(first, second);
        assert_eq!(ctx.request().input("a.b"), "1,2");
    }

    #[test]
    fn test_bool_coercion_table() {
        let ctx = context(
            "GET",
            "/?a=1&b=true&c=on&d=yes&e=0&f=&g=maybe&h=TRUE",
            None,
            "",
            &[],
        );
        let req = ctx.request();

        for key in ["a", "b", "c", "d"] {
            assert!(req.input_bool(key), "{} should be true", key);
        }
        for key in ["e", "f", "g", "h"] {
            assert!(!req.input_bool(key), "{} should be false", key);
        }
        // Defaults apply only to absent keys.
        assert!(req.input_bool_or("absent", true));
        assert!(!req.input_bool_or("f", true));
        assert!(req.query_bool("a"));
    }

    #[test]
    fn test_numeric_coercion_falls_back_to_default() {
        let ctx = context("POST", "/?n=12&bad=x", Some(body::JSON), r#"{"big":9000000000,"f":1.5}"#, &[("id", "42")]);
        let req = ctx.request();

        assert_eq!(req.input_int("n"), 12);
        assert_eq!(req.input_int("bad"), 0);
        assert_eq!(req.input_int_or("bad", 5), 5);
        assert_eq!(req.input_int_or("absent", 9), 9);
        assert_eq!(req.input_int64("big"), 9_000_000_000);
        assert_eq!(req.input_int("big"), 0);
        assert_eq!(req.input_int("f"), 0);
        assert_eq!(req.query_int64_or("n", 1), 12);
        assert_eq!(req.route_int("id"), 42);
        assert_eq!(req.route_int64("missing"), 0);
    }

    #[test]
    fn test_input_array_and_map() {
        let ctx = context(
            "POST",
            "/?tags=a&tags=b&blank=&filter[name]=ann&filter[age]=3",
            Some(body::FORM),
            "ids[]=1&ids[]=2",
            &[("csv", "x,y")],
        );
        let req = ctx.request();

        assert_eq!(req.input_array("ids"), vec!["1", "2"]);
        assert_eq!(req.input_array("tags"), vec!["a", "b"]);
        assert!(req.input_array("blank").is_empty());
        assert_eq!(req.input_array("csv"), vec!["x", "y"]);
        assert_eq!(req.input_array_or("none", vec!["d".into()]), vec!["d"]);

        let filter = req.input_map("filter");
        assert_eq!(filter.get("name").map(String::as_str), Some("ann"));
        assert_eq!(filter.get("age").map(String::as_str), Some("3"));
        assert!(req.input_map("none").is_empty());
    }

    #[test]
    fn test_all_merges_sources() {
        let ctx = context(
            "POST",
            "/?q=1&q=2&shared=query",
            Some(body::JSON),
            r#"{"shared":"body","n":1}"#,
            &[("shared", "route"), ("id", "5")],
        );
        let all = ctx.request().all();

        assert_eq!(all.get("id").map(ToString::to_string).as_deref(), Some("5"));
        assert_eq!(all.get("q").map(ToString::to_string).as_deref(), Some("1,2"));
        assert_eq!(all.get("shared").map(ToString::to_string).as_deref(), Some("body"));
        assert_eq!(all.get("n").map(ToString::to_string).as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_body_is_treated_as_empty() {
        let ctx = context("POST", "/?name=query", Some(body::JSON), "{not json", &[]);
        let req = ctx.request();

        assert!(req.body().is_empty());
        assert_eq!(req.input("name"), "query");
        assert_eq!(&req.raw_body()[..], b"{not json");
    }

    #[test]
    fn test_request_metadata() {
        let request = Request::builder()
            .uri("/search?q=rust")
            .header(header::HOST, "example.com")
            .header(header::COOKIE, "theme=dark; session=abc; note=a%3B%20b")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Bytes::new())
            .unwrap();
        let ctx = Context::from_request(request, Vec::new());
        let req = ctx.request();

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/search");
        assert_eq!(req.url(), "/search?q=rust");
        assert_eq!(req.full_url(), "http://example.com/search?q=rust");
        assert_eq!(req.ip(), "10.0.0.1");
        assert_eq!(req.cookie("session").as_deref(), Some("abc"));
        assert_eq!(req.cookie("note").as_deref(), Some("a; b"));
        assert_eq!(req.cookie_or("lang", "en"), "en");
        assert_eq!(req.header_or("x-missing", "d"), "d");
        assert_eq!(req.queries().get("q").map(String::as_str), Some("rust"));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_bind_json_form_and_query() {
        let ctx = context("POST", "/", Some(body::JSON), r#"{"name":"ann","age":30}"#, &[]);
        assert_eq!(ctx.request().bind::<User>().unwrap(), User { name: "ann".into(), age: 30 });
        // Parsing the body for `input` does not consume it.
        assert_eq!(ctx.request().input("name"), "ann");
        assert_eq!(ctx.request().bind::<User>().unwrap().age, 30);

        let ctx = context("POST", "/", Some(body::FORM), "name=bob&age=4", &[]);
        assert_eq!(ctx.request().bind::<User>().unwrap().name, "bob");

        let ctx = context("GET", "/?name=cy&age=5", None, "", &[]);
        assert_eq!(ctx.request().bind::<User>().unwrap().age, 5);

        let ctx = context("POST", "/", Some("text/plain"), "hi", &[]);
        assert!(matches!(ctx.request().bind::<User>(), Err(Error::Bind(_))));
    }

    #[test]
    fn test_missing_file() {
        let ctx = context("POST", "/", Some(body::JSON), r#"{"avatar":"x"}"#, &[]);
        assert!(matches!(ctx.request().file("avatar"), Err(Error::FileNotFound(_))));
        assert!(ctx.request().files("avatar").is_empty());
    }

    struct RequiredOnly;

    struct Outcome(ValidationErrors);

    impl Validator for Outcome {
        fn errors(&self) -> &ValidationErrors {
            &self.0
        }
    }

    impl Validation for RequiredOnly {
        fn make(&self, data: ValidationData, rules: &Rules, _options: ValidationOptions) -> Result<Box<dyn Validator>> {
            let mut errors = ValidationErrors::new();
            for (field, rule) in rules {
                let present = data.get(field).is_some_and(|v| !v.to_string().is_empty());
                if rule.contains("required") && !present {
                    errors.add(field.clone(), "required", format!("{} is required", field));
                }
            }
            Ok(Box::new(Outcome(errors)))
        }
    }

    fn validating_context(uri: &str, body: &str, params: &[(&str, &str)]) -> Context {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, body::JSON)
            .body(Bytes::from(body.to_string()))
            .unwrap();
        let (parts, body) = request.into_parts();
        Context::from_inner(ContextInner {
            source: RequestSource::new(parts, body, params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
            validation: Some(Arc::new(RequiredOnly)),
            ..ContextInner::default()
        })
    }

    #[test]
    fn test_validate_merges_query_and_route_for_missing_keys() {
        let ctx = validating_context("/?page=1", r#"{"name":"ann"}"#, &[("id", "3")]);
        let rules: Rules = [("name", "required"), ("page", "required"), ("id", "required"), ("email", "required")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let validator = ctx.request().validate(&rules).unwrap();
        assert!(validator.fails());
        assert!(validator.errors().has("email"));
        assert_eq!(validator.errors().all().len(), 1);
    }

    #[test]
    fn test_validate_rejects_empty_rules_and_missing_engine() {
        let ctx = validating_context("/", "{}", &[]);
        assert!(matches!(ctx.request().validate(&Rules::new()), Err(Error::EmptyRules)));

        let ctx = context("POST", "/", None, "", &[]);
        let rules: Rules = [("a".to_string(), "required".to_string())].into_iter().collect();
        assert!(matches!(ctx.request().validate(&rules), Err(Error::ValidationUnavailable)));
    }

    struct CreateUser {
        allow: bool,
    }

    impl FormRequest for CreateUser {
        fn authorize(&self, _ctx: &Context) -> Result<()> {
            if self.allow {
                Ok(())
            } else {
                Err(Error::Unauthorized("not allowed".into()))
            }
        }

        fn rules(&self, _ctx: &Context) -> Rules {
            [("name".to_string(), "required".to_string())].into_iter().collect()
        }

        fn prepare_for_validation(&self, _ctx: &Context, data: &mut ValidationData) {
            data.entry("name".into()).or_insert_with(|| Value::from("guest"));
        }
    }

    #[test]
    fn test_validate_request() {
        let ctx = validating_context("/", "{}", &[]);

        let errors = ctx.request().validate_request(&CreateUser { allow: true }).unwrap();
        assert!(errors.is_empty());

        let denied = ctx.request().validate_request(&CreateUser { allow: false });
        assert!(matches!(denied, Err(Error::Unauthorized(_))));
    }
}
