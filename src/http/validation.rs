//! Validation contracts.
//!
//! The rule engine itself lives outside this crate; requests only assemble
//! the input data and hand it to whatever [`Validation`] the router was
//! configured with.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::Result;
use crate::http::context::Context;
use crate::http::value::Value;

/// Field name to rule string (e.g. `"required|max:20"`).
pub type Rules = HashMap<String, String>;

/// Input handed to the rule engine, keyed by top-level field name.
pub type ValidationData = BTreeMap<String, Value>;

/// Failed rules per field: field -> rule -> message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, BTreeMap<String, String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) {
        self.0
            .entry(field.into())
            .or_default()
            .insert(rule.into(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// All failed rules for one field.
    pub fn get(&self, field: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(field)
    }

    /// First message for `field`, or the first message overall when `field` is `None`.
    pub fn one(&self, field: Option<&str>) -> Option<&str> {
        let rules = match field {
            Some(field) => self.0.get(field)?,
            None => self.0.values().next()?,
        };
        rules.values().next().map(String::as_str)
    }

    pub fn all(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.0
    }
}

/// Custom messages and attribute names forwarded to the engine.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    pub messages: HashMap<String, String>,
    pub attributes: HashMap<String, String>,
}

/// Outcome of running a rule set over request data.
pub trait Validator: Send {
    fn errors(&self) -> &ValidationErrors;

    fn fails(&self) -> bool {
        !self.errors().is_empty()
    }
}

/// A rule engine able to build validators.
pub trait Validation: Send + Sync {
    fn make(&self, data: ValidationData, rules: &Rules, options: ValidationOptions) -> Result<Box<dyn Validator>>;
}

/// A request type that declares its own authorization and rules.
pub trait FormRequest: Send + Sync {
    fn authorize(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    fn rules(&self, ctx: &Context) -> Rules;

    fn messages(&self, _ctx: &Context) -> HashMap<String, String> {
        HashMap::new()
    }

    fn attributes(&self, _ctx: &Context) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Adjust the input before the rules run.
    fn prepare_for_validation(&self, _ctx: &Context, _data: &mut ValidationData) {}
}
