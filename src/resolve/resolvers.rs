//! Named resolvers callable as `${name:arg,...}`

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::Local;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("expected {expected}, got {found} argument(s)")]
    Arity { expected: &'static str, found: usize },

    #[error("{what} must be a string")]
    NotAString { what: &'static str },

    #[error("empty variable name")]
    EmptyName,

    #[error("environment variable '{0}' is not set and has no default")]
    Unset(String),

    #[error("invalid time format '{0}'")]
    InvalidFormat(String),
}

pub type ResolverFn = fn(&[Value]) -> Result<Value, ResolverError>;

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Explicit table of resolvers; nothing is looked up dynamically.
#[derive(Clone)]
pub struct ResolverRegistry {
    resolvers: BTreeMap<String, ResolverFn>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("oc.env", env_resolver);
        registry.register("now", now_resolver);
        registry
    }
}

impl ResolverRegistry {
    pub fn empty() -> Self {
        Self { resolvers: BTreeMap::new() }
    }

    pub fn register(&mut self, name: &str, resolver: ResolverFn) {
        self.resolvers.insert(name.to_string(), resolver);
    }

    pub fn get(&self, name: &str) -> Option<ResolverFn> {
        self.resolvers.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }
}

fn string_arg<'v>(
    args: &'v [Value],
    index: usize,
    what: &'static str,
) -> Result<Option<&'v str>, ResolverError> {
    match args.get(index) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ResolverError::NotAString { what }),
    }
}

/// `${oc.env:NAME}` or `${oc.env:NAME,default}`.
fn env_resolver(args: &[Value]) -> Result<Value, ResolverError> {
    if args.is_empty() || args.len() > 2 {
        return Err(ResolverError::Arity {
            expected: "a variable name and an optional default",
            found: args.len(),
        });
    }
    let name = string_arg(args, 0, "variable name")?.unwrap_or_default();
    if name.is_empty() {
        return Err(ResolverError::EmptyName);
    }
    match std::env::var(name) {
        Ok(value) => Ok(Value::String(value)),
        Err(_) => args
            .get(1)
            .cloned()
            .ok_or_else(|| ResolverError::Unset(name.to_string())),
    }
}

/// `${now:%Y-%m-%d}`: local time formatted with strftime syntax.
fn now_resolver(args: &[Value]) -> Result<Value, ResolverError> {
    if args.len() > 1 {
        return Err(ResolverError::Arity { expected: "at most one format", found: args.len() });
    }
    let format = string_arg(args, 0, "format")?.filter(|f| !f.is_empty()).unwrap_or(DEFAULT_TIME_FORMAT);
    let mut out = String::new();
    write!(out, "{}", Local::now().format(format))
        .map_err(|_| ResolverError::InvalidFormat(format.to_string()))?;
    Ok(Value::String(out))
}
