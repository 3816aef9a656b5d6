//! `${...}` interpolation over a merged tree

use std::borrow::Cow;
use std::collections::HashMap;

use serde_yaml::Value;
use thiserror::Error;

use super::resolvers::{ResolverError, ResolverRegistry};
use crate::compose::defaults::MANDATORY;
use crate::source::parse::kind_of;
use crate::utils::{key_text, split_key_path};

#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("interpolation '${{{reference}}}' at '{at}' does not resolve to any key")]
    Unresolved { reference: String, at: String },

    #[error("interpolation at '{at}' refers to '{reference}', which is still '???'")]
    MissingValue { reference: String, at: String },

    #[error("interpolation cycle: {chain}")]
    Cycle { chain: String },

    #[error("invalid interpolation '{value}' at '{at}': {reason}")]
    Syntax { value: String, at: String, reason: String },

    #[error("unknown resolver '{name}' at '{at}'")]
    UnknownResolver { name: String, at: String },

    #[error("resolver '{name}' failed at '{at}': {source}")]
    ResolverFailed {
        name: String,
        at: String,
        #[source]
        source: ResolverError,
    },

    #[error("'{reference}' used at '{at}' is {kind} and cannot be embedded in a string")]
    NotScalar { reference: String, at: String, kind: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Interp(Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Ref(String),
    Call { name: String, args: Vec<Vec<Segment>> },
}

impl Expr {
    fn label(&self) -> String {
        match self {
            Expr::Ref(path) => path.clone(),
            Expr::Call { name, .. } => format!("{name}:..."),
        }
    }
}

pub fn has_interpolation(text: &str) -> bool {
    text.contains("${")
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), pos: 0 }
    }

    fn at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn template(&mut self, stops: &[char]) -> Result<Vec<Segment>, String> {
        let mut segments = Vec::new();
        let mut text = String::new();
        while let Some(c) = self.at(0) {
            if c == '\\' && self.at(1) == Some('$') && self.at(2) == Some('{') {
                text.push_str("${");
                self.pos += 3;
            } else if c == '$' && self.at(1) == Some('{') {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                self.pos += 2;
                segments.push(Segment::Interp(self.expr()?));
            } else if stops.contains(&c) {
                break;
            } else {
                text.push(c);
                self.pos += 1;
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(segments)
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        loop {
            match self.at(0) {
                None => return Err("unterminated '${'".to_string()),
                Some(':') | Some('}') => break,
                Some('$') if self.at(1) == Some('{') => {
                    return Err("interpolation inside a key path is not supported".to_string())
                }
                Some(_) => self.pos += 1,
            }
        }
        let head: String = self.chars[start..self.pos].iter().collect::<String>().trim().to_string();
        if head.is_empty() {
            return Err("empty interpolation".to_string());
        }
        if self.at(0) == Some('}') {
            self.pos += 1;
            return Ok(Expr::Ref(head));
        }

        // Resolver call: `name:arg,arg`
        self.pos += 1;
        let mut args = Vec::new();
        loop {
            args.push(self.template(&[',', '}'])?);
            match self.at(0) {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(format!("unterminated call to resolver '{head}'")),
            }
        }
        Ok(Expr::Call { name: head, args })
    }
}

fn parse_template(text: &str) -> Result<Vec<Segment>, String> {
    let mut parser = Parser::new(text);
    let segments = parser.template(&[])?;
    Ok(segments)
}

/// Drop whitespace-only text around a resolver argument, so `a, ${b}` keeps `b` typed.
fn trim_segments(segments: &[Segment]) -> &[Segment] {
    let blank = |s: &Segment| matches!(s, Segment::Text(t) if t.trim().is_empty());
    let mut slice = segments;
    while let Some((first, rest)) = slice.split_first() {
        if !blank(first) {
            break;
        }
        slice = rest;
    }
    while let Some((last, rest)) = slice.split_last() {
        if !blank(last) {
            break;
        }
        slice = rest;
    }
    slice
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Turn `.x` / `..x` references into absolute paths, relative to the node at `at`.
fn absolute_reference(at: &str, reference: &str) -> Option<String> {
    let dots = reference.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return Some(reference.to_string());
    }
    let base = split_key_path(at);
    if dots > base.len() {
        return None;
    }
    let parent = base[..base.len() - dots].join(".");
    Some(join(&parent, &reference[dots..]))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        _ => None,
    }
}

fn child<'v>(node: &'v Value, segment: &str) -> Option<&'v Value> {
    match node {
        Value::Mapping(map) => map.get(segment),
        Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| seq.get(i)),
        _ => None,
    }
}

struct Resolution<'r> {
    root: &'r Value,
    registry: &'r ResolverRegistry,
    cache: HashMap<String, Value>,
    in_progress: Vec<String>,
}

impl<'r> Resolution<'r> {
    fn node(&mut self, path: &str, node: &Value) -> Result<Value, InterpolationError> {
        match node {
            Value::String(s) if has_interpolation(s) => self.string_at(path, s),
            Value::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(i, item)| self.node(&join(path, &i.to_string()), item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (key, value) in map {
                    let resolved = self.node(&join(path, &key_text(key)), value)?;
                    out.insert(key.clone(), resolved);
                }
                Ok(Value::Mapping(out))
            }
            Value::Tagged(tagged) => {
                let mut tagged = tagged.clone();
                tagged.value = self.node(path, &tagged.value)?;
                Ok(Value::Tagged(tagged))
            }
            other => Ok(other.clone()),
        }
    }

    fn string_at(&mut self, path: &str, text: &str) -> Result<Value, InterpolationError> {
        if let Some(done) = self.cache.get(path) {
            return Ok(done.clone());
        }
        if let Some(start) = self.in_progress.iter().position(|p| p == path) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(path.to_string());
            return Err(InterpolationError::Cycle { chain: chain.join(" -> ") });
        }

        let segments = parse_template(text).map_err(|reason| InterpolationError::Syntax {
            value: text.to_string(),
            at: path.to_string(),
            reason,
        })?;

        self.in_progress.push(path.to_string());
        let value = self.evaluate(path, &segments);
        self.in_progress.pop();

        let value = value?;
        self.cache.insert(path.to_string(), value.clone());
        Ok(value)
    }

    fn evaluate(&mut self, at: &str, segments: &[Segment]) -> Result<Value, InterpolationError> {
        if let [Segment::Interp(expr)] = segments {
            return self.expr(at, expr);
        }
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Interp(expr) => {
                    let value = self.expr(at, expr)?;
                    let text = scalar_text(&value).ok_or_else(|| InterpolationError::NotScalar {
                        reference: expr.label(),
                        at: at.to_string(),
                        kind: kind_of(&value),
                    })?;
                    out.push_str(&text);
                }
            }
        }
        Ok(Value::String(out))
    }

    fn expr(&mut self, at: &str, expr: &Expr) -> Result<Value, InterpolationError> {
        match expr {
            Expr::Ref(reference) => {
                let target = absolute_reference(at, reference).ok_or_else(|| {
                    InterpolationError::Unresolved { reference: reference.clone(), at: at.to_string() }
                })?;
                self.lookup(at, reference, &target)
            }
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let value = match self.evaluate(at, trim_segments(arg))? {
                        Value::String(s) => Value::String(s.trim().to_string()),
                        other => other,
                    };
                    values.push(value);
                }
                let resolver = self.registry.get(name).ok_or_else(|| {
                    InterpolationError::UnknownResolver { name: name.clone(), at: at.to_string() }
                })?;
                resolver(&values).map_err(|source| InterpolationError::ResolverFailed {
                    name: name.clone(),
                    at: at.to_string(),
                    source,
                })
            }
        }
    }

    /// Walk the unresolved tree to `target`, resolving interpolated nodes on the way.
    fn lookup(&mut self, at: &str, reference: &str, target: &str) -> Result<Value, InterpolationError> {
        let unresolved =
            || InterpolationError::Unresolved { reference: reference.to_string(), at: at.to_string() };
        let missing =
            || InterpolationError::MissingValue { reference: target.to_string(), at: at.to_string() };

        let mut walked = String::new();
        let mut node: Cow<'r, Value> = Cow::Borrowed(self.root);
        let mut resolved = false;
        for segment in split_key_path(target) {
            walked = join(&walked, segment);
            let next = match &node {
                Cow::Borrowed(parent) => child(*parent, segment).map(Cow::Borrowed),
                Cow::Owned(parent) => child(parent, segment).cloned().map(Cow::Owned),
            }
            .ok_or_else(unresolved)?;

            let interpolated = match next.as_ref() {
                Value::String(s) if s == MANDATORY => return Err(missing()),
                Value::String(s) if !resolved && has_interpolation(s) => Some(s.clone()),
                _ => None,
            };
            node = match interpolated {
                Some(text) => {
                    resolved = true;
                    Cow::Owned(self.string_at(&walked, &text)?)
                }
                None => next,
            };
        }

        match node {
            // Already resolved on the way down
            Cow::Owned(value) => Ok(value),
            Cow::Borrowed(value) => self.node(&walked, value),
        }
    }
}

/// Resolve every interpolation in `tree`, returning the resolved copy.
pub fn resolve(tree: &Value, registry: &ResolverRegistry) -> Result<Value, InterpolationError> {
    let mut resolution =
        Resolution { root: tree, registry, cache: HashMap::new(), in_progress: Vec::new() };
    resolution.node("", tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).expect("yaml")
    }

    fn resolved(text: &str) -> Result<Value, InterpolationError> {
        resolve(&yaml(text), &ResolverRegistry::default())
    }

    #[test]
    fn test_whole_value_keeps_type() {
        let out = resolved(
            "algo:\n  cnn_keys:\n    encoder: [rgb]\n    decoder: ${algo.cnn_keys.encoder}\n  total_steps: 100\nbuffer:\n  size: ${algo.total_steps}\n",
        )
        .expect("resolve");
        assert_eq!(out["algo"]["cnn_keys"]["decoder"], yaml("[rgb]"));
        assert_eq!(out["buffer"]["size"], Value::from(100));
    }

    #[test]
    fn test_embedded_values_are_rendered_as_text() {
        let out = resolved("algo:\n  name: sac\nenv:\n  id: walker_walk\nexp_name: ${algo.name}_${env.id}\nseed: 5\nrun: run-${seed}\n")
            .expect("resolve");
        assert_eq!(out["exp_name"], Value::from("sac_walker_walk"));
        assert_eq!(out["run"], Value::from("run-5"));
    }

    #[test]
    fn test_relative_references() {
        let out = resolved("env:\n  screen_size: 64\n  wrapper:\n    width: ${..screen_size}\n    height: ${.width}\n")
            .expect("resolve");
        assert_eq!(out["env"]["wrapper"]["width"], Value::from(64));
        assert_eq!(out["env"]["wrapper"]["height"], Value::from(64));
    }

    #[test]
    fn test_chained_references_and_lists() {
        let out = resolved("a: ${b}\nb: ${c.1}\nc: [x, y]\n").expect("resolve");
        assert_eq!(out["a"], Value::from("y"));
    }

    #[test]
    fn test_reference_through_interpolated_node() {
        let out = resolved("base:\n  lr: 0.1\nactor: ${base}\ncritic_lr: ${actor.lr}\n")
            .expect("resolve");
        assert_eq!(out["critic_lr"].as_f64(), Some(0.1));
        assert_eq!(out["actor"], yaml("lr: 0.1\n"));
    }

    #[test]
    fn test_unresolved_reference_is_fatal() {
        let err = resolved("a: ${missing.key}\n").unwrap_err();
        assert!(matches!(err, InterpolationError::Unresolved { ref reference, ref at }
            if reference == "missing.key" && at == "a"));
        assert!(err.to_string().contains("${missing.key}"));
    }

    #[test]
    fn test_reference_to_mandatory_value_is_fatal() {
        let err = resolved("env:\n  id: ???\nname: ${env.id}\n").unwrap_err();
        assert!(matches!(err, InterpolationError::MissingValue { .. }));
    }

    #[test]
    fn test_cycles_are_detected() {
        let err = resolved("a: ${b}\nb: ${a}\n").unwrap_err();
        match err {
            InterpolationError::Cycle { chain } => assert_eq!(chain, "a -> b -> a"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            resolved("x:\n  y: ${x}\n").unwrap_err(),
            InterpolationError::Cycle { .. }
        ));
    }

    #[test]
    fn test_mapping_cannot_be_embedded() {
        let err = resolved("a:\n  b: 1\nc: pre-${a}\n").unwrap_err();
        assert!(matches!(err, InterpolationError::NotScalar { kind: "a mapping", .. }));
    }

    #[test]
    fn test_escape_and_syntax_errors() {
        let out = resolved("a: \\${literal}\n").expect("resolve");
        assert_eq!(out["a"], Value::from("${literal}"));
        assert!(matches!(resolved("a: ${b\n").unwrap_err(), InterpolationError::Syntax { .. }));
        assert!(matches!(resolved("a: ${}\n").unwrap_err(), InterpolationError::Syntax { .. }));
    }

    #[test]
    fn test_resolver_calls() {
        std::env::set_var("RL_COMPOSE_TEST_RUN_DIR", "/tmp/runs");
        let out = resolved(
            "dir: ${oc.env:RL_COMPOSE_TEST_RUN_DIR}\nfallback: ${oc.env:RL_COMPOSE_TEST_UNSET_VAR, ${seed}}\nseed: 3\n",
        )
        .expect("resolve");
        assert_eq!(out["dir"], Value::from("/tmp/runs"));
        assert_eq!(out["fallback"], Value::from(3));

        let err = resolved("x: ${nope:1}\n").unwrap_err();
        assert!(matches!(err, InterpolationError::UnknownResolver { .. }));

        let err = resolved("x: ${oc.env:RL_COMPOSE_TEST_UNSET_VAR}\n").unwrap_err();
        assert!(matches!(
            err,
            InterpolationError::ResolverFailed { source: ResolverError::Unset(_), .. }
        ));
    }

    #[test]
    fn test_plain_values_untouched() {
        let text = "seed: 42\nenv:\n  id: walker_walk\n  capture_video: false\n";
        assert_eq!(resolved(text).expect("resolve"), yaml(text));
    }
}
