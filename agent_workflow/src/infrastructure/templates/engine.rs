// /////////////////////////////////////////////////////////////////////////////
// Agent Workflow Orchestrator
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Template Engine
//!
//! Compiles and renders the prompt template mini-language.
//!
//! ## Overview
//!
//! A template source is parsed once into an immutable node tree
//! ([`CompiledTemplate`]) and rendered any number of times against a
//! variable mapping. Blocks resolve before their bodies, so conditionals
//! gate loops and loops re-scope variables per element:
//!
//! - **Variables**: `{{name}}`, with dotted access (`{{ctx.user.name}}`)
//!   walking nested JSON objects. A non-object intermediate value
//!   short-circuits to "not found".
//! - **Filters**: `{{name|upper|truncate:5}}` applied left to right.
//!   Unknown filters log a warning and pass the value through; malformed
//!   parameters fall back to the unfiltered value.
//! - **Conditionals**: `{{#if expr}}...{{/if}}` using JSON truthiness
//!   (non-zero numbers, non-empty strings and collections, `true`).
//! - **Loops**: `{{#each expr}}...{{/each}}`; inside the body `this` is
//!   the current element and object entries shadow outer scope keys.
//!
//! Unknown variables render their placeholder text literally, so
//! rendering never fails on missing data. Rendering is deterministic:
//! the same template and variables always produce the same output.
//!
//! ## Failure Semantics
//!
//! [`TemplateEngine::validate`] reports syntactic faults with line,
//! column, and a one-line snippet. A template that validated cleanly
//! renders without error for any variable mapping.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cache::{CacheStats, TemplateCache, TemplateCacheConfig};

/// Syntactic fault in a template source, with location information.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Template error at line {line}, column {column}: {message} (near '{snippet}')")]
pub struct TemplateError {
    pub line: usize,
    pub column: usize,
    pub snippet: String,
    pub message: String,
}

impl From<TemplateError> for agent_workflow_domain::WorkflowError {
    fn from(err: TemplateError) -> Self {
        agent_workflow_domain::WorkflowError::template_error(err.to_string())
    }
}

/// One filter application inside a variable tag.
#[derive(Debug, Clone)]
struct FilterSpec {
    name: String,
    arg: Option<String>,
}

/// Parsed template node.
#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Variable {
        /// Verbatim tag interior, reproduced when the variable is unknown
        raw: String,
        name: String,
        filters: Vec<FilterSpec>,
    },
    Conditional {
        expr: String,
        body: Vec<Node>,
    },
    Loop {
        expr: String,
        body: Vec<Node>,
    },
}

/// An immutable, thread-safe compiled template.
///
/// Compiled templates are shared between callers through `Arc`; rendering
/// borrows the node tree and never mutates it.
pub struct CompiledTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("source_len", &self.source.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl CompiledTemplate {
    /// Parses a template source into a compiled form.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parser = Parser { source, pos: 0 };
        let nodes = parser.parse_sequence(None)?;
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// The raw source this template was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template against a variable mapping.
    ///
    /// Rendering cannot fail: unknown variables keep their placeholder
    /// text and empty loops render nothing.
    pub fn render(&self, variables: &HashMap<String, Value>) -> String {
        let mut out = String::with_capacity(self.source.len());
        render_nodes(&self.nodes, variables, &mut out);
        out
    }
}

/// Template engine with a compiled-template cache.
///
/// One engine instance is shared across all workflow executions; the cache
/// behind it is protected by a single lock and the engine itself holds no
/// per-render state.
pub struct TemplateEngine {
    cache: Arc<TemplateCache>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl TemplateEngine {
    /// Creates an engine with the given cache configuration.
    pub fn new(config: TemplateCacheConfig) -> Self {
        Self {
            cache: Arc::new(TemplateCache::new(config)),
            sweeper: Mutex::new(None),
        }
    }

    /// Validates a template source without rendering it.
    ///
    /// Checks brace balance, block nesting, and that every variable name
    /// is non-empty after trimming. On failure the error carries the line,
    /// column, and a one-line snippet around the offending character.
    pub fn validate(&self, source: &str) -> Result<(), TemplateError> {
        CompiledTemplate::parse(source).map(|_| ())
    }

    /// Compiles a source through the cache.
    ///
    /// With caching enabled, a second call with the same source returns
    /// the same shared instance.
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        self.cache.get_or_compile(source, CompiledTemplate::parse)
    }

    /// Compiles (through the cache) and renders in one step.
    pub fn render(&self, source: &str, variables: &HashMap<String, Value>) -> Result<String, TemplateError> {
        Ok(self.compile(source)?.render(variables))
    }

    /// Snapshot of cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Starts the background sweeper that evicts expired entries.
    ///
    /// A no-op when caching or TTL eviction is disabled, or when a sweeper
    /// is already running. Must be called from within a tokio runtime.
    pub fn start_sweeper(&self) {
        if !self.cache.ttl_enabled() {
            return;
        }
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }
        let cache = Arc::clone(&self.cache);
        let period = cache.cleanup_interval();
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a fresh cache
            // is not swept before anything can expire.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, "template cache sweeper evicted expired entries");
                }
            }
        }));
    }

    /// Stops the background sweeper, if one is running.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(TemplateCacheConfig::default())
    }
}

impl Drop for TemplateEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parses nodes until EOF or the close tag named by `expect_close`.
    fn parse_sequence(&mut self, expect_close: Option<&str>) -> Result<Vec<Node>, TemplateError> {
        let mut nodes = Vec::new();

        loop {
            let rest = &self.source[self.pos..];
            let Some(open_rel) = rest.find("{{") else {
                if let Some(stray) = rest.find("}}") {
                    return Err(self.error_at(self.pos + stray, "unmatched '}}'"));
                }
                if !rest.is_empty() {
                    nodes.push(Node::Text(rest.to_string()));
                }
                self.pos = self.source.len();
                return match expect_close {
                    Some(tag) => Err(self.error_at(self.source.len(), format!("missing '{{{{/{}}}}}'", tag))),
                    None => Ok(nodes),
                };
            };

            let text = &rest[..open_rel];
            if let Some(stray) = text.find("}}") {
                return Err(self.error_at(self.pos + stray, "unmatched '}}'"));
            }
            if !text.is_empty() {
                nodes.push(Node::Text(text.to_string()));
            }

            let tag_start = self.pos + open_rel;
            let inner_start = tag_start + 2;
            let Some(close_rel) = self.source[inner_start..].find("}}") else {
                return Err(self.error_at(tag_start, "unterminated '{{'"));
            };
            let inner = &self.source[inner_start..inner_start + close_rel];
            if inner.contains("{{") {
                return Err(self.error_at(tag_start, "nested '{{' inside a tag"));
            }
            let after_tag = inner_start + close_rel + 2;
            let trimmed = inner.trim();

            if let Some(block) = trimmed.strip_prefix('#') {
                let (keyword, expr) = match block.split_once(char::is_whitespace) {
                    Some((k, e)) => (k, e.trim()),
                    None => (block, ""),
                };
                match keyword {
                    "if" | "each" => {
                        if expr.is_empty() {
                            return Err(self.error_at(tag_start, format!("empty expression in '{{{{#{}}}}}'", keyword)));
                        }
                        // Own the tag pieces: the recursive call needs the
                        // parser mutably while these would otherwise still
                        // borrow the source.
                        let is_conditional = keyword == "if";
                        let keyword = keyword.to_string();
                        let expr = expr.to_string();
                        self.pos = after_tag;
                        let body = self.parse_sequence(Some(&keyword))?;
                        let node = if is_conditional {
                            Node::Conditional { expr, body }
                        } else {
                            Node::Loop { expr, body }
                        };
                        nodes.push(node);
                    }
                    other => {
                        return Err(self.error_at(tag_start, format!("unknown block tag '#{}'", other)));
                    }
                }
            } else if let Some(close) = trimmed.strip_prefix('/') {
                let close = close.trim();
                self.pos = after_tag;
                return match expect_close {
                    Some(expected) if expected == close => Ok(nodes),
                    _ => Err(self.error_at(tag_start, format!("unexpected '{{{{/{}}}}}'", close))),
                };
            } else {
                if trimmed.is_empty() {
                    return Err(self.error_at(tag_start, "empty variable name"));
                }
                nodes.push(parse_variable(inner, trimmed));
                self.pos = after_tag;
            }
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> TemplateError {
        let offset = offset.min(self.source.len());
        let before = &self.source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = self.source[line_start..offset].chars().count() + 1;
        let line_end = self.source[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(self.source.len());
        let line_text = &self.source[line_start..line_end];

        // One-line window around the offending column.
        let chars: Vec<char> = line_text.chars().collect();
        let window_start = column.saturating_sub(1).saturating_sub(30);
        let snippet: String = chars.iter().skip(window_start).take(60).collect();

        TemplateError {
            line,
            column,
            snippet,
            message: message.into(),
        }
    }
}

fn parse_variable(raw: &str, trimmed: &str) -> Node {
    let mut segments = trimmed.split('|');
    let name = segments.next().unwrap_or_default().trim().to_string();
    let filters = segments
        .map(|segment| match segment.split_once(':') {
            Some((fname, arg)) => FilterSpec {
                name: fname.trim().to_string(),
                arg: Some(arg.trim().to_string()),
            },
            None => FilterSpec {
                name: segment.trim().to_string(),
                arg: None,
            },
        })
        .collect();

    Node::Variable {
        raw: raw.to_string(),
        name,
        filters,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_nodes(nodes: &[Node], scope: &HashMap<String, Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Conditional { expr, body } => {
                if is_truthy(lookup_path(scope, expr)) {
                    render_nodes(body, scope, out);
                }
            }
            Node::Loop { expr, body } => {
                let Some(Value::Array(items)) = lookup_path(scope, expr) else {
                    continue;
                };
                for item in items {
                    let mut inner = scope.clone();
                    if let Value::Object(entries) = item {
                        for (key, value) in entries {
                            inner.insert(key.clone(), value.clone());
                        }
                    }
                    inner.insert("this".to_string(), item.clone());
                    render_nodes(body, &inner, out);
                }
            }
            Node::Variable { raw, name, filters } => {
                render_variable(raw, name, filters, scope, out);
            }
        }
    }
}

fn render_variable(raw: &str, name: &str, filters: &[FilterSpec], scope: &HashMap<String, Value>, out: &mut String) {
    match lookup_path(scope, name) {
        Some(value) if !value.is_null() => {
            let mut text = value_to_string(value);
            for filter in filters {
                text = apply_filter(filter, text);
            }
            out.push_str(&text);
        }
        _ => {
            // Missing value: a default filter substitutes its literal and
            // the rest of the chain still applies; otherwise the
            // placeholder is preserved verbatim.
            if let Some(idx) = filters.iter().position(|f| f.name == "default") {
                if let Some(arg) = filters[idx].arg.as_deref().filter(|a| !a.is_empty()) {
                    let mut text = strip_quotes(arg).to_string();
                    for filter in &filters[idx + 1..] {
                        text = apply_filter(filter, text);
                    }
                    out.push_str(&text);
                    return;
                }
                warn!(variable = name, "malformed default filter parameter; keeping placeholder");
            }
            out.push_str("{{");
            out.push_str(raw);
            out.push_str("}}");
        }
    }
}

fn apply_filter(filter: &FilterSpec, text: String) -> String {
    match filter.name.as_str() {
        "upper" => text.to_uppercase(),
        "lower" => text.to_lowercase(),
        "trim" => text.trim().to_string(),
        "truncate" => match filter.arg.as_deref().map(str::parse::<usize>) {
            Some(Ok(limit)) => {
                if text.chars().count() > limit {
                    let mut truncated: String = text.chars().take(limit).collect();
                    truncated.push_str("...");
                    truncated
                } else {
                    text
                }
            }
            _ => {
                warn!(
                    arg = filter.arg.as_deref().unwrap_or(""),
                    "malformed truncate parameter; value left unfiltered"
                );
                text
            }
        },
        // A default filter is an identity on present values.
        "default" => text,
        other => {
            warn!(filter = other, "unknown template filter; ignoring");
            text
        }
    }
}

/// Resolves a dotted path against the variable mapping.
///
/// An exact key match wins, so the flat `<stage>.result` and
/// `<stage>.output` keys the workflow driver writes stay addressable.
/// Otherwise the left-most bound prefix is traversed segment by segment
/// through nested JSON objects; a non-object intermediate value
/// short-circuits to "not found".
fn lookup_path<'a>(scope: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(value) = scope.get(path) {
        return Some(value);
    }
    if !path.contains('.') {
        return None;
    }

    let segments: Vec<&str> = path.split('.').collect();
    for split in 1..segments.len() {
        let prefix = segments[..split].join(".");
        if let Some(root) = scope.get(&prefix) {
            return descend(root, &segments[split..]);
        }
    }
    None
}

fn descend<'a>(mut current: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(*segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn strip_quotes(arg: &str) -> &str {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 && ((bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'') || (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')) {
        &arg[1..arg.len() - 1]
    } else {
        arg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn render(source: &str, variables: &HashMap<String, Value>) -> String {
        CompiledTemplate::parse(source).unwrap().render(variables)
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("no tags here", &HashMap::new()), "no tags here");
    }

    #[test]
    fn test_simple_variable() {
        let out = render("Hello {{name}}!", &vars(&[("name", json!("Ada"))]));
        assert_eq!(out, "Hello Ada!");
    }

    #[test]
    fn test_unknown_variable_keeps_placeholder() {
        let out = render("Hello {{name}}, meet {{friend}}", &vars(&[("name", json!("Ada"))]));
        assert_eq!(out, "Hello Ada, meet {{friend}}");
    }

    #[test]
    fn test_nested_attribute_access() {
        let out = render(
            "{{ctx.user.name}}",
            &vars(&[("ctx", json!({"user": {"name": "Grace"}}))]),
        );
        assert_eq!(out, "Grace");
    }

    #[test]
    fn test_non_object_intermediate_short_circuits() {
        let out = render("{{ctx.user.name}}", &vars(&[("ctx", json!({"user": 7}))]));
        assert_eq!(out, "{{ctx.user.name}}");
    }

    #[test]
    fn test_flat_dotted_keys_resolve_exactly() {
        // The workflow driver writes flat keys like `draft.output`.
        let out = render("{{draft.output}}", &vars(&[("draft.output", json!("OK"))]));
        assert_eq!(out, "OK");
    }

    #[test]
    fn test_traversal_into_flat_key_value() {
        let out = render(
            "{{draft.result.attempt}}",
            &vars(&[("draft.result", json!({"attempt": 2, "success": true}))]),
        );
        assert_eq!(out, "2");
    }

    #[test]
    fn test_filter_chain() {
        let out = render("{{msg|upper|truncate:5}}", &vars(&[("msg", json!("helloworld"))]));
        assert_eq!(out, "HELLO...");
    }

    #[test]
    fn test_truncate_keeps_short_values() {
        let out = render("{{msg|truncate:20}}", &vars(&[("msg", json!("short"))]));
        assert_eq!(out, "short");
    }

    #[test]
    fn test_truncate_malformed_parameter_is_identity() {
        let out = render("{{msg|truncate:many}}", &vars(&[("msg", json!("helloworld"))]));
        assert_eq!(out, "helloworld");
    }

    #[test]
    fn test_unknown_filter_ignored() {
        let out = render("{{msg|sparkle}}", &vars(&[("msg", json!("plain"))]));
        assert_eq!(out, "plain");
    }

    #[test]
    fn test_default_filter_on_missing_value() {
        let out = render("{{missing|default:'n/a'}}", &HashMap::new());
        assert_eq!(out, "n/a");

        let out = render("{{missing|default:fallback|upper}}", &HashMap::new());
        assert_eq!(out, "FALLBACK");
    }

    #[test]
    fn test_default_filter_identity_on_present_value() {
        let out = render("{{msg|default:'n/a'}}", &vars(&[("msg", json!("present"))]));
        assert_eq!(out, "present");
    }

    #[test]
    fn test_conditional_truthiness() {
        let template = "{{#if flag}}yes{{/if}}";
        assert_eq!(render(template, &vars(&[("flag", json!(true))])), "yes");
        assert_eq!(render(template, &vars(&[("flag", json!(false))])), "");
        assert_eq!(render(template, &vars(&[("flag", json!(1))])), "yes");
        assert_eq!(render(template, &vars(&[("flag", json!(0))])), "");
        assert_eq!(render(template, &vars(&[("flag", json!("x"))])), "yes");
        assert_eq!(render(template, &vars(&[("flag", json!(""))])), "");
        assert_eq!(render(template, &vars(&[("flag", json!([1]))])), "yes");
        assert_eq!(render(template, &vars(&[("flag", json!([]))])), "");
        assert_eq!(render(template, &HashMap::new()), "");
        assert_eq!(render(template, &vars(&[("flag", json!(null))])), "");
    }

    #[test]
    fn test_each_over_scalars() {
        let out = render(
            "{{#if items}}{{#each items}}- {{this}}\n{{/each}}{{/if}}",
            &vars(&[("items", json!(["a", "b", "c"]))]),
        );
        assert_eq!(out, "- a\n- b\n- c\n");

        let out = render(
            "{{#if items}}{{#each items}}- {{this}}\n{{/each}}{{/if}}",
            &vars(&[("items", json!([]))]),
        );
        assert_eq!(out, "");
    }

    #[test]
    fn test_each_shadows_object_entries() {
        let out = render(
            "{{#each people}}{{name}};{{/each}}",
            &vars(&[
                ("people", json!([{"name": "Ada"}, {"name": "Grace"}])),
                ("name", json!("outer")),
            ]),
        );
        assert_eq!(out, "Ada;Grace;");
    }

    #[test]
    fn test_each_body_sees_outer_scope() {
        let out = render(
            "{{#each items}}{{prefix}}{{this}} {{/each}}",
            &vars(&[("items", json!([1, 2])), ("prefix", json!("#"))]),
        );
        assert_eq!(out, "#1 #2 ");
    }

    #[test]
    fn test_nested_conditionals() {
        let out = render(
            "{{#if a}}A{{#if b}}B{{/if}}{{/if}}",
            &vars(&[("a", json!(true)), ("b", json!(true))]),
        );
        assert_eq!(out, "AB");

        let out = render(
            "{{#if a}}A{{#if b}}B{{/if}}{{/if}}",
            &vars(&[("a", json!(true)), ("b", json!(false))]),
        );
        assert_eq!(out, "A");
    }

    #[test]
    fn test_unbalanced_open_reports_location() {
        let err = CompiledTemplate::parse("line one\nbad {{tag").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
        assert!(err.message.contains("unterminated"));
        assert!(err.snippet.contains("bad {{tag"));
    }

    #[test]
    fn test_stray_close_rejected() {
        let err = CompiledTemplate::parse("oops }} here").unwrap_err();
        assert!(err.message.contains("unmatched '}}'"));
    }

    #[test]
    fn test_empty_variable_name_rejected() {
        let err = CompiledTemplate::parse("{{   }}").unwrap_err();
        assert!(err.message.contains("empty variable name"));
    }

    #[test]
    fn test_missing_block_terminator_rejected() {
        let err = CompiledTemplate::parse("{{#if x}}body").unwrap_err();
        assert!(err.message.contains("missing '{{/if}}'"));
    }

    #[test]
    fn test_mismatched_terminator_rejected() {
        let err = CompiledTemplate::parse("{{#if x}}body{{/each}}").unwrap_err();
        assert!(err.message.contains("unexpected '{{/each}}'"));
    }

    #[test]
    fn test_unknown_block_tag_rejected() {
        let err = CompiledTemplate::parse("{{#unless x}}{{/unless}}").unwrap_err();
        assert!(err.message.contains("unknown block tag"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let variables = vars(&[("items", json!(["x", "y"])), ("title", json!("T"))]);
        let template = "{{title}}: {{#each items}}{{this}},{{/each}}";
        let first = render(template, &variables);
        let second = render(template, &variables);
        assert_eq!(first, second);
    }

    #[test]
    fn test_engine_render_through_cache() {
        let engine = TemplateEngine::default();
        let variables = vars(&[("topic", json!("cats"))]);

        let out = engine.render("Write about {{topic}}", &variables).unwrap();
        assert_eq!(out, "Write about cats");

        // Second compile of the same source is a cache hit returning the
        // shared instance.
        let first = engine.compile("Write about {{topic}}").unwrap();
        let second = engine.compile("Write about {{topic}}").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(engine.cache_stats().hits >= 1);
    }

    #[test]
    fn test_validate_then_render_never_fails() {
        let engine = TemplateEngine::default();
        let source = "{{#if items}}{{#each items}}{{this|upper}}{{/each}}{{/if}} {{tail}}";
        engine.validate(source).unwrap();

        // Arbitrary variable maps, including empty and mistyped ones.
        for variables in [
            HashMap::new(),
            vars(&[("items", json!("not-a-list"))]),
            vars(&[("items", json!([{"k": 1}])), ("tail", json!(9))]),
        ] {
            let _ = engine.render(source, &variables).unwrap();
        }
    }

    #[test]
    fn test_numbers_and_bools_render() {
        let out = render(
            "{{count}} {{flag}}",
            &vars(&[("count", json!(3)), ("flag", json!(false))]),
        );
        assert_eq!(out, "3 false");
    }
}
