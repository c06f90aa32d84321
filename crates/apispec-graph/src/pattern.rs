//! C6: evaluates a declarative [`CallPattern`] against one [`TrackerNode`].
//!
//! A pattern is an AND of [`Constraint`]s; OR is expressed by the caller
//! trying several patterns from the same configuration section in turn (see
//! `apispec_core::config::Patterns`, whose doc comment spells out this
//! convention). A successful match yields a [`PatternMatch`] carrying the
//! named [`Capture`]s the route extractor (C7) reads downstream.

use hashbrown::HashMap;
use regex::Regex;

use apispec_core::{
    ArgRef, CallPattern, CallSite, Constraint, FunctionId, Literal, MetadataStore, TypeDesc, TypeId,
};

use crate::tracker::TrackerNode;

/// One constraint's or capture's resolved read from a tracker node — kept
/// as loosely typed as the source config, since a capture can name either a
/// value (a path string, an HTTP method) or a type (a request/response
/// schema source) depending on which config section it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    Str(String),
    Int(i64),
    Type(TypeId),
    Function(FunctionId),
}

impl CaptureValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CaptureValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeId> {
        match self {
            CaptureValue::Type(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<FunctionId> {
        match self {
            CaptureValue::Function(f) => Some(*f),
            _ => None,
        }
    }

    /// Constant-folds a captured status code from either form a
    /// response-encoder pattern might bind it as: a literal integer
    /// argument, or an inline `literal:NNN` capture.
    pub fn as_status_code(&self) -> Option<u16> {
        match self {
            CaptureValue::Int(i) => u16::try_from(*i).ok(),
            CaptureValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }
}

pub type Bindings = HashMap<String, CaptureValue>;

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern_name: String,
    pub bindings: Bindings,
}

/// Tries every pattern in `patterns` in order against `node`; returns the
/// first match, per the "first match wins" rule used throughout pattern
/// matching. `node` must have a call site — the synthetic root never matches.
pub fn match_any<'a>(
    patterns: &'a [CallPattern],
    node: &TrackerNode,
    store: &MetadataStore,
) -> Option<PatternMatch> {
    patterns.iter().find_map(|p| match_one(p, node, store))
}

pub fn match_one(pattern: &CallPattern, node: &TrackerNode, store: &MetadataStore) -> Option<PatternMatch> {
    let call_site_id = node.call_site?;
    let call_site = store.call_site(call_site_id);
    let callee = ResolvedCallee::of(node)?;

    if !pattern
        .all_of
        .iter()
        .all(|c| eval_constraint(c, call_site, node, callee, store))
    {
        return None;
    }

    let mut bindings = Bindings::new();
    for capture in &pattern.captures {
        if let Some(value) = resolve_capture(&capture.source, call_site, node, store) {
            bindings.insert(capture.name.clone(), value);
        }
    }

    Some(PatternMatch {
        pattern_name: pattern.name.clone(),
        bindings,
    })
}

/// Either side of what a tracker node can carry in place of a true opaque
/// call: a resolved function body, or a recognized external call whose name
/// is known but whose body was never parsed.
#[derive(Debug, Clone, Copy)]
enum ResolvedCallee {
    Function(FunctionId),
    External(apispec_core::Handle),
}

impl ResolvedCallee {
    fn of(node: &TrackerNode) -> Option<Self> {
        if let Some(f) = node.resolved_callee {
            Some(ResolvedCallee::Function(f))
        } else {
            node.external.map(ResolvedCallee::External)
        }
    }

    fn qualified_name(self, store: &MetadataStore) -> String {
        match self {
            ResolvedCallee::Function(f) => store.function(f).qualified_name(&store.pool, &store.types),
            ResolvedCallee::External(name) => store.pool.resolve(name).to_string(),
        }
    }
}

fn eval_constraint(
    constraint: &Constraint,
    call_site: &CallSite,
    node: &TrackerNode,
    resolved_callee: ResolvedCallee,
    store: &MetadataStore,
) -> bool {
    match constraint {
        Constraint::FunctionName { regex } => regex_matches(regex, &resolved_callee.qualified_name(store)),
        Constraint::ReceiverType { regex, version_agnostic } => {
            match receiver_type_name(call_site, resolved_callee, store) {
                Some(name) => {
                    if *version_agnostic {
                        regex_matches(&strip_version_suffix(regex), &strip_version_suffix(&name))
                    } else {
                        regex_matches(regex, &name)
                    }
                }
                None => false,
            }
        }
        Constraint::Argument { index, value_regex } => {
            let Some(arg) = select_arg(&node.effective_args, *index) else {
                return false;
            };
            match value_regex {
                None => true,
                Some(re) => match arg_as_string(arg, store) {
                    Some(text) => regex_matches(re, &text),
                    None => false,
                },
            }
        }
        Constraint::TypeArgument { index, regex } => {
            let type_args = if node.effective_type_args.is_empty() {
                &call_site.type_args
            } else {
                &node.effective_type_args
            };
            match type_args.get(*index as usize) {
                Some(&ty) => regex_matches(regex, &stringify_type(ty, store)),
                None => false,
            }
        }
    }
}

fn resolve_capture(
    source: &str,
    call_site: &CallSite,
    node: &TrackerNode,
    store: &MetadataStore,
) -> Option<CaptureValue> {
    if source == "receiver" {
        let resolved_callee = ResolvedCallee::of(node)?;
        return receiver_type_name(call_site, resolved_callee, store).map(CaptureValue::Str);
    }
    if let Some(rest) = source.strip_prefix("literal:") {
        return Some(CaptureValue::Str(rest.to_string()));
    }
    if let Some(rest) = source.strip_prefix("type-arg:") {
        let index: usize = rest.parse().ok()?;
        let type_args = if node.effective_type_args.is_empty() {
            &call_site.type_args
        } else {
            &node.effective_type_args
        };
        return type_args.get(index).map(|&t| CaptureValue::Type(t));
    }

    let index: i32 = source.parse().ok()?;
    let arg = select_arg(&node.effective_args, index)?;
    arg_to_capture(arg, store)
}

/// `index >= 0` is a positional argument; `index < 0` selects the last
/// argument (the variadic-tail convention documented on
/// `apispec_core::config::Constraint::Argument`).
fn select_arg(args: &[ArgRef], index: i32) -> Option<&ArgRef> {
    if index >= 0 {
        args.get(index as usize)
    } else {
        args.last()
    }
}

fn arg_to_capture(arg: &ArgRef, store: &MetadataStore) -> Option<CaptureValue> {
    match arg {
        ArgRef::Literal(Literal::Str(h)) => Some(CaptureValue::Str(store.pool.resolve(*h).to_string())),
        ArgRef::Literal(Literal::Int(i)) => Some(CaptureValue::Int(*i)),
        ArgRef::Literal(Literal::Bool(b)) => Some(CaptureValue::Str(b.to_string())),
        ArgRef::FuncLit(f) => Some(CaptureValue::Function(*f)),
        ArgRef::Composite { ty, .. } => Some(CaptureValue::Type(*ty)),
        ArgRef::Ident(var) => store.variable(*var).ty.map(CaptureValue::Type),
        ArgRef::Selector { base, .. } => arg_to_capture(base, store).and_then(|v| match v {
            CaptureValue::Type(_) => None,
            other => Some(other),
        }),
        ArgRef::Call(_) | ArgRef::Literal(Literal::Float(_)) | ArgRef::Literal(Literal::Nil) | ArgRef::Opaque => None,
    }
}

/// Like [`resolve_capture`], but returns the raw [`ArgRef`] instead of
/// collapsing it to a [`CaptureValue`]. The route extractor (C7) needs this
/// for captures that identify a *value* — a router variable, a child router
/// passed to `Mount` — rather than a string or a type, since `arg_to_capture`
/// discards exactly the `VariableId`/`CallSiteId` identity that linking a
/// mount point back to its registrations depends on.
pub fn resolve_capture_argref(source: &str, call_site: &CallSite, node: &TrackerNode) -> Option<ArgRef> {
    if source == "receiver" {
        return call_site.receiver.clone();
    }
    if source.starts_with("literal:") || source.starts_with("type-arg:") {
        return None;
    }
    let index: i32 = source.parse().ok()?;
    select_arg(&node.effective_args, index).cloned()
}

fn arg_as_string(arg: &ArgRef, store: &MetadataStore) -> Option<String> {
    match arg {
        ArgRef::Literal(Literal::Str(h)) => Some(store.pool.resolve(*h).to_string()),
        ArgRef::Literal(Literal::Int(i)) => Some(i.to_string()),
        ArgRef::Literal(Literal::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// The receiver's concrete or interface type name, qualified as
/// `package.Type` — what `ReceiverType` constraints and the `receiver`
/// capture both read.
fn receiver_type_name(call_site: &CallSite, resolved_callee: ResolvedCallee, store: &MetadataStore) -> Option<String> {
    if let apispec_core::Callee::InterfaceMethod { interface, .. } = &call_site.callee {
        return Some(stringify_type(*interface, store));
    }
    match resolved_callee {
        ResolvedCallee::Function(f) => store.function(f).receiver.map(|ty| stringify_type(ty, store)),
        // No parsed receiver type exists for an external method call; fall
        // back to the qualified name with the trailing `.Method` dropped,
        // e.g. `github.com/go-chi/chi/v5.Mux.Get` -> `github.com/go-chi/chi/v5.Mux`.
        ResolvedCallee::External(name) => {
            let full = store.pool.resolve(name);
            full.rsplit_once('.').map(|(receiver, _method)| receiver.to_string())
        }
    }
}

fn stringify_type(ty: TypeId, store: &MetadataStore) -> String {
    match store.types.resolve(ty) {
        TypeDesc::Named { package, name, type_args } => {
            let base = format!("{}.{}", store.pool.resolve(package), store.pool.resolve(name));
            if type_args.is_empty() {
                base
            } else {
                let args: Vec<String> = type_args.iter().map(|&t| stringify_type(t, store)).collect();
                format!("{base}[{}]", args.join(","))
            }
        }
        TypeDesc::Pointer(inner) => stringify_type(inner, store),
        TypeDesc::Slice(inner) => format!("[]{}", stringify_type(inner, store)),
        TypeDesc::Array(n, inner) => format!("[{n}]{}", stringify_type(inner, store)),
        TypeDesc::Map { key, value } => {
            format!("map[{}]{}", stringify_type(key, store), stringify_type(value, store))
        }
        TypeDesc::Basic(kind) => format!("{kind:?}").to_lowercase(),
        TypeDesc::TypeParam { name, .. } => store.pool.resolve(name).to_string(),
        TypeDesc::Interface { .. } => "interface{}".to_string(),
        TypeDesc::Struct { .. } => "struct{}".to_string(),
        TypeDesc::Func(_) => "func".to_string(),
        TypeDesc::Chan { .. } => "chan".to_string(),
        TypeDesc::Unknown => "unknown".to_string(),
    }
}

fn strip_version_suffix(s: &str) -> String {
    match Regex::new(r"/v\d+$") {
        Ok(re) => re.replace(s, "").to_string(),
        Err(_) => s.to_string(),
    }
}

fn regex_matches(pattern: &str, candidate: &str) -> bool {
    Regex::new(pattern).map(|re| re.is_match(candidate)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apispec_core::{Callee, CallSiteId, Function, PackageBuilder, Position};

    fn pos(store: &MetadataStore) -> Position {
        Position::new(store.pool.intern("f.go"), 1, 1)
    }

    #[test]
    fn function_name_pattern_matches_qualified_callee_and_captures_path() {
        let mut store = MetadataStore::new();
        let pkg = store.pool.intern("github.com/go-chi/chi/v5");
        let mut builder = PackageBuilder::new(pkg);
        let callee = builder.push_function(Function {
            name: store.pool.intern("Get"),
            package: pkg,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });
        let caller = builder.push_function(Function {
            name: store.pool.intern("main"),
            package: pkg,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });
        let path_arg = ArgRef::Literal(Literal::Str(store.pool.intern("/users")));
        builder.push_call_site(
            caller,
            CallSite {
                id: CallSiteId(0),
                caller,
                callee: Callee::Direct(callee),
                receiver: None,
                args: vec![path_arg.clone()],
                type_args: vec![],
                position: pos(&store),
            },
        );
        store.insert_package(builder);

        let pattern = CallPattern {
            name: "get".to_string(),
            all_of: vec![Constraint::FunctionName {
                regex: r"\.Get$".to_string(),
            }],
            captures: vec![apispec_core::Capture {
                name: "path".to_string(),
                source: "0".to_string(),
            }],
        };

        let node = TrackerNode {
            call_site: Some(CallSiteId(0)),
            resolved_callee: Some(callee),
            external: None,
            effective_type_args: vec![],
            effective_args: vec![path_arg],
            children: vec![],
            depth: 1,
            truncated: false,
        };

        let m = match_one(&pattern, &node, &store).expect("pattern matches");
        assert_eq!(m.bindings.get("path").and_then(|v| v.as_str()), Some("/users"));
    }

    #[test]
    fn opaque_node_never_matches() {
        let store = MetadataStore::new();
        let pattern = CallPattern {
            name: "get".to_string(),
            all_of: vec![Constraint::FunctionName {
                regex: r".*".to_string(),
            }],
            captures: vec![],
        };
        let node = TrackerNode {
            call_site: Some(CallSiteId(0)),
            resolved_callee: None,
            external: None,
            effective_type_args: vec![],
            effective_args: vec![],
            children: vec![],
            depth: 1,
            truncated: false,
        };
        assert!(match_one(&pattern, &node, &store).is_none());
    }

    #[test]
    fn external_call_matches_by_qualified_name() {
        let mut store = MetadataStore::new();
        let handle = store.pool.intern("github.com/go-chi/chi/v5.NewRouter");
        let node = TrackerNode {
            call_site: Some(CallSiteId(0)),
            resolved_callee: None,
            external: Some(handle),
            effective_type_args: vec![],
            effective_args: vec![],
            children: vec![],
            depth: 1,
            truncated: false,
        };
        let pattern = CallPattern {
            name: "router_constructor".to_string(),
            all_of: vec![Constraint::FunctionName {
                regex: r"\.NewRouter$".to_string(),
            }],
            captures: vec![],
        };
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);
        let caller = builder.push_function(Function {
            name: store.pool.intern("main"),
            package: pkg,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });
        builder.push_call_site(
            caller,
            CallSite {
                id: CallSiteId(0),
                caller,
                callee: Callee::External(handle),
                receiver: None,
                args: vec![],
                type_args: vec![],
                position: pos(&store),
            },
        );
        store.insert_package(builder);

        assert!(match_one(&pattern, &node, &store).is_some());
    }

    #[test]
    fn version_agnostic_receiver_type_ignores_suffix() {
        assert_eq!(strip_version_suffix("github.com/go-chi/chi/v5"), "github.com/go-chi/chi");
        assert_eq!(strip_version_suffix("github.com/go-chi/chi"), "github.com/go-chi/chi");
    }
}
