//! C7: walks tracker trees (C5) to find router setup, route registrations,
//! and the request/response shapes each handler implies.
//!
//! Router/mount/group linking is the hard part here. A mount or group call
//! and the route registrations that end up under its prefix are frequently
//! in textually disjoint parts of the call tree — the "options pattern":
//! a router is built in one function, handed to a
//! functional option, and only mounted from a third function entirely. A
//! stack-based, tree-nesting prefix propagation can't see that link. Instead
//! this module keys every router/group value on a [`RouterIdentity`] derived
//! from either the variable it was assigned to or the call site that
//! produced it, and resolves the whole parent/child graph in one
//! whole-tree pass before any route's effective path is computed.

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use regex::Regex;

use apispec_core::{
    ArgRef, CallSiteId, Diagnostic, DiagnosticKind, Diagnostics, FrameworkConfig,
    FunctionId, Limits, MetadataStore, Position, Result, Rhs, TypeId, VariableId,
};
use apispec_graph::{match_any, CallGraphIndex, TrackerBuilder, TrackerNode};
use heck::ToLowerCamelCase;

/// One emitted route, fully resolved: prefix applied, handler's decoded
/// request type and encoded responses attached, `operationId` assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub operation_id: String,
    pub handler: Option<FunctionId>,
    pub request_type: Option<TypeId>,
    pub responses: Vec<ResponseSpec>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub status_code: u16,
    pub body_type: Option<TypeId>,
}

/// A router/group value's identity, stable across disjoint parts of the call
/// tree. A router constructed and never assigned (immediately chained, e.g.
/// `chi.NewRouter().Get(...)`) is identified by the call site that produced
/// it instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RouterIdentity {
    Var(VariableId),
    Call(CallSiteId),
}

fn identity_of(arg: &ArgRef) -> Option<RouterIdentity> {
    match arg {
        ArgRef::Ident(v) => Some(RouterIdentity::Var(*v)),
        ArgRef::Call(cs) => Some(RouterIdentity::Call(*cs)),
        ArgRef::Selector { base, .. } => identity_of(base),
        _ => None,
    }
}

/// A `mount` or `group` match: child router's value now resolves to
/// `prefix` appended onto whatever `parent`'s own prefix turns out to be.
struct RouterLink {
    parent: RouterIdentity,
    child: RouterIdentity,
    prefix: String,
    position: Position,
}

/// A route-registration match, still missing its handler's decoded
/// request/response shapes — those require building a second tracker tree
/// rooted at the handler, done in a later, independently parallel pass.
struct PendingRegistration {
    router: Option<RouterIdentity>,
    method: String,
    raw_path: String,
    handler: Option<FunctionId>,
    position: Position,
}

struct RawRoute {
    method: String,
    path: String,
    handler: Option<FunctionId>,
    request_type: Option<TypeId>,
    responses: Vec<ResponseSpec>,
    position: Position,
}

/// Extracts [`Route`]s from a module's call graph per one [`FrameworkConfig`].
pub struct RouteExtractor<'a> {
    store: &'a MetadataStore,
    index: &'a CallGraphIndex,
    config: &'a FrameworkConfig,
    limits: Limits,
    path_param_regex: Regex,
}

impl<'a> RouteExtractor<'a> {
    pub fn new(store: &'a MetadataStore, index: &'a CallGraphIndex, config: &'a FrameworkConfig) -> Result<Self> {
        let path_param_regex = Regex::new(&config.path_param_syntax.param_regex)?;
        Ok(Self {
            store,
            index,
            config,
            limits: config.limits,
            path_param_regex,
        })
    }

    /// Builds one tracker tree per entry point and extracts routes from all
    /// of them; independent root trees are traversed in parallel.
    pub fn extract(&self, roots: &[FunctionId], diagnostics: &Diagnostics) -> Vec<Route> {
        let pending: Vec<PendingRegistration> = roots
            .par_iter()
            .flat_map(|&root| {
                let tree = TrackerBuilder::new(self.store, self.index, self.limits).build(root);
                self.walk_tree(&tree, diagnostics)
            })
            .collect();

        let raw: Vec<RawRoute> = pending
            .into_par_iter()
            .map(|p| self.resolve_handler(p))
            .collect();

        self.finalize(raw, diagnostics)
    }

    /// Single pass over one root tree: collects every mount/group link and
    /// every route registration, then resolves each registration's prefix
    /// from the whole-tree link graph before returning.
    fn walk_tree(&self, root: &TrackerNode, diagnostics: &Diagnostics) -> Vec<PendingRegistration> {
        let mut mount_links = Vec::new();
        let mut group_links = Vec::new();
        let mut registrations = Vec::new();

        self.collect(root, diagnostics, &mut mount_links, &mut group_links, &mut registrations);

        let mut links = mount_links;
        links.extend(group_links);
        let prefix_map = build_prefix_map(links);

        registrations
            .into_iter()
            .map(|mut reg| {
                let normalized = normalize_path(&reg.raw_path, &self.path_param_regex);
                let prefix = reg
                    .router
                    .map(|router| effective_prefix(&prefix_map, router))
                    .unwrap_or_default();
                reg.raw_path = format!("{prefix}{normalized}");
                reg
            })
            .collect()
    }

    fn collect(
        &self,
        node: &TrackerNode,
        diagnostics: &Diagnostics,
        mount_links: &mut Vec<RouterLink>,
        group_links: &mut Vec<RouterLink>,
        registrations: &mut Vec<PendingRegistration>,
    ) {
        if let Some(cs_id) = node.call_site {
            let call_site = self.store.call_site(cs_id);

            if let Some(m) = match_any(&self.config.patterns.mount, node, self.store) {
                let parent = call_site.receiver.as_ref().and_then(identity_of);
                let child = self
                    .capture_argref(&self.config.patterns.mount, &m.pattern_name, "child-router", call_site, node)
                    .as_ref()
                    .and_then(identity_of);
                let prefix = m.bindings.get("prefix").and_then(|v| v.as_str()).map(str::to_string);
                match (parent, child, prefix) {
                    (Some(parent), Some(child), Some(prefix)) => mount_links.push(RouterLink {
                        parent,
                        child,
                        prefix,
                        position: call_site.position,
                    }),
                    _ => diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingCapture,
                        Some(call_site.position),
                        "mount match is missing router, child-router, or prefix capture",
                    )),
                }
            }

            if let Some(m) = match_any(&self.config.patterns.group, node, self.store) {
                let parent = call_site.receiver.as_ref().and_then(identity_of);
                let prefix = m.bindings.get("prefix").and_then(|v| v.as_str()).map(str::to_string);
                match (parent, prefix) {
                    (Some(parent), Some(prefix)) => group_links.push(RouterLink {
                        parent,
                        child: result_identity(self.store, call_site),
                        prefix,
                        position: call_site.position,
                    }),
                    _ => diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingCapture,
                        Some(call_site.position),
                        "group match is missing router or prefix capture",
                    )),
                }
            }

            if let Some(m) = match_any(&self.config.patterns.route_registrations, node, self.store) {
                let method = m.bindings.get("method").and_then(|v| v.as_str()).map(str::to_string);
                let path = m.bindings.get("path").and_then(|v| v.as_str()).map(str::to_string);
                match (method, path) {
                    (Some(method), Some(path)) => {
                        let handler = m.bindings.get("handler").and_then(|v| v.as_function());
                        if handler.is_none() {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::UnknownHandler,
                                Some(call_site.position),
                                "route registration's handler could not be resolved",
                            ));
                        }
                        registrations.push(PendingRegistration {
                            router: call_site.receiver.as_ref().and_then(identity_of),
                            method: method.to_uppercase(),
                            raw_path: path,
                            handler,
                            position: call_site.position,
                        });
                    }
                    _ => diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingCapture,
                        Some(call_site.position),
                        "route registration is missing method or path; route dropped",
                    )),
                }
            }
        }

        for child in &node.children {
            self.collect(child, diagnostics, mount_links, group_links, registrations);
        }
    }

    /// Reads a named capture's raw `ArgRef` rather than its collapsed
    /// `CaptureValue` — only needed for captures this module uses to link
    /// router identity (`child-router`), never for string/status-code ones.
    fn capture_argref(
        &self,
        patterns: &[apispec_core::CallPattern],
        pattern_name: &str,
        capture_name: &str,
        call_site: &apispec_core::CallSite,
        node: &TrackerNode,
    ) -> Option<ArgRef> {
        let pattern = patterns.iter().find(|p| p.name == pattern_name)?;
        let capture = pattern.captures.iter().find(|c| c.name == capture_name)?;
        apispec_graph::resolve_capture_argref(&capture.source, call_site, node)
    }

    /// Builds a fresh tracker tree rooted at the handler itself (it's never
    /// actually called in the analyzed source — the framework invokes it at
    /// runtime — so it can't appear as a node in the registration's tree)
    /// and walks it for request-decoder/response-encoder matches.
    fn resolve_handler(&self, pending: PendingRegistration) -> RawRoute {
        // `pending.raw_path` is already prefix ⧺ normalize(route) by the time
        // it leaves `walk_tree` — nothing left to normalize here.
        let path = pending.raw_path;

        let Some(handler) = pending.handler else {
            return RawRoute {
                method: pending.method,
                path,
                handler: None,
                request_type: None,
                responses: vec![ResponseSpec {
                    status_code: 200,
                    body_type: None,
                }],
                position: pending.position,
            };
        };

        let tree = TrackerBuilder::new(self.store, self.index, self.limits).build(handler);

        let mut request_type = None;
        let mut responses: Vec<ResponseSpec> = Vec::new();
        let mut seen_status: HashSet<u16> = HashSet::new();
        self.walk_handler(&tree, &mut request_type, &mut responses, &mut seen_status);

        if responses.is_empty() {
            responses.push(ResponseSpec {
                status_code: 200,
                body_type: None,
            });
        }

        RawRoute {
            method: pending.method,
            path,
            handler: Some(handler),
            request_type,
            responses,
            position: pending.position,
        }
    }

    fn walk_handler(
        &self,
        node: &TrackerNode,
        request_type: &mut Option<TypeId>,
        responses: &mut Vec<ResponseSpec>,
        seen_status: &mut HashSet<u16>,
    ) {
        if request_type.is_none() {
            if let Some(m) = match_any(&self.config.patterns.request_decoders, node, self.store) {
                match m.bindings.get("type").and_then(|v| v.as_type()) {
                    Some(ty) => *request_type = Some(ty),
                    None => {
                        // A decoder matched with no resolvable type capture — left as
                        // `None`, which the document assembler lowers to the empty
                        // object schema.
                    }
                }
            }
        }

        if let Some(m) = match_any(&self.config.patterns.response_encoders, node, self.store) {
            if let Some(status) = m.bindings.get("status-code").and_then(|v| v.as_status_code()) {
                if seen_status.insert(status) {
                    let body_type = m.bindings.get("body-type").and_then(|v| v.as_type());
                    responses.push(ResponseSpec {
                        status_code: status,
                        body_type,
                    });
                }
            }
        }

        for child in &node.children {
            self.walk_handler(child, request_type, responses, seen_status);
        }
    }

    /// Deduplicates by `(method, path)` keeping the textually-first
    /// registration, then assigns `operationId`s in that same position
    /// order, suffixing collisions.
    fn finalize(&self, mut raw: Vec<RawRoute>, diagnostics: &Diagnostics) -> Vec<Route> {
        raw.sort_by_key(|r| r.position);

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut kept = Vec::new();
        for route in raw {
            let key = (route.method.clone(), route.path.clone());
            if seen.contains(&key) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DuplicateRoute,
                    Some(route.position),
                    format!(
                        "duplicate route {} {} dropped; an earlier registration already claims it",
                        route.method, route.path
                    ),
                ));
                continue;
            }
            seen.insert(key);
            kept.push(route);
        }

        let mut used: HashMap<String, u32> = HashMap::new();
        kept.into_iter()
            .map(|route| {
                let base = self.operation_id_base(route.handler);
                let count = used.entry(base.clone()).or_insert(0);
                *count += 1;
                let operation_id = if *count == 1 { base } else { format!("{base}{count}") };
                Route {
                    method: route.method,
                    path: route.path,
                    operation_id,
                    handler: route.handler,
                    request_type: route.request_type,
                    responses: route.responses,
                    position: route.position,
                }
            })
            .collect()
    }

    fn operation_id_base(&self, handler: Option<FunctionId>) -> String {
        match handler {
            Some(f) => self.store.pool.resolve(self.store.function(f).name).to_lower_camel_case(),
            None => "unknownHandler".to_string(),
        }
    }
}

/// Picks the tracker tree roots: every `func main()` in package `main`,
/// sorted by position for determinism. Falls back to every exported
/// top-level function when no `main` package exists (library-style modules,
/// or a subtree handed to the CLI that isn't itself a program) — this gives
/// one root tree per entry point without requiring the caller to know
/// which function a framework's router is eventually wired from.
pub fn entry_points(store: &MetadataStore) -> Vec<FunctionId> {
    let mut mains: Vec<(FunctionId, Position)> = store
        .functions()
        .filter(|(_, f)| store.pool.resolve(f.name) == "main" && store.pool.resolve(f.package) == "main")
        .map(|(id, f)| (id, f.position))
        .collect();

    if mains.is_empty() {
        mains = store
            .functions()
            .filter(|(_, f)| {
                f.receiver.is_none()
                    && store
                        .pool
                        .resolve(f.name)
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_uppercase())
            })
            .map(|(id, f)| (id, f.position))
            .collect();
    }

    mains.sort_by_key(|&(_, pos)| pos);
    mains.into_iter().map(|(id, _)| id).collect()
}

/// Recovers the `RouterIdentity` a call's own result will be known by: the
/// variable it's assigned to in its caller, or — for chained/returned calls
/// with no binding — the call site itself.
fn result_identity(store: &MetadataStore, call_site: &apispec_core::CallSite) -> RouterIdentity {
    let caller = store.function(call_site.caller);
    for &assignment_id in &caller.assignments {
        let assignment = store.assignment(assignment_id);
        if let Rhs::Call(cs) = &assignment.rhs {
            if *cs == call_site.id {
                if let Some(&var) = assignment.lhs.first() {
                    return RouterIdentity::Var(var);
                }
            }
        }
    }
    RouterIdentity::Call(call_site.id)
}

/// Merges mount and group links into one child -> (parent, prefix) map,
/// breaking ties by keeping the textually-first link when a router value
/// somehow ends up linked twice.
fn build_prefix_map(mut links: Vec<RouterLink>) -> HashMap<RouterIdentity, (RouterIdentity, String)> {
    links.sort_by_key(|l| l.position);
    let mut map = HashMap::new();
    for link in links {
        map.entry(link.child).or_insert((link.parent, link.prefix));
    }
    map
}

fn effective_prefix(map: &HashMap<RouterIdentity, (RouterIdentity, String)>, start: RouterIdentity) -> String {
    let mut segments = Vec::new();
    let mut current = start;
    let mut visited = HashSet::new();
    while let Some((parent, segment)) = map.get(&current) {
        if !visited.insert(current) {
            break;
        }
        segments.push(segment.clone());
        current = *parent;
    }
    segments.into_iter().rev().collect::<Vec<_>>().join("")
}

/// Translates the framework's placeholder syntax to `{name}`, collapses
/// redundant slashes, guarantees a leading `/`, and strips a trailing `/`
/// except for the root path.
fn normalize_path(raw: &str, param_regex: &Regex) -> String {
    let replaced = param_regex.replace_all(raw, "{$1}");

    let mut collapsed = String::with_capacity(replaced.len() + 1);
    let mut last_was_slash = false;
    for ch in replaced.chars() {
        if ch == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        collapsed.push(ch);
    }

    if !collapsed.starts_with('/') {
        collapsed.insert(0, '/');
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed
}
