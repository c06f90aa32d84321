//! C5: converts the static call graph into an execution-order tree rooted
//! at a chosen entry function. This is where indirect calls (func-valued
//! variables, method values, interface dispatch, the options pattern) get
//! resolved by walking backward along the path already built.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use hashbrown::HashMap;

use apispec_core::{
    ArgRef, Assignment, Callee, CallSiteId, FunctionId, Handle, Limits, MetadataStore, Rhs,
    TypeDesc, TypeId, VariableId,
};

use crate::index::CallGraphIndex;

/// One step in the execution-order traversal.
#[derive(Debug, Clone)]
pub struct TrackerNode {
    /// `None` for the synthetic root; every other node corresponds to one
    /// call site in its parent's body.
    pub call_site: Option<CallSiteId>,
    /// `None` when the callee could not be resolved even after indirect
    /// resolution — kept for diagnostic visualization, never matched by C6.
    pub resolved_callee: Option<FunctionId>,
    /// Set instead of `resolved_callee` when the call site's callee is
    /// `Callee::External` — the call's qualified name is known precisely
    /// (it's a framework/stdlib call), but there's no function body to
    /// expand into children. C6 matches `FunctionName`/`ReceiverType`
    /// constraints against this the same way it does a resolved function's
    /// qualified name.
    pub external: Option<Handle>,
    pub effective_type_args: Vec<TypeId>,
    pub effective_args: Vec<ArgRef>,
    pub children: Vec<TrackerNode>,
    pub depth: usize,
    /// Set when this node's own expansion hit a budget and had to stop
    /// early — distinct from the whole-tree `truncated` flag on the root.
    pub truncated: bool,
}

impl TrackerNode {
    pub fn is_opaque(&self) -> bool {
        self.resolved_callee.is_none()
    }
}

/// One frame of the path from the root to the node currently being
/// expanded. Used both for the cycle-break invariant (ii) — keyed on
/// `(function, type_args)` — and for resolving a parameter reference back
/// to the argument supplied at this frame's call site.
struct PathEntry {
    function: FunctionId,
    type_args: Vec<TypeId>,
    effective_args: Vec<ArgRef>,
}

pub struct TrackerBuilder<'a> {
    store: &'a MetadataStore,
    index: &'a CallGraphIndex,
    limits: Limits,
    deadline: Option<Instant>,
    cancelled: Option<&'a AtomicBool>,
    /// `(package, type name, method name)` -> the method's `FunctionId`,
    /// built once so interface/method-value dispatch doesn't rescan every
    /// function in the module per call site.
    methods: HashMap<(Handle, Handle, Handle), FunctionId>,
    node_count: usize,
}

impl<'a> TrackerBuilder<'a> {
    pub fn new(store: &'a MetadataStore, index: &'a CallGraphIndex, limits: Limits) -> Self {
        let mut methods = HashMap::new();
        for (id, function) in store.functions() {
            let Some(receiver) = function.receiver else {
                continue;
            };
            if let Some((package, name)) = named_type_of(receiver, store) {
                methods.insert((package, name, function.name), id);
            }
        }
        Self {
            store,
            index,
            limits,
            deadline: None,
            cancelled: None,
            methods,
            node_count: 0,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancelled = Some(flag);
        self
    }

    fn budget_tripped(&self) -> bool {
        if self.node_count >= self.limits.max_nodes_per_tree {
            return true;
        }
        if let Some(flag) = self.cancelled {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }

    /// Builds the tree rooted at `root`, bounded by `limits` and any
    /// deadline/cancellation configured on this builder.
    pub fn build(mut self, root: FunctionId) -> TrackerNode {
        self.node_count = 1;
        let mut path = vec![PathEntry {
            function: root,
            type_args: Vec::new(),
            effective_args: Vec::new(),
        }];
        let mut truncated = false;
        let children = self.expand(root, &mut path, 1, &mut truncated);
        TrackerNode {
            call_site: None,
            resolved_callee: Some(root),
            external: None,
            effective_type_args: Vec::new(),
            effective_args: Vec::new(),
            children,
            depth: 0,
            truncated,
        }
    }

    fn expand(
        &mut self,
        function: FunctionId,
        path: &mut Vec<PathEntry>,
        depth: usize,
        truncated: &mut bool,
    ) -> Vec<TrackerNode> {
        if depth > self.limits.max_recursion_depth {
            *truncated = true;
            return Vec::new();
        }

        let call_site_ids: Vec<CallSiteId> = self.index.calls_from(function).to_vec();
        let mut children = Vec::new();

        for cs_id in call_site_ids {
            if children.len() >= self.limits.max_children_per_node {
                *truncated = true;
                break;
            }
            if self.budget_tripped() {
                *truncated = true;
                break;
            }

            let call_site = self.store.call_site(cs_id);
            let effective_args = self.substitute_args(&call_site.args, path);

            if let Callee::External(name) = &call_site.callee {
                self.node_count += 1;
                children.push(TrackerNode {
                    call_site: Some(cs_id),
                    resolved_callee: None,
                    external: Some(*name),
                    effective_type_args: Vec::new(),
                    effective_args,
                    children: Vec::new(),
                    depth,
                    truncated: false,
                });
                continue;
            }

            let targets = self.resolve_targets(cs_id, path);

            if targets.is_empty() {
                self.node_count += 1;
                children.push(TrackerNode {
                    call_site: Some(cs_id),
                    resolved_callee: None,
                    external: None,
                    effective_type_args: Vec::new(),
                    effective_args,
                    children: Vec::new(),
                    depth,
                    truncated: false,
                });
                continue;
            }

            for target in targets {
                if children.len() >= self.limits.max_children_per_node {
                    *truncated = true;
                    break;
                }
                if self.budget_tripped() {
                    *truncated = true;
                    break;
                }

                let effective_type_args = call_site
                    .type_args
                    .iter()
                    .copied()
                    .collect::<Vec<_>>();
                let is_cycle = path
                    .iter()
                    .any(|entry| entry.function == target && entry.type_args == effective_type_args);

                self.node_count += 1;
                let mut node_truncated = false;
                let grandchildren = if is_cycle {
                    Vec::new()
                } else {
                    path.push(PathEntry {
                        function: target,
                        type_args: effective_type_args.clone(),
                        effective_args: effective_args.clone(),
                    });
                    let g = self.expand(target, path, depth + 1, &mut node_truncated);
                    path.pop();
                    g
                };

                children.push(TrackerNode {
                    call_site: Some(cs_id),
                    resolved_callee: Some(target),
                    external: None,
                    effective_type_args: effective_type_args.clone(),
                    effective_args: effective_args.clone(),
                    children: grandchildren,
                    depth,
                    truncated: node_truncated,
                });
            }
        }

        children
    }

    /// The set of concrete functions this call site's callee resolves to —
    /// zero (opaque), one (direct / indirect / narrowed interface dispatch),
    /// or many (interface dispatch fanned out to every implementation).
    fn resolve_targets(&self, cs_id: CallSiteId, path: &[PathEntry]) -> Vec<FunctionId> {
        let call_site = self.store.call_site(cs_id);
        match &call_site.callee {
            Callee::Direct(f) => vec![*f],
            Callee::Indirect(var) => self.resolve_variable(*var, path).into_iter().collect(),
            Callee::InterfaceMethod {
                implementations,
                method,
                ..
            } => {
                let receiver_ty = call_site
                    .receiver
                    .as_ref()
                    .and_then(|r| self.concrete_type_of(r, path));
                if let Some(ty) = receiver_ty {
                    if let Some((package, name)) = named_type_of(ty, self.store) {
                        if let Some(&f) = self.methods.get(&(package, name, *method)) {
                            return vec![f];
                        }
                    }
                }
                let mut found: Vec<FunctionId> = implementations
                    .iter()
                    .filter_map(|ty| named_type_of(*ty, self.store))
                    .filter_map(|(package, name)| self.methods.get(&(package, name, *method)).copied())
                    .collect();
                found.sort_by_key(|f| self.store.function(*f).qualified_name(&self.store.pool, &self.store.types));
                found
            }
            Callee::Opaque | Callee::Unresolved(_) | Callee::External(_) => Vec::new(),
        }
    }

    /// Resolves a function-valued variable by walking backward: the last
    /// assignment to it in its own scope, or — if it was never assigned —
    /// the argument bound to it as a parameter at the enclosing call site
    /// on the current path (the options-pattern link).
    fn resolve_variable(&self, var: VariableId, path: &[PathEntry]) -> Option<FunctionId> {
        let variable = self.store.variable(var);

        if let Some(assignment) = self.last_assignment_to(var, variable.scope) {
            return match &assignment.rhs {
                Rhs::Other(arg) => self.resolve_callable(arg, path),
                _ => None,
            };
        }

        let frame = path.iter().rev().find(|entry| entry.function == variable.scope)?;
        let function = self.store.function(variable.scope);
        let idx = function.parameters.iter().position(|(name, _)| *name == variable.name)?;
        let arg = frame.effective_args.get(idx)?;
        self.resolve_callable(arg, path)
    }

    fn resolve_callable(&self, arg: &ArgRef, path: &[PathEntry]) -> Option<FunctionId> {
        match arg {
            ArgRef::FuncLit(f) => Some(*f),
            ArgRef::Ident(var) => self.resolve_variable(*var, path),
            ArgRef::Selector { base, field } => {
                let ty = self.concrete_type_of(base, path)?;
                let (package, name) = named_type_of(ty, self.store)?;
                self.methods.get(&(package, name, *field)).copied()
            }
            _ => None,
        }
    }

    /// Finds the textually-last assignment to `var` within `scope` — an
    /// approximation of "most recent along this path" that ignores
    /// branch-sensitive reassignment, acceptable for the straight-line
    /// configuration code this resolves (router setup, options application).
    fn last_assignment_to(&self, var: VariableId, scope: FunctionId) -> Option<&Assignment> {
        self.store
            .function(scope)
            .assignments
            .iter()
            .filter_map(|&id| {
                let a = self.store.assignment(id);
                if a.lhs.contains(&var) {
                    Some(a)
                } else {
                    None
                }
            })
            .last()
    }

    /// Best-effort concrete type of an `ArgRef`, used to narrow interface
    /// receivers and method-value selectors to a concrete implementation.
    fn concrete_type_of(&self, arg: &ArgRef, path: &[PathEntry]) -> Option<TypeId> {
        match arg {
            ArgRef::Composite { ty, .. } => Some(*ty),
            ArgRef::Ident(var) => {
                let variable = self.store.variable(*var);
                if let Some(ty) = variable.ty {
                    return Some(ty);
                }
                if let Some(assignment) = self.last_assignment_to(*var, variable.scope) {
                    return match &assignment.rhs {
                        Rhs::Composite { ty, .. } => Some(*ty),
                        Rhs::Other(inner) => self.concrete_type_of(inner, path),
                        Rhs::Call(_) => None,
                    };
                }
                None
            }
            ArgRef::Selector { base, .. } => self.concrete_type_of(base, path),
            _ => None,
        }
    }

    /// Substitutes the call's syntactic arguments with their best-known
    /// resolved value along the current path — chasing through assignments
    /// exactly like [`Self::resolve_variable`], but without requiring the
    /// result to be callable.
    fn substitute_args(&self, args: &[ArgRef], path: &[PathEntry]) -> Vec<ArgRef> {
        args.iter().map(|a| self.substitute_one(a, path)).collect()
    }

    fn substitute_one(&self, arg: &ArgRef, path: &[PathEntry]) -> ArgRef {
        match arg {
            ArgRef::Ident(var) => {
                let variable = self.store.variable(*var);
                if let Some(assignment) = self.last_assignment_to(*var, variable.scope) {
                    return match &assignment.rhs {
                        Rhs::Other(inner) => self.substitute_one(inner, path),
                        Rhs::Composite { ty, fields } => ArgRef::Composite {
                            ty: *ty,
                            fields: fields
                                .iter()
                                .map(|(k, v)| (*k, self.substitute_one(v, path)))
                                .collect(),
                        },
                        Rhs::Call(cs) => ArgRef::Call(*cs),
                    };
                }
                if let Some(frame) = path.iter().rev().find(|entry| entry.function == variable.scope) {
                    let function = self.store.function(variable.scope);
                    if let Some(idx) = function.parameters.iter().position(|(name, _)| *name == variable.name) {
                        if let Some(bound) = frame.effective_args.get(idx) {
                            return bound.clone();
                        }
                    }
                }
                arg.clone()
            }
            other => other.clone(),
        }
    }
}

fn named_type_of(ty: TypeId, store: &MetadataStore) -> Option<(Handle, Handle)> {
    match store.types.resolve(ty) {
        TypeDesc::Named { package, name, .. } => Some((package, name)),
        TypeDesc::Pointer(inner) => named_type_of(inner, store),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apispec_core::{CallSite, Function, Position, PackageBuilder, Variable};

    fn pos(store: &MetadataStore) -> Position {
        Position::new(store.pool.intern("f.go"), 1, 1)
    }

    #[test]
    fn builds_single_node_for_leaf_root() {
        let mut store = MetadataStore::new();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);
        let root = builder.push_function(Function {
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
        store.insert_package(builder);

        let index = CallGraphIndex::build(&store);
        let tree = TrackerBuilder::new(&store, &index, Limits::default()).build(root);
        assert_eq!(tree.depth, 0);
        assert!(tree.children.is_empty());
        assert_eq!(tree.resolved_callee, Some(root));
    }

    #[test]
    fn resolves_options_pattern_function_valued_parameter() {
        let mut store = MetadataStore::new();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);

        let handler = builder.push_function(Function {
            name: store.pool.intern("Handler"),
            package: pkg,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });

        let param_name = store.pool.intern("fn");
        let func_ty = store.types.intern(apispec_core::TypeDesc::Func(apispec_core::Signature {
            parameters: vec![],
            results: vec![],
            variadic: false,
        }));
        let callee_fn = builder.push_function(Function {
            name: store.pool.intern("Apply"),
            package: pkg,
            receiver: None,
            parameters: vec![(param_name, func_ty)],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });

        let var = builder.push_variable(Variable {
            name: param_name,
            scope: callee_fn,
            position: pos(&store),
            ty: None,
        });

        builder.push_call_site(
            callee_fn,
            CallSite {
                id: apispec_core::CallSiteId(0),
                caller: callee_fn,
                callee: Callee::Indirect(var),
                receiver: None,
                args: vec![],
                type_args: vec![],
                position: pos(&store),
            },
        );

        let root = builder.push_function(Function {
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
            root,
            CallSite {
                id: apispec_core::CallSiteId(0),
                caller: root,
                callee: Callee::Direct(callee_fn),
                receiver: None,
                args: vec![ArgRef::FuncLit(handler)],
                type_args: vec![],
                position: pos(&store),
            },
        );

        store.insert_package(builder);

        let index = CallGraphIndex::build(&store);
        let tree = TrackerBuilder::new(&store, &index, Limits::default()).build(root);

        let apply_node = &tree.children[0];
        assert_eq!(apply_node.resolved_callee, Some(callee_fn));
        let handler_node = &apply_node.children[0];
        assert_eq!(handler_node.resolved_callee, Some(handler));
    }

    #[test]
    fn trips_budget_at_max_nodes_per_tree_one_and_loses_no_root_routes() {
        let mut store = MetadataStore::new();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);

        let callee = builder.push_function(Function {
            name: store.pool.intern("Called"),
            package: pkg,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });
        let root = builder.push_function(Function {
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
            root,
            CallSite {
                id: apispec_core::CallSiteId(0),
                caller: root,
                callee: Callee::Direct(callee),
                receiver: None,
                args: vec![],
                type_args: vec![],
                position: pos(&store),
            },
        );
        store.insert_package(builder);

        let index = CallGraphIndex::build(&store);
        let limits = Limits {
            max_nodes_per_tree: 1,
            ..Limits::default()
        };
        let tree = TrackerBuilder::new(&store, &index, limits).build(root);

        assert_eq!(tree.resolved_callee, Some(root));
        assert!(tree.children.is_empty(), "budget must stop expansion before any child is added");
        assert!(tree.truncated, "root node should be marked truncated when its own budget trips");
    }
}
