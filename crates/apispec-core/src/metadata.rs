use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::pool::{Handle, StringPool};
use crate::position::Position;
use crate::types::{TypeId, TypeTable};

macro_rules! index_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_id!(FunctionId);
index_id!(CallSiteId);
index_id!(VariableId);
index_id!(AssignmentId);

/// One package per import path per module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub import_path: Handle,
    pub files: HashMap<Handle, File>,
    pub types: Vec<TypeId>,
    /// Type name to underlying shape: resolves a `TypeDesc::Named` reference
    /// seen at a use site (a field, parameter, or receiver type) to the
    /// `Struct`/`Interface`/alias descriptor declared for that name. The
    /// schema synthesizer and the interface-implementation search both walk
    /// through this rather than through `Named` itself, since `Named` only
    /// carries a package/name pair, not a shape.
    pub declared_types: HashMap<Handle, TypeId>,
    pub variables: Vec<VariableId>,
    pub functions: Vec<FunctionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub path: Handle,
    /// `(local alias, import path)`, in source order.
    pub imports: Vec<(Handle, Handle)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: Handle,
    pub package: Handle,
    pub receiver: Option<TypeId>,
    pub parameters: Vec<(Handle, TypeId)>,
    pub results: Vec<TypeId>,
    pub type_parameters: Vec<TypeId>,
    pub position: Position,
    /// Call sites textually occurring in this function's body, in source
    /// order — the tracker relies on this order for deterministic child
    /// ordering.
    pub call_sites: Vec<CallSiteId>,
    pub assignments: Vec<AssignmentId>,
}

impl Function {
    /// `package-path.type.method` when a method, `package-path.function`
    /// otherwise — the form the pattern matcher's function-name pattern
    /// matches against.
    pub fn qualified_name(&self, pool: &StringPool, types: &TypeTable) -> String {
        let package = pool.resolve(self.package);
        let name = pool.resolve(self.name);
        match self.receiver {
            Some(recv) => {
                let type_name = receiver_type_name(recv, pool, types);
                format!("{package}.{type_name}.{name}")
            }
            None => format!("{package}.{name}"),
        }
    }
}

fn receiver_type_name(ty: TypeId, pool: &StringPool, types: &TypeTable) -> String {
    use crate::types::TypeDesc;
    match types.resolve(ty) {
        TypeDesc::Named { name, .. } => pool.resolve(name).to_string(),
        TypeDesc::Pointer(inner) => receiver_type_name(inner, pool, types),
        _ => "?".to_string(),
    }
}

/// A literal value captured at an argument position, kept as syntax, not as
/// an evaluated value — string/int/bool/nil literals are the only ones the
/// pattern matcher and schema synthesizer need to read back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Handle),
    Nil,
}

/// Enough information to reconstruct an argument's value statically at a
/// call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArgRef {
    Literal(Literal),
    Ident(VariableId),
    Selector {
        base: Box<ArgRef>,
        field: Handle,
    },
    Composite {
        ty: TypeId,
        fields: Vec<(Handle, ArgRef)>,
    },
    Call(CallSiteId),
    FuncLit(FunctionId),
    /// Type information or value shape could not be determined statically.
    Opaque,
}

/// The callee of a call site after as much static resolution as the
/// extractor (C3) could perform. Indirect calls are resolved further by the
/// tracker (C5), which is why this is not collapsed to a single
/// `FunctionId` up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Callee {
    /// A direct call to a known function or a method on a receiver whose
    /// concrete type is known at the call site.
    Direct(FunctionId),
    /// A method call through an interface-typed receiver; `implementations`
    /// is the set of concrete types in the module whose method set
    /// satisfies the interface, computed by the extractor at record time.
    InterfaceMethod {
        interface: TypeId,
        method: Handle,
        implementations: Vec<TypeId>,
    },
    /// A call through a function-valued variable, a method value (`x.M`),
    /// or a parameter — resolved by the tracker by walking backward along
    /// the current path for the defining assignment.
    Indirect(VariableId),
    /// No type information was available; the call site is retained for
    /// diagnostics and visualization but never matched by route extraction.
    Opaque,
    /// A qualified call (`pkg.Name(...)` or `recv.Method(...)` on a concrete
    /// type declared in a package not yet merged) whose target couldn't be
    /// looked up during per-package extraction, because the whole-module
    /// function table only exists once every package has merged. Carries
    /// the candidate fully-qualified name (`import/path.Name` or
    /// `import/path.Type.Method`); resolved to `Direct`, `InterfaceMethod`,
    /// or `Opaque` by the extractor's linking pass once extraction
    /// finishes. No `MetadataStore` handed to later stages (C4 onward)
    /// should still contain this variant.
    Unresolved(Handle),
    /// A qualified call whose candidate name doesn't resolve to any function
    /// declared in the analyzed module — almost always a call into a
    /// third-party package (a router constructor, a framework method) whose
    /// body was never parsed. Distinct from `Opaque`: the call's identity is
    /// known precisely, just not its implementation, so the pattern matcher
    /// (C6) still matches against the carried name exactly as it would a
    /// resolved function's qualified name. Produced only by the extractor's
    /// linking pass.
    External(Handle),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSite {
    pub id: CallSiteId,
    pub caller: FunctionId,
    pub callee: Callee,
    pub receiver: Option<ArgRef>,
    pub args: Vec<ArgRef>,
    pub type_args: Vec<TypeId>,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: Handle,
    pub scope: FunctionId,
    pub position: Position,
    /// Declared or inferred type, when the extractor could determine one —
    /// the tracker needs this to resolve method-value selectors (`x.M`) and
    /// to narrow interface-typed receivers to a concrete type along a path.
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Rhs {
    Call(CallSiteId),
    Composite {
        ty: TypeId,
        fields: Vec<(Handle, ArgRef)>,
    },
    Other(ArgRef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub lhs: Vec<VariableId>,
    pub rhs: Rhs,
    pub scope: FunctionId,
    pub position: Position,
}

/// The fully-resolved program model (C2): a string pool, a type table,
/// per-package symbol tables, and the flat call/variable/assignment tables
/// that the call-graph index (C4) and tracker (C5) read by id. Built once
/// per analysis run and immutable thereafter — nothing mutates a
/// `MetadataStore` after [`MetadataStore::finish`] returns it from the
/// extraction phase.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetadataStore {
    pub pool: StringPool,
    pub types: TypeTable,
    packages: HashMap<Handle, Package>,
    functions: Vec<Function>,
    call_sites: Vec<CallSite>,
    variables: Vec<Variable>,
    assignments: Vec<Assignment>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn package(&self, import_path: Handle) -> Option<&Package> {
        self.packages.get(&import_path)
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId(i as u32), f))
    }

    pub fn call_site(&self, id: CallSiteId) -> &CallSite {
        &self.call_sites[id.index()]
    }

    pub fn call_sites(&self) -> impl Iterator<Item = &CallSite> {
        self.call_sites.iter()
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn assignment(&self, id: AssignmentId) -> &Assignment {
        &self.assignments[id.index()]
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter()
    }

    /// Overwrites one call site's callee in place. Used exclusively by the
    /// extractor's post-merge linking pass to turn `Callee::Unresolved`
    /// markers into `Direct`/`InterfaceMethod`/`Opaque` once every package's
    /// functions are visible store-wide.
    pub fn set_callee(&mut self, id: CallSiteId, callee: Callee) {
        self.call_sites[id.index()].callee = callee;
    }

    /// Resolves a `TypeDesc::Named` reference to the underlying shape
    /// declared for it, following `Pointer` once if needed. `None` when the
    /// package isn't known or the name has no declaration (built-in types,
    /// or types declared in packages outside the analyzed module).
    pub fn resolve_named(&self, package: Handle, name: Handle) -> Option<TypeId> {
        self.packages
            .get(&package)
            .and_then(|pkg| pkg.declared_types.get(&name))
            .copied()
    }

    /// Inserts a package's extraction result. Each call owns a distinct
    /// `import_path` slot; the global function/call-site/variable/assignment
    /// tables are append-only, so ids minted by [`PackageBuilder`] are
    /// remapped to their final, store-wide id here. Call exactly once per
    /// package, in a deterministic order (by import path), after the
    /// parallel per-package extraction phase completes — see
    /// `apispec-extract`'s pipeline for the fan-out/merge split.
    pub fn insert_package(&mut self, built: PackageBuilder) -> Handle {
        let import_path = built.import_path;
        let function_base = self.functions.len() as u32;
        let call_site_base = self.call_sites.len() as u32;
        let variable_base = self.variables.len() as u32;
        let assignment_base = self.assignments.len() as u32;

        let remap_fn = |id: FunctionId| FunctionId(id.0 + function_base);
        let remap_cs = |id: CallSiteId| CallSiteId(id.0 + call_site_base);
        let remap_var = |id: VariableId| VariableId(id.0 + variable_base);
        let remap_asn = |id: AssignmentId| AssignmentId(id.0 + assignment_base);

        let remap_argref = fn_remap_argref(remap_var, remap_cs, remap_fn);

        for mut function in built.functions {
            function.call_sites = function.call_sites.into_iter().map(remap_cs).collect();
            self.functions.push(function);
        }

        for mut call_site in built.call_sites {
            call_site.id = remap_cs(call_site.id);
            call_site.caller = remap_fn(call_site.caller);
            call_site.callee = match call_site.callee {
                Callee::Direct(f) => Callee::Direct(remap_fn(f)),
                Callee::InterfaceMethod {
                    interface,
                    method,
                    implementations,
                } => Callee::InterfaceMethod {
                    interface,
                    method,
                    implementations,
                },
                Callee::Indirect(v) => Callee::Indirect(remap_var(v)),
                Callee::Opaque => Callee::Opaque,
                Callee::Unresolved(name) => Callee::Unresolved(name),
                Callee::External(name) => Callee::External(name),
            };
            call_site.receiver = call_site.receiver.map(&remap_argref);
            call_site.args = call_site.args.into_iter().map(&remap_argref).collect();
            self.call_sites.push(call_site);
        }

        for mut variable in built.variables {
            variable.scope = remap_fn(variable.scope);
            self.variables.push(variable);
        }

        for mut assignment in built.assignments {
            assignment.id = remap_asn(assignment.id);
            assignment.lhs = assignment.lhs.into_iter().map(remap_var).collect();
            assignment.scope = remap_fn(assignment.scope);
            assignment.rhs = match assignment.rhs {
                Rhs::Call(c) => Rhs::Call(remap_cs(c)),
                Rhs::Composite { ty, fields } => Rhs::Composite {
                    ty,
                    fields: fields
                        .into_iter()
                        .map(|(k, v)| (k, remap_argref(v)))
                        .collect(),
                },
                Rhs::Other(a) => Rhs::Other(remap_argref(a)),
            };
            self.assignments.push(assignment);
        }

        let package = Package {
            import_path,
            files: built.files,
            types: built.types,
            declared_types: built.declared_types,
            variables: built
                .package_variables
                .into_iter()
                .map(remap_var)
                .collect(),
            functions: built
                .package_functions
                .into_iter()
                .map(remap_fn)
                .collect(),
        };
        self.packages.insert(import_path, package);
        import_path
    }

    /// Splits the store into the three on-disk sections named by the split
    /// form: `string-pool`, `packages`, and `call-graph`. Written out
    /// separately for debugging; [`MetadataStore::from_split`] reassembles
    /// them losslessly.
    pub fn to_split(&self) -> SplitMetadata {
        SplitMetadata {
            string_pool: self.pool.to_vec(),
            packages: self.packages.clone(),
            call_graph: CallGraphTables {
                types: self.types.to_vec(),
                functions: self.functions.clone(),
                call_sites: self.call_sites.clone(),
                variables: self.variables.clone(),
                assignments: self.assignments.clone(),
            },
        }
    }

    /// Rebuilds a store from its split form. Relies on
    /// [`StringPool::from_vec`] and [`TypeTable::from_vec`] re-interning in
    /// the exact order they were dumped, so every [`Handle`] and [`TypeId`]
    /// referenced elsewhere in the split data stays valid.
    pub fn from_split(split: SplitMetadata) -> Self {
        Self {
            pool: StringPool::from_vec(split.string_pool),
            types: TypeTable::from_vec(split.call_graph.types),
            packages: split.packages,
            functions: split.call_graph.functions,
            call_sites: split.call_graph.call_sites,
            variables: split.call_graph.variables,
            assignments: split.call_graph.assignments,
        }
    }
}

/// The `call-graph` section of the split form: everything keyed by the flat
/// id tables rather than by package.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallGraphTables {
    pub types: Vec<crate::types::TypeDesc>,
    pub functions: Vec<Function>,
    pub call_sites: Vec<CallSite>,
    pub variables: Vec<Variable>,
    pub assignments: Vec<Assignment>,
}

/// The split on-disk form of a [`MetadataStore`]: `string-pool`, `packages`,
/// and `call-graph` written as independent sections. Must round-trip
/// losslessly with the combined form produced by serializing `MetadataStore`
/// directly.
#[derive(Debug, Serialize, Deserialize)]
pub struct SplitMetadata {
    pub string_pool: Vec<String>,
    pub packages: HashMap<Handle, Package>,
    pub call_graph: CallGraphTables,
}

fn fn_remap_argref(
    remap_var: impl Fn(VariableId) -> VariableId + Copy + 'static,
    remap_cs: impl Fn(CallSiteId) -> CallSiteId + Copy + 'static,
    remap_fn: impl Fn(FunctionId) -> FunctionId + Copy + 'static,
) -> impl Fn(ArgRef) -> ArgRef + Copy {
    move |arg| remap_argref_impl(arg, remap_var, remap_cs, remap_fn)
}

fn remap_argref_impl(
    arg: ArgRef,
    remap_var: impl Fn(VariableId) -> VariableId + Copy + 'static,
    remap_cs: impl Fn(CallSiteId) -> CallSiteId + Copy + 'static,
    remap_fn: impl Fn(FunctionId) -> FunctionId + Copy + 'static,
) -> ArgRef {
    match arg {
        ArgRef::Literal(l) => ArgRef::Literal(l),
        ArgRef::Ident(v) => ArgRef::Ident(remap_var(v)),
        ArgRef::Selector { base, field } => ArgRef::Selector {
            base: Box::new(remap_argref_impl(*base, remap_var, remap_cs, remap_fn)),
            field,
        },
        ArgRef::Composite { ty, fields } => ArgRef::Composite {
            ty,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k, remap_argref_impl(v, remap_var, remap_cs, remap_fn)))
                .collect(),
        },
        ArgRef::Call(c) => ArgRef::Call(remap_cs(c)),
        ArgRef::FuncLit(f) => ArgRef::FuncLit(remap_fn(f)),
        ArgRef::Opaque => ArgRef::Opaque,
    }
}

/// Accumulates one package's extraction result with locally-scoped ids
/// (starting at 0); [`MetadataStore::insert_package`] remaps them to
/// store-wide ids on merge. This is what lets C3 fan out over packages with
/// rayon without any cross-package lock contention — each package builds
/// its own `PackageBuilder` independently and merge is a fast, sequential,
/// deterministic reduce.
#[derive(Debug, Default)]
pub struct PackageBuilder {
    pub import_path: Handle,
    pub files: HashMap<Handle, File>,
    pub types: Vec<TypeId>,
    pub declared_types: HashMap<Handle, TypeId>,
    pub package_variables: Vec<VariableId>,
    pub package_functions: Vec<FunctionId>,
    pub functions: Vec<Function>,
    pub call_sites: Vec<CallSite>,
    pub variables: Vec<Variable>,
    pub assignments: Vec<Assignment>,
}

impl PackageBuilder {
    pub fn new(import_path: Handle) -> Self {
        Self {
            import_path,
            ..Default::default()
        }
    }

    pub fn push_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(function);
        self.package_functions.push(id);
        id
    }

    /// Records `name`'s underlying shape (struct, interface, or anything
    /// else a `type` declaration can name) for later `Named` resolution.
    pub fn declare_type(&mut self, name: Handle, underlying: TypeId) {
        self.types.push(underlying);
        self.declared_types.insert(name, underlying);
    }

    pub fn push_call_site(&mut self, caller: FunctionId, mut call_site: CallSite) -> CallSiteId {
        let id = CallSiteId(self.call_sites.len() as u32);
        call_site.id = id;
        call_site.caller = caller;
        self.call_sites.push(call_site);
        self.functions[caller.index()].call_sites.push(id);
        id
    }

    pub fn push_variable(&mut self, variable: Variable) -> VariableId {
        let id = VariableId(self.variables.len() as u32);
        self.variables.push(variable);
        self.package_variables.push(id);
        id
    }

    pub fn push_assignment(&mut self, scope: FunctionId, mut assignment: Assignment) -> AssignmentId {
        let id = AssignmentId(self.assignments.len() as u32);
        assignment.id = id;
        assignment.scope = scope;
        self.assignments.push(assignment);
        self.functions[scope.index()].assignments.push(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(store: &MetadataStore, line: u32) -> Position {
        Position::new(store.pool.intern("f.go"), line, 1)
    }

    fn leaf_function(store: &MetadataStore, package: Handle, name: &str, position: Position) -> Function {
        Function {
            name: store.pool.intern(name),
            package,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position,
            call_sites: vec![],
            assignments: vec![],
        }
    }

    /// Each package builds its function/call-site/variable/assignment ids
    /// starting at 0; merging two packages into one store must offset the
    /// second package's ids so neither its own internal cross-references
    /// nor the store's flat tables collide with the first package's.
    #[test]
    fn insert_package_remaps_ids_across_a_merge_without_collisions() {
        let mut store = MetadataStore::new();

        let pkg_a = store.pool.intern("mod/a");
        let mut builder_a = PackageBuilder::new(pkg_a);
        let a_callee = builder_a.push_function(leaf_function(&store, pkg_a, "Callee", pos(&store, 1)));
        let a_caller = builder_a.push_function(leaf_function(&store, pkg_a, "Caller", pos(&store, 2)));
        let a_var = builder_a.push_variable(Variable {
            name: store.pool.intern("v"),
            scope: a_caller,
            position: pos(&store, 2),
            ty: None,
        });
        let a_cs = builder_a.push_call_site(
            a_caller,
            CallSite {
                id: CallSiteId(0),
                caller: a_caller,
                callee: Callee::Direct(a_callee),
                receiver: None,
                args: vec![ArgRef::Ident(a_var)],
                type_args: vec![],
                position: pos(&store, 2),
            },
        );
        builder_a.push_assignment(
            a_caller,
            Assignment {
                id: AssignmentId(0),
                lhs: vec![a_var],
                rhs: Rhs::Call(a_cs),
                scope: a_caller,
                position: pos(&store, 2),
            },
        );
        store.insert_package(builder_a);

        let pkg_b = store.pool.intern("mod/b");
        let mut builder_b = PackageBuilder::new(pkg_b);
        let b_callee = builder_b.push_function(leaf_function(&store, pkg_b, "OtherCallee", pos(&store, 10)));
        let b_caller = builder_b.push_function(leaf_function(&store, pkg_b, "OtherCaller", pos(&store, 11)));
        let b_var = builder_b.push_variable(Variable {
            name: store.pool.intern("w"),
            scope: b_caller,
            position: pos(&store, 11),
            ty: None,
        });
        let b_cs = builder_b.push_call_site(
            b_caller,
            CallSite {
                id: CallSiteId(0),
                caller: b_caller,
                callee: Callee::Direct(b_callee),
                receiver: None,
                args: vec![ArgRef::Ident(b_var)],
                type_args: vec![],
                position: pos(&store, 11),
            },
        );
        builder_b.push_assignment(
            b_caller,
            Assignment {
                id: AssignmentId(0),
                lhs: vec![b_var],
                rhs: Rhs::Call(b_cs),
                scope: b_caller,
                position: pos(&store, 11),
            },
        );
        store.insert_package(builder_b);

        // Store-wide tables now hold four functions, two call sites, two
        // variables, and two assignments; nothing from package b aliases an
        // id package a already used.
        assert_eq!(store.functions.len(), 4);
        assert_eq!(store.call_sites.len(), 2);
        assert_eq!(store.variables.len(), 2);
        assert_eq!(store.assignments.len(), 2);

        let merged_b_caller = store
            .functions()
            .find(|(_, f)| store.pool.resolve(f.name) == "OtherCaller")
            .map(|(id, _)| id)
            .expect("OtherCaller present after merge");
        assert_ne!(merged_b_caller, a_caller, "package b's caller must not collide with package a's");

        // The remapped call site still points at the remapped caller and
        // callee, and the remapped assignment's Call rhs still points at the
        // remapped call site — the merge preserves every cross-reference.
        let merged_b_function = store.function(merged_b_caller);
        assert_eq!(merged_b_function.call_sites.len(), 1);
        let merged_cs_id = merged_b_function.call_sites[0];
        let merged_cs = store.call_site(merged_cs_id);
        assert_eq!(merged_cs.caller, merged_b_caller);
        match &merged_cs.callee {
            Callee::Direct(callee) => {
                assert_eq!(store.pool.resolve(store.function(*callee).name), "OtherCallee");
            }
            _ => panic!("expected a direct callee"),
        }

        let merged_assignment_id = merged_b_function.assignments[0];
        let merged_assignment = store.assignment(merged_assignment_id);
        assert_eq!(merged_assignment.scope, merged_b_caller);
        match &merged_assignment.rhs {
            Rhs::Call(cs) => assert_eq!(*cs, merged_cs_id),
            _ => panic!("expected a call rhs"),
        }

        let package_b = store.package(pkg_b).expect("package b present");
        assert_eq!(package_b.functions.len(), 2);
        assert!(package_b.functions.contains(&merged_b_caller));
    }

    /// The combined form (serializing `MetadataStore` directly) and the
    /// split form (`string-pool` / `packages` / `call-graph` sections) must
    /// agree: both round-trip the same handles, ids, and names.
    #[test]
    fn combined_form_and_split_form_round_trip_to_identical_data() {
        let mut store = MetadataStore::new();
        let pkg = store.pool.intern("mod/a");
        let mut builder = PackageBuilder::new(pkg);
        let handler = builder.push_function(leaf_function(&store, pkg, "Handler", pos(&store, 1)));
        store.insert_package(builder);

        let combined_json = serde_json::to_string(&store).expect("combined form serializes");
        let via_combined: MetadataStore =
            serde_json::from_str(&combined_json).expect("combined form deserializes");

        let split_json = serde_json::to_string(&store.to_split()).expect("split form serializes");
        let split: SplitMetadata = serde_json::from_str(&split_json).expect("split form deserializes");
        let via_split = MetadataStore::from_split(split);

        for restored in [&via_combined, &via_split] {
            assert_eq!(&*restored.pool.resolve(pkg), "mod/a");
            assert_eq!(&*restored.pool.resolve(restored.function(handler).name), "Handler");
            assert_eq!(restored.packages().count(), 1);
            assert_eq!(restored.functions().count(), 1);
        }
    }
}
