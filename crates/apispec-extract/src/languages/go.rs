//! Go source extraction (C3): walks each package's parsed files with
//! tree-sitter and populates a [`PackageBuilder`] with functions, call
//! sites, variables, and assignments, following the Call-site/Assignment
//! contract. Runs in three sub-passes over a package's files so that
//! forward references — a function calling one declared later in the same
//! package, a method receiver on a type declared in another file — resolve
//! without needing a second package-wide pass:
//!
//!   1. type declarations (struct/interface/alias) — populates the
//!      package's declared-type table.
//!   2. function/method signatures — populates the package's function
//!      table, now that every type name is known.
//!   3. function/method bodies — call sites, assignments, composite
//!      literals; resolved against the tables built in (1) and (2).
//!
//! Calls that can't be resolved within the package (qualified calls through
//! an import, and all method calls) are left as [`Callee::Unresolved`] with
//! a candidate fully-qualified name; `apispec_extract::pipeline` resolves
//! those once every package in the module has been merged.

use hashbrown::HashMap;
use tree_sitter::{Node, Parser};

use apispec_core::{
    ArgRef, Assignment, AssignmentId, BasicKind, CallSite, CallSiteId, Callee, ChanDirection,
    Diagnostic, DiagnosticKind, Field, File as PkgFile, Function, FunctionId, Handle, Literal,
    PackageBuilder, Position, Rhs, Signature, StringPool, TypeDesc, TypeId, TypeTable, Variable,
    VariableId,
};

use super::extractor_utils::{children_by_field, intern, node_text, position_for, unquote};

/// Functions and operators the Go spec defines directly; calls to these are
/// never route-relevant and are recorded as opaque rather than chased
/// through the (nonexistent) cross-package link pass.
const BUILTINS: &[&str] = &[
    "make", "new", "len", "cap", "append", "copy", "delete", "panic", "recover", "close",
    "print", "println", "min", "max", "clear",
];

pub fn go_parser() -> Result<Parser, tree_sitter::LanguageError> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
    Ok(parser)
}

/// One file's worth of source plus its parsed tree, handed to
/// [`extract_package`] already grouped by package in `apispec-extract`'s
/// pipeline.
pub struct ParsedFile {
    pub path: Handle,
    pub source: String,
    pub tree: tree_sitter::Tree,
}

/// Extracts one package's files into a [`PackageBuilder`]. `import_path`
/// must already be interned. Soft failures (a construct the extractor
/// doesn't understand) are reported via `diagnostics` rather than aborting
/// the package.
pub fn extract_package(
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    files: &[ParsedFile],
    diagnostics: &mut Vec<Diagnostic>,
) -> PackageBuilder {
    let mut builder = PackageBuilder::new(import_path);
    let mut type_by_name: HashMap<Handle, TypeId> = HashMap::new();
    let mut fn_by_name: HashMap<Handle, FunctionId> = HashMap::new();
    let mut file_imports: Vec<HashMap<Handle, Handle>> = Vec::with_capacity(files.len());

    // Sub-pass 0: imports, per file.
    for file in files {
        let root = file.tree.root_node();
        let mut imports = HashMap::new();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "import_declaration" {
                collect_import_specs(&child, &file.source, pool, &mut imports);
            }
        }
        builder.files.insert(
            file.path,
            PkgFile {
                path: file.path,
                imports: imports.iter().map(|(&alias, &path)| (alias, path)).collect(),
            },
        );
        file_imports.push(imports);
    }

    // Sub-pass 1: type declarations.
    for file in files {
        let root = file.tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            if child.kind() == "type_declaration" {
                let mut spec_cursor = child.walk();
                for spec in child.children(&mut spec_cursor) {
                    if spec.kind() == "type_spec" {
                        register_type_spec(
                            &spec,
                            &file.source,
                            pool,
                            types,
                            import_path,
                            &mut builder,
                            &mut type_by_name,
                        );
                    }
                }
            }
        }
    }

    // Sub-pass 2: function/method signatures.
    for (file, imports) in files.iter().zip(file_imports.iter()) {
        let root = file.tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "function_declaration" => {
                    register_function(
                        &child,
                        &file.source,
                        file.path,
                        pool,
                        types,
                        import_path,
                        &type_by_name,
                        &mut builder,
                        &mut fn_by_name,
                    );
                }
                "method_declaration" => {
                    register_method(
                        &child,
                        &file.source,
                        file.path,
                        pool,
                        types,
                        import_path,
                        &type_by_name,
                        &mut builder,
                    );
                }
                _ => {}
            }
        }
        let _ = imports;
    }

    // Sub-pass 3: bodies.
    for (file, imports) in files.iter().zip(file_imports.iter()) {
        let root = file.tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            let (node, fn_id) = match child.kind() {
                "function_declaration" | "method_declaration" => {
                    let name_node = match child.child_by_field_name("name") {
                        Some(n) => n,
                        None => continue,
                    };
                    let name = intern(pool, node_text(&name_node, &file.source));
                    let fn_id = match lookup_declared_function(&child, &file.source, pool, &builder, &fn_by_name, import_path, &type_by_name) {
                        Some(id) => id,
                        None => continue,
                    };
                    let _ = name;
                    (child, fn_id)
                }
                _ => continue,
            };
            let mut ctx = BodyCtx {
                pool,
                types,
                import_path,
                type_by_name: &type_by_name,
                fn_by_name: &fn_by_name,
                imports,
                file: file.path,
                source: &file.source,
                current_fn: fn_id,
                var_env: HashMap::new(),
                diagnostics,
            };
            seed_parameters(&node, &mut ctx, &builder);
            if let Some(body) = node.child_by_field_name("body") {
                walk_block(&body, &mut ctx, &mut builder);
            }
        }
    }

    builder
}

fn collect_import_specs(
    decl: &Node,
    source: &str,
    pool: &StringPool,
    out: &mut HashMap<Handle, Handle>,
) {
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        match child.kind() {
            "import_spec" => record_import_spec(&child, source, pool, out),
            "import_spec_list" => {
                let mut inner = child.walk();
                for spec in child.children(&mut inner) {
                    if spec.kind() == "import_spec" {
                        record_import_spec(&spec, source, pool, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn record_import_spec(spec: &Node, source: &str, pool: &StringPool, out: &mut HashMap<Handle, Handle>) {
    let Some(path_node) = spec.child_by_field_name("path") else {
        return;
    };
    let path = unquote(node_text(&path_node, source));
    if path.is_empty() {
        return;
    }
    let path_handle = pool.intern(&path);
    let alias = match spec.child_by_field_name("name") {
        Some(n) => node_text(&n, source).to_string(),
        None => path.rsplit('/').next().unwrap_or(&path).to_string(),
    };
    if alias == "_" {
        return;
    }
    out.insert(pool.intern(&alias), path_handle);
}

fn register_type_spec(
    spec: &Node,
    source: &str,
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    builder: &mut PackageBuilder,
    type_by_name: &mut HashMap<Handle, TypeId>,
) {
    let Some(name_node) = spec.child_by_field_name("name") else {
        return;
    };
    let name = intern(pool, node_text(&name_node, source));
    let type_params = spec
        .child_by_field_name("type_parameters")
        .map(|n| parse_type_params(&n, source, pool, types))
        .unwrap_or_default();

    let named_ref = types.intern(TypeDesc::Named {
        package: import_path,
        name,
        type_args: type_params.clone(),
    });
    type_by_name.insert(name, named_ref);

    if let Some(ty_node) = spec.child_by_field_name("type") {
        let underlying = resolve_type_node(
            Some(ty_node),
            source,
            pool,
            types,
            import_path,
            type_by_name,
        );
        builder.declare_type(name, underlying);
    }
}

fn parse_type_params(node: &Node, source: &str, pool: &StringPool, types: &TypeTable) -> Vec<TypeId> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_parameter_declaration" {
            for name_node in children_by_field(&child, "name") {
                let name = intern(pool, node_text(&name_node, source));
                out.push(types.intern(TypeDesc::TypeParam {
                    name,
                    constraint: None,
                }));
            }
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn register_function(
    node: &Node,
    source: &str,
    file: Handle,
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    type_by_name: &HashMap<Handle, TypeId>,
    builder: &mut PackageBuilder,
    fn_by_name: &mut HashMap<Handle, FunctionId>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = intern(pool, node_text(&name_node, source));
    let (parameters, _variadic) = parse_parameters(node, source, pool, types, import_path, type_by_name);
    let results = parse_results(node, source, pool, types, import_path, type_by_name);
    let type_parameters = node
        .child_by_field_name("type_parameters")
        .map(|n| parse_type_params(&n, source, pool, types))
        .unwrap_or_default();

    let id = builder.push_function(Function {
        name,
        package: import_path,
        receiver: None,
        parameters,
        results,
        type_parameters,
        position: position_for(node, file),
        call_sites: Vec::new(),
        assignments: Vec::new(),
    });
    fn_by_name.insert(name, id);
}

#[allow(clippy::too_many_arguments)]
fn register_method(
    node: &Node,
    source: &str,
    file: Handle,
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    type_by_name: &HashMap<Handle, TypeId>,
    builder: &mut PackageBuilder,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = intern(pool, node_text(&name_node, source));

    let receiver_ty = node.child_by_field_name("receiver").and_then(|recv_list| {
        children_by_field(&recv_list, "type")
            .into_iter()
            .next()
            .map(|t| resolve_type_node(Some(t), source, pool, types, import_path, type_by_name))
    });

    let (parameters, _variadic) = parse_parameters(node, source, pool, types, import_path, type_by_name);
    let results = parse_results(node, source, pool, types, import_path, type_by_name);
    let type_parameters = node
        .child_by_field_name("type_parameters")
        .map(|n| parse_type_params(&n, source, pool, types))
        .unwrap_or_default();

    builder.push_function(Function {
        name,
        package: import_path,
        receiver: receiver_ty,
        parameters,
        results,
        type_parameters,
        position: position_for(node, file),
        call_sites: Vec::new(),
        assignments: Vec::new(),
    });
}

/// Re-finds the `FunctionId` minted for `node` in sub-pass 2, by scanning
/// the functions pushed so far in source order — cheaper than keeping a
/// node-id keyed side table across sub-passes, and packages rarely have
/// more than a few hundred declarations.
fn lookup_declared_function(
    node: &Node,
    source: &str,
    pool: &StringPool,
    builder: &PackageBuilder,
    fn_by_name: &HashMap<Handle, FunctionId>,
    _import_path: Handle,
    _type_by_name: &HashMap<Handle, TypeId>,
) -> Option<FunctionId> {
    let name_node = node.child_by_field_name("name")?;
    let name = intern(pool, node_text(&name_node, source));
    if node.kind() == "function_declaration" {
        return fn_by_name.get(&name).copied();
    }
    // method_declaration: sub-pass 2 doesn't key methods by name (receiver
    // types can repeat a method name across types), so re-find by name and
    // declaration line instead.
    let position_line = node.start_position().row;
    builder
        .functions
        .iter()
        .enumerate()
        .find(|(_, f)| f.name == name && f.position.line as usize == position_line + 1)
        .map(|(i, _)| FunctionId(i as u32))
}

fn parse_parameters(
    node: &Node,
    source: &str,
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    type_by_name: &HashMap<Handle, TypeId>,
) -> (Vec<(Handle, TypeId)>, bool) {
    let Some(list) = node.child_by_field_name("parameters") else {
        return (Vec::new(), false);
    };
    let mut out = Vec::new();
    let mut variadic = false;
    let mut cursor = list.walk();
    for decl in list.children(&mut cursor) {
        match decl.kind() {
            "parameter_declaration" => {
                let ty = resolve_type_node(
                    decl.child_by_field_name("type"),
                    source,
                    pool,
                    types,
                    import_path,
                    type_by_name,
                );
                let names = children_by_field(&decl, "name");
                if names.is_empty() {
                    out.push((intern(pool, "_"), ty));
                } else {
                    for name_node in names {
                        out.push((intern(pool, node_text(&name_node, source)), ty));
                    }
                }
            }
            "variadic_parameter_declaration" => {
                variadic = true;
                let elem = resolve_type_node(
                    decl.child_by_field_name("type"),
                    source,
                    pool,
                    types,
                    import_path,
                    type_by_name,
                );
                let ty = types.intern(TypeDesc::Slice(elem));
                let name = decl
                    .child_by_field_name("name")
                    .map(|n| intern(pool, node_text(&n, source)))
                    .unwrap_or_else(|| intern(pool, "_"));
                out.push((name, ty));
            }
            _ => {}
        }
    }
    (out, variadic)
}

fn parse_results(
    node: &Node,
    source: &str,
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    type_by_name: &HashMap<Handle, TypeId>,
) -> Vec<TypeId> {
    let Some(result) = node.child_by_field_name("result") else {
        return Vec::new();
    };
    match result.kind() {
        "parameter_list" => {
            let mut out = Vec::new();
            let mut cursor = result.walk();
            for decl in result.children(&mut cursor) {
                if decl.kind() == "parameter_declaration" {
                    let ty = resolve_type_node(
                        decl.child_by_field_name("type"),
                        source,
                        pool,
                        types,
                        import_path,
                        type_by_name,
                    );
                    let names = children_by_field(&decl, "name");
                    if names.is_empty() {
                        out.push(ty);
                    } else {
                        for _ in names {
                            out.push(ty);
                        }
                    }
                }
            }
            out
        }
        _ => vec![resolve_type_node(
            Some(result),
            source,
            pool,
            types,
            import_path,
            type_by_name,
        )],
    }
}

fn resolve_type_node(
    node: Option<Node>,
    source: &str,
    pool: &StringPool,
    types: &TypeTable,
    import_path: Handle,
    type_by_name: &HashMap<Handle, TypeId>,
) -> TypeId {
    let Some(node) = node else {
        return types.intern(TypeDesc::Unknown);
    };
    match node.kind() {
        "type_identifier" => {
            let text = node_text(&node, source);
            if let Some(basic) = basic_kind(text) {
                return types.intern(TypeDesc::Basic(basic));
            }
            let name = intern(pool, text);
            if let Some(&ty) = type_by_name.get(&name) {
                return ty;
            }
            types.intern(TypeDesc::Named {
                package: import_path,
                name,
                type_args: Vec::new(),
            })
        }
        "qualified_type" => {
            let pkg_text = node
                .child_by_field_name("package")
                .map(|n| node_text(&n, source))
                .unwrap_or_default();
            let name_text = node
                .child_by_field_name("name")
                .map(|n| node_text(&n, source))
                .unwrap_or_default();
            types.intern(TypeDesc::Named {
                package: pool.intern(pkg_text),
                name: pool.intern(name_text),
                type_args: Vec::new(),
            })
        }
        "pointer_type" => {
            let inner = node.named_child(0);
            types.intern(TypeDesc::Pointer(resolve_type_node(
                inner,
                source,
                pool,
                types,
                import_path,
                type_by_name,
            )))
        }
        "slice_type" => {
            let elem = node.child_by_field_name("element");
            types.intern(TypeDesc::Slice(resolve_type_node(
                elem,
                source,
                pool,
                types,
                import_path,
                type_by_name,
            )))
        }
        "array_type" => {
            let len = node
                .child_by_field_name("length")
                .map(|n| node_text(&n, source))
                .and_then(|t| t.parse::<u64>().ok())
                .unwrap_or(0);
            let elem = node.child_by_field_name("element");
            types.intern(TypeDesc::Array(
                len,
                resolve_type_node(elem, source, pool, types, import_path, type_by_name),
            ))
        }
        "map_type" => {
            let key = node.child_by_field_name("key");
            let value = node.child_by_field_name("value");
            types.intern(TypeDesc::Map {
                key: resolve_type_node(key, source, pool, types, import_path, type_by_name),
                value: resolve_type_node(value, source, pool, types, import_path, type_by_name),
            })
        }
        "channel_type" => {
            let text = node_text(&node, source);
            let direction = if text.starts_with("<-chan") {
                ChanDirection::Recv
            } else if text.ends_with("<-") || text.contains("chan<-") {
                ChanDirection::Send
            } else {
                ChanDirection::Both
            };
            let elem = node.child_by_field_name("value").or_else(|| node.named_child(0));
            types.intern(TypeDesc::Chan {
                direction,
                elem: resolve_type_node(elem, source, pool, types, import_path, type_by_name),
            })
        }
        "function_type" => {
            let (params, variadic) =
                parse_parameters(&node, source, pool, types, import_path, type_by_name);
            let results = parse_results(&node, source, pool, types, import_path, type_by_name);
            types.intern(TypeDesc::Func(Signature {
                parameters: params.into_iter().map(|(_, t)| t).collect(),
                results,
                variadic,
            }))
        }
        "interface_type" => {
            let mut methods = Vec::new();
            let mut cursor = node.walk();
            for spec in node.children(&mut cursor) {
                if spec.kind() == "method_spec" {
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let name = intern(pool, node_text(&name_node, source));
                    let (params, variadic) =
                        parse_parameters(&spec, source, pool, types, import_path, type_by_name);
                    let results = parse_results(&spec, source, pool, types, import_path, type_by_name);
                    methods.push((
                        name,
                        Signature {
                            parameters: params.into_iter().map(|(_, t)| t).collect(),
                            results,
                            variadic,
                        },
                    ));
                }
            }
            types.intern(TypeDesc::Interface { methods })
        }
        "struct_type" => {
            let mut fields = Vec::new();
            let Some(body) = node.child_by_field_name("body") else {
                return types.intern(TypeDesc::Struct { fields });
            };
            let mut cursor = body.walk();
            for decl in body.children(&mut cursor) {
                if decl.kind() != "field_declaration" {
                    continue;
                }
                let ty = resolve_type_node(
                    decl.child_by_field_name("type"),
                    source,
                    pool,
                    types,
                    import_path,
                    type_by_name,
                );
                let tag = decl
                    .child_by_field_name("tag")
                    .map(|t| pool.intern(&unquote(node_text(&t, source))));
                let names = children_by_field(&decl, "name");
                if names.is_empty() {
                    let embedded_name = decl
                        .child_by_field_name("type")
                        .map(|t| base_type_name(&t, source))
                        .unwrap_or_else(|| "_".to_string());
                    fields.push(Field {
                        name: intern(pool, &embedded_name),
                        ty,
                        tag,
                        embedded: true,
                    });
                } else {
                    for name_node in names {
                        fields.push(Field {
                            name: intern(pool, node_text(&name_node, source)),
                            ty,
                            tag,
                            embedded: false,
                        });
                    }
                }
            }
            types.intern(TypeDesc::Struct { fields })
        }
        "generic_type" => {
            let base = node.child_by_field_name("type");
            let args_node = node.child_by_field_name("type_arguments");
            let args = args_node
                .map(|n| {
                    let mut cursor = n.walk();
                    n.named_children(&mut cursor)
                        .map(|arg| {
                            resolve_type_node(Some(arg), source, pool, types, import_path, type_by_name)
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            match base.map(|b| types.resolve(resolve_type_node(
                Some(b),
                source,
                pool,
                types,
                import_path,
                type_by_name,
            ))) {
                Some(TypeDesc::Named { package, name, .. }) => {
                    types.intern(TypeDesc::Named { package, name, type_args: args })
                }
                _ => types.intern(TypeDesc::Unknown),
            }
        }
        _ => types.intern(TypeDesc::Unknown),
    }
}

fn base_type_name(node: &Node, source: &str) -> String {
    match node.kind() {
        "pointer_type" => node
            .named_child(0)
            .map(|c| base_type_name(&c, source))
            .unwrap_or_default(),
        "qualified_type" => node
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).to_string())
            .unwrap_or_default(),
        _ => node_text(node, source).to_string(),
    }
}

fn basic_kind(name: &str) -> Option<BasicKind> {
    Some(match name {
        "bool" => BasicKind::Bool,
        "int" => BasicKind::Int,
        "int8" => BasicKind::Int8,
        "int16" => BasicKind::Int16,
        "int32" | "rune" => BasicKind::Rune,
        "int64" => BasicKind::Int64,
        "uint" => BasicKind::Uint,
        "uint8" | "byte" => BasicKind::Byte,
        "uint16" => BasicKind::Uint16,
        "uint32" => BasicKind::Uint32,
        "uint64" => BasicKind::Uint64,
        "float32" => BasicKind::Float32,
        "float64" => BasicKind::Float64,
        "string" => BasicKind::String,
        "error" => BasicKind::Error,
        "any" => BasicKind::Any,
        _ => return None,
    })
}

/// Threaded through body extraction: everything needed to turn statements
/// and expressions into `CallSite`/`Variable`/`Assignment` records.
struct BodyCtx<'a> {
    pool: &'a StringPool,
    types: &'a TypeTable,
    import_path: Handle,
    type_by_name: &'a HashMap<Handle, TypeId>,
    fn_by_name: &'a HashMap<Handle, FunctionId>,
    imports: &'a HashMap<Handle, Handle>,
    file: Handle,
    source: &'a str,
    current_fn: FunctionId,
    /// name -> (variable, declared type if known)
    var_env: HashMap<Handle, (VariableId, Option<TypeId>)>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

/// Seeds the function's scope with its parameters. Each gets a `var_env`
/// entry with a sentinel `VariableId` — the real id is only minted the
/// first time the parameter is referenced, since most parameters are never
/// reassigned and so never need a [`Variable`] record at all.
fn seed_parameters(decl: &Node, ctx: &mut BodyCtx, builder: &PackageBuilder) {
    let func = &builder.functions[ctx.current_fn.index()];
    for (name, ty) in func.parameters.clone() {
        ctx.var_env.insert(name, (VariableId(u32::MAX), Some(ty)));
    }
    let _ = decl;
}

fn resolve_or_declare_var(
    name: Handle,
    position: Position,
    ctx: &mut BodyCtx,
    builder: &mut PackageBuilder,
    declared_ty: Option<TypeId>,
) -> VariableId {
    if let Some((id, ty)) = ctx.var_env.get(&name).copied() {
        if id.0 != u32::MAX {
            return id;
        }
        let resolved_ty = ty.or(declared_ty);
        let var_id = builder.push_variable(Variable {
            name,
            scope: ctx.current_fn,
            position,
            ty: resolved_ty,
        });
        ctx.var_env.insert(name, (var_id, resolved_ty));
        return var_id;
    }
    let var_id = builder.push_variable(Variable {
        name,
        scope: ctx.current_fn,
        position,
        ty: declared_ty,
    });
    ctx.var_env.insert(name, (var_id, declared_ty));
    var_id
}

fn walk_block(block: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) {
    let mut cursor = block.walk();
    for stmt in block.children(&mut cursor) {
        walk_statement(&stmt, ctx, builder);
    }
}

fn walk_statement(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) {
    match node.kind() {
        "block" => walk_block(node, ctx, builder),
        "short_var_declaration" => handle_var_decl(node, ctx, builder, true),
        "assignment_statement" => handle_var_decl(node, ctx, builder, false),
        "expression_statement" => {
            if let Some(inner) = node.named_child(0) {
                walk_expr_for_side_effects(&inner, ctx, builder);
            }
        }
        "go_statement" | "defer_statement" => {
            if let Some(call) = node.named_child(0) {
                if call.kind() == "call_expression" {
                    build_call_expr(&call, ctx, builder);
                }
            }
        }
        "return_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_expr_for_side_effects(&child, ctx, builder);
            }
        }
        "if_statement" => {
            if let Some(init) = node.child_by_field_name("initializer") {
                walk_statement(&init, ctx, builder);
            }
            if let Some(cond) = node.child_by_field_name("condition") {
                walk_expr_for_side_effects(&cond, ctx, builder);
            }
            if let Some(cons) = node.child_by_field_name("consequence") {
                walk_statement(&cons, ctx, builder);
            }
            if let Some(alt) = node.child_by_field_name("alternative") {
                walk_statement(&alt, ctx, builder);
            }
        }
        "for_statement" => {
            if let Some(init) = node.child_by_field_name("initializer") {
                walk_statement(&init, ctx, builder);
            }
            if let Some(cond) = node.child_by_field_name("condition") {
                walk_expr_for_side_effects(&cond, ctx, builder);
            }
            if let Some(update) = node.child_by_field_name("update") {
                walk_statement(&update, ctx, builder);
            }
            if let Some(body) = node.child_by_field_name("body") {
                walk_statement(&body, ctx, builder);
            }
        }
        "labeled_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_statement(&child, ctx, builder);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_statement(&child, ctx, builder);
            }
        }
    }
}

fn walk_expr_for_side_effects(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) {
    match node.kind() {
        "call_expression" => {
            build_call_expr(node, ctx, builder);
        }
        "func_literal" => {
            extract_func_literal(node, ctx, builder);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_expr_for_side_effects(&child, ctx, builder);
            }
        }
    }
}

fn handle_var_decl(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder, is_short: bool) {
    let left = children_by_field(node, "left");
    let right = children_by_field(node, "right");
    let position = position_for(node, ctx.file);

    if right.len() == 1 && left.len() > 1 {
        let rhs = build_rhs(&right[0], ctx, builder);
        let lhs_ids: Vec<_> = left
            .iter()
            .filter_map(|n| {
                if n.kind() != "identifier" {
                    return None;
                }
                let name = intern(ctx.pool, node_text(n, ctx.source));
                if name == ctx.pool.intern("_") {
                    return None;
                }
                let declared_ty = if is_short { None } else { None };
                Some(resolve_or_declare_var(name, position, ctx, builder, declared_ty))
            })
            .collect();
        let assignment = Assignment {
            id: AssignmentId(0),
            lhs: lhs_ids,
            rhs,
            scope: ctx.current_fn,
            position,
        };
        builder.push_assignment(ctx.current_fn, assignment);
        return;
    }

    for (lhs_node, rhs_node) in left.iter().zip(right.iter()) {
        if lhs_node.kind() != "identifier" {
            walk_expr_for_side_effects(rhs_node, ctx, builder);
            continue;
        }
        let name = intern(ctx.pool, node_text(lhs_node, ctx.source));
        if node_text(lhs_node, ctx.source) == "_" {
            walk_expr_for_side_effects(rhs_node, ctx, builder);
            continue;
        }
        let rhs = build_rhs(rhs_node, ctx, builder);
        let var_id = resolve_or_declare_var(name, position, ctx, builder, rhs_type_hint(&rhs));
        let assignment = Assignment {
            id: AssignmentId(0),
            lhs: vec![var_id],
            rhs,
            scope: ctx.current_fn,
            position,
        };
        builder.push_assignment(ctx.current_fn, assignment);
    }
}

fn rhs_type_hint(rhs: &Rhs) -> Option<TypeId> {
    match rhs {
        Rhs::Composite { ty, .. } => Some(*ty),
        _ => None,
    }
}

fn build_rhs(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) -> Rhs {
    match node.kind() {
        "call_expression" => Rhs::Call(build_call_expr(node, ctx, builder)),
        "composite_literal" => match build_arg_ref(node, ctx, builder) {
            ArgRef::Composite { ty, fields } => Rhs::Composite { ty, fields },
            other => Rhs::Other(other),
        },
        _ => Rhs::Other(build_arg_ref(node, ctx, builder)),
    }
}

fn build_arg_ref(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) -> ArgRef {
    match node.kind() {
        "interpreted_string_literal" | "raw_string_literal" => {
            ArgRef::Literal(Literal::Str(ctx.pool.intern(&unquote(node_text(node, ctx.source)))))
        }
        "int_literal" => ArgRef::Literal(Literal::Int(
            node_text(node, ctx.source).replace('_', "").parse().unwrap_or(0),
        )),
        "float_literal" => ArgRef::Literal(Literal::Float(
            node_text(node, ctx.source).replace('_', "").parse().unwrap_or(0.0),
        )),
        "true" => ArgRef::Literal(Literal::Bool(true)),
        "false" => ArgRef::Literal(Literal::Bool(false)),
        "nil" => ArgRef::Literal(Literal::Nil),
        "identifier" => {
            let text = node_text(node, ctx.source);
            match text {
                "true" => return ArgRef::Literal(Literal::Bool(true)),
                "false" => return ArgRef::Literal(Literal::Bool(false)),
                "nil" => return ArgRef::Literal(Literal::Nil),
                _ => {}
            }
            let name = intern(ctx.pool, text);
            if ctx.var_env.contains_key(&name) {
                let position = position_for(node, ctx.file);
                ArgRef::Ident(resolve_or_declare_var(name, position, ctx, builder, None))
            } else if let Some(&fn_id) = ctx.fn_by_name.get(&name) {
                // A bare reference to a package-level function (not a call):
                // `router.GET("/users", GetUsers)`. Treated the same as a
                // function literal so the tracker's `resolve_callable` picks
                // it up without a backward assignment walk.
                ArgRef::FuncLit(fn_id)
            } else {
                ArgRef::Opaque
            }
        }
        "selector_expression" => {
            let Some(operand) = node.child_by_field_name("operand") else {
                return ArgRef::Opaque;
            };
            let Some(field) = node.child_by_field_name("field") else {
                return ArgRef::Opaque;
            };
            let base = build_arg_ref(&operand, ctx, builder);
            ArgRef::Selector {
                base: Box::new(base),
                field: intern(ctx.pool, node_text(&field, ctx.source)),
            }
        }
        "call_expression" => ArgRef::Call(build_call_expr(node, ctx, builder)),
        "composite_literal" => build_composite_literal(node, ctx, builder),
        "func_literal" => ArgRef::FuncLit(extract_func_literal(node, ctx, builder)),
        "unary_expression" | "parenthesized_expression" => node
            .named_child(0)
            .map(|c| build_arg_ref(&c, ctx, builder))
            .unwrap_or(ArgRef::Opaque),
        _ => ArgRef::Opaque,
    }
}

fn build_composite_literal(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) -> ArgRef {
    let ty = node
        .child_by_field_name("type")
        .map(|t| resolve_type_node(Some(t), ctx.source, ctx.pool, ctx.types, ctx.import_path, ctx.type_by_name))
        .unwrap_or_else(|| ctx.types.intern(TypeDesc::Unknown));

    let mut fields = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for (i, elem) in body.named_children(&mut cursor).enumerate() {
            match elem.kind() {
                "keyed_element" => {
                    let key_text = elem
                        .child_by_field_name("key")
                        .map(|k| node_text(&k, ctx.source).to_string())
                        .unwrap_or_else(|| i.to_string());
                    let value = elem
                        .child_by_field_name("value")
                        .map(|v| build_arg_ref(&v, ctx, builder))
                        .unwrap_or(ArgRef::Opaque);
                    fields.push((ctx.pool.intern(&key_text), value));
                }
                _ => {
                    let value = build_arg_ref(&elem, ctx, builder);
                    fields.push((ctx.pool.intern(&i.to_string()), value));
                }
            }
        }
    }
    ArgRef::Composite { ty, fields }
}

fn extract_func_literal(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) -> FunctionId {
    let position = position_for(node, ctx.file);
    let (parameters, _variadic) = parse_parameters(node, ctx.source, ctx.pool, ctx.types, ctx.import_path, ctx.type_by_name);
    let results = parse_results(node, ctx.source, ctx.pool, ctx.types, ctx.import_path, ctx.type_by_name);

    let fn_id = builder.push_function(Function {
        name: intern(ctx.pool, "func"),
        package: ctx.import_path,
        receiver: None,
        parameters: parameters.clone(),
        results,
        type_parameters: Vec::new(),
        position,
        call_sites: Vec::new(),
        assignments: Vec::new(),
    });

    let mut child_env = ctx.var_env.clone();
    for (name, ty) in parameters {
        child_env.insert(name, (VariableId(u32::MAX), Some(ty)));
    }

    let mut child_ctx = BodyCtx {
        pool: ctx.pool,
        types: ctx.types,
        import_path: ctx.import_path,
        type_by_name: ctx.type_by_name,
        fn_by_name: ctx.fn_by_name,
        imports: ctx.imports,
        file: ctx.file,
        source: ctx.source,
        current_fn: fn_id,
        var_env: child_env,
        diagnostics: ctx.diagnostics,
    };
    if let Some(body) = node.child_by_field_name("body") {
        walk_block(&body, &mut child_ctx, builder);
    }
    fn_id
}

fn build_call_expr(node: &Node, ctx: &mut BodyCtx, builder: &mut PackageBuilder) -> CallSiteId {
    let position = position_for(node, ctx.file);
    let func_node = node.child_by_field_name("function");
    let args_node = node.child_by_field_name("arguments");

    let mut type_args = Vec::new();
    let (callee, receiver) = match func_node {
        Some(f) => resolve_callee(&f, ctx, builder, &mut type_args),
        None => (Callee::Opaque, None),
    };

    let args = args_node
        .map(|list| {
            let mut cursor = list.walk();
            list.named_children(&mut cursor)
                .map(|a| build_arg_ref(&a, ctx, builder))
                .collect()
        })
        .unwrap_or_default();

    let call_site = CallSite {
        id: CallSiteId(0),
        caller: ctx.current_fn,
        callee,
        receiver,
        args,
        type_args,
        position,
    };
    builder.push_call_site(ctx.current_fn, call_site)
}

fn resolve_callee(
    func_node: &Node,
    ctx: &mut BodyCtx,
    builder: &mut PackageBuilder,
    type_args: &mut Vec<TypeId>,
) -> (Callee, Option<ArgRef>) {
    match func_node.kind() {
        "identifier" => {
            let text = node_text(func_node, ctx.source);
            if BUILTINS.contains(&text) {
                return (Callee::Opaque, None);
            }
            let name = intern(ctx.pool, text);
            // A name already bound in scope is a func-valued variable or
            // parameter call (the options-pattern case) rather than a
            // package-level function, even if a function of the same name
            // also exists — shadowing follows Go's scoping rules.
            if ctx.var_env.contains_key(&name) {
                let var_id = resolve_or_declare_var(name, position_for(func_node, ctx.file), ctx, builder, None);
                return (Callee::Indirect(var_id), None);
            }
            match ctx.fn_by_name.get(&name) {
                Some(&id) => (Callee::Direct(id), None),
                None => (Callee::Opaque, None),
            }
        }
        "selector_expression" => {
            let Some(operand) = func_node.child_by_field_name("operand") else {
                return (Callee::Opaque, None);
            };
            let Some(field) = func_node.child_by_field_name("field") else {
                return (Callee::Opaque, None);
            };
            let field_text = node_text(&field, ctx.source);

            if operand.kind() == "identifier" {
                let operand_text = node_text(&operand, ctx.source);
                let operand_name = intern(ctx.pool, operand_text);
                if let Some(&target_pkg) = ctx.imports.get(&operand_name) {
                    let qualified = format!("{}.{}", ctx.pool.resolve(target_pkg), field_text);
                    return (Callee::Unresolved(ctx.pool.intern(&qualified)), None);
                }
            }

            let receiver = build_arg_ref(&operand, ctx, builder);
            let declared_ty = declared_type_of(&operand, ctx);
            match declared_ty {
                Some(ty) => {
                    let resolved = resolve_through_pointer(ty, ctx.types);
                    match ctx.types.resolve(resolved) {
                        TypeDesc::Named { package, name, .. } => {
                            let underlying = ctx
                                .type_by_name
                                .get(&name)
                                .map(|&t| ctx.types.resolve(t));
                            let method = intern(ctx.pool, field_text);
                            if matches!(underlying, Some(TypeDesc::Interface { .. })) {
                                (
                                    Callee::InterfaceMethod {
                                        interface: resolved,
                                        method,
                                        implementations: Vec::new(),
                                    },
                                    Some(receiver),
                                )
                            } else {
                                let qualified = format!(
                                    "{}.{}.{}",
                                    ctx.pool.resolve(package),
                                    ctx.pool.resolve(name),
                                    field_text
                                );
                                (Callee::Unresolved(ctx.pool.intern(&qualified)), Some(receiver))
                            }
                        }
                        _ => (Callee::Opaque, Some(receiver)),
                    }
                }
                None => {
                    ctx.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::OpaqueCallSite,
                        Some(position_for(func_node, ctx.file)),
                        format!("receiver type of `.{field_text}` call not statically known"),
                    ));
                    (Callee::Opaque, Some(receiver))
                }
            }
        }
        "index_expression" => {
            let base = func_node.child_by_field_name("operand");
            let index = func_node.child_by_field_name("index");
            if let Some(idx) = index {
                type_args.push(resolve_type_node(
                    Some(idx),
                    ctx.source,
                    ctx.pool,
                    ctx.types,
                    ctx.import_path,
                    ctx.type_by_name,
                ));
            }
            match base {
                Some(b) => resolve_callee(&b, ctx, builder, type_args),
                None => (Callee::Opaque, None),
            }
        }
        "parenthesized_expression" => match func_node.named_child(0) {
            Some(inner) => resolve_callee(&inner, ctx, builder, type_args),
            None => (Callee::Opaque, None),
        },
        _ => (Callee::Opaque, None),
    }
}

fn declared_type_of(node: &Node, ctx: &BodyCtx) -> Option<TypeId> {
    if node.kind() != "identifier" {
        return None;
    }
    let name = intern(ctx.pool, node_text(node, ctx.source));
    ctx.var_env.get(&name).and_then(|(_, ty)| *ty)
}

fn resolve_through_pointer(ty: TypeId, types: &TypeTable) -> TypeId {
    match types.resolve(ty) {
        TypeDesc::Pointer(inner) => resolve_through_pointer(inner, types),
        _ => ty,
    }
}
