//! End-to-end coverage over a hand-built call graph: entry-point discovery,
//! tracker expansion, route extraction, and document assembly wired together
//! exactly as `apispec-cli`'s analyze command runs them. Fixtures are built
//! with `PackageBuilder` rather than parsed from source text, the same way
//! every unit test in this workspace constructs its call graphs.

use apispec_core::{
    ArgRef, BasicKind, CallPattern, CallSite, CallSiteId, Callee, Capture, Constraint, Diagnostics,
    DiagnosticKind, DocInfo, Field, FrameworkConfig, Function, Limits, Literal, MetadataStore,
    PackageBuilder, Patterns, Position, TypeDesc, TypeOverrides, Variable,
};
use apispec_graph::CallGraphIndex;
use apispec_routes::{assemble, entry_points, RouteExtractor, Schema, SchemaSynthesizer};

fn pos(store: &MetadataStore, line: u32) -> Position {
    Position::new(store.pool.intern("main.go"), line, 1)
}

fn leaf(store: &MetadataStore, package: apispec_core::Handle, name: &str, line: u32) -> Function {
    Function {
        name: store.pool.intern(name),
        package,
        receiver: None,
        parameters: vec![],
        results: vec![],
        type_parameters: vec![],
        position: pos(store, line),
        call_sites: vec![],
        assignments: vec![],
    }
}

fn str_arg(store: &MetadataStore, text: &str) -> ArgRef {
    ArgRef::Literal(Literal::Str(store.pool.intern(text)))
}

/// A chi-shaped configuration: `.Get`/`.Mount` are external calls (chi's
/// body is never parsed), matched by the suffix of their qualified name the
/// same way the bundled chi framework config does.
fn chi_like_config() -> FrameworkConfig {
    FrameworkConfig {
        info: DocInfo::default(),
        limits: Limits::default(),
        analysis: Default::default(),
        patterns: Patterns {
            router_constructors: vec![],
            mount: vec![CallPattern {
                name: "mount".to_string(),
                all_of: vec![Constraint::FunctionName {
                    regex: r"\.Mount$".to_string(),
                }],
                captures: vec![
                    Capture {
                        name: "prefix".to_string(),
                        source: "0".to_string(),
                    },
                    Capture {
                        name: "child-router".to_string(),
                        source: "1".to_string(),
                    },
                ],
            }],
            group: vec![],
            route_registrations: vec![CallPattern {
                name: "get".to_string(),
                all_of: vec![Constraint::FunctionName {
                    regex: r"\.Get$".to_string(),
                }],
                captures: vec![
                    Capture {
                        name: "method".to_string(),
                        source: "literal:GET".to_string(),
                    },
                    Capture {
                        name: "path".to_string(),
                        source: "0".to_string(),
                    },
                    Capture {
                        name: "handler".to_string(),
                        source: "1".to_string(),
                    },
                ],
            }],
            request_decoders: vec![],
            response_encoders: vec![CallPattern {
                name: "json_encode".to_string(),
                all_of: vec![
                    Constraint::ReceiverType {
                        regex: r"^encoding/json\.Encoder$".to_string(),
                        version_agnostic: false,
                    },
                    Constraint::FunctionName {
                        regex: r"\.Encode$".to_string(),
                    },
                ],
                captures: vec![
                    Capture {
                        name: "status-code".to_string(),
                        source: "literal:200".to_string(),
                    },
                    Capture {
                        name: "body-type".to_string(),
                        source: "0".to_string(),
                    },
                ],
            }],
        },
        path_param_syntax: Default::default(),
        type_overrides: TypeOverrides::new(),
    }
}

/// Builds a module with:
///   - a top-level `GET /users` (handler `GetUsers`, encodes a `[]User`)
///   - a router mounted at `/api/v1` with `GET /users` under it
///   - a router mounted at `/users` with `GET /` under it (the options
///     pattern: the child router is resolved through a variable, and its
///     root registration must keep its trailing slash once prefixed)
///   - a second, duplicate `GET /users` registered after the first
fn build_module() -> MetadataStore {
    let mut store = MetadataStore::new();
    let pkg = store.pool.intern("main");
    let mut builder = PackageBuilder::new(pkg);

    let get_users = builder.push_function(leaf(&store, pkg, "GetUsers", 10));
    let get_users_again = builder.push_function(leaf(&store, pkg, "GetUsersAgain", 11));
    let list_api_users = builder.push_function(leaf(&store, pkg, "ListUsersV1", 12));
    let list_users_root = builder.push_function(leaf(&store, pkg, "ListUsersRoot", 13));
    let main_fn = builder.push_function(leaf(&store, pkg, "main", 1));

    let id_field = store.pool.intern("ID");
    let id_ty = store.types.intern(TypeDesc::Basic(BasicKind::Int));
    let id_tag = store.pool.intern(r#"json:"id""#);
    let name_field = store.pool.intern("Name");
    let name_ty = store.types.intern(TypeDesc::Basic(BasicKind::String));
    let name_tag = store.pool.intern(r#"json:"name""#);
    let user_struct = store.types.intern(TypeDesc::Struct {
        fields: vec![
            Field {
                name: id_field,
                ty: id_ty,
                tag: Some(id_tag),
                embedded: false,
            },
            Field {
                name: name_field,
                ty: name_ty,
                tag: Some(name_tag),
                embedded: false,
            },
        ],
    });
    let user_name = store.pool.intern("User");
    builder.declare_type(user_name, user_struct);
    let user_ty = store.types.intern(TypeDesc::Named {
        package: pkg,
        name: user_name,
        type_args: vec![],
    });
    let users_slice_ty = store.types.intern(TypeDesc::Slice(user_ty));

    let r_var = builder.push_variable(Variable {
        name: store.pool.intern("r"),
        scope: main_fn,
        position: pos(&store, 1),
        ty: None,
    });
    let api_var = builder.push_variable(Variable {
        name: store.pool.intern("apiRouter"),
        scope: main_fn,
        position: pos(&store, 2),
        ty: None,
    });
    let users_var = builder.push_variable(Variable {
        name: store.pool.intern("usersRouter"),
        scope: main_fn,
        position: pos(&store, 3),
        ty: None,
    });
    let body_var = builder.push_variable(Variable {
        name: store.pool.intern("users"),
        scope: get_users,
        position: pos(&store, 10),
        ty: Some(users_slice_ty),
    });

    let get_handle = store.pool.intern("github.com/go-chi/chi/v5.Mux.Get");
    let mount_handle = store.pool.intern("github.com/go-chi/chi/v5.Mux.Mount");
    let encode_handle = store.pool.intern("encoding/json.Encoder.Encode");

    builder.push_call_site(
        main_fn,
        CallSite {
            id: CallSiteId(0),
            caller: main_fn,
            callee: Callee::External(get_handle),
            receiver: Some(ArgRef::Ident(r_var)),
            args: vec![str_arg(&store, "/users"), ArgRef::FuncLit(get_users)],
            type_args: vec![],
            position: pos(&store, 20),
        },
    );
    builder.push_call_site(
        main_fn,
        CallSite {
            id: CallSiteId(0),
            caller: main_fn,
            callee: Callee::External(mount_handle),
            receiver: Some(ArgRef::Ident(r_var)),
            args: vec![str_arg(&store, "/api/v1"), ArgRef::Ident(api_var)],
            type_args: vec![],
            position: pos(&store, 21),
        },
    );
    builder.push_call_site(
        main_fn,
        CallSite {
            id: CallSiteId(0),
            caller: main_fn,
            callee: Callee::External(mount_handle),
            receiver: Some(ArgRef::Ident(r_var)),
            args: vec![str_arg(&store, "/users"), ArgRef::Ident(users_var)],
            type_args: vec![],
            position: pos(&store, 22),
        },
    );
    builder.push_call_site(
        main_fn,
        CallSite {
            id: CallSiteId(0),
            caller: main_fn,
            callee: Callee::External(get_handle),
            receiver: Some(ArgRef::Ident(api_var)),
            args: vec![str_arg(&store, "/users"), ArgRef::FuncLit(list_api_users)],
            type_args: vec![],
            position: pos(&store, 23),
        },
    );
    builder.push_call_site(
        main_fn,
        CallSite {
            id: CallSiteId(0),
            caller: main_fn,
            callee: Callee::External(get_handle),
            receiver: Some(ArgRef::Ident(users_var)),
            args: vec![str_arg(&store, "/"), ArgRef::FuncLit(list_users_root)],
            type_args: vec![],
            position: pos(&store, 24),
        },
    );
    builder.push_call_site(
        main_fn,
        CallSite {
            id: CallSiteId(0),
            caller: main_fn,
            callee: Callee::External(get_handle),
            receiver: Some(ArgRef::Ident(r_var)),
            args: vec![str_arg(&store, "/users"), ArgRef::FuncLit(get_users_again)],
            type_args: vec![],
            position: pos(&store, 25),
        },
    );

    builder.push_call_site(
        get_users,
        CallSite {
            id: CallSiteId(0),
            caller: get_users,
            callee: Callee::External(encode_handle),
            receiver: None,
            args: vec![ArgRef::Ident(body_var)],
            type_args: vec![],
            position: pos(&store, 14),
        },
    );

    store.insert_package(builder);
    store
}

#[test]
fn end_to_end_extraction_resolves_prefixes_and_assigns_operation_ids() {
    let store = build_module();
    let index = CallGraphIndex::build(&store);
    let config = chi_like_config();
    let diagnostics = Diagnostics::new();

    let roots = entry_points(&store);
    assert_eq!(roots.len(), 1, "only the package-main main() should be picked as a root");

    let extractor = RouteExtractor::new(&store, &index, &config).expect("valid framework config");
    let routes = extractor.extract(&roots, &diagnostics);

    // Top-level route, mounted-with-prefix route, and root-of-mount route,
    // with the duplicate `GET /users` dropped.
    assert_eq!(routes.len(), 3);

    let top_level = routes.iter().find(|r| r.path == "/users").expect("top-level /users route");
    assert_eq!(top_level.operation_id, "getUsers");

    assert!(
        routes.iter().any(|r| r.path == "/api/v1/users"),
        "a route mounted under /api/v1 keeps the mount prefix"
    );
    assert!(
        routes.iter().any(|r| r.path == "/users/"),
        "a `/`-path route mounted at /users keeps its trailing slash once prefixed"
    );

    let dropped = diagnostics
        .snapshot()
        .into_iter()
        .any(|d| d.kind == DiagnosticKind::DuplicateRoute);
    assert!(dropped, "the second GET /users registration should be reported as a duplicate");

    let overrides = TypeOverrides::new();
    let synth = SchemaSynthesizer::new(&store, &overrides);
    let doc = assemble(&config.info, &routes, synth);

    let op = doc.paths["/users"].get.as_ref().expect("GET /users operation");
    assert_eq!(op.operation_id, "getUsers");
    let response = &op.responses["200"];
    let schema = &response.content.as_ref().expect("response content").get("application/json").unwrap().schema;
    match schema {
        Schema::Inline(inline) => {
            assert_eq!(inline.ty.as_deref(), Some("array"));
            match inline.items.as_deref() {
                Some(Schema::Ref(r)) => assert_eq!(r.reference, "#/components/schemas/User"),
                _ => panic!("expected the array's items to reference the User schema"),
            }
        }
        Schema::Ref(_) => panic!("expected an inline array schema"),
    }

    let user_schema = doc.components.schemas.get("User").expect("User schema registered");
    assert!(user_schema.properties.as_ref().unwrap().contains_key("id"));
    assert!(user_schema.properties.as_ref().unwrap().contains_key("name"));

    assert!(doc.paths["/api/v1/users"].get.is_some());
    assert!(doc.paths["/users/"].get.is_some());
}
