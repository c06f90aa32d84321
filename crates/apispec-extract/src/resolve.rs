//! Cross-package linking: the tail half of C3. Per-package extraction
//! (`languages::go::extract_package`) can only resolve calls whose target
//! is declared in the same package, since the whole-module function table
//! doesn't exist until every package has merged into one [`MetadataStore`].
//! Everything else is left as [`Callee::Unresolved`] holding a candidate
//! fully-qualified name; [`link`] walks the merged store once and turns
//! those into `Direct`, `InterfaceMethod` (with implementations filled in),
//! or `Opaque` when nothing matches.

use hashbrown::HashMap;

use apispec_core::{
    Callee, Diagnostic, DiagnosticKind, FunctionId, Handle, MetadataStore, TypeDesc, TypeId,
};

pub fn link(store: &mut MetadataStore, diagnostics: &mut Vec<Diagnostic>) {
    let mut by_free_name: HashMap<String, FunctionId> = HashMap::new();
    let mut by_method_name: HashMap<String, FunctionId> = HashMap::new();
    let mut methods_by_type: HashMap<(Handle, Handle), Vec<Handle>> = HashMap::new();

    for (id, function) in store.functions() {
        let package_text = store.pool.resolve(function.package).to_string();
        let name_text = store.pool.resolve(function.name).to_string();
        match function.receiver {
            None => {
                by_free_name.insert(format!("{package_text}.{name_text}"), id);
            }
            Some(receiver) => {
                if let Some((pkg, type_name)) = named_type_of(receiver, store) {
                    let type_text = store.pool.resolve(type_name).to_string();
                    by_method_name.insert(format!("{package_text}.{type_text}.{name_text}"), id);
                    methods_by_type
                        .entry((pkg, type_name))
                        .or_default()
                        .push(function.name);
                }
            }
        }
    }

    let call_site_ids: Vec<_> = store.call_sites().map(|cs| cs.id).collect();
    for id in call_site_ids {
        let callee = store.call_site(id).callee.clone();
        let Callee::Unresolved(candidate) = callee else {
            continue;
        };
        let candidate_text = store.pool.resolve(candidate).to_string();
        let resolved = by_free_name
            .get(&candidate_text)
            .or_else(|| by_method_name.get(&candidate_text))
            .copied();
        match resolved {
            Some(target) => store.set_callee(id, Callee::Direct(target)),
            None => {
                // Not every unresolved candidate is a mistake: most are calls
                // into packages this analysis never parses (routers, the
                // standard library). Keep the qualified name live for C6
                // rather than collapsing to `Opaque`, which would make every
                // third-party framework call invisible to pattern matching.
                store.set_callee(id, Callee::External(candidate));
            }
        }
    }

    let interface_ids: Vec<_> = store
        .call_sites()
        .filter_map(|cs| match &cs.callee {
            Callee::InterfaceMethod { .. } => Some(cs.id),
            _ => None,
        })
        .collect();
    for id in interface_ids {
        let (interface, method) = match store.call_site(id).callee.clone() {
            Callee::InterfaceMethod {
                interface, method, ..
            } => (interface, method),
            _ => continue,
        };
        let required = match store.types.resolve(interface) {
            TypeDesc::Interface { methods } => methods.into_iter().map(|(n, _)| n).collect::<Vec<_>>(),
            _ => Vec::new(),
        };
        let mut implementations: Vec<TypeId> = methods_by_type
            .iter()
            .filter(|(_, owned)| required.iter().all(|m| owned.contains(m)))
            .map(|((pkg, name), _)| {
                store.types.intern(TypeDesc::Named {
                    package: *pkg,
                    name: *name,
                    type_args: Vec::new(),
                })
            })
            .collect();
        implementations.sort_by_key(|ty| qualified_type_name(*ty, store));
        if implementations.is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnknownHandler,
                Some(store.call_site(id).position),
                format!(
                    "interface method `{}` has no implementation in this module",
                    store.pool.resolve(method)
                ),
            ));
        }
        store.set_callee(
            id,
            Callee::InterfaceMethod {
                interface,
                method,
                implementations,
            },
        );
    }
}

fn named_type_of(ty: TypeId, store: &MetadataStore) -> Option<(Handle, Handle)> {
    match store.types.resolve(ty) {
        TypeDesc::Named { package, name, .. } => Some((package, name)),
        TypeDesc::Pointer(inner) => named_type_of(inner, store),
        _ => None,
    }
}

fn qualified_type_name(ty: TypeId, store: &MetadataStore) -> String {
    match named_type_of(ty, store) {
        Some((pkg, name)) => format!("{}.{}", store.pool.resolve(pkg), store.pool.resolve(name)),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apispec_core::{CallSite, CallSiteId, Function, Position};

    fn pos(store: &MetadataStore) -> Position {
        Position::new(store.pool.intern("f.go"), 1, 1)
    }

    #[test]
    fn unresolved_qualified_call_links_to_direct() {
        let mut store = MetadataStore::new();
        let pkg_a = store.pool.intern("mod/a");
        let pkg_b = store.pool.intern("mod/b");

        let mut builder_a = apispec_core::PackageBuilder::new(pkg_a);
        let target = builder_a.push_function(Function {
            name: store.pool.intern("Handle"),
            package: pkg_a,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });
        let _ = target;
        store.insert_package(builder_a);

        let mut builder_b = apispec_core::PackageBuilder::new(pkg_b);
        let caller = builder_b.push_function(Function {
            name: store.pool.intern("main"),
            package: pkg_b,
            receiver: None,
            parameters: vec![],
            results: vec![],
            type_parameters: vec![],
            position: pos(&store),
            call_sites: vec![],
            assignments: vec![],
        });
        let candidate = store.pool.intern("mod/a.Handle");
        builder_b.push_call_site(
            caller,
            CallSite {
                id: CallSiteId(0),
                caller,
                callee: Callee::Unresolved(candidate),
                receiver: None,
                args: vec![],
                type_args: vec![],
                position: pos(&store),
            },
        );
        store.insert_package(builder_b);

        let mut diags = Vec::new();
        link(&mut store, &mut diags);

        let resolved = store
            .call_sites()
            .find(|cs| matches!(cs.callee, Callee::Direct(_)))
            .expect("call site resolved to Direct");
        assert!(matches!(resolved.callee, Callee::Direct(_)));
        assert!(diags.is_empty());
    }

    #[test]
    fn unresolved_candidate_outside_the_module_becomes_external() {
        let mut store = MetadataStore::new();
        let pkg = store.pool.intern("mod/a");
        let mut builder = apispec_core::PackageBuilder::new(pkg);
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
        let candidate = store.pool.intern("github.com/go-chi/chi/v5.NewRouter");
        builder.push_call_site(
            caller,
            CallSite {
                id: CallSiteId(0),
                caller,
                callee: Callee::Unresolved(candidate),
                receiver: None,
                args: vec![],
                type_args: vec![],
                position: pos(&store),
            },
        );
        store.insert_package(builder);

        let mut diags = Vec::new();
        link(&mut store, &mut diags);

        assert!(diags.is_empty());
        let resolved = store.call_sites().next().expect("one call site");
        match &resolved.callee {
            Callee::External(name) => {
                assert_eq!(store.pool.resolve(*name), "github.com/go-chi/chi/v5.NewRouter");
            }
            other => panic!("expected External, got {other:?}"),
        }
    }
}
