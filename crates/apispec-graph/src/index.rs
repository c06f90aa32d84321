//! C4: read-only multi-key lookup over a [`MetadataStore`]'s call sites.
//! Built once per analysis run; nothing here mutates the store.

use hashbrown::HashMap;

use apispec_core::{CallSiteId, FunctionId, MetadataStore, Position, TypeDesc, TypeId};

/// Four indexes over one [`MetadataStore`]'s call sites: by callee, by
/// caller, by receiver concrete type, and by exact source position.
#[derive(Debug, Default)]
pub struct CallGraphIndex {
    by_callee: HashMap<FunctionId, Vec<CallSiteId>>,
    by_caller: HashMap<FunctionId, Vec<CallSiteId>>,
    by_receiver_type: HashMap<TypeId, Vec<CallSiteId>>,
    by_position: HashMap<Position, CallSiteId>,
}

impl CallGraphIndex {
    pub fn build(store: &MetadataStore) -> Self {
        let mut index = Self::default();

        for call_site in store.call_sites() {
            index.by_caller.entry(call_site.caller).or_default().push(call_site.id);
            index.by_position.insert(call_site.position, call_site.id);

            if let apispec_core::Callee::Direct(callee) = &call_site.callee {
                let callee = *callee;
                index.by_callee.entry(callee).or_default().push(call_site.id);
                let receiver_type = store.function(callee).receiver;
                if let Some(ty) = receiver_type {
                    if let Some(concrete) = concrete_receiver_type(ty, store) {
                        index.by_receiver_type.entry(concrete).or_default().push(call_site.id);
                    }
                }
            }
        }

        for ids in index.by_callee.values_mut() {
            ids.sort_by_key(|id| store.call_site(*id).position);
        }
        for ids in index.by_caller.values_mut() {
            ids.sort_by_key(|id| store.call_site(*id).position);
        }
        for ids in index.by_receiver_type.values_mut() {
            ids.sort_by_key(|id| store.call_site(*id).position);
        }

        index
    }

    /// Call sites whose statically-resolved callee is `function`.
    pub fn calls_to(&self, function: FunctionId) -> &[CallSiteId] {
        self.by_callee.get(&function).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Call sites textually occurring inside `function`'s body, in source
    /// order — this is what the tracker walks to find a node's children.
    pub fn calls_from(&self, function: FunctionId) -> &[CallSiteId] {
        self.by_caller.get(&function).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Call sites whose callee is a method on a value of concrete type `ty`.
    pub fn calls_on_receiver(&self, ty: TypeId) -> &[CallSiteId] {
        self.by_receiver_type.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn call_at(&self, position: Position) -> Option<CallSiteId> {
        self.by_position.get(&position).copied()
    }
}

fn concrete_receiver_type(ty: TypeId, store: &MetadataStore) -> Option<TypeId> {
    match store.types.resolve(ty) {
        TypeDesc::Named { .. } => Some(ty),
        TypeDesc::Pointer(inner) => concrete_receiver_type(inner, store),
        _ => None,
    }
}
