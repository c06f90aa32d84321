//! Optional call-graph rendering: flattens a [`TrackerNode`] tree into
//! a node-and-edge data set a visualization front-end (out of scope here)
//! can consume directly as JSON.

use serde::{Deserialize, Serialize};

use apispec_core::{MetadataStore, StringPool, TypeTable};

use crate::tracker::TrackerNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeScope {
    Exported,
    Unexported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
    pub package: String,
    pub position: Option<String>,
    pub scope: NodeScope,
    pub receiver_type: Option<String>,
    pub signature: String,
    pub generics: Vec<String>,
    /// Every call path (by node id) from the tree's root to this node,
    /// supporting a visualization that highlights one traversal at a time.
    pub call_paths: Vec<Vec<usize>>,
    pub opaque: bool,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: usize,
    pub target_id: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphExport {
    pub fn from_tree(root: &TrackerNode, store: &MetadataStore) -> Self {
        let mut export = GraphExport::default();
        let mut path = Vec::new();
        walk(root, store, &mut export, &mut path, None);
        export
    }
}

fn walk(
    node: &TrackerNode,
    store: &MetadataStore,
    export: &mut GraphExport,
    path: &mut Vec<usize>,
    parent_id: Option<usize>,
) {
    let id = export.nodes.len();
    path.push(id);

    let graph_node = describe_node(node, store, path.clone());
    export.nodes.push(graph_node);

    if let Some(parent) = parent_id {
        export.edges.push(GraphEdge {
            source_id: parent,
            target_id: id,
        });
    }

    for child in &node.children {
        walk(child, store, export, path, Some(id));
    }

    path.pop();
}

fn describe_node(node: &TrackerNode, store: &MetadataStore, call_path: Vec<usize>) -> GraphNode {
    let pool = &store.pool;
    let types = &store.types;

    match (node.resolved_callee, node.external) {
        (None, Some(name)) => GraphNode {
            id: call_path.last().copied().unwrap_or(0),
            label: pool.resolve(name).to_string(),
            package: String::new(),
            position: node.call_site.map(|cs| format_position(store, cs, pool)),
            scope: NodeScope::Unexported,
            receiver_type: None,
            signature: String::new(),
            generics: Vec::new(),
            call_paths: vec![call_path],
            opaque: false,
            truncated: node.truncated,
        },
        (None, None) => GraphNode {
            id: call_path.last().copied().unwrap_or(0),
            label: "<opaque>".to_string(),
            package: String::new(),
            position: node.call_site.map(|cs| format_position(store, cs, pool)),
            scope: NodeScope::Unexported,
            receiver_type: None,
            signature: String::new(),
            generics: Vec::new(),
            call_paths: vec![call_path],
            opaque: true,
            truncated: node.truncated,
        },
        (Some(f), _) => {
            let function = store.function(f);
            let name = pool.resolve(function.name);
            GraphNode {
                id: call_path.last().copied().unwrap_or(0),
                label: function.qualified_name(pool, types),
                package: pool.resolve(function.package).to_string(),
                position: Some(format!(
                    "{}:{}:{}",
                    pool.resolve(function.position.file),
                    function.position.line,
                    function.position.column
                )),
                scope: node_scope(&name),
                receiver_type: function.receiver.map(|ty| type_label(ty, types, pool)),
                signature: signature_label(function, types, pool),
                generics: function
                    .type_parameters
                    .iter()
                    .map(|&ty| type_label(ty, types, pool))
                    .collect(),
                call_paths: vec![call_path],
                opaque: false,
                truncated: node.truncated,
            }
        }
    }
}

fn node_scope(name: &str) -> NodeScope {
    match name.chars().next() {
        Some(c) if c.is_uppercase() => NodeScope::Exported,
        _ => NodeScope::Unexported,
    }
}

fn signature_label(function: &apispec_core::Function, types: &TypeTable, pool: &StringPool) -> String {
    let params: Vec<String> = function
        .parameters
        .iter()
        .map(|(name, ty)| format!("{}: {}", pool.resolve(*name), type_label(*ty, types, pool)))
        .collect();
    let results: Vec<String> = function.results.iter().map(|&ty| type_label(ty, types, pool)).collect();
    if results.is_empty() {
        format!("({})", params.join(", "))
    } else {
        format!("({}) -> ({})", params.join(", "), results.join(", "))
    }
}

fn type_label(ty: apispec_core::TypeId, types: &TypeTable, pool: &StringPool) -> String {
    use apispec_core::TypeDesc;
    match types.resolve(ty) {
        TypeDesc::Named { package, name, .. } => format!("{}.{}", pool.resolve(package), pool.resolve(name)),
        TypeDesc::Pointer(inner) => format!("*{}", type_label(inner, types, pool)),
        TypeDesc::Slice(inner) => format!("[]{}", type_label(inner, types, pool)),
        TypeDesc::Array(n, inner) => format!("[{n}]{}", type_label(inner, types, pool)),
        TypeDesc::Basic(kind) => format!("{kind:?}").to_lowercase(),
        TypeDesc::TypeParam { name, .. } => pool.resolve(name).to_string(),
        _ => "?".to_string(),
    }
}

fn format_position(store: &MetadataStore, cs: apispec_core::CallSiteId, pool: &StringPool) -> String {
    let position = store.call_site(cs).position;
    format!("{}:{}:{}", pool.resolve(position.file), position.line, position.column)
}
