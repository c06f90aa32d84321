use apispec_core::{Handle, Position, StringPool};
use tree_sitter::Node;

/// Extract text from a tree-sitter Node.
#[inline]
pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// Position of a node's start, interned against `file`.
#[inline]
pub fn position_for(node: &Node, file: Handle) -> Position {
    Position::new(
        file,
        (node.start_position().row + 1) as u32,
        (node.start_position().column + 1) as u32,
    )
}

/// Strips the surrounding quotes (and handles a leading `` ` ``/`"`) off a
/// Go string literal's source text.
pub fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// All children of a specific field name, in source order — `Node` only
/// exposes the first match via `child_by_field_name`, but struct fields and
/// parameter lists can repeat a field (`X, Y int`).
pub fn children_by_field<'a>(node: &Node<'a>, field_name: &str) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field_name, &mut cursor)
        .collect()
}

/// Interns a string onto the pool, avoiding an intermediate `String` copy
/// when the text is already NUL-free.
#[inline]
pub fn intern(pool: &StringPool, text: &str) -> Handle {
    pool.intern(text)
}
