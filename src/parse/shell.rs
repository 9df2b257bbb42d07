//! Statement segmentation with tree-sitter-bash.
//!
//! A chained command (`a && b | c; d`) is split into the simple statements
//! it is made of, including statements nested inside substitutions,
//! subshells and control flow. Each statement keeps its own redirections.

use tree_sitter::{Node, Parser};

/// Node kinds that make up one simple statement.
const STATEMENT_KINDS: &[&str] = &[
    "command",
    "redirected_statement",
    "declaration_command",
    "unset_command",
    "test_command",
    "negated_command",
];

fn parser() -> Option<Parser> {
    let mut parser = Parser::new();
    match parser.set_language(&tree_sitter_bash::LANGUAGE.into()) {
        Ok(()) => Some(parser),
        Err(e) => {
            log::error!("tree-sitter-bash language rejected: {e}");
            None
        }
    }
}

/// The statements of a POSIX command, outermost first, without duplicates.
///
/// Returns `None` when the command does not parse cleanly or contains no
/// statement; callers then treat the whole command as one statement.
pub fn statements(command: &str) -> Option<Vec<String>> {
    let mut parser = parser()?;
    let tree = parser.parse(command, None)?;
    let root = tree.root_node();
    if root.has_error() {
        log::debug!("command did not parse cleanly, matching it whole");
        return None;
    }

    let mut found: Vec<String> = Vec::new();
    let mut stack: Vec<Node> = vec![root];
    while let Some(node) = stack.pop() {
        if STATEMENT_KINDS.contains(&node.kind())
            && let Ok(text) = node.utf8_text(command.as_bytes())
        {
            let text = text.trim();
            if !text.is_empty() && !found.iter().any(|s| s == text) {
                found.push(text.to_string());
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    if found.is_empty() { None } else { Some(found) }
}
