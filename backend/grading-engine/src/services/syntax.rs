use tree_sitter::{Parser, Tree};

/// Statement forms the grammar still accepts but Python 3 rejects.
const PYTHON2_ONLY_NODES: [&str; 2] = ["print_statement", "exec_statement"];

/// Parses `code` as Python 3 and reports whether the tree is free of error and
/// missing nodes. Blank code is never valid.
pub fn python_syntax_valid(code: &str) -> bool {
    if code.trim().is_empty() {
        return false;
    }

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        tracing::error!("Failed to load Python grammar: {}", e);
        return false;
    }

    match parser.parse(code, None) {
        Some(tree) => !tree.root_node().has_error() && !has_python2_statement(&tree),
        None => false,
    }
}

fn has_python2_statement(tree: &Tree) -> bool {
    let mut cursor = tree.walk();
    loop {
        if PYTHON2_ONLY_NODES.contains(&cursor.node().kind()) {
            return true;
        }
        if cursor.goto_first_child() || cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                return false;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

/// Drops `#` comments and all whitespace so formatting differences do not
/// affect code comparison. `#` inside string literals is kept.
pub fn strip_comments_and_whitespace(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for line in code.lines() {
        let mut quote: Option<char> = None;
        let mut escaped = false;
        for c in line.chars() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            } else if c == '#' {
                break;
            } else if c == '"' || c == '\'' {
                quote = Some(c);
            }
            if !c.is_whitespace() {
                out.push(c);
            }
        }
    }
    out
}
