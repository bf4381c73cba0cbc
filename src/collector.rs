//! AST-based test collection (spec §4.A).
//!
//! Parses one source file with `tree-sitter-python` and walks its top-level
//! definitions, purely syntactically: no import resolution, no evaluation.
//! This is what lets discovery stay safe even for files that would raise on
//! import.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use taut::collector::collect;
//!
//! let source = b"@skip(\"todo\")\ndef test_later():\n    pass\n";
//! let (items, warnings) = collect(Path::new("test_example.py"), source);
//! assert_eq!(items.len(), 1);
//! assert!(items[0].markers.skip);
//! assert!(warnings.is_empty());
//! ```

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::model::{DiscoveryWarning, MarkerSet, MarkerValue, TestItem};

/// The closed set of decorator names the collector understands. Anything
/// else attached to a definition is assumed to belong to some other
/// framework and is ignored.
const MARKER_VOCABULARY: [&str; 3] = ["skip", "mark", "parallel"];

/// Parses one source file and collects its candidate test items.
///
/// # Arguments
///
/// * `file` - the path the items will be attributed to; used only for
///   warning messages and the resulting [`TestItem::file`], never opened.
/// * `source` - the raw bytes of `file`, already read by the caller.
///
/// # Returns
///
/// The test functions and methods found at module or class scope, each
/// with its resolved [`crate::model::MarkerSet`], plus any discovery
/// warnings encountered along the way. Never panics on malformed input:
/// worst case is zero items and one warning naming the file.
pub fn collect(file: &Path, source: &[u8]) -> (Vec<TestItem>, Vec<DiscoveryWarning>) {
    let mut parser = Parser::new();
    // A fixed, known-good grammar version: failure to load it is a bug in
    // this crate, not a property of the file being scanned.
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .expect("failed to load the Python grammar");

    let Some(tree) = parser.parse(source, None) else {
        return (
            Vec::new(),
            vec![unparseable(file, "tree-sitter produced no parse tree")],
        );
    };

    let root = tree.root_node();
    if root.has_error() {
        return (
            Vec::new(),
            vec![unparseable(file, "source could not be fully parsed")],
        );
    }

    let mut items = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        visit_top_level(child, file, source, &mut items, &mut warnings);
    }

    (items, warnings)
}

fn unparseable(file: &Path, reason: &str) -> DiscoveryWarning {
    DiscoveryWarning {
        file: file.to_path_buf(),
        message: reason.to_string(),
    }
}

fn visit_top_level(
    node: Node,
    file: &Path,
    source: &[u8],
    items: &mut Vec<TestItem>,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    match node.kind() {
        "function_definition" => {
            visit_function(node, &MarkerSet::new(), file, source, items, warnings);
        }
        "class_definition" => {
            visit_class(node, &MarkerSet::new(), file, source, items, warnings);
        }
        "decorated_definition" => {
            let Some(definition) = node.child_by_field_name("definition") else {
                return;
            };
            let markers = decorators_of(node, source, file, warnings);
            match definition.kind() {
                "function_definition" => {
                    visit_function(definition, &markers, file, source, items, warnings);
                }
                "class_definition" => {
                    visit_class(definition, &markers, file, source, items, warnings);
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn visit_function(
    node: Node,
    own_markers: &MarkerSet,
    file: &Path,
    source: &[u8],
    items: &mut Vec<TestItem>,
    _warnings: &mut [DiscoveryWarning],
) {
    let Some(name) = identifier_text(node, "name", source) else {
        return;
    };
    if !name.starts_with("test_") {
        return;
    }
    items.push(TestItem::new(
        file.to_path_buf(),
        None,
        name,
        own_markers.clone(),
    ));
}

fn visit_class(
    node: Node,
    class_markers: &MarkerSet,
    file: &Path,
    source: &[u8],
    items: &mut Vec<TestItem>,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    let Some(class_name) = identifier_text(node, "name", source) else {
        return;
    };
    if !class_name.starts_with("Test") {
        return;
    }

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        visit_method(member, class_name.as_str(), class_markers, file, source, items, warnings);
    }
}

fn visit_method(
    node: Node,
    class_name: &str,
    class_markers: &MarkerSet,
    file: &Path,
    source: &[u8],
    items: &mut Vec<TestItem>,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    let (def_node, own_markers) = match node.kind() {
        "function_definition" => (node, MarkerSet::new()),
        "decorated_definition" => {
            let Some(definition) = node.child_by_field_name("definition") else {
                return;
            };
            if definition.kind() != "function_definition" {
                return;
            }
            (definition, decorators_of(node, source, file, warnings))
        }
        _ => return,
    };

    let Some(name) = identifier_text(def_node, "name", source) else {
        return;
    };
    if !name.starts_with("test_") {
        return;
    }

    let mut markers = class_markers.clone();
    markers.merge_override(&own_markers);

    items.push(TestItem::new(
        file.to_path_buf(),
        Some(class_name.to_string()),
        name,
        markers,
    ));
}

fn identifier_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    node_text(child, source).map(str::to_string)
}

fn node_text<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    node.utf8_text(source).ok()
}

/// Extracts a [`MarkerSet`] from the `decorator` children of a
/// `decorated_definition` node. Decorators outside the marker vocabulary
/// are skipped silently; recognized decorators with an unsupported
/// argument shape produce a warning and are otherwise ignored.
fn decorators_of(
    decorated: Node,
    source: &[u8],
    file: &Path,
    warnings: &mut Vec<DiscoveryWarning>,
) -> MarkerSet {
    let mut markers = MarkerSet::new();
    let mut cursor = decorated.walk();
    for child in decorated.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        let Some(expr) = child.named_child(0) else {
            continue;
        };
        apply_decorator(expr, source, file, &mut markers, warnings);
    }
    markers
}

fn apply_decorator(
    expr: Node,
    source: &[u8],
    file: &Path,
    markers: &mut MarkerSet,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    let (name, args) = match expr.kind() {
        "identifier" => (node_text(expr, source).map(str::to_string), None),
        "call" => {
            let Some(function) = expr.child_by_field_name("function") else {
                return;
            };
            if function.kind() != "identifier" {
                return;
            }
            let name = node_text(function, source).map(str::to_string);
            (name, expr.child_by_field_name("arguments"))
        }
        _ => return,
    };

    let Some(name) = name else { return };
    if !MARKER_VOCABULARY.contains(&name.as_str()) {
        return;
    }

    match name.as_str() {
        "skip" => apply_skip(args, source, markers),
        "parallel" => markers.parallel = true,
        "mark" => apply_mark(args, source, file, markers, warnings),
        _ => unreachable!("filtered by MARKER_VOCABULARY"),
    }
}

fn apply_skip(args: Option<Node>, source: &[u8], markers: &mut MarkerSet) {
    markers.skip = true;
    markers.skip_reason = String::new();

    let Some(args) = args else { return };
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "string" => {
                if let Some(reason) = string_literal_value(arg, source) {
                    markers.skip_reason = reason;
                }
            }
            "keyword_argument" => {
                if identifier_text(arg, "name", source).as_deref() == Some("reason") {
                    if let Some(value) = arg.child_by_field_name("value") {
                        if let Some(reason) = string_literal_value(value, source) {
                            markers.skip_reason = reason;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn apply_mark(
    args: Option<Node>,
    source: &[u8],
    file: &Path,
    markers: &mut MarkerSet,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    let Some(args) = args else { return };
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() != "keyword_argument" {
            continue;
        }
        let Some(key) = identifier_text(arg, "name", source) else {
            continue;
        };
        let Some(value_node) = arg.child_by_field_name("value") else {
            continue;
        };
        match marker_value_of(value_node, source) {
            Some(value) => markers.set(key, value),
            None => warnings.push(DiscoveryWarning {
                file: file.to_path_buf(),
                message: format!("unsupported value for mark({key}=...), ignoring"),
            }),
        }
    }
}

fn marker_value_of(node: Node, source: &[u8]) -> Option<MarkerValue> {
    match node.kind() {
        "true" => Some(MarkerValue::Bool(true)),
        "false" => Some(MarkerValue::Bool(false)),
        "string" => string_literal_value(node, source).map(MarkerValue::String),
        "list" => {
            let mut items = Vec::new();
            let mut cursor = node.walk();
            for element in node.named_children(&mut cursor) {
                let value = string_literal_value(element, source)?;
                items.push(value);
            }
            Some(MarkerValue::List(items))
        }
        _ => None,
    }
}

/// Extracts the text of a simple (non-f, non-byte) string literal.
fn string_literal_value(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "string_content" {
            return node_text(child, source).map(str::to_string);
        }
    }
    // Empty string literal: no string_content child at all.
    Some(String::new())
}
