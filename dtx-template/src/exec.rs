//! The directive-tree executor (spec.md §4.F): a single recursive walk
//! that turns a parsed [`Document`] plus a data [`Record`] into final XML
//! text, evaluating interpolations and expanding `#if`/`#each` blocks in
//! place.
//!
//! Failures at one node (an unknown formatter, a formatter rejecting its
//! input) do not abort the render: they are recorded and the node renders
//! as an inline `[ERROR: ...]` marker, the same accumulate-and-continue
//! shape the teacher's second pass uses for semantic errors.

use dtx_directive::{Document, Node, Span};

use crate::eval::eval;
use crate::format::FormatterRegistry;
use crate::scope::Scope;
use crate::value::{Record, Styling, Value};

/// Controls how a formatter-applied inline style (`bold`, `size`, ...)
/// turns into document markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StylingEmit {
    /// Styling instructions are discarded; only the plain text is kept.
    #[default]
    Flatten,
    /// The styled text is broken out of the surrounding run into one or
    /// more fresh runs carrying the matching `<w:rPr>` toggles.
    RunProps,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecError {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub xml: String,
    pub errors: Vec<ExecError>,
}

pub fn execute(doc: &Document, data: Record, source: &str, styling: StylingEmit) -> ExecOutput {
    let mut scope = Scope::new(data);
    let registry = FormatterRegistry::new();
    let mut errors = Vec::new();
    let xml = render_nodes(&doc.nodes, &mut scope, &registry, source, styling, &mut errors);
    ExecOutput { xml, errors }
}

fn render_nodes(
    nodes: &[Node],
    scope: &mut Scope,
    registry: &FormatterRegistry,
    source: &str,
    styling: StylingEmit,
    errors: &mut Vec<ExecError>,
) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(node, scope, registry, source, styling, errors, &mut out);
    }
    out
}

fn render_node(
    node: &Node,
    scope: &mut Scope,
    registry: &FormatterRegistry,
    source: &str,
    styling: StylingEmit,
    errors: &mut Vec<ExecError>,
    out: &mut String,
) {
    match node {
        Node::Literal(text) => out.push_str(text),
        Node::BadExpr { message, span } => {
            errors.push(ExecError {
                message: message.clone(),
                span: span.clone(),
            });
            out.push_str("[ERROR: ");
            out.push_str(&source[span.clone()]);
            out.push(']');
        }
        Node::Interp { expr, formatters, span } => {
            let mut value = eval(expr, scope);
            let mut failed = false;
            for call in formatters {
                if !registry.is_known(&call.name) {
                    // spec.md §4.E: unknown formatters warn and pass the
                    // value through unchanged rather than aborting the node.
                    errors.push(ExecError {
                        message: format!("unknown formatter '{}'", call.name),
                        span: call.span.clone(),
                    });
                    continue;
                }
                match registry.apply(&call.name, value.clone(), &call.args) {
                    Ok(v) => value = v,
                    Err(e) => {
                        errors.push(ExecError {
                            message: format!("{}: {}", call.name, e.message),
                            span: call.span.clone(),
                        });
                        failed = true;
                        break;
                    }
                }
            }
            if failed {
                out.push_str("[ERROR: ");
                out.push_str(&source[span.clone()]);
                out.push(']');
            } else {
                out.push_str(&render_value(value, styling));
            }
        }
        Node::If { cond, then_branch, else_branch, .. } => {
            let branch = if eval(cond, scope).is_truthy() {
                Some(then_branch)
            } else {
                else_branch.as_ref()
            };
            if let Some(branch) = branch {
                out.push_str(&render_nodes(branch, scope, registry, source, styling, errors));
            }
        }
        Node::Each { iter, body, open_span, .. } => {
            let items = eval(iter, scope);
            match items {
                Value::List(items) => {
                    let count = items.len();
                    for (index, item) in items.into_iter().enumerate() {
                        scope.push_iteration(item, index, count);
                        out.push_str(&render_nodes(body, scope, registry, source, styling, errors));
                        scope.pop();
                    }
                }
                _ => {
                    errors.push(ExecError {
                        message: "'#each' target is not a list".into(),
                        span: open_span.clone(),
                    });
                }
            }
        }
    }
}

fn render_value(value: Value, styling: StylingEmit) -> String {
    let (layers, inner) = peel_styling(&value);
    let escaped = dtx_xml::escape_xml(&inner.to_display_string());

    if layers.is_empty() || styling == StylingEmit::Flatten {
        return escaped;
    }

    let rpr = layers
        .iter()
        .map(styling_toggle)
        .collect::<Vec<_>>()
        .join("");
    format!(
        "</w:t></w:r><w:r><w:rPr>{rpr}</w:rPr><w:t xml:space=\"preserve\">{escaped}</w:t></w:r><w:r><w:t xml:space=\"preserve\">"
    )
}

fn peel_styling(value: &Value) -> (Vec<Styling>, &Value) {
    let mut layers = Vec::new();
    let mut current = value;
    while let Value::Styled(inner, s) = current {
        layers.push(s.clone());
        current = inner;
    }
    (layers, current)
}

fn styling_toggle(s: &Styling) -> String {
    match s {
        Styling::Bold => "<w:b/>".to_string(),
        Styling::Italic => "<w:i/>".to_string(),
        Styling::Underline => "<w:u w:val=\"single\"/>".to_string(),
        Styling::Size(pts) => format!(
            "<w:sz w:val=\"{0}\"/><w:szCs w:val=\"{0}\"/>",
            pts * 2
        ),
        Styling::Color(hex) => format!("<w:color w:val=\"{}\"/>", hex.trim_start_matches('#')),
    }
}
