//! Offline directive validation (spec.md §4.H): parse a document part's
//! text without any render data, surface diagnostics an author can act on
//! before ever running a render, and report complexity statistics.
//!
//! The diagnostic shape mirrors the teacher's editor-integration crate:
//! a flat `Diagnostic { message, severity, line/col }` list plus line-start
//! offsets for converting byte spans, rather than returning raw byte spans
//! to a caller that may not have the source handy.

use serde::{Deserialize, Serialize};

use dtx_directive::{DirectiveError, Document, Node, Span};
use dtx_template::FormatterRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

/// Complexity statistics used for spec.md §4.H's weighted score:
/// `vars + 3*ifs + 5*loops + 10*nested_loops + 4*aggregates + 2*stylings`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub vars: u32,
    pub ifs: u32,
    pub loops: u32,
    pub nested_loops: u32,
    pub aggregates: u32,
    pub stylings: u32,
}

impl Statistics {
    pub fn complexity(&self) -> u32 {
        self.vars
            + 3 * self.ifs
            + 5 * self.loops
            + 10 * self.nested_loops
            + 4 * self.aggregates
            + 2 * self.stylings
    }
}

/// The directive kinds a template-executor walk can visit; used to
/// confirm the validator enumerates exactly the nodes the executor does
/// (spec.md §8, "Validator ↔ executor agreement").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Interp,
    If,
    Each,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveEntry {
    pub kind: DirectiveKind,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    pub statistics: Statistics,
    /// One entry per `Interp`/`If`/`Each` node, in document order — the
    /// same set of nodes `dtx_template::execute` visits.
    pub directives: Vec<DirectiveEntry>,
}

impl Report {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

const AGGREGATE_FORMATTERS: &[&str] = &["sum", "count", "avg", "max", "min"];
const STYLING_FORMATTERS: &[&str] = &["bold", "italic", "underline", "size", "color"];

pub fn validate(source: &str) -> Report {
    let line_starts = compute_line_starts(source);
    let mut diagnostics = smart_quote_diagnostics(source, &line_starts);

    match dtx_directive::parse(source) {
        Ok(doc) => {
            let registry = FormatterRegistry::new();
            let mut stats = Statistics::default();
            let mut directives = Vec::new();
            walk(&doc, &registry, &line_starts, &mut diagnostics, &mut stats, &mut directives, 0);
            Report { diagnostics, statistics: stats, directives }
        }
        Err(err) => {
            diagnostics.push(diagnostic_for(&err, &line_starts));
            Report { diagnostics, statistics: Statistics::default(), directives: Vec::new() }
        }
    }
}

fn walk(
    doc: &Document,
    registry: &FormatterRegistry,
    line_starts: &[usize],
    diagnostics: &mut Vec<Diagnostic>,
    stats: &mut Statistics,
    directives: &mut Vec<DirectiveEntry>,
    loop_depth: u32,
) {
    walk_nodes(&doc.nodes, registry, line_starts, diagnostics, stats, directives, loop_depth);
}

fn walk_nodes(
    nodes: &[Node],
    registry: &FormatterRegistry,
    line_starts: &[usize],
    diagnostics: &mut Vec<Diagnostic>,
    stats: &mut Statistics,
    directives: &mut Vec<DirectiveEntry>,
    loop_depth: u32,
) {
    for node in nodes {
        match node {
            Node::Literal(_) => {}
            Node::BadExpr { message, span } => {
                diagnostics.push(Diagnostic {
                    message: message.clone(),
                    severity: Severity::Error,
                    ..span_diagnostic(span, line_starts)
                });
            }
            Node::Interp { formatters, span, .. } => {
                stats.vars += 1;
                directives.push(directive_entry(DirectiveKind::Interp, span, line_starts));
                for call in formatters {
                    if AGGREGATE_FORMATTERS.contains(&call.name.as_str()) {
                        stats.aggregates += 1;
                    }
                    if STYLING_FORMATTERS.contains(&call.name.as_str()) {
                        stats.stylings += 1;
                    }
                    if !registry.is_known(&call.name) {
                        diagnostics.push(Diagnostic {
                            message: format!("unknown formatter '{}'", call.name),
                            severity: Severity::Warning,
                            ..span_diagnostic(&call.span, line_starts)
                        });
                    }
                }
            }
            Node::If { open_span, then_branch, else_branch, .. } => {
                stats.ifs += 1;
                directives.push(directive_entry(DirectiveKind::If, open_span, line_starts));
                walk_nodes(then_branch, registry, line_starts, diagnostics, stats, directives, loop_depth);
                if let Some(branch) = else_branch {
                    walk_nodes(branch, registry, line_starts, diagnostics, stats, directives, loop_depth);
                }
            }
            Node::Each { body, open_span, .. } => {
                stats.loops += 1;
                directives.push(directive_entry(DirectiveKind::Each, open_span, line_starts));
                if loop_depth >= 1 {
                    stats.nested_loops += 1;
                    diagnostics.push(Diagnostic {
                        message: "nested '#each' loop: verify the outer item shape before relying on deep paths".into(),
                        severity: Severity::Info,
                        ..span_diagnostic(open_span, line_starts)
                    });
                }
                walk_nodes(body, registry, line_starts, diagnostics, stats, directives, loop_depth + 1);
            }
        }
    }
}

fn directive_entry(kind: DirectiveKind, span: &Span, line_starts: &[usize]) -> DirectiveEntry {
    let (start_line, start_col) = offset_to_position(line_starts, span.start);
    let (end_line, end_col) = offset_to_position(line_starts, span.end);
    DirectiveEntry { kind, start_line, start_col, end_line, end_col }
}

fn diagnostic_for(err: &DirectiveError, line_starts: &[usize]) -> Diagnostic {
    Diagnostic {
        message: err.message(),
        severity: Severity::Error,
        ..span_diagnostic(&err.span(), line_starts)
    }
}

fn span_diagnostic(span: &Span, line_starts: &[usize]) -> Diagnostic {
    let (start_line, start_col) = offset_to_position(line_starts, span.start);
    let (end_line, end_col) = offset_to_position(line_starts, span.end);
    Diagnostic {
        message: String::new(),
        severity: Severity::Info,
        start_line,
        start_col,
        end_line,
        end_col,
    }
}

fn smart_quote_diagnostics(source: &str, line_starts: &[usize]) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(rel) = source[pos..].find("${") {
        let open = pos + rel;
        let close = match source[open..].find('}') {
            Some(r) => open + r + 1,
            None => break,
        };
        let body = &source[open..close];
        if body.contains(['\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}']) {
            out.push(Diagnostic {
                message: "smart quote character found inside directive; Word's AutoCorrect may have replaced a straight quote".into(),
                severity: Severity::Warning,
                ..span_diagnostic(&(open..close), line_starts)
            });
        }
        pos = close;
    }
    out
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn offset_to_position(line_starts: &[usize], offset: usize) -> (u32, u32) {
    let line = match line_starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    };
    let col = offset - line_starts[line];
    (line as u32 + 1, col as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_vars_ifs_and_loops() {
        let report = validate("${#each items}${#if this.ok}${name}${/if}${/each}");
        assert_eq!(report.statistics.vars, 1);
        assert_eq!(report.statistics.ifs, 1);
        assert_eq!(report.statistics.loops, 1);
        assert_eq!(report.statistics.nested_loops, 0);
    }

    #[test]
    fn directives_are_enumerated_in_document_order() {
        let report = validate("${#each items}${#if this.ok}${name}${/if}${/each}");
        let kinds: Vec<_> = report.directives.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DirectiveKind::Each, DirectiveKind::If, DirectiveKind::Interp]);
    }

    #[test]
    fn nested_each_increments_nested_loops_and_warns() {
        let report = validate("${#each outer}${#each this.inner}${x}${/each}${/each}");
        assert_eq!(report.statistics.loops, 2);
        assert_eq!(report.statistics.nested_loops, 1);
        assert!(report.diagnostics.iter().any(|d| d.message.contains("nested")));
    }

    #[test]
    fn unknown_formatter_is_a_warning_not_a_parse_error() {
        let report = validate("${x|not_a_real_formatter}");
        assert!(!report.has_errors());
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("unknown formatter")));
    }

    #[test]
    fn parse_error_surfaces_as_error_diagnostic() {
        let report = validate("${#if a}no closer");
        assert!(report.has_errors());
    }

    #[test]
    fn aggregate_and_styling_formatters_are_counted() {
        let report = validate("${items|sum} ${name|bold}");
        assert_eq!(report.statistics.aggregates, 1);
        assert_eq!(report.statistics.stylings, 1);
    }

    #[test]
    fn smart_quotes_inside_a_directive_are_flagged() {
        let report = validate("${name|default:\u{2018}n/a\u{2019}}");
        assert!(report.diagnostics.iter().any(|d| d.message.contains("smart quote")));
    }

    #[test]
    fn complexity_formula_matches_weights() {
        let mut stats = Statistics::default();
        stats.vars = 2;
        stats.ifs = 1;
        stats.loops = 1;
        stats.nested_loops = 0;
        stats.aggregates = 1;
        stats.stylings = 1;
        assert_eq!(stats.complexity(), 2 + 3 + 5 + 0 + 4 + 2);
    }
}
