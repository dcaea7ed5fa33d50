//! Lexer, parser, and AST for the `${...}` directive language.
//!
//! This crate only knows about directive text; it has no notion of XML,
//! runs, or paragraphs. Callers feed it the already-normalized plain text
//! of a document part (see `dtx-xml`) and get back a [`Document`] tree
//! that later stages walk and evaluate.

pub mod ast;
pub mod error;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Document, Expr, FormatterCall, Node, Path, PathSegment, Span, UnaryOp};
pub use error::{format_error, DirectiveError};

/// Parses `src` into a directive tree.
pub fn parse(src: &str) -> Result<Document, DirectiveError> {
    parser::parse(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_only() {
        let doc = parse("hello world").unwrap();
        assert_eq!(doc.nodes, vec![Node::Literal("hello world".into())]);
    }

    #[test]
    fn parses_bare_interpolation() {
        let doc = parse("Hi ${name}!").unwrap();
        assert_eq!(doc.nodes.len(), 3);
        match &doc.nodes[1] {
            Node::Interp { expr, formatters, .. } => {
                assert!(formatters.is_empty());
                match expr {
                    Expr::Path(p) => {
                        assert_eq!(p.segments, vec![PathSegment::Field("name".into())]);
                    }
                    other => panic!("expected path, got {other:?}"),
                }
            }
            other => panic!("expected interp, got {other:?}"),
        }
    }

    #[test]
    fn parses_dotted_and_indexed_path() {
        let doc = parse("${this.items[0].name}").unwrap();
        match &doc.nodes[0] {
            Node::Interp { expr: Expr::Path(p), .. } => {
                assert_eq!(
                    p.segments,
                    vec![
                        PathSegment::Field("this".into()),
                        PathSegment::Field("items".into()),
                        PathSegment::Index(0),
                        PathSegment::Field("name".into()),
                    ]
                );
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn parses_formatter_chain_with_args() {
        let doc = parse("${price|currency:USD|bold}").unwrap();
        match &doc.nodes[0] {
            Node::Interp { formatters, .. } => {
                assert_eq!(formatters[0].name, "currency");
                assert_eq!(formatters[0].args, vec!["USD".to_string()]);
                assert_eq!(formatters[1].name, "bold");
                assert!(formatters[1].args.is_empty());
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn parses_if_else() {
        let doc = parse("${#if active}yes${#else}no${/if}").unwrap();
        match &doc.nodes[0] {
            Node::If { then_branch, else_branch, .. } => {
                assert_eq!(then_branch, &vec![Node::Literal("yes".into())]);
                assert_eq!(else_branch, &Some(vec![Node::Literal("no".into())]));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn parses_nested_each_and_if() {
        let doc = parse("${#each items}${#if this.ok}y${/if}${/each}").unwrap();
        match &doc.nodes[0] {
            Node::Each { iter, body, .. } => {
                match iter {
                    Expr::Path(p) => assert_eq!(p.segments, vec![PathSegment::Field("items".into())]),
                    other => panic!("unexpected iter {other:?}"),
                }
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Node::If { .. }));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_directive() {
        let err = parse("${name").unwrap_err();
        assert!(matches!(err, DirectiveError::UnterminatedDirective { .. }));
    }

    #[test]
    fn reports_directive_spans_block_across_a_paragraph_break() {
        let err = parse("${name<w:p>next paragraph</w:p>").unwrap_err();
        assert!(matches!(err, DirectiveError::DirectiveSpansBlock { .. }));
    }

    #[test]
    fn rejects_missing_closer() {
        let err = parse("${#if a}yes").unwrap_err();
        assert!(matches!(err, DirectiveError::MissingCloser { kind: "#if", .. }));
    }

    #[test]
    fn rejects_else_outside_if() {
        let err = parse("${#else}x").unwrap_err();
        assert!(matches!(err, DirectiveError::ElseOutsideIf { .. }));
    }

    #[test]
    fn rejects_empty_each_target() {
        let err = parse("${#each}x${/each}").unwrap_err();
        assert!(matches!(err, DirectiveError::EmptyEachTarget { .. }));
    }

    #[test]
    fn rejects_unknown_keyword() {
        let err = parse("${#unless cond}x${/unless}").unwrap_err();
        assert!(matches!(err, DirectiveError::UnknownKeyword { .. }));
    }

    #[test]
    fn parses_comparison_and_boolean_operators() {
        let doc = parse("${#if a == 1 && (b != 2 || not c)}x${/if}").unwrap();
        assert!(matches!(doc.nodes[0], Node::If { .. }));
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let doc = parse("${1 + 2 * 3}").unwrap();
        match &doc.nodes[0] {
            Node::Interp { expr: Expr::Binary(BinaryOp::Add, lhs, rhs, _), .. } => {
                assert_eq!(**lhs, Expr::Number(1.0));
                assert!(matches!(**rhs, Expr::Binary(BinaryOp::Mul, _, _, _)));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn rejects_unbalanced_parens() {
        let err = parse("${(a + 1}").unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::UnbalancedParen { .. } | DirectiveError::BadExpression { .. }
        ));
    }

    #[test]
    fn bad_expression_recovers_as_a_node_scoped_error() {
        // No method-call or object-literal syntax exists in this grammar at
        // all, so attempts at one simply fail to parse as an expression —
        // but per spec.md §7 that's node-scoped, not a parse-aborting error:
        // the document still parses, with this directive becoming a
        // `BadExpr` node instead of the whole `parse` call failing.
        let doc = parse("before ${({}).toString()} after").unwrap();
        assert!(matches!(doc.nodes[1], Node::BadExpr { .. }));
        assert_eq!(doc.nodes[2], Node::Literal(" after".into()));
    }

    #[test]
    fn format_error_renders_without_panicking() {
        let err = parse("${name").unwrap_err();
        let rendered = format_error("word/document.xml", "${name", &err);
        assert!(rendered.contains("unterminated") || !rendered.is_empty());
    }
}
