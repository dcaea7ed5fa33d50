//! Parse-level errors for the directive language (spec.md §7).

use crate::ast::Span;

/// A directive/expression parse error with location information.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveError {
    DirectiveSpansBlock { span: Span },
    UnterminatedDirective { span: Span },
    UnknownKeyword { keyword: String, span: Span },
    UnbalancedParen { span: Span },
    MissingCloser { kind: &'static str, opened_at: Span },
    ElseOutsideIf { span: Span },
    EmptyEachTarget { span: Span },
    BadExpression { message: String, span: Span },
}

impl DirectiveError {
    pub fn span(&self) -> Span {
        match self {
            DirectiveError::DirectiveSpansBlock { span }
            | DirectiveError::UnterminatedDirective { span }
            | DirectiveError::UnknownKeyword { span, .. }
            | DirectiveError::UnbalancedParen { span }
            | DirectiveError::ElseOutsideIf { span }
            | DirectiveError::EmptyEachTarget { span }
            | DirectiveError::BadExpression { span, .. } => span.clone(),
            DirectiveError::MissingCloser { opened_at, .. } => opened_at.clone(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            DirectiveError::DirectiveSpansBlock { .. } => {
                "directive spans a paragraph break; it cannot be recovered by run-merging".into()
            }
            DirectiveError::UnterminatedDirective { .. } => {
                "unterminated directive: missing closing '}'".into()
            }
            DirectiveError::UnknownKeyword { keyword, .. } => {
                format!("unknown directive keyword '{keyword}'")
            }
            DirectiveError::UnbalancedParen { .. } => "unbalanced parentheses in expression".into(),
            DirectiveError::MissingCloser { kind, .. } => {
                format!("missing closer for '{kind}' opened here")
            }
            DirectiveError::ElseOutsideIf { .. } => "'#else' outside of an '#if' block".into(),
            DirectiveError::EmptyEachTarget { .. } => "'#each' requires a non-empty path".into(),
            DirectiveError::BadExpression { message, .. } => message.clone(),
        }
    }
}

impl std::fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for DirectiveError {}

/// Format a directive error with source context for pretty display,
/// the way `lc3-parser::format_errors` renders `ariadne` reports.
pub fn format_error(filename: &str, source: &str, error: &DirectiveError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let span = error.span();
    let span = span.start.min(source.len())..span.end.min(source.len());
    let message = error.message();

    let mut output = Vec::new();
    let result = Report::<(&str, std::ops::Range<usize>)>::build(
        ReportKind::Error,
        (filename, span.clone()),
    )
    .with_message(&message)
    .with_label(
        Label::new((filename, span))
            .with_message(&message)
            .with_color(Color::Red),
    )
    .finish()
    .write((filename, Source::from(source)), &mut output);

    if result.is_err() {
        return format!("{filename}: {message}");
    }
    String::from_utf8(output).unwrap_or_else(|_| "error formatting output".into())
}
