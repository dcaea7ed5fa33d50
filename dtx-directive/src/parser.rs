//! Recursive-descent parser turning `${...}` directive text into a
//! [`Document`](crate::ast::Document).
//!
//! The first non-whitespace character after `${` tells us everything we
//! need to dispatch: `#` opens a block, `/` closes one, anything else is a
//! bare interpolation. That one-character lookahead is all this parser
//! ever needs; there is no backtracking across directive boundaries.

use crate::ast::{
    BinaryOp, Document, Expr, FormatterCall, Node, Path, PathSegment, Span, UnaryOp,
};
use crate::error::DirectiveError;
use crate::lexer::{Lexer, Token, TokenKind};

pub fn parse(src: &str) -> Result<Document, DirectiveError> {
    let mut pos = 0;
    let (nodes, stop) = parse_sequence(src, &mut pos, &[])?;
    debug_assert!(stop.is_none());
    Ok(Document { nodes })
}

/// What stopped a [`parse_sequence`] call: the keyword it matched and the
/// byte span of that closer/else directive (including its braces).
struct Stop {
    keyword: &'static str,
    span: Span,
}

/// Scans literal text and directives from `*pos` until EOF or until a
/// directive whose keyword is in `stops` is found. Nested `#if`/`#each`
/// blocks are parsed recursively and folded into the returned node list.
fn parse_sequence(
    src: &str,
    pos: &mut usize,
    stops: &[&'static str],
) -> Result<(Vec<Node>, Option<Stop>), DirectiveError> {
    let mut nodes = Vec::new();

    loop {
        match src[*pos..].find("${") {
            None => {
                if *pos < src.len() {
                    nodes.push(Node::Literal(src[*pos..].to_string()));
                    *pos = src.len();
                }
                return Ok((nodes, None));
            }
            Some(rel) => {
                let dollar = *pos + rel;
                if dollar > *pos {
                    nodes.push(Node::Literal(src[*pos..dollar].to_string()));
                }
                let head_start = dollar + 2;
                let (keyword, keyword_end) = read_keyword(src, head_start);

                if let Some(stop_kw) = stops.iter().find(|s| matches_keyword(s, &keyword)) {
                    let close_end = consume_bare_directive(src, head_start)?;
                    *pos = close_end;
                    return Ok((
                        nodes,
                        Some(Stop {
                            keyword: stop_kw,
                            span: dollar..close_end,
                        }),
                    ));
                }

                match keyword.as_str() {
                    "#if" => {
                        let (node, new_pos) = parse_if(src, dollar, keyword_end)?;
                        nodes.push(node);
                        *pos = new_pos;
                    }
                    "#each" => {
                        let (node, new_pos) = parse_each(src, dollar, keyword_end)?;
                        nodes.push(node);
                        *pos = new_pos;
                    }
                    "#else" => {
                        return Err(DirectiveError::ElseOutsideIf {
                            span: dollar..keyword_end,
                        });
                    }
                    kw if kw.starts_with('#') || kw.starts_with('/') => {
                        return Err(DirectiveError::UnknownKeyword {
                            keyword: kw.to_string(),
                            span: dollar..keyword_end,
                        });
                    }
                    _ => {
                        let (node, new_pos) = parse_interp(src, dollar, head_start)?;
                        nodes.push(node);
                        *pos = new_pos;
                    }
                }
            }
        }
    }
}

/// Reads the keyword token right after `${`: `#if`, `#each`, `#else`,
/// `/if`, `/each`, or `""` for a bare interpolation. Returns the keyword
/// and the byte offset right after it. Does not advance any shared cursor;
/// it only inspects `src` starting at `start`.
fn read_keyword(src: &str, start: usize) -> (String, usize) {
    let trimmed_start = start + (src[start.min(src.len())..].len()
        - src[start.min(src.len())..].trim_start().len());
    let rest = &src[trimmed_start.min(src.len())..];
    let marker_len = rest.len() - rest.trim_start_matches(['#', '/']).len();
    if marker_len == 0 {
        return (String::new(), trimmed_start);
    }
    let marker = &rest[..marker_len];
    let word_rest = &rest[marker_len..];
    let word_end = word_rest
        .find(|c: char| c.is_whitespace() || c == '}')
        .unwrap_or(word_rest.len());
    (
        format!("{marker}{}", &word_rest[..word_end]),
        trimmed_start + marker_len + word_end,
    )
}

fn matches_keyword(stop: &str, found: &str) -> bool {
    stop == found
}

/// Consumes a directive with no body (`#else`, `/if`, `/each`) and returns
/// the position right after its closing `}`.
fn consume_bare_directive(src: &str, head_start: usize) -> Result<usize, DirectiveError> {
    match src[head_start..].find('}') {
        Some(rel) => Ok(head_start + rel + 1),
        None => Err(unterminated(src, head_start)),
    }
}

/// Builds the error for a directive whose closing `}` was never found.
/// Per spec.md §4.B, the normalizer's run-merging guarantee only holds
/// within a single paragraph: if a `<w:p>`/`</w:p>` boundary appears
/// between the opener and end-of-input, the directive was split across a
/// paragraph break rather than merely mistyped, and that's reported as
/// `DirectiveSpansBlock` instead of the generic `UnterminatedDirective`.
fn unterminated(src: &str, head_start: usize) -> DirectiveError {
    let span = head_start..src.len();
    if src[span.clone()].contains("<w:p") || src[span.clone()].contains("</w:p>") {
        DirectiveError::DirectiveSpansBlock { span }
    } else {
        DirectiveError::UnterminatedDirective { span }
    }
}

fn parse_if(src: &str, open_dollar: usize, expr_start: usize) -> Result<(Node, usize), DirectiveError> {
    let (cond, after_head) = parse_directive_expr(src, expr_start)?;
    let mut cursor = after_head;

    let (then_branch, stop) = parse_sequence(src, &mut cursor, &["#else", "/if"])?;
    let stop = stop.ok_or_else(|| DirectiveError::MissingCloser {
        kind: "#if",
        opened_at: open_dollar..after_head,
    })?;

    let (else_branch, close_span) = if stop.keyword == "#else" {
        let (else_nodes, stop2) = parse_sequence(src, &mut cursor, &["/if"])?;
        let stop2 = stop2.ok_or_else(|| DirectiveError::MissingCloser {
            kind: "#if",
            opened_at: open_dollar..after_head,
        })?;
        (Some(else_nodes), stop2.span)
    } else {
        (None, stop.span)
    };

    Ok((
        Node::If {
            cond,
            then_branch,
            else_branch,
            open_span: open_dollar..after_head,
            close_span,
        },
        cursor,
    ))
}

fn parse_each(src: &str, open_dollar: usize, expr_start: usize) -> Result<(Node, usize), DirectiveError> {
    let mut probe = ExprParser::new(src, expr_start);
    if matches!(probe.peek()?.kind, TokenKind::RBrace) {
        return Err(DirectiveError::EmptyEachTarget {
            span: open_dollar..expr_start,
        });
    }

    let (iter, after_head) = parse_directive_expr(src, expr_start)?;
    let mut cursor = after_head;
    let (body, stop) = parse_sequence(src, &mut cursor, &["/each"])?;
    let stop = stop.ok_or_else(|| DirectiveError::MissingCloser {
        kind: "#each",
        opened_at: open_dollar..after_head,
    })?;

    Ok((
        Node::Each {
            iter,
            body,
            open_span: open_dollar..after_head,
            close_span: stop.span,
        },
        cursor,
    ))
}

fn parse_interp(src: &str, open_dollar: usize, head_start: usize) -> Result<(Node, usize), DirectiveError> {
    match parse_interp_body(src, open_dollar, head_start) {
        Ok(result) => Ok(result),
        // spec.md §7: `BadExpression` is node-scoped, not a parse-aborting
        // error — recover at this directive's own closing brace so the rest
        // of the document still parses, and let the executor render this
        // one interpolation as `[ERROR: ...]` instead.
        Err(DirectiveError::BadExpression { message, .. }) => {
            let close_pos = resync_brace(src, head_start)?;
            Ok((
                Node::BadExpr {
                    message,
                    span: open_dollar..close_pos + 1,
                },
                close_pos + 1,
            ))
        }
        Err(other) => Err(other),
    }
}

fn parse_interp_body(
    src: &str,
    open_dollar: usize,
    head_start: usize,
) -> Result<(Node, usize), DirectiveError> {
    let mut p = ExprParser::new(src, head_start);
    let expr = parse_or(&mut p)?;

    let formatters;
    let close_pos;
    match p.peek()?.kind {
        TokenKind::Pipe => {
            p.next()?; // consumes '|'
            let (fmts, after) = parse_formatters(src, p.lexer.pos())?;
            formatters = fmts;
            close_pos = after;
        }
        TokenKind::RBrace => {
            formatters = Vec::new();
            close_pos = p.lexer.pos();
        }
        _ => {
            let tok = p.next()?;
            return Err(unexpected_token(&tok));
        }
    }

    if src.as_bytes().get(close_pos) != Some(&b'}') {
        return Err(unterminated(src, open_dollar));
    }

    Ok((
        Node::Interp {
            expr,
            formatters,
            span: open_dollar..close_pos + 1,
        },
        close_pos + 1,
    ))
}

/// Finds this directive's own closing `}`, tracking `{`/`}` nesting so a
/// stray brace inside the malformed expression (e.g. `({}).toString()`)
/// doesn't resync too early.
fn resync_brace(src: &str, head_start: usize) -> Result<usize, DirectiveError> {
    let bytes = src.as_bytes();
    let mut depth: u32 = 0;
    let mut i = head_start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    return Ok(i);
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    Err(unterminated(src, head_start))
}

/// Parses an expression for `#if`/`#each` headers and returns the position
/// right after the directive's closing `}`.
fn parse_directive_expr(src: &str, start: usize) -> Result<(Expr, usize), DirectiveError> {
    let mut p = ExprParser::new(src, start);
    let expr = parse_or(&mut p)?;
    match p.peek()?.kind {
        TokenKind::RBrace => {}
        _ => {
            let tok = p.next()?;
            return Err(unexpected_token(&tok));
        }
    }
    let close_pos = p.lexer.pos();
    if src.as_bytes().get(close_pos) != Some(&b'}') {
        return Err(unterminated(src, start));
    }
    Ok((expr, close_pos + 1))
}

fn unexpected_token(tok: &Token) -> DirectiveError {
    match tok.kind {
        TokenKind::RParen => DirectiveError::UnbalancedParen {
            span: tok.span.clone(),
        },
        _ => DirectiveError::BadExpression {
            message: format!("unexpected token {:?}", tok.kind),
            span: tok.span.clone(),
        },
    }
}

/// One-token-lookahead wrapper over [`Lexer`] for the Pratt-ish chain below.
struct ExprParser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    head_start: usize,
}

impl<'a> ExprParser<'a> {
    fn new(src: &'a str, start: usize) -> Self {
        Self {
            lexer: Lexer::new(src, start),
            peeked: None,
            head_start: start,
        }
    }

    fn peek(&mut self) -> Result<Token, DirectiveError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.fetch()?);
        }
        Ok(self.peeked.clone().unwrap())
    }

    fn next(&mut self) -> Result<Token, DirectiveError> {
        if let Some(tok) = self.peeked.take() {
            return Ok(tok);
        }
        self.fetch()
    }

    fn fetch(&mut self) -> Result<Token, DirectiveError> {
        match self.lexer.next_token() {
            Some(Ok(tok)) => Ok(tok),
            Some(Err((message, span))) => Err(DirectiveError::BadExpression { message, span }),
            None => {
                let src = self.lexer.source();
                Err(unterminated(src, self.head_start))
            }
        }
    }
}

// Grammar, tightest to loosest binding at the bottom:
//   or -> and -> not -> comparison -> term -> factor -> unary -> primary

fn parse_or(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let mut lhs = parse_and(p)?;
    loop {
        let is_or = match &p.peek()?.kind {
            TokenKind::OrOr => true,
            TokenKind::Ident(id) if id == "or" => true,
            _ => false,
        };
        if !is_or {
            break;
        }
        let op_span = p.next()?.span;
        let rhs = parse_and(p)?;
        let span = lhs.span().start.min(op_span.start)..rhs.span().end.max(op_span.end);
        lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs), span);
    }
    Ok(lhs)
}

fn parse_and(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let mut lhs = parse_not(p)?;
    loop {
        let is_and = match &p.peek()?.kind {
            TokenKind::AndAnd => true,
            TokenKind::Ident(id) if id == "and" => true,
            _ => false,
        };
        if !is_and {
            break;
        }
        let op_span = p.next()?.span;
        let rhs = parse_not(p)?;
        let span = lhs.span().start.min(op_span.start)..rhs.span().end.max(op_span.end);
        lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs), span);
    }
    Ok(lhs)
}

fn parse_not(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let is_not = match &p.peek()?.kind {
        TokenKind::Bang => true,
        TokenKind::Ident(id) if id == "not" => true,
        _ => false,
    };
    if is_not {
        let op_span = p.next()?.span;
        let operand = parse_not(p)?;
        let span = op_span.start..operand.span().end.max(op_span.end);
        return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand), span));
    }
    parse_comparison(p)
}

fn parse_comparison(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let mut lhs = parse_term(p)?;
    loop {
        let op = match &p.peek()?.kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::EqEqEq => BinaryOp::StrictEq,
            TokenKind::NotEqEq => BinaryOp::StrictNotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => break,
        };
        let op_span = p.next()?.span;
        let rhs = parse_term(p)?;
        let span = lhs.span().start.min(op_span.start)..rhs.span().end.max(op_span.end);
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), span);
    }
    Ok(lhs)
}

fn parse_term(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let mut lhs = parse_factor(p)?;
    loop {
        let op = match &p.peek()?.kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            _ => break,
        };
        let op_span = p.next()?.span;
        let rhs = parse_factor(p)?;
        let span = lhs.span().start.min(op_span.start)..rhs.span().end.max(op_span.end);
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), span);
    }
    Ok(lhs)
}

fn parse_factor(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let mut lhs = parse_unary(p)?;
    loop {
        let op = match &p.peek()?.kind {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => break,
        };
        let op_span = p.next()?.span;
        let rhs = parse_unary(p)?;
        let span = lhs.span().start.min(op_span.start)..rhs.span().end.max(op_span.end);
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), span);
    }
    Ok(lhs)
}

fn parse_unary(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    if matches!(p.peek()?.kind, TokenKind::Minus) {
        let op_span = p.next()?.span;
        let operand = parse_unary(p)?;
        let span = op_span.start..operand.span().end.max(op_span.end);
        return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand), span));
    }
    parse_primary(p)
}

fn parse_primary(p: &mut ExprParser) -> Result<Expr, DirectiveError> {
    let tok = p.next()?;
    match tok.kind {
        TokenKind::Number(n) => Ok(Expr::Number(n)),
        TokenKind::Str(s) => Ok(Expr::Str(s)),
        TokenKind::LParen => {
            let inner = parse_or(p)?;
            let close = p.next()?;
            if !matches!(close.kind, TokenKind::RParen) {
                return Err(DirectiveError::UnbalancedParen { span: tok.span });
            }
            Ok(inner)
        }
        TokenKind::Ident(id) => match id.as_str() {
            "true" => Ok(Expr::Bool(true)),
            "false" => Ok(Expr::Bool(false)),
            "null" => Ok(Expr::Null),
            _ => parse_path(p, id, tok.span),
        },
        _ => Err(unexpected_token(&tok)),
    }
}

fn parse_path(p: &mut ExprParser, first: String, first_span: Span) -> Result<Expr, DirectiveError> {
    let mut segments = vec![PathSegment::Field(first)];
    let mut end = first_span.end;
    loop {
        match p.peek()?.kind {
            TokenKind::Dot => {
                p.next()?;
                let tok = p.next()?;
                match tok.kind {
                    TokenKind::Ident(id) => {
                        segments.push(PathSegment::Field(id));
                        end = tok.span.end;
                    }
                    _ => return Err(unexpected_token(&tok)),
                }
            }
            TokenKind::LBracket => {
                p.next()?;
                let tok = p.next()?;
                let idx = match tok.kind {
                    TokenKind::Number(n) => n as i64,
                    _ => return Err(unexpected_token(&tok)),
                };
                let close = p.next()?;
                if !matches!(close.kind, TokenKind::RBracket) {
                    return Err(unexpected_token(&close));
                }
                segments.push(PathSegment::Index(idx));
                end = close.span.end;
            }
            _ => break,
        }
    }
    Ok(Expr::Path(Path {
        segments,
        span: first_span.start..end,
    }))
}

/// Raw-scans a formatter chain (`name(':' arg)*` repeated, separated by
/// `|`) starting right after the leading `|`. Arguments are not tokenized
/// through [`Lexer`]: they are split on `:` as literal text, since patterns
/// like a date format can contain characters an expression token never
/// would.
fn parse_formatters(src: &str, start: usize) -> Result<(Vec<FormatterCall>, usize), DirectiveError> {
    let mut calls = Vec::new();
    let mut pos = start;

    loop {
        pos = skip_ws(src, pos);
        let name_start = pos;
        while matches!(src.as_bytes().get(pos), Some(b) if b.is_ascii_alphanumeric() || *b == b'_') {
            pos += 1;
        }
        if pos == name_start {
            return Err(DirectiveError::BadExpression {
                message: "expected formatter name".into(),
                span: pos..pos,
            });
        }
        let name = src[name_start..pos].to_string();
        let mut args = Vec::new();

        while src.as_bytes().get(pos) == Some(&b':') {
            pos += 1;
            let arg_start = pos;
            while !matches!(src.as_bytes().get(pos), None | Some(b':') | Some(b'|') | Some(b'}')) {
                pos += 1;
            }
            args.push(src[arg_start..pos].trim().to_string());
        }

        calls.push(FormatterCall {
            name,
            args,
            span: name_start..pos,
        });

        pos = skip_ws(src, pos);
        match src.as_bytes().get(pos) {
            Some(b'|') => {
                pos += 1;
                continue;
            }
            Some(b'}') => return Ok((calls, pos)),
            _ => return Err(unterminated(src, start)),
        }
    }
}

fn skip_ws(src: &str, mut pos: usize) -> usize {
    while matches!(src.as_bytes().get(pos), Some(b) if b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}
