use std::rc::Rc;

use crate::{
    ast::{
        expressions::{Expr, ExprKind},
        statements::{
            Alias, ClassDef, ExceptHandler, FunctionDef, Param, Parameters, Stmt, StmtKind, WithItem,
        },
    },
    errors::errors::Error,
    lexer::tokens::TokenKind,
};

use super::{
    expr::{operator_for_token, parse_arguments, parse_expr, parse_expr_list, parse_target_list},
    lookups::{is_compound, BindingPower},
    parser::Parser,
};

/// Parses one logical line: either a compound statement with its block, or
/// one or more `;`-separated simple statements followed by a newline.
pub fn parse_statement_line(parser: &mut Parser) -> Result<Vec<Stmt>, Error> {
    let kind = parser.current_token_kind();

    if is_compound(kind) {
        if let Some(handler) = parser.get_stmt_lookup().get(&kind).copied() {
            return Ok(vec![handler(parser)?]);
        }
    }

    parse_simple_line(parser)
}

fn parse_simple_line(parser: &mut Parser) -> Result<Vec<Stmt>, Error> {
    let mut statements = vec![parse_simple_stmt(parser)?];

    while parser.eat(TokenKind::Semicolon) {
        if matches!(
            parser.current_token_kind(),
            TokenKind::Newline | TokenKind::EOF
        ) {
            break;
        }
        statements.push(parse_simple_stmt(parser)?);
    }

    if !parser.eat(TokenKind::Newline) && parser.current_token_kind() != TokenKind::EOF {
        return Err(parser.unexpected("expected end of line"));
    }

    Ok(statements)
}

pub fn parse_simple_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let kind = parser.current_token_kind();
    if !is_compound(kind) {
        if let Some(handler) = parser.get_stmt_lookup().get(&kind).copied() {
            return handler(parser);
        }
    }

    parse_expression_stmt(parser)
}

/// Right hand side of an assignment: a yield or an expression list.
fn parse_assigned_value(parser: &mut Parser) -> Result<Expr, Error> {
    if parser.current_token_kind() == TokenKind::Yield {
        parse_expr(parser, BindingPower::Default)
    } else {
        parse_expr_list(parser)
    }
}

/// Expression statements and the three assignment forms.
pub fn parse_expression_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.get_position();
    let first = parse_expr_list(parser)?;

    let kind = match parser.current_token_kind() {
        TokenKind::Colon => {
            parser.advance();
            let annotation = parse_expr(parser, BindingPower::Default)?;
            let value = if parser.eat(TokenKind::Assignment) {
                Some(parse_assigned_value(parser)?)
            } else {
                None
            };

            StmtKind::AnnAssign {
                target: first,
                annotation,
                value,
            }
        }
        TokenKind::Assignment => {
            let mut targets = vec![first];
            let mut value;

            loop {
                parser.advance();
                value = parse_assigned_value(parser)?;
                if parser.current_token_kind() != TokenKind::Assignment {
                    break;
                }
                targets.push(value);
            }

            StmtKind::Assign { targets, value }
        }
        kind if kind.is_augmented_assignment() => {
            let op = operator_for_token(parser, kind)?;
            parser.advance();
            let value = parse_assigned_value(parser)?;

            StmtKind::AugAssign {
                target: first,
                op,
                value,
            }
        }
        _ => StmtKind::Expr(first),
    };

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(kind, span))
}

/// Parses an indented block (or a same-line suite) after a `:`.
pub fn parse_block(parser: &mut Parser) -> Result<Vec<Stmt>, Error> {
    parser.expect(TokenKind::Colon)?;

    if !parser.eat(TokenKind::Newline) {
        return parse_simple_line(parser);
    }

    let error = parser.unexpected("expected an indented block");
    parser.expect_error(TokenKind::Indent, Some(error))?;

    let mut body = vec![];
    while !matches!(
        parser.current_token_kind(),
        TokenKind::Dedent | TokenKind::EOF
    ) {
        body.extend(parse_statement_line(parser)?);
    }
    parser.eat(TokenKind::Dedent);

    Ok(body)
}

/// Parses a parameter list up to (but not including) `end`.
///
/// Annotations are only read for `def`; lambdas use the colon as terminator.
pub fn parse_parameters(
    parser: &mut Parser,
    end: TokenKind,
    allow_annotations: bool,
) -> Result<Parameters, Error> {
    let mut params = Parameters::default();
    let mut keyword_only = false;

    let parse_param = |parser: &mut Parser| -> Result<Param, Error> {
        let token = parser.expect(TokenKind::Identifier)?;
        let annotation = if allow_annotations && parser.eat(TokenKind::Colon) {
            Some(parse_expr(parser, BindingPower::Default)?)
        } else {
            None
        };

        Ok(Param {
            name: token.value,
            annotation,
            span: token.span,
        })
    };

    while parser.current_token_kind() != end {
        if parser.eat(TokenKind::Slash) {
            // positional-only marker
        } else if parser.eat(TokenKind::DoubleStar) {
            params.kwarg = Some(parse_param(parser)?);
        } else if parser.eat(TokenKind::Star) {
            keyword_only = true;
            if parser.current_token_kind() == TokenKind::Identifier {
                params.vararg = Some(parse_param(parser)?);
            }
        } else {
            let param = parse_param(parser)?;
            let default = if parser.eat(TokenKind::Assignment) {
                Some(parse_expr(parser, BindingPower::Default)?)
            } else {
                None
            };

            if keyword_only {
                params.kwonly.push(param);
                params.kw_defaults.push(default);
            } else {
                params.args.push(param);
                if let Some(default) = default {
                    params.defaults.push(default);
                }
            }
        }

        if !parser.eat(TokenKind::Comma) {
            break;
        }
    }

    Ok(params)
}

pub fn parse_if_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let test = parse_expr(parser, BindingPower::Default)?;
    let body = parse_block(parser)?;

    let orelse = match parser.current_token_kind() {
        // `elif` is an `if` nested in the else branch
        TokenKind::Elif => vec![parse_if_stmt(parser)?],
        TokenKind::Else => {
            parser.advance();
            parse_block(parser)?
        }
        _ => vec![],
    };

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::If { test, body, orelse }, span))
}

fn parse_else_block(parser: &mut Parser) -> Result<Vec<Stmt>, Error> {
    if parser.eat(TokenKind::Else) {
        parse_block(parser)
    } else {
        Ok(vec![])
    }
}

pub fn parse_while_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let test = parse_expr(parser, BindingPower::Default)?;
    let body = parse_block(parser)?;
    let orelse = parse_else_block(parser)?;

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::While { test, body, orelse }, span))
}

fn parse_for(parser: &mut Parser, is_async: bool) -> Result<Stmt, Error> {
    let start = parser.expect(TokenKind::For)?.span.start;

    let target = parse_target_list(parser)?;
    parser.expect(TokenKind::In)?;
    let iter = parse_expr_list(parser)?;
    let body = parse_block(parser)?;
    let orelse = parse_else_block(parser)?;

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        },
        span,
    ))
}

pub fn parse_for_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    parse_for(parser, false)
}

pub fn parse_try_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();
    let body = parse_block(parser)?;

    let mut handlers = vec![];
    while parser.current_token_kind() == TokenKind::Except {
        let handler_start = parser.advance().span.start.clone();
        // except* groups are checked like plain handlers
        parser.eat(TokenKind::Star);

        let (type_, name) = if parser.current_token_kind() == TokenKind::Colon {
            (None, None)
        } else {
            let type_ = parse_expr(parser, BindingPower::Default)?;
            let name = if parser.eat(TokenKind::As) {
                Some(parser.expect(TokenKind::Identifier)?.value)
            } else {
                None
            };
            (Some(type_), name)
        };

        let handler_body = parse_block(parser)?;
        handlers.push(ExceptHandler {
            type_,
            name,
            body: handler_body,
            span: parser.span_from(handler_start),
        });
    }

    let orelse = parse_else_block(parser)?;
    let finalbody = if parser.eat(TokenKind::Finally) {
        parse_block(parser)?
    } else {
        vec![]
    };

    if handlers.is_empty() && finalbody.is_empty() {
        return Err(parser.unexpected("expected `except` or `finally`"));
    }

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        },
        span,
    ))
}

fn parse_with(parser: &mut Parser, is_async: bool) -> Result<Stmt, Error> {
    let start = parser.expect(TokenKind::With)?.span.start;

    let mut items = vec![];
    loop {
        let context = parse_expr(parser, BindingPower::Default)?;
        let vars = if parser.eat(TokenKind::As) {
            Some(parse_expr(parser, BindingPower::Relational)?)
        } else {
            None
        };
        items.push(WithItem { context, vars });

        if !parser.eat(TokenKind::Comma) {
            break;
        }
    }

    let body = parse_block(parser)?;

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(
        StmtKind::With {
            items,
            body,
            is_async,
        },
        span,
    ))
}

pub fn parse_with_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    parse_with(parser, false)
}

fn parse_function(parser: &mut Parser, decorators: Vec<Expr>, is_async: bool) -> Result<Stmt, Error> {
    let start = parser.expect(TokenKind::Def)?.span.start;
    let name = parser.expect(TokenKind::Identifier)?.value;

    parser.expect(TokenKind::OpenParen)?;
    let params = parse_parameters(parser, TokenKind::CloseParen, true)?;
    parser.expect(TokenKind::CloseParen)?;

    let returns = if parser.eat(TokenKind::Arrow) {
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };

    let body = parse_block(parser)?;

    let span = parser.span_from(start);
    let def = FunctionDef {
        name,
        params,
        body,
        returns,
        decorators,
        is_async,
        span: span.clone(),
    };
    Ok(parser.mk_stmt(StmtKind::FunctionDef(Rc::new(def)), span))
}

pub fn parse_fn_decl_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    parse_function(parser, vec![], false)
}

fn parse_class(parser: &mut Parser, decorators: Vec<Expr>) -> Result<Stmt, Error> {
    let start = parser.expect(TokenKind::Class)?.span.start;
    let name = parser.expect(TokenKind::Identifier)?.value;

    let (bases, keywords) = if parser.eat(TokenKind::OpenParen) {
        parse_arguments(parser)?
    } else {
        (vec![], vec![])
    };

    let body = parse_block(parser)?;

    let span = parser.span_from(start);
    let def = ClassDef {
        name,
        bases,
        keywords,
        body,
        decorators,
        span: span.clone(),
    };
    Ok(parser.mk_stmt(StmtKind::ClassDef(Rc::new(def)), span))
}

pub fn parse_class_decl_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    parse_class(parser, vec![])
}

pub fn parse_decorated_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let mut decorators = vec![];
    while parser.eat(TokenKind::At) {
        decorators.push(parse_expr(parser, BindingPower::Default)?);
        parser.expect(TokenKind::Newline)?;
    }

    match parser.current_token_kind() {
        TokenKind::Def => parse_function(parser, decorators, false),
        TokenKind::Async => {
            parser.advance();
            parse_function(parser, decorators, true)
        }
        TokenKind::Class => parse_class(parser, decorators),
        _ => Err(parser.unexpected("expected `def` or `class` after decorator")),
    }
}

pub fn parse_async_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    parser.advance();

    match parser.current_token_kind() {
        TokenKind::Def => parse_function(parser, vec![], true),
        TokenKind::For => parse_for(parser, true),
        TokenKind::With => parse_with(parser, true),
        _ => Err(parser.unexpected("expected `def`, `for` or `with` after `async`")),
    }
}

pub fn parse_return_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let value = if matches!(
        parser.current_token_kind(),
        TokenKind::Newline | TokenKind::Semicolon | TokenKind::EOF
    ) {
        None
    } else {
        Some(parse_expr_list(parser)?)
    };

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::Return(value), span))
}

/// `pass`, `break` and `continue`.
pub fn parse_keyword_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let token = parser.advance().clone();

    let kind = match token.kind {
        TokenKind::Break => StmtKind::Break,
        TokenKind::Continue => StmtKind::Continue,
        _ => StmtKind::Pass,
    };

    Ok(parser.mk_stmt(kind, token.span))
}

fn parse_dotted_name(parser: &mut Parser) -> Result<String, Error> {
    let mut name = parser.expect(TokenKind::Identifier)?.value;
    while parser.eat(TokenKind::Dot) {
        name.push('.');
        name.push_str(&parser.expect(TokenKind::Identifier)?.value);
    }
    Ok(name)
}

fn parse_alias(parser: &mut Parser, dotted: bool) -> Result<Alias, Error> {
    let name = if dotted {
        parse_dotted_name(parser)?
    } else {
        parser.expect(TokenKind::Identifier)?.value
    };

    let asname = if parser.eat(TokenKind::As) {
        Some(parser.expect(TokenKind::Identifier)?.value)
    } else {
        None
    };

    Ok(Alias { name, asname })
}

pub fn parse_import_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let mut names = vec![parse_alias(parser, true)?];
    while parser.eat(TokenKind::Comma) {
        names.push(parse_alias(parser, true)?);
    }

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::Import(names), span))
}

pub fn parse_from_import_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let mut level = 0;
    loop {
        match parser.current_token_kind() {
            TokenKind::Dot => level += 1,
            TokenKind::Ellipsis => level += 3,
            _ => break,
        }
        parser.advance();
    }

    let module = if parser.current_token_kind() == TokenKind::Identifier {
        parse_dotted_name(parser)?
    } else {
        String::new()
    };

    parser.expect(TokenKind::Import)?;

    let mut names = vec![];
    if parser.eat(TokenKind::Star) {
        names.push(Alias {
            name: String::from("*"),
            asname: None,
        });
    } else {
        let parenthesised = parser.eat(TokenKind::OpenParen);
        loop {
            if parenthesised && parser.current_token_kind() == TokenKind::CloseParen {
                break;
            }
            names.push(parse_alias(parser, false)?);
            if !parser.eat(TokenKind::Comma) {
                break;
            }
        }
        if parenthesised {
            parser.expect(TokenKind::CloseParen)?;
        }
    }

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(
        StmtKind::ImportFrom {
            module,
            names,
            level,
        },
        span,
    ))
}

/// `global` and `nonlocal` declarations.
pub fn parse_scope_decl_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let token = parser.advance().clone();

    let mut names = vec![parser.expect(TokenKind::Identifier)?.value];
    while parser.eat(TokenKind::Comma) {
        names.push(parser.expect(TokenKind::Identifier)?.value);
    }

    let kind = if token.kind == TokenKind::Global {
        StmtKind::Global(names)
    } else {
        StmtKind::Nonlocal(names)
    };

    let span = parser.span_from(token.span.start);
    Ok(parser.mk_stmt(kind, span))
}

pub fn parse_del_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let targets = parse_expr_list(parser)?;
    let targets = match targets.kind {
        ExprKind::Tuple(elements) => elements,
        _ => vec![targets],
    };

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::Delete(targets), span))
}

pub fn parse_assert_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let test = parse_expr(parser, BindingPower::Default)?;
    let msg = if parser.eat(TokenKind::Comma) {
        Some(parse_expr(parser, BindingPower::Default)?)
    } else {
        None
    };

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::Assert { test, msg }, span))
}

pub fn parse_raise_stmt(parser: &mut Parser) -> Result<Stmt, Error> {
    let start = parser.advance().span.start.clone();

    let (exc, cause) = if matches!(
        parser.current_token_kind(),
        TokenKind::Newline | TokenKind::Semicolon | TokenKind::EOF
    ) {
        (None, None)
    } else {
        let exc = parse_expr(parser, BindingPower::Default)?;
        let cause = if parser.eat(TokenKind::From) {
            Some(parse_expr(parser, BindingPower::Default)?)
        } else {
            None
        };
        (Some(exc), cause)
    };

    let span = parser.span_from(start);
    Ok(parser.mk_stmt(StmtKind::Raise { exc, cause }, span))
}
