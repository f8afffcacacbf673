use std::rc::Rc;

use crate::{
    ast::{
        ast::{BinaryOperator, BoolOperator, CompareOperator, UnaryOperator},
        expressions::{Comprehension, Expr, ExprKind, Keyword, NumberLiteral},
    },
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    Span,
};

use super::{lookups::BindingPower, parser::Parser, stmt::parse_parameters};

pub fn parse_expr(parser: &mut Parser, bp: BindingPower) -> Result<Expr, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let Some(nud_fn) = parser.get_nud_lookup().get(&token_kind).copied() else {
        return Err(parser.unexpected("expected an expression"));
    };

    let mut left = nud_fn(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    loop {
        let token_kind = parser.current_token_kind();
        let token_bp = *parser
            .get_bp_lookup()
            .get(&token_kind)
            .unwrap_or(&BindingPower::Default);

        if token_bp <= bp {
            break;
        }

        let Some(led_fn) = parser.get_led_lookup().get(&token_kind).copied() else {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: parser.current_token().value.clone(),
                },
                parser.get_position(),
            ));
        };

        left = led_fn(parser, left, token_bp)?;
    }

    Ok(left)
}

/// Parses a comma separated expression list, producing a tuple when a
/// comma is present (`a, b = b, a`).
pub fn parse_expr_list(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.get_position();
    let first = parse_expr(parser, BindingPower::Default)?;

    if parser.current_token_kind() != TokenKind::Comma {
        return Ok(first);
    }

    let mut elements = vec![first];
    while parser.eat(TokenKind::Comma) {
        if parser.current_token_kind().ends_expression() {
            break;
        }
        elements.push(parse_expr(parser, BindingPower::Default)?);
    }

    let span = parser.span_from(start);
    Ok(parser.mk_expr(ExprKind::Tuple(elements), span))
}

/// Parses the targets of a `for` loop or comprehension, stopping before `in`.
pub fn parse_target_list(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.get_position();
    let first = parse_expr(parser, BindingPower::Relational)?;

    if parser.current_token_kind() != TokenKind::Comma {
        return Ok(first);
    }

    let mut elements = vec![first];
    while parser.eat(TokenKind::Comma) {
        if parser.current_token_kind() == TokenKind::In {
            break;
        }
        elements.push(parse_expr(parser, BindingPower::Relational)?);
    }

    let span = parser.span_from(start);
    Ok(parser.mk_expr(ExprKind::Tuple(elements), span))
}

fn parse_number(text: &str) -> Option<NumberLiteral> {
    let cleaned = text.replace('_', "").to_ascii_lowercase();

    if let Some(imaginary) = cleaned.strip_suffix('j') {
        return imaginary.parse::<f64>().ok().map(NumberLiteral::Complex);
    }

    let radix = if cleaned.starts_with("0x") {
        Some(16)
    } else if cleaned.starts_with("0o") {
        Some(8)
    } else if cleaned.starts_with("0b") {
        Some(2)
    } else {
        None
    };

    if let Some(radix) = radix {
        // Integers beyond 64 bits saturate; only their type matters here
        return Some(NumberLiteral::Int(
            i64::from_str_radix(&cleaned[2..], radix).unwrap_or(i64::MAX),
        ));
    }

    if cleaned.contains(['.', 'e']) {
        return cleaned.parse::<f64>().ok().map(NumberLiteral::Float);
    }

    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Some(NumberLiteral::Int(cleaned.parse::<i64>().unwrap_or(i64::MAX)));
    }

    None
}

pub fn parse_primary_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let token = parser.current_token().clone();

    let kind = match token.kind {
        TokenKind::Number => match parse_number(&token.value) {
            Some(number) => ExprKind::Number(number),
            None => {
                return Err(Error::new(
                    ErrorImpl::NumberParseError { token: token.value },
                    token.span.start,
                ))
            }
        },
        TokenKind::Identifier => ExprKind::Name(token.value.clone()),
        TokenKind::True => ExprKind::Bool(true),
        TokenKind::False => ExprKind::Bool(false),
        TokenKind::None => ExprKind::NoneLiteral,
        TokenKind::Ellipsis => ExprKind::Ellipsis,
        _ => return Err(parser.unexpected("expected a literal or name")),
    };

    parser.advance();
    Ok(parser.mk_expr(kind, token.span))
}

/// Adjacent string literals concatenate (`"a" "b"`).
pub fn parse_string_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.get_position();
    let first_kind = parser.current_token_kind();
    let mut value = String::new();
    let mut formatted = false;

    while matches!(
        parser.current_token_kind(),
        TokenKind::String | TokenKind::FString | TokenKind::Bytes
    ) {
        let token = parser.advance();
        formatted |= token.kind == TokenKind::FString;
        value.push_str(&token.value);
    }

    let kind = if first_kind == TokenKind::Bytes {
        ExprKind::Bytes(value)
    } else if formatted {
        ExprKind::FString(value)
    } else {
        ExprKind::Str(value)
    };

    let span = parser.span_from(start);
    Ok(parser.mk_expr(kind, span))
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
    Some(match kind {
        TokenKind::Plus | TokenKind::PlusEquals => BinaryOperator::Add,
        TokenKind::Dash | TokenKind::MinusEquals => BinaryOperator::Sub,
        TokenKind::Star | TokenKind::StarEquals => BinaryOperator::Mult,
        TokenKind::At | TokenKind::AtEquals => BinaryOperator::MatMult,
        TokenKind::Slash | TokenKind::SlashEquals => BinaryOperator::Div,
        TokenKind::DoubleSlash | TokenKind::DoubleSlashEquals => BinaryOperator::FloorDiv,
        TokenKind::Percent | TokenKind::PercentEquals => BinaryOperator::Mod,
        TokenKind::DoubleStar | TokenKind::DoubleStarEquals => BinaryOperator::Pow,
        TokenKind::ShiftLeft | TokenKind::ShiftLeftEquals => BinaryOperator::LShift,
        TokenKind::ShiftRight | TokenKind::ShiftRightEquals => BinaryOperator::RShift,
        TokenKind::Pipe | TokenKind::PipeEquals => BinaryOperator::BitOr,
        TokenKind::Caret | TokenKind::CaretEquals => BinaryOperator::BitXor,
        TokenKind::Ampersand | TokenKind::AmpersandEquals => BinaryOperator::BitAnd,
        _ => return None,
    })
}

/// Maps an operator token (plain or augmented) to its operator.
pub fn operator_for_token(parser: &Parser, kind: TokenKind) -> Result<BinaryOperator, Error> {
    binary_operator(kind).ok_or_else(|| parser.unexpected("expected a binary operator"))
}

pub fn parse_binary_expr(parser: &mut Parser, left: Expr, bp: BindingPower) -> Result<Expr, Error> {
    let operator_token = parser.advance().clone();
    let op = operator_for_token(parser, operator_token.kind)?;

    let right = parse_expr(parser, bp)?;

    let span = Span {
        start: left.span.start.clone(),
        end: right.span.end.clone(),
    };
    Ok(parser.mk_expr(
        ExprKind::BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    ))
}

/// `**` is right associative and binds tighter than a unary minus on its left.
pub fn parse_power_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let right = parse_expr(parser, BindingPower::Unary)?;

    let span = Span {
        start: left.span.start.clone(),
        end: right.span.end.clone(),
    };
    Ok(parser.mk_expr(
        ExprKind::BinOp {
            left: Box::new(left),
            op: BinaryOperator::Pow,
            right: Box::new(right),
        },
        span,
    ))
}

pub fn parse_bool_expr(parser: &mut Parser, left: Expr, bp: BindingPower) -> Result<Expr, Error> {
    let op = if parser.advance().kind == TokenKind::And {
        BoolOperator::And
    } else {
        BoolOperator::Or
    };
    let right = parse_expr(parser, bp)?;

    let span = Span {
        start: left.span.start.clone(),
        end: right.span.end.clone(),
    };

    // Flatten `a and b and c` into one node
    let values = match left.kind {
        ExprKind::BoolOp {
            op: left_op,
            values,
        } if left_op == op => {
            let mut values = values;
            values.push(right);
            values
        }
        _ => vec![left, right],
    };

    Ok(parser.mk_expr(ExprKind::BoolOp { op, values }, span))
}

fn compare_operator(parser: &mut Parser) -> Option<CompareOperator> {
    let op = match parser.current_token_kind() {
        TokenKind::Less => CompareOperator::Lt,
        TokenKind::LessEquals => CompareOperator::LtE,
        TokenKind::Greater => CompareOperator::Gt,
        TokenKind::GreaterEquals => CompareOperator::GtE,
        TokenKind::Equals => CompareOperator::Eq,
        TokenKind::NotEquals => CompareOperator::NotEq,
        TokenKind::In => CompareOperator::In,
        TokenKind::Is if parser.peek_kind(1) == TokenKind::Not => {
            parser.advance();
            CompareOperator::IsNot
        }
        TokenKind::Is => CompareOperator::Is,
        TokenKind::Not if parser.peek_kind(1) == TokenKind::In => {
            parser.advance();
            CompareOperator::NotIn
        }
        _ => return None,
    };

    parser.advance();
    Some(op)
}

/// Parses a comparison chain such as `a < b <= c`.
pub fn parse_compare_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    let mut ops = vec![];
    let mut comparators = vec![];

    while let Some(op) = compare_operator(parser) {
        ops.push(op);
        comparators.push(parse_expr(parser, BindingPower::Relational)?);
    }

    if ops.is_empty() {
        return Err(parser.unexpected("expected a comparison operator"));
    }

    let span = parser.span_from(left.span.start.clone());
    Ok(parser.mk_expr(
        ExprKind::Compare {
            left: Box::new(left),
            ops,
            comparators,
        },
        span,
    ))
}

pub fn parse_prefix_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let operator_token = parser.advance().clone();
    let op = match operator_token.kind {
        TokenKind::Dash => UnaryOperator::Neg,
        TokenKind::Plus => UnaryOperator::Pos,
        _ => UnaryOperator::Invert,
    };
    let rhs = parse_expr(parser, BindingPower::Unary)?;

    let span = Span {
        start: operator_token.span.start.clone(),
        end: rhs.span.end.clone(),
    };
    Ok(parser.mk_expr(
        ExprKind::UnaryOp {
            op,
            operand: Box::new(rhs),
        },
        span,
    ))
}

pub fn parse_not_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();
    let rhs = parse_expr(parser, BindingPower::LogicalNot)?;

    let span = parser.span_from(start);
    Ok(parser.mk_expr(
        ExprKind::UnaryOp {
            op: UnaryOperator::Not,
            operand: Box::new(rhs),
        },
        span,
    ))
}

pub fn parse_starred_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();
    let value = parse_expr(parser, BindingPower::BitOr)?;

    let span = parser.span_from(start);
    Ok(parser.mk_expr(ExprKind::Starred(Box::new(value)), span))
}

pub fn parse_await_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();
    let value = parse_expr(parser, BindingPower::Power)?;

    let span = parser.span_from(start);
    Ok(parser.mk_expr(ExprKind::Await(Box::new(value)), span))
}

pub fn parse_yield_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();

    let kind = if parser.eat(TokenKind::From) {
        ExprKind::YieldFrom(Box::new(parse_expr(parser, BindingPower::Default)?))
    } else if parser.current_token_kind().ends_expression() {
        ExprKind::Yield(None)
    } else {
        ExprKind::Yield(Some(Box::new(parse_expr_list(parser)?)))
    };

    let span = parser.span_from(start);
    Ok(parser.mk_expr(kind, span))
}

pub fn parse_lambda_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();
    let params = parse_parameters(parser, TokenKind::Colon, false)?;
    parser.expect(TokenKind::Colon)?;
    let body = parse_expr(parser, BindingPower::Default)?;

    let span = parser.span_from(start);
    Ok(parser.mk_expr(
        ExprKind::Lambda {
            params: Rc::new(params),
            body: Rc::new(body),
        },
        span,
    ))
}

pub fn parse_ternary_expr(parser: &mut Parser, left: Expr, bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let test = parse_expr(parser, bp)?;
    parser.expect(TokenKind::Else)?;
    let orelse = parse_expr(parser, BindingPower::Comma)?;

    let span = Span {
        start: left.span.start.clone(),
        end: orelse.span.end.clone(),
    };
    Ok(parser.mk_expr(
        ExprKind::IfExp {
            test: Box::new(test),
            body: Box::new(left),
            orelse: Box::new(orelse),
        },
        span,
    ))
}

pub fn parse_named_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let value = parse_expr(parser, BindingPower::Comma)?;

    let span = Span {
        start: left.span.start.clone(),
        end: value.span.end.clone(),
    };
    Ok(parser.mk_expr(
        ExprKind::NamedExpr {
            target: Box::new(left),
            value: Box::new(value),
        },
        span,
    ))
}

/// Parses the `for ... in ... if ...` clauses following a comprehension element.
pub fn parse_comprehension_clauses(parser: &mut Parser) -> Result<Vec<Comprehension>, Error> {
    let mut generators = vec![];

    loop {
        let is_async = parser.current_token_kind() == TokenKind::Async
            && parser.peek_kind(1) == TokenKind::For;
        if is_async {
            parser.advance();
        }
        if !parser.eat(TokenKind::For) {
            break;
        }

        let target = parse_target_list(parser)?;
        parser.expect(TokenKind::In)?;
        let iter = parse_expr(parser, BindingPower::Ternary)?;

        let mut ifs = vec![];
        while parser.eat(TokenKind::If) {
            ifs.push(parse_expr(parser, BindingPower::Ternary)?);
        }

        generators.push(Comprehension {
            target,
            iter,
            ifs,
            is_async,
        });
    }

    Ok(generators)
}

fn starts_comprehension(parser: &Parser) -> bool {
    parser.current_token_kind() == TokenKind::For
        || (parser.current_token_kind() == TokenKind::Async && parser.peek_kind(1) == TokenKind::For)
}

/// Parses the remaining comma separated elements of a display up to `close`.
fn parse_elements(parser: &mut Parser, first: Expr, close: TokenKind) -> Result<Vec<Expr>, Error> {
    let mut elements = vec![first];

    while parser.eat(TokenKind::Comma) {
        if parser.current_token_kind() == close {
            break;
        }
        elements.push(parse_expr(parser, BindingPower::Default)?);
    }

    Ok(elements)
}

/// Parenthesised expression, tuple or generator expression.
pub fn parse_grouping_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();

    if parser.eat(TokenKind::CloseParen) {
        let span = parser.span_from(start);
        return Ok(parser.mk_expr(ExprKind::Tuple(vec![]), span));
    }

    let first = parse_expr(parser, BindingPower::Default)?;

    if starts_comprehension(parser) {
        let generators = parse_comprehension_clauses(parser)?;
        parser.expect(TokenKind::CloseParen)?;
        let span = parser.span_from(start);
        return Ok(parser.mk_expr(
            ExprKind::GeneratorExp {
                elt: Box::new(first),
                generators,
            },
            span,
        ));
    }

    if parser.current_token_kind() == TokenKind::Comma {
        let elements = parse_elements(parser, first, TokenKind::CloseParen)?;
        parser.expect(TokenKind::CloseParen)?;
        let span = parser.span_from(start);
        return Ok(parser.mk_expr(ExprKind::Tuple(elements), span));
    }

    parser.expect(TokenKind::CloseParen)?;
    Ok(first)
}

pub fn parse_list_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();

    if parser.eat(TokenKind::CloseBracket) {
        let span = parser.span_from(start);
        return Ok(parser.mk_expr(ExprKind::List(vec![]), span));
    }

    let first = parse_expr(parser, BindingPower::Default)?;

    let kind = if starts_comprehension(parser) {
        ExprKind::ListComp {
            elt: Box::new(first),
            generators: parse_comprehension_clauses(parser)?,
        }
    } else {
        ExprKind::List(parse_elements(parser, first, TokenKind::CloseBracket)?)
    };

    parser.expect(TokenKind::CloseBracket)?;
    let span = parser.span_from(start);
    Ok(parser.mk_expr(kind, span))
}

/// Dict or set display, or their comprehensions.
pub fn parse_curly_expr(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.advance().span.start.clone();

    if parser.eat(TokenKind::CloseCurly) {
        let span = parser.span_from(start);
        return Ok(parser.mk_expr(
            ExprKind::Dict {
                keys: vec![],
                values: vec![],
            },
            span,
        ));
    }

    let mut keys = vec![];
    let mut values = vec![];

    if parser.eat(TokenKind::DoubleStar) {
        keys.push(None);
        values.push(parse_expr(parser, BindingPower::BitOr)?);
    } else {
        let first = parse_expr(parser, BindingPower::Default)?;

        if !parser.eat(TokenKind::Colon) {
            let kind = if starts_comprehension(parser) {
                ExprKind::SetComp {
                    elt: Box::new(first),
                    generators: parse_comprehension_clauses(parser)?,
                }
            } else {
                ExprKind::Set(parse_elements(parser, first, TokenKind::CloseCurly)?)
            };

            parser.expect(TokenKind::CloseCurly)?;
            let span = parser.span_from(start);
            return Ok(parser.mk_expr(kind, span));
        }

        let value = parse_expr(parser, BindingPower::Default)?;

        if starts_comprehension(parser) {
            let generators = parse_comprehension_clauses(parser)?;
            parser.expect(TokenKind::CloseCurly)?;
            let span = parser.span_from(start);
            return Ok(parser.mk_expr(
                ExprKind::DictComp {
                    key: Box::new(first),
                    value: Box::new(value),
                    generators,
                },
                span,
            ));
        }

        keys.push(Some(first));
        values.push(value);
    }

    while parser.eat(TokenKind::Comma) {
        if parser.current_token_kind() == TokenKind::CloseCurly {
            break;
        }

        if parser.eat(TokenKind::DoubleStar) {
            keys.push(None);
            values.push(parse_expr(parser, BindingPower::BitOr)?);
        } else {
            keys.push(Some(parse_expr(parser, BindingPower::Default)?));
            parser.expect(TokenKind::Colon)?;
            values.push(parse_expr(parser, BindingPower::Default)?);
        }
    }

    parser.expect(TokenKind::CloseCurly)?;
    let span = parser.span_from(start);
    Ok(parser.mk_expr(ExprKind::Dict { keys, values }, span))
}

/// Parses call arguments up to and including the closing parenthesis.
pub fn parse_arguments(parser: &mut Parser) -> Result<(Vec<Expr>, Vec<Keyword>), Error> {
    let mut args = vec![];
    let mut keywords = vec![];

    while parser.current_token_kind() != TokenKind::CloseParen {
        if parser.eat(TokenKind::DoubleStar) {
            keywords.push(Keyword {
                arg: None,
                value: parse_expr(parser, BindingPower::Default)?,
            });
        } else if parser.current_token_kind() == TokenKind::Identifier
            && parser.peek_kind(1) == TokenKind::Assignment
        {
            let arg = parser.advance().value.clone();
            parser.advance();
            keywords.push(Keyword {
                arg: Some(arg),
                value: parse_expr(parser, BindingPower::Default)?,
            });
        } else {
            let start = parser.get_position();
            let arg = parse_expr(parser, BindingPower::Default)?;

            if starts_comprehension(parser) {
                let generators = parse_comprehension_clauses(parser)?;
                let span = parser.span_from(start);
                args.push(parser.mk_expr(
                    ExprKind::GeneratorExp {
                        elt: Box::new(arg),
                        generators,
                    },
                    span,
                ));
            } else {
                args.push(arg);
            }
        }

        if !parser.eat(TokenKind::Comma) {
            break;
        }
    }

    parser.expect(TokenKind::CloseParen)?;
    Ok((args, keywords))
}

pub fn parse_call_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();

    let (args, keywords) = parse_arguments(parser)?;

    let span = parser.span_from(left.span.start.clone());
    Ok(parser.mk_expr(
        ExprKind::Call {
            func: Box::new(left),
            args,
            keywords,
        },
        span,
    ))
}

fn parse_slice_item(parser: &mut Parser) -> Result<Expr, Error> {
    let start = parser.get_position();

    let lower = if parser.current_token_kind() == TokenKind::Colon {
        None
    } else {
        let expr = parse_expr(parser, BindingPower::Default)?;
        if parser.current_token_kind() != TokenKind::Colon {
            return Ok(expr);
        }
        Some(Box::new(expr))
    };

    parser.expect(TokenKind::Colon)?;

    let bound = |parser: &mut Parser| -> Result<Option<Box<Expr>>, Error> {
        if matches!(
            parser.current_token_kind(),
            TokenKind::Colon | TokenKind::Comma | TokenKind::CloseBracket
        ) {
            Ok(None)
        } else {
            Ok(Some(Box::new(parse_expr(parser, BindingPower::Default)?)))
        }
    };

    let upper = bound(parser)?;
    let step = if parser.eat(TokenKind::Colon) {
        bound(parser)?
    } else {
        None
    };

    let span = parser.span_from(start);
    Ok(parser.mk_expr(ExprKind::Slice { lower, upper, step }, span))
}

pub fn parse_subscript_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let start = parser.get_position();

    let first = parse_slice_item(parser)?;
    let slice = if parser.current_token_kind() == TokenKind::Comma {
        let mut elements = vec![first];
        while parser.eat(TokenKind::Comma) {
            if parser.current_token_kind() == TokenKind::CloseBracket {
                break;
            }
            elements.push(parse_slice_item(parser)?);
        }
        let span = parser.span_from(start);
        parser.mk_expr(ExprKind::Tuple(elements), span)
    } else {
        first
    };

    parser.expect(TokenKind::CloseBracket)?;

    let span = parser.span_from(left.span.start.clone());
    Ok(parser.mk_expr(
        ExprKind::Subscript {
            value: Box::new(left),
            slice: Box::new(slice),
        },
        span,
    ))
}

pub fn parse_member_expr(parser: &mut Parser, left: Expr, _bp: BindingPower) -> Result<Expr, Error> {
    parser.advance();
    let error = parser.unexpected("expected attribute name after `.`");
    let attr = parser.expect_error(TokenKind::Identifier, Some(error))?.value;

    let span = parser.span_from(left.span.start.clone());
    Ok(parser.mk_expr(
        ExprKind::Attribute {
            value: Box::new(left),
            attr,
        },
        span,
    ))
}
