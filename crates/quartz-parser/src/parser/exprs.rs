//! Expression parsing: literals, references, unary/binary operators,
//! calls, subscripts, aggregates and parenthesized expressions.

use quartz_common::error::{ErrC, Error, Result};
use quartz_common::strutil::{unescape_quoted, unescape_raw_quoted};
use quartz_common::token::TokenKind;

use crate::ast::{AstKind, NodeId, ScalarKind};

use super::{is_valid_subexpr_, parse_begin_, items, ParseContext};

/// Dispatch for expressions introduced by a punctuator: directives,
/// aggregate literals, parenthesized expressions.
pub(crate) fn parse_punctuator_(ctx: &mut ParseContext) -> Result<Option<NodeId>> {
    match ctx.lexer.current().kind {
        TokenKind::At => items::parse_directive_(ctx),
        TokenKind::LBrace => parse_aggregate_lit_(ctx).map(Some),
        TokenKind::LParen => parse_parens_(ctx).map(Some),
        _ => Err(Error::msg(ErrC::BadToken, "Unexpected token.")),
    }
}

/// Scalar literals. Hex and octal text is converted to a decimal
/// string here; string and byte literals are unescaped.
pub(crate) fn parse_scalar_lit_(ctx: &mut ParseContext) -> Result<NodeId> {
    let curr = ctx.lexer.current();
    let text = ctx.lexer.token_text(&curr);

    let (scalar, value) = match curr.kind {
        TokenKind::FloatLiteral => {
            if text.parse::<f64>().is_err() {
                return Err(Error::msg(ErrC::BadToken, "Invalid literal token."));
            }
            (ScalarKind::FloatLit, text)
        }
        TokenKind::IntLiteral => {
            if text.parse::<u64>().is_err() {
                return Err(Error::msg(ErrC::BadToken, "Literal value is too large."));
            }
            (ScalarKind::IntLit, text)
        }
        TokenKind::BoolLiteral => (ScalarKind::BoolLit, text),
        TokenKind::NullLiteral => (ScalarKind::NullLit, String::new()),
        TokenKind::ByteLiteral => (ScalarKind::U8Lit, unescape_quoted(&text)?),
        TokenKind::HexLiteral => {
            let digits = &text[2..]; // past "0x"
            let converted = u64::from_str_radix(digits, 16)
                .map_err(|_| Error::msg(ErrC::BadToken, "Literal value is too large."))?;
            (ScalarKind::IntLit, converted.to_string())
        }
        TokenKind::OctalLiteral => {
            let digits = &text[1..]; // past the leading "0"
            let converted = u64::from_str_radix(digits, 8)
                .map_err(|_| Error::msg(ErrC::BadToken, "Literal value is too large."))?;
            (ScalarKind::IntLit, converted.to_string())
        }
        TokenKind::StringLiteral => {
            let value = if text.starts_with('`') {
                unescape_raw_quoted(&text)?
            } else {
                unescape_quoted(&text)?
            };
            (ScalarKind::StringLit, value)
        }
        other => panic!("parse_scalar_lit_ on non-literal token {other:?}"),
    };

    let node = ctx.ast.push(
        curr.pos,
        curr.line,
        ctx.current_file,
        AstKind::ScalarLiteral { value, scalar },
    );
    ctx.lexer.consume(1);
    Ok(node)
}

/// `{ expr, expr, ... }`
pub(crate) fn parse_aggregate_lit_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::LBrace, true)?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::AggregateLiteral { elems: Vec::new() },
    );

    while !ctx.on_kind(TokenKind::RBrace) {
        let curr = ctx.lexer.current();
        if curr.kind == TokenKind::EndOfFile {
            return Err(Error::msg(ErrC::BadToken, "Unterminated aggregate literal."));
        }

        let child = parse_begin_(ctx, true, false)?;
        let Some(child) = child.filter(|c| is_valid_subexpr_(&ctx.ast.get(*c).kind)) else {
            ctx.lexer.revert_before(&curr);
            return Err(Error::msg(
                ErrC::BadExpr,
                "Invalid subexpression within aggregate literal.",
            ));
        };

        ctx.ast.set_parent(child, node);
        match &mut ctx.ast.get_mut(node).kind {
            AstKind::AggregateLiteral { elems } => elems.push(child),
            _ => unreachable!(),
        }

        if ctx.on_kind(TokenKind::Comma) {
            ctx.lexer.consume(1);
        }
    }

    ctx.lexer.consume(1);
    Ok(node)
}

/// `( expr )` -- the expression inside consumes the closing paren via
/// the paren-level bookkeeping in `parse_begin_`.
pub(crate) fn parse_parens_(ctx: &mut ParseContext) -> Result<NodeId> {
    ctx.lexer.expect_kind(TokenKind::LParen, true)?;
    ctx.paren_level += 1;

    let curr = ctx.lexer.current();
    let expr = parse_begin_(ctx, true, false)?;

    match expr.filter(|e| is_valid_subexpr_(&ctx.ast.get(*e).kind)) {
        Some(expr) => Ok(expr),
        None => {
            ctx.lexer.revert_before(&curr);
            Err(Error::msg(
                ErrC::BadExpr,
                "Expression cannot be used inside of parentheses.",
            ))
        }
    }
}

/// A lone identifier becomes an unresolved entity-reference thunk for
/// the checker.
pub(crate) fn parse_identifier_(ctx: &mut ParseContext) -> Result<NodeId> {
    let curr = ctx.lexer.expect_kind(TokenKind::Identifier, false)?;
    let name = ctx.lexer.token_text(&curr);

    let node = ctx.ast.push(
        curr.pos,
        curr.line,
        ctx.current_file,
        AstKind::EntityRefThunk { path: vec![name] },
    );
    ctx.lexer.consume(1);
    Ok(node)
}

/// Prefix unary operators: `-x`, `!x`, `~x`, `*p`, `&v`, `++i`, ...
pub(crate) fn parse_unary_prefix_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.current();
    ctx.lexer.consume(1);

    let operand = parse_begin_(ctx, true, true)?;
    let Some(operand) = operand.filter(|o| is_valid_subexpr_(&ctx.ast.get(*o).kind)) else {
        ctx.lexer.revert_before(&begin);
        return Err(Error::msg(
            ErrC::BadExpr,
            "Unexpected expression following unary operator.",
        ));
    };

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::UnaryExpr {
            op: begin.kind,
            op_cat: begin.cat,
            is_postfix: false,
            operand,
        },
    );
    ctx.ast.set_parent(operand, node);
    Ok(node)
}

/// Postfix dispatch: calls, subscripts, `++`/`--`, and the
/// postfix-shaped binary operators (`.`, `->`, `::`), which are
/// preferred as binary and forwarded accordingly.
pub(crate) fn parse_postfix_(ctx: &mut ParseContext, operand: NodeId) -> Result<NodeId> {
    let curr = ctx.lexer.current();

    match curr.kind {
        TokenKind::LParen => parse_call_(ctx, operand),
        TokenKind::LBracket => parse_subscript_(ctx, operand),
        TokenKind::Dot | TokenKind::Arrow | TokenKind::NamespaceOp => {
            parse_binexpr_(ctx, operand)
        }
        TokenKind::Inc | TokenKind::Dec => {
            let node = ctx.ast.push(
                curr.pos,
                curr.line,
                ctx.current_file,
                AstKind::UnaryExpr {
                    op: curr.kind,
                    op_cat: curr.cat,
                    is_postfix: true,
                    operand,
                },
            );
            ctx.ast.set_parent(operand, node);
            ctx.lexer.consume(1);
            Ok(node)
        }
        other => panic!("parse_postfix_ on non-postfix token {other:?}"),
    }
}

/// `expr[index]`
pub(crate) fn parse_subscript_(ctx: &mut ParseContext, operand: NodeId) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::LBracket, true)?;

    let index = parse_begin_(ctx, true, false)?;
    let Some(index) = index.filter(|i| is_valid_subexpr_(&ctx.ast.get(*i).kind)) else {
        ctx.lexer.revert_before(&begin);
        return Err(Error::msg(ErrC::BadExpr, "Invalid subscript expression."));
    };

    ctx.lexer.expect_kind(TokenKind::RBracket, true).map_err(|_| {
        Error::msg(ErrC::BadToken, "Expected \"]\" to close the subscript.")
    })?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Subscript { operand, index },
    );
    ctx.ast.set_parent(operand, node);
    ctx.ast.set_parent(index, node);
    Ok(node)
}

/// `target(arg, arg, ...)` -- arguments are bounded by the paren level
/// so nested calls and parenthesized arguments nest correctly.
pub(crate) fn parse_call_(ctx: &mut ParseContext, operand: NodeId) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::LParen, true)?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Call {
            target: operand,
            args: Vec::new(),
        },
    );
    ctx.ast.set_parent(operand, node);

    if ctx.on_kind(TokenKind::RParen) {
        ctx.lexer.consume(1);
        return Ok(node);
    }

    let old_level = ctx.paren_level;
    ctx.paren_level += 1;

    while old_level < ctx.paren_level {
        let curr = ctx.lexer.current();
        if curr.kind == TokenKind::EndOfFile {
            return Err(Error::msg(ErrC::BadToken, "Unterminated call expression."));
        }

        let arg = parse_begin_(ctx, true, false)?;
        let Some(arg) = arg.filter(|a| is_valid_subexpr_(&ctx.ast.get(*a).kind)) else {
            ctx.lexer.revert_before(&curr);
            return Err(Error::msg(ErrC::BadExpr, "Invalid subexpression within call."));
        };

        ctx.ast.set_parent(arg, node);
        match &mut ctx.ast.get_mut(node).kind {
            AstKind::Call { args, .. } => args.push(arg),
            _ => unreachable!(),
        }

        // The argument expression may have consumed our closing paren.
        if old_level >= ctx.paren_level {
            break;
        }

        if ctx.lexer.current().is_terminator() {
            ctx.lexer.consume(1);
            if ctx.on_kind(TokenKind::RParen) {
                ctx.paren_level -= 1;
                ctx.lexer.consume(1);
            }
        }
    }

    Ok(node)
}

/// Pratt-style binary expression folding.
///
/// The right side is parsed as a single operand, then operators that
/// bind tighter than (or as tight as) the current one are folded into
/// it recursively.
pub(crate) fn parse_binexpr_(ctx: &mut ParseContext, left: NodeId) -> Result<NodeId> {
    let op = ctx.lexer.current();
    debug_assert!(op.cat.isa(quartz_common::token::TokenCategory::BINARY_OP));

    ctx.lexer.consume(1);

    let right = parse_begin_(ctx, true, true)?;
    let Some(mut right) = right.filter(|r| is_valid_subexpr_(&ctx.ast.get(*r).kind)) else {
        ctx.lexer.revert_before(&op);
        return Err(Error::msg(
            ErrC::BadExpr,
            "Invalid expression following binary operator.",
        ));
    };

    loop {
        let next = ctx.lexer.current();
        if !next.cat.isa(quartz_common::token::TokenCategory::BINARY_OP) {
            break;
        }
        if next.kind.prec() < op.kind.prec() {
            break;
        }
        right = parse_binexpr_(ctx, right)?;
    }

    let node = ctx.ast.push(
        op.pos,
        op.line,
        ctx.current_file,
        AstKind::BinExpr {
            op: op.kind,
            op_cat: op.cat,
            lhs: left,
            rhs: right,
        },
    );
    ctx.ast.set_parent(left, node);
    ctx.ast.set_parent(right, node);
    Ok(node)
}
