//! Hand-written recursive-descent parser for Quartz.
//!
//! The entry point is [`parse`], which drains the current input file
//! and then every file the parse queued through include directives.
//! All parse functions take the whole [`ParseContext`] and return
//! `Result<Option<NodeId>>`: `Ok(None)` means a valid token sequence
//! that produces no AST node (end of file, directives, type
//! declarations), an error means the construct failed and the lexer has
//! been reverted to a stable token boundary.

pub(crate) mod exprs;
pub(crate) mod items;

use std::io::Write;

use quartz_common::con::Styler;
use quartz_common::error::{ErrC, Error, Result};
use quartz_common::files::{FileQueue, InputFileId, InputFileKind};
use quartz_common::token::{TokenCategory, TokenKind};
use quartz_lexer::Lexer;

use crate::ast::{Ast, AstKind, NodeId};
use crate::entity::{EntityId, ROOT_ENTITY_ID};
use crate::errors::ErrorCollector;
use crate::table::EntityTable;

/// Everything the parser reads and writes while working through the
/// input queue. Constructed once by the driver; the entity table and
/// AST persist across files while the lexer is reset between them.
pub struct ParseContext {
    pub lexer: Lexer,
    pub entities: EntityTable,
    pub errors: ErrorCollector,
    pub ast: Ast,
    pub files: FileQueue,
    pub current_file: InputFileId,
    pub current_namespace: EntityId,
    pub paren_level: u32,
    pub toplevel: Vec<NodeId>,
    pub colours: bool,
}

impl ParseContext {
    pub fn new(lexer: Lexer, files: FileQueue, current_file: InputFileId) -> Self {
        Self {
            lexer,
            entities: EntityTable::new(),
            errors: ErrorCollector::new(),
            ast: Ast::new(),
            files,
            current_file,
            current_namespace: ROOT_ENTITY_ID,
            paren_level: 0,
            toplevel: Vec::new(),
            colours: true,
        }
    }

    pub(crate) fn on_kind(&self, kind: TokenKind) -> bool {
        self.lexer.current().kind == kind
    }

    pub(crate) fn styler(&self) -> Styler {
        Styler::new(self.colours)
    }
}

/// Only these node kinds may appear at the top level of a source file.
pub(crate) fn is_toplevel_valid_(kind: &AstKind) -> bool {
    matches!(
        kind,
        AstKind::Namespace { .. }
            | AstKind::ConstBranch { .. }
            | AstKind::ProcDecl { .. }
            | AstKind::Vardecl { .. }
    )
}

/// Whether a node can stand as an operand inside a larger expression.
pub(crate) fn is_valid_subexpr_(kind: &AstKind) -> bool {
    matches!(
        kind,
        AstKind::Call { .. }
            | AstKind::TypeRef { .. }
            | AstKind::TypeRefThunk { .. }
            | AstKind::EntityRef { .. }
            | AstKind::EntityRefThunk { .. }
            | AstKind::BinExpr { .. }
            | AstKind::ScalarLiteral { .. }
            | AstKind::AggregateLiteral { .. }
            | AstKind::UnaryExpr { .. }
            | AstKind::Subscript { .. }
    )
}

/// Brace-terminated constructs never take a `;`/`,` after them.
/// A do-while is the exception within While: its parser consumes the
/// required terminator itself before returning.
pub(crate) fn never_needs_terminator_(kind: &AstKind) -> bool {
    matches!(
        kind,
        AstKind::ProcDecl { .. }
            | AstKind::Namespace { .. }
            | AstKind::ScopeBlock { .. }
            | AstKind::For { .. }
            | AstKind::While { .. }
            | AstKind::Branch { .. }
            | AstKind::ConstBranch { .. }
            | AstKind::Switch { .. }
    )
}

/// The core recursive-descent entry.
///
/// `nocheck_term` skips the trailing-terminator requirement;
/// `parse_single` additionally stops before binary operators, parsing
/// exactly one operand.
pub(crate) fn parse_begin_(
    ctx: &mut ParseContext,
    nocheck_term: bool,
    parse_single: bool,
) -> Result<Option<NodeId>> {
    let curr = ctx.lexer.current();

    if curr.kind == TokenKind::EndOfFile {
        return Ok(None);
    }

    // Dispatch on the token's categories first, kinds second.
    let expr = if curr.cat.isa(TokenCategory::PUNCTUATOR) {
        exprs::parse_punctuator_(ctx)?
    } else if curr.cat.isa(TokenCategory::LITERAL) {
        Some(exprs::parse_scalar_lit_(ctx)?)
    } else if curr.kind == TokenKind::Identifier {
        Some(exprs::parse_identifier_(ctx)?)
    } else if curr.cat.isa(TokenCategory::KEYWORD) {
        items::parse_keyword_(ctx)?
    } else if curr.cat.isa(TokenCategory::UNARY_OP) && curr.cat.isa(TokenCategory::VALID_PREFIX) {
        Some(exprs::parse_unary_prefix_(ctx)?)
    } else if curr.kind == TokenKind::Illegal {
        return Err(Error::msg(ErrC::BadToken, "Illegal token."));
    } else {
        return Err(Error::msg(ErrC::BadToken, "Unexpected token."));
    };

    // A valid token sequence with no node (directive, type decl).
    let Some(mut expr) = expr else {
        return Ok(None);
    };

    if never_needs_terminator_(&ctx.ast.get(expr).kind) {
        return Ok(Some(expr));
    }

    // Postfix loop. Member access and the namespace operator are both
    // postfix and binary; the binary interpretation wins, so they are
    // routed into the binary parser (and left alone in single mode so
    // the caller's fold loop can see them).
    loop {
        let pf = ctx.lexer.current();
        if !pf.cat.isa(TokenCategory::VALID_POSTFIX) {
            break;
        }
        if parse_single
            && matches!(
                pf.kind,
                TokenKind::Dot | TokenKind::Arrow | TokenKind::NamespaceOp
            )
        {
            break;
        }
        expr = exprs::parse_postfix_(ctx, expr)?;
    }

    // Binary-operator loop.
    while !parse_single && ctx.lexer.current().cat.isa(TokenCategory::BINARY_OP) {
        expr = exprs::parse_binexpr_(ctx, expr)?;
    }

    // Leaving a parenthesized expression?
    if ctx.on_kind(TokenKind::RParen) {
        if ctx.paren_level == 0 {
            return Err(Error::msg(ErrC::BadToken, "Unexpected token."));
        }
        if !parse_single {
            ctx.paren_level -= 1;
            ctx.lexer.consume(1);
        }
    }

    if nocheck_term || parse_single {
        return Ok(Some(expr));
    }

    if ctx.lexer.current().is_terminator() {
        if ctx.paren_level != 0 {
            return Err(Error::msg(
                ErrC::BadToken,
                "Unexpected token inside parentheses.",
            ));
        }
        ctx.lexer.consume(1);
        return Ok(Some(expr));
    }

    Err(Error::msg(ErrC::BadToken, "Unexpected token."))
}

/// Switch the lexer onto the first Pending file queued by an include
/// directive. `Ok(false)` means the queue is drained.
fn get_next_include_(ctx: &mut ParseContext) -> Result<bool> {
    let Some((id, path)) = ctx.files.take_next_pending(InputFileKind::Included) else {
        return Ok(false);
    };

    let bytes = std::fs::read(&path).map_err(|e| {
        Error::msg(
            ErrC::FileIo,
            format!("Could not open included file {}: {e}.", path.display()),
        )
    })?;

    ctx.lexer.reset(bytes, path.display().to_string())?;
    ctx.current_file = id;
    ctx.current_namespace = ROOT_ENTITY_ID;
    ctx.paren_level = 0;
    Ok(true)
}

fn parse_impl_(ctx: &mut ParseContext, errstream: &mut dyn Write) -> bool {
    let mut ok = true;

    loop {
        loop {
            match parse_begin_(ctx, false, false) {
                Err(e) => {
                    ok = false;
                    let tok = ctx.lexer.current();
                    ctx.errors
                        .store_error(e.message(), ctx.current_file, tok.pos, tok.line);
                    if tok.kind != TokenKind::EndOfFile {
                        ErrorCollector::display_error(
                            e.message(),
                            &ctx.lexer,
                            None,
                            errstream,
                            false,
                            ctx.styler(),
                        );
                    }
                    break;
                }

                // A valid sequence that yields no node: keep going
                // unless the file is done.
                Ok(None) => {
                    if ctx.on_kind(TokenKind::EndOfFile) {
                        break;
                    }
                }

                Ok(Some(node)) => {
                    if !is_toplevel_valid_(&ctx.ast.get(node).kind) {
                        let n = ctx.ast.get(node);
                        ctx.errors.store_error(
                            "Expression is invalid at the toplevel.",
                            ctx.current_file,
                            n.pos,
                            n.line,
                        );
                        return false;
                    }
                    ctx.toplevel.push(node);
                }
            }
        }

        // The file must have ended exactly at EndOfFile.
        if !ctx.on_kind(TokenKind::EndOfFile) {
            return false;
        }

        match get_next_include_(ctx) {
            Ok(true) => continue,
            Ok(false) => break,
            Err(e) => {
                let styler = ctx.styler();
                let _ = writeln!(
                    errstream,
                    "{}Error:{} {}",
                    styler.red(),
                    styler.reset(),
                    e.message()
                );
                return false;
            }
        }
    }

    ok
}

/// Parse the current file and every queued include. Returns overall
/// success; diagnostics land in the context's error collector.
pub fn parse(ctx: &mut ParseContext, errstream: &mut dyn Write) -> bool {
    parse_impl_(ctx, errstream)
}
