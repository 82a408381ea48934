//! Declarations and statement-level constructs: procedures, namespaces,
//! variables, structs, control flow, defer, and the include directive.

use quartz_common::error::{ErrC, Error, Result};
use quartz_common::strutil::{unescape_quoted, unescape_raw_quoted};
use quartz_common::token::TokenKind;

use crate::ast::{AstKind, NodeId};
use crate::entity::{
    EntityId, EntityKind, EntityQualifierThunk, EntityTag, QualBase, QualFlags, StructMember,
    ROOT_ENTITY_ID,
};

use super::{exprs, is_toplevel_valid_, is_valid_subexpr_, parse_begin_, ParseContext};

/// Dispatch for every construct introduced by a keyword.
pub(crate) fn parse_keyword_(ctx: &mut ParseContext) -> Result<Option<NodeId>> {
    match ctx.lexer.current().kind {
        TokenKind::Proc => parse_procdecl_(ctx).map(Some),
        TokenKind::Namespace => parse_namespacedecl_(ctx).map(Some),
        TokenKind::Struct => parse_structdecl_(ctx),
        TokenKind::Scope => parse_scope_(ctx).map(Some),
        TokenKind::Return => parse_ret_(ctx).map(Some),
        TokenKind::Break => parse_break_(ctx).map(Some),
        TokenKind::Continue => parse_cont_(ctx).map(Some),
        TokenKind::Let => parse_vardecl_(ctx, false).map(Some),
        TokenKind::Const => {
            if ctx.lexer.peek(1).kind == TokenKind::If {
                parse_const_branch_(ctx).map(Some)
            } else {
                parse_vardecl_(ctx, true).map(Some)
            }
        }
        TokenKind::If => parse_branch_(ctx).map(Some),
        TokenKind::For => parse_for_(ctx).map(Some),
        TokenKind::While => parse_while_(ctx).map(Some),
        TokenKind::Do => parse_dowhile_(ctx).map(Some),
        TokenKind::Switch => parse_switch_(ctx).map(Some),
        TokenKind::Defer => parse_defer_(ctx).map(Some),
        TokenKind::DeferIf => parse_defer_if_(ctx).map(Some),

        kind @ (TokenKind::Else
        | TokenKind::Case
        | TokenKind::Default
        | TokenKind::Fallthrough) => Err(Error::msg(
            ErrC::BadToken,
            format!("\"{}\" is not valid here.", kind.string_repr()),
        )),

        kind @ (TokenKind::Enum
        | TokenKind::Typeof
        | TokenKind::Sizeof
        | TokenKind::As
        | TokenKind::Where
        | TokenKind::Otherwise
        | TokenKind::With) => Err(Error::msg(
            ErrC::NotImplemented,
            format!("\"{}\" is reserved and not supported yet.", kind.string_repr()),
        )),

        other => panic!("parse_keyword_ on non-keyword token {other:?}"),
    }
}

/// `{ stmt* }` -- shared by procedure bodies, scope blocks, branches
/// and loops.
fn parse_block_(ctx: &mut ParseContext, what: &str) -> Result<Vec<NodeId>> {
    ctx.lexer
        .expect_kind(TokenKind::LBrace, true)
        .map_err(|_| Error::msg(ErrC::BadToken, format!("Expected \"{{\" to open the {what}.")))?;

    let mut body = Vec::new();
    while !ctx.on_kind(TokenKind::RBrace) {
        if ctx.on_kind(TokenKind::EndOfFile) {
            return Err(Error::msg(ErrC::BadToken, format!("Unterminated {what}.")));
        }
        if let Some(child) = parse_begin_(ctx, false, false)? {
            body.push(child);
        }
    }
    ctx.lexer.consume(1);
    Ok(body)
}

/// Walk (or create) the entity chain for `a::b::c`.
///
/// Missing segments become placeholders under the walk position; a
/// leading `::` roots the walk at the root entity. Returns the final
/// segment's id; `current_namespace` is left untouched.
pub(crate) fn parse_deep_ident_(ctx: &mut ParseContext) -> Result<EntityId> {
    let begin = ctx.lexer.current();
    let old_ns = ctx.current_namespace;

    if begin.kind != TokenKind::NamespaceOp && begin.kind != TokenKind::Identifier {
        return Err(Error::msg(ErrC::BadToken, "Expected the start of an identifier."));
    }

    if ctx.on_kind(TokenKind::NamespaceOp) {
        ctx.current_namespace = ROOT_ENTITY_ID;
        ctx.lexer.consume(1);
    }

    loop {
        let tok = match ctx.lexer.expect_kind(TokenKind::Identifier, false) {
            Ok(tok) => tok,
            Err(e) => {
                ctx.current_namespace = old_ns;
                return Err(e);
            }
        };
        let name = ctx.lexer.token_text(&tok);
        ctx.lexer.consume(1);

        match ctx.entities.find_child(ctx.current_namespace, &name) {
            Some(id) => ctx.current_namespace = id,
            None => {
                let id = ctx.entities.insert(
                    ctx.current_namespace,
                    tok.pos,
                    tok.line,
                    ctx.current_file,
                    &name,
                    EntityKind::PlaceHolder {
                        to_be: EntityTag::None,
                    },
                );
                ctx.current_namespace = id;
            }
        }

        if ctx.on_kind(TokenKind::NamespaceOp) {
            ctx.lexer.consume(1);
        } else {
            break;
        }
    }

    let result = ctx.current_namespace;
    ctx.current_namespace = old_ns;
    Ok(result)
}

/// A lexical type path like `::net::Addr`, collected without touching
/// the entity table -- type references stay unresolved thunks.
fn parse_type_path_(ctx: &mut ParseContext) -> Result<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut rooted = false;

    if ctx.on_kind(TokenKind::NamespaceOp) {
        rooted = true;
        ctx.lexer.consume(1);
    }

    loop {
        let tok = ctx
            .lexer
            .expect_kind(TokenKind::Identifier, false)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected a type name."))?;
        segments.push(ctx.lexer.token_text(&tok));
        ctx.lexer.consume(1);

        if ctx.on_kind(TokenKind::NamespaceOp) {
            ctx.lexer.consume(1);
        } else {
            break;
        }
    }

    let joined = segments.join("::");
    Ok(if rooted { format!("::{joined}") } else { joined })
}

/// Qualified-type reference: optional `const`, a type path, `*` for
/// each pointer level, `[N]` per array dimension.
fn parse_qualifier_thunk_(ctx: &mut ParseContext, mut constant: bool) -> Result<EntityQualifierThunk> {
    if ctx.on_kind(TokenKind::Const) {
        constant = true;
        ctx.lexer.consume(1);
    }

    let name = parse_type_path_(ctx)?;
    let mut base = QualBase::default();
    if constant {
        base.flags |= QualFlags::CONSTANT;
    }

    while ctx.on_kind(TokenKind::Mul) {
        base.ptr_depth += 1;
        ctx.lexer.consume(1);
    }

    while ctx.on_kind(TokenKind::LBracket) {
        ctx.lexer.consume(1);
        let lit = ctx
            .lexer
            .expect_kind(TokenKind::IntLiteral, false)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected an integer array length."))?;
        let len: u32 = ctx
            .lexer
            .token_text(&lit)
            .parse()
            .map_err(|_| Error::msg(ErrC::Overflow, "Array length is too large."))?;
        ctx.lexer.consume(1);
        ctx.lexer
            .expect_kind(TokenKind::RBracket, true)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"]\" after array length."))?;
        base.arr_lengths.push(len);
    }

    Ok(EntityQualifierThunk { base, name })
}

fn parse_qualtype_(ctx: &mut ParseContext, constant: bool) -> Result<NodeId> {
    let begin = ctx.lexer.current();
    let qual = parse_qualifier_thunk_(ctx, constant)?;
    Ok(ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::TypeRefThunk { qual },
    ))
}

/// `let|const NAME (: qualtype)? (= expr)?` -- the terminator is left
/// to the caller. Declares a Variable entity under the current
/// namespace.
pub(crate) fn parse_vardecl_(ctx: &mut ParseContext, is_const: bool) -> Result<NodeId> {
    let begin = ctx.lexer.current();
    debug_assert!(matches!(begin.kind, TokenKind::Let | TokenKind::Const));
    ctx.lexer.consume(1);

    let name_tok = ctx
        .lexer
        .expect_kind(TokenKind::Identifier, false)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected a name after the declaration keyword."))?;
    let name = ctx.lexer.token_text(&name_tok);
    ctx.lexer.consume(1);

    let mut quals = QualBase::default();
    if is_const {
        quals.flags |= QualFlags::CONSTANT;
    }

    let var_kind = EntityKind::Variable {
        quals: quals.clone(),
        ty: EntityId::INVALID,
    };

    let ent_id = match ctx.entities.find_child(ctx.current_namespace, &name) {
        Some(id) if ctx.entities.get(id).kind.tag() == EntityTag::PlaceHolder => ctx
            .entities
            .swap_placeholder(id, name_tok.pos, name_tok.line, ctx.current_file, var_kind)?,
        Some(_) => {
            return Err(Error::msg(
                ErrC::BadEntity,
                "Multiple declaration: entity was already defined under a different type.",
            ))
        }
        None => ctx.entities.insert(
            ctx.current_namespace,
            name_tok.pos,
            name_tok.line,
            ctx.current_file,
            &name,
            var_kind,
        ),
    };

    let mut ty = None;
    if ctx.on_kind(TokenKind::TypeAssign) {
        ctx.lexer.consume(1);
        let ty_node = parse_qualtype_(ctx, is_const)?;
        if let AstKind::TypeRefThunk { qual } = &ctx.ast.get(ty_node).kind {
            let base = qual.base.clone();
            match &mut ctx.entities.get_mut(ent_id).kind {
                EntityKind::Variable { quals, .. } => *quals = base,
                _ => unreachable!("entity declared as Variable above"),
            }
        }
        ty = Some(ty_node);
    }

    let mut init = None;
    if ctx.on_kind(TokenKind::ValueAssign) {
        ctx.lexer.consume(1);
        let curr = ctx.lexer.current();
        let value = parse_begin_(ctx, true, false)?;
        let Some(value) = value.filter(|v| is_valid_subexpr_(&ctx.ast.get(*v).kind)) else {
            ctx.lexer.revert_before(&curr);
            return Err(Error::msg(
                ErrC::BadExpr,
                "Invalid initializer expression.",
            ));
        };
        init = Some(value);
    }

    let name_node = ctx.ast.push(
        name_tok.pos,
        name_tok.line,
        ctx.current_file,
        AstKind::EntityRef { id: ent_id },
    );
    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Vardecl {
            name: name_node,
            ty,
            init,
        },
    );
    ctx.ast.set_parent(name_node, node);
    if let Some(ty) = ty {
        ctx.ast.set_parent(ty, node);
    }
    if let Some(init) = init {
        ctx.ast.set_parent(init, node);
    }
    Ok(node)
}

/// `namespace A::B::C { body }` or `namespace A::B::C <single-stmt>`.
pub(crate) fn parse_namespacedecl_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Namespace, true)?;
    let old_ns = ctx.current_namespace;
    let ns_id = parse_deep_ident_(ctx)?;

    let tag = ctx.entities.get(ns_id).kind.tag();
    match tag {
        EntityTag::PlaceHolder => {
            ctx.entities.swap_placeholder(
                ns_id,
                begin.pos,
                begin.line,
                ctx.current_file,
                EntityKind::Static,
            )?;
        }
        EntityTag::Static => {} // re-opening an existing namespace
        _ => {
            return Err(Error::msg(
                ErrC::BadEntity,
                "Multiple declaration: entity was already defined under a different type.",
            ))
        }
    }

    // Intermediate path segments created by the walk are namespaces
    // too; upgrade them so nothing on the declared path stays a
    // placeholder.
    let mut walk = ctx.entities.get(ns_id).parent;
    while walk.is_valid() && walk != ROOT_ENTITY_ID {
        if ctx.entities.get(walk).kind.tag() != EntityTag::PlaceHolder {
            break;
        }
        ctx.entities.swap_placeholder(
            walk,
            begin.pos,
            begin.line,
            ctx.current_file,
            EntityKind::Static,
        )?;
        walk = ctx.entities.get(walk).parent;
    }

    ctx.current_namespace = ns_id;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Namespace {
            entity: ns_id,
            body: Vec::new(),
        },
    );

    // Single-statement body form.
    if !ctx.on_kind(TokenKind::LBrace) {
        let curr = ctx.lexer.current();
        let child = parse_begin_(ctx, false, false)?;
        if let Some(child) = child {
            if !is_toplevel_valid_(&ctx.ast.get(child).kind) {
                ctx.lexer.revert_before(&curr);
                ctx.current_namespace = old_ns;
                return Err(Error::msg(
                    ErrC::BadExpr,
                    "Expression is invalid at the toplevel.",
                ));
            }
            ctx.ast.set_parent(child, node);
            match &mut ctx.ast.get_mut(node).kind {
                AstKind::Namespace { body, .. } => body.push(child),
                _ => unreachable!(),
            }
        }
        ctx.current_namespace = old_ns;
        return Ok(node);
    }

    ctx.lexer.consume(1);
    while !ctx.on_kind(TokenKind::RBrace) {
        if ctx.on_kind(TokenKind::EndOfFile) {
            ctx.current_namespace = old_ns;
            return Err(Error::msg(ErrC::BadToken, "Unterminated namespace body."));
        }

        let curr = ctx.lexer.current();
        let child = match parse_begin_(ctx, false, false) {
            Ok(c) => c,
            Err(e) => {
                ctx.current_namespace = old_ns;
                return Err(e);
            }
        };

        if let Some(child) = child {
            if !is_toplevel_valid_(&ctx.ast.get(child).kind) {
                ctx.lexer.revert_before(&curr);
                ctx.current_namespace = old_ns;
                return Err(Error::msg(
                    ErrC::BadExpr,
                    "Expression is invalid at the toplevel.",
                ));
            }
            ctx.ast.set_parent(child, node);
            match &mut ctx.ast.get_mut(node).kind {
                AstKind::Namespace { body, .. } => body.push(child),
                _ => unreachable!(),
            }
        }
    }

    ctx.lexer.consume(1);
    ctx.current_namespace = old_ns;
    Ok(node)
}

/// `proc A::B(params) -> ret { body }`
pub(crate) fn parse_procdecl_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Proc, true)?;
    let old_ns = ctx.current_namespace;
    let proc_id = parse_deep_ident_(ctx)?;

    if ctx.entities.get(proc_id).kind.tag() != EntityTag::PlaceHolder {
        return Err(Error::msg(
            ErrC::BadEntity,
            "Multiple declaration: entity was already defined under a different type.",
        ));
    }
    ctx.entities.swap_placeholder(
        proc_id,
        begin.pos,
        begin.line,
        ctx.current_file,
        EntityKind::Proc {
            params: Vec::new(),
            return_type: EntityId::INVALID,
        },
    )?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::ProcDecl {
            entity: proc_id,
            params: Vec::new(),
            ret: None,
            body: Vec::new(),
        },
    );

    ctx.current_namespace = proc_id;
    let result = parse_procdecl_rest_(ctx, proc_id, node);
    ctx.current_namespace = old_ns;
    result
}

fn parse_procdecl_rest_(
    ctx: &mut ParseContext,
    proc_id: EntityId,
    node: NodeId,
) -> Result<NodeId> {
    ctx.lexer
        .expect_kind(TokenKind::LParen, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"(\" after the procedure name."))?;

    // Parameters: `name: qualtype` separated by commas. Each becomes a
    // Variable entity under the procedure.
    while !ctx.on_kind(TokenKind::RParen) {
        if ctx.on_kind(TokenKind::EndOfFile) {
            return Err(Error::msg(ErrC::BadToken, "Unterminated parameter list."));
        }

        let p_tok = ctx
            .lexer
            .expect_kind(TokenKind::Identifier, false)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected a parameter name."))?;
        let p_name = ctx.lexer.token_text(&p_tok);
        ctx.lexer.consume(1);

        if ctx.entities.find_child(proc_id, &p_name).is_some() {
            return Err(Error::msg(
                ErrC::BadEntity,
                "Multiple declaration: parameter name is already in use.",
            ));
        }

        ctx.lexer
            .expect_kind(TokenKind::TypeAssign, true)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected \":\" after the parameter name."))?;

        let ty_node = parse_qualtype_(ctx, false)?;
        let quals = match &ctx.ast.get(ty_node).kind {
            AstKind::TypeRefThunk { qual } => qual.base.clone(),
            _ => unreachable!("parse_qualtype_ builds a thunk"),
        };

        let var_id = ctx.entities.insert(
            proc_id,
            p_tok.pos,
            p_tok.line,
            ctx.current_file,
            &p_name,
            EntityKind::Variable {
                quals,
                ty: EntityId::INVALID,
            },
        );
        match &mut ctx.entities.get_mut(proc_id).kind {
            EntityKind::Proc { params, .. } => params.push(var_id),
            _ => unreachable!("entity swapped to Proc above"),
        }

        let name_node = ctx.ast.push(
            p_tok.pos,
            p_tok.line,
            ctx.current_file,
            AstKind::EntityRef { id: var_id },
        );
        let param = ctx.ast.push(
            p_tok.pos,
            p_tok.line,
            ctx.current_file,
            AstKind::Vardecl {
                name: name_node,
                ty: Some(ty_node),
                init: None,
            },
        );
        ctx.ast.set_parent(name_node, param);
        ctx.ast.set_parent(ty_node, param);
        ctx.ast.set_parent(param, node);
        match &mut ctx.ast.get_mut(node).kind {
            AstKind::ProcDecl { params, .. } => params.push(param),
            _ => unreachable!(),
        }

        if ctx.on_kind(TokenKind::Comma) {
            ctx.lexer.consume(1);
        } else if !ctx.on_kind(TokenKind::RParen) {
            return Err(Error::msg(
                ErrC::BadToken,
                "Expected \",\" or \")\" in the parameter list.",
            ));
        }
    }
    ctx.lexer.consume(1); // ')'

    ctx.lexer
        .expect_kind(TokenKind::Arrow, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"->\" after the parameter list."))?;

    // Return type, unless the body opens immediately. Stored on the
    // AST node as a thunk; the checker resolves it onto the entity.
    if !ctx.on_kind(TokenKind::LBrace) {
        let ret = parse_qualtype_(ctx, false)?;
        ctx.ast.set_parent(ret, node);
        match &mut ctx.ast.get_mut(node).kind {
            AstKind::ProcDecl { ret: slot, .. } => *slot = Some(ret),
            _ => unreachable!(),
        }
    }

    let body = parse_block_(ctx, "procedure body")?;
    for child in &body {
        ctx.ast.set_parent(*child, node);
    }
    match &mut ctx.ast.get_mut(node).kind {
        AstKind::ProcDecl { body: slot, .. } => *slot = body,
        _ => unreachable!(),
    }

    Ok(node)
}

/// `struct A::B { member: type, ... }` -- a pure entity-table
/// declaration; no AST node is produced.
pub(crate) fn parse_structdecl_(ctx: &mut ParseContext) -> Result<Option<NodeId>> {
    let begin = ctx.lexer.expect_kind(TokenKind::Struct, true)?;
    let ent_id = parse_deep_ident_(ctx)?;

    if ctx.entities.get(ent_id).kind.tag() != EntityTag::PlaceHolder {
        return Err(Error::msg(
            ErrC::BadEntity,
            "Multiple declaration: entity was already defined under a different type.",
        ));
    }
    ctx.entities.swap_placeholder(
        ent_id,
        begin.pos,
        begin.line,
        ctx.current_file,
        EntityKind::Struct {
            members: Vec::new(),
        },
    )?;

    ctx.lexer
        .expect_kind(TokenKind::LBrace, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"{\" to open the struct body."))?;

    let mut members: Vec<StructMember> = Vec::new();
    while !ctx.on_kind(TokenKind::RBrace) {
        if ctx.on_kind(TokenKind::EndOfFile) {
            return Err(Error::msg(ErrC::BadToken, "Unterminated struct body."));
        }

        let m_tok = ctx
            .lexer
            .expect_kind(TokenKind::Identifier, false)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected a member name."))?;
        let m_name = ctx.lexer.token_text(&m_tok);
        ctx.lexer.consume(1);

        if members.iter().any(|m| m.name == m_name) {
            return Err(Error::msg(
                ErrC::BadEntity,
                "Multiple declaration: struct member name is already in use.",
            ));
        }

        ctx.lexer
            .expect_kind(TokenKind::TypeAssign, true)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected \":\" after the member name."))?;

        let thunk = parse_qualifier_thunk_(ctx, false)?;
        members.push(StructMember {
            name: m_name,
            quals: thunk.base,
            ty_name: thunk.name,
        });

        if ctx.on_kind(TokenKind::Comma) || ctx.on_kind(TokenKind::Semicolon) {
            ctx.lexer.consume(1);
        } else if !ctx.on_kind(TokenKind::RBrace) {
            return Err(Error::msg(
                ErrC::BadToken,
                "Expected \",\" or \"}\" in the struct body.",
            ));
        }
    }
    ctx.lexer.consume(1);

    match &mut ctx.entities.get_mut(ent_id).kind {
        EntityKind::Struct { members: slot } => *slot = members,
        _ => unreachable!("entity swapped to Struct above"),
    }
    Ok(None)
}

/// `scope { ... }` -- an arbitrary lexical block.
pub(crate) fn parse_scope_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Scope, true)?;
    let body = parse_block_(ctx, "scope block")?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::ScopeBlock { body: body.clone() },
    );
    for child in body {
        ctx.ast.set_parent(child, node);
    }
    Ok(node)
}

/// `return <expr>?` -- the empty form is allowed.
pub(crate) fn parse_ret_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Return, true)?;

    let mut value = None;
    if !ctx.lexer.current().is_terminator() {
        let curr = ctx.lexer.current();
        let v = parse_begin_(ctx, true, false)?;
        let Some(v) = v.filter(|v| is_valid_subexpr_(&ctx.ast.get(*v).kind)) else {
            ctx.lexer.revert_before(&curr);
            return Err(Error::msg(
                ErrC::BadExpr,
                "Invalid expression after return statement.",
            ));
        };
        value = Some(v);
    }

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Return { value },
    );
    if let Some(v) = value {
        ctx.ast.set_parent(v, node);
    }
    Ok(node)
}

pub(crate) fn parse_break_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Break, true)?;
    Ok(ctx
        .ast
        .push(begin.pos, begin.line, ctx.current_file, AstKind::Break))
}

pub(crate) fn parse_cont_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Continue, true)?;
    Ok(ctx
        .ast
        .push(begin.pos, begin.line, ctx.current_file, AstKind::Continue))
}

/// `if (cond) { body } (else <branch-or-block>)?`
pub(crate) fn parse_branch_(ctx: &mut ParseContext) -> Result<NodeId> {
    parse_branch_impl_(ctx, false)
}

/// `const if (cond) { body } (const else <branch-or-block>)?`
pub(crate) fn parse_const_branch_(ctx: &mut ParseContext) -> Result<NodeId> {
    ctx.lexer.expect_kind(TokenKind::Const, true)?;
    parse_branch_impl_(ctx, true)
}

fn parse_branch_impl_(ctx: &mut ParseContext, is_const: bool) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::If, true)?;

    if !ctx.on_kind(TokenKind::LParen) {
        return Err(Error::msg(ErrC::BadToken, "Expected \"(\" after \"if\"."));
    }
    let cond = exprs::parse_parens_(ctx)?;
    let body = parse_block_(ctx, "branch body")?;

    let if_node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::If {
            cond,
            body: body.clone(),
        },
    );
    ctx.ast.set_parent(cond, if_node);
    for child in body {
        ctx.ast.set_parent(child, if_node);
    }

    // The else arm: `const if` pairs with `const else`.
    let has_else = if is_const {
        ctx.on_kind(TokenKind::Const) && ctx.lexer.peek(1).kind == TokenKind::Else
    } else {
        ctx.on_kind(TokenKind::Else)
    };

    let mut else_node = None;
    if has_else {
        let else_tok = if is_const {
            ctx.lexer.consume(1); // const
            let tok = ctx.lexer.current();
            ctx.lexer.consume(1); // else
            tok
        } else {
            let tok = ctx.lexer.current();
            ctx.lexer.consume(1);
            tok
        };

        // An else-if chain nests the next branch inside the else body.
        let else_body = if !is_const && ctx.on_kind(TokenKind::If) {
            vec![parse_branch_(ctx)?]
        } else if is_const
            && ctx.on_kind(TokenKind::Const)
            && ctx.lexer.peek(1).kind == TokenKind::If
        {
            vec![parse_const_branch_(ctx)?]
        } else {
            parse_block_(ctx, "else body")?
        };

        let en = ctx.ast.push(
            else_tok.pos,
            else_tok.line,
            ctx.current_file,
            AstKind::Else {
                body: else_body.clone(),
            },
        );
        for child in else_body {
            ctx.ast.set_parent(child, en);
        }
        else_node = Some(en);
    }

    let kind = if is_const {
        AstKind::ConstBranch {
            if_: if_node,
            else_: else_node,
        }
    } else {
        AstKind::Branch {
            if_: if_node,
            else_: else_node,
        }
    };
    let node = ctx
        .ast
        .push(begin.pos, begin.line, ctx.current_file, kind);
    ctx.ast.set_parent(if_node, node);
    if let Some(en) = else_node {
        ctx.ast.set_parent(en, node);
    }
    Ok(node)
}

/// `for (init?; cond?; update?) { body }`
pub(crate) fn parse_for_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::For, true)?;
    ctx.lexer
        .expect_kind(TokenKind::LParen, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"(\" after \"for\"."))?;
    ctx.paren_level += 1;

    let mut init = None;
    if ctx.on_kind(TokenKind::Semicolon) {
        ctx.lexer.consume(1);
    } else {
        init = parse_begin_(ctx, true, false)?;
        ctx.lexer
            .expect_kind(TokenKind::Semicolon, true)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected \";\" after the loop initializer."))?;
    }

    let mut cond = None;
    if ctx.on_kind(TokenKind::Semicolon) {
        ctx.lexer.consume(1);
    } else {
        let curr = ctx.lexer.current();
        let c = parse_begin_(ctx, true, false)?;
        let Some(c) = c.filter(|c| is_valid_subexpr_(&ctx.ast.get(*c).kind)) else {
            ctx.lexer.revert_before(&curr);
            return Err(Error::msg(ErrC::BadExpr, "Invalid loop condition."));
        };
        cond = Some(c);
        ctx.lexer
            .expect_kind(TokenKind::Semicolon, true)
            .map_err(|_| Error::msg(ErrC::BadToken, "Expected \";\" after the loop condition."))?;
    }

    let mut update = None;
    if ctx.on_kind(TokenKind::RParen) {
        ctx.paren_level -= 1;
        ctx.lexer.consume(1);
    } else {
        // The update expression consumes the closing paren through the
        // paren-level bookkeeping in parse_begin_.
        update = parse_begin_(ctx, true, false)?;
        if update.is_none() {
            return Err(Error::msg(ErrC::BadExpr, "Invalid loop update expression."));
        }
    }

    let body = parse_block_(ctx, "loop body")?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::For {
            init,
            cond,
            update,
            body: body.clone(),
        },
    );
    for child in init.iter().chain(cond.iter()).chain(update.iter()) {
        ctx.ast.set_parent(*child, node);
    }
    for child in body {
        ctx.ast.set_parent(child, node);
    }
    Ok(node)
}

/// `while (cond) { body }`
pub(crate) fn parse_while_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::While, true)?;

    if !ctx.on_kind(TokenKind::LParen) {
        return Err(Error::msg(ErrC::BadToken, "Expected \"(\" after \"while\"."));
    }
    let cond = exprs::parse_parens_(ctx)?;
    let body = parse_block_(ctx, "loop body")?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::While {
            cond,
            body: body.clone(),
            is_dowhile: false,
        },
    );
    ctx.ast.set_parent(cond, node);
    for child in body {
        ctx.ast.set_parent(child, node);
    }
    Ok(node)
}

/// `do { body } while (cond);` -- consumes its own terminator.
pub(crate) fn parse_dowhile_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Do, true)?;
    let body = parse_block_(ctx, "loop body")?;

    ctx.lexer
        .expect_kind(TokenKind::While, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"while\" after the do-loop body."))?;
    if !ctx.on_kind(TokenKind::LParen) {
        return Err(Error::msg(ErrC::BadToken, "Expected \"(\" after \"while\"."));
    }
    let cond = exprs::parse_parens_(ctx)?;
    ctx.lexer
        .expect_kind(TokenKind::Semicolon, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \";\" after the do-while loop."))?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::While {
            cond,
            body: body.clone(),
            is_dowhile: true,
        },
    );
    ctx.ast.set_parent(cond, node);
    for child in body {
        ctx.ast.set_parent(child, node);
    }
    Ok(node)
}

/// `switch (target) { case v: ... default: ... }`
pub(crate) fn parse_switch_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Switch, true)?;

    if !ctx.on_kind(TokenKind::LParen) {
        return Err(Error::msg(ErrC::BadToken, "Expected \"(\" after \"switch\"."));
    }
    let target = exprs::parse_parens_(ctx)?;

    ctx.lexer
        .expect_kind(TokenKind::LBrace, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \"{\" to open the switch body."))?;

    let mut cases = Vec::new();
    let mut default = None;
    loop {
        match ctx.lexer.current().kind {
            TokenKind::Case => cases.push(parse_case_(ctx)?),
            TokenKind::Default => {
                if default.is_some() {
                    return Err(Error::msg(
                        ErrC::BadToken,
                        "Multiple default cases in switch.",
                    ));
                }
                default = Some(parse_default_(ctx)?);
            }
            TokenKind::RBrace => {
                ctx.lexer.consume(1);
                break;
            }
            TokenKind::EndOfFile => {
                return Err(Error::msg(ErrC::BadToken, "Unterminated switch body."));
            }
            _ => {
                return Err(Error::msg(
                    ErrC::BadToken,
                    "Expected \"case\", \"default\" or \"}\" in the switch body.",
                ));
            }
        }
    }

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Switch {
            target,
            cases: cases.clone(),
            default,
        },
    );
    ctx.ast.set_parent(target, node);
    for case in cases {
        ctx.ast.set_parent(case, node);
    }
    if let Some(d) = default {
        ctx.ast.set_parent(d, node);
    }
    Ok(node)
}

/// One `case <value>: stmts...` arm. A `fallthrough;` statement inside
/// the arm sets the flag instead of producing a node.
fn parse_case_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Case, true)?;

    let curr = ctx.lexer.current();
    let value = parse_begin_(ctx, true, false)?;
    let Some(value) = value.filter(|v| is_valid_subexpr_(&ctx.ast.get(*v).kind)) else {
        ctx.lexer.revert_before(&curr);
        return Err(Error::msg(ErrC::BadExpr, "Invalid case value."));
    };

    ctx.lexer
        .expect_kind(TokenKind::TypeAssign, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \":\" after the case value."))?;

    let (body, is_fallthrough) = parse_case_body_(ctx)?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Case {
            value,
            body: body.clone(),
            is_fallthrough,
        },
    );
    ctx.ast.set_parent(value, node);
    for child in body {
        ctx.ast.set_parent(child, node);
    }
    Ok(node)
}

fn parse_default_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Default, true)?;
    ctx.lexer
        .expect_kind(TokenKind::TypeAssign, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \":\" after \"default\"."))?;

    let (body, _) = parse_case_body_(ctx)?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Default { body: body.clone() },
    );
    for child in body {
        ctx.ast.set_parent(child, node);
    }
    Ok(node)
}

fn parse_case_body_(ctx: &mut ParseContext) -> Result<(Vec<NodeId>, bool)> {
    let mut body = Vec::new();
    let mut is_fallthrough = false;

    loop {
        match ctx.lexer.current().kind {
            TokenKind::Case | TokenKind::Default | TokenKind::RBrace => break,
            TokenKind::EndOfFile => {
                return Err(Error::msg(ErrC::BadToken, "Unterminated switch body."));
            }
            TokenKind::Fallthrough => {
                ctx.lexer.consume(1);
                ctx.lexer.expect_kind(TokenKind::Semicolon, true).map_err(|_| {
                    Error::msg(ErrC::BadToken, "Expected \";\" after \"fallthrough\".")
                })?;
                is_fallthrough = true;
            }
            _ => {
                if let Some(child) = parse_begin_(ctx, false, false)? {
                    body.push(child);
                }
            }
        }
    }

    Ok((body, is_fallthrough))
}

/// `defer call();` -- the operand must be a call expression.
pub(crate) fn parse_defer_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::Defer, true)?;
    let call = parse_deferred_call_(ctx)?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::Defer { call },
    );
    ctx.ast.set_parent(call, node);
    Ok(node)
}

/// `defer_if (cond) call();`
pub(crate) fn parse_defer_if_(ctx: &mut ParseContext) -> Result<NodeId> {
    let begin = ctx.lexer.expect_kind(TokenKind::DeferIf, true)?;

    if !ctx.on_kind(TokenKind::LParen) {
        return Err(Error::msg(ErrC::BadToken, "Expected \"(\" after \"defer_if\"."));
    }
    let cond = exprs::parse_parens_(ctx)?;
    let call = parse_deferred_call_(ctx)?;

    let node = ctx.ast.push(
        begin.pos,
        begin.line,
        ctx.current_file,
        AstKind::DeferIf { cond, call },
    );
    ctx.ast.set_parent(cond, node);
    ctx.ast.set_parent(call, node);
    Ok(node)
}

fn parse_deferred_call_(ctx: &mut ParseContext) -> Result<NodeId> {
    let curr = ctx.lexer.current();
    let call = parse_begin_(ctx, true, false)?;
    match call.filter(|c| matches!(ctx.ast.get(*c).kind, AstKind::Call { .. })) {
        Some(call) => Ok(call),
        None => {
            ctx.lexer.revert_before(&curr);
            Err(Error::msg(
                ErrC::BadExpr,
                "\"defer\" requires a call expression.",
            ))
        }
    }
}

/// `@include "path";` queues a file for the driver worklist and
/// produces no AST node. Other directive names are reserved.
pub(crate) fn parse_directive_(ctx: &mut ParseContext) -> Result<Option<NodeId>> {
    ctx.lexer.expect_kind(TokenKind::At, true)?;

    let name_tok = ctx
        .lexer
        .expect_kind(TokenKind::Identifier, false)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected a directive name after \"@\"."))?;
    let name = ctx.lexer.token_text(&name_tok);
    ctx.lexer.consume(1);

    if name != "include" {
        return Err(Error::msg(
            ErrC::NotImplemented,
            format!("Unknown directive \"@{name}\"."),
        ));
    }

    let lit = ctx
        .lexer
        .expect_kind(TokenKind::StringLiteral, false)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected a quoted path after \"@include\"."))?;
    let text = ctx.lexer.token_text(&lit);
    let path = if text.starts_with('`') {
        unescape_raw_quoted(&text)?
    } else {
        unescape_quoted(&text)?
    };
    ctx.lexer.consume(1);

    ctx.lexer
        .expect_kind(TokenKind::Semicolon, true)
        .map_err(|_| Error::msg(ErrC::BadToken, "Expected \";\" after the include directive."))?;

    ctx.files.push_include(path);
    Ok(None)
}
