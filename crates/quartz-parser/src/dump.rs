//! Human-readable dumps of the AST forest and the entity table, used
//! by the driver's `--dump-ast` and `--dump-entities` flags.

use std::io::Write;

use quartz_common::con::Styler;

use crate::ast::{Ast, AstKind, NodeId};
use crate::entity::{EntityId, EntityKind};
use crate::table::EntityTable;

fn indent(out: &mut dyn Write, depth: u32) -> std::io::Result<()> {
    for _ in 0..depth {
        write!(out, "  |")?;
    }
    if depth > 0 {
        write!(out, "_ ")?;
    }
    Ok(())
}

/// Serialize the whole AST forest.
pub fn dump_ast(
    ast: &Ast,
    roots: &[NodeId],
    out: &mut dyn Write,
    styler: Styler,
) -> std::io::Result<()> {
    for root in roots {
        dump_node(ast, *root, 0, out, styler)?;
    }
    Ok(())
}

fn header(
    ast: &Ast,
    id: NodeId,
    depth: u32,
    out: &mut dyn Write,
    styler: Styler,
) -> std::io::Result<()> {
    let node = ast.get(id);
    indent(out, depth)?;
    write!(
        out,
        "{}{}{}{} FileID={} <{}{}{},{}{}{}> :: ",
        styler.bold(),
        styler.magenta(),
        node.kind.name(),
        styler.reset(),
        node.file.0,
        styler.yellow(),
        node.line,
        styler.reset(),
        styler.yellow(),
        node.pos,
        styler.reset(),
    )
}

fn dump_node(
    ast: &Ast,
    id: NodeId,
    depth: u32,
    out: &mut dyn Write,
    styler: Styler,
) -> std::io::Result<()> {
    header(ast, id, depth, out, styler)?;
    let node = ast.get(id);

    // One line of kind-specific fields, then children at depth + 1.
    match &node.kind {
        AstKind::Vardecl { name, ty, init } => {
            writeln!(out, "has_type = {}", ty.is_some())?;
            dump_node(ast, *name, depth + 1, out, styler)?;
            if let Some(ty) = ty {
                dump_node(ast, *ty, depth + 1, out, styler)?;
            }
            if let Some(init) = init {
                dump_node(ast, *init, depth + 1, out, styler)?;
            }
        }
        AstKind::ProcDecl {
            entity,
            params,
            ret,
            body,
        } => {
            writeln!(out, "EntityID={}", entity.0)?;
            for param in params {
                dump_node(ast, *param, depth + 1, out, styler)?;
            }
            if let Some(ret) = ret {
                dump_node(ast, *ret, depth + 1, out, styler)?;
            }
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::EntityRef { id } => writeln!(out, "EntityID={}", id.0)?,
        AstKind::EntityRefThunk { path } => {
            writeln!(out, "{}{}{}", styler.green(), path.join("::"), styler.reset())?
        }
        AstKind::TypeRef { qual } => writeln!(out, "{qual}")?,
        AstKind::TypeRefThunk { qual } => writeln!(out, "{qual}")?,
        AstKind::ScalarLiteral { value, scalar } => writeln!(
            out,
            "{}\"{}\"{} {}",
            styler.green(),
            value,
            styler.reset(),
            scalar.as_str()
        )?,
        AstKind::AggregateLiteral { elems } => {
            writeln!(out)?;
            for elem in elems {
                dump_node(ast, *elem, depth + 1, out, styler)?;
            }
        }
        AstKind::BinExpr { op, lhs, rhs, .. } => {
            writeln!(out, "{}", op.string_repr())?;
            dump_node(ast, *lhs, depth + 1, out, styler)?;
            dump_node(ast, *rhs, depth + 1, out, styler)?;
        }
        AstKind::UnaryExpr {
            op,
            is_postfix,
            operand,
            ..
        } => {
            writeln!(out, "{} is_postfix = {}", op.string_repr(), is_postfix)?;
            dump_node(ast, *operand, depth + 1, out, styler)?;
        }
        AstKind::Branch { if_, else_ } | AstKind::ConstBranch { if_, else_ } => {
            writeln!(out, "has_else = {}", else_.is_some())?;
            dump_node(ast, *if_, depth + 1, out, styler)?;
            if let Some(else_) = else_ {
                dump_node(ast, *else_, depth + 1, out, styler)?;
            }
        }
        AstKind::If { cond, body } => {
            writeln!(out)?;
            dump_node(ast, *cond, depth + 1, out, styler)?;
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::Else { body } | AstKind::Default { body } | AstKind::ScopeBlock { body } => {
            writeln!(out)?;
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::Switch {
            target,
            cases,
            default,
        } => {
            writeln!(out, "has_default = {}", default.is_some())?;
            dump_node(ast, *target, depth + 1, out, styler)?;
            for case in cases {
                dump_node(ast, *case, depth + 1, out, styler)?;
            }
            if let Some(default) = default {
                dump_node(ast, *default, depth + 1, out, styler)?;
            }
        }
        AstKind::Case {
            value,
            body,
            is_fallthrough,
        } => {
            writeln!(out, "is_fallthrough = {is_fallthrough}")?;
            dump_node(ast, *value, depth + 1, out, styler)?;
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::For {
            init,
            cond,
            update,
            body,
        } => {
            writeln!(out)?;
            for child in init.iter().chain(cond.iter()).chain(update.iter()) {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::While {
            cond,
            body,
            is_dowhile,
        } => {
            writeln!(out, "is_dowhile = {is_dowhile}")?;
            dump_node(ast, *cond, depth + 1, out, styler)?;
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::Return { value } => {
            writeln!(out)?;
            if let Some(value) = value {
                dump_node(ast, *value, depth + 1, out, styler)?;
            }
        }
        AstKind::Break | AstKind::Continue => writeln!(out)?,
        AstKind::Defer { call } => {
            writeln!(out)?;
            dump_node(ast, *call, depth + 1, out, styler)?;
        }
        AstKind::DeferIf { cond, call } => {
            writeln!(out)?;
            dump_node(ast, *cond, depth + 1, out, styler)?;
            dump_node(ast, *call, depth + 1, out, styler)?;
        }
        AstKind::Namespace { entity, body } => {
            writeln!(out, "EntityID={}", entity.0)?;
            for child in body {
                dump_node(ast, *child, depth + 1, out, styler)?;
            }
        }
        AstKind::Call { target, args } => {
            writeln!(out)?;
            dump_node(ast, *target, depth + 1, out, styler)?;
            for arg in args {
                dump_node(ast, *arg, depth + 1, out, styler)?;
            }
        }
        AstKind::Subscript { operand, index } => {
            writeln!(out)?;
            dump_node(ast, *operand, depth + 1, out, styler)?;
            dump_node(ast, *index, depth + 1, out, styler)?;
        }
    }

    Ok(())
}

/// Serialize the entity tree from the root.
pub fn dump_entities(
    table: &EntityTable,
    out: &mut dyn Write,
    styler: Styler,
) -> std::io::Result<()> {
    dump_entity(table, crate::entity::ROOT_ENTITY_ID, 0, out, styler)
}

fn dump_entity(
    table: &EntityTable,
    id: EntityId,
    depth: u32,
    out: &mut dyn Write,
    styler: Styler,
) -> std::io::Result<()> {
    let ent = table.get(id);
    indent(out, depth)?;
    write!(
        out,
        "{}{}{}{} <{}{}{},{}{}{}> :: {}{}{} :: EntityID={} FileID={}",
        styler.bold(),
        styler.magenta(),
        ent.fqn,
        styler.reset(),
        styler.yellow(),
        ent.line,
        styler.reset(),
        styler.yellow(),
        ent.pos,
        styler.reset(),
        styler.green(),
        ent.kind.tag(),
        styler.reset(),
        ent.id.0,
        ent.file.0,
    )?;

    match &ent.kind {
        EntityKind::SymLink { link } => write!(out, " Link={}", link.0)?,
        EntityKind::AliasType { link, quals } => {
            write!(out, " Link={} PtrDepth={}", link.0, quals.ptr_depth)?
        }
        EntityKind::PlaceHolder { to_be } => write!(out, " ToBe={to_be}")?,
        EntityKind::Variable { quals, ty } => {
            write!(out, " TypeID={} PtrDepth={}", ty.0, quals.ptr_depth)?;
            if quals.is_constant() {
                write!(out, " Constant")?;
            }
            for len in &quals.arr_lengths {
                write!(out, " [{len}]")?;
            }
        }
        EntityKind::Proc {
            params,
            return_type,
        } => {
            write!(out, " ReturnTypeID={} Params=[", return_type.0)?;
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{}", param.0)?;
            }
            write!(out, "]")?;
        }
        _ => {}
    }
    writeln!(out)?;

    for child in ent.children.clone() {
        dump_entity(table, child, depth + 1, out, styler)?;
    }
    Ok(())
}

/// Print every struct entity with its member list.
pub fn dump_structures(
    table: &EntityTable,
    out: &mut dyn Write,
    styler: Styler,
) -> std::io::Result<()> {
    let mut structs: Vec<EntityId> = table
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Struct { .. }))
        .map(|e| e.id)
        .collect();
    structs.sort();
    for id in structs {
        let ent = table.get(id);
        let EntityKind::Struct { members } = &ent.kind else {
            continue;
        };

        writeln!(
            out,
            "-- {}{}{}{}",
            styler.bold(),
            styler.magenta(),
            ent.fqn,
            styler.reset()
        )?;
        for (i, member) in members.iter().enumerate() {
            write!(
                out,
                "{}. {}{}{}: ",
                i + 1,
                styler.green(),
                member.name,
                styler.reset()
            )?;
            if member.quals.is_constant() {
                write!(out, "{}Constant {}", styler.yellow(), styler.reset())?;
            }
            write!(out, "{}", member.ty_name)?;
            for _ in 0..member.quals.ptr_depth {
                write!(out, "*")?;
            }
            for len in &member.quals.arr_lengths {
                write!(out, "[{len}]")?;
            }
            writeln!(out)?;
        }
    }
    writeln!(out)?;
    Ok(())
}
