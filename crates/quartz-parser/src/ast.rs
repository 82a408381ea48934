//! The abstract syntax tree.
//!
//! Nodes live in a single arena ([`Ast`]) and address each other by
//! [`NodeId`]. Ownership edges (parent to child) are the `NodeId`s held
//! inside each [`AstKind`] variant; the parent back-edge is a plain
//! index set at insertion time, which sidesteps any two-way ownership.
//! References into the entity table are held as [`EntityId`]s, never as
//! pointers.

use quartz_common::files::InputFileId;
use quartz_common::token::{TokenCategory, TokenKind};

use crate::entity::{EntityId, EntityQualifier, EntityQualifierThunk};

/// Index of a node inside the [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// What a scalar literal stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    None,
    NullLit,
    IntLit,
    StringLit,
    U8Lit,
    FloatLit,
    BoolLit,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::NullLit => "NullLit",
            Self::IntLit => "IntLit",
            Self::StringLit => "StringLit",
            Self::U8Lit => "U8Lit",
            Self::FloatLit => "FloatLit",
            Self::BoolLit => "BoolLit",
        }
    }
}

/// Kind tag plus kind-specific children for one AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    /// `let x: T = init;` -- `name` is an EntityRef.
    Vardecl {
        name: NodeId,
        ty: Option<NodeId>,
        init: Option<NodeId>,
    },
    /// `proc foo(params) -> ret { body }`
    ProcDecl {
        entity: EntityId,
        params: Vec<NodeId>,
        ret: Option<NodeId>,
        body: Vec<NodeId>,
    },
    /// A reference resolved to an entity id at parse time.
    EntityRef { id: EntityId },
    /// An unresolved reference by name path, for the checker.
    EntityRefThunk { path: Vec<String> },
    /// A resolved qualified-type reference.
    TypeRef { qual: EntityQualifier },
    /// An unresolved qualified-type reference.
    TypeRefThunk { qual: EntityQualifierThunk },
    ScalarLiteral {
        value: String,
        scalar: ScalarKind,
    },
    AggregateLiteral { elems: Vec<NodeId> },
    BinExpr {
        op: TokenKind,
        op_cat: TokenCategory,
        lhs: NodeId,
        rhs: NodeId,
    },
    UnaryExpr {
        op: TokenKind,
        op_cat: TokenCategory,
        is_postfix: bool,
        operand: NodeId,
    },
    /// `if` plus optional `else`.
    Branch {
        if_: NodeId,
        else_: Option<NodeId>,
    },
    If { cond: NodeId, body: Vec<NodeId> },
    Else { body: Vec<NodeId> },
    /// `const if` / `const else`: same shape as Branch, tagged for the
    /// checker.
    ConstBranch {
        if_: NodeId,
        else_: Option<NodeId>,
    },
    Switch {
        target: NodeId,
        cases: Vec<NodeId>,
        default: Option<NodeId>,
    },
    Case {
        value: NodeId,
        body: Vec<NodeId>,
        is_fallthrough: bool,
    },
    Default { body: Vec<NodeId> },
    For {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        update: Option<NodeId>,
        body: Vec<NodeId>,
    },
    While {
        cond: NodeId,
        body: Vec<NodeId>,
        is_dowhile: bool,
    },
    Return { value: Option<NodeId> },
    Break,
    Continue,
    Defer { call: NodeId },
    DeferIf { cond: NodeId, call: NodeId },
    ScopeBlock { body: Vec<NodeId> },
    Namespace {
        entity: EntityId,
        body: Vec<NodeId>,
    },
    Call {
        target: NodeId,
        args: Vec<NodeId>,
    },
    Subscript { operand: NodeId, index: NodeId },
}

impl AstKind {
    /// Dump label for this node kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vardecl { .. } => "Vardecl",
            Self::ProcDecl { .. } => "ProcDecl",
            Self::EntityRef { .. } => "EntityRef",
            Self::EntityRefThunk { .. } => "EntityRefThunk",
            Self::TypeRef { .. } => "TypeRef",
            Self::TypeRefThunk { .. } => "TypeRefThunk",
            Self::ScalarLiteral { .. } => "ScalarLiteral",
            Self::AggregateLiteral { .. } => "AggregateLiteral",
            Self::BinExpr { .. } => "BinExpr",
            Self::UnaryExpr { .. } => "UnaryExpr",
            Self::Branch { .. } => "Branch",
            Self::If { .. } => "If",
            Self::Else { .. } => "Else",
            Self::ConstBranch { .. } => "ConstBranch",
            Self::Switch { .. } => "Switch",
            Self::Case { .. } => "Case",
            Self::Default { .. } => "Default",
            Self::For { .. } => "For",
            Self::While { .. } => "While",
            Self::Return { .. } => "Return",
            Self::Break => "Break",
            Self::Continue => "Continue",
            Self::Defer { .. } => "Defer",
            Self::DeferIf { .. } => "DeferIf",
            Self::ScopeBlock { .. } => "ScopeBlock",
            Self::Namespace { .. } => "Namespace",
            Self::Call { .. } => "Call",
            Self::Subscript { .. } => "Subscript",
        }
    }
}

/// One node: source coordinates, parent back-edge, kind payload.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub parent: Option<NodeId>,
    pub pos: u32,
    pub line: u32,
    pub file: InputFileId,
    pub kind: AstKind,
}

/// The node arena. Nodes are never removed; a parse error abandons the
/// partially built nodes in place (they are unreachable from the
/// top-level list).
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn push(&mut self, pos: u32, line: u32, file: InputFileId, kind: AstKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode {
            parent: None,
            pos,
            line,
            file,
            kind,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Set the parent back-edge of `child`.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        self.nodes[child.0 as usize].parent = Some(parent);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_parent_edges() {
        let mut ast = Ast::new();
        let lit = ast.push(
            0,
            1,
            InputFileId(1),
            AstKind::ScalarLiteral {
                value: "1".into(),
                scalar: ScalarKind::IntLit,
            },
        );
        let ret = ast.push(0, 1, InputFileId(1), AstKind::Return { value: Some(lit) });
        ast.set_parent(lit, ret);

        assert_eq!(ast.get(lit).parent, Some(ret));
        assert_eq!(ast.get(ret).parent, None);
        match &ast.get(ret).kind {
            AstKind::Return { value } => assert_eq!(*value, Some(lit)),
            other => panic!("expected Return, got {}", other.name()),
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(AstKind::Break.name(), "Break");
        assert_eq!(
            AstKind::EntityRefThunk { path: vec![] }.name(),
            "EntityRefThunk"
        );
    }
}
