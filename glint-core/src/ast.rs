use crate::types::Type;
use std::collections::HashMap;

/// Source position of a token or AST node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Unique identifier for AST nodes.
/// Used to look up checked types in the type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Counter for generating unique node IDs across compilation phases
#[derive(Debug, Clone, Default)]
pub struct NodeCounter {
    next_id: u32,
}

impl NodeCounter {
    pub fn new() -> Self {
        NodeCounter { next_id: 0 }
    }

    pub fn next(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        NodeId(id)
    }

    pub fn mk_node<T>(&mut self, span: Span, kind: T) -> Node<T> {
        Node {
            id: self.next(),
            span,
            kind,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Node<T> {
    pub id: NodeId,
    pub span: Span,
    pub kind: T,
}

impl<T: PartialEq> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

pub type Expr = Node<ExprKind>;
pub type Stmt = Node<StmtKind>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    Var(String),
    /// `global` namespace reference
    GlobalRef,
    /// `material` namespace reference
    MaterialRef,
    /// `vert` namespace reference (per-vertex inputs)
    VertRef,
    /// `frag` namespace reference (per-fragment built-ins)
    FragRef,
    Field {
        target: Box<Expr>,
        name: String,
    },
    /// Function call. The callee is always a bare name; there are no
    /// first-class function values in the language.
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `val name = init;` / `var name = init;`
    Decl {
        mutable: bool,
        name: String,
        init: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    Block(Vec<Stmt>),
    Discard,
    Return,
}

/// Node-id-indexed type table produced by the type checker.
///
/// The parsed tree itself is never mutated; the checker returns a rewritten
/// tree and records a type here for every node of that tree, exactly once.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: HashMap<NodeId, Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable {
            types: HashMap::new(),
        }
    }

    /// Record the type of a node. Panics on a double insert, which would
    /// mean a node was checked twice.
    pub fn set(&mut self, id: NodeId, ty: Type) {
        let prev = self.types.insert(id, ty);
        assert!(prev.is_none(), "node {:?} type-checked twice", id);
    }

    pub fn get(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ty;

    #[test]
    fn test_node_counter_unique_ids() {
        let mut counter = NodeCounter::new();
        let a = counter.mk_node(Span::new(1, 1), ExprKind::IntLiteral(1));
        let b = counter.mk_node(Span::new(1, 3), ExprKind::IntLiteral(2));
        assert_ne!(a.id, b.id);
    }

    #[test]
    #[should_panic(expected = "type-checked twice")]
    fn test_type_table_rejects_double_insert() {
        let mut table = TypeTable::new();
        table.set(NodeId(0), Type::value(Ty::Bool));
        table.set(NodeId(0), Type::value(Ty::Bool));
    }
}
