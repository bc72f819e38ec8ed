//! Syntax tree of a Decaf program.
//!
//! The parser leaves the `symbol`, `frame_size` and `static_size` fields empty;
//! [`crate::compiler::symbols`] fills them in before code generation.
pub mod builder;

use std::fmt;

use crate::symbol::{Symbol, SymbolTable};
use crate::utils::metadata::Span;
use crate::utils::miniprint::MiniPrint;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    Void,
    Str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A variable reference, optionally indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub name: String,
    pub index: Option<Box<Expr>>,
    pub span: Span,
    pub symbol: Option<Symbol>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Location(Location),
    Call(FuncCall),
    Literal(Literal),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Assign(Location, Expr),
    Call(FuncCall),
    If(Expr, Block, Option<Block>),
    While(Expr, Block),
    Return(Option<Expr>, Span),
    Break(Span),
    Continue(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Type,
    pub array_len: Option<i64>,
    pub span: Span,
    pub symbol: Option<Symbol>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub vars: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub ret: Type,
    pub params: Vec<VarDecl>,
    pub body: Block,
    pub span: Span,
    pub symbol: Option<Symbol>,
    /// Bytes of stack space for every local declared anywhere in the body.
    pub frame_size: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    pub vars: Vec<VarDecl>,
    pub funcs: Vec<FuncDecl>,
    pub globals: SymbolTable,
    pub static_size: Option<i32>,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Int => "int",
            Type::Bool => "bool",
            Type::Void => "void",
            Type::Str => "string",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

fn concat_vec<T: MiniPrint>(vec: &[T]) -> String {
    vec.iter()
        .map(|e| e.simple_print())
        .collect::<Vec<_>>()
        .join(" ")
}

impl MiniPrint for Literal {
    fn simple_print(&self) -> String {
        self.to_string()
    }
}

impl MiniPrint for Location {
    fn simple_print(&self) -> String {
        match &self.index {
            Some(idx) => format!("(index {} {})", self.name, idx.simple_print()),
            None => self.name.clone(),
        }
    }
}

impl MiniPrint for FuncCall {
    fn simple_print(&self) -> String {
        format!("(call {} ({}))", self.name, concat_vec(&self.args))
    }
}

impl MiniPrint for Expr {
    fn simple_print(&self) -> String {
        match &self.kind {
            ExprKind::Location(l) => l.simple_print(),
            ExprKind::Call(c) => c.simple_print(),
            ExprKind::Literal(l) => l.simple_print(),
            ExprKind::Binary(op, lhs, rhs) => {
                format!("({op} {} {})", lhs.simple_print(), rhs.simple_print())
            }
            ExprKind::Unary(op, e) => format!("({op} {})", e.simple_print()),
        }
    }
}

impl MiniPrint for VarDecl {
    fn simple_print(&self) -> String {
        match self.array_len {
            Some(n) => format!("(var {} {}[{}])", self.ty, self.name, n),
            None => format!("(var {} {})", self.ty, self.name),
        }
    }
}

impl MiniPrint for Block {
    fn simple_print(&self) -> String {
        let items = self
            .vars
            .iter()
            .map(|v| v.simple_print())
            .chain(self.stmts.iter().map(|s| s.simple_print()))
            .collect::<Vec<_>>();
        format!("(block {})", items.join(" "))
    }
}

impl MiniPrint for Stmt {
    fn simple_print(&self) -> String {
        match self {
            Stmt::Assign(loc, e) => format!("(assign {} {})", loc.simple_print(), e.simple_print()),
            Stmt::Call(c) => c.simple_print(),
            Stmt::If(c, t, Some(e)) => format!(
                "(if {} {} {})",
                c.simple_print(),
                t.simple_print(),
                e.simple_print()
            ),
            Stmt::If(c, t, None) => format!("(if {} {})", c.simple_print(), t.simple_print()),
            Stmt::While(c, b) => format!("(while {} {})", c.simple_print(), b.simple_print()),
            Stmt::Return(Some(e), _) => format!("(return {})", e.simple_print()),
            Stmt::Return(None, _) => "(return)".to_string(),
            Stmt::Break(_) => "(break)".to_string(),
            Stmt::Continue(_) => "(continue)".to_string(),
        }
    }
}

impl MiniPrint for FuncDecl {
    fn simple_print(&self) -> String {
        format!(
            "(def {} {} ({}) {})",
            self.ret,
            self.name,
            concat_vec(&self.params),
            self.body.simple_print()
        )
    }
}

impl MiniPrint for Program {
    fn simple_print(&self) -> String {
        let items = self
            .vars
            .iter()
            .map(|v| v.simple_print())
            .chain(self.funcs.iter().map(|f| f.simple_print()))
            .collect::<Vec<_>>();
        format!("(program {})", items.join(" "))
    }
}
