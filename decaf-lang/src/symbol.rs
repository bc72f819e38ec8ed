//! Storage symbols shared by the symbol allocator, the ILOC generator and the
//! program aggregate.
use std::fmt;

use crate::ast::Type;

/// Size in bytes of a machine word (and of every scalar value).
pub const WORD_SIZE: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemLoc {
    Unknown,
    StaticVar,
    StaticFunc,
    StackParam,
    StackLocal,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Scalar,
    Array(i32),
    Function(Vec<Type>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub kind: SymbolKind,
    pub location: MemLoc,
    pub offset: i32,
    pub element_size: i32,
}

impl Symbol {
    pub fn scalar(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
            kind: SymbolKind::Scalar,
            location: MemLoc::Unknown,
            offset: 0,
            element_size: WORD_SIZE,
        }
    }
    pub fn array(name: &str, ty: Type, length: i32) -> Self {
        Self {
            kind: SymbolKind::Array(length),
            ..Self::scalar(name, ty)
        }
    }
    pub fn function(name: &str, ret: Type, params: Vec<Type>) -> Self {
        Self {
            name: name.to_string(),
            ty: ret,
            kind: SymbolKind::Function(params),
            location: MemLoc::StaticFunc,
            offset: 0,
            element_size: 0,
        }
    }
    pub fn at(mut self, location: MemLoc, offset: i32) -> Self {
        self.location = location;
        self.offset = offset;
        self
    }
    pub fn is_array(&self) -> bool {
        matches!(self.kind, SymbolKind::Array(_))
    }
    pub fn total_size(&self) -> i32 {
        match self.kind {
            SymbolKind::Scalar => self.element_size,
            SymbolKind::Array(n) => self.element_size * n,
            SymbolKind::Function(_) => 0,
        }
    }
}

impl fmt::Display for MemLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemLoc::Unknown => "unknown",
            MemLoc::StaticVar => "static",
            MemLoc::StaticFunc => "function",
            MemLoc::StackParam => "param",
            MemLoc::StackLocal => "local",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SymbolKind::Function(params) => write!(
                f,
                "{} {}({})",
                self.ty,
                self.name,
                crate::format_vec!(params, ", ")
            ),
            SymbolKind::Array(n) => write!(
                f,
                "{} {}[{}] @{}{:+}",
                self.ty, self.name, n, self.location, self.offset
            ),
            SymbolKind::Scalar => write!(
                f,
                "{} {} @{}{:+}",
                self.ty, self.name, self.location, self.offset
            ),
        }
    }
}

/// Insertion-ordered table of symbols, unique by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolTable(Vec<Symbol>);

impl SymbolTable {
    pub fn new() -> Self {
        Self(vec![])
    }
    /// Hands the symbol back when the name is taken.
    pub fn insert(&mut self, sym: Symbol) -> Result<(), Symbol> {
        if self.get(&sym.name).is_some() {
            return Err(sym);
        }
        self.0.push(sym);
        Ok(())
    }
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.0.iter().find(|s| s.name == name)
    }
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.0.iter()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Bytes taken by the variables in the table.
    pub fn total_size(&self) -> i32 {
        self.0.iter().map(Symbol::total_size).sum()
    }
}
