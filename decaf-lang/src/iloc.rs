//! ILOC: the linear, register-based intermediate representation.
//!
//! A [`Program`] is an ordered list of [`Function`]s plus the static data layout.
//! Every function keeps its code as a flat instruction list and builds a
//! [`cfg::Cfg`] over it on request.
pub mod cfg;
pub mod instruction;
mod print;

pub use instruction::{Instruction, InstructionError, Opcode};
pub use print::RenderOptions;

use crate::symbol::{Symbol, SymbolTable};
use cfg::{Cfg, CfgError};

pub type VRegId = u32;
pub type LabelId = u32;

/// Operands are plain values: two operands are the same storage location or
/// target iff they compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    StackPtrReg,
    BasePtrReg,
    ReturnReg,
    VirtualReg(VRegId),
    JumpLabel(LabelId),
    CallLabel(String),
    IntConst(i32),
    StrConst(String),
    Invalid,
}

impl Operand {
    pub const SP: Operand = Operand::StackPtrReg;
    pub const BP: Operand = Operand::BasePtrReg;
    pub const RET: Operand = Operand::ReturnReg;

    pub fn int(v: i32) -> Self {
        Operand::IntConst(v)
    }
    pub fn string(s: &str) -> Self {
        Operand::StrConst(s.to_string())
    }
    pub fn call_label(name: &str) -> Self {
        Operand::CallLabel(name.to_string())
    }
    /// `sp`, `bp`, `ret` or a virtual register.
    pub fn is_register(&self) -> bool {
        matches!(
            self,
            Operand::StackPtrReg | Operand::BasePtrReg | Operand::ReturnReg | Operand::VirtualReg(_)
        )
    }
    pub fn is_literal(&self) -> bool {
        matches!(self, Operand::IntConst(_) | Operand::StrConst(_))
    }
    pub fn as_jump_label(&self) -> Option<LabelId> {
        match self {
            Operand::JumpLabel(id) => Some(*id),
            _ => None,
        }
    }
}

/// Hands out virtual register, jump label and basic block numbers for one
/// compilation unit. Numbers start at 1 and are never reused until [`IdAllocator::reset`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdAllocator {
    reg_count: VRegId,
    label_count: LabelId,
    block_count: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn new_virtual_reg(&mut self) -> Operand {
        self.reg_count += 1;
        Operand::VirtualReg(self.reg_count)
    }
    pub fn new_jump_label(&mut self) -> Operand {
        self.label_count += 1;
        Operand::JumpLabel(self.label_count)
    }
    pub fn new_block_id(&mut self) -> u32 {
        self.block_count += 1;
        self.block_count
    }
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub symbol: Symbol,
    pub local_size: i32,
    pub instructions: Vec<Instruction>,
    cfg: Option<Cfg>,
}

impl Function {
    pub fn new(symbol: Symbol, local_size: i32, instructions: Vec<Instruction>) -> Self {
        Self {
            symbol,
            local_size,
            instructions,
            cfg: None,
        }
    }
    pub fn name(&self) -> &str {
        &self.symbol.name
    }
    /// The control-flow graph, built from the current instruction list on first request.
    pub fn get_cfg(&mut self, ids: &mut IdAllocator) -> Result<&Cfg, CfgError> {
        self.get_cfg_mut(ids).map(|cfg| &*cfg)
    }
    pub fn get_cfg_mut(&mut self, ids: &mut IdAllocator) -> Result<&mut Cfg, CfgError> {
        let cfg = match self.cfg.take() {
            Some(cfg) => cfg,
            None => {
                let cfg = Cfg::build(&self.instructions, ids)?;
                log::debug!("built {} basic blocks for {}", cfg.len(), self.name());
                cfg
            }
        };
        Ok(self.cfg.insert(cfg))
    }
    pub fn cached_cfg(&self) -> Option<&Cfg> {
        self.cfg.as_ref()
    }
    /// Replaces the linear code with the flattened form of the (possibly edited) CFG.
    /// The cached graph is dropped since it no longer mirrors the new code.
    pub fn flatten(&mut self, ids: &mut IdAllocator) -> Result<(), CfgError> {
        let code = self.get_cfg(ids)?.flatten()?;
        self.instructions = code;
        self.cfg = None;
        Ok(())
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.local_size == other.local_size
            && self.instructions == other.instructions
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub static_symbols: SymbolTable,
    pub static_size: i32,
    pub functions: Vec<Function>,
    /// The allocator that numbered this program, so later passes keep drawing unique ids.
    pub ids: IdAllocator,
}

impl Program {
    /// Copies every global symbol into the static table. A name clash means the
    /// symbol table handed over was malformed; the clashing symbol is returned.
    pub fn new(globals: &SymbolTable, static_size: i32, ids: IdAllocator) -> Result<Self, Symbol> {
        let mut static_symbols = SymbolTable::new();
        for sym in globals.iter() {
            static_symbols.insert(sym.clone())?;
        }
        Ok(Self {
            static_symbols,
            static_size,
            functions: vec![],
            ids,
        })
    }
    pub fn add_function(&mut self, f: Function) {
        self.functions.push(f);
    }
    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }
    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }
    pub fn build_cfgs(&mut self) -> Result<(), CfgError> {
        let Program { functions, ids, .. } = self;
        for f in functions.iter_mut() {
            f.get_cfg(ids)?;
        }
        Ok(())
    }
    pub fn flatten_all(&mut self) -> Result<(), CfgError> {
        let Program { functions, ids, .. } = self;
        functions.iter_mut().try_for_each(|f| f.flatten(ids))
    }
}

/// A whole-program pass. Analyses and the interpreter plug in here.
pub trait Processor {
    type Output;
    fn process(&mut self, program: &Program) -> Self::Output;
}
