//! The ILOC machine: a register file, one flat byte memory and a downward
//! growing stack, stepping through a [`CodeImage`] one instruction at a time.
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use itertools::Itertools;

mod image;
mod memory;
pub use image::CodeImage;
pub use memory::Memory;

use super::{Error, ErrorKind};
use crate::iloc::{Instruction, Opcode, Operand, Processor, Program};
use crate::symbol::{MemLoc, Symbol, SymbolKind, WORD_SIZE};


pub const MEM_SIZE: usize = 65536;
pub type ReturnCode = i32;

/// A flag shared with other threads. Once raised, every machine holding a
/// clone of it stops before its next instruction.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl PartialEq for StopFlag {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// bytes of addressable memory; the stack starts at the top
    pub memory_size: usize,
    /// log every instruction together with the machine state at trace level
    pub trace: bool,
    /// write `print` output to stdout as well as to the output buffer
    pub echo_print: bool,
    pub stop: StopFlag,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_size: MEM_SIZE,
            trace: false,
            echo_print: false,
            stop: StopFlag::new(),
        }
    }
}

enum Flow {
    Next,
    Halt,
}

pub struct Machine {
    config: Config,
    memory: Memory,
    registers: BTreeMap<u32, i32>,
    ip: i32,
    sp: i32,
    bp: i32,
    ret: i32,
    /// static variables of the loaded program, for state dumps
    globals: Vec<Symbol>,
    output: String,
}

macro_rules! binop {
    ($f:ident, $ops:expr, $self:ident) => {{
        let v = $self
            .get_int(&$ops[0])?
            .$f($self.get_int(&$ops[1])?);
        $self.set_int(&$ops[2], v)?;
    }};
}
macro_rules! binop_bool {
    ($op:tt, $ops:expr, $self:ident) => {{
        let lhs = $self.get_bool(&$ops[0])?;
        let rhs = $self.get_bool(&$ops[1])?;
        $self.set_bool(&$ops[2], lhs $op rhs)?;
    }};
}
macro_rules! cmpop {
    ($op:tt, $ops:expr, $self:ident) => {{
        let lhs = $self.get_int(&$ops[0])?;
        let rhs = $self.get_int(&$ops[1])?;
        $self.set_bool(&$ops[2], lhs $op rhs)?;
    }};
}

impl Machine {
    pub fn new(config: Config) -> Self {
        let memory = Memory::new(config.memory_size.min(i32::MAX as usize));
        let mut machine = Self {
            config,
            memory,
            registers: BTreeMap::new(),
            ip: -1,
            sp: 0,
            bp: 0,
            ret: -1,
            globals: vec![],
            output: String::new(),
        };
        machine.reset(vec![]);
        machine
    }

    fn reset(&mut self, globals: Vec<Symbol>) {
        let top = self.memory.size() as i32;
        self.memory.clear();
        self.registers.clear();
        self.ip = -1;
        self.sp = top;
        self.bp = top;
        self.ret = -1;
        self.globals = globals;
        self.output.clear();
    }

    pub fn ret(&self) -> i32 {
        self.ret
    }
    pub fn sp(&self) -> i32 {
        self.sp
    }
    pub fn bp(&self) -> i32 {
        self.bp
    }
    pub fn get_register(&self, id: u32) -> Option<i32> {
        self.registers.get(&id).copied()
    }
    pub fn get_memory(&self) -> &Memory {
        &self.memory
    }
    /// Everything `print` wrote during the last run.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn get_int(&self, op: &Operand) -> Result<i32, ErrorKind> {
        match op {
            Operand::StackPtrReg => Ok(self.sp),
            Operand::BasePtrReg => Ok(self.bp),
            Operand::ReturnReg => Ok(self.ret),
            Operand::VirtualReg(id) => self
                .get_register(*id)
                .ok_or(ErrorKind::UndefinedRegister(*id)),
            Operand::IntConst(v) => Ok(*v),
            _ => Err(ErrorKind::UnsupportedOperand),
        }
    }
    pub fn set_int(&mut self, op: &Operand, v: i32) -> Result<(), ErrorKind> {
        match op {
            Operand::StackPtrReg => self.sp = v,
            Operand::BasePtrReg => self.bp = v,
            Operand::ReturnReg => self.ret = v,
            Operand::VirtualReg(id) => {
                self.registers.insert(*id, v);
            }
            _ => return Err(ErrorKind::UnsupportedOperand),
        }
        Ok(())
    }
    fn get_bool(&self, op: &Operand) -> Result<bool, ErrorKind> {
        self.get_int(op).map(|v| v != 0)
    }
    fn set_bool(&mut self, op: &Operand, b: bool) -> Result<(), ErrorKind> {
        self.set_int(op, b as i32)
    }

    fn push(&mut self, v: i32) -> Result<(), ErrorKind> {
        let below = self.sp.wrapping_sub(WORD_SIZE);
        self.sp = self
            .sp
            .checked_sub(WORD_SIZE)
            .filter(|sp| *sp >= 0)
            .ok_or(ErrorKind::StackOverflow(below))?;
        self.memory.store(self.sp, v)
    }
    fn pop(&mut self) -> Result<i32, ErrorKind> {
        let v = self.memory.load(self.sp)?;
        // sp is inside memory after a successful load
        self.sp += WORD_SIZE;
        Ok(v)
    }

    /// Address of the instruction after the target label.
    fn jump_target(&self, op: &Operand, image: &CodeImage) -> Result<i32, ErrorKind> {
        let label = op.as_jump_label().ok_or(ErrorKind::UnsupportedOperand)?;
        image
            .get_jump_target(label)
            .map(|i| i as i32 + 1)
            .ok_or(ErrorKind::UnresolvedJump(label))
    }

    fn print(&mut self, op: &Operand) -> Result<(), ErrorKind> {
        let text = match op {
            Operand::StrConst(s) => s.clone(),
            other => self.get_int(other)?.to_string(),
        };
        if self.config.echo_print {
            print!("{text}");
        }
        self.output.push_str(&text);
        Ok(())
    }

    fn step(&mut self, inst: &Instruction, image: &CodeImage) -> Result<Flow, ErrorKind> {
        let ops = &inst.operands;
        match inst.opcode {
            Opcode::Add | Opcode::AddI => binop!(wrapping_add, ops, self),
            Opcode::Sub => binop!(wrapping_sub, ops, self),
            Opcode::Mult | Opcode::MultI => binop!(wrapping_mul, ops, self),
            Opcode::Div => {
                let lhs = self.get_int(&ops[0])?;
                let rhs = self.get_int(&ops[1])?;
                if rhs == 0 {
                    return Err(ErrorKind::DivisionByZero);
                }
                self.set_int(&ops[2], lhs.wrapping_div(rhs))?;
            }
            Opcode::And => binop_bool!(&&, ops, self),
            Opcode::Or => binop_bool!(||, ops, self),
            Opcode::CmpLT => cmpop!(<, ops, self),
            Opcode::CmpLE => cmpop!(<=, ops, self),
            Opcode::CmpEQ => cmpop!(==, ops, self),
            Opcode::CmpGE => cmpop!(>=, ops, self),
            Opcode::CmpGT => cmpop!(>, ops, self),
            Opcode::CmpNE => cmpop!(!=, ops, self),
            Opcode::Not => {
                let b = self.get_bool(&ops[0])?;
                self.set_bool(&ops[1], !b)?;
            }
            Opcode::Neg => {
                let v = self.get_int(&ops[0])?;
                self.set_int(&ops[1], v.wrapping_neg())?;
            }
            Opcode::LoadI | Opcode::I2I => {
                let v = self.get_int(&ops[0])?;
                self.set_int(&ops[1], v)?;
            }
            Opcode::Load => {
                let addr = self.get_int(&ops[0])?;
                let v = self.memory.load(addr)?;
                self.set_int(&ops[1], v)?;
            }
            Opcode::LoadAI | Opcode::LoadAO => {
                let addr = self.get_int(&ops[0])?.wrapping_add(self.get_int(&ops[1])?);
                let v = self.memory.load(addr)?;
                self.set_int(&ops[2], v)?;
            }
            Opcode::Store => {
                let v = self.get_int(&ops[0])?;
                let addr = self.get_int(&ops[1])?;
                self.memory.store(addr, v)?;
            }
            Opcode::StoreAI | Opcode::StoreAO => {
                let v = self.get_int(&ops[0])?;
                let addr = self.get_int(&ops[1])?.wrapping_add(self.get_int(&ops[2])?);
                self.memory.store(addr, v)?;
            }
            Opcode::Jump => self.ip = self.jump_target(&ops[0], image)?,
            Opcode::Cbr => {
                let target = if self.get_bool(&ops[0])? { &ops[1] } else { &ops[2] };
                self.ip = self.jump_target(target, image)?;
            }
            Opcode::Call => {
                let Operand::CallLabel(name) = &ops[0] else {
                    return Err(ErrorKind::UnsupportedOperand);
                };
                let entry = image
                    .get_call_target(name)
                    .ok_or_else(|| ErrorKind::UnresolvedCall(name.clone()))?;
                self.push(self.ip)?;
                self.ip = entry as i32 + 1;
            }
            Opcode::Return => {
                self.ip = self.pop()?;
                if self.ip == -1 {
                    return Ok(Flow::Halt);
                }
            }
            Opcode::Push => {
                let v = self.get_int(&ops[0])?;
                self.push(v)?;
            }
            Opcode::Pop => {
                let v = self.pop()?;
                self.set_int(&ops[0], v)?;
            }
            Opcode::Print => self.print(&ops[0])?,
            Opcode::Label | Opcode::Nop => {}
            Opcode::Phi => log::warn!("Unhandled instruction: {inst}"),
        }
        Ok(Flow::Next)
    }

    /// Runs `main` to completion and returns the value left in `ret`.
    /// Registers and memory start out fresh on every call.
    pub fn execute(&mut self, program: &Program) -> Result<ReturnCode, Error> {
        let fault = |kind| Error(kind, String::new());
        let image = CodeImage::load(program).map_err(fault)?;
        self.reset(
            program
                .static_symbols
                .iter()
                .filter(|sym| sym.location == MemLoc::StaticVar)
                .cloned()
                .collect(),
        );
        log::debug!("loaded {} instructions", image.code.len());
        if self.config.trace {
            log::trace!("all code:\n{image}");
        }
        let main = image
            .get_call_target("main")
            .ok_or(fault(ErrorKind::MainNotFound))?;
        self.push(self.ip).map_err(fault)?;
        self.ip = main as i32 + 1;

        loop {
            if self.config.stop.is_stopped() {
                log::debug!("stopped at ip={}", self.ip);
                return Err(fault(ErrorKind::Stopped));
            }
            let inst = image
                .fetch(self.ip)
                .ok_or(fault(ErrorKind::InstructionPointerOutOfRange(self.ip)))?;
            if self.config.trace {
                log::trace!("{}\nexecuting: {}", self.dump_state(), inst.to_string().trim_start());
            }
            self.ip += 1;
            let flow = inst
                .validate()
                .map_err(ErrorKind::InvalidInstruction)
                .and_then(|_| self.step(inst, &image))
                .map_err(|kind| Error(kind, inst.to_string()))?;
            if let Flow::Halt = flow {
                break;
            }
        }
        if self.config.trace {
            log::trace!("{}", self.dump_state());
        }
        log::debug!("main returned {}", self.ret);
        Ok(self.ret)
    }

    /// Registers, the live part of the stack and every static variable by name.
    pub fn dump_state(&self) -> String {
        let top = self.memory.size() as i32;
        let word = |addr: i32| {
            self.memory
                .load(addr)
                .map_or_else(|_| "?".to_string(), |v| v.to_string())
        };
        let registers = self
            .registers
            .iter()
            .map(|(id, v)| format!("r{id}={v}"))
            .join(" ");
        let stack = (self.sp.max(0)..top)
            .step_by(WORD_SIZE as usize)
            .map(|addr| format!("[{addr}]={}", word(addr)))
            .join(" ");
        let globals = self.globals.iter().map(|sym| {
            let value = match sym.kind {
                SymbolKind::Array(len) => {
                    let elements = (0..len)
                        .map(|i| word(sym.offset.wrapping_add(i.wrapping_mul(sym.element_size))))
                        .join(",");
                    format!("[{elements}]")
                }
                _ => word(sym.offset),
            };
            format!("global {} = {value}", sym.name)
        });
        std::iter::once(format!(
            "ip={} sp={} bp={} ret={}\nregisters: {registers}\nstack: {stack}",
            self.ip, self.sp, self.bp, self.ret
        ))
        .chain(globals)
        .join("\n")
    }
}

impl Processor for Machine {
    type Output = Result<ReturnCode, Error>;
    fn process(&mut self, program: &Program) -> Self::Output {
        self.execute(program)
    }
}
