use crate::iloc::{InstructionError, LabelId};
use crate::utils::{error::ReportableError, metadata::Span};

pub mod vm;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    InvalidInstruction(InstructionError),
    UnresolvedCall(String),
    UnresolvedJump(LabelId),
    DuplicateFunction(String),
    DuplicateLabel(LabelId),
    MainNotFound,
    DivisionByZero,
    StackOverflow(i32),
    MemoryOutOfRange(i32),
    UndefinedRegister(u32),
    InstructionPointerOutOfRange(i32),
    UnsupportedOperand,
    Stopped,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidInstruction(e) => write!(f, "{e}"),
            ErrorKind::UnresolvedCall(name) => write!(f, "call to unknown function \"{name}\""),
            ErrorKind::UnresolvedJump(id) => write!(f, "jump to unknown label l{id}"),
            ErrorKind::DuplicateFunction(name) => {
                write!(f, "function \"{name}\" is defined more than once")
            }
            ErrorKind::DuplicateLabel(id) => write!(f, "label l{id} is defined more than once"),
            ErrorKind::MainNotFound => write!(f, "no \"main\" function to run"),
            ErrorKind::DivisionByZero => write!(f, "division by zero"),
            ErrorKind::StackOverflow(sp) => write!(f, "stack overflow (sp = {sp})"),
            ErrorKind::MemoryOutOfRange(addr) => write!(f, "memory access out of range at {addr}"),
            ErrorKind::UndefinedRegister(id) => write!(f, "read of undefined register r{id}"),
            ErrorKind::InstructionPointerOutOfRange(ip) => {
                write!(f, "instruction pointer {ip} ran off the code")
            }
            ErrorKind::UnsupportedOperand => write!(f, "operand cannot be used as a value"),
            ErrorKind::Stopped => write!(f, "execution was stopped"),
        }
    }
}

/// A fatal machine fault, with the rendering of the instruction that raised it
/// (empty when no instruction was executing).
#[derive(Debug, Clone, PartialEq)]
pub struct Error(pub ErrorKind, pub String);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Runtime Error: ")?;
        self.0.fmt(f)?;
        match &self.0 {
            ErrorKind::InvalidInstruction(_) => Ok(()),
            _ if self.1.is_empty() => Ok(()),
            _ => write!(f, ": {}", self.1.trim_start()),
        }
    }
}

impl std::error::Error for Error {}

impl ReportableError for Error {
    fn get_labels(&self) -> Vec<(Span, String)> {
        vec![]
    }
}
