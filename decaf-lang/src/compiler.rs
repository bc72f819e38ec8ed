pub mod ilocgen;
pub mod parser;
pub mod symbols;

use std::path::{Path, PathBuf};

use crate::{
    ast, iloc,
    utils::{
        error::ReportableError,
        metadata::{Span, ANONYMOUS_SOURCE},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    VariableNotFound(String),
    FunctionNotFound(String),
    DuplicateSymbol(String),
    ArrayNotGlobal(String),
    InvalidArrayLength(i64),
    NotAnArray(String),
    MissingIndex(String),
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    ProcedureInExpression(String),
    MisplacedString,
    MainNotFound,
    BreakOutsideLoop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Error(pub ErrorKind, pub Span);

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::VariableNotFound(name) => write!(f, "Variable \"{name}\" not found."),
            ErrorKind::FunctionNotFound(name) => write!(f, "Function \"{name}\" not found."),
            ErrorKind::DuplicateSymbol(name) => {
                write!(f, "\"{name}\" is already declared in this scope.")
            }
            ErrorKind::ArrayNotGlobal(name) => {
                write!(f, "Array \"{name}\" must be declared at global scope.")
            }
            ErrorKind::InvalidArrayLength(n) => write!(f, "Invalid array length {n}."),
            ErrorKind::NotAnArray(name) => write!(f, "\"{name}\" is not an array."),
            ErrorKind::MissingIndex(name) => {
                write!(f, "Array \"{name}\" can only be accessed with an index.")
            }
            ErrorKind::ArgumentCountMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "\"{name}\" takes {expected} argument(s) but {found} were given."
            ),
            ErrorKind::ProcedureInExpression(name) => {
                write!(f, "\"{name}\" does not return a value.")
            }
            ErrorKind::MisplacedString => {
                write!(f, "String literals can only be passed to print_str.")
            }
            ErrorKind::MainNotFound => write!(f, "No main function was defined."),
            ErrorKind::BreakOutsideLoop => write!(f, "break or continue outside of a loop."),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for Error {}

impl ReportableError for Error {
    fn get_labels(&self) -> Vec<(Span, String)> {
        let label = match &self.0 {
            ErrorKind::VariableNotFound(_) | ErrorKind::FunctionNotFound(_) => {
                "not declared".to_string()
            }
            ErrorKind::DuplicateSymbol(_) => "declared again here".to_string(),
            ErrorKind::ArgumentCountMismatch { expected, .. } => {
                format!("expected {expected} argument(s)")
            }
            kind => kind.to_string(),
        };
        vec![(self.1.clone(), label)]
    }
}

fn into_reportable<E: ReportableError + 'static>(errs: Vec<E>) -> Vec<Box<dyn ReportableError>> {
    errs.into_iter()
        .map(|e| Box::new(e) as Box<dyn ReportableError>)
        .collect()
}

/// One compilation unit's frontend. Every stage reports its errors in bulk
/// and stops the pipeline.
pub struct Context {
    file_path: Option<PathBuf>,
}

impl Context {
    pub fn new(file_path: Option<PathBuf>) -> Self {
        Self { file_path }
    }
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
    fn source_name(&self) -> String {
        self.file_path
            .as_ref()
            .map_or_else(|| ANONYMOUS_SOURCE.to_string(), |p| p.display().to_string())
    }
    /// Parsed tree with every name resolved and every variable placed.
    pub fn emit_ast(&self, src: &str) -> Result<ast::Program, Vec<Box<dyn ReportableError>>> {
        let mut prog = parser::parse(src)?;
        log::debug!("parsed {}", self.source_name());
        symbols::allocate(&mut prog).map_err(into_reportable)?;
        log::debug!(
            "allocated {} globals ({} bytes of static data)",
            prog.globals.len(),
            prog.static_size.unwrap_or(0)
        );
        Ok(prog)
    }
    pub fn emit_iloc(&self, src: &str) -> Result<iloc::Program, Vec<Box<dyn ReportableError>>> {
        let ast = self.emit_ast(src)?;
        let prog = ilocgen::generate(&ast).map_err(|e| into_reportable(vec![e]))?;
        log::debug!("generated {} functions", prog.functions.len());
        Ok(prog)
    }
}
