//! A compiler backend for the Decaf teaching language.
//!
//! Source text goes through [`compiler`] into the [`iloc`] intermediate
//! representation, which can be rebuilt through control-flow graphs and run on
//! the simulating machine in [`runtime::vm`].
pub mod ast;
pub mod compiler;
pub mod iloc;
pub mod runtime;
pub mod symbol;
pub mod utils;

use std::path::PathBuf;

use runtime::vm::{self, ReturnCode};
use utils::error::ReportableError;

pub use log;

pub struct ExecContext {
    pub compiler: compiler::Context,
    pub config: vm::Config,
}

fn boxed<E: ReportableError + 'static>(e: E) -> Vec<Box<dyn ReportableError>> {
    vec![Box::new(e)]
}

impl ExecContext {
    pub fn new(file_path: Option<PathBuf>, config: vm::Config) -> Self {
        Self {
            compiler: compiler::Context::new(file_path),
            config,
        }
    }
    pub fn get_compiler(&self) -> &compiler::Context {
        &self.compiler
    }
    pub fn emit_ast(&self, src: &str) -> Result<ast::Program, Vec<Box<dyn ReportableError>>> {
        self.compiler.emit_ast(src)
    }
    pub fn emit_iloc(&self, src: &str) -> Result<iloc::Program, Vec<Box<dyn ReportableError>>> {
        self.compiler.emit_iloc(src)
    }
    /// Compiles `src`, optionally rebuilding every function through its CFG.
    pub fn prepare_program(
        &self,
        src: &str,
        flatten: bool,
    ) -> Result<iloc::Program, Vec<Box<dyn ReportableError>>> {
        let mut prog = self.emit_iloc(src)?;
        if flatten {
            prog.flatten_all().map_err(boxed)?;
            log::debug!("flattened {} functions", prog.functions.len());
        }
        Ok(prog)
    }
    pub fn prepare_machine(&self) -> vm::Machine {
        vm::Machine::new(self.config.clone())
    }
    /// Compiles and runs `src`, returning `main`'s result and everything it printed.
    pub fn run(&self, src: &str) -> Result<(ReturnCode, String), Vec<Box<dyn ReportableError>>> {
        let prog = self.prepare_program(src, false)?;
        let mut machine = self.prepare_machine();
        let ret = machine.execute(&prog).map_err(boxed)?;
        Ok((ret, machine.output().to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn run_with_output() {
        let ctx = ExecContext::new(None, vm::Config::default());
        let (ret, out) = ctx
            .run("def int main() { print_str(\"hi \"); print_int(6 * 7); return 3; }")
            .unwrap();
        assert_eq!(ret, 3);
        assert_eq!(out, "hi 42");
    }

    #[test]
    fn flattened_program_behaves_the_same() {
        let src = "def int main() { int i; int s; i = 0; s = 0;
                   while (i < 10) { i = i + 1; if (i % 2 == 0) { continue; } s = s + i; }
                   return s; }";
        let ctx = ExecContext::new(None, vm::Config::default());
        let prog = ctx.prepare_program(src, true).unwrap();
        let mut machine = ctx.prepare_machine();
        assert_eq!(machine.execute(&prog).unwrap(), 25);
        assert_eq!(ctx.run(src).unwrap().0, 25);
    }

    #[test]
    fn errors_from_each_stage() {
        let ctx = ExecContext::new(None, vm::Config::default());
        let errs = ctx.run("def int main() { return ; ").unwrap_err();
        assert!(!errs.is_empty());
        let errs = ctx.run("def int main() { return x; }").unwrap_err();
        assert_eq!(errs[0].to_string(), "Variable \"x\" not found.");
        let errs = ctx.run("def int main() { return 1 / 0; }").unwrap_err();
        assert_eq!(
            errs[0].to_string(),
            "Runtime Error: division by zero: div r1, r2 => r3"
        );
    }
}
