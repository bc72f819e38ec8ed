//! Lowering of an allocated syntax tree to ILOC.
//!
//! Every expression lands in a fresh virtual register. Frames are addressed off
//! `bp`: parameters sit above the saved `bp` and return address, locals below.
use super::symbols::is_builtin;
use super::{Error, ErrorKind};
use crate::ast::*;
use crate::iloc::{self, Function, IdAllocator, Instruction, Opcode, Operand};
use crate::symbol::{MemLoc, Symbol, WORD_SIZE};

struct LoopLabels {
    head: Operand,
    exit: Operand,
}

pub struct Generator {
    ids: IdAllocator,
    code: Vec<Instruction>,
    loops: Vec<LoopLabels>,
    epilogue: Operand,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

/// Stack address of a frame variable relative to `bp`.
fn frame_offset(sym: &Symbol) -> i32 {
    match sym.location {
        // saved bp and return address
        MemLoc::StackParam => sym.offset + 2 * WORD_SIZE,
        _ => -(sym.offset + sym.total_size()),
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Or => Opcode::Or,
        BinaryOp::And => Opcode::And,
        BinaryOp::Eq => Opcode::CmpEQ,
        BinaryOp::Ne => Opcode::CmpNE,
        BinaryOp::Lt => Opcode::CmpLT,
        BinaryOp::Le => Opcode::CmpLE,
        BinaryOp::Ge => Opcode::CmpGE,
        BinaryOp::Gt => Opcode::CmpGT,
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mult,
        // expanded by the caller
        BinaryOp::Div | BinaryOp::Mod => Opcode::Div,
    }
}

impl Generator {
    pub fn new() -> Self {
        Self {
            ids: IdAllocator::new(),
            code: vec![],
            loops: vec![],
            epilogue: Operand::Invalid,
        }
    }

    fn emit(&mut self, inst: Instruction) {
        self.code.push(inst);
    }
    fn emit_op<const N: usize>(&mut self, opcode: Opcode, operands: [Operand; N]) {
        self.emit(Instruction::new(opcode, operands));
    }
    /// Emits `opcode` with a fresh destination register appended and returns it.
    fn emit_to<const N: usize>(&mut self, opcode: Opcode, operands: [Operand; N]) -> Operand {
        let dst = self.ids.new_virtual_reg();
        self.emit(Instruction::new(
            opcode,
            operands.into_iter().chain(std::iter::once(dst.clone())),
        ));
        dst
    }

    pub fn generate(mut self, prog: &Program) -> Result<iloc::Program, Error> {
        let functions = prog
            .funcs
            .iter()
            .map(|f| self.function(f))
            .collect::<Result<Vec<_>, _>>()?;
        let static_size = prog
            .static_size
            .unwrap_or_else(|| prog.globals.total_size());
        let mut res = iloc::Program::new(&prog.globals, static_size, self.ids)
            .map_err(|sym| Error(ErrorKind::DuplicateSymbol(sym.name), 0..0))?;
        functions.into_iter().for_each(|f| res.add_function(f));
        Ok(res)
    }

    fn function(&mut self, f: &FuncDecl) -> Result<Function, Error> {
        let symbol = f
            .symbol
            .clone()
            .ok_or_else(|| Error(ErrorKind::FunctionNotFound(f.name.clone()), f.span.clone()))?;
        let frame_size = f.frame_size.unwrap_or(0);
        self.epilogue = self.ids.new_jump_label();

        self.emit(Instruction::new(Opcode::Push, [Operand::BP]).with_comment("Prologue"));
        self.emit_op(Opcode::I2I, [Operand::SP, Operand::BP]);
        self.emit(
            Instruction::new(
                Opcode::AddI,
                [Operand::SP, Operand::int(-frame_size), Operand::SP],
            )
            .with_comment(format!(
                "allocate space for local variables ({frame_size} bytes)"
            )),
        );
        self.block(&f.body)?;
        self.emit(Instruction::label(self.epilogue.clone()).with_comment("Epilogue"));
        self.emit_op(Opcode::I2I, [Operand::BP, Operand::SP]);
        self.emit_op(Opcode::Pop, [Operand::BP]);
        self.emit_op(Opcode::Return, []);

        let code = std::mem::take(&mut self.code);
        log::trace!("{}: {} instructions", f.name, code.len());
        Ok(Function::new(symbol, frame_size, code))
    }

    fn block(&mut self, block: &Block) -> Result<(), Error> {
        block.stmts.iter().try_for_each(|s| self.stmt(s))
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Assign(loc, e) => {
                let v = self.expr(e)?;
                self.store(loc, v)
            }
            Stmt::Call(call) => self.call(call, false).map(|_| ()),
            Stmt::If(cond, then, els) => {
                let c = self.expr(cond)?;
                let then_label = self.ids.new_jump_label();
                let else_label = self.ids.new_jump_label();
                let end_label = self.ids.new_jump_label();
                self.emit_op(Opcode::Cbr, [c, then_label.clone(), else_label.clone()]);
                self.emit(Instruction::label(then_label));
                self.block(then)?;
                self.emit(Instruction::jump(end_label.clone()));
                self.emit(Instruction::label(else_label));
                if let Some(els) = els {
                    self.block(els)?;
                }
                self.emit(Instruction::label(end_label));
                Ok(())
            }
            Stmt::While(cond, body) => {
                let head = self.ids.new_jump_label();
                let body_label = self.ids.new_jump_label();
                let exit = self.ids.new_jump_label();
                self.emit(Instruction::label(head.clone()));
                let c = self.expr(cond)?;
                self.emit_op(Opcode::Cbr, [c, body_label.clone(), exit.clone()]);
                self.emit(Instruction::label(body_label));
                self.loops.push(LoopLabels {
                    head: head.clone(),
                    exit: exit.clone(),
                });
                let res = self.block(body);
                self.loops.pop();
                res?;
                self.emit(Instruction::jump(head));
                self.emit(Instruction::label(exit));
                Ok(())
            }
            Stmt::Return(e, _) => {
                if let Some(e) = e {
                    let v = self.expr(e)?;
                    self.emit_op(Opcode::I2I, [v, Operand::RET]);
                }
                self.emit(Instruction::jump(self.epilogue.clone()));
                Ok(())
            }
            Stmt::Break(span) | Stmt::Continue(span) => {
                let labels = self
                    .loops
                    .last()
                    .ok_or_else(|| Error(ErrorKind::BreakOutsideLoop, span.clone()))?;
                let target = match stmt {
                    Stmt::Break(_) => labels.exit.clone(),
                    _ => labels.head.clone(),
                };
                self.emit(Instruction::jump(target));
                Ok(())
            }
        }
    }

    fn symbol_of<'l>(&self, loc: &'l Location) -> Result<&'l Symbol, Error> {
        loc.symbol
            .as_ref()
            .ok_or_else(|| Error(ErrorKind::VariableNotFound(loc.name.clone()), loc.span.clone()))
    }

    fn static_address(&mut self, sym: &Symbol) -> Operand {
        self.emit_to(Opcode::LoadI, [Operand::int(sym.offset)])
    }

    /// Base and byte offset of an array element.
    fn element_address(&mut self, sym: &Symbol, index: &Expr) -> Result<(Operand, Operand), Error> {
        let base = self.static_address(sym);
        let i = self.expr(index)?;
        let offset = self.emit_to(Opcode::MultI, [i, Operand::int(sym.element_size)]);
        Ok((base, offset))
    }

    fn load(&mut self, loc: &Location) -> Result<Operand, Error> {
        let sym = self.symbol_of(loc)?;
        let dst = match (sym.location, &loc.index) {
            (MemLoc::StaticVar, None) => {
                let addr = self.static_address(sym);
                let dst = self.ids.new_virtual_reg();
                self.emit(Instruction::new(Opcode::Load, [addr, dst.clone()]).with_var_name(&loc.name));
                dst
            }
            (MemLoc::StaticVar, Some(index)) => {
                let (base, offset) = self.element_address(sym, index)?;
                let dst = self.ids.new_virtual_reg();
                self.emit(
                    Instruction::new(Opcode::LoadAO, [base, offset, dst.clone()])
                        .with_var_name(&loc.name),
                );
                dst
            }
            (MemLoc::StackParam | MemLoc::StackLocal, None) => {
                let dst = self.ids.new_virtual_reg();
                self.emit(
                    Instruction::new(
                        Opcode::LoadAI,
                        [Operand::BP, Operand::int(frame_offset(sym)), dst.clone()],
                    )
                    .with_var_name(&loc.name),
                );
                dst
            }
            (MemLoc::StackParam | MemLoc::StackLocal, Some(_)) => {
                return Err(Error(ErrorKind::ArrayNotGlobal(loc.name.clone()), loc.span.clone()))
            }
            _ => {
                return Err(Error(
                    ErrorKind::VariableNotFound(loc.name.clone()),
                    loc.span.clone(),
                ))
            }
        };
        Ok(dst)
    }

    fn store(&mut self, loc: &Location, value: Operand) -> Result<(), Error> {
        let sym = self.symbol_of(loc)?;
        let inst = match (sym.location, &loc.index) {
            (MemLoc::StaticVar, None) => {
                let addr = self.static_address(sym);
                Instruction::new(Opcode::Store, [value, addr])
            }
            (MemLoc::StaticVar, Some(index)) => {
                let (base, offset) = self.element_address(sym, index)?;
                Instruction::new(Opcode::StoreAO, [value, base, offset])
            }
            (MemLoc::StackParam | MemLoc::StackLocal, None) => Instruction::new(
                Opcode::StoreAI,
                [value, Operand::BP, Operand::int(frame_offset(sym))],
            ),
            (MemLoc::StackParam | MemLoc::StackLocal, Some(_)) => {
                return Err(Error(ErrorKind::ArrayNotGlobal(loc.name.clone()), loc.span.clone()))
            }
            _ => {
                return Err(Error(
                    ErrorKind::VariableNotFound(loc.name.clone()),
                    loc.span.clone(),
                ))
            }
        };
        self.emit(inst.with_var_name(&loc.name));
        Ok(())
    }

    /// Arguments are pushed right to left so the first one ends up nearest to the frame.
    fn call(&mut self, call: &FuncCall, want_result: bool) -> Result<Option<Operand>, Error> {
        if is_builtin(&call.name) {
            if want_result {
                return Err(Error(
                    ErrorKind::ProcedureInExpression(call.name.clone()),
                    call.span.clone(),
                ));
            }
            self.print(call)?;
            return Ok(None);
        }
        let args = call
            .args
            .iter()
            .map(|a| self.expr(a))
            .collect::<Result<Vec<_>, _>>()?;
        for arg in args.iter().rev() {
            self.emit_op(Opcode::Push, [arg.clone()]);
        }
        self.emit_op(Opcode::Call, [Operand::call_label(&call.name)]);
        if !args.is_empty() {
            let size = WORD_SIZE * args.len() as i32;
            self.emit_op(Opcode::AddI, [Operand::SP, Operand::int(size), Operand::SP]);
        }
        Ok(want_result.then(|| self.emit_to(Opcode::I2I, [Operand::RET])))
    }

    fn print(&mut self, call: &FuncCall) -> Result<(), Error> {
        let [arg] = call.args.as_slice() else {
            return Err(Error(
                ErrorKind::ArgumentCountMismatch {
                    name: call.name.clone(),
                    expected: 1,
                    found: call.args.len(),
                },
                call.span.clone(),
            ));
        };
        match (call.name.as_str(), &arg.kind) {
            ("print_str", ExprKind::Literal(Literal::Str(s))) => {
                self.emit_op(Opcode::Print, [Operand::string(s)]);
            }
            ("print_int", ExprKind::Literal(Literal::Int(v))) => {
                self.emit_op(Opcode::Print, [Operand::int(*v as i32)]);
            }
            ("print_bool", _) => {
                let v = self.expr(arg)?;
                let t = self.ids.new_jump_label();
                let f = self.ids.new_jump_label();
                let end = self.ids.new_jump_label();
                self.emit_op(Opcode::Cbr, [v, t.clone(), f.clone()]);
                self.emit(Instruction::label(t));
                self.emit_op(Opcode::Print, [Operand::string("true")]);
                self.emit(Instruction::jump(end.clone()));
                self.emit(Instruction::label(f));
                self.emit_op(Opcode::Print, [Operand::string("false")]);
                self.emit(Instruction::label(end));
            }
            _ => {
                let v = self.expr(arg)?;
                self.emit_op(Opcode::Print, [v]);
            }
        }
        Ok(())
    }

    fn expr(&mut self, e: &Expr) -> Result<Operand, Error> {
        match &e.kind {
            ExprKind::Literal(Literal::Int(v)) => {
                Ok(self.emit_to(Opcode::LoadI, [Operand::int(*v as i32)]))
            }
            ExprKind::Literal(Literal::Bool(b)) => {
                Ok(self.emit_to(Opcode::LoadI, [Operand::int(i32::from(*b))]))
            }
            ExprKind::Literal(Literal::Str(_)) => {
                Err(Error(ErrorKind::MisplacedString, e.span.clone()))
            }
            ExprKind::Location(loc) => self.load(loc),
            ExprKind::Call(call) => self
                .call(call, true)?
                .ok_or_else(|| Error(ErrorKind::ProcedureInExpression(call.name.clone()), e.span.clone())),
            // a % b == a - (a / b) * b
            ExprKind::Binary(BinaryOp::Mod, lhs, rhs) => {
                let a = self.expr(lhs)?;
                let b = self.expr(rhs)?;
                let quotient = self.emit_to(Opcode::Div, [a.clone(), b.clone()]);
                let product = self.emit_to(Opcode::Mult, [quotient, b]);
                Ok(self.emit_to(Opcode::Sub, [a, product]))
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let a = self.expr(lhs)?;
                let b = self.expr(rhs)?;
                Ok(self.emit_to(binary_opcode(*op), [a, b]))
            }
            ExprKind::Unary(op, e) => {
                let v = self.expr(e)?;
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                };
                Ok(self.emit_to(opcode, [v]))
            }
        }
    }
}

/// Generates a fresh compilation unit; register and label numbers start at 1.
pub fn generate(prog: &Program) -> Result<iloc::Program, Error> {
    Generator::new().generate(prog)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::{parser::parse, symbols};
    use crate::iloc::RenderOptions;
    use itertools::Itertools;

    fn compile(src: &str) -> iloc::Program {
        let mut ast = parse(src).unwrap();
        symbols::allocate(&mut ast).unwrap();
        generate(&ast).unwrap()
    }

    const STATICS_AND_BUILTINS: &str = "int g;
         def void main() {
             g = 1;
             print_str(\"g=\");
             print_int(g);
             print_int(-1);
             print_bool(g == 1);
             loop();
         }
         def void loop() {
             while (true) { if (false) { continue; } break; }
         }";

    const FIB: &str = "def int f(int n) { if (n < 2) { return n; } return f(n - 1) + f(n - 2); }
         def int main() { return f(10); }";

    fn listing(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn locals_and_return() {
        let prog = compile("def int main() { int a; a = 2 + 3; return a; }");
        let ans = listing(&[
            "main:",
            "  push bp",
            "  i2i sp => bp",
            "  addI sp, -4 => sp",
            "  loadI 2 => r1",
            "  loadI 3 => r2",
            "  add r1, r2 => r3",
            "  storeAI r3 => [bp-4] {a}",
            "  loadAI [bp-4] => r4 {a}",
            "  i2i r4 => ret",
            "  jump l1",
            "l1:",
            "  i2i bp => sp",
            "  pop bp",
            "  return",
        ]);
        assert_eq!(prog.to_string(), ans);
    }

    #[test]
    fn prologue_comments() {
        let prog = compile("def int main() { int a; bool b; return 0; }");
        let text = prog.render(&RenderOptions::default());
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[1], format!("{:<40}// Prologue", "  push bp"));
        assert_eq!(
            lines[3],
            format!(
                "{:<40}// allocate space for local variables (8 bytes)",
                "  addI sp, -8 => sp"
            )
        );
        assert_eq!(prog.functions[0].local_size, 8);
    }

    #[test]
    fn control_flow() {
        let prog = compile(
            "def int main() {
                int i;
                i = 0;
                while (i < 3) { i = i + 1; }
                if (i == 3) { print_int(i); }
                return i;
            }",
        );
        let ans = listing(&[
            "main:",
            "  push bp",
            "  i2i sp => bp",
            "  addI sp, -4 => sp",
            "  loadI 0 => r1",
            "  storeAI r1 => [bp-4] {i}",
            "l2:",
            "  loadAI [bp-4] => r2 {i}",
            "  loadI 3 => r3",
            "  cmp_LT r2, r3 => r4",
            "  cbr r4 => l3, l4",
            "l3:",
            "  loadAI [bp-4] => r5 {i}",
            "  loadI 1 => r6",
            "  add r5, r6 => r7",
            "  storeAI r7 => [bp-4] {i}",
            "  jump l2",
            "l4:",
            "  loadAI [bp-4] => r8 {i}",
            "  loadI 3 => r9",
            "  cmp_EQ r8, r9 => r10",
            "  cbr r10 => l5, l6",
            "l5:",
            "  loadAI [bp-4] => r11 {i}",
            "  print r11",
            "  jump l7",
            "l6:",
            "l7:",
            "  loadAI [bp-4] => r12 {i}",
            "  i2i r12 => ret",
            "  jump l1",
            "l1:",
            "  i2i bp => sp",
            "  pop bp",
            "  return",
        ]);
        assert_eq!(prog.to_string(), ans);
    }

    #[test]
    fn calls_and_arrays() {
        let prog = compile(
            "int a[4];
             def int add(int x, int y) { return x + y; }
             def int main() { a[1] = add(2, 3); return a[1] % 2; }",
        );
        assert_eq!(prog.static_size, 16);
        assert_eq!(
            prog.static_symbols.get("a").map(|s| (s.location, s.offset)),
            Some((MemLoc::StaticVar, 0))
        );
        let ans = listing(&[
            "add:",
            "  push bp",
            "  i2i sp => bp",
            "  addI sp, 0 => sp",
            "  loadAI [bp+8] => r1 {x}",
            "  loadAI [bp+12] => r2 {y}",
            "  add r1, r2 => r3",
            "  i2i r3 => ret",
            "  jump l1",
            "l1:",
            "  i2i bp => sp",
            "  pop bp",
            "  return",
            "",
            "main:",
            "  push bp",
            "  i2i sp => bp",
            "  addI sp, 0 => sp",
            "  loadI 2 => r4",
            "  loadI 3 => r5",
            "  push r5",
            "  push r4",
            "  call add",
            "  addI sp, 8 => sp",
            "  i2i ret => r6",
            "  loadI 0 => r7",
            "  loadI 1 => r8",
            "  multI r8, 4 => r9",
            "  storeAO r6 => [r7+r9] {a}",
            "  loadI 0 => r10",
            "  loadI 1 => r11",
            "  multI r11, 4 => r12",
            "  loadAO [r10+r12] => r13 {a}",
            "  loadI 2 => r14",
            "  div r13, r14 => r15",
            "  mult r15, r14 => r16",
            "  sub r13, r16 => r17",
            "  i2i r17 => ret",
            "  jump l2",
            "l2:",
            "  i2i bp => sp",
            "  pop bp",
            "  return",
        ]);
        assert_eq!(prog.to_string(), ans);
    }

    #[test]
    fn statics_and_builtins() {
        let prog = compile(STATICS_AND_BUILTINS);
        let main = prog.get_function("main").unwrap().to_string();
        let body = main.lines().skip(4).take(16).collect::<Vec<_>>();
        assert_eq!(
            body,
            vec![
                "  loadI 1 => r1",
                "  loadI 0 => r2",
                "  store r1 => [r2] {g}",
                "  print \"g=\"",
                "  loadI 0 => r3",
                "  load [r3] => r4 {g}",
                "  print r4",
                "  loadI 1 => r5",
                "  neg r5 => r6",
                "  print r6",
                "  loadI 0 => r7",
                "  load [r7] => r8 {g}",
                "  loadI 1 => r9",
                "  cmp_EQ r8, r9 => r10",
                "  cbr r10 => l2, l3",
                "l2:",
            ]
        );
        assert!(main.contains("  print \"true\"\n  jump l4\nl3:\n  print \"false\"\nl4:\n  call loop\nl1:"));

        let body = prog.get_function("loop").unwrap().to_string();
        // loop: head l6, body l7, exit l8; if: l9, l10, l11
        assert!(body.contains("l9:\n  jump l6\n  jump l11\nl10:\nl11:\n  jump l8\n  jump l6\nl8:"));
    }

    #[test]
    fn fresh_numbering_per_compilation() {
        let first = compile(FIB);
        let second = compile(FIB);
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.ids, second.ids);
        let mut ids = first.ids.clone();
        let next = ids.new_virtual_reg();
        assert!(!first.to_string().contains(&format!(" {next}")));
    }

    #[test]
    fn every_jump_target_is_defined_once() {
        let nested = "def int main() {
                          int i; int s;
                          i = 0; s = 0;
                          while (i < 5) {
                              if (i == 2) { i = i + 1; continue; } else { s = s + i; }
                              if (s > 6) { break; }
                              i = i + 1;
                          }
                          return s;
                      }";
        for src in [STATICS_AND_BUILTINS, FIB, nested] {
            let prog = compile(src);
            for func in prog.functions.iter() {
                let defined = func
                    .instructions
                    .iter()
                    .filter_map(Instruction::defined_label)
                    .counts();
                assert!(
                    defined.values().all(|&n| n == 1),
                    "{}: {defined:?}",
                    func.name()
                );
                for target in func.instructions.iter().flat_map(Instruction::jump_targets) {
                    assert_eq!(defined.get(&target), Some(&1), "{}: l{target}", func.name());
                }
            }
        }
    }
}
