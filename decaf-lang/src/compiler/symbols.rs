//! Name resolution and storage allocation.
//!
//! Globals are laid out one after another in the static region. Parameters
//! are numbered in declaration order above the saved frame, and every local of
//! a function, however deeply nested, gets its own slot below the frame base.
use super::{Error, ErrorKind};
use crate::ast::*;
use crate::symbol::{MemLoc, Symbol, SymbolKind, SymbolTable, WORD_SIZE};
use crate::utils::environment::Environment;
use crate::utils::metadata::Span;

/// Procedures lowered straight to `print`. Each takes one argument.
pub const BUILTINS: [&str; 3] = ["print_int", "print_bool", "print_str"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn array_length(n: i64) -> Option<i32> {
    i32::try_from(n)
        .ok()
        .filter(|n| *n > 0 && *n <= i32::MAX / WORD_SIZE)
}

fn declare_static(globals: &mut SymbolTable, sym: Symbol, span: &Span, errs: &mut Vec<Error>) {
    if let Err(sym) = globals.insert(sym) {
        errs.push(Error(ErrorKind::DuplicateSymbol(sym.name), span.clone()));
    }
}

/// Fills in `Program::globals`, `Program::static_size` and the `symbol` and
/// `frame_size` fields throughout the tree.
pub fn allocate(prog: &mut Program) -> Result<(), Vec<Error>> {
    let Program {
        vars,
        funcs,
        globals,
        static_size,
    } = prog;
    let mut errs = vec![];
    *globals = SymbolTable::new();

    let mut offset = 0i32;
    for var in vars.iter_mut() {
        let sym = match var.array_len {
            None => Symbol::scalar(&var.name, var.ty),
            Some(n) => match array_length(n) {
                Some(n) => Symbol::array(&var.name, var.ty, n),
                None => {
                    errs.push(Error(ErrorKind::InvalidArrayLength(n), var.span.clone()));
                    continue;
                }
            },
        }
        .at(MemLoc::StaticVar, offset);
        offset = offset.saturating_add(sym.total_size());
        declare_static(globals, sym.clone(), &var.span, &mut errs);
        var.symbol = Some(sym);
    }
    *static_size = Some(offset);

    for f in funcs.iter_mut() {
        let sym = Symbol::function(&f.name, f.ret, f.params.iter().map(|p| p.ty).collect());
        if is_builtin(&f.name) {
            errs.push(Error(ErrorKind::DuplicateSymbol(f.name.clone()), f.span.clone()));
        } else {
            declare_static(globals, sym.clone(), &f.span, &mut errs);
        }
        f.symbol = Some(sym);
    }
    if !funcs.iter().any(|f| f.name == "main") {
        errs.push(Error(ErrorKind::MainNotFound, 0..0));
    }

    for f in funcs.iter_mut() {
        errs.extend(Resolver::new(globals).function(f));
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

struct Resolver<'a> {
    globals: &'a SymbolTable,
    env: Environment<Symbol>,
    frame_size: i32,
    loop_depth: usize,
    errs: Vec<Error>,
}

impl<'a> Resolver<'a> {
    fn new(globals: &'a SymbolTable) -> Self {
        let mut env = Environment::new();
        env.extend();
        for sym in globals
            .iter()
            .filter(|s| !matches!(s.kind, SymbolKind::Function(_)))
        {
            // names are unique in the table
            let _ = env.add_bind(&sym.name, sym.clone());
        }
        Self {
            globals,
            env,
            frame_size: 0,
            loop_depth: 0,
            errs: vec![],
        }
    }

    fn error(&mut self, kind: ErrorKind, span: &Span) {
        self.errs.push(Error(kind, span.clone()));
    }

    fn bind(&mut self, sym: Symbol, span: &Span) {
        let name = sym.name.clone();
        if self.env.add_bind(&name, sym).is_err() {
            self.error(ErrorKind::DuplicateSymbol(name), span);
        }
    }

    fn function(mut self, f: &mut FuncDecl) -> Vec<Error> {
        self.env.extend();
        for (i, p) in f.params.iter_mut().enumerate() {
            let sym = Symbol::scalar(&p.name, p.ty).at(MemLoc::StackParam, i as i32 * WORD_SIZE);
            self.bind(sym.clone(), &p.span);
            p.symbol = Some(sym);
        }
        self.block(&mut f.body);
        self.env.to_outer();
        f.frame_size = Some(self.frame_size);
        self.errs
    }

    fn block(&mut self, block: &mut Block) {
        self.env.extend();
        for v in block.vars.iter_mut() {
            if v.array_len.is_some() {
                self.error(ErrorKind::ArrayNotGlobal(v.name.clone()), &v.span);
                continue;
            }
            let sym = Symbol::scalar(&v.name, v.ty).at(MemLoc::StackLocal, self.frame_size);
            self.frame_size += sym.total_size();
            self.bind(sym.clone(), &v.span);
            v.symbol = Some(sym);
        }
        for s in block.stmts.iter_mut() {
            self.stmt(s);
        }
        self.env.to_outer();
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assign(loc, e) => {
                self.location(loc);
                self.expr(e);
            }
            Stmt::Call(call) => self.call(call),
            Stmt::If(cond, then, els) => {
                self.expr(cond);
                self.block(then);
                if let Some(els) = els {
                    self.block(els);
                }
            }
            Stmt::While(cond, body) => {
                self.expr(cond);
                self.loop_depth += 1;
                self.block(body);
                self.loop_depth -= 1;
            }
            Stmt::Return(Some(e), _) => self.expr(e),
            Stmt::Return(None, _) => {}
            Stmt::Break(span) | Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    self.error(ErrorKind::BreakOutsideLoop, span);
                }
            }
        }
    }

    fn location(&mut self, loc: &mut Location) {
        if let Some(idx) = loc.index.as_mut() {
            self.expr(idx);
        }
        let Some(sym) = self.env.lookup(&loc.name).cloned() else {
            self.error(ErrorKind::VariableNotFound(loc.name.clone()), &loc.span);
            return;
        };
        match (sym.is_array(), loc.index.is_some()) {
            (false, true) => self.error(ErrorKind::NotAnArray(loc.name.clone()), &loc.span),
            (true, false) => self.error(ErrorKind::MissingIndex(loc.name.clone()), &loc.span),
            _ => {}
        }
        loc.symbol = Some(sym);
    }

    fn call(&mut self, call: &mut FuncCall) {
        let takes_string = call.name == "print_str";
        for arg in call.args.iter_mut() {
            match arg.kind {
                ExprKind::Literal(Literal::Str(_)) if takes_string => {}
                _ => self.expr(arg),
            }
        }
        let expected = if is_builtin(&call.name) {
            1
        } else {
            match self.globals.get(&call.name) {
                Some(Symbol {
                    kind: SymbolKind::Function(params),
                    ..
                }) => params.len(),
                _ => {
                    self.error(ErrorKind::FunctionNotFound(call.name.clone()), &call.span);
                    return;
                }
            }
        };
        if expected != call.args.len() {
            self.error(
                ErrorKind::ArgumentCountMismatch {
                    name: call.name.clone(),
                    expected,
                    found: call.args.len(),
                },
                &call.span,
            );
        }
    }

    fn expr(&mut self, e: &mut Expr) {
        match &mut e.kind {
            ExprKind::Location(loc) => self.location(loc),
            ExprKind::Call(call) => {
                if is_builtin(&call.name) {
                    self.error(ErrorKind::ProcedureInExpression(call.name.clone()), &e.span);
                }
                self.call(call)
            }
            ExprKind::Literal(Literal::Str(_)) => self.error(ErrorKind::MisplacedString, &e.span),
            ExprKind::Literal(_) => {}
            ExprKind::Binary(_, lhs, rhs) => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Unary(_, e) => self.expr(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::compiler::parser::parse;
    use crate::{assign, binop, decl, func, int, loc, ret, var};

    fn allocated(src: &str) -> Program {
        let mut prog = parse(src).unwrap();
        allocate(&mut prog).unwrap();
        prog
    }

    fn errors(src: &str) -> Vec<ErrorKind> {
        let mut prog = parse(src).unwrap();
        allocate(&mut prog)
            .unwrap_err()
            .into_iter()
            .map(|Error(kind, _)| kind)
            .collect()
    }

    #[test]
    fn static_layout() {
        let prog = allocated("int x; int a[10]; bool b; def int main() { return x; }");
        assert_eq!(prog.static_size, Some(48));
        let offsets = prog
            .globals
            .iter()
            .map(|s| (s.name.as_str(), s.location, s.offset))
            .collect::<Vec<_>>();
        assert_eq!(
            offsets,
            vec![
                ("x", MemLoc::StaticVar, 0),
                ("a", MemLoc::StaticVar, 4),
                ("b", MemLoc::StaticVar, 44),
                ("main", MemLoc::StaticFunc, 0),
            ]
        );
        let Stmt::Return(Some(e), _) = &prog.funcs[0].body.stmts[0] else {
            panic!()
        };
        let ExprKind::Location(l) = &e.kind else { panic!() };
        assert_eq!(l.symbol.as_ref().map(|s| s.offset), Some(0));
    }

    #[test]
    fn frame_layout() {
        let prog = allocated(
            "def int f(int p, int q) { int a; bool b; if (p < q) { int c; c = a; } else { int d; d = b; } return q; }
             def int main() { return f(1, 2); }",
        );
        let f = &prog.funcs[0];
        let params = f
            .params
            .iter()
            .map(|p| p.symbol.as_ref().map(|s| (s.location, s.offset)))
            .collect::<Vec<_>>();
        assert_eq!(
            params,
            vec![Some((MemLoc::StackParam, 0)), Some((MemLoc::StackParam, 4))]
        );
        // a, b, c and d each get a slot of their own
        assert_eq!(f.frame_size, Some(16));
        let Stmt::If(_, then, Some(els)) = &f.body.stmts[0] else {
            panic!()
        };
        assert_eq!(then.vars[0].symbol.as_ref().map(|s| s.offset), Some(8));
        assert_eq!(els.vars[0].symbol.as_ref().map(|s| s.offset), Some(12));
        assert_eq!(prog.funcs[1].frame_size, Some(0));
    }

    #[test]
    fn shadowing() {
        let prog = allocated("int x; def int main(int x) { int y; y = x; return y; }");
        let Stmt::Assign(_, e) = &prog.funcs[0].body.stmts[0] else {
            panic!()
        };
        let ExprKind::Location(l) = &e.kind else { panic!() };
        assert_eq!(l.symbol.as_ref().map(|s| s.location), Some(MemLoc::StackParam));
    }

    #[test]
    fn built_tree() {
        let mut prog = Program {
            funcs: vec![func!(
                Type::Int,
                "main",
                [],
                [decl!(Int, "a")],
                [
                    assign!(loc!("a"), binop!(Add, int!(2), int!(3))),
                    ret!(var!("a"))
                ]
            )],
            ..Default::default()
        };
        allocate(&mut prog).unwrap();
        assert_eq!(prog.funcs[0].frame_size, Some(4));
        assert_eq!(prog.static_size, Some(0));
        let Stmt::Assign(l, _) = &prog.funcs[0].body.stmts[0] else {
            panic!()
        };
        assert_eq!(
            l.symbol,
            Some(Symbol::scalar("a", Type::Int).at(MemLoc::StackLocal, 0))
        );
    }

    #[test]
    fn name_errors() {
        assert_eq!(
            errors("def int main() { return y + g(); }"),
            vec![
                ErrorKind::VariableNotFound("y".to_string()),
                ErrorKind::FunctionNotFound("g".to_string())
            ]
        );
        assert_eq!(
            errors("int x; bool x; def int main() { int a; int a; return 0; }"),
            vec![
                ErrorKind::DuplicateSymbol("x".to_string()),
                ErrorKind::DuplicateSymbol("a".to_string())
            ]
        );
        assert_eq!(
            errors("def void f() { } def void f() { } def int main() { return 0; }"),
            vec![ErrorKind::DuplicateSymbol("f".to_string())]
        );
    }

    #[test]
    fn storage_errors() {
        assert_eq!(
            errors("int z[0]; def int main() { int a[3]; return 0; }"),
            vec![
                ErrorKind::InvalidArrayLength(0),
                ErrorKind::ArrayNotGlobal("a".to_string())
            ]
        );
        assert_eq!(
            errors("int a[2]; int s; def int main() { s[1] = a; return 0; }"),
            vec![
                ErrorKind::NotAnArray("s".to_string()),
                ErrorKind::MissingIndex("a".to_string())
            ]
        );
    }

    #[test]
    fn call_errors() {
        assert_eq!(
            errors("def int f(int a) { return a; } def int main() { print_int(1, 2); return f(); }"),
            vec![
                ErrorKind::ArgumentCountMismatch {
                    name: "print_int".to_string(),
                    expected: 1,
                    found: 2
                },
                ErrorKind::ArgumentCountMismatch {
                    name: "f".to_string(),
                    expected: 1,
                    found: 0
                },
            ]
        );
        assert_eq!(
            errors("def int main() { print_str(\"ok\"); return print_int(1) + \"s\"; }"),
            vec![
                ErrorKind::ProcedureInExpression("print_int".to_string()),
                ErrorKind::MisplacedString
            ]
        );
    }

    #[test]
    fn control_errors() {
        assert_eq!(errors("def int f() { return 0; }"), vec![ErrorKind::MainNotFound]);
        assert_eq!(
            errors("def int main() { while (true) { break; } continue; return 0; }"),
            vec![ErrorKind::BreakOutsideLoop]
        );
    }
}
