use decaf_lang::utils::error::{dump_to_string, report};
use decaf_test::*;

fn run_simple_test(body: &str, expect: i32) {
    let src = format!(
        "def int test(int hoge) {{
    {body}
}}
def int main() {{
    return test(2);
}}"
    );
    match run_source_test(&src, Some("(from template)")) {
        Ok((ret, _)) => assert_eq!(ret, expect, "body: {body}"),
        Err(()) => panic!("failed to run: {body}"),
    }
}

fn run_file_ret(path: &str) -> i32 {
    run_file_test(path).unwrap().0
}

fn run_error(src: &str) -> String {
    match run_source_with_timeout(src, false) {
        Ok(res) => panic!("expected an error, got {res:?}"),
        Err(errs) => {
            report(src, None, &errs);
            dump_to_string(&errs)
        }
    }
}

#[test]
fn simple_arithmetic() {
    // unary
    run_simple_test("return 1;", 1);
    run_simple_test("return -1;", -1);
    run_simple_test("return - -1;", 1);
    run_simple_test("return -hoge;", -2);
    run_simple_test("return -(-hoge);", 2);

    // binary
    run_simple_test("return hoge + 1;", 3);
    run_simple_test("return hoge - 5;", -3);
    run_simple_test("return hoge * 3;", 6);
    run_simple_test("return 7 / hoge;", 3);
    run_simple_test("return -7 / hoge;", -3);
    run_simple_test("return 7 % hoge;", 1);

    // evaluation order and precedence
    run_simple_test("return hoge * 10 + hoge / 2 + 1;", 22);
    run_simple_test("return (hoge + 1) * (hoge - 3);", -3);
    run_simple_test("return 1 - 2 - 3;", -4);
}

#[test]
fn wrapping_arithmetic() {
    run_simple_test("return 2147483647 + hoge - 1;", -2147483648);
    run_simple_test("return 0x7fffffff * hoge;", -2);
}

#[test]
fn comparisons() {
    run_simple_test("if (hoge == 2 && hoge != 3) { return 1; } return 0;", 1);
    run_simple_test("if (hoge < 2 || hoge > 2) { return 1; } return 0;", 0);
    run_simple_test("if (hoge <= 2 && hoge >= 2) { return 1; } return 0;", 1);
    run_simple_test("if (!(hoge == 2)) { return 1; } return 0;", 0);
}

#[test]
fn control_flow() {
    run_simple_test("int r; if (true) { r = 2; } else { r = 3; } return r;", 2);
    run_simple_test("int r; if (false) { r = 2; } else { r = 3; } return r;", 3);
    run_simple_test("int a; a = 0; while (a < 10) { a = a + 1; } return a;", 10);
    run_simple_test("int a; a = hoge; while (a > 0) { a = a - 1; } return a;", 0);
}

#[test]
fn return_constant() {
    assert_eq!(run_file_ret("return.decaf"), 7);
}

#[test]
fn add() {
    assert_eq!(run_file_ret("add.decaf"), 5);
}

#[test]
fn locals() {
    assert_eq!(run_file_ret("locals.decaf"), 14);
}

#[test]
fn if_else() {
    assert_eq!(run_file_ret("if.decaf"), 2);
}

#[test]
fn while_loop() {
    assert_eq!(run_file_ret("while.decaf"), 10);
}

#[test]
fn call() {
    assert_eq!(run_file_ret("call.decaf"), 5);
}

#[test]
fn factorial() {
    let (ret, out) = run_file_test("factorial.decaf").unwrap();
    assert_eq!(ret, 120);
    assert_eq!(out, "fact(5) = 120\n");
}

#[test]
fn fibonacci() {
    assert_eq!(run_file_ret("fib.decaf"), 55);
}

#[test]
fn nested_calls() {
    assert_eq!(run_file_ret("nested_calls.decaf"), 25);
}

#[test]
fn static_arrays() {
    assert_eq!(run_file_ret("arrays.decaf"), 285);
}

#[test]
fn print_output() {
    let (ret, out) = run_file_test("print.decaf").unwrap();
    assert_eq!(ret, 42);
    assert_eq!(out, "1: true\n2: false\ntab\tquote\" done\n");
}

#[test]
fn break_continue() {
    assert_eq!(run_file_ret("break_continue.decaf"), 25);
}

#[test]
fn modulo() {
    assert_eq!(run_file_ret("mod.decaf"), -8);
}

#[test]
fn logic() {
    assert_eq!(run_file_ret("logic.decaf"), 1);
}

#[test]
fn division_by_zero() {
    let msg = run_error("def int main() { int z; z = 0; return 4 % z; }");
    assert!(msg.starts_with("Runtime Error: division by zero: div "), "{msg}");
}

#[test]
fn unbounded_recursion() {
    let (_, src) = load_src("overflow.decaf");
    let msg = run_error(&src);
    assert!(msg.starts_with("Runtime Error: stack overflow"), "{msg}");
}

#[test]
fn infinite_loop_times_out() {
    let msg = run_error("def int main() { while (true) { } return 0; }");
    assert!(msg.contains("did not finish"), "{msg}");
}

#[test]
fn timed_out_program_is_stopped() {
    let ctx = decaf_lang::ExecContext::new(None, Default::default());
    let prog = ctx
        .prepare_program("def void main() { while (true) { } }", false)
        .ok()
        .unwrap();
    let stop = ctx.config.stop.clone();
    assert!(run_program_with_timeout(prog, ctx.config.clone()).is_err());
    // the worker has been joined, so the flag it saw is the one raised here
    assert!(stop.is_stopped());
}

#[test]
fn compile_errors() {
    let msg = run_error("def int main() { return undefined_var; }");
    assert_eq!(msg, "Variable \"undefined_var\" not found.");
    let msg = run_error("def int f() { return 0; }");
    assert_eq!(msg, "No main function was defined.");
}

#[test]
fn deterministic_listing() {
    let (_, src) = load_src("fib.decaf");
    let ctx = decaf_lang::ExecContext::new(None, Default::default());
    let first = ctx.emit_iloc(&src).ok().unwrap();
    let second = ctx.emit_iloc(&src).ok().unwrap();
    assert_eq!(first.to_string(), second.to_string());
}
