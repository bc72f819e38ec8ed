extern crate decaf_lang;
use std::{path::PathBuf, sync::mpsc, thread, time::Duration};

use decaf_lang::{
    iloc,
    runtime::vm::{self, ReturnCode},
    utils::{
        error::{report, ReportableError, SimpleError},
        fileloader,
    },
    ExecContext,
};

/// Wall-clock limit for one program run.
pub const TIMEOUT: Duration = Duration::from_secs(1);

/// Executes `prog` on a worker thread. A program still running after
/// [`TIMEOUT`] is stopped through the config's stop flag and reported as an
/// error once its thread has exited.
pub fn run_program_with_timeout(
    prog: iloc::Program,
    config: vm::Config,
) -> Result<(ReturnCode, String), Vec<Box<dyn ReportableError>>> {
    let stop = config.stop.clone();
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let mut machine = vm::Machine::new(config);
        let res = machine
            .execute(&prog)
            .map(|ret| (ret, machine.output().to_string()));
        let _ = tx.send(res);
    });
    match rx.recv_timeout(TIMEOUT) {
        Ok(res) => res.map_err(|e| vec![Box::new(e) as Box<dyn ReportableError>]),
        Err(_) => {
            stop.stop();
            let _ = worker.join();
            Err(vec![Box::new(SimpleError {
                message: format!("program did not finish within {TIMEOUT:?}"),
                span: 0..0,
            })])
        }
    }
}

pub fn run_source_with_timeout(
    src: &str,
    flatten: bool,
) -> Result<(ReturnCode, String), Vec<Box<dyn ReportableError>>> {
    let ctx = ExecContext::new(None, vm::Config::default());
    let prog = ctx.prepare_program(src, flatten)?;
    run_program_with_timeout(prog, ctx.config.clone())
}

/// Runs `src` once as generated and once rebuilt through its CFGs. Both runs
/// have to agree on the return value and the printed output.
pub fn run_source_test(src: &str, path: Option<&str>) -> Result<(ReturnCode, String), ()> {
    let run = |flatten| {
        run_source_with_timeout(src, flatten).map_err(|errs| report(src, path, &errs))
    };
    let res = run(false)?;
    let flattened = run(true)?;
    assert_eq!(res, flattened, "flattening changed the behaviour");
    Ok(res)
}

pub fn run_file_test(path: &str) -> Result<(ReturnCode, String), ()> {
    let (file, src) = load_src(path);
    let name = file.to_string_lossy();
    run_source_test(&src, Some(name.as_ref()))
}

pub fn load_src(path: &str) -> (PathBuf, String) {
    let file: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests/decaf", path]
        .iter()
        .collect();
    println!("{}", file.display());
    let src = fileloader::load(&file.to_string_lossy()).unwrap();
    (file, src)
}
