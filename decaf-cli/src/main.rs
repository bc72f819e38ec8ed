use std::path::Path;

use clap::Parser;
use decaf_lang::iloc::RenderOptions;
use decaf_lang::log;
use decaf_lang::runtime::vm;
use decaf_lang::utils::error::ReportableError;
use decaf_lang::utils::miniprint::MiniPrint;
use decaf_lang::utils::{error::report, fileloader};
use decaf_lang::ExecContext;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub mode: Mode,

    /// File name
    #[clap(value_parser)]
    pub file: String,

    /// Rebuild every function through its control-flow graph before emitting or running
    #[arg(long, default_value_t = false)]
    pub flatten: bool,

    /// Leave comments out of ILOC listings
    #[arg(long, default_value_t = false)]
    pub no_comments: bool,

    /// Log every executed instruction with the machine state
    #[arg(long, default_value_t = false)]
    pub trace: bool,
}

#[derive(clap::Args, Debug)]
#[group(required = false, multiple = false)]
pub struct Mode {
    /// Print AST and exit
    #[arg(long, default_value_t = false)]
    pub emit_ast: bool,

    /// Print the ILOC listing and exit
    #[arg(long, default_value_t = false)]
    pub emit_iloc: bool,

    /// Print the basic blocks of every function and exit
    #[arg(long, default_value_t = false)]
    pub emit_cfg: bool,
}

enum RunMode {
    EmitAst,
    EmitIloc,
    EmitCfg,
    Run,
}

struct RunOptions {
    mode: RunMode,
    flatten: bool,
    render: RenderOptions,
}

impl RunOptions {
    fn from_args(args: &Args) -> Self {
        let mode = if args.mode.emit_ast {
            RunMode::EmitAst
        } else if args.mode.emit_iloc {
            RunMode::EmitIloc
        } else if args.mode.emit_cfg {
            RunMode::EmitCfg
        } else {
            RunMode::Run
        };
        Self {
            mode,
            flatten: args.flatten,
            render: RenderOptions {
                show_comments: !args.no_comments,
            },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut logger = colog::default_builder();
    if args.trace {
        logger.filter_level(log::LevelFilter::Trace);
    } else if cfg!(debug_assertions) {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let fullpath = fileloader::get_canonical_path(".", &args.file)?;
    let path = fullpath.to_string_lossy().to_string();
    let content = fileloader::load(&path)?;
    let config = vm::Config {
        trace: args.trace,
        ..Default::default()
    };
    let options = RunOptions::from_args(&args);
    match run_file(options, config, &content, &fullpath) {
        Ok(code) => {
            if let Some(code) = code {
                println!("RETURN VALUE = {code}");
            }
            Ok(())
        }
        Err(e) => {
            report(&content, Some(path.as_str()), &e);
            Err(format!("Failed to process {}", args.file).into())
        }
    }
}

/// Returns `main`'s result when the program was run.
fn run_file(
    options: RunOptions,
    config: vm::Config,
    content: &str,
    fullpath: &Path,
) -> Result<Option<vm::ReturnCode>, Vec<Box<dyn ReportableError>>> {
    log::debug!("Filename: {}", fullpath.display());
    let ctx = ExecContext::new(Some(fullpath.to_path_buf()), config);

    match options.mode {
        RunMode::EmitAst => {
            let ast = ctx.emit_ast(content)?;
            println!("{}", ast.pretty_print());
            Ok(None)
        }
        RunMode::EmitIloc => {
            let prog = ctx.prepare_program(content, options.flatten)?;
            println!("{}", prog.render(&options.render));
            Ok(None)
        }
        RunMode::EmitCfg => {
            let mut prog = ctx.prepare_program(content, options.flatten)?;
            let decaf_lang::iloc::Program { functions, ids, .. } = &mut prog;
            for func in functions.iter_mut() {
                let name = func.name().to_string();
                let cfg = func
                    .get_cfg(ids)
                    .map_err(|e| vec![Box::new(e) as Box<dyn ReportableError>])?;
                println!("{name}:\n{cfg}");
            }
            Ok(None)
        }
        RunMode::Run => {
            let prog = ctx.prepare_program(content, options.flatten)?;
            let mut machine = ctx.prepare_machine();
            let code = machine
                .execute(&prog)
                .map_err(|e| vec![Box::new(e) as Box<dyn ReportableError>])?;
            print!("{}", machine.output());
            if !machine.output().is_empty() && !machine.output().ends_with('\n') {
                println!();
            }
            Ok(Some(code))
        }
    }
}
