use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use tiger_mips::{codegen::reg_alloc::AllocatorKind, ir, report, Compiler, Options};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
    #[arg(short, long, value_name = "FILE")]
    src: PathBuf,
    /// naive, intra-block or global
    #[arg(short, long, default_value_t = AllocatorKind::Naive)]
    allocator: AllocatorKind,
    /// Defaults to stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Write the block graph of every function as DOT
    #[arg(long, value_name = "FILE")]
    cfg: Option<PathBuf>,
    /// Write per-instruction liveness sets
    #[arg(long, value_name = "FILE")]
    liveness: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let filepath = args.src;
    let source = fs::read_to_string(&filepath)
        .with_context(|| format!("failed to open file {}", filepath.display()))?;

    let filename = filepath
        .file_name()
        .with_context(|| format!("failed to get filename from path {}", filepath.display()))?;
    let filename = filename
        .to_str()
        .with_context(|| format!("failed to convert filename {:?} to str", filename))?
        .to_string();

    if args.cfg.is_some() || args.liveness.is_some() {
        let program = ir::parse(filename.as_str(), source.as_bytes())
            .with_context(|| format!("failed to parse {}", filename))?;

        if let Some(path) = &args.cfg {
            let dot = report::program_control_flow(&program)?;
            fs::write(path, dot)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        if let Some(path) = &args.liveness {
            let table = report::program_liveness(&program)?;
            fs::write(path, table)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    let options = Options::new().allocator(args.allocator);
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create file {}", path.display()))?;
            Compiler::new(&filename, source.as_bytes(), BufWriter::new(file))
                .with_options(options)
                .compile()
        }
        None => Compiler::new(&filename, source.as_bytes(), io::stdout())
            .with_options(options)
            .compile(),
    }
    .with_context(|| format!("failed to compile {}", filename))
}
