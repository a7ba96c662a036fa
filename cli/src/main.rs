use std::path::{Component, Path, PathBuf};
use std::sync::Once;

static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "hvm_core=debug,hvm_cli=info";

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use hvm_core::vm::{ByteCode, ClassTable, deserialize};
use tracing::debug;

mod asm;
mod render;

#[derive(Debug, Parser)]
#[command(
    name = "hvm",
    author,
    version,
    about = "Assemble, inspect and verify HVM bytecode blocks",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum DisFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Assemble a `.hasm` listing into a serialized block (`.hbc`).
    Asm {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        /// Output path (defaults to FILE with the `.hbc` extension)
        #[arg(short, long, value_name = "OUT", value_parser = parse_sanitized_path)]
        output: Option<PathBuf>,
    },
    /// Disassemble a serialized block and everything declared in it.
    Dis {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = DisFormat::Text)]
        format: DisFormat,
    },
    /// Print the operand-stack depth required by the top-level block.
    Depth {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);

    for comp in p.components() {
        if matches!(comp, Component::ParentDir) {
            return Err(anyhow::anyhow!(
                "Parent directory components ('..') are not allowed in file paths."
            ));
        }
    }

    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("1")
        || trimmed.eq_ignore_ascii_case("true")
        || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `HVM_TRACE=1` logs with the default filter; any other non-false value is
/// taken as an `EnvFilter` directive. Falls back to `RUST_LOG`.
fn maybe_init_tracing() {
    let raw = match std::env::var("HVM_TRACE") {
        Ok(value) => value,
        Err(_) => return,
    };

    if !env_toggle_enabled(&raw) {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = filter_expr_from(&raw).or_else(|| std::env::var("RUST_LOG").ok());

        let builder = fmt().with_writer(std::io::stderr);

        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };

        let _ = builder.try_init();
    });
}

fn load_block(path: &Path) -> anyhow::Result<(std::sync::Arc<ByteCode>, ClassTable)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file '{}'", path.display()))?;
    let mut classes = ClassTable::new();
    let bc = deserialize(&bytes, &mut classes)
        .with_context(|| format!("Failed to load bytecode from {}", path.display()))?;
    debug!(file = %path.display(), classes = classes.len(), "loaded block");
    Ok((bc, classes))
}

fn cmd_asm(file: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let src = std::fs::read_to_string(file).with_context(|| format!("Failed to read file '{}'", file.display()))?;
    let bc = asm::assemble(&src, &file.to_string_lossy())
        .with_context(|| format!("Failed to assemble {}", file.display()))?;
    let bytes = bc.serialize()?;

    let out_path = output.unwrap_or_else(|| file.with_extension("hbc"));
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory for {}", out_path.display()))?;
    }
    std::fs::write(&out_path, &bytes)
        .with_context(|| format!("Failed to write bytecode to {}", out_path.display()))?;
    eprintln!("Assembled {} to {} ({} bytes)", file.display(), out_path.display(), bytes.len());
    Ok(())
}

fn cmd_dis(file: &Path, format: DisFormat) -> anyhow::Result<()> {
    let (bc, _classes) = load_block(file)?;
    match format {
        DisFormat::Text => print!("{}", render::render_text(&bc)),
        DisFormat::Json => {
            let view = render::BlockView::new(&bc);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}

fn cmd_depth(file: &Path) -> anyhow::Result<()> {
    let (bc, _classes) = load_block(file)?;
    println!("{}", bc.stackdepth());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    maybe_init_tracing();

    let CliArgs { command } = CliArgs::parse();

    match command {
        Commands::Asm { file, output } => cmd_asm(&file, output),
        Commands::Dis { file, format } => cmd_dis(&file, format),
        Commands::Depth { file } => cmd_depth(&file),
    }
}
