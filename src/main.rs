//! EVM Tracer CLI Application
//!
//! Compiles contracts, runs them in an embedded EVM and writes
//! per-instruction execution traces.

use clap::{Parser, Subcommand};
use evm_tracer::cli::{self, CodeSource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evm-tracer")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Capture per-instruction EVM execution traces", long_about = None)]
struct Cli {
    /// Private key of the funded account (hex)
    #[arg(long, global = true)]
    private_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile, deploy and trace the configured contracts
    Run {
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory relative paths are resolved against
        #[arg(short, long, default_value = ".")]
        base_dir: PathBuf,
    },

    /// Trace a raw program
    TraceCode {
        /// Bytecode as hex
        #[arg(long, conflicts_with = "asm", required_unless_present = "asm")]
        code: Option<String>,

        /// Assembly source file
        #[arg(long)]
        asm: Option<PathBuf>,

        /// Call data as hex
        #[arg(long)]
        calldata: Option<String>,

        /// Run the code as init code of a creation transaction
        #[arg(long)]
        deploy: bool,

        /// Keep the partial trace if execution fails
        #[arg(long)]
        persist_partial: bool,

        /// Trace output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Assemble a mnemonic source file to bytecode
    Assemble {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Disassemble hex bytecode
    Disasm {
        /// Bytecode as hex
        #[arg(short, long)]
        code: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let private_key = cli.private_key.as_deref();

    match cli.command {
        Commands::Run { config, base_dir } => {
            cli::cmd_run(config.as_deref(), &base_dir, private_key)?;
        }

        Commands::TraceCode {
            code,
            asm,
            calldata,
            deploy,
            persist_partial,
            output,
        } => {
            let source = match (&code, &asm) {
                (Some(code), _) => CodeSource::Hex(code),
                (None, Some(path)) => CodeSource::Assembly(path),
                (None, None) => return Err("either --code or --asm is required".into()),
            };
            cli::cmd_trace_code(
                source,
                calldata.as_deref(),
                deploy,
                &output,
                private_key,
                persist_partial,
            )?;
        }

        Commands::Assemble { input } => {
            cli::cmd_assemble(&input)?;
        }

        Commands::Disasm { code } => {
            cli::cmd_disassemble(&code)?;
        }
    }

    Ok(())
}
