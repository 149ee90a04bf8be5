//! # barrister-gen
//!
//! Generate Rust bindings from a Barrister IDL JSON file.
//!
//! ## Usage
//! ```bash
//! barrister-gen service.json -o src/service.rs
//! barrister-gen service.json --module-doc "Bindings for the calculator service"
//! ```
//!
//! Without `-o` the bindings are written to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use barrister::Idl;
use barrister_codegen::{GenerateOptions, generate_rust};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(name = "barrister-gen", author, version, about, long_about = None)]
struct Args {
    /// IDL JSON produced by the Barrister IDL compiler
    idl: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Doc comment for the generated module
    #[arg(long)]
    module_doc: Option<String>,

    /// Path of the runtime crate in generated code
    #[arg(long, default_value = "barrister")]
    runtime_crate: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let bytes = std::fs::read(&args.idl)
        .with_context(|| format!("Failed to read IDL file {}", args.idl.display()))?;
    let idl = Idl::from_json(&bytes)
        .with_context(|| format!("Failed to load IDL from {}", args.idl.display()))?;

    let options = GenerateOptions {
        module_doc: args.module_doc,
        runtime_crate: args.runtime_crate,
    };
    let code = generate_rust(&idl, &options).context("Failed to generate bindings")?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} bytes of bindings to {}", code.len(), path.display());
        }
        None => print!("{}", code),
    }
    Ok(())
}
