//! poly-convert - model conversion tool
//!
//! Converts PMX, FBX, glTF and MQO models to GLB or MQO (+ MQX sidecar).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poly_convert::{convert_file, describe, load_document, ConvertConfig};

#[derive(Parser)]
#[command(name = "poly-convert")]
#[command(about = "Character and mesh model converter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a model file
    Convert {
        /// Input model (.pmx, .fbx, .gltf, .glb, .mqo)
        input: PathBuf,

        /// Output file (.glb or .mqo)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Conversion settings (convert.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a summary of a model
    Info {
        /// Input model
        input: PathBuf,

        /// Conversion settings (convert.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the node tree of a binary FBX file
    DumpFbx {
        /// Input .fbx file
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ConvertConfig> {
    match path {
        Some(path) => ConvertConfig::load(path),
        None => Ok(ConvertConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            verbose,
        } => {
            init_logging(verbose);
            let config = load_config(config.as_ref())?;
            let output = output.unwrap_or_else(|| input.with_extension("glb"));
            convert_file(&input, &output, &config)?;
            tracing::info!("Done!");
        }

        Commands::Info { input, config } => {
            init_logging(false);
            let config = load_config(config.as_ref())?;
            let document = load_document(&input, &config)?;
            print!("{}", describe(&document));
        }

        Commands::DumpFbx { input } => {
            init_logging(false);
            let data =
                std::fs::read(&input).with_context(|| format!("Failed to read FBX: {:?}", input))?;
            let fbx = poly_fbx::parse_fbx(&data)
                .with_context(|| format!("Failed to parse FBX: {:?}", input))?;
            print!("{}", fbx.outline());
        }
    }

    Ok(())
}
