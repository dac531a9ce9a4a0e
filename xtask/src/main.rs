use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mapper_core::{csv, store, MapperConfig};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

const DIST_DIR: &str = "dist";
const STATIC_DIR: &str = "extension/static";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Address mapper task runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the unpacked extension into dist/
    Build {
        /// Optimised wasm build
        #[arg(short, long)]
        release: bool,
    },

    /// Run all Rust tests
    Test,

    /// Run clippy linter
    Clippy,

    /// Remove dist/
    Clean,

    /// Parse a CSV file and show how it would be stored
    CheckCsv {
        /// CSV file with `address,name` lines
        file: String,

        /// Entries per storage chunk (defaults to the config value)
        #[arg(short, long)]
        chunk_size: Option<usize>,

        /// Config file to read defaults from
        #[arg(long, default_value = "extension/mapper.toml")]
        config: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { release } => build(release),
        Commands::Test => test(),
        Commands::Clippy => clippy(),
        Commands::Clean => clean(),
        Commands::CheckCsv {
            file,
            chunk_size,
            config,
        } => check_csv(&file, chunk_size, &config),
    }
}

fn build(release: bool) -> Result<()> {
    println!("🔨 Building extension wasm...");
    let profile = if release { "--release" } else { "--dev" };
    run_cmd(
        "wasm-pack",
        &[
            "build",
            "extension",
            profile,
            "--target",
            "web",
            "--out-dir",
            "../dist/pkg",
            "--out-name",
            "address_mapper",
        ],
    )?;

    println!("📦 Copying static files...");
    copy_dir(Path::new(STATIC_DIR), Path::new(DIST_DIR))?;
    println!("✅ Unpacked extension ready in {}/", DIST_DIR);
    Ok(())
}

fn test() -> Result<()> {
    println!("🧪 Running workspace tests...");
    run_cmd("cargo", &["test", "-p", "mapper-core"])?;
    Ok(())
}

fn clippy() -> Result<()> {
    println!("🔍 Running clippy on workspace (warnings as errors)...");
    run_cmd(
        "cargo",
        &[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ],
    )?;
    Ok(())
}

fn clean() -> Result<()> {
    println!("🧹 Removing {}/...", DIST_DIR);
    // Ignore error if it was never built
    let _ = fs::remove_dir_all(DIST_DIR);
    Ok(())
}

fn check_csv(file: &str, chunk_size: Option<usize>, config_path: &str) -> Result<()> {
    let config = if Path::new(config_path).exists() {
        MapperConfig::load(config_path)?
    } else {
        MapperConfig::default()
    };
    let chunk_size = chunk_size.unwrap_or(config.storage.chunk_size);
    if chunk_size == 0 {
        anyhow::bail!("chunk size must be at least 1");
    }

    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read CSV file: {}", file))?;
    let records = content.lines().filter(|l| !l.trim().is_empty()).count();
    let mapping = csv::parse(&content);
    let layout = store::plan_chunks(&mapping, chunk_size, 0);

    println!("📄 {}", file);
    println!("   non-empty lines:  {}", records);
    println!("   valid mappings:   {}", mapping.len());
    println!(
        "   chunks:           {} (size {})",
        layout.metadata.chunk_count, chunk_size
    );
    for (key, chunk) in &layout.chunks {
        let bytes = serde_json::to_string(chunk)?.len();
        println!("   {:<20} {:>5} entries {:>8} bytes", key, chunk.len(), bytes);
    }
    Ok(())
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;
    for entry in fs::read_dir(from).with_context(|| format!("Failed to read {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn run_cmd(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to run: {} {}", program, args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("Command failed: {} {}", program, args.join(" "));
    }

    Ok(())
}
