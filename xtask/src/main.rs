//! sind xtask - Build automation tasks
//!
//! ## Usage
//!
//! ```bash
//! # Build the sind binary
//! cargo xtask build
//!
//! # Run all tests
//! cargo xtask test
//!
//! # Run lints
//! cargo xtask lint
//!
//! # Format code
//! cargo xtask fmt
//!
//! # Create, inspect and delete a throwaway cluster on the local daemon
//! cargo xtask smoke --managers 3 --workers 2
//!
//! # Install locally
//! cargo xtask install
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xshell::{cmd, Shell};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for sind")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the sind binary
    Build {
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run all tests
    Test {
        /// Run tests in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run lints (clippy and rustfmt check)
    Lint,
    /// Format code
    Fmt {
        /// Check formatting without making changes
        #[arg(long)]
        check: bool,
    },
    /// Clean build artifacts
    Clean,
    /// Install sind locally
    Install,
    /// Generate documentation
    Doc {
        /// Open documentation in browser
        #[arg(long)]
        open: bool,
    },
    /// Create a cluster on the local docker daemon, list it, then delete it
    Smoke {
        /// Amount of managers
        #[arg(long, default_value = "1")]
        managers: u32,
        /// Amount of workers
        #[arg(long, default_value = "1")]
        workers: u32,
        /// Command timeout in seconds
        #[arg(long, default_value = "120")]
        timeout: u64,
    },
    /// Run CI checks (format, lint, test, build)
    Ci,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    // Change to project root
    let project_root = project_root()?;
    sh.change_dir(&project_root);

    match cli.command {
        Commands::Build { release } => build(&sh, release)?,
        Commands::Test { release } => test(&sh, release)?,
        Commands::Lint => lint(&sh)?,
        Commands::Fmt { check } => fmt(&sh, check)?,
        Commands::Clean => clean(&sh)?,
        Commands::Install => install(&sh)?,
        Commands::Doc { open } => doc(&sh, open)?,
        Commands::Smoke {
            managers,
            workers,
            timeout,
        } => smoke(&sh, managers, workers, timeout)?,
        Commands::Ci => ci(&sh)?,
    }

    Ok(())
}

fn project_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("Failed to run cargo locate-project")?;

    let path = String::from_utf8(output.stdout)?;
    let manifest = PathBuf::from(path.trim());

    manifest
        .parent()
        .map(|p| p.to_path_buf())
        .context("Failed to find project root")
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building sind...");

    if release {
        cmd!(sh, "cargo build --release --bin sind").run()?;
    } else {
        cmd!(sh, "cargo build --bin sind").run()?;
    }

    println!("✅ Build complete!");
    Ok(())
}

fn test(sh: &Shell, release: bool) -> Result<()> {
    println!("🧪 Running tests...");

    if release {
        cmd!(sh, "cargo test --release").run()?;
    } else {
        cmd!(sh, "cargo test").run()?;
    }

    println!("✅ All tests passed!");
    Ok(())
}

fn lint(sh: &Shell) -> Result<()> {
    println!("🔍 Running lints...");

    println!("  Checking formatting...");
    cmd!(sh, "cargo fmt --all -- --check").run()?;

    println!("  Running clippy...");
    cmd!(sh, "cargo clippy --all-targets --all-features -- -D warnings").run()?;

    println!("✅ All lints passed!");
    Ok(())
}

fn fmt(sh: &Shell, check: bool) -> Result<()> {
    println!("🎨 Formatting code...");

    if check {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
    } else {
        cmd!(sh, "cargo fmt --all").run()?;
    }

    println!("✅ Formatting complete!");
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 Cleaning build artifacts...");
    cmd!(sh, "cargo clean").run()?;
    println!("✅ Clean complete!");
    Ok(())
}

fn install(sh: &Shell) -> Result<()> {
    println!("📥 Installing sind locally...");
    cmd!(sh, "cargo install --path .").run()?;
    println!("✅ Installation complete!");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    println!("📚 Generating documentation...");

    if open {
        cmd!(sh, "cargo doc --no-deps --open").run()?;
    } else {
        cmd!(sh, "cargo doc --no-deps").run()?;
    }

    println!("✅ Documentation generated!");
    Ok(())
}

fn smoke(sh: &Shell, managers: u32, workers: u32, timeout: u64) -> Result<()> {
    println!("💨 Running smoke test against the local docker daemon...");

    build(sh, false)?;

    let home = tempfile_dir()?;
    let _home = sh.push_env("SIND_HOME", &home);
    let _cluster = sh.push_env("SIND_CLUSTER", "sind_smoke");
    let (managers, workers, timeout) = (
        managers.to_string(),
        workers.to_string(),
        timeout.to_string(),
    );

    let sind = "target/debug/sind";
    let created = cmd!(
        sh,
        "{sind} --timeout {timeout} create --managers {managers} --workers {workers} --network-name sind_smoke"
    )
    .run();

    let checked = created.and_then(|_| {
        cmd!(sh, "{sind} ps").run()?;
        cmd!(sh, "{sind} env").run()
    });

    // Delete whatever was created, even after a failure
    let deleted = cmd!(sh, "{sind} --timeout {timeout} delete").run();
    let _ = std::fs::remove_dir_all(&home);

    checked?;
    deleted?;

    println!("✅ Smoke test passed!");
    Ok(())
}

fn tempfile_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("sind-smoke-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔄 Running CI checks...");

    println!("\n📋 Step 1/4: Format check");
    fmt(sh, true)?;

    println!("\n📋 Step 2/4: Lint");
    lint(sh)?;

    println!("\n📋 Step 3/4: Tests");
    test(sh, false)?;

    println!("\n📋 Step 4/4: Release build");
    build(sh, true)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}
