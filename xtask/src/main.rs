use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Next Rich helper tasks (fmt, clippy, tests, simulated play)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format the workspace
    Fmt {
        /// Only report unformatted files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy,
    /// Run workspace tests, or a single package with `-p`
    Test {
        #[arg(short, long)]
        package: Option<String>,
    },
    /// fmt --check, clippy and tests, in that order
    Ci,
    /// Start the client against locally simulated rounds
    Simulate {
        #[arg(long, default_value_t = 3)]
        bots: usize,
        #[arg(long, default_value_t = 60)]
        round_secs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root()?;

    match cli.command {
        Commands::Fmt { check } => run_fmt(&root, check)?,
        Commands::Clippy => run_clippy(&root)?,
        Commands::Test { package } => run_tests(&root, package.as_deref())?,
        Commands::Ci => {
            run_fmt(&root, true)?;
            run_clippy(&root)?;
            run_tests(&root, None)?;
        }
        Commands::Simulate { bots, round_secs } => run_simulation(&root, bots, round_secs)?,
    }

    Ok(())
}

fn repo_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn run_fmt(root: &Path, check: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("fmt").arg("--all").current_dir(root);
    if check {
        cmd.arg("--").arg("--check");
    }
    run_command(cmd, "cargo fmt")
}

fn run_clippy(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy")
        .arg("--workspace")
        .arg("--all-targets")
        .arg("--all-features")
        .arg("--")
        .arg("-D")
        .arg("warnings")
        .current_dir(root);
    run_command(cmd, "cargo clippy")
}

fn run_tests(root: &Path, package: Option<&str>) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test").current_dir(root);
    let label = match package {
        Some(package) => {
            cmd.arg("-p").arg(package);
            format!("cargo test -p {package}")
        }
        None => {
            cmd.arg("--workspace");
            String::from("cargo test --workspace")
        }
    };
    run_command(cmd, &label)
}

fn run_simulation(root: &Path, bots: usize, round_secs: u64) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("run")
        .arg("-p")
        .arg("tui")
        .arg("--bin")
        .arg("next-rich")
        .arg("--")
        .arg("--simulate")
        .arg("--bots")
        .arg(bots.to_string())
        .arg("--round-secs")
        .arg(round_secs.to_string())
        .current_dir(root);
    run_command(cmd, "next-rich --simulate")
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}
