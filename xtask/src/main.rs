use anyhow::{Context, Result};
use std::process::Command;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cargo xtask <command>");
        eprintln!("Commands:");
        eprintln!("  check     Run fmt-check, clippy, and the full test suite");
        eprintln!("  test      Run the workspace test suite");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "check" => check(),
        "test" => test(),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            std::process::exit(1);
        }
    }
}

fn check() -> Result<()> {
    run("cargo", &["fmt", "--all", "--check"])?;
    run("cargo", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    test()
}

fn test() -> Result<()> {
    run("cargo", &["test", "--workspace"])
}

fn run(cmd: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("failed to execute {cmd} {args:?}"))?;
    if !status.success() {
        anyhow::bail!("{cmd} {args:?} failed with {status}");
    }
    Ok(())
}
