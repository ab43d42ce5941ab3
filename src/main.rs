#[cfg(feature = "cli")]
use colored::Colorize;
#[cfg(feature = "cli")]
use zkpki::cli::run_cli;

#[cfg(feature = "cli")]
fn main() {
    if let Err(e) = run_cli() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("The zkpki binary needs the 'cli' feature.");
    eprintln!("Build with: cargo build --features cli");
    std::process::exit(1);
}
