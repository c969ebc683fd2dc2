//! deepam_ceremony: interactive entry point.

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use deepam_ceremony::app::run;
use deepam_ceremony::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        _ => EnvFilter::new(cli.log_level()),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Virtual Inauguration Deepam                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Mouse simulation  (use --features leap for hardware)");
    println!("  Hold Space or the left mouse button to make a fist.");
    println!();

    if let Err(e) = run(cli.app_config()) {
        error!(error = %e, "ceremony failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
