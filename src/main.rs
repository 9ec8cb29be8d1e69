use std::env;

use anyhow::Result;

use tankwatch_lib::RunMode;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mode = match args.first().map(String::as_str) {
        None => RunMode::Once,
        Some("--watch") => RunMode::Watch,
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            eprintln!("Usage: tankwatch [--watch]");
            eprintln!();
            eprintln!("Environment:");
            eprintln!("  TANKWATCH_DB        SQLite database path (default: tankwatch.sqlite3)");
            eprintln!("  TANKWATCH_SETTINGS  Settings JSON path (default: settings.json)");
            std::process::exit(1);
        }
    };

    tankwatch_lib::run(mode).await
}
