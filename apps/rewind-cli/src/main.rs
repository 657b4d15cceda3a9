mod script;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rewind_store::Value;
use rewind_tools::StoreInspector;
use rewind_value::display_path;
use tracing_subscriber::EnvFilter;

use crate::script::{Script, execute, parse_watch_path};

#[derive(Parser)]
#[command(name = "rewind-cli", about = "CLI tool for rewind stores")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Run a JSON operation script against a fresh store
    Run {
        /// Path to the script file
        script: PathBuf,
        /// Dotted path to watch for changes, e.g. `user.name`
        #[arg(short, long)]
        watch: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("rewind-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("value: {}", rewind_value::crate_info());
            println!("history: {}", rewind_history::crate_info());
            println!("store: {}", rewind_store::crate_info());
            println!("tools: {}", rewind_tools::crate_info());
        }
        Commands::Run { script, watch } => {
            let script = Script::load(&script)?;
            let store = script.build_store();
            tracing::info!(steps = script.steps.len(), "running script");

            for dotted in &watch {
                let path = parse_watch_path(dotted);
                let label = display_path(&path);
                store.subscribe_in(&path, move |value: Option<&Value>| match value {
                    Some(value) => println!("  watch {label}: {value}"),
                    None => println!("  watch {label}: <missing>"),
                });
            }

            println!("initial: {}", store.state());
            for (n, step) in script.steps.iter().enumerate() {
                let output = execute(&store, step)?;
                println!("step {n} {}: {output}", step.op);
                println!("  state: {}", store.state());
            }

            println!();
            println!("{}", StoreInspector::summary(&store));
            for entry in StoreInspector::timeline(&store) {
                println!("{entry}");
            }
        }
    }

    Ok(())
}
