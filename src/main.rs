use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use luatest_explorer::config::Config;
use luatest_explorer::discovery;
use luatest_explorer::events::{EventSink, SuiteState, TestEvent};
use luatest_explorer::patterns::PatternRegistry;
use luatest_explorer::plugins;
use luatest_explorer::process::ShellRunner;
use luatest_explorer::run;
use luatest_explorer::tree::{DiscoverySession, TreeNode};

#[derive(Parser)]
#[command(name = "luatest-explorer", version, about = "Discover and run luatest tests")]
struct Cli {
    /// Workspace folder containing the Lua project.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Optional JSON config file overriding the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tests and print the tree as JSON.
    Discover,
    /// Run the given node ids (or everything, with no ids) and print
    /// events as JSON lines.
    Run { ids: Vec<String> },
    /// Install the JSON output plugin into the luatest directory.
    InstallPlugins,
}

/// Streams every event to stdout as one JSON object per line.
#[derive(Default)]
struct JsonLineSink;

impl JsonLineSink {
    fn emit(&self, value: serde_json::Value) {
        println!("{value}");
    }
}

impl EventSink for JsonLineSink {
    fn load_started(&mut self) {
        self.emit(serde_json::json!({"type": "load", "state": "started"}));
    }

    fn load_finished(&mut self, tree: &TreeNode) {
        self.emit(serde_json::json!({"type": "load", "state": "finished", "tree": tree}));
    }

    fn run_started(&mut self, ids: &[String]) {
        self.emit(serde_json::json!({"type": "run", "state": "started", "ids": ids}));
    }

    fn run_finished(&mut self) {
        self.emit(serde_json::json!({"type": "run", "state": "finished"}));
    }

    fn suite_state(&mut self, id: &str, state: SuiteState) {
        self.emit(serde_json::json!({"type": "suite", "id": id, "state": state}));
    }

    fn test_state(&mut self, event: TestEvent) {
        match serde_json::to_value(&event) {
            Ok(mut value) => {
                value["type"] = "test".into();
                self.emit(value);
            }
            Err(e) => tracing::error!("failed to serialize test event: {e}"),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("luatest-explorer: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let default_filter = if config.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = match PatternRegistry::from_config(&config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("luatest-explorer: {e}");
            return ExitCode::FAILURE;
        }
    };

    let workspace = match cli.workspace.canonicalize() {
        Ok(workspace) => workspace,
        Err(e) => {
            eprintln!(
                "luatest-explorer: cannot open workspace {}: {e}",
                cli.workspace.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let process = ShellRunner;
    let mut session = DiscoverySession::new(&workspace);
    let mut sink = JsonLineSink;

    match cli.command {
        Commands::Discover => {
            if let Err(e) = discovery::discover(&mut session, &config, &registry, &process, &mut sink)
            {
                eprintln!("luatest-explorer: {e}");
                return ExitCode::FAILURE;
            }
        }
        Commands::Run { ids } => {
            if let Err(e) = discovery::discover(&mut session, &config, &registry, &process, &mut sink)
            {
                eprintln!("luatest-explorer: {e}");
                return ExitCode::FAILURE;
            }
            let ids = if ids.is_empty() {
                session
                    .root()
                    .children()
                    .iter()
                    .map(|n| n.id().to_string())
                    .collect()
            } else {
                ids
            };
            run::run_selection(&session, &ids, &config, &registry, &process, &mut sink);
        }
        Commands::InstallPlugins => {
            let dir = PathBuf::from(config.luatest_dir(&workspace));
            if let Err(e) = plugins::install_plugins(&dir) {
                eprintln!("luatest-explorer: {e}");
                return ExitCode::FAILURE;
            }
            println!("luatest-explorer: plugins installed into {}", dir.display());
        }
    }

    ExitCode::SUCCESS
}
