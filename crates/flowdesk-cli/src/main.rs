//! Flowdesk command-line tools.
//!
//! Provides the `flowdesk` binary for inspecting and maintaining a diagram
//! database without running the HTTP server. It opens the same SQLite file
//! the server uses and goes through the same gateway, so every write keeps
//! the all-or-nothing guarantees of the storage layer.
//!
//! Results are printed as JSON on stdout. Exit codes: 0 = success,
//! 1 = not found or invalid input, 3 = storage error.

use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;

use flowdesk_core::clock::now_ms;
use flowdesk_core::diagram::NewDiagram;
use flowdesk_core::id::{DiagramId, TaskId};
use flowdesk_storage::{DiagramGateway, SqliteStore, StorageError, TaskStore};
use flowdesk_view::{Theme, DEFAULT_LABEL_MAX};

/// Flowdesk diagram tools.
#[derive(Parser)]
#[command(name = "flowdesk", about = "Flowdesk diagram tools")]
struct Cli {
    /// Path to the diagram database file.
    #[arg(long, env = "FLOWDESK_DB_PATH", default_value = "flowdesk.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List all diagrams.
    List,

    /// Create an empty diagram.
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Render a diagram with its tasks resolved.
    Show {
        id: String,

        /// Colour theme: light or dark.
        #[arg(short, long, default_value = "light")]
        theme: String,

        /// Maximum displayed label length.
        #[arg(long, default_value_t = DEFAULT_LABEL_MAX)]
        label_max: usize,
    },

    /// Print the persisted document of a diagram.
    Export { id: String },

    /// Delete a diagram with its nodes and edges.
    Delete { id: String },

    /// List all tasks.
    Tasks,

    /// Remove every node reference to a task, keeping the task itself.
    ClearTaskRef { task: String },
}

enum CliError {
    Invalid(String),
    Storage(StorageError),
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        CliError::Storage(err)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let exit_code = match run(&cli.db, cli.command) {
        Ok(output) => {
            let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize result: {}\"}}", e)
            });
            println!("{}", json);
            0
        }
        Err(CliError::Invalid(msg)) => {
            eprintln!("Error: {}", msg);
            1
        }
        Err(CliError::Storage(e)) => {
            eprintln!("Storage error: {}", e);
            3
        }
    };
    process::exit(exit_code);
}

/// Execute one subcommand against the database at `db_path`.
fn run(db_path: &str, command: Commands) -> Result<serde_json::Value, CliError> {
    let mut store = SqliteStore::new(db_path)?;

    match command {
        Commands::List => Ok(json!({ "diagrams": store.list_diagrams()? })),
        Commands::Create { name, description } => {
            if name.trim().is_empty() {
                return Err(CliError::Invalid("diagram name must not be empty".to_string()));
            }
            let input = NewDiagram {
                description,
                ..NewDiagram::named(name)
            };
            let diagram = store.create_diagram(input, now_ms())?;
            Ok(json!({ "diagram": diagram }))
        }
        Commands::Show {
            id,
            theme,
            label_max,
        } => {
            let theme: Theme = theme
                .parse()
                .map_err(|e| CliError::Invalid(format!("{}", e)))?;
            let document = load(&store, &id)?;
            let tasks = store.get_all_tasks()?;
            let frame = flowdesk_view::render(
                &document.nodes,
                &document.edges,
                &tasks,
                theme,
                document.meta.viewport,
                label_max,
            );
            Ok(json!({ "diagram": document.meta, "theme": theme, "frame": frame }))
        }
        Commands::Export { id } => Ok(serde_json::to_value(load(&store, &id)?)
            .map_err(|e| CliError::Invalid(format!("failed to serialize document: {}", e)))?),
        Commands::Delete { id } => {
            if !store.delete_diagram(&DiagramId::from(id.as_str()))? {
                return Err(CliError::Invalid(format!("diagram not found: {}", id)));
            }
            Ok(json!({ "deleted": true }))
        }
        Commands::Tasks => Ok(json!({ "tasks": store.get_all_tasks()? })),
        Commands::ClearTaskRef { task } => {
            let cleared = store.clear_task_references(&TaskId::from(task.as_str()), now_ms())?;
            Ok(json!({ "task": task, "clearedNodes": cleared }))
        }
    }
}

fn load(
    store: &SqliteStore,
    id: &str,
) -> Result<flowdesk_core::diagram::DiagramDocument, CliError> {
    store
        .load_diagram(&DiagramId::from(id))?
        .ok_or_else(|| CliError::Invalid(format!("diagram not found: {}", id)))
}
