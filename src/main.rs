//! `secure-env` command line

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use secure_env::commands::{
    self,
    secrets::{LoadArgs, SetArgs},
    OutputFormat,
};
use secure_env::error::CommandResult;
use secure_env::{Category, SecretManager, SecretsConfig};

#[derive(Parser)]
#[command(name = "secure-env")]
#[command(about = "Encrypted store for application configuration secrets", long_about = None)]
struct Cli {
    /// Store file (overrides SECURE_ENV_DB_PATH)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Master key file (overrides SECURE_ENV_KEY_FILE)
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a secret
    Set {
        name: String,
        /// Prompted for without echo when omitted
        value: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Show one secret, or all of them
    Get {
        name: Option<String>,
        /// Print actual values
        #[arg(long)]
        reveal: bool,
        #[arg(long)]
        category: Option<Category>,
    },

    /// Delete a secret
    Delete {
        name: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// List secret names and metadata
    List {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Store statistics
    Stats,

    /// Load values into this process's environment
    Load {
        #[arg(long)]
        category: Option<Category>,
        /// Import this file first when the store is empty
        #[arg(long)]
        env_file: Option<PathBuf>,
        /// List loaded names
        #[arg(long)]
        show: bool,
        /// With --show, print actual values
        #[arg(long)]
        reveal: bool,
    },

    /// Import a .env file
    Import { file: PathBuf },

    /// Write a value-free .env template
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Snapshot the store (default: <store>.backup)
    Backup {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the store with a backup
    Restore {
        file: PathBuf,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// Import .env, write its template and check the configuration
    Init {
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> CommandResult<()> {
    let mut config = SecretsConfig::from_env();
    if let Some(path) = cli.db_path {
        config = config.with_store_path(path);
    }
    if let Some(path) = cli.key_file {
        config = config.with_key_path(path);
    }

    let manager = SecretManager::open(&config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Set {
            name,
            value,
            category,
            description,
        } => commands::secrets::set_secret(
            &manager,
            SetArgs {
                name,
                value,
                category,
                description,
            },
            &mut out,
        )?,
        Commands::Get {
            name,
            reveal,
            category,
        } => commands::secrets::get_secret(&manager, name.as_deref(), reveal, category, &mut out)?,
        Commands::Delete { name, force } => {
            commands::secrets::delete_secret(&manager, &name, force, &mut out)?
        }
        Commands::List { category, format } => {
            commands::secrets::list_secrets(&manager, category, format, &mut out)?
        }
        Commands::Stats => commands::secrets::show_stats(&manager, &mut out)?,
        Commands::Load {
            category,
            env_file,
            show,
            reveal,
        } => commands::secrets::load_env(
            &manager,
            LoadArgs {
                category,
                env_file: env_file.as_deref(),
                show,
                reveal,
            },
            &mut out,
        )?,
        Commands::Import { file } => commands::storage::import_env(&manager, &file, &mut out)?,
        Commands::Export { output } => {
            commands::storage::export_template(&manager, output.as_deref(), &mut out)?
        }
        Commands::Backup { output } => {
            commands::storage::backup_store(&manager, output.as_deref(), &mut out)?
        }
        Commands::Restore { file, force } => {
            commands::storage::restore_store(&manager, &file, force, &mut out)?
        }
        Commands::Init { env_file } => {
            commands::storage::init(&manager, env_file.as_deref(), &mut out)?
        }
    }

    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
