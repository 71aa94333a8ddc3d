// ABOUTME: Entry point for the SQL Steward command line tool
// ABOUTME: Resolves credentials from flags or the active profile and dispatches subcommands

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

use sql_steward::config::{AppConfig, ConnectionProfile};
use sql_steward::{ConflictPolicy, DataFrame, ServerAdmin};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Connection profile name from the config file
    #[clap(short = 'P', long)]
    profile: Option<String>,

    /// Server hostname, overrides the profile
    #[clap(long)]
    host: Option<String>,

    /// Server port, overrides the profile
    #[clap(long)]
    port: Option<u16>,

    /// User name, overrides the profile
    #[clap(short, long)]
    user: Option<String>,

    /// Password, overrides the profile
    #[clap(short = 'p', long)]
    password: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test connectivity and print the server version
    Ping,

    /// List every database visible to the credentials
    ListDatabases,

    /// Check whether a database exists (exit code 1 when absent)
    DatabaseExists { database: String },

    /// Create a database unless it already exists
    CreateDatabase { database: String },

    /// Drop a database if it exists
    DropDatabase { database: String },

    /// List the tables in a database
    ListTables { database: String },

    /// Check whether a table exists (exit code 1 when absent)
    TableExists { database: String, table: String },

    /// Drop one table, or every table in the database when none is given
    DropTable {
        database: String,
        table: Option<String>,
    },

    /// Write a frame JSON file into a table
    Export {
        database: String,
        table: String,

        /// Path to the frame JSON file
        #[clap(short, long)]
        file: PathBuf,

        /// Behavior when the table already exists
        #[clap(long, value_enum, default_value = "fail")]
        if_exists: ConflictPolicy,
    },

    /// Read a table into a frame and print it as JSON
    Import {
        database: String,
        table: String,

        /// Write the frame JSON here instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

/// Build the administrator from the config file, with CLI flags taking
/// precedence over the selected profile.
fn resolve_admin(cli: &Cli) -> Result<ServerAdmin> {
    let config = AppConfig::load().context("Failed to load config")?;

    let base = match &cli.profile {
        Some(key) => config
            .profile(key)
            .with_context(|| format!("Unknown connection profile '{key}'"))?
            .clone(),
        None => config
            .active_profile()
            .cloned()
            .unwrap_or_else(|_| ConnectionProfile::default()),
    };

    let profile = ConnectionProfile {
        name: base.name,
        host: cli.host.clone().unwrap_or(base.host),
        port: cli.port.unwrap_or(base.port),
        username: cli.user.clone().unwrap_or(base.username),
        password: cli.password.clone().unwrap_or(base.password),
    };

    Ok(ServerAdmin::from_profile(&profile))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let admin = resolve_admin(&cli)?;

    match cli.command {
        Commands::Ping => match admin.ping().await {
            Some(version) => println!("{version}"),
            None => std::process::exit(1),
        },
        Commands::ListDatabases => {
            for database in admin.list_databases().await {
                println!("{database}");
            }
        }
        Commands::DatabaseExists { database } => {
            if !admin.database_exists(&database).await {
                std::process::exit(1);
            }
        }
        Commands::CreateDatabase { database } => {
            admin.create_database(&database).await;
        }
        Commands::DropDatabase { database } => {
            admin.drop_database(&database).await;
        }
        Commands::ListTables { database } => {
            for table in admin.list_tables(&database).await {
                println!("{table}");
            }
        }
        Commands::TableExists { database, table } => {
            if !admin.table_exists(&database, &table).await {
                std::process::exit(1);
            }
        }
        Commands::DropTable { database, table } => {
            admin.drop_table(&database, table.as_deref()).await;
        }
        Commands::Export {
            database,
            table,
            file,
            if_exists,
        } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read frame file {}", file.display()))?;
            let frame: DataFrame = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse frame file {}", file.display()))?;
            admin.export_table(&frame, &database, &table, if_exists).await;
        }
        Commands::Import {
            database,
            table,
            output,
        } => {
            let frame = match admin.import_table(&database, &table).await {
                Some(frame) => frame,
                None => std::process::exit(1),
            };
            let json = serde_json::to_string_pretty(&frame)?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Failed to write frame file {}", path.display()))?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}
