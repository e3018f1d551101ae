use clap::{Parser, Subcommand};
use exam_audio_portal::auth;
use exam_audio_portal::config::{LoginPolicy, PortalConfig};
use exam_audio_portal::db;
use exam_audio_portal::serve::serve_portal;
use exam_audio_portal::tables::{self, ImportMode};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Exam audio portal: candidate audio delivery and admin table tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the portal API over HTTP
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Login policy for candidates (overrides config file)
        #[arg(long, value_enum)]
        login_policy: Option<LoginPolicy>,
    },
    /// Create the portal tables and stamp the schema version
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load a CSV file into a table
    ImportCsv {
        #[arg(short, long)]
        config: PathBuf,

        /// Target table name
        #[arg(short, long)]
        table: String,

        /// CSV file with a header row
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "append")]
        mode: ImportMode,
    },
    /// Write a table as CSV
    ExportCsv {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        table: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add an admin account with a hashed password
    AddAdmin {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Password for the new account
        #[arg(long)]
        password: String,
    },
    /// Replace plaintext passwords in users and exuser with bcrypt hashes
    HashPasswords {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            port,
            login_policy,
        } => {
            let mut config = PortalConfig::load(&config)?;
            if let Some(port) = port {
                config.api_port = port;
            }
            if let Some(policy) = login_policy {
                config.login_policy = policy;
            }
            serve_portal(config)
        }
        Command::InitDb { config } => init_db(PortalConfig::load(&config)?),
        Command::ImportCsv {
            config,
            table,
            file,
            mode,
        } => import_csv(PortalConfig::load(&config)?, table, file, mode),
        Command::ExportCsv {
            config,
            table,
            output,
        } => export_csv(PortalConfig::load(&config)?, table, output),
        Command::AddAdmin {
            config,
            role,
            password,
        } => add_admin(PortalConfig::load(&config)?, role, password),
        Command::HashPasswords { config } => hash_passwords(PortalConfig::load(&config)?),
    }
}

async fn open_verified(config: &PortalConfig) -> Result<sqlx::SqlitePool, Box<dyn std::error::Error>> {
    let pool = db::open_database_connection(&config.database_path)
        .await
        .map_err(|e| format!("Failed to open database: {}", e))?;
    db::verify_schema_version(&pool)
        .await
        .map_err(|e| e.to_string())?;
    Ok(pool)
}

fn init_db(config: PortalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = db::open_database_connection(&config.database_path)
            .await
            .map_err(|e| format!("Failed to open database: {}", e))?;
        db::init_database_schema(&pool)
            .await
            .map_err(|e| format!("Failed to initialize schema: {}", e))?;
        println!("Initialized database: {}", config.database_path.display());
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn import_csv(
    config: PortalConfig,
    table: String,
    file: PathBuf,
    mode: ImportMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(&file)
        .map_err(|e| format!("Failed to read CSV file '{}': {}", file.display(), e))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = open_verified(&config).await?;
        let summary = tables::import_csv(&pool, &table, &data, mode).await?;
        println!(
            "Imported {} rows into '{}' (columns: {})",
            summary.rows,
            summary.table,
            summary.columns.join(", ")
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn export_csv(
    config: PortalConfig,
    table: String,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    let csv = rt.block_on(async {
        let pool = open_verified(&config).await?;
        Ok::<_, Box<dyn std::error::Error>>(tables::export_csv(&pool, &table).await?)
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &csv)
                .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            info!("Exported '{}' to {}", table, path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&csv)?;
        }
    }
    Ok(())
}

fn add_admin(
    config: PortalConfig,
    role: String,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = open_verified(&config).await?;
        let id = auth::create_admin(&pool, &config, &role, &password).await?;
        println!("Added admin {} with role '{}'", id, role);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

fn hash_passwords(config: PortalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = open_verified(&config).await?;
        let upgraded = auth::upgrade_plaintext_passwords(&pool, &config).await?;
        println!("Hashed {} plaintext passwords", upgraded);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
