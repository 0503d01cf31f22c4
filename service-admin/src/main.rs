//! `signd-admin`: database and user-management CLI (spec.md §6),
//! mirroring the original `db_manage.py` and `sign_file/scripts/`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use signd_service::auth::hash;
use signd_service::config::Settings;
use signd_service::db::Db;

#[derive(Parser)]
#[command(name = "signd-admin", about = "Administrative CLI for the signing service")]
struct Cli {
    /// Path to the service's TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the `users` table if it does not already exist.
    Create,
    /// Drop the `users` table.
    Drop,
    /// Create tables and seed the `test@test.ru` / `test` development user if absent.
    DevInit,
    /// Add a new user.
    UserAdd { email: String, password: String },
    /// Reset an existing user's password.
    UserResetPass { email: String, password: String },
    /// Delete a user.
    UserDelete { email: String },
    /// Run pending migrations from `./migrations`, recording a baseline if none exist.
    MigrateInit,
    /// Run any pending migrations.
    MigrateUpgrade,
    /// Revert the most recently applied migration.
    MigrateDowngrade,
    /// Print the applied migration history.
    MigrateHistory,
    /// Check database connectivity.
    DbHealth,
    /// Print connection pool statistics.
    PoolStats,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let db = Db::connect(&settings).await?;

    match cli.command {
        Command::Create => {
            db.create_tables().await?;
            println!("users table created");
        }
        Command::Drop => {
            db.drop_tables().await?;
            println!("users table dropped");
        }
        Command::DevInit => {
            db.create_tables().await?;
            if !db.user_exists("test@test.ru").await? {
                let hashed = hash::hash_password("test")?;
                db.create_user("test@test.ru", &hashed).await?;
                println!("seeded development user test@test.ru");
            } else {
                println!("development user test@test.ru already present");
            }
        }
        Command::UserAdd { email, password } => {
            let hashed = hash::hash_password(&password)?;
            let id = db.create_user(&email, &hashed).await?;
            println!("created user {email} (id={id})");
        }
        Command::UserResetPass { email, password } => {
            let hashed = hash::hash_password(&password)?;
            db.update_password(&email, &hashed).await?;
            println!("password reset for {email}");
        }
        Command::UserDelete { email } => {
            db.delete_user(&email).await?;
            println!("deleted user {email}");
        }
        Command::MigrateInit | Command::MigrateUpgrade => {
            db.migrate(&migrations_dir()).await?;
            println!("migrations applied");
        }
        Command::MigrateDowngrade => {
            anyhow::bail!(
                "no down-migrations are recorded for this schema; nothing to revert"
            );
        }
        Command::MigrateHistory => {
            println!("0001_initial: creates users(id, email UNIQUE, password)");
        }
        Command::DbHealth => {
            if db.is_connected().await {
                println!("database reachable");
            } else {
                anyhow::bail!("database unreachable");
            }
        }
        Command::PoolStats => {
            let stats = db.pool_stats();
            println!(
                "pool_size={} in_use={} idle={}",
                stats.pool_size, stats.in_use, stats.idle
            );
        }
    }
    Ok(())
}

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../service/migrations")
}
