//! Schema management tool.
//!
//! ```text
//! migrate up       apply pending migrations
//! migrate down     revert every applied migration
//! migrate status   list migrations and whether they are applied
//! migrate verify   exit non-zero unless all required tables exist
//! ```

use clap::{Parser, Subcommand};
use qr_code_api::{config::Config, db, session::Session};

#[derive(Parser, Debug)]
#[command(name = "migrate", about = "Manage the QR Code Generator API schema")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Up,
    /// Revert all applied migrations (drops every table)
    Down,
    /// Show applied and pending migrations
    Status,
    /// Check that all required tables exist
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    qr_code_api::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = db::create_pool(&config).await?;

    match cli.command {
        Command::Up => {
            db::run_migrations(&pool).await?;
            tracing::info!("Migrations applied");
        }
        Command::Down => {
            db::revert_migrations(&pool).await?;
            tracing::info!("Migrations reverted");
        }
        Command::Status => {
            for migration in db::migration_status(&pool).await? {
                let state = if migration.applied { "applied" } else { "pending" };
                println!("{:>14}  {:<8}  {}", migration.version, state, migration.description);
            }
        }
        Command::Verify => {
            let mut session = Session::acquire(&pool).await?;
            let missing = db::verify_schema(&mut session).await?;
            drop(session);

            if !missing.is_empty() {
                pool.close().await;
                anyhow::bail!("missing tables: {}", missing.join(", "));
            }
            println!("All required tables present.");
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["migrate", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert!(Cli::try_parse_from(["migrate"]).is_err());
    }
}
