//! ledger-bank - accounts, entries and money transfers
//!
//! ```text
//! ┌──────────┐    ┌────────────────┐    ┌──────────────┐
//! │   CLI    │───▶│ TransferEngine │───▶│    Ledger    │
//! │  (clap)  │    │ LedgerService  │    │ (PG/memory)  │
//! └──────────┘    └────────────────┘    └──────────────┘
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr and the log file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use ledger_bank::config::AppConfig;
use ledger_bank::db::{Database, schema};
use ledger_bank::ledger::{
    AccountId, Currency, Ledger, LedgerService, MemoryLedger, NewAccount, Page, PgLedger,
};
use ledger_bank::logging::init_logging;
use ledger_bank::transfer::{RequestContext, TransferEngine, TransferParams};

#[derive(Parser)]
#[command(name = "ledger-bank")]
#[command(about = "Ledger-backed accounts and money transfers", long_about = None)]
struct Cli {
    /// Config environment, reads config/<env>.yaml
    #[arg(long, default_value = "dev", global = true)]
    env: String,

    /// Use a fresh in-memory ledger instead of PostgreSQL
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger tables if they do not exist
    InitSchema,

    /// Open a new account
    CreateAccount {
        owner: String,
        /// Opening balance in minor units
        balance: i64,
        /// USD, EUR or CAD
        currency: Currency,
    },

    /// Show one account
    Account { id: AccountId },

    /// List accounts by id
    Accounts {
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// List entries of an account
    Entries {
        account_id: AccountId,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// List transfers sent by --from or received by --to
    Transfers {
        #[arg(long)]
        from: AccountId,
        #[arg(long)]
        to: AccountId,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Move money between two accounts
    Transfer {
        from: AccountId,
        to: AccountId,
        /// Amount in minor units
        amount: i64,
        /// Correlation id for the logs (generated when absent)
        #[arg(long)]
        correlation_id: Option<String>,
        /// Give up and roll back after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.env)?;
    let _guard = init_logging(&config);

    info!(
        git_hash = env!("GIT_HASH"),
        env = %cli.env,
        memory = cli.memory,
        "ledger-bank starting"
    );

    let ledger = open_ledger(&cli, &config).await?;
    info!(backend = ledger.name(), "Ledger ready");

    let service = LedgerService::new(ledger.clone());
    let engine = TransferEngine::with_config(ledger, config.transfer.clone());

    match cli.command {
        // Handled while opening the ledger
        Commands::InitSchema => {}
        Commands::CreateAccount {
            owner,
            balance,
            currency,
        } => {
            let account = service
                .create_account(NewAccount::new(owner, balance, currency))
                .await?;
            print_json(&account)?;
        }
        Commands::Account { id } => {
            print_json(&service.get_account(id).await?)?;
        }
        Commands::Accounts { limit, offset } => {
            let page = Page::new(limit, offset)?;
            print_json(&service.list_accounts(page).await?)?;
        }
        Commands::Entries {
            account_id,
            limit,
            offset,
        } => {
            let page = Page::new(limit, offset)?;
            print_json(&service.list_entries(account_id, page).await?)?;
        }
        Commands::Transfers {
            from,
            to,
            limit,
            offset,
        } => {
            let page = Page::new(limit, offset)?;
            print_json(&service.list_transfers(from, to, page).await?)?;
        }
        Commands::Transfer {
            from,
            to,
            amount,
            correlation_id,
            deadline_ms,
        } => {
            let mut ctx = RequestContext::new();
            if let Some(id) = correlation_id {
                ctx = ctx.with_correlation_id(id);
            }
            if let Some(ms) = deadline_ms {
                ctx = ctx.with_deadline(Duration::from_millis(ms));
            }

            match engine
                .transfer_money(TransferParams::new(from, to, amount), &ctx)
                .await
            {
                Ok(result) => print_json(&result)?,
                Err(e) => {
                    let code = e.code();
                    error!(
                        correlation_id = %ctx.correlation_id,
                        code,
                        retryable = e.is_retryable(),
                        "Transfer failed"
                    );
                    return Err(e).context(format!("transfer failed [{}]", code));
                }
            }
        }
    }

    Ok(())
}

/// Build the configured ledger backend. `init-schema` runs here since it
/// needs the raw pool.
async fn open_ledger(cli: &Cli, config: &AppConfig) -> anyhow::Result<Arc<dyn Ledger>> {
    if cli.memory {
        if matches!(cli.command, Commands::InitSchema) {
            info!("In-memory ledger needs no schema");
        }
        return Ok(Arc::new(MemoryLedger::new()));
    }

    let url = config
        .postgres_url
        .as_deref()
        .context("postgres_url is not set (config file or DATABASE_URL)")?;
    let db = Database::connect(url, &config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;

    if matches!(cli.command, Commands::InitSchema) {
        schema::init_schema(db.pool())
            .await
            .context("Failed to create ledger schema")?;
    }

    Ok(Arc::new(
        PgLedger::new(db.pool().clone()).with_lock_timeout(config.database.lock_timeout()),
    ))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
