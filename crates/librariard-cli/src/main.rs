//! Librariard - checkouts from every library card in one list.
//!
//! Shows the cached list immediately, refreshes it from the checkout proxy
//! once a day (or on `--refresh`), and prints the updated list when the
//! refresh finishes.

mod format;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use librariard_core::auth::CredentialStore;
use librariard_core::cache::age_display;
use librariard_core::sync::event_channel;
use librariard_core::{
    Account, CacheStore, ComputedCheckout, Config, ProxyClient, SyncEngine, SyncEvent,
};

use format::{truncate_string, MAX_TITLE_LENGTH};

/// Log file name inside the cache directory (rotated daily)
const LOG_FILE_PREFIX: &str = "librariard.log";

const USAGE: &str = "\
Usage: librariard [OPTION]

Options:
  (none)              Show checkouts, refreshing if the cache is from an earlier day
  --refresh           Show cached checkouts, then refresh regardless of age
  --accounts          List configured library cards
  --add-account ID CARD [NAME]
                      Register a library card under its gateway account id
  --set-pin CARD      Store the PIN for a card number in the OS keychain
  --forget-pin CARD   Remove the stored PIN for a card number
  --help              Show this help";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and to a daily file in the cache directory. Use the
/// RUST_LOG env var to control the level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;

    let _log_guard = init_tracing(&cache_dir);

    let force = match args.get(1).map(String::as_str) {
        None => false,
        Some("--refresh") => true,
        Some("--accounts") => return list_accounts(&config),
        Some("--add-account") => return add_account(config, &args[2..]),
        Some("--set-pin") => return set_pin(args.get(2)),
        Some("--forget-pin") => return forget_pin(args.get(2)),
        Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some(other) => bail!("Unknown argument: {}\n\n{}", other, USAGE),
    };

    if config.accounts.is_empty() {
        eprintln!(
            "No library cards configured. Add them to {}",
            Config::config_path()?.display()
        );
    }

    info!(accounts = config.accounts.len(), force, "Librariard starting");

    let accounts = CredentialStore::attach_pins(&config.accounts);
    let source = Arc::new(ProxyClient::new(config.backend_url())?);
    let cache = Arc::new(CacheStore::new(&cache_dir));

    let (tx, rx) = event_channel();
    let engine = SyncEngine::new(Arc::clone(&cache), source, accounts, tx);
    let printer = tokio::spawn(print_events(rx));

    let result = engine.load(force).await.wait().await;

    // Closing the last sender lets the printer finish
    drop(engine);
    printer.await?;

    if let Some(stamp) = cache.last_fetched().await.ok().flatten() {
        if let Ok(fetched) = DateTime::parse_from_rfc3339(&stamp) {
            eprintln!(
                "Last updated {}",
                age_display(fetched.with_timezone(&Local), Local::now())
            );
        }
    }

    result?;
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SyncEvent::Checkouts(list) => print_checkouts(&list),
            SyncEvent::NoCheckouts => println!("No checkouts.\n"),
            SyncEvent::Status(status) => eprintln!("[{}]", status),
        }
    }
}

fn print_checkouts(list: &[ComputedCheckout]) {
    for (i, checkout) in list.iter().enumerate() {
        let renew = checkout
            .renew_label
            .as_deref()
            .map(|label| format!(" {}", label))
            .unwrap_or_default();
        println!(
            "{:>3}. {}  {}{}{}",
            i + 1,
            truncate_string(checkout.title(), MAX_TITLE_LENGTH),
            checkout.display_date,
            renew,
            urgency_marker(checkout)
        );
    }
    println!();
}

fn urgency_marker(checkout: &ComputedCheckout) -> &'static str {
    if checkout.overdue {
        "  ** OVERDUE **"
    } else if checkout.due_within_week {
        "  * due this week"
    } else if checkout.due_within_2wks {
        "  (due next week)"
    } else {
        ""
    }
}

fn list_accounts(config: &Config) -> Result<()> {
    if config.accounts.is_empty() {
        println!("No library cards configured.");
    }
    for account in &config.accounts {
        println!(
            "{}  card {}  (account {})",
            account.label(),
            account.card_number,
            account.account_id
        );
    }
    Ok(())
}

fn add_account(mut config: Config, args: &[String]) -> Result<()> {
    let (account_id, card_number) = match args {
        [account_id, card_number, ..] => (account_id, card_number),
        _ => bail!("--add-account needs an account id and a card number\n\n{}", USAGE),
    };

    let mut account = Account::new(account_id.as_str(), card_number.as_str());
    if let Some(name) = args.get(2) {
        account = account.with_display_name(name.as_str());
    }
    config.add_account(account)?;
    config.save()?;

    println!(
        "Added card {}. Run `librariard --set-pin {}` to store its PIN.",
        card_number, card_number
    );
    Ok(())
}

fn set_pin(card_number: Option<&String>) -> Result<()> {
    let Some(card_number) = card_number else {
        bail!("--set-pin needs a card number\n\n{}", USAGE);
    };
    let pin = rpassword::prompt_password(format!("PIN for card {}: ", card_number))
        .context("Failed to read PIN")?;
    CredentialStore::store_pin(card_number, pin.trim())?;
    println!("PIN stored for card {}", card_number);
    Ok(())
}

fn forget_pin(card_number: Option<&String>) -> Result<()> {
    let Some(card_number) = card_number else {
        bail!("--forget-pin needs a card number\n\n{}", USAGE);
    };
    CredentialStore::delete_pin(card_number)?;
    println!("PIN removed for card {}", card_number);
    Ok(())
}
