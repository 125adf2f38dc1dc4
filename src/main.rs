use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walletbook::clock::{Clock, SystemClock};
use walletbook::config::{default_config_path, ResolvedConfig};
use walletbook::ledger::Ledger;
use walletbook::models::{CurrencyCode, User};
use walletbook::rates::{
    build_providers, timestamp, ProviderStatus, RateFilter, RateStore, RateUpdater,
};
use walletbook::session::{SessionData, SessionFile};
use walletbook::storage::JsonFileStorage;

fn parse_amount(s: &str) -> Result<Decimal, String> {
    s.trim().parse::<Decimal>().map_err(|e| e.to_string())
}

#[derive(Parser)]
#[command(name = "walletbook")]
#[command(about = "Currency wallet ledger with cached exchange rates")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new user
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Log in and remember the user for later commands
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the logged-in user
    Logout,

    /// Show wallets and their value in a base currency
    ShowPortfolio {
        /// Base currency (defaults to the configured one)
        #[arg(long)]
        base: Option<String>,
    },

    /// Add currency to a wallet, creating it if needed
    Buy {
        #[arg(long)]
        currency: String,
        #[arg(long, value_parser = parse_amount)]
        amount: Decimal,
    },

    /// Remove currency from an existing wallet
    Sell {
        #[arg(long)]
        currency: String,
        #[arg(long, value_parser = parse_amount)]
        amount: Decimal,
    },

    /// Look up a rate from the cached snapshot
    GetRate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Fetch rates from the providers and refresh the cache
    UpdateRates {
        /// Only run this provider (coingecko or exchangerate)
        #[arg(long)]
        source: Option<String>,
    },

    /// List cached rates
    ShowRates {
        /// Only pairs involving a currency starting with this prefix
        #[arg(long)]
        currency: Option<String>,
        /// Keep the N highest rates
        #[arg(long)]
        top: Option<usize>,
        /// Quote every cached currency in this base
        #[arg(long)]
        base: Option<String>,
    },

    /// List known currencies, or describe one
    Currencies {
        /// Only show this currency
        #[arg(long)]
        code: Option<String>,
    },

    /// Show current configuration
    Config,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

struct App {
    config: ResolvedConfig,
    ledger: Ledger,
    session: SessionFile,
}

impl App {
    fn new(config: ResolvedConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = Arc::new(JsonFileStorage::new(&config.data_dir));
        let rates = RateStore::new(config.snapshot_path(), config.history_path()).with_clock(clock);
        let ledger = Ledger::from_config(&config, storage, rates);
        let session = SessionFile::new(config.session_path());
        Self {
            config,
            ledger,
            session,
        }
    }

    async fn current_user(&self) -> Result<User> {
        let Some(session) = self.session.get().await? else {
            bail!("Not logged in; run `walletbook login` first");
        };
        self.ledger
            .user(session.user_id)
            .await?
            .with_context(|| format!("Logged-in user {} no longer exists", session.username))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = ResolvedConfig::load_or_default(&cli.config)?;
    let app = App::new(config);

    match cli.command {
        Some(Command::Register { username, password }) => {
            let user = app
                .ledger
                .register(&username, &SecretString::from(password))
                .await?;
            println!(
                "Registered {} (id={}). Log in with `walletbook login`.",
                user.username, user.user_id
            );
        }
        Some(Command::Login { username, password }) => {
            let user = app
                .ledger
                .login(&username, &SecretString::from(password))
                .await?;
            app.session
                .set(&SessionData {
                    user_id: user.user_id,
                    username: user.username.clone(),
                    logged_in_at: Some(chrono::Utc::now()),
                })
                .await?;
            println!("Logged in as {}", user.username);
        }
        Some(Command::Logout) => {
            if app.session.clear().await? {
                println!("Logged out");
            } else {
                println!("Not logged in");
            }
        }
        Some(Command::ShowPortfolio { base }) => {
            let user = app.current_user().await?;
            let valuation = app
                .ledger
                .portfolio_value(user.user_id, base.as_deref())
                .await?;
            println!("Portfolio of {} (base {}):", user.username, valuation.base);
            if valuation.lines.is_empty() {
                println!("  (no wallets)");
            }
            for line in &valuation.lines {
                match line.value_in_base {
                    Some(value) => println!(
                        "  {:<6} {:>20} -> {:>16.2} {}",
                        line.currency, line.balance, value, valuation.base
                    ),
                    None => println!(
                        "  {:<6} {:>20} -> {:>16} (no rate)",
                        line.currency, line.balance, "-"
                    ),
                }
            }
            println!("Total: {:.2} {}", valuation.total, valuation.base);
        }
        Some(Command::Buy { currency, amount }) => {
            let user = app.current_user().await?;
            let receipt = app.ledger.buy(&user, &currency, amount).await?;
            println!(
                "Bought {} {}: balance {} -> {}",
                receipt.amount, receipt.currency, receipt.balance_before, receipt.balance_after
            );
            if let Some(value) = receipt.estimated_value {
                println!("Estimated value: {:.2} {}", value, receipt.base);
            }
        }
        Some(Command::Sell { currency, amount }) => {
            let user = app.current_user().await?;
            let receipt = app.ledger.sell(&user, &currency, amount).await?;
            println!(
                "Sold {} {}: balance {} -> {}",
                receipt.amount, receipt.currency, receipt.balance_before, receipt.balance_after
            );
            if let Some(value) = receipt.estimated_value {
                println!("Estimated proceeds: {:.2} {}", value, receipt.base);
            }
        }
        Some(Command::GetRate { from, to }) => {
            let lookup = app.ledger.get_rate(&from, &to).await?;
            let quote = &lookup.quote;
            println!("{} -> {}: {}", quote.from, quote.to, quote.rate);
            if quote.rate != 0.0 {
                println!("{} -> {}: {}", quote.to, quote.from, 1.0 / quote.rate);
            }
            println!(
                "Updated: {}{}",
                timestamp(lookup.last_refresh),
                if lookup.stale { " (stale)" } else { "" }
            );
        }
        Some(Command::UpdateRates { source }) => {
            let store = app.ledger.rate_store();
            let providers = build_providers(&app.config, store.clock().clone());
            let updater = RateUpdater::new(providers, store)
                .with_empty_policy(app.config.rates.on_empty_update);
            let updater = match source {
                Some(name) => {
                    let name = name.to_ascii_lowercase();
                    let names = updater.provider_names().join(", ");
                    match updater.only(&name) {
                        Some(updater) => updater,
                        None => bail!("Unknown rate source {name:?}; expected one of: {names}"),
                    }
                }
                None => updater,
            };

            let report = updater.run_update().await?;
            for outcome in &report.outcomes {
                match &outcome.status {
                    ProviderStatus::Ok { rates } => {
                        println!("{}: OK ({rates} rates)", outcome.provider)
                    }
                    ProviderStatus::Failed { error } => {
                        println!("{}: FAILED ({error})", outcome.provider)
                    }
                }
            }
            if report.snapshot_replaced {
                println!(
                    "Wrote {} pairs; last refresh {}",
                    report.snapshot.pairs.len(),
                    timestamp(report.snapshot.last_refresh)
                );
            } else {
                println!("No rates fetched; previous snapshot kept");
            }
        }
        Some(Command::ShowRates {
            currency,
            top,
            base,
        }) => {
            let Some(snapshot) = app.ledger.rate_store().load_snapshot().await? else {
                println!("No cached rates; run `walletbook update-rates` first");
                return Ok(());
            };
            let base = base
                .as_deref()
                .map(CurrencyCode::parse)
                .transpose()?;
            let rows = snapshot.rows(&RateFilter {
                currency,
                top,
                base,
            });

            println!("Rates (last refresh {}):", timestamp(snapshot.last_refresh));
            if rows.is_empty() {
                println!("  (no matching pairs)");
            }
            for row in rows {
                let updated = row.updated_at.map(timestamp).unwrap_or_default();
                println!("  {:<12} {:>20} {}", row.pair.to_string(), row.rate, updated);
            }
        }
        Some(Command::Currencies { code }) => match code {
            Some(code) => println!("{}", app.ledger.get_currency(&code)?.display_info()),
            None => {
                for currency in app.ledger.registry().iter() {
                    println!("{}", currency.display_info());
                }
            }
        },
        Some(Command::Config) => {
            println!("Config file: {}", cli.config.display());
            println!("Data directory: {}", app.config.data_dir.display());
            println!("Base currency: {}", app.config.base_currency);
            println!("Snapshot: {}", app.config.snapshot_path().display());
            println!("History: {}", app.config.history_path().display());
            println!(
                "Rates TTL: {}",
                walletbook::duration::format_duration(app.config.rates.ttl)
            );
        }
        None => {
            println!("Walletbook - Currency Wallet Ledger");
            println!("===================================\n");
            println!("Config: {}", cli.config.display());
            println!("Data directory: {}\n", app.config.data_dir.display());
            println!("Run 'walletbook --help' for commands.");
        }
    }

    Ok(())
}
