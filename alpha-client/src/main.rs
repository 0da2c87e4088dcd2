//! alpha CLI
//!
//! Watch the market feeds and drive the onboarding backend from a terminal.

use std::time::Duration;

use alpha_client::{
    airdrop::{format_quantity, DEFAULT_AIRDROP_PATH},
    api::{
        BackendClient, InitZkEmailRequest, OnboardBinanceRequest, VerifyZkEmailRequest,
        DEFAULT_API_BASE_URL,
    },
    stability::DEFAULT_STABILITY_PATH,
    airdrop_feed, embedded_wallet, stability_feed, AirdropFeed, EmbeddedWalletConfig, FeedState,
    PollingFeed, StabilityFeed,
};
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Onboarding backend base URL.
    #[arg(long, env = "ALPHA_API_BASE_URL", default_value = DEFAULT_API_BASE_URL, global = true)]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the stability feed, optionally re-polling until Ctrl-C.
    Stability(StabilityArgs),
    /// Print the airdrop feed, newest first.
    Airdrops(AirdropArgs),
    /// zk-email onboarding.
    #[command(subcommand)]
    ZkEmail(ZkEmailCommand),
    /// Onboard a Binance account onto a shadow smart account.
    Binance(BinanceArgs),
    /// Show the profile behind a bearer token.
    Me {
        #[arg(long, env = "ALPHA_TOKEN")]
        token: String,
    },
    /// Resolve the embedded smart-account wallet for an email.
    EmbeddedWallet {
        #[arg(long)]
        email: String,
    },
}

#[derive(Args)]
struct FeedSource {
    /// Full feed URL.
    #[arg(long)]
    url: Option<String>,
    /// Host serving the feeds at their default paths.
    #[arg(long, env = "ALPHA_FEED_BASE_URL")]
    feed_base_url: Option<String>,
}

impl FeedSource {
    fn resolve(self, default_path: &str) -> Result<String> {
        match (self.url, self.feed_base_url) {
            (Some(url), _) => Ok(url),
            (None, Some(base)) => Ok(format!("{}{}", base.trim_end_matches('/'), default_path)),
            (None, None) => bail!("pass --url or set ALPHA_FEED_BASE_URL"),
        }
    }
}

#[derive(Args)]
struct StabilityArgs {
    #[command(flatten)]
    source: FeedSource,
    /// Keep polling and print every update.
    #[arg(long)]
    watch: bool,
    #[arg(long, default_value_t = 7)]
    interval_secs: u64,
}

#[derive(Args)]
struct AirdropArgs {
    #[command(flatten)]
    source: FeedSource,
}

#[derive(Subcommand)]
enum ZkEmailCommand {
    /// Open a session and print its commitment.
    Init {
        #[arg(long)]
        email: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        salt: Option<String>,
    },
    /// Redeem a session with a proof.
    Verify {
        #[arg(long)]
        session_id: String,
        #[arg(long)]
        proof: String,
        #[arg(long)]
        nullifier: String,
        #[arg(long)]
        user_op_hash: String,
    },
}

#[derive(Args)]
struct BinanceArgs {
    #[arg(long, env = "BINANCE_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = "BINANCE_API_SECRET", hide_env_values = true)]
    api_secret: String,
    #[arg(long)]
    wallet: String,
    #[arg(long)]
    owner: String,
    #[arg(long)]
    salt: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alpha_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let http = reqwest::Client::new();
    let backend = BackendClient::with_http(&cli.api_url, http.clone());

    match cli.command {
        Commands::Stability(args) => {
            let interval = Duration::from_secs(args.interval_secs.max(1));
            let url = args.source.resolve(DEFAULT_STABILITY_PATH)?;
            let mut feed = stability_feed(http, url, interval);
            if args.watch {
                watch_stability(&mut feed).await;
            } else {
                let state = settled(&mut feed).await?;
                print_stability(&state);
            }
        }
        Commands::Airdrops(args) => {
            let url = args.source.resolve(DEFAULT_AIRDROP_PATH)?;
            let mut feed = airdrop_feed(http, url, true);
            let state = settled(&mut feed).await?;
            print_airdrops(&state);
        }
        Commands::ZkEmail(ZkEmailCommand::Init { email, owner, salt }) => {
            let response = backend
                .init_zk_email(&InitZkEmailRequest {
                    email,
                    owner_address: owner,
                    salt,
                })
                .await?;
            println!("session:    {}", response.session_id);
            println!("commitment: {}", response.email_commitment);
            println!("salt:       {}", response.salt);
        }
        Commands::ZkEmail(ZkEmailCommand::Verify {
            session_id,
            proof,
            nullifier,
            user_op_hash,
        }) => {
            let response = backend
                .verify_zk_email(&VerifyZkEmailRequest {
                    session_id,
                    proof,
                    nullifier,
                    user_op_hash,
                })
                .await?;
            println!("user:    {}", response.user_id);
            println!("wallet:  {}", response.aa_wallet_address);
            println!("token:   {}", response.token);
        }
        Commands::Binance(args) => {
            let response = backend
                .onboard_binance(&OnboardBinanceRequest {
                    api_key: args.api_key,
                    api_secret: args.api_secret,
                    binance_wallet_address: args.wallet,
                    owner_address: args.owner,
                    salt: args.salt,
                })
                .await?;
            println!("user:    {}", response.user_id);
            println!("wallet:  {}", response.aa_wallet_address);
            println!("token:   {}", response.token);
            for balance in &response.balances {
                println!(
                    "  {:<8} {:>18} available {:>18} locked",
                    balance.asset, balance.available, balance.locked
                );
            }
        }
        Commands::Me { token } => {
            let profile = backend.current_user(&token).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::EmbeddedWallet { email } => {
            let config = EmbeddedWalletConfig::from_env()?;
            let account = embedded_wallet(&config, &email).await?;
            println!("provider:    {}", account.client.kind());
            println!("account:     {:?}", account.address);
            println!("owner:       {:?}", account.client.owner().address());
            println!("entry point: {:?}", account.client.entry_point());
        }
    }

    Ok(())
}

/// Wait for the first completed fetch.
async fn settled<T>(feed: &mut PollingFeed<T>) -> Result<FeedState<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let Some(state) = feed.wait_for(|state| !state.loading).await else {
        bail!("feed stopped before its first fetch");
    };
    if let (None, Some(err)) = (&state.data, &state.error) {
        bail!("feed fetch failed: {err}");
    }
    Ok(state)
}

async fn watch_stability(feed: &mut PollingFeed<StabilityFeed>) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                feed.cancel();
                break;
            }
            state = feed.changed() => match state {
                Some(state) => print_stability(&state),
                None => break,
            },
        }
    }
}

fn print_stability(state: &FeedState<StabilityFeed>) {
    if let Some(err) = &state.error {
        eprintln!("feed error: {err}");
    }
    let Some(feed) = &state.data else {
        return;
    };
    let summary = feed.summary();
    println!(
        "stable {}  warning {}  unstable {}",
        summary.stable, summary.warning, summary.unstable
    );
    println!(
        "{:<10} {:<6} {:>20} {:>12} {:>8} {:>9}",
        "BASE", "QUOTE", "PRICE", "SPREAD", "4X DAYS", "STATUS"
    );
    for row in feed.rows() {
        println!(
            "{:<10} {:<6} {:>20} {:>12} {:>8} {:>9}",
            row.base, row.quote, row.price, row.spread, row.quadruple_days, row.status
        );
    }
}

fn print_airdrops(state: &FeedState<AirdropFeed>) {
    if let Some(err) = &state.error {
        eprintln!("feed error: {err}");
    }
    let Some(feed) = &state.data else {
        return;
    };
    let summary = feed.summary();
    println!(
        "ongoing {}  announced {}  completed {}  total {}",
        summary.ongoing, summary.announced, summary.completed, summary.total
    );
    println!(
        "{:<10} {:<20} {:<12} {:<8} {:>10} {:>14} {:<10}",
        "TOKEN", "NAME", "DATE", "TIME", "POINTS", "AMOUNT", "STATUS"
    );
    for item in &feed.airdrops {
        println!(
            "{:<10} {:<20} {:<12} {:<8} {:>10} {:>14} {:<10}",
            item.token,
            item.name.as_deref().unwrap_or("-"),
            item.date.as_deref().unwrap_or("-"),
            item.time.as_deref().unwrap_or("-"),
            format_quantity(item.points.as_ref()),
            format_quantity(item.amount.as_ref()),
            item.status()
        );
    }
}
