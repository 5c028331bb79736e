use clap::Parser;
use nf_core::{Article, HomeFeed, Result, Store};
use nf_web::{create_app, cors_layer, AppState};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;
        let overflow = || format!("Duration too large: {}", s);

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if !current_number.is_empty() {
                let num = current_number.parse::<u64>().map_err(|_| overflow())?;
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(overflow)?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A trailing bare number counts as seconds
        if !current_number.is_empty() {
            let num = current_number.parse::<u64>().map_err(|_| overflow())?;
            total_seconds = total_seconds.checked_add(num).ok_or_else(overflow)?;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Content feed backend", long_about = None)]
pub struct Cli {
    /// Storage backend: sqlite or memory
    #[arg(long, env = "NF_STORAGE", default_value = "sqlite")]
    storage: String,
    #[arg(long, env = "NF_DATABASE_URL", default_value = nf_storage::DEFAULT_DATABASE_URL)]
    database_url: String,
    /// How far back an article counts as recent on the home feed (e.g. 24h, 1d12h)
    #[arg(long, default_value = "24h")]
    window: HumanDuration,
    /// Recent articles added to the home feed regardless of category
    #[arg(long, default_value_t = nf_core::feed::DEFAULT_TOP_OVERALL)]
    top_overall: usize,
    /// Size of the home feed when nothing recent exists
    #[arg(long, default_value_t = nf_core::feed::DEFAULT_FALLBACK_LIMIT)]
    fallback_limit: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "NF_BIND", default_value = "0.0.0.0:8007")]
        bind: String,
        /// Allowed CORS origin; repeat for several. Any origin when omitted.
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
    /// Print the current home feed as JSON
    Home,
    /// Load articles from a JSON array into the store
    Import {
        file: PathBuf,
    },
}

impl Cli {
    fn home_feed(&self) -> Result<HomeFeed> {
        let window = chrono::Duration::from_std(self.window.0)
            .map_err(|e| nf_core::Error::InvalidInput(format!("Window out of range: {}", e)))?;
        Ok(HomeFeed {
            window,
            top_overall: self.top_overall,
            fallback_limit: self.fallback_limit,
        })
    }
}

async fn serve(storage: Arc<dyn Store>, home_feed: HomeFeed, bind: &str, cors_origins: &[String]) -> Result<()> {
    let state = AppState::new(storage).with_home_feed(home_feed);
    let app = create_app(state, cors_layer(cors_origins));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("🌐 Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn print_home_feed(storage: Arc<dyn Store>, home_feed: &HomeFeed) -> Result<()> {
    let mut reader = storage.reader().await?;
    let articles = home_feed.select(&mut *reader, chrono::Utc::now()).await?;
    drop(reader);
    println!("{}", serde_json::to_string_pretty(&articles)?);
    Ok(())
}

async fn import_articles(storage: Arc<dyn Store>, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file).await?;
    let articles: Vec<Article> = serde_json::from_str(&raw)?;
    for article in &articles {
        storage.store_article(article).await?;
    }
    info!("📥 Imported {} articles from {}", articles.len(), file.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let home_feed = cli.home_feed()?;

    info!("💾 Opening {} storage...", cli.storage);
    let storage = nf_storage::create_storage(&cli.storage, Some(cli.database_url.as_str())).await?;

    match cli.command {
        Commands::Serve { ref bind, ref cors_origins } => serve(storage, home_feed, bind, cors_origins).await,
        Commands::Home => print_home_feed(storage, &home_feed).await,
        Commands::Import { ref file } => import_articles(storage, file).await,
    }
}
