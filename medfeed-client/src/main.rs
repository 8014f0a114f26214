//! medfeed - personalized medical literature feed client
//!
//! Loads the ranked feed, enriches every article with its AI summary and
//! takeaway in the background, and exposes the save / like / dislike /
//! saved-list actions of the backend.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medfeed_client::enrichment::{OnDemandOutcome, RenderedArticle};
use medfeed_client::{ApiClient, FeedSession};
use medfeed_common::api::{ArticleId, FeedQuery, FeedbackAction};
use medfeed_common::config::{default_config_path, write_toml_config, ConfigResolver, TomlConfig};
use medfeed_common::events::{EventBus, FeedEvent, NoticeSeverity};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medfeed", version, about = "Personalized medical literature feed")]
struct Cli {
    /// Config file (overrides MEDFEED_CONFIG and the per-user default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print articles as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the personalized feed and enrich it
    Feed {
        /// Number of articles (defaults to feed.k from config)
        #[arg(short, long)]
        k: Option<u32>,
        #[arg(long)]
        lambda: Option<f64>,
        #[arg(long)]
        w_sem: Option<f64>,
        #[arg(long)]
        w_bm25: Option<f64>,
        #[arg(long)]
        explain: bool,
        /// Print once after every enrichment fetch resolved
        #[arg(long)]
        wait: bool,
    },
    /// Search the literature and enrich the results
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        k: u32,
    },
    /// Fetch the summary for one article now
    Summary { id: String },
    Like { id: String },
    Dislike { id: String },
    /// Save an article from the current feed
    Save {
        id: String,
        /// Wait for the article's summary fetch so it is saved along with it
        #[arg(long)]
        enrich: bool,
    },
    /// List saved articles
    Saved,
    /// Remove a saved article
    Unsave { id: String },
    /// Show the account profile
    Me,
    /// Check backend health
    Health,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Config {
        action: ConfigAction::Init { path, force },
    } = &cli.command
    {
        return init_config(path.clone(), *force);
    }

    let config = ConfigResolver::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;
    init_logging(&config)?;
    debug!(api = %config.api_base_url, "Configuration loaded");

    let api = Arc::new(ApiClient::from_config(&config)?);
    let events = EventBus::new(config.feed.event_capacity);
    tokio::spawn(print_notices(events.subscribe()));
    let mut session = FeedSession::new(api.clone(), events, &config.feed);

    match cli.command {
        Command::Feed {
            k,
            lambda,
            w_sem,
            w_bm25,
            explain,
            wait,
        } => {
            let query = FeedQuery {
                k: Some(k.unwrap_or(config.feed.k)),
                lambda,
                w_sem,
                w_bm25,
                explain,
            };
            let (view, batch) = session.load_feed(&query).await?;
            if let Some(feed) = session.feed() {
                if feed.profile.has_profile && !feed.profile.specialty.is_empty() {
                    println!("Personalized for {}", feed.profile.specialty);
                }
            }

            if !wait {
                view.watch(|articles| {
                    let loading = articles.iter().filter(|a| a.is_loading()).count();
                    eprintln!("{}/{} summaries ready", articles.len() - loading, articles.len());
                    if loading == 0 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                })
                .await;
            }
            let report = batch.join().await;
            info!(?report, "Enrichment batch finished");
            print_articles(&view.render(), cli.json)?;
        }
        Command::Search { query, k } => {
            let (view, batch) = session.load_search(&query, k).await?;
            batch.join().await;
            print_articles(&view.render(), cli.json)?;
        }
        Command::Summary { id } => {
            let id = ArticleId::from(id);
            match session.request_summary(&id).await {
                OnDemandOutcome::Loaded(enrichment) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&enrichment)?);
                    } else {
                        if let Some(title) = &enrichment.resolved_title {
                            println!("{}", title);
                        }
                        if let Some(takeaway) = &enrichment.takeaway_html {
                            println!("\nTakeaway:\n{}", strip_tags(takeaway));
                        }
                        if let Some(summary) = &enrichment.summary_html {
                            println!("\nSummary:\n{}", strip_tags(summary));
                        }
                    }
                }
                OnDemandOutcome::NothingAvailable => println!("No summary available for {}", id),
                OnDemandOutcome::Failed(e) => bail!("Failed to load summary for {}: {}", id, e),
                OnDemandOutcome::AlreadyPending | OnDemandOutcome::Superseded => {}
            }
        }
        Command::Like { id } => {
            session.feedback(&ArticleId::from(id), FeedbackAction::Like).await?;
        }
        Command::Dislike { id } => {
            session
                .feedback(&ArticleId::from(id), FeedbackAction::Dislike)
                .await?;
        }
        Command::Save { id, enrich } => {
            let id = ArticleId::from(id);
            let (_view, batch) = session
                .load_feed(&FeedQuery::with_k(config.feed.k))
                .await?;
            if enrich {
                let enrichment = session.pipeline().settled(&id).await;
                debug!(article_id = %id, enriched = enrichment.is_some(), "Summary fetch settled");
            }
            // Save uses what is cached now; the rest of the batch keeps running
            batch.detach();
            let saved = session.save(&id).await?;
            println!("Saved: {}", saved.title);
        }
        Command::Saved => {
            let saved = api.get_saved_articles().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&saved.items)?);
            } else if saved.items.is_empty() {
                println!("No saved articles");
            } else {
                for item in &saved.items {
                    println!("{}  {}  ({})", item.pmid, item.title, item.ts);
                    if !item.takeaway_md.is_empty() {
                        println!("    {}", strip_tags(&item.takeaway_md));
                    }
                }
            }
        }
        Command::Unsave { id } => {
            api.delete_saved_article(&ArticleId::from(id.clone())).await?;
            println!("Removed {}", id);
        }
        Command::Me => {
            let me = api.get_me().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&me)?);
            } else {
                println!("{} (member since {})", me.email, me.created_at);
                match &me.profile {
                    Some(profile) => {
                        println!("Specialty: {}", profile.specialty);
                        if !profile.practice.is_empty() {
                            println!("Practice: {}", profile.practice);
                        }
                        if !profile.subinterests.is_empty() {
                            println!("Interests: {}", profile.subinterests.join(", "));
                        }
                    }
                    None => println!("No profile yet"),
                }
            }
        }
        Command::Health => {
            let health = api.health().await?;
            println!("{} (index: {})", health.status, health.index);
        }
        Command::Config {
            action: ConfigAction::Show,
        } => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Config {
            action: ConfigAction::Init { path, force },
        } => init_config(path, force)?,
    }

    // Let the notice printer drain what was emitted last
    tokio::task::yield_now().await;
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(default_config_path) {
        Some(path) => path,
        None => bail!("Could not determine a config directory; pass a path"),
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_toml_config(&TomlConfig::default(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn init_logging(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn print_notices(mut rx: tokio::sync::broadcast::Receiver<FeedEvent>) {
    loop {
        match rx.recv().await {
            Ok(FeedEvent::Notice {
                severity, message, ..
            }) => {
                let prefix = match severity {
                    NoticeSeverity::Info => "",
                    NoticeSeverity::Warning => "note: ",
                    NoticeSeverity::Error => "error: ",
                };
                eprintln!("{}{}", prefix, message);
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return,
        }
    }
}

fn print_articles(articles: &[RenderedArticle], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(articles)?);
        return Ok(());
    }
    if articles.is_empty() {
        println!("No articles found");
        return Ok(());
    }

    for (index, article) in articles.iter().enumerate() {
        println!("[{}] {}", index + 1, article.title);

        let mut meta = vec![format!("PMID {}", article.id)];
        if !article.journal.is_empty() {
            meta.push(article.journal.clone());
        }
        if !article.pub_date.is_empty() {
            meta.push(article.pub_date.clone());
        }
        if let Some(kind) = article.article_types.first() {
            meta.push(kind.clone());
        }
        println!("    {}", meta.join(" | "));

        match (&article.takeaway_html, &article.summary_html) {
            (Some(takeaway), _) => println!("    {}", strip_tags(takeaway)),
            (None, Some(summary)) => println!("    {}", strip_tags(summary)),
            (None, None) => println!("    (no summary, run `medfeed summary {}`)", article.id),
        }
        println!();
    }
    Ok(())
}

/// Crude HTML-to-text for terminal output
///
/// Drops tags and decodes the entities pulldown-cmark emits (`&lt;`, `&gt;`,
/// `&quot;`, `&amp;`) plus `&#39;` and `&nbsp;`. Other named or numeric
/// entities from backend-rendered HTML are printed as-is.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
