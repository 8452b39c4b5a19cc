use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use poke::{
    Config, FeedStore, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient,
    SharedProgressReporter, SubscribeOutcome, SyncContext, list_subscriptions, logging,
    run_periodic, subscribe, sync_once, unsubscribe,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");

/// A command line podcast client to subscribe to and download podcasts
#[derive(Parser, Debug)]
#[command(name = "poke")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a podcast
    Sub {
        /// The URL of the RSS source
        url: String,
    },

    /// List all channels subscribed
    #[command(visible_alias = "ls")]
    List,

    /// Unsubscribe from a podcast
    #[command(visible_alias = "us")]
    Unsub {
        /// The index of the podcast to be unsubscribed, as shown by `list`
        index: usize,
    },

    /// Download new episodes, then keep polling
    #[command(visible_alias = "up")]
    Update {
        /// Run as debug mode
        #[arg(long)]
        debug: bool,

        /// Run a single pass instead of polling forever
        #[arg(long)]
        once: bool,

        /// Quiet mode - suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let main_bar = ProgressBar::new_spinner();
        main_bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {wide_msg}")
                .expect("valid template"),
        );
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn with_download_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.download_bar.lock()
            && let Some(bar) = guard.as_ref()
        {
            f(bar);
        }
    }

    fn take_download_bar(&self) -> Option<ProgressBar> {
        self.download_bar.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { title, url } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}{} {}",
                    title.bold(),
                    url.cyan()
                ));
            }

            ProgressEvent::FeedFailed { title, error } => {
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    title.red().bold(),
                    error.red()
                ));
            }

            ProgressEvent::FeedParsed {
                title,
                total_items,
                new_items,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} items total, {} new",
                    title.bold().green(),
                    total_items.to_string().cyan(),
                    new_items.to_string().yellow()
                ));
            }

            ProgressEvent::ItemSkipped { item_title, reason } => {
                self.main_bar.println(format!(
                    "  {SKIP}{} - {}",
                    truncate_title(&item_title, 40).dimmed(),
                    reason.dimmed()
                ));
            }

            ProgressEvent::DownloadStarting {
                item_title,
                index,
                total,
                content_length,
            } => {
                let bar = ProgressBar::new(content_length.unwrap_or(0));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(&format!(
                            "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
                        ))
                        .expect("valid template")
                        .progress_chars("█▓░"),
                );
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&item_title, 40)
                ));
                if let Ok(mut guard) = self.download_bar.lock() {
                    *guard = Some(bar);
                }
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.with_download_bar(|bar| {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                });
            }

            ProgressEvent::DownloadCompleted { item_title, .. } => {
                if let Some(bar) = self.take_download_bar() {
                    bar.finish_and_clear();
                }
                self.main_bar.println(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&item_title, 60).green()
                ));
            }

            ProgressEvent::DownloadFailed { item_title, error } => {
                if let Some(bar) = self.take_download_bar() {
                    bar.finish_and_clear();
                }
                self.main_bar.println(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&item_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.main_bar.println(format!(
                    "  Removed {} incomplete download(s)",
                    count.to_string().yellow()
                ));
            }

            ProgressEvent::SubscriptionSynced { .. } => {}

            ProgressEvent::PassCompleted {
                subscriptions,
                downloaded,
                skipped,
                failed,
            } => {
                self.main_bar.set_message("");
                self.main_bar.println(format!(
                    "\n{PARTY}{} {} podcasts, {} downloaded, {} skipped, {} failed\n",
                    "Update complete:".bold().green(),
                    subscriptions.to_string().cyan(),
                    downloaded.to_string().green().bold(),
                    skipped.to_string().yellow(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                ));
            }
        }
    }
}

impl Drop for IndicatifReporter {
    fn drop(&mut self) {
        self.main_bar.finish_and_clear();
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

const LIST_TITLE_WIDTH: usize = 30;
const LIST_DESCRIPTION_WIDTH: usize = 40;

/// Keep the first `limit` chars, marking a cut with "..."
fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let kept: String = text.chars().take(limit).collect();
        format!("{kept}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("Failed to load configuration")?;
    config
        .ensure_dirs()
        .context("Failed to create poke directories")?;

    let debug = matches!(args.command, Command::Update { debug: true, .. });
    logging::init(&config.log_dir(), debug).map_err(|e| anyhow!(e))?;

    let mut store = FeedStore::load(config.store_path()).context("Failed to load feed store")?;

    match args.command {
        Command::Sub { url } => cmd_sub(&config, &mut store, &url).await,
        Command::List => {
            cmd_list(&store);
            Ok(())
        }
        Command::Unsub { index } => cmd_unsub(&mut store, index),
        Command::Update { once, quiet, .. } => cmd_update(config, &mut store, once, quiet).await,
    }
}

async fn cmd_sub(config: &Config, store: &mut FeedStore, url: &str) -> Result<()> {
    if store.contains_url(url) {
        println!("'{}' has already been subscribed to.", url.yellow());
        return Ok(());
    }

    println!("{SEARCH}Checking for {}...", url.cyan());
    let client = ReqwestClient::new(config).context("Failed to build HTTP client")?;

    match subscribe(&client, config, store, url)
        .await
        .context("Subscribe failed")?
    {
        SubscribeOutcome::AlreadySubscribed => {
            println!("'{}' has already been subscribed to.", url.yellow());
        }
        SubscribeOutcome::Subscribed(subscription) => {
            println!("{SUCCESS}{}", "Subscribed successfully!".bold().green());
            println!("  Title:       {}", subscription.title.bold());
            if let Some(updated) = subscription.updated {
                println!("  Update time: {updated}");
            }
            println!("  Link:        {}", subscription.link.cyan());
            println!(
                "  Description: {}",
                html_escape::decode_html_entities(&subscription.description)
            );
        }
    }
    Ok(())
}

fn cmd_list(store: &FeedStore) {
    println!(
        "{}",
        format!("{:<5}{:<33}{:<43}", "No", "title", "description").bold()
    );
    for (i, subscription) in list_subscriptions(store).iter().enumerate() {
        let description = html_escape::decode_html_entities(&subscription.description);
        println!(
            "{:<5}{:<33}{:<43}",
            i + 1,
            clip(&subscription.title, LIST_TITLE_WIDTH),
            clip(description.trim(), LIST_DESCRIPTION_WIDTH)
        );
    }
}

fn cmd_unsub(store: &mut FeedStore, index: usize) -> Result<()> {
    let removed = unsubscribe(store, index)?;
    println!(
        "Unsubscribed from podcast {}: {}",
        index.to_string().cyan(),
        removed.title.bold()
    );
    Ok(())
}

async fn cmd_update(config: Config, store: &mut FeedStore, once: bool, quiet: bool) -> Result<()> {
    if !quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "poke".bold().magenta(),
            "- Podcast Updater".dimmed()
        );
    }

    let client = ReqwestClient::new(&config).context("Failed to build HTTP client")?;
    let reporter: SharedProgressReporter = if quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };
    let ctx = SyncContext::new(client, config, reporter);

    if once {
        let pass = sync_once(&ctx, store).await.context("Update failed")?;
        if pass.failed() > 0 && pass.downloaded() == 0 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    run_periodic(&ctx, store, cancel)
        .await
        .context("Update failed")?;
    Ok(())
}
