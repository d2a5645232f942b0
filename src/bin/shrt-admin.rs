use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shrt::codec::CodeCodec;
use shrt::config::Config;
use shrt::models::{NewUrlEntry, UrlEntry};
use shrt::service::Services;
use shrt::storage;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shrt-admin")]
#[command(about = "shrt operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a URL, reusing a live entry for the same URL if one exists
    Shorten {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Expiry as Unix seconds
        #[arg(long)]
        expires_at: Option<i64>,
    },
    /// Show where a code leads without recording a click
    Info { code: String },
    /// Show counters and liveness for a code
    Stats { code: String },
    /// Disable a code (it can be reactivated later)
    Deactivate { code: String },
    /// Re-enable a disabled code
    Reactivate { code: String },
    /// List entries, newest first
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        /// Only show entries with an id below this one
        #[arg(long)]
        before_id: Option<i64>,
    },
    /// Show recent clicks for a code
    Clicks {
        code: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn print_entry(config: &Config, entry: &UrlEntry) {
    println!("Short URL:   {}", config.short_url(&entry.short_code));
    println!("Target:      {}", entry.original_url);
    if let Some(title) = &entry.title {
        println!("Title:       {}", title);
    }
    if let Some(description) = &entry.description {
        println!("Description: {}", description);
    }
    println!("Active:      {}", entry.is_active);
    println!("Clicks:      {}", entry.click_count);
    println!("Created:     {}", format_ts(entry.created_at));
    if let Some(expires_at) = entry.expires_at {
        println!("Expires:     {}", format_ts(expires_at));
    }
    if let Some(last) = entry.last_accessed_at {
        println!("Last click:  {}", format_ts(last));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database).await?;
    let codec = Arc::new(
        CodeCodec::new(&config.codec.salt, config.codec.min_length)
            .context("invalid codec configuration")?,
    );
    let services = Services::new(storage, codec);

    match cli.command {
        Commands::Shorten {
            url,
            title,
            description,
            expires_at,
        } => {
            let (entry, created) = services
                .shortener
                .shorten(NewUrlEntry {
                    original_url: url,
                    title,
                    description,
                    expires_at,
                    created_by_ip: None,
                })
                .await?;
            if created {
                println!("✓ Created {}", config.short_url(&entry.short_code));
            } else {
                println!("✓ Reusing {}", config.short_url(&entry.short_code));
            }
        }
        Commands::Info { code } => {
            let entry = services.resolver.info(&code).await?;
            print_entry(&config, &entry);
        }
        Commands::Stats { code } => {
            let stats = services.resolver.stats(&code).await?;
            print_entry(&config, &stats.entry);
            println!("Expired:     {}", stats.is_expired);
        }
        Commands::Deactivate { code } => {
            services.admin.set_active(&code, false).await?;
            println!("✓ Deactivated '{}'", code);
        }
        Commands::Reactivate { code } => {
            services.admin.set_active(&code, true).await?;
            println!("✓ Reactivated '{}'", code);
        }
        Commands::List { limit, before_id } => {
            let page = services.admin.list(limit, before_id).await?;
            if page.entries.is_empty() {
                println!("No entries found.");
            } else {
                println!("{:<8} {:<12} {:<8} {:<8} {}", "ID", "Code", "Active", "Clicks", "URL");
                println!("{}", "-".repeat(80));
                for entry in &page.entries {
                    println!(
                        "{:<8} {:<12} {:<8} {:<8} {}",
                        entry.id, entry.short_code, entry.is_active, entry.click_count, entry.original_url
                    );
                }
                if let Some(next) = page.next_before_id {
                    println!("\nMore entries: --before-id {}", next);
                }
            }
        }
        Commands::Clicks { code, limit } => {
            let clicks = services.admin.clicks(&code, limit).await?;
            if clicks.is_empty() {
                println!("No clicks recorded for '{}'.", code);
            } else {
                println!("{:<27} {:<40} {}", "Time", "IP", "Referer");
                println!("{}", "-".repeat(80));
                for click in clicks {
                    println!(
                        "{:<27} {:<40} {}",
                        format_ts(click.clicked_at),
                        click.ip_address.as_deref().unwrap_or("-"),
                        click.referer.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    Ok(())
}
