use std::path::PathBuf;

use airss::{App, AppError, Config, Result};

const USAGE: &str = "Usage: airss [COMMAND]

Without a command the fetch and summarize jobs run until Ctrl-C.

Commands:
  --refresh                 Fetch all subscribed feeds once
  --summarize               Summarize stored articles once
  --subscribe <url> [name]  Subscribe to a feed and fetch it
  --unsubscribe <id>        Remove a subscription and its articles
  --rename <id> <name>      Rename a subscription
  --import <file.opml>      Import subscriptions from OPML
  --list                    List subscriptions
  --backfill                Re-link articles to their subscriptions
  --help                    Show this message";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    if matches!(args.first(), Some(&"--help") | Some(&"-h")) {
        println!("{USAGE}");
        return Ok(());
    }

    // Load configuration; invalid configuration is the only fatal startup error
    let config = Config::load()?;
    let app = App::new(&config).await?;

    match args.as_slice() {
        [] => app.run().await?,

        ["--refresh"] => {
            let stats = app.run_fetch_sweep().await?;
            println!(
                "Fetched {} feeds ({} failed), {} new articles",
                stats.sources_ok, stats.sources_failed, stats.new_articles
            );
        }

        ["--summarize"] => match app.run_summarize_sweep().await? {
            Some(stats) => println!(
                "Summarized {} of {} articles ({} failed)",
                stats.summarized, stats.pending, stats.failed
            ),
            None => println!("A summarize sweep is already running"),
        },

        ["--subscribe", url, rest @ ..] => {
            let name = (!rest.is_empty()).then(|| rest.join(" "));
            let sub = app.subscribe(url, name.as_deref()).await?;
            println!("Subscribed to {} ({})", sub.name, sub.url);
        }

        ["--unsubscribe", id] => match app.unsubscribe(parse_id(id)?).await? {
            Some(count) => println!("Subscription deleted, {count} articles removed"),
            None => println!("Subscription not found"),
        },

        ["--rename", id, name @ ..] if !name.is_empty() => {
            if app.rename_subscription(parse_id(id)?, &name.join(" ")).await? {
                println!("Subscription renamed");
            } else {
                println!("Subscription not found");
            }
        }

        ["--import", path] => {
            let path = PathBuf::from(path);
            let count = app.import_opml(&path).await?;
            println!("Imported {count} feeds from {path:?}");
        }

        ["--list"] => {
            for sub in app.subscriptions().await? {
                println!("{:>4}  {}  {}", sub.id, sub.name, sub.url);
            }
        }

        ["--backfill"] => {
            let (updated, skipped) = app.backfill_feed_refs().await?;
            println!("Updated {updated} articles, skipped {skipped}");
        }

        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn parse_id(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| AppError::Config(format!("invalid subscription id: {raw}")))
}
