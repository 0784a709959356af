use chrono::Utc;
use clap::Parser;
use flickrank::api::{FlickrClient, HttpTransport};
use flickrank::cache::PhotoCache;
use flickrank::config::{self, AppConfig};
use flickrank::fetch::DetailFetchPipeline;
use flickrank::oauth::{AuthorizationFlow, BrowserLauncher, SystemBrowser};
use flickrank::output;
use flickrank::rank::{self, Filter, RankBy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flickrank")]
#[command(version)]
#[command(about = "Rank your Flickr photos by views, favorites and view rate")]
#[command(long_about = "\
Rank your Flickr photos by views, favorites and view rate

Lists every photo of a Flickr user, fetches view and favorite counts, and
prints the most popular ones.

First run:
  flickrank --key <API key> --secret <API secret> --user <your screen name>

This opens a browser to grant read access; the resulting token, together
with the API key, is stored in ~/.flickrank.toml. Later runs need no flags:

  flickrank                 # rank your own photos
  flickrank SomeoneElse     # rank another user's public photos

Photo details are cached in ~/.flickrank_cache for an hour, so re-ranking
with different filters is instant.")]
struct Cli {
    /// Screen name whose photos to rank (default: the authorized user)
    target: Option<String>,

    /// Your Flickr screen name; changing it discards the stored token
    #[arg(long)]
    user: Option<String>,

    /// Flickr API key (stored in the config file)
    #[arg(long)]
    key: Option<String>,

    /// Flickr API secret (stored in the config file)
    #[arg(long)]
    secret: Option<String>,

    /// Discard the stored access token and authorize again
    #[arg(long)]
    refresh: bool,

    /// Ignore cached photo details and fetch everything
    #[arg(long)]
    no_cache: bool,

    /// Concurrent detail fetches (default from config: 20)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Minimum age in days
    #[arg(long, default_value_t = 60)]
    min_days: i64,

    /// Maximum age in days
    #[arg(long)]
    max_days: Option<i64>,

    /// Minimum total views
    #[arg(long, default_value_t = 1000)]
    min_views: u64,

    /// Show the top N photos of each ranking
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Rank only by these measures (repeatable; default: all four)
    #[arg(long, value_enum)]
    by: Vec<RankBy>,

    /// Open each selected photo in the browser
    #[arg(short, long)]
    open: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Photo cache file
    #[arg(long)]
    cache: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .or_else(config::default_config_path)
        .ok_or("cannot locate the home directory; pass --config")?;
    let cache_path = cli
        .cache
        .clone()
        .or_else(config::default_cache_path)
        .ok_or("cannot locate the home directory; pass --cache")?;

    let mut app = AppConfig::load(&config_path)?;
    let mut changed = false;
    if cli.refresh {
        app.credential.clear_access();
    }
    if let Some(user) = &cli.user {
        changed |= app.credential.set_username(user);
    }
    if let Some(key) = &cli.key {
        app.credential.consumer_key = key.clone();
        changed = true;
    }
    if let Some(secret) = &cli.secret {
        app.credential.consumer_secret = secret.clone();
        changed = true;
    }
    let consumer = app
        .credential
        .consumer()
        .ok_or("no API key configured; pass --key and --secret once to store them")?;

    let transport = HttpTransport::new(app.http_timeout())?;

    if !app.credential.username.is_empty() && app.credential.access_token().is_none() {
        println!(
            "==> Authorizing {} (approve read access in the browser)",
            app.credential.username
        );
        let grant = AuthorizationFlow::new(consumer.clone(), &transport, &SystemBrowser)
            .with_verifier_timeout(app.verifier_timeout())
            .run()?;
        println!("==> Welcome, {} ({})", grant.username, grant.user_nsid);
        app.credential.apply_grant(&grant);
        changed = true;
    }
    if changed {
        app.save(&config_path)?;
    }

    let client = FlickrClient::new(&transport, consumer, app.credential.access_token());
    if client.is_authorized() {
        let user = client.test_login()?;
        tracing::debug!(nsid = user.nsid(), "access token accepted");
    }

    let target = cli
        .target
        .clone()
        .or_else(|| Some(app.credential.username.clone()).filter(|u| !u.is_empty()))
        .ok_or("must supply a user name to query")?;
    let user_id = match &app.credential.user_nsid {
        Some(nsid) if target == app.credential.username => nsid.clone(),
        _ => client.find_user_nsid(&target)?,
    };

    println!("==> Listing photos of {}", target);
    let photos = client.search_all(&user_id)?;
    println!("{}", output::format_found(photos.len()));
    let ids: Vec<String> = photos.into_iter().map(|p| p.id).collect();

    let mut cache = if cli.no_cache {
        PhotoCache::empty()
    } else {
        PhotoCache::load(&cache_path)
    };
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_fetch_event(&event) {
                println!("{}", line);
            }
        }
    });
    let outcome = DetailFetchPipeline::new(&client, &mut cache, app.cache_ttl())
        .with_events(tx)
        .fetch(&ids, app.effective_workers(cli.workers));
    printer.join().map_err(|_| "progress printer panicked")?;
    let outcome = outcome?;
    println!("{}", output::format_fetch_summary(&outcome.stats));
    if cache.flush(&cache_path)? {
        tracing::debug!(entries = cache.len(), "cache written");
    }

    let details = outcome.into_complete()?;
    let now = Utc::now().timestamp();
    let filter = Filter {
        min_days: cli.min_days,
        max_days: cli.max_days.unwrap_or(i64::MAX),
        min_views: cli.min_views,
    };
    let selected = rank::select(rank::filter(details, &filter, now), &cli.by, cli.top, now);
    output::print_ranking(&selected, now);

    if cli.open {
        for url in selected.iter().filter_map(|p| p.url.as_deref()) {
            if let Err(e) = SystemBrowser.launch(url) {
                tracing::warn!(%url, error = %e, "could not open browser");
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise info, or debug with `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "flickrank=debug"
    } else {
        "flickrank=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
