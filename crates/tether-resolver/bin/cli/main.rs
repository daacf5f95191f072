mod cli;

use crate::cli::{CacheBackendArg, Command, LogFormatArg, StorageBackendArg, CLI};
use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tether_cache::{MokaKvCache, RedisKvCache};
use tether_core::{KvCache, LinkStore};
use tether_resolver::ResolutionService;
use tether_storage::{InMemoryStore, MySqlStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);

    info!(
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        "starting tether"
    );

    let cache = match config.cache {
        CacheBackendArg::Moka => Cache::Moka(MokaKvCache::new()),
        CacheBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .ok_or("redis url is required when cache backend is redis")?;
            Cache::Redis(RedisKvCache::connect(redis_url).await?)
        }
    };

    match config.storage {
        StorageBackendArg::InMemory => {
            run_with_cache(config.command, &config.base_url, InMemoryStore::new(), cache).await
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .ok_or("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlStore::connect(mysql_dsn).await?;
            run_with_cache(config.command, &config.base_url, store, cache).await
        }
    }
}

enum Cache {
    Moka(MokaKvCache),
    Redis(RedisKvCache),
}

fn init_tracing(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => subscriber.init(),
        LogFormatArg::Json => subscriber.json().init(),
    }
}

async fn run_with_cache<S: LinkStore>(
    command: Command,
    base_url: &str,
    store: S,
    cache: Cache,
) -> Result<ExitCode, Box<dyn Error>> {
    match cache {
        Cache::Moka(cache) => run(command, base_url, store, cache).await,
        Cache::Redis(cache) => run(command, base_url, store, cache).await,
    }
}

async fn run<S: LinkStore, C: KvCache>(
    command: Command,
    base_url: &str,
    store: S,
    cache: C,
) -> Result<ExitCode, Box<dyn Error>> {
    let service = ResolutionService::new(store, cache);
    let outcome = execute(&service, command, base_url).await;
    service.shutdown().await;
    outcome
}

async fn execute<S: LinkStore, C: KvCache>(
    service: &ResolutionService<S, C>,
    command: Command,
    base_url: &str,
) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Command::Create {
            target,
            alias,
            description,
        } => {
            let link = service
                .create(&target, alias.as_deref(), description)
                .await?;
            println!("{}", link.code.to_url(base_url));
        }
        Command::Resolve { code } => match service.resolve(&code).await? {
            Some(target) => println!("{target}"),
            None => return Ok(not_found(&code)),
        },
        Command::Info { code } => match service.get_link_info(&code).await? {
            Some(link) => println!("{}", serde_json::to_string_pretty(&link)?),
            None => return Ok(not_found(&code)),
        },
        Command::Available { code } => {
            let available = service.is_available(&code).await?;
            println!("{}", if available { "available" } else { "taken" });
        }
        Command::Stats => {
            let stats = service.get_system_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Hot { min_access_count } => {
            let links = service.get_hot_links(min_access_count).await?;
            println!("{}", serde_json::to_string_pretty(&links)?);
        }
        Command::Created { start, end } => {
            let links = service.get_links_created_between(start, end).await?;
            println!("{}", serde_json::to_string_pretty(&links)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn not_found(code: &str) -> ExitCode {
    eprintln!("short code not found: {code}");
    ExitCode::from(1)
}
