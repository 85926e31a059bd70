//! tsat-supply CLI: serve the circulating supply over HTTP, or compute it once.

mod server;

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tsat_supply::config::{
    DEFAULT_CACHE_KEY, DEFAULT_CACHE_TTL_SECS, DEFAULT_DECIMALS, DEFAULT_FALLBACK_TTL_SECS,
    DEFAULT_TOTAL_SUPPLY,
};
use tsat_supply::{
    ConfigResolver, HttpTransport, RequestHandler, ResponseFormat, ResultCache, RpcClient,
    SqliteStore, SupplySettings,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => run_serve(args),
        Command::Query(args) => run_query(args),
    }
}

#[derive(Parser)]
#[command(name = "tsat-supply")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Circulating supply for TSAT: total issuance minus the pool-locked balance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the supply endpoint over HTTP.
    Serve(ServeArgs),
    /// Compute (or read from cache) once and print the response body.
    Query(QueryArgs),
}

#[derive(Args)]
struct SupplyArgs {
    /// Owner address of the pool's token account.
    #[arg(long, env = "TSAT_POOL_ADDRESS")]
    pool_address: String,
    /// TSAT token mint address.
    #[arg(long, env = "TSAT_TOKEN_MINT")]
    token_mint: String,
    #[arg(long, env = "TSAT_DECIMALS", default_value_t = DEFAULT_DECIMALS)]
    decimals: u32,
    /// Total issuance in whole tokens.
    #[arg(long, env = "TSAT_TOTAL_SUPPLY", default_value_t = DEFAULT_TOTAL_SUPPLY)]
    total_supply: u64,
    #[arg(long, env = "TSAT_CACHE_TTL_SECS", default_value_t = DEFAULT_CACHE_TTL_SECS)]
    cache_ttl_secs: u64,
    #[arg(long, env = "TSAT_FALLBACK_TTL_SECS", default_value_t = DEFAULT_FALLBACK_TTL_SECS)]
    fallback_ttl_secs: u64,
    #[arg(long, default_value = "./data/cache")]
    cache_dir: PathBuf,
    /// Config file tried before every default location.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory the default config locations are relative to (default: the executable's directory).
    #[arg(long)]
    base_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct ServeArgs {
    #[command(flatten)]
    supply: SupplyArgs,
    #[arg(long, env = "TSAT_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

#[derive(Parser)]
struct QueryArgs {
    #[command(flatten)]
    supply: SupplyArgs,
    /// `json` for the full result object; anything else prints the bare number.
    #[arg(long)]
    format: Option<String>,
}

type Handler = RequestHandler<HttpTransport, SqliteStore>;

fn cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("supply_cache.sqlite")
}

fn service_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `--config` first, then `TSAT_SUPPLY_CONFIG`, then the default locations under `base_dir`.
fn config_resolver(base_dir: &Path, config: Option<PathBuf>) -> ConfigResolver {
    let resolver = ConfigResolver::from_env(base_dir);
    match config {
        Some(path) => resolver.with_candidate(path),
        None => resolver,
    }
}

fn build_handler(args: SupplyArgs) -> Result<Handler, Box<dyn std::error::Error>> {
    let base_dir = args.base_dir.unwrap_or_else(service_dir);
    let resolver = config_resolver(&base_dir, args.config);
    let store = SqliteStore::open(cache_path(&args.cache_dir))?;
    let settings = SupplySettings {
        decimals: args.decimals,
        total_supply: args.total_supply,
        cache_key: DEFAULT_CACHE_KEY.to_string(),
        cache_ttl: Duration::from_secs(args.cache_ttl_secs),
        fallback_ttl: Duration::from_secs(args.fallback_ttl_secs),
        ..SupplySettings::new(args.pool_address, args.token_mint)
    };
    info!(
        pool = %settings.pool_address,
        mint = %settings.token_mint,
        total_supply = settings.total_supply,
        candidates = resolver.candidates().len(),
        "supply handler configured"
    );
    Ok(RequestHandler::new(
        resolver,
        RpcClient::http()?,
        ResultCache::new(store, settings.fallback_ttl),
        settings,
    ))
}

fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let handler = Arc::new(build_handler(args.supply)?);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::serve(handler, args.bind))?;
    Ok(())
}

fn run_query(args: QueryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let handler = build_handler(args.supply)?;
    let format = ResponseFormat::from_query(args.format.as_deref());
    let rt = tokio::runtime::Runtime::new()?;
    let res = rt.block_on(async { handler.handle("GET", format).await });
    info!(
        status = res.status,
        attempts = handler.rpc().attempt_count(),
        "query complete"
    );
    println!("{}", res.body);
    Ok(())
}
