//! Stock Signals - EMA crossover + RSI signals and market-cap rankings for equities
//!
//! Usage:
//!   stock-signals serve --port 3001        - Launch the JSON API server
//!   stock-signals analyze AAPL             - Print the signal table for a ticker
//!   stock-signals top --limit 20           - Print the market-cap ranking

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    analyze_signals, load_tickers, take_snapshot, IndicatorRow, IndicatorSeries,
    MarketSnapshot, SignalConfig, SignalError, YahooClient, DEFAULT_CONCURRENCY,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_TICKERS_PATH: &str = "data/sp100.txt";
const DEFAULT_RANGE: &str = "6mo";
const DEFAULT_INTERVAL: &str = "1d";

#[derive(Parser)]
#[command(name = "stock-signals")]
#[command(about = "EMA crossover + RSI signals and market-cap rankings for equities", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the JSON API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Fetch a ticker's history and print its signal table
    Analyze {
        /// Ticker symbol, e.g. AAPL
        symbol: String,
        /// History range (1mo, 6mo, 1y, 5y, ...)
        #[arg(long, default_value = DEFAULT_RANGE)]
        range: String,
        /// Bar interval (1d, 1wk, 1h, ...)
        #[arg(long, default_value = DEFAULT_INTERVAL)]
        interval: String,
        /// Fast EMA span
        #[arg(long, default_value_t = 12)]
        ema_short: usize,
        /// Slow EMA span
        #[arg(long, default_value_t = 26)]
        ema_long: usize,
        /// RSI smoothing span
        #[arg(long, default_value_t = 14)]
        rsi_period: usize,
        /// Sell signals require RSI above this
        #[arg(long, default_value_t = 30.0)]
        rsi_buy: f64,
        /// Buy signals require RSI below this
        #[arg(long, default_value_t = 70.0)]
        rsi_sell: f64,
        /// Also print every bar, not just the signals
        #[arg(long)]
        all: bool,
    },
    /// Snapshot the ticker universe and print it ranked by market cap
    Top {
        /// Number of rows to print
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Tickers fetched concurrently
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

#[derive(Clone)]
struct AppState {
    yahoo: Arc<YahooClient>,
    tickers_path: Arc<PathBuf>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,stock_signals=debug")
    } else {
        EnvFilter::new("info,engine=info,stock_signals=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn yahoo_client() -> anyhow::Result<YahooClient> {
    match std::env::var("STOCK_SIGNALS_YAHOO_URL") {
        Ok(url) => YahooClient::with_base_url(&url),
        Err(_) => YahooClient::new(),
    }
}

fn tickers_path() -> PathBuf {
    std::env::var("STOCK_SIGNALS_TICKERS_PATH")
        .unwrap_or_else(|_| DEFAULT_TICKERS_PATH.to_string())
        .into()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Analyze {
            symbol,
            range,
            interval,
            ema_short,
            ema_long,
            rsi_period,
            rsi_buy,
            rsi_sell,
            all,
        } => {
            let config = SignalConfig {
                ema_short_period: ema_short,
                ema_long_period: ema_long,
                rsi_period,
                rsi_buy_threshold: rsi_buy,
                rsi_sell_threshold: rsi_sell,
            };
            cmd_analyze(&symbol, &range, &interval, config, all).await?;
        }
        Commands::Top { limit, concurrency } => {
            cmd_top(limit, concurrency).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command - Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Stock Signals v{} starting...", APP_VERSION);

    let tickers_path = tickers_path();
    let state = AppState {
        yahoo: Arc::new(yahoo_client()?),
        tickers_path: Arc::new(tickers_path.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Determine static files directory
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        PathBuf::from("dist")
    };

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/signals", get(api_signals))
        .route("/top100", get(api_top100))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Stock Signals v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/signals?symbol=AAPL - EMA/RSI series and signal table");
    println!("  GET  /api/top100              - Ticker universe ranked by market cap");
    println!("\n  Tickers: {}", tickers_path.display());
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Analyze command - CLI signal table
// ============================================================================

async fn cmd_analyze(
    symbol: &str,
    range: &str,
    interval: &str,
    config: SignalConfig,
    all: bool,
) -> anyhow::Result<()> {
    println!("\n=== Stock Signals v{} ===", APP_VERSION);
    println!(
        "Symbol: {} | Range: {} | Interval: {} | EMA {}/{} | RSI {} ({}/{})",
        symbol,
        range,
        interval,
        config.ema_short_period,
        config.ema_long_period,
        config.rsi_period,
        config.rsi_buy_threshold,
        config.rsi_sell_threshold,
    );

    let bars = yahoo_client()?.get_chart(symbol, range, interval).await?;
    let series = analyze_signals(&bars, &config)?;

    if all {
        print_rows(series.rows(), &series);
    }

    let table = series.signal_table();
    if table.is_empty() {
        println!("\nNo signals in {} bars.", series.len());
        return Ok(());
    }
    println!("\n{} signals in {} bars:", table.len(), series.len());
    print_rows(&table, &series);

    Ok(())
}

fn print_rows(rows: &[IndicatorRow], series: &IndicatorSeries) {
    let config = series.config();
    let short_label = format!("EMA{}", config.ema_short_period);
    let long_label = format!("EMA{}", config.ema_long_period);
    println!(
        "  {:<12} {:>10} {:>10} {:>10} {:>7} {:<6}",
        "Date", "Close", short_label, long_label, "RSI", "Signal"
    );
    println!("  {}", "-".repeat(60));
    for row in rows {
        let date = chrono::DateTime::from_timestamp(row.timestamp, 0)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| row.timestamp.to_string());
        println!(
            "  {:<12} {:>10.2} {:>10.2} {:>10.2} {:>7.1} {:<6}",
            date, row.close, row.ema_short, row.ema_long, row.rsi, row.signal
        );
    }
}

// ============================================================================
// Top command - CLI market-cap ranking
// ============================================================================

async fn cmd_top(limit: usize, concurrency: usize) -> anyhow::Result<()> {
    println!("\n=== Stock Signals v{} ===", APP_VERSION);

    let path = tickers_path();
    let tickers = load_tickers(&path)?;
    println!("Tickers: {} ({} symbols)", path.display(), tickers.len());
    if tickers.is_empty() {
        println!("\nNo tickers to snapshot.");
        return Ok(());
    }

    let snapshot = take_snapshot(&yahoo_client()?, &tickers, concurrency).await;
    print_snapshot(&snapshot, limit);

    Ok(())
}

fn print_snapshot(snapshot: &MarketSnapshot, limit: usize) {
    println!(
        "\nTop {} by market cap ({:.1}s):",
        snapshot.data.len().min(limit),
        snapshot.elapsed_seconds
    );
    println!(
        "  {:>3}  {:<7} {:<28} {:>10} {:>8} {:>10}",
        "#", "Symbol", "Name", "Price", "Chg%", "Cap ($B)"
    );
    println!("  {}", "-".repeat(72));
    for (i, t) in snapshot.data.iter().take(limit).enumerate() {
        let name: String = t.name.chars().take(28).collect();
        let price = t.price.map_or("-".to_string(), |p| format!("{:.2}", p));
        let pct = t.pct_change.map_or("-".to_string(), |p| format!("{:+.2}", p));
        let cap = t
            .market_cap
            .map_or("-".to_string(), |c| format!("{:.1}", c as f64 / 1e9));
        println!(
            "  {:>3}  {:<7} {:<28} {:>10} {:>8} {:>10}",
            i + 1,
            t.symbol,
            name,
            price,
            pct,
            cap
        );
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stock-signals",
        "version": APP_VERSION,
    }))
}

/// Query params for the signals endpoint; omitted strategy fields use the defaults
#[derive(Deserialize)]
struct SignalsParams {
    symbol: String,
    #[serde(default = "default_range")]
    range: String,
    #[serde(default = "default_interval")]
    interval: String,
    ema_short_period: Option<usize>,
    ema_long_period: Option<usize>,
    rsi_period: Option<usize>,
    rsi_buy_threshold: Option<f64>,
    rsi_sell_threshold: Option<f64>,
}

fn default_range() -> String {
    DEFAULT_RANGE.to_string()
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

impl SignalsParams {
    fn config(&self) -> SignalConfig {
        let defaults = SignalConfig::default();
        SignalConfig {
            ema_short_period: self.ema_short_period.unwrap_or(defaults.ema_short_period),
            ema_long_period: self.ema_long_period.unwrap_or(defaults.ema_long_period),
            rsi_period: self.rsi_period.unwrap_or(defaults.rsi_period),
            rsi_buy_threshold: self.rsi_buy_threshold.unwrap_or(defaults.rsi_buy_threshold),
            rsi_sell_threshold: self.rsi_sell_threshold.unwrap_or(defaults.rsi_sell_threshold),
        }
    }
}

/// GET /api/signals - indicator series and signal table for one ticker
async fn api_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalsParams>,
) -> Json<serde_json::Value> {
    let symbol = params.symbol.trim().to_uppercase();
    let config = params.config();

    if let Err(e) = config.validate() {
        return Json(serde_json::json!({
            "success": false,
            "message": analysis_error_message(&symbol, &e),
        }));
    }

    let bars = match state
        .yahoo
        .get_chart(&symbol, &params.range, &params.interval)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            error!("Yahoo chart error for {}: {}", symbol, e);
            return Json(serde_json::json!({
                "success": false,
                "message": format!("Failed to fetch history for {}: {}", symbol, e),
            }));
        }
    };

    match analyze_signals(&bars, &config) {
        Ok(series) => Json(serde_json::json!({
            "success": true,
            "symbol": symbol,
            "range": params.range,
            "interval": params.interval,
            "count": series.len(),
            "config": series.config(),
            "signals": series.signal_table(),
            "series": series.rows(),
        })),
        Err(e) => {
            error!("Signal analysis failed for {}: {}", symbol, e);
            Json(serde_json::json!({
                "success": false,
                "message": analysis_error_message(&symbol, &e),
            }))
        }
    }
}

fn analysis_error_message(symbol: &str, e: &SignalError) -> String {
    if e.is_config_error() {
        format!("Invalid signal configuration: {}", e)
    } else {
        format!("Invalid price data for {}: {}", symbol, e)
    }
}

/// GET /api/top100 - ticker universe ranked by market cap
async fn api_top100(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tickers = match load_tickers(state.tickers_path.as_path()) {
        Ok(tickers) => tickers,
        Err(e) => {
            error!("Failed to load ticker list: {}", e);
            return Json(serde_json::json!({
                "success": false,
                "message": format!("Failed to load ticker list: {}", e),
            }));
        }
    };

    let snapshot = take_snapshot(&*state.yahoo, &tickers, DEFAULT_CONCURRENCY).await;
    Json(serde_json::to_value(&snapshot).unwrap_or_default())
}
