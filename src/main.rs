// src/main.rs
//
// Command-line entry point for the DFI community lottery calculator.
// One invocation computes one draw and emits one audit record.

use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{error, info};
use lotto_calc::config::{default_config_template, Config, CredentialOverrides};
use lotto_calc::connectors::{DefiscanProvider, KucoinOracle};
use lotto_calc::engine::{DrawEngine, DrawOutcome, DrawRequest, EngineSettings};
use lotto_calc::error::{LottoError, Result};
use lotto_calc::models::BlockId;
use lotto_calc::output;
use std::sync::Arc;

const EXIT_CODE_OK: i32 = 0;
const EXIT_CODE_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "lotto-calc", version)]
#[command(about = "Executes the DFI Community Lottery calculations")]
#[command(after_help = "Example:\n  lotto-calc -c lotto_calc.toml -t 60 -d 2022-02-05 -b 1598835 --dfi-price 2.793 --btc-price 41603.4")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short)]
    config: Option<String>,

    /// Total number of lottery tickets for this drawing
    #[arg(long, short = 't', allow_negative_numbers = true)]
    total_tickets: Option<i64>,

    /// Date of this drawing (e.g. 2022-02-05)
    #[arg(long, short = 'd')]
    target_date: Option<String>,

    /// Block id or block hash from the target date
    #[arg(long, short = 'b')]
    block: Option<String>,

    /// DFI/USDT price at midnight of the target date
    #[arg(long, allow_negative_numbers = true)]
    dfi_price: Option<f64>,

    /// BTC/USDT price at midnight of the target date
    #[arg(long, allow_negative_numbers = true)]
    btc_price: Option<f64>,

    /// KuCoin API key
    #[arg(long)]
    api_key: Option<String>,

    /// KuCoin API secret
    #[arg(long)]
    api_secret: Option<String>,

    /// KuCoin API passphrase
    #[arg(long)]
    api_password: Option<String>,

    /// Use the KuCoin sandbox (ETH/USDT stands in for DFI/USDT) and allow 1.0 fallback prices
    #[arg(long, short = 'D')]
    debug: bool,

    /// More diagnostic output
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Maximum blocks to walk back while searching for the first block of the day
    #[arg(long)]
    max_steps: Option<usize>,

    /// Print a default configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.generate_config {
        println!("{}", default_config_template());
        return;
    }

    info!("command: {}", std::env::args().collect::<Vec<_>>().join(" "));

    let code = tokio::select! {
        result = run(&args) => match result {
            Ok(()) => EXIT_CODE_OK,
            Err(e) => {
                error!("{}", e);
                eprintln!("Error: {}", e);
                EXIT_CODE_ERROR
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("program execution interrupted by user");
            EXIT_CODE_OK
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();
    if verbose {
        info!("verbose option enabled");
    }
}

async fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!("config path: {}", path);
            Config::from_file(path)?
        }
        None => Config::default(),
    };

    let request = build_request(args)?;

    let credentials = config.credentials(&CredentialOverrides {
        api_key: args.api_key.clone(),
        api_secret: args.api_secret.clone(),
        api_password: args.api_password.clone(),
    })?;

    if args.debug {
        info!("DEBUG mode detected, using KuCoin sandbox");
    }
    let oracle = KucoinOracle::new(credentials, config.kucoin_url(args.debug))?;
    let blocks = DefiscanProvider::new(config.explorer_url())?;
    info!("Block pages parsed with layout {}", blocks.layout_version());

    let max_steps = args.max_steps.unwrap_or(config.locator.max_steps);
    let engine = DrawEngine::new(
        Arc::new(blocks),
        Arc::new(oracle),
        EngineSettings::new(args.debug, max_steps),
    );

    let DrawOutcome { record, substitutions } = engine.run(&request).await?;
    if !substitutions.is_empty() {
        info!("{} price(s) substituted", substitutions.len());
    }

    let log_file = if config.output.log_disabled {
        info!("result log disabled by config file");
        None
    } else {
        Some(config.output.log_file.as_path())
    };
    let stdout = std::io::stdout();
    output::publish(&mut stdout.lock(), log_file, &record)
}

fn build_request(args: &Args) -> Result<DrawRequest> {
    let total_tickets = args
        .total_tickets
        .ok_or_else(|| LottoError::malformed("--total-tickets is required"))?;
    if total_tickets < 1 {
        return Err(LottoError::malformed(format!(
            "total tickets must be a positive integer, got {}",
            total_tickets
        )));
    }
    let target_date = args
        .target_date
        .as_deref()
        .ok_or_else(|| LottoError::malformed("--target-date is required"))
        .and_then(parse_target_date)?;
    let block = args
        .block
        .as_deref()
        .map(BlockId::from)
        .ok_or_else(|| LottoError::malformed("--block is required"))?;

    Ok(DrawRequest {
        total_tickets,
        target_date,
        block,
        btc_price: args.btc_price,
        dfi_price: args.dfi_price,
        today: Local::now().date_naive(),
    })
}

fn parse_target_date(text: &str) -> Result<NaiveDate> {
    ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text.trim(), fmt).ok())
        .ok_or_else(|| LottoError::malformed(format!("unparseable target date '{}'", text)))
}
