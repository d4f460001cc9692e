//! Trading engine command line

use std::sync::Arc;

use clap::{Parser, Subcommand};
use common::decimal::{Price, Quantity};
use common::error::Result;
use dotenv::dotenv;
use tracing::{error, info};
use trading_engine::config::parse_instruments;
use trading_engine::demo;
use trading_engine::simulation::{self, SimulationParams};
use trading_engine::{init_tracing, Exchange, ExchangeConfig, LogFormat};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Enable debug logging (overrides DEBUG)
    #[clap(long)]
    debug: bool,

    /// Log format (overrides LOG_FORMAT)
    #[clap(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Instruments to list as SYMBOL:PRICE[,SYMBOL:PRICE] (overrides EXCHANGE_INSTRUMENTS)
    #[clap(long)]
    instruments: Option<String>,

    /// Largest accepted order quantity (overrides EXCHANGE_MAX_ORDER_QUANTITY)
    #[clap(long)]
    max_order_quantity: Option<Quantity>,

    /// Highest accepted limit price (overrides EXCHANGE_MAX_PRICE)
    #[clap(long)]
    max_price: Option<Price>,

    /// Reject limit prices with too many decimals (overrides EXCHANGE_STRICT_PRICES)
    #[clap(long)]
    strict_prices: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay the brokerage walkthrough and print account states
    Demo {
        /// Print the steps as JSON
        #[clap(long)]
        json: bool,
    },
    /// Run concurrent random traders against one instrument
    Simulate {
        #[clap(long, default_value_t = 8)]
        traders: usize,
        /// Orders submitted by each trader
        #[clap(long, default_value_t = 200)]
        orders: usize,
        #[clap(long, default_value = "AAPL")]
        symbol: String,
        #[clap(long, default_value_t = 42)]
        seed: u64,
        /// Print the report as JSON
        #[clap(long)]
        json: bool,
    },
}

fn load_config(args: &Args) -> Result<ExchangeConfig> {
    let mut config = ExchangeConfig::from_env()?;
    if args.debug {
        config.debug = true;
    }
    if let Some(format) = args.log_format {
        config.log_format = format;
    }
    if let Some(list) = &args.instruments {
        config.instruments = parse_instruments(list)?;
    }
    if let Some(max) = args.max_order_quantity {
        config.engine.max_order_quantity = max;
    }
    if let Some(max) = args.max_price {
        config.engine.max_price = max;
    }
    if args.strict_prices {
        config.engine.strict_prices = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(config.debug, config.log_format);

    info!("Starting trading engine...");
    let exchange = Arc::new(Exchange::from_config(&config)?);

    match args.command {
        Command::Demo { json } => {
            let steps = demo::run(&exchange)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&steps)?);
            } else {
                for step in steps {
                    println!("--- {} ---", step.title);
                    for event in &step.events {
                        println!("  {}", event);
                    }
                    for balance in &step.balances {
                        let holdings: Vec<String> = balance
                            .holdings
                            .iter()
                            .map(|(symbol, holding)| format!("{}={}", symbol, holding.total()))
                            .collect();
                        println!(
                            "  {}: cash {} ({} reserved), holdings [{}]",
                            balance.name,
                            balance.cash.total().round_dp(2),
                            balance.cash.reserved.round_dp(2),
                            holdings.join(", ")
                        );
                    }
                }
            }
        }
        Command::Simulate { traders, orders, symbol, seed, json } => {
            let params = SimulationParams {
                traders,
                orders_per_trader: orders,
                symbol,
                seed,
                ..SimulationParams::default()
            };
            let report = simulation::run(exchange.clone(), params).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {} submitted, {} accepted, {} rejected, {} cancelled",
                    report.symbol, report.submitted, report.accepted, report.rejected, report.cancelled
                );
                println!("{} trades, {} shares, last price {}", report.trades, report.volume, report.last_price);
                println!(
                    "best bid {:?}, best ask {:?}",
                    report.depth.best_bid(),
                    report.depth.best_ask()
                );
                println!("cash {} -> {}, shares {} -> {}", report.cash_before, report.cash_after, report.shares_before, report.shares_after);
            }
            if !report.is_conserved() {
                error!("Cash or shares were not conserved");
                return Err("conservation check failed".into());
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
