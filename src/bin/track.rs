#![cfg(not(tarpaulin_include))]

use came_storefront::order::OrderStatus;
use came_storefront::tracking::{OrderTracker, OrdersFile, TrackingEnd};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

/// Follow an order from the command line
///
/// Usage: `track <order-id> [data-dir]`
///
/// Prints every status change until the order is completed, cancelled or
/// removed.
#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        let program = args.first().map(String::as_str).unwrap_or("track");
        eprintln!("Usage: {program} <order-id> [data-dir]");
        return Ok(ExitCode::from(2));
    }

    let order_id = Uuid::parse_str(&args[1])?;
    let data_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("database"));

    let (mut updates, handle) = OrderTracker::new(OrdersFile::new(data_dir), order_id).spawn();

    while let Some(update) = updates.recv().await {
        let label = update
            .step
            .and_then(|i| update.steps.get(i))
            .map_or("Cancelled", |step| step.label);
        println!("{}: {label}", update.status);
    }

    match handle.await? {
        TrackingEnd::Terminal(OrderStatus::Completed) => println!("Order delivered"),
        TrackingEnd::Terminal(status) => println!("Order {status}"),
        TrackingEnd::Missing => {
            eprintln!("Order {order_id} not found");
            return Ok(ExitCode::FAILURE);
        }
        TrackingEnd::Closed => {}
    }

    Ok(ExitCode::SUCCESS)
}
