//! Demo entry point.

use demo::model::OrderStatus;
use demo::{Config, DEFAULT_RESTOCK, DemoError, LogFormat, OrderFlow, default_lines};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(config: &Config) -> Result<(), DemoError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), DemoError> {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config)?;

    // 2. Prometheus recorder for the orchestrator counters
    let metrics_handle = if config.metrics {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    // 3. Run the order flow
    for run in 1..=config.runs {
        let flow = OrderFlow::new();
        let report = flow.run(DEFAULT_RESTOCK, &default_lines()).await?;
        metrics::counter!("demo_runs_total").increment(1);

        tracing::info!(
            run,
            shipped = report.count(OrderStatus::Shipped),
            cancelled = report.count(OrderStatus::Cancelled),
            stored_events = report.stored_events,
            "order flow finished"
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    // 4. Metrics
    if let Some(handle) = metrics_handle {
        println!("{}", handle.render());
    }

    Ok(())
}
