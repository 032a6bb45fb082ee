//! Minimal harness: resolves a property set, runs samples sequentially
//! against RabbitMQ and prints each result as one JSON line.
//!
//! ```text
//! amqp-sample --role consumer --config consumer.json --iterations 100
//! amqp-sample --role publisher --set host=localhost --set queue=q1 \
//!     --set exchange=e1 --set routing-key=rk1 --set message-content=hello
//! ```

use std::path::PathBuf;
use std::time::Duration;

use amqp_sampler_core::{Properties, Role, Sampler, SamplerOptions};
use amqp_sampler_rabbitmq::RabbitClient;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Consumer,
    Publisher,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Consumer => Role::Consumer,
            RoleArg::Publisher => Role::Publisher,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "amqp-sample", about = "Drive an AMQP broker one sample at a time")]
struct Args {
    #[arg(long, value_enum)]
    role: RoleArg,

    /// JSON object of sampler properties
    #[arg(long, env = "AMQP_SAMPLER_CONFIG")]
    config: Option<PathBuf>,

    /// Property override, `key=value`; may be repeated
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    #[arg(long, default_value_t = 1)]
    iterations: u64,

    /// Pause between samples, in milliseconds
    #[arg(long, default_value_t = 0)]
    pause_ms: u64,

    #[arg(long, default_value = "AMQP Sampler")]
    label: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut props = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Properties::from_json(&raw)?
        }
        None => Properties::new(),
    };
    for raw in &args.overrides {
        let (key, value) = Properties::parse_assignment(raw)?;
        props.insert(key, value);
    }

    let options = SamplerOptions::from_properties(&args.label, args.role.into(), &props)?;
    let mut sampler = Sampler::new(RabbitClient::new(&args.label), options);

    let handle = sampler.interrupt_handle();
    let on_signal = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt requested");
            on_signal.interrupt();
        }
    });

    let (mut ok, mut failed) = (0u64, 0u64);
    for _ in 0..args.iterations {
        if handle.is_interrupted() {
            break;
        }
        let result = sampler.sample().await;
        if result.success {
            ok += 1;
        } else {
            failed += 1;
        }
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("failed to serialize result: {e}"),
        }
        if args.pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.pause_ms)).await;
        }
    }

    sampler.test_ended().await;
    info!(ok, failed, "run finished");
    Ok(())
}
