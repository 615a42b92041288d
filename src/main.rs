use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use order_storm_engine::models::args::{Args, OutputFormat};
use order_storm_engine::models::request_spec::parse_header_line;
use order_storm_engine::{
    http_iteration, render_result_table, run_with_shutdown, HttpMethod, OrderPayload,
    ReqwestTransport, RequestSpec, RunOptions, TestConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = load_config(&args)?;
    let request = build_request(&args)?;

    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let transport = Arc::new(ReqwestTransport::new(timeout)?);
    let iteration = http_iteration(transport, move || request.clone());
    let options = RunOptions {
        progress_interval: (args.progress > 0).then(|| Duration::from_secs(args.progress)),
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let report = run_with_shutdown(config, iteration, options, shutdown).await?;
    match args.output {
        OutputFormat::Table => print!("{}", render_result_table(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// An options file, when given, replaces `--vus` and `--duration`.
fn load_config(args: &Args) -> anyhow::Result<TestConfig> {
    match &args.options {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read options file {}", path.display()))?;
            serde_json::from_str::<TestConfig>(&raw)
                .with_context(|| format!("invalid options in {}", path.display()))
        }
        None => Ok(TestConfig::from_options(args.vus, &args.duration)?),
    }
}

fn build_request(args: &Args) -> anyhow::Result<RequestSpec> {
    let method: HttpMethod = args.method.parse()?;
    let mut request = match &args.json {
        Some(json) => {
            let value: serde_json::Value =
                serde_json::from_str(json).context("failed to parse --json body")?;
            RequestSpec::post_json(&args.url, &value)?
        }
        None if method == HttpMethod::Post => RequestSpec::post_json(&args.url, &OrderPayload::default())?,
        None => RequestSpec::new(method, &args.url),
    };
    request.method = method;
    for line in &args.headers {
        let (name, value) =
            parse_header_line(line).ok_or_else(|| anyhow!("invalid header {:?}, expected `Name: Value`", line))?;
        request = request.header(name, value);
    }
    Ok(request)
}
