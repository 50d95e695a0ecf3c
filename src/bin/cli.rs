//! Admin CLI for a running log streaming hub: talks to the control plane
//! REST API over HTTP, never touches the dataplane directly.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "logstream-hub-cli")]
#[command(about = "Admin CLI for the log streaming hub control plane", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the running control plane
    #[arg(long, env = "LOGSTREAM_API_URL", default_value = "http://127.0.0.1:8088")]
    api_url: String,

    /// Output raw JSON instead of a formatted table
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Source management
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },
    /// Destination management
    Destination {
        #[command(subcommand)]
        command: DestinationCommand,
    },
    /// Route management
    Route {
        #[command(subcommand)]
        command: RouteCommand,
    },
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommand,
    },
    /// Synthetic load generator
    Loadtest {
        #[command(subcommand)]
        command: LoadtestCommand,
    },
    /// Process health and version
    Status,
}

#[derive(Subcommand)]
enum SourceCommand {
    /// List configured sources
    List,
    /// Start a stopped source
    Start { id: String },
    /// Stop a running source
    Stop { id: String },
    /// Delete a source
    Delete { id: String },
}

#[derive(Subcommand)]
enum DestinationCommand {
    /// List configured destinations
    List,
    /// Delete a destination
    Delete { id: String },
}

#[derive(Subcommand)]
enum RouteCommand {
    /// List configured routes
    List,
    /// Delete a route
    Delete { id: String },
}

#[derive(Subcommand)]
enum PipelineCommand {
    /// List configured pipelines
    List,
    /// Show per-pipeline event counters
    Stats,
}

#[derive(Subcommand)]
enum LoadtestCommand {
    /// Start the synthetic load generator
    Start {
        #[arg(long, default_value_t = 100)]
        eps: u64,
        #[arg(long, default_value_t = 1)]
        workers: u32,
        #[arg(long, default_value_t = 256)]
        size_bytes: usize,
    },
    /// Stop the synthetic load generator
    Stop,
    /// Show load generator status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let result = match cli.command {
        Commands::Source { command } => run_source(&client, &cli.api_url, command, cli.json).await,
        Commands::Destination { command } => {
            run_destination(&client, &cli.api_url, command, cli.json).await
        }
        Commands::Route { command } => run_route(&client, &cli.api_url, command, cli.json).await,
        Commands::Pipeline { command } => {
            run_pipeline(&client, &cli.api_url, command, cli.json).await
        }
        Commands::Loadtest { command } => {
            run_loadtest(&client, &cli.api_url, command, cli.json).await
        }
        Commands::Status => run_status(&client, &cli.api_url, cli.json).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_source(
    client: &reqwest::Client,
    base: &str,
    command: SourceCommand,
    json: bool,
) -> Result<()> {
    match command {
        SourceCommand::List => print_items(client, base, "/sources", json).await,
        SourceCommand::Start { id } => post_ok(client, base, &format!("/sources/{id}/start")).await,
        SourceCommand::Stop { id } => post_ok(client, base, &format!("/sources/{id}/stop")).await,
        SourceCommand::Delete { id } => delete_ok(client, base, &format!("/sources/{id}")).await,
    }
}

async fn run_destination(
    client: &reqwest::Client,
    base: &str,
    command: DestinationCommand,
    json: bool,
) -> Result<()> {
    match command {
        DestinationCommand::List => print_items(client, base, "/destinations", json).await,
        DestinationCommand::Delete { id } => {
            delete_ok(client, base, &format!("/destinations/{id}")).await
        }
    }
}

async fn run_route(
    client: &reqwest::Client,
    base: &str,
    command: RouteCommand,
    json: bool,
) -> Result<()> {
    match command {
        RouteCommand::List => print_items(client, base, "/routes", json).await,
        RouteCommand::Delete { id } => delete_ok(client, base, &format!("/routes/{id}")).await,
    }
}

async fn run_pipeline(
    client: &reqwest::Client,
    base: &str,
    command: PipelineCommand,
    json: bool,
) -> Result<()> {
    match command {
        PipelineCommand::List => print_items(client, base, "/pipelines", json).await,
        PipelineCommand::Stats => print_items(client, base, "/pipelines/stats", json).await,
    }
}

async fn run_loadtest(
    client: &reqwest::Client,
    base: &str,
    command: LoadtestCommand,
    json: bool,
) -> Result<()> {
    match command {
        LoadtestCommand::Start {
            eps,
            workers,
            size_bytes,
        } => {
            let body = serde_json::json!({
                "events_per_second": eps,
                "workers": workers,
                "size_bytes": size_bytes,
            });
            let resp = client
                .post(format!("{base}/loadtest/start"))
                .json(&body)
                .send()
                .await
                .context("contacting control plane")?;
            ensure_success(resp).await?;
            println!("{}", "load test started".green());
            Ok(())
        }
        LoadtestCommand::Stop => post_ok(client, base, "/loadtest/stop").await,
        LoadtestCommand::Status => print_value(client, base, "/loadtest/status", json).await,
    }
}

async fn run_status(client: &reqwest::Client, base: &str, json: bool) -> Result<()> {
    print_value(client, base, "/health", json).await?;
    print_value(client, base, "/info", json).await
}

async fn post_ok(client: &reqwest::Client, base: &str, path: &str) -> Result<()> {
    let resp = client
        .post(format!("{base}{path}"))
        .send()
        .await
        .context("contacting control plane")?;
    ensure_success(resp).await?;
    println!("{}", "ok".green());
    Ok(())
}

async fn delete_ok(client: &reqwest::Client, base: &str, path: &str) -> Result<()> {
    let resp = client
        .delete(format!("{base}{path}"))
        .send()
        .await
        .context("contacting control plane")?;
    ensure_success(resp).await?;
    println!("{}", "deleted".green());
    Ok(())
}

async fn print_items(client: &reqwest::Client, base: &str, path: &str, json: bool) -> Result<()> {
    let resp = client
        .get(format!("{base}{path}"))
        .send()
        .await
        .context("contacting control plane")?;
    let resp = ensure_success(resp).await?;
    let body: Value = resp.json().await.context("parsing response body")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let items = body.get("items").and_then(Value::as_array);
    match items {
        Some(items) if items.is_empty() => println!("{}", "(none)".dimmed()),
        Some(items) => {
            for item in items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&body)?),
    }
    Ok(())
}

async fn print_value(client: &reqwest::Client, base: &str, path: &str, json: bool) -> Result<()> {
    let resp = client
        .get(format!("{base}{path}"))
        .send()
        .await
        .context("contacting control plane")?;
    let resp = ensure_success(resp).await?;
    let body: Value = resp.json().await.context("parsing response body")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!("{} {}", status, text.trim());
    }
}
