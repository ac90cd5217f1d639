//! errorcast CLI
//!
//! Command-line client for a running errorcast server:
//! - Report errors
//! - Show streaming statistics and error summaries
//! - Check status
//! - Generate a config file

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "errorcast-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the errorcast real-time error stream")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report an error to every matching subscriber
    Capture {
        /// Error type (e.g. network, overflow, widget_build)
        error_type: String,
        /// Human-readable message
        message: String,
        /// Severity: info, warning, error, fatal
        #[arg(short, long, default_value = "error")]
        severity: String,
        /// Context entries in key=value format
        #[arg(short = 'C', long)]
        context: Vec<String>,
        /// Path to a file holding the stack trace
        #[arg(long)]
        stack_trace: Option<PathBuf>,
    },

    /// Show current streaming statistics
    Stats,

    /// Show error counts by type and severity
    Summary,

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Capture {
            error_type,
            message,
            severity,
            context,
            stack_trace,
        } => {
            let context = parse_context(&context);
            let stack_trace = match stack_trace {
                Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                    format!("Failed to read stack trace {:?}: {}", path, e)
                })?),
                None => None,
            };

            let body = serde_json::json!({
                "errorType": error_type,
                "message": message,
                "severity": severity,
                "context": context,
                "stackTrace": stack_trace,
            });

            let response = client
                .post(format!("{}/api/v1/errors", cli.api_url))
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Capture failed ({}): {}", status, text);
                std::process::exit(1);
            }

            let data: serde_json::Value = response.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("Captured {}", data["id"].as_str().unwrap_or("-"));
                println!("Urgency:  {}", data["urgency"].as_str().unwrap_or("-"));
                println!("Analysis: {}", data["autoAnalysis"].as_str().unwrap_or("-"));
                if let Some(actions) = data["suggested_actions"].as_array() {
                    println!();
                    println!("Suggested actions:");
                    for action in actions {
                        println!("  - {}", action.as_str().unwrap_or("-"));
                    }
                }
            }
        }

        Commands::Stats => {
            let data = get_json(&client, &format!("{}/api/v1/stats", cli.api_url)).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!(
                    "Server status:     {}",
                    data["serverStatus"].as_str().unwrap_or("unknown")
                );
                println!(
                    "Connected clients: {}",
                    data["connectedClients"].as_u64().unwrap_or(0)
                );
                println!(
                    "Total errors:      {}",
                    data["totalErrors"].as_u64().unwrap_or(0)
                );
            }
        }

        Commands::Summary => {
            let data = get_json(&client, &format!("{}/api/v1/errors/summary", cli.api_url)).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let total = data["totalErrors"].as_u64().unwrap_or(0);
                if total == 0 {
                    println!("No errors captured yet.");
                } else {
                    println!("Total errors: {}", total);
                    print_counts("Type", &data["byType"]);
                    print_counts("Severity", &data["bySeverity"]);
                }
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;

                    println!(
                        "errorcast v{}",
                        health["version"].as_str().unwrap_or(env!("CARGO_PKG_VERSION"))
                    );
                    println!();
                    println!(
                        "API Status: {}",
                        health["status"].as_str().unwrap_or("unknown")
                    );
                    println!(
                        "Stream:     {} ({} clients)",
                        health["server_status"].as_str().unwrap_or("unknown"),
                        health["connected_clients"].as_u64().unwrap_or(0)
                    );

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to errorcast at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the errorcast server is running:");
                    eprintln!("  cargo run --bin errorcast");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let content = errorcast::config::generate_default_config();

            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

async fn get_json(
    client: &reqwest::Client,
    url: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        eprintln!("Request failed: {}", response.status());
        std::process::exit(1);
    }

    Ok(response.json().await?)
}

/// Parse `key=value` pairs; finite numeric values are sent as numbers
fn parse_context(entries: &[String]) -> BTreeMap<String, serde_json::Value> {
    let mut context = BTreeMap::new();
    for entry in entries {
        if let Some((k, v)) = entry.split_once('=') {
            let value = match v.parse::<f64>() {
                // JSON has no NaN or infinity, serde_json would send null
                Ok(n) if n.is_finite() => serde_json::json!(n),
                _ => serde_json::Value::String(v.to_string()),
            };
            context.insert(k.trim().to_string(), value);
        } else {
            eprintln!("Ignoring context entry without '=': {}", entry);
        }
    }
    context
}

fn print_counts(label: &str, counts: &serde_json::Value) {
    let Some(map) = counts.as_object() else {
        return;
    };

    println!();
    println!("{:<24} {}", label, "Count");
    println!("{}", "-".repeat(32));
    for (key, count) in map {
        println!("{:<24} {}", key, count.as_u64().unwrap_or(0));
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
