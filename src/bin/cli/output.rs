use clap::ValueEnum;
use argo_connector::dto::{ArtifactDto, HealthResponse};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Bundled output configuration passed to all print functions
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    /// The output format
    pub format: OutputFormat,
    /// When true, print minimal output (just IDs)
    pub quiet: bool,
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render JSON: {}", e),
    }
}

/// Prints the artifacts of a workflow in the specified format
pub fn print_artifacts(artifacts: &[ArtifactDto], config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if artifacts.is_empty() {
                if !config.quiet {
                    println!("No artifacts found.");
                }
                return;
            }
            if config.quiet {
                for artifact in artifacts {
                    println!("{}", artifact.path);
                }
                return;
            }
            let max_node = artifacts.iter().map(|a| a.node_id.len()).max().unwrap_or(4).max(4);
            println!("{:<width$}  PATH", "NODE", width = max_node);
            for artifact in artifacts {
                println!("{:<width$}  {}", artifact.node_id, artifact.path, width = max_node);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!(artifacts)),
    }
}

/// Prints the id of an ingested dataset
pub fn print_dataset(id: &str, url: &str, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", id);
                return;
            }
            println!("Dataset: {}", id);
            println!("URL:     {}", url);
        }
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "url": url })),
    }
}

/// Prints a health report
pub fn print_health(report: &HealthResponse, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", if report.is_healthy() { "ok" } else { "unhealthy" });
                return;
            }
            println!("Argo:   {}", status_text(&report.argo_connection));
            println!("Cordra: {}", status_text(&report.cordra_connection));
        }
        OutputFormat::Json => print_json(&serde_json::json!(report)),
    }
}

fn status_text(state: &str) -> &str {
    if state == "true" { "ok" } else { state }
}

/// Prints a success message in the specified format
pub fn print_success(message: &str, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if !config.quiet {
                println!("{}", message);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({ "status": "ok", "message": message })),
    }
}
