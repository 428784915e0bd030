mod commands;
mod output;

use argo_connector::{
    argo::ArgoClient,
    config::{self, CliArgs, Config},
    cordra::CordraClient,
    logging::{init_logging, Console},
};
use clap::{Parser, Subcommand};
use output::{OutputConfig, OutputFormat};
use std::process;

/// CLI for the Argo to Cordra connector
#[derive(Parser, Debug)]
#[clap(name = "argo-connector-cli", about = "Inspect Argo workflows and archive them in Cordra")]
struct Cli {
    #[command(flatten)]
    config: CliArgs,

    /// Output format
    #[clap(long, value_enum, default_value_t = OutputFormat::Human, global = true)]
    format: OutputFormat,

    /// Quiet mode: minimal output (just IDs)
    #[clap(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Identifies a workflow on the Argo server
#[derive(clap::Args, Debug)]
pub struct WorkflowArgs {
    /// Namespace of the workflow
    pub namespace: String,
    /// Name of the workflow
    pub name: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a finished workflow into Cordra and print the dataset ID
    Ingest(WorkflowArgs),
    /// List the artifacts that an ingest would archive
    Artifacts(WorkflowArgs),
    /// Write the reconstructed workflow definition as YAML
    ExportWorkflow {
        #[command(flatten)]
        workflow: WorkflowArgs,
        /// Write to this file instead of stdout
        #[clap(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Check the Argo and Cordra connections
    Health,
}

/// Clients built from the resolved configuration
pub struct Clients {
    pub config: Config,
    pub argo: ArgoClient,
    pub cordra: CordraClient,
}

impl Clients {
    fn from_config(config: Config) -> anyhow::Result<Self> {
        let argo = ArgoClient::new(&config.argo_base_url, &config.argo_token, config.verify_cert)?;
        let cordra = CordraClient::new(
            &config.cordra_base_url,
            &config.cordra_user,
            &config.cordra_password,
            config.verify_cert,
        )?;
        Ok(Self { config, argo, cordra })
    }
}

/// Formats an error chain for stderr
fn format_error(err: &anyhow::Error) -> String {
    let message = format!("{:#}", err);

    if message.contains("error sending request") || message.contains("Connection refused") {
        return format!("Could not connect to Argo or Cordra. Check the base URLs\n  {}", message);
    }
    message
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = config::get_config(&cli.config)?;
    let clients = Clients::from_config(config)?;
    let output_config = OutputConfig {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Ingest(workflow) => commands::ingest::execute(&clients, &workflow, &output_config).await?,
        Commands::Artifacts(workflow) => commands::artifacts::execute(&clients, &workflow, &output_config).await?,
        Commands::ExportWorkflow { workflow, output } => {
            commands::export_workflow::execute(&clients, &workflow, output.as_deref(), &output_config).await?
        }
        Commands::Health => return commands::health::execute(&clients, &output_config).await,
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output
    let log_guards = match init_logging(
        &cli.config.log_level,
        cli.config.log_json,
        cli.config.log_dir.as_deref(),
        Console::Stderr,
    ) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Error: failed to initialise logging: {}", e);
            process::exit(1);
        }
    };

    let success = match run(cli).await {
        Ok(healthy) => healthy,
        Err(e) => {
            eprintln!("Error: {}", format_error(&e));
            false
        }
    };

    // Flush buffered log lines before exiting
    drop(log_guards);
    if !success {
        process::exit(1);
    }
}
