//! Integration operator CLI.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "integrator")]
#[command(about = "Builds and deploys integrations on Kubernetes", long_about = None)]
#[command(version)]
struct Cli {
    /// Log in JSON format
    #[arg(long, env = "INTEGRATOR_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kit and integration controllers
    Operator {
        /// Path to the operator configuration
        #[arg(long, env = "INTEGRATOR_CONFIG")]
        config: Option<String>,
        /// Namespace to watch, overriding the configuration
        #[arg(long, env = "INTEGRATOR_NAMESPACE")]
        namespace: Option<String>,
    },
    /// Describe a resource
    Describe {
        #[command(subcommand)]
        command: DescribeCommands,
    },
    /// Print the digest of a kit manifest
    Digest {
        /// Path to an IntegrationKit manifest
        path: String,
    },
    /// Resolve a runtime version constraint against the configured catalogs
    Resolve {
        /// Exact version or semver range
        constraint: String,
        /// Path to the operator configuration
        #[arg(long, default_value = "operator.kdl")]
        config: String,
    },
    /// Validate an operator configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "operator.kdl")]
        path: String,
    },
}

#[derive(Subcommand)]
enum DescribeCommands {
    /// Describe an integration kit
    Kit {
        /// Kit name
        name: String,
        /// Namespace of the kit
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Operator { config, namespace } => {
            commands::operator::run(config.as_deref(), namespace).await?;
        }
        Commands::Describe { command } => match command {
            DescribeCommands::Kit { name, namespace } => {
                commands::describe::kit(&name, namespace).await?;
            }
        },
        Commands::Digest { path } => {
            commands::digest(&path)?;
        }
        Commands::Resolve { constraint, config } => {
            commands::resolve(&constraint, &config)?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}
