//! CLI command implementations.

pub mod describe;
pub mod operator;

use anyhow::{Context, Result, bail};
use integrator_core::catalog;
use integrator_core::digest::compute_for_kit;
use integrator_core::kit::IntegrationKit;

pub fn digest(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let kit: IntegrationKit =
        serde_yaml::from_str(&content).with_context(|| format!("{path} is not an IntegrationKit"))?;
    println!("{}", compute_for_kit(&kit));
    Ok(())
}

pub fn resolve(constraint: &str, config_path: &str) -> Result<()> {
    let config = integrator_config::load_operator_config(config_path)
        .with_context(|| format!("Failed to load {config_path}"))?;
    match catalog::resolve(constraint, &config.catalogs) {
        Some(entry) => {
            println!("{}", entry.version);
            Ok(())
        }
        None => bail!("No catalog matches {constraint}"),
    }
}

pub fn validate(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    match integrator_config::parse_operator_config(&content) {
        Ok(config) => {
            println!(
                "Configuration is valid ({} catalog(s))",
                config.catalogs.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
