//! Configuration commands.

use std::path::Path;

use eppd_core::EppdConfig;

use crate::error::ClientResult;

/// Dump the current configuration to stdout.
///
/// Secret references are printed as written, never resolved.
pub fn dump(config: &EppdConfig, path: &Path) -> ClientResult<()> {
    println!("# config.toml ({})", path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Validate the configuration, resolving every registry's credentials.
pub fn validate(config: &EppdConfig) -> ClientResult<()> {
    config.validate()?;
    for (name, registry) in &config.registries {
        println!("{}: {} ({} service(s))", name, registry.address(), registry.services.len());
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}
