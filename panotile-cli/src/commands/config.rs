//! Configuration commands: `config get`, `config set`, `config list` and
//! `config path`.

use clap::Subcommand;
use console::style;
use panotile::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one setting
    Get {
        /// Key in section.key form (e.g. cache.image_capacity)
        key: String,
    },

    /// Change one setting and save config.ini
    Set {
        /// Key in section.key form (e.g. lod.hq_render_mag)
        key: String,

        /// New value
        value: String,
    },

    /// List every setting with its current value
    List,

    /// Print the location of config.ini
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'panotile config list' to see available keys.",
            key
        ))
    })
}

fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load()?;
    println!("{}", display_value(&config_key.get(&config)));
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load()?;
    config_key.set(&mut config, value)?;
    config.save()?;

    println!("Set {} = {}", style(config_key.name()).cyan(), value);
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", render_list(&config));
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{} {}", path.display(), style("(not created yet)").dim());
    }
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

/// Settings grouped under `[section]` headers in key order.
fn render_list(config: &ConfigFile) -> String {
    let mut out = String::from("Configuration Settings\n======================\n");
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            out.push_str(&format!("\n[{}]\n", section));
            current_section = section;
        }
        out.push_str(&format!(
            "  {} = {}\n",
            key.key_name(),
            display_value(&key.get(config))
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_rejects_unknown() {
        let err = parse_key("nope.missing").unwrap_err();
        assert!(err.to_string().contains("panotile config list"));
    }

    #[test]
    fn test_render_list_groups_by_section() {
        let listing = render_list(&ConfigFile::default());

        assert!(listing.contains("[cache]"));
        assert!(listing.contains("[lod]"));
        assert!(listing.contains("base_path = (not set)"));
        assert_eq!(listing.matches("[cache]").count(), 1);
    }
}
