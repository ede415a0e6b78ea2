//! The `lustre config` command for configuration management.

use clap::{Args, Subcommand};
use lustre_core::Config;
use std::path::Path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show {
        /// Print TOML instead of JSON
        #[arg(long)]
        toml: bool,
    },

    /// Show the config file path in use
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
///
/// `explicit` is the `--config` path, if one was given.
pub async fn execute(
    args: ConfigArgs,
    config: Config,
    explicit: Option<&Path>,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { toml } => {
            let text = if toml { config.to_toml()? } else { config.to_json()? };
            println!("{text}");
        }

        ConfigCommand::Path => match Config::locate(explicit) {
            Some(path) => println!("{}", path.display()),
            None => println!("{} (not created; defaults in use)", Config::default_path().display()),
        },

        ConfigCommand::Init { force } => {
            let path = explicit
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let defaults = Config::default();
            let text = if is_toml(&path) {
                defaults.to_toml()?
            } else {
                defaults.to_json()?
            };
            std::fs::write(&path, text)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lustre/config.json");
        let args = ConfigArgs {
            command: ConfigCommand::Init { force: false },
        };
        execute(args, Config::default(), Some(&path)).await.unwrap();

        assert_eq!(Config::load_strict(&path).unwrap(), Config::default());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sharpen = true\n").unwrap();

        let args = ConfigArgs {
            command: ConfigCommand::Init { force: false },
        };
        assert!(execute(args, Config::default(), Some(&path)).await.is_err());

        let args = ConfigArgs {
            command: ConfigCommand::Init { force: true },
        };
        execute(args, Config::default(), Some(&path)).await.unwrap();
        assert!(!Config::load_strict(&path).unwrap().sharpen);
    }
}
