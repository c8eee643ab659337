use std::path::PathBuf;
use std::str::FromStr;

use colored::Colorize;
use dialoguer::Confirm;

use pushcert::config::Config;
use pushcert::error::{PortalError, Result};

use crate::cli::{Cli, ConfigCommands};

pub async fn run(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(cli).await,
        ConfigCommands::Set { key, value } => set(cli, key, value).await,
        ConfigCommands::Get { key } => get(cli, key).await,
        ConfigCommands::Path => path(cli).await,
        ConfigCommands::Reset => reset(cli).await,
    }
}

async fn show(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| PortalError::Config(e.to_string()))?;
        println!("{}", toml_str);
    }

    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| PortalError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn set_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "portal.base_url" => config.portal.base_url = value.to_string(),
        "portal.app_ids_url" => config.portal.app_ids_url = value.to_string(),
        "portal.team_id" => config.portal.team_id = optional(value),
        "portal.language" => config.portal.language = value.to_string(),
        "browser.executable" => config.browser.executable = optional(value),
        "browser.headless" => config.browser.headless = parse(key, value)?,
        "browser.cdp_port" => config.browser.cdp_port = parse(key, value)?,
        "wait.max_attempts" => config.wait.max_attempts = parse(key, value)?,
        "wait.poll_interval_ms" => config.wait.poll_interval_ms = parse(key, value)?,
        "wait.generation_poll_interval_ms" => {
            config.wait.generation_poll_interval_ms = parse(key, value)?
        }
        "wait.settle_ms" => config.wait.settle_ms = parse(key, value)?,
        "output.tmp_folder" => config.output.tmp_folder = PathBuf::from(value),
        "output.screenshot_dir" => config.output.screenshot_dir = PathBuf::from(value),
        "output.open_screenshots" => config.output.open_screenshots = parse(key, value)?,
        _ => {
            return Err(PortalError::Config(format!(
                "Unknown config key: {}",
                key
            )))
        }
    }
    Ok(())
}

fn get_value(config: &Config, key: &str) -> Result<Option<String>> {
    let value = match key {
        "portal.base_url" => Some(config.portal.base_url.clone()),
        "portal.app_ids_url" => Some(config.portal.app_ids_url.clone()),
        "portal.team_id" => config.portal.team_id.clone(),
        "portal.language" => Some(config.portal.language.clone()),
        "browser.executable" => config.browser.executable.clone(),
        "browser.headless" => Some(config.browser.headless.to_string()),
        "browser.cdp_port" => Some(config.browser.cdp_port.to_string()),
        "wait.max_attempts" => Some(config.wait.max_attempts.to_string()),
        "wait.poll_interval_ms" => Some(config.wait.poll_interval_ms.to_string()),
        "wait.generation_poll_interval_ms" => {
            Some(config.wait.generation_poll_interval_ms.to_string())
        }
        "wait.settle_ms" => Some(config.wait.settle_ms.to_string()),
        "output.tmp_folder" => Some(config.output.tmp_folder.display().to_string()),
        "output.screenshot_dir" => Some(config.output.screenshot_dir.display().to_string()),
        "output.open_screenshots" => Some(config.output.open_screenshots.to_string()),
        _ => {
            return Err(PortalError::Config(format!(
                "Unknown config key: {}",
                key
            )))
        }
    };
    Ok(value)
}

async fn set(_cli: &Cli, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;
    set_value(&mut config, key, value)?;
    config.save()?;
    println!("{} Set {} = {}", "✓".green(), key, value);

    Ok(())
}

async fn get(cli: &Cli, key: &str) -> Result<()> {
    let config = Config::load()?;
    let value = get_value(&config, key)?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "key": key,
                "value": value
            })
        );
    } else {
        match value {
            Some(v) => println!("{}", v),
            None => println!("{}", "(not set)".dimmed()),
        }
    }

    Ok(())
}

async fn reset(cli: &Cli) -> Result<()> {
    let path = Config::config_path();

    if !path.exists() {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "status": "no_config", "path": path.display().to_string() })
            );
        } else {
            println!("{} No config file to remove.", "✓".green());
        }
        return Ok(());
    }

    if !cli.json {
        let confirm = Confirm::new()
            .with_prompt(format!("Delete {}?", path.display()))
            .default(false)
            .interact()
            .map_err(|e| PortalError::Prompt(e.to_string()))?;

        if !confirm {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    std::fs::remove_file(&path)?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "status": "removed", "path": path.display().to_string() })
        );
    } else {
        println!(
            "{} Config removed: {}",
            "✓".green(),
            path.display().to_string().dimmed()
        );
    }

    Ok(())
}

async fn path(cli: &Cli) -> Result<()> {
    let path = Config::config_path();

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string()
            })
        );
    } else {
        println!("{}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips_typed_values() {
        let mut config = Config::default();

        set_value(&mut config, "wait.max_attempts", "25").unwrap();
        set_value(&mut config, "browser.headless", "false").unwrap();
        set_value(&mut config, "portal.team_id", "TEAM123").unwrap();

        assert_eq!(config.wait.max_attempts, 25);
        assert!(!config.browser.headless);
        assert_eq!(
            get_value(&config, "portal.team_id").unwrap().as_deref(),
            Some("TEAM123")
        );
    }

    #[test]
    fn blank_team_id_clears_it() {
        let mut config = Config::default();
        config.portal.team_id = Some("TEAM123".to_string());

        set_value(&mut config, "portal.team_id", " ").unwrap();

        assert!(get_value(&config, "portal.team_id").unwrap().is_none());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut config = Config::default();

        assert!(matches!(
            set_value(&mut config, "api.key", "x"),
            Err(PortalError::Config(_))
        ));
        assert!(matches!(
            set_value(&mut config, "wait.max_attempts", "lots"),
            Err(PortalError::Config(_))
        ));
        assert!(get_value(&config, "nope").is_err());
    }
}
