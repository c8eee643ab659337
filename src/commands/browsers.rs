use colored::Colorize;

use pushcert::browser::discover_all_browsers;
use pushcert::error::Result;

use crate::cli::Cli;

pub async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    let browsers = discover_all_browsers();

    if cli.json {
        let list: Vec<_> = browsers
            .iter()
            .map(|b| {
                serde_json::json!({
                    "name": b.browser_type.name(),
                    "path": b.path.display().to_string(),
                    "version": b.version,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "configured": config.browser.executable,
                "detected": list,
            })
        );
        return Ok(());
    }

    if let Some(ref executable) = config.browser.executable {
        println!("{}", "Configured Browser:".bold());
        println!("  {}", executable);
        println!();
    }

    println!("{}", "Detected Browsers:".bold());
    if browsers.is_empty() {
        println!("  {} No browsers found", "!".yellow());
    } else {
        for browser in browsers {
            println!(
                "  {} {} {}",
                "✓".green(),
                browser.browser_type.name(),
                browser
                    .version
                    .map(|v| format!("(v{})", v))
                    .unwrap_or_default()
                    .dimmed()
            );
            println!("    {}", browser.path.display().to_string().dimmed());
        }
    }

    Ok(())
}
