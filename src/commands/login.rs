use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use pushcert::error::Result;

use super::open_session;
use crate::cli::Cli;

pub async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    let team_id = config.team_id().map(str::to_string);

    // Nothing is uploaded, so no signing request is needed
    let mut session = open_session(cli, config, Arc::new(PathBuf::new())).await?;
    session.login(None, None).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "status": "authenticated",
                "team_id": team_id,
            })
        );
    } else {
        println!("{} Logged in to the developer portal", "✓".green());
        if let Some(team_id) = team_id {
            println!("  Team: {}", team_id.dimmed());
        }
    }

    Ok(())
}
