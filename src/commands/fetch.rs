use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use pushcert::error::Result;
use pushcert::portal::{CertificateRequest, SigningRequestProvider};

use super::{clear_spinner, create_spinner, finish_spinner, open_session};
use crate::cli::Cli;

pub async fn run(
    cli: &Cli,
    app_identifier: &str,
    csr: &Path,
    production: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = cli.config()?;
    let request = CertificateRequest::new(app_identifier, production);

    // Fail on a missing CSR before a browser is started
    let csr = expand(csr).signing_request_path()?;

    let mut session = open_session(cli, config, Arc::new(csr)).await?;
    session.login(None, None).await?;

    let spinner = create_spinner(
        cli.json,
        &format!(
            "Creating {} certificate for {}...",
            request.environment, request.app_identifier
        ),
    );
    let path = match session.fetch_certificate(app_identifier, production).await {
        Ok(path) => path,
        Err(e) => {
            clear_spinner(spinner);
            return Err(e);
        }
    };
    finish_spinner(spinner, "Certificate downloaded");

    let path = match output {
        Some(dir) => {
            let dir = expand(dir);
            std::fs::create_dir_all(&dir)?;
            let dest = dir.join(request.file_name());
            std::fs::copy(&path, &dest)?;
            dest
        }
        None => path,
    };

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "app_identifier": request.app_identifier,
                "environment": request.environment.as_str(),
                "path": path.display().to_string(),
            })
        );
    } else {
        println!(
            "{} Created {} push certificate for {}",
            "✓".green(),
            request.environment,
            request.app_identifier.bold()
        );
        println!("  {}", path.display().to_string().dimmed());
    }

    Ok(())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}
