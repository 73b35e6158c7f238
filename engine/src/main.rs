//! Shipyard - Entry Point
//!
//! Command line front end of the shipyard engine: prints the git import plan
//! of an application, aggregates server status tokens, and checks whether an
//! application configuration needs a redeploy.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use tracing::{debug, error};

use shipyard::authn::github_app::GithubAppIssuer;
use shipyard::deploy::git::GitImport;
use shipyard::errors::EngineError;
use shipyard::filesys::file::File;
use shipyard::fingerprint;
use shipyard::logs::{init_logging, LogOptions};
use shipyard::models::application::Application;
use shipyard::models::deployment::{DeploymentContext, GitType};
use shipyard::status;
use shipyard::storage::layout::StorageLayout;
use shipyard::storage::settings::Settings;
use shipyard::utils::{generate_attempt_id, version_info};

const USAGE: &str = "\
Usage:
  shipyard --plan=<application.json> [--deployment=<id>] [--pr=<n>] [--git-type=github|gitlab|bitbucket] [--commit=<sha>] [--exec]
  shipyard --status=<primary> [--additional=<token>,<token>...]
  shipyard --fingerprint=<application.json> [--pr=<n>]
  shipyard --version

Options:
  --settings=<path>   settings file (default: <storage dir>/settings.json)
  --verbose           log to stdout";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        return match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => {
                println!("{}", version);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e.into()),
        };
    }

    let settings = match load_settings(&cli_args).await {
        Ok(settings) => settings,
        Err(e) => return fail(&e),
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        stdout: cli_args.contains_key("verbose"),
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let result = if let Some(path) = cli_args.get("plan") {
        print_plan(path, &cli_args, &settings).await
    } else if let Some(primary) = cli_args.get("status") {
        print_status(primary, &cli_args);
        Ok(())
    } else if let Some(path) = cli_args.get("fingerprint") {
        print_fingerprint(path, &cli_args).await
    } else {
        println!("{}", USAGE);
        return ExitCode::from(2);
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(e: &EngineError) -> ExitCode {
    error!("{}", e);
    eprintln!("{} {}", "error:".red().bold(), e);
    ExitCode::FAILURE
}

async fn load_settings(cli_args: &HashMap<String, String>) -> Result<Settings, EngineError> {
    let file = match cli_args.get("settings") {
        Some(path) => File::new(PathBuf::from(path)),
        None => StorageLayout::default().settings_file(),
    };
    if !file.exists().await {
        if cli_args.contains_key("settings") {
            return Err(EngineError::NotFound(format!(
                "Settings file {}",
                file.path().display()
            )));
        }
        return Ok(Settings::default());
    }
    file.read_json::<Settings>().await
}

async fn load_application(path: &str) -> Result<Application, EngineError> {
    let app: Application = File::new(PathBuf::from(path)).read_json().await?;
    Ok(app.normalized())
}

fn parse_pull_request(cli_args: &HashMap<String, String>) -> Result<u64, EngineError> {
    match cli_args.get("pr") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| EngineError::ConfigurationError(format!("Invalid pull request id: {}", value))),
        None => Ok(0),
    }
}

async fn print_plan(
    path: &str,
    cli_args: &HashMap<String, String>,
    settings: &Settings,
) -> Result<(), EngineError> {
    let app = load_application(path).await?;

    let deployment_id = cli_args
        .get("deployment")
        .cloned()
        .unwrap_or_else(generate_attempt_id);
    let git_type = match cli_args.get("git-type") {
        Some(value) => value.parse::<GitType>().map_err(EngineError::ConfigurationError)?,
        None => GitType::None,
    };

    let mut ctx = DeploymentContext::pull_request(deployment_id, parse_pull_request(cli_args)?, git_type)
        .with_exec_in_container(cli_args.contains_key("exec"));
    if let Some(commit) = cli_args.get("commit") {
        ctx = ctx.with_target_commit(commit.as_str());
    }
    debug!("Planning git import of application {} with {:?}", app.id, ctx);

    let issuer = GithubAppIssuer::new(&settings.github)?;
    let import = GitImport::new(settings, Arc::new(issuer));
    let plan = import.generate(&app, &ctx).await?;

    println!("{} {}", "Branch:".bold(), plan.branch());
    println!("{} {}", "Repository:".bold(), plan.repository_url());
    println!("{} {}", "Directory:".bold(), plan.base_dir());
    for command in plan.masked_commands() {
        println!("{}", command);
    }
    Ok(())
}

fn print_status(primary: &str, cli_args: &HashMap<String, String>) {
    let additional: Vec<&str> = cli_args
        .get("additional")
        .map(|list| list.split(',').map(str::trim).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();

    let aggregated = status::aggregate(primary, additional);
    let rendered = aggregated.to_string();
    if aggregated.is_running() && aggregated.health == status::HEALTHY {
        println!("{}", rendered.green());
    } else if aggregated.is_degraded() {
        println!("{}", rendered.yellow());
    } else {
        println!("{}", rendered.red());
    }
}

async fn print_fingerprint(path: &str, cli_args: &HashMap<String, String>) -> Result<(), EngineError> {
    let app = load_application(path).await?;
    let pull_request_id = parse_pull_request(cli_args)?;

    let hash = fingerprint::fingerprint(&app, pull_request_id)?;
    let changed = fingerprint::has_changed(&app, pull_request_id)?;

    println!("{}", hash);
    if changed {
        println!("{}", "changed".yellow());
    } else {
        println!("{}", "unchanged".green());
    }
    Ok(())
}
