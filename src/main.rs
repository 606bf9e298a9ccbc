mod cli;

use anyhow::{anyhow, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use console::style;
use govm::config::{normalize_key, GovmConfig, APP_NAME, SETTING_KEYS};
use govm::download::ProgressCallback;
use govm::manager::{select_source, VersionManager};
use govm::region::MirrorConfig;
use govm::{platform, InstallOutcome, Version};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = GovmConfig::load()?;

    match cli.command {
        Commands::Version => {
            println!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
        }

        Commands::Config { action } => handle_config(&mut config, action)?,

        Commands::Remote => {
            platform::validate(&config.root_dir)?;
            let manager = remote_manager(&config, None).await?;
            let versions = manager.remote_versions().await?;
            if versions.is_empty() {
                println!("No versions available.");
            }
            for version in versions {
                println!(
                    "{} ({}/{})",
                    style(version.display_name()).bold(),
                    version.os,
                    version.arch
                );
            }
        }

        Commands::List => {
            platform::validate(&config.root_dir)?;
            let manager = local_manager(&config)?;
            print_local_versions(&manager.local_versions()?);
        }

        Commands::Install { version } => {
            platform::validate(&config.root_dir)?;
            let bar = (!cli.quiet).then(new_progress_bar);
            let progress = bar.clone().map(|bar| -> ProgressCallback {
                Arc::new(move |written, total| {
                    if let Some(total) = total {
                        bar.set_length(total);
                    }
                    bar.set_position(written);
                })
            });

            let manager = remote_manager(&config, progress).await?;
            let result = manager.install_version(&version).await;
            if let Some(bar) = &bar {
                bar.finish_and_clear();
            }
            let (version, outcome) = result?;
            print_install_summary(&manager, &config, &version, &outcome);
        }

        Commands::Use { version } => {
            platform::validate(&config.root_dir)?;
            let manager = local_manager(&config)?;
            let report = manager.use_version(&version)?;
            println!(
                "Now using {}",
                style(report.version.display_name()).green().bold()
            );
            println!(
                "Run `{}` or open a new terminal to apply it.",
                report.env.shell.source_command(&report.env.config_file)
            );
        }

        Commands::Current => {
            platform::validate(&config.root_dir)?;
            let manager = local_manager(&config)?;
            match manager.current_version()? {
                Some(current) => println!(
                    "{} - {}",
                    style(current.display_name()).green().bold(),
                    install_path_display(&current)
                ),
                None => println!("No active Go version. Run `govm use <version>` to pick one."),
            }
        }

        Commands::Uninstall { version, force } => {
            platform::validate(&config.root_dir)?;
            let manager = local_manager(&config)?;
            manager.uninstall(&version, force)?;
            println!("Removed {}", style(&version).bold());
            print_local_versions(&manager.local_versions()?);
        }
    }

    Ok(())
}

fn setup_logging(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Manager for commands that never touch the network.
fn local_manager(config: &GovmConfig) -> Result<VersionManager> {
    Ok(VersionManager::new(config, MirrorConfig::default(), None)?)
}

async fn remote_manager(
    config: &GovmConfig,
    progress: Option<ProgressCallback>,
) -> Result<VersionManager> {
    let mirror = select_source(&config.settings).await;
    tracing::info!("Using release catalog {}", mirror.api_base);
    Ok(VersionManager::new(config, mirror, progress)?)
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let template = "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})";
    bar.set_style(
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

fn install_path_display(version: &Version) -> String {
    version
        .installed_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn print_local_versions(versions: &[Version]) {
    if versions.is_empty() {
        println!("No Go versions installed yet.");
        return;
    }
    for version in versions {
        let marker = if version.is_current { "*" } else { " " };
        let name = if version.is_current {
            style(version.display_name()).green().bold()
        } else {
            style(version.display_name())
        };
        println!("{} {} - {}", marker, name, install_path_display(version));
    }
}

fn print_install_summary(
    manager: &VersionManager,
    config: &GovmConfig,
    version: &Version,
    outcome: &InstallOutcome,
) {
    let path = outcome.install_path().display();
    match outcome {
        InstallOutcome::Installed(_) => {
            println!("Installed {}", style(version.display_name()).green().bold())
        }
        InstallOutcome::AlreadyInstalled(_) => println!(
            "{} is already installed",
            style(version.display_name()).green().bold()
        ),
    }
    println!("  GOROOT: {}", path);
    println!("  GOPATH: {}", config.settings.gopath);

    println!("\nTo activate it, run:");
    println!("  govm use {}", version.number);
    match manager.shell_config() {
        Ok((shell, profile)) => println!("  {}", shell.source_command(&profile)),
        Err(e) => tracing::warn!("{}", e),
    }
}

fn handle_config(config: &mut GovmConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            if let Some(key) = key {
                let key = normalize_key(&key);
                let value = config
                    .settings
                    .get(&key)
                    .ok_or_else(|| anyhow!("Setting '{}' not found", key))?;
                println!("{}", value);
            } else {
                print_settings_plain(config);
            }
        }
        ConfigAction::Set { args } => {
            let (key, value) = match args.as_slice() {
                [single] => single
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| anyhow!("Invalid format. Use 'key=value' or 'key value'."))?,
                [key, rest @ ..] => (key.clone(), rest.join(" ")),
                [] => return Err(anyhow!("Invalid format. Use 'key=value' or 'key value'.")),
            };
            let key = normalize_key(&key);
            config.settings.set(&key, &value)?;
            config.save()?;
            tracing::info!("Setting '{}' updated to '{}'", key, value.trim());
        }
        ConfigAction::Unset { key } => {
            let key = normalize_key(&key);
            config.settings.unset(&key)?;
            config.save()?;
            tracing::info!("Setting '{}' unset", key);
        }
        ConfigAction::Show { format } => match format.to_lowercase().as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&config.settings)?),
            "yaml" => print!("{}", serde_yaml::to_string(&config.settings)?),
            "plain" => print_settings_plain(config),
            other => {
                return Err(anyhow!(
                    "Unknown format '{}'. Valid formats: json, yaml, plain",
                    other
                ))
            }
        },
    }
    Ok(())
}

fn print_settings_plain(config: &GovmConfig) {
    println!("--- govm settings ---");
    println!("  root: {}", config.root_dir.display());
    for key in SETTING_KEYS {
        if let Some(value) = config.settings.get(key) {
            println!("  {}: {}", key, value);
        }
    }
}
