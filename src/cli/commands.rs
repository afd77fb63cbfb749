//! Command dispatch

use std::path::{Path, PathBuf};

use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::{debug, instrument};

use crate::application::services::Direction;
use crate::application::TreeEvent;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::CategoryId;
use crate::infrastructure::di::ServiceContainer;
use crate::tree_traits::{RenderOptions, TreeNodeConvert};

pub async fn execute_command(cli: &Cli) -> CliResult<()> {
    let config_dir = match &cli.config_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| CliError::Io {
            context: "current directory".to_string(),
            source: e,
        })?,
    };

    match &cli.command {
        Some(Commands::Tree) => _tree(&config_dir).await,
        Some(Commands::Expand { ids }) => _expand(&config_dir, ids).await,
        Some(Commands::Move {
            id,
            direction,
            expand,
        }) => _move(&config_dir, id, (*direction).into(), expand).await,
        Some(Commands::Config { command }) => _config(&config_dir, command),
        None => Ok(()),
    }
}

fn container(config_dir: &Path) -> CliResult<ServiceContainer> {
    let settings = Settings::load(Some(config_dir))?;
    debug!("settings: {:?}", settings);
    Ok(ServiceContainer::new(settings)?)
}

/// Print load and reorder failures the store reported since the last drain.
fn report_events(events: &mut Receiver<TreeEvent>) {
    loop {
        match events.try_recv() {
            Ok(TreeEvent::ForestPublished { generation }) => {
                debug!("forest generation {generation}")
            }
            Ok(TreeEvent::LoadFailed { key, message }) => match key {
                Some(key) => output::warning(&format!("cannot expand {key}: {message}")),
                None => output::warning(&format!("cannot load roots: {message}")),
            },
            Ok(TreeEvent::ReorderFailed { key, message }) => {
                output::warning(&format!("cannot move {key}: {message}"))
            }
            Ok(TreeEvent::CompensationFailed { key, message }) => output::error(&format!(
                "{key} may be out of order on the server: {message}"
            )),
            Err(TryRecvError::Lagged(n)) => debug!("skipped {n} events"),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

fn render(services: &ServiceContainer) {
    let forest = services.store.current_forest();
    let selected = services.store.selected_leaf();
    let options = RenderOptions {
        locale: &services.settings.locale,
        selected: selected.as_ref(),
    };
    output::info(&forest.to_tree_string(&options));
}

#[instrument]
async fn _tree(config_dir: &Path) -> CliResult<()> {
    let services = container(config_dir)?;
    services.store.initialize().await?;
    render(&services);
    Ok(())
}

/// Expand each id in order; a failed expansion is reported and skipped.
async fn expand_all(services: &ServiceContainer, ids: &[String]) {
    let mut events = services.store.subscribe();
    for id in ids {
        if services.store.expand(&CategoryId::new(id.as_str())).await.is_err() {
            debug!("expand {id} failed");
        }
        report_events(&mut events);
    }
}

#[instrument]
async fn _expand(config_dir: &Path, ids: &[String]) -> CliResult<()> {
    let services = container(config_dir)?;
    services.store.initialize().await?;
    expand_all(&services, ids).await;
    render(&services);
    Ok(())
}

#[instrument]
async fn _move(
    config_dir: &Path,
    id: &str,
    direction: Direction,
    expand: &[String],
) -> CliResult<()> {
    let services = container(config_dir)?;
    services.store.initialize().await?;
    expand_all(&services, expand).await;

    let key = CategoryId::from(id);
    if !services.reorder.can_move_key(&key, direction) {
        output::warning(&format!("{id} cannot move {direction}"));
        render(&services);
        return Ok(());
    }

    if services.reorder.move_key(&key, direction).await? {
        output::success(&format!("moved {id} {direction}"));
    }
    render(&services);
    Ok(())
}

fn _config(config_dir: &Path, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(config_dir))?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            output::header("Config files");
            let global = global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no config directory)".to_string());
            output::detail(&format!("global: {global}"));
            output::detail(&format!(
                "local:  {}",
                local_config_path(config_dir).display()
            ));
        }
        ConfigCommands::Init { force } => {
            let path: PathBuf = local_config_path(config_dir);
            if path.exists() && !force {
                return Err(CliError::Usage(format!(
                    "{} exists, use --force to overwrite",
                    path.display()
                )));
            }
            std::fs::write(&path, Settings::template()).map_err(|e| CliError::Io {
                context: format!("write {}", path.display()),
                source: e,
            })?;
            output::action("Created", &path.display());
        }
    }
    Ok(())
}
