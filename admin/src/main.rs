mod commands;
mod dashboard;
mod page;
mod render;
mod state;
mod view;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use common::{DashboardConfig, HttpApi, NoticeKind};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{execute, Command};
use crate::dashboard::Dashboard;
use crate::page::HtmlPage;
use crate::render::Templates;
use crate::state::{load_snapshot, DashboardState};
use crate::view::RenderTarget;

#[derive(Parser)]
#[command(name = "admin")]
#[command(about = "Dashboard de administración del taller")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sigue el canal push y el poll, y mantiene la página al día (default)
    Watch,
    /// Repone 5 unidades de un repuesto
    Restock {
        #[arg(value_name = "PART_ID")]
        part_id: String,
    },
    /// Marca un servicio como terminado
    Complete {
        #[arg(value_name = "SERVICE_ID")]
        service_id: String,
    },
    /// Descarga el PDF de un servicio
    Report {
        #[arg(value_name = "SERVICE_ID")]
        service_id: String,
    },
    /// Una recarga completa y sale
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("admin=debug,common=debug,reqwest=info")
        .init();

    let cli = Cli::parse();
    let config = DashboardConfig::from_env();
    let api = HttpApi::with_client(Client::new(), config.base_url.clone());
    let templates = Templates::new()?;
    info!("servidor en {}", config.base_url);

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            let cancel = CancellationToken::new();
            let page = HtmlPage::new(config.output.clone(), config.toast_ttl, Templates::new()?);
            let dashboard = Dashboard::new(
                api,
                page,
                templates,
                config.reports_dir.clone(),
                cancel.clone(),
            );
            dashboard.spawn_inputs(&config);

            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("ctrl-c, cerrando");
                    on_signal.cancel();
                }
            });

            info!(
                "dashboard en {} (poll cada {:?}); comandos: restock, complete, report, refresh, quit",
                config.output.display(),
                config.poll_interval
            );
            dashboard.run().await;
        }

        Commands::Refresh => {
            let page = HtmlPage::new(config.output.clone(), config.toast_ttl, Templates::new()?);
            let mut state = DashboardState::new(page, templates);
            state.apply_snapshot_result(load_snapshot(&api).await, Local::now());
            state.target_mut().flush().await?;
            if let Some(err) = state
                .target()
                .view()
                .notification_history()
                .find(|n| n.kind == NoticeKind::Error)
            {
                anyhow::bail!(err.message.clone());
            }
            println!("Página escrita en {}", config.output.display());
        }

        Commands::Restock { part_id } => {
            run_action(&api, Command::Restock(part_id), &config).await?
        }
        Commands::Complete { service_id } => {
            run_action(&api, Command::Complete(service_id), &config).await?
        }
        Commands::Report { service_id } => {
            run_action(&api, Command::Report(service_id), &config).await?
        }
    }

    Ok(())
}

/// Acción suelta desde la línea de comandos: imprime el resultado y
/// falla el proceso si el servidor la rechazó.
async fn run_action(api: &HttpApi, command: Command, config: &DashboardConfig) -> Result<()> {
    let outcome = execute(api, &command, &config.reports_dir).await;
    if outcome.notification.kind == NoticeKind::Error {
        warn!("{}", outcome.notification.message);
        anyhow::bail!(outcome.notification.message);
    }
    println!("{}", outcome.notification.message);
    Ok(())
}
