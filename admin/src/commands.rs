//! Acciones que dispara el usuario desde el dashboard.

use common::{report_file_name, DashboardApi, DashboardError, Notification};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Acciones contra el servidor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Restock(String),
    Complete(String),
    Report(String),
    Refresh,
}

/// Una línea de stdin: una acción o la orden de salir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Run(Command),
    Quit,
}

impl FromStr for Input {
    type Err = DashboardError;

    /// `restock <part_id>`, `complete <id>`, `report <id>`, `refresh` o `quit`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next().map(str::to_string);

        let needs_arg = |what: &str| {
            arg.clone()
                .ok_or_else(|| DashboardError::validation("command", format!("usage: {verb} <{what}>")))
        };

        let command = match verb.as_str() {
            "restock" => Command::Restock(needs_arg("part_id")?),
            "complete" => Command::Complete(needs_arg("service_id")?),
            "report" => Command::Report(needs_arg("service_id")?),
            "refresh" | "r" => Command::Refresh,
            "quit" | "q" | "exit" => return Ok(Input::Quit),
            "" => return Err(DashboardError::validation("command", "empty command")),
            other => {
                return Err(DashboardError::validation(
                    "command",
                    format!("unknown command '{other}' (restock, complete, report, refresh, quit)"),
                ))
            }
        };
        Ok(Input::Run(command))
    }
}

/// Resultado de una acción: qué mostrar y si hay que recargar todo.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub notification: Notification,
    pub reload: bool,
}

impl Outcome {
    fn ok(notification: Notification) -> Self {
        Self {
            notification,
            reload: true,
        }
    }

    fn failed(context: &str, err: &DashboardError) -> Self {
        Self {
            notification: Notification::failure(context, err),
            reload: false,
        }
    }
}

/// Ejecuta una acción contra el servidor.
pub async fn execute<A: DashboardApi>(api: &A, command: &Command, reports_dir: &Path) -> Outcome {
    debug!("ejecutando {:?}", command);
    match command {
        Command::Restock(part_id) => {
            match api.restock(part_id).await.and_then(|r| r.into_result()) {
                Ok(msg) => Outcome::ok(Notification::success(
                    msg.unwrap_or_else(|| format!("{part_id} restocked successfully")),
                )),
                Err(e) => Outcome::failed("Restock failed", &e),
            }
        }
        Command::Complete(service_id) => {
            match api
                .complete_service(service_id)
                .await
                .and_then(|r| r.into_result())
            {
                Ok(_) => Outcome::ok(Notification::success(format!(
                    "Service {service_id} marked as complete"
                ))),
                Err(e) => Outcome::failed("Failed to complete service", &e),
            }
        }
        Command::Report(service_id) => match download_report(api, service_id, reports_dir).await {
            Ok(path) => Outcome::ok(Notification::success(format!(
                "Report saved to {}",
                path.display()
            ))),
            Err(e) => Outcome::failed("Failed to generate report", &e),
        },
        Command::Refresh => Outcome::ok(Notification::info("Data refreshed manually")),
    }
}

/// Baja el PDF y lo guarda como `<service_id>_report.pdf`.
pub async fn download_report<A: DashboardApi>(
    api: &A,
    service_id: &str,
    dir: &Path,
) -> Result<PathBuf, DashboardError> {
    let bytes = api.generate_report(service_id).await?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DashboardError::Io(format!("no se pudo crear {}: {e}", dir.display())))?;
    let path = dir.join(report_file_name(service_id));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| DashboardError::Io(format!("no se pudo escribir {}: {e}", path.display())))?;

    info!("reporte guardado en {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}
