use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use common::predict::{format_number_plate, time_gauge, workload_bar_tier};
use common::{
    report_file_name, run_push_channel, time::parse_timestamp, Assignment, DashboardApi,
    DashboardConfig, HttpApi, PushEvent, ReconnectConfig, ServiceRequestForm,
};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI del cliente: pedir turno, bajar reportes y ver la carga del taller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pide una predicción y asignación de mecánico
    Predict(PredictArgs),
    /// Descarga el PDF de un servicio
    Report {
        #[arg(value_name = "SERVICE_ID")]
        service_id: String,

        /// Carpeta de salida (default: VSIS_REPORTS_DIR)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Sigue el canal push e imprime la carga en cada actualización
    Watch,
}

#[derive(Args, Debug, Default)]
struct PredictArgs {
    /// Carga los datos de demo (los flags explícitos pisan a estos)
    #[arg(long)]
    sample: bool,

    #[arg(long)]
    car_model: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    fuel_type: Option<String>,
    #[arg(long)]
    service_type: Option<String>,
    #[arg(long)]
    plate: Option<String>,
    /// Fecha del último service (AAAA-MM-DD)
    #[arg(long)]
    last_service: Option<NaiveDate>,
    #[arg(long)]
    total_km: Option<String>,
    #[arg(long)]
    km_since_service: Option<i64>,
    /// Repetible: --task engine_oil --task air_filter
    #[arg(long = "task", value_name = "TASK")]
    tasks: Vec<String>,

    /// Si sale bien, baja también el reporte
    #[arg(long)]
    download: bool,
}

impl PredictArgs {
    fn to_form(&self) -> ServiceRequestForm {
        let mut form = if self.sample {
            ServiceRequestForm::sample()
        } else {
            ServiceRequestForm::default()
        };

        let text_fields = [
            (&mut form.car_model, &self.car_model),
            (&mut form.manufacture_year, &self.year),
            (&mut form.fuel_type, &self.fuel_type),
            (&mut form.service_type, &self.service_type),
            (&mut form.number_plate, &self.plate),
            (&mut form.total_km, &self.total_km),
        ];
        for (field, value) in text_fields {
            if let Some(v) = value {
                *field = v.clone();
            }
        }
        if self.last_service.is_some() {
            form.last_service_date = self.last_service;
            // la fecha nueva manda: se vuelven a derivar días y km
            form.km_since_last_service = None;
            form.days_since_last_service = None;
        }
        if self.km_since_service.is_some() {
            form.km_since_last_service = self.km_since_service;
        }
        if !self.tasks.is_empty() {
            form.selected_tasks = self.tasks.clone();
        }
        form
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::from_env();
    let api = HttpApi::with_client(Client::new(), config.base_url.clone());

    match cli.command {
        Commands::Predict(args) => {
            let form = args.to_form();
            let request = match form.validate(Local::now().date_naive()) {
                Ok(req) => req,
                Err(e) => {
                    // validación local: no se llama al servidor
                    println!("Error: {}", e);
                    return Ok(());
                }
            };

            println!(
                "Pidiendo predicción para {} ({})...",
                request.car_model,
                format_number_plate(&request.number_plate)
            );
            let assignment = api.predict(&request).await?.into_assignment()?;
            info!("servicio {} asignado", assignment.service_id);

            for line in assignment_lines(&assignment) {
                println!("{line}");
            }

            if args.download {
                save_report(&api, &assignment.service_id, &config.reports_dir).await?;
            }
        }

        Commands::Report { service_id, out } => {
            let dir = out.unwrap_or_else(|| config.reports_dir.clone());
            save_report(&api, &service_id, &dir).await?;
        }

        Commands::Watch => watch(&config).await,
    }

    Ok(())
}

async fn save_report(api: &HttpApi, service_id: &str, dir: &Path) -> Result<()> {
    let bytes = api.generate_report(service_id).await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report_file_name(service_id));
    tokio::fs::write(&path, &bytes).await?;
    println!("Reporte guardado en {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Imprime total de trabajos activos y mecánicos libres en cada
/// `workload_update` hasta ctrl-c.
async fn watch(config: &DashboardConfig) {
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(run_push_channel(
        config.push_url.clone(),
        ReconnectConfig::default(),
        tx,
        cancel.clone(),
    ));
    println!("Escuchando {} (ctrl-c para salir)", config.push_url);

    loop {
        let msg = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        match msg {
            Ok(PushEvent::WorkloadUpdate(w)) => {
                println!(
                    "[{}] trabajos activos: {} | mecánicos disponibles: {}",
                    Local::now().format("%H:%M:%S"),
                    w.summary.total_active_jobs.unwrap_or(0),
                    w.summary.available_workers.unwrap_or(0),
                );
            }
            Ok(_) => {}
            Err(e) => warn!("evento inválido: {}", e),
        }
    }

    cancel.cancel();
}

/// Resumen legible de una asignación.
fn assignment_lines(a: &Assignment) -> Vec<String> {
    let mut lines = Vec::new();
    let (gauge, gauge_tier) = time_gauge(a.predicted_time);

    lines.push("Servicio agendado:".to_string());
    lines.push(format!("  id: {}", a.service_id));
    lines.push(format!(
        "  tiempo estimado: {:.1} h ({:.0}% de la escala, {})",
        a.predicted_time,
        gauge,
        gauge_tier.as_str()
    ));

    let w = &a.worker;
    match (&w.worker_id, w.queue_position) {
        (None, Some(pos)) => {
            lines.push(format!("  en cola: posición {pos}"));
            if let Some(wait) = w.estimated_wait_time {
                lines.push(format!("  espera estimada: {:.1} h", wait));
            }
        }
        _ => {
            lines.push(format!(
                "  mecánico: {}",
                w.worker_name.as_deref().unwrap_or("Not assigned")
            ));
            if let Some(spec) = &w.specialization {
                lines.push(format!("  especialidad: {spec}"));
            }
            if let Some(rating) = w.rating {
                lines.push(format!("  rating: {:.1}/5", rating));
            }
            if let Some(pct) = w.workload_percentage {
                lines.push(format!(
                    "  carga del mecánico: {:.0}% ({})",
                    pct,
                    workload_bar_tier(pct).as_str()
                ));
            }
        }
    }

    if let Some(done) = w.completion_time.as_deref().and_then(parse_timestamp) {
        lines.push(format!("  listo aprox.: {}", done.format("%Y-%m-%d %H:%M")));
    }

    if a.inventory.available {
        lines.push("  repuestos: ✅ todos disponibles".to_string());
    } else {
        lines.push("  repuestos: ⚠️ faltan algunos".to_string());
        for p in &a.inventory.unavailable_parts {
            lines.push(format!(
                "    - {}: requiere {}, hay {}",
                p.part, p.required, p.available
            ));
        }
    }

    lines.push(format!(
        "  posición en la cola: {} ({} autos adelante)",
        a.queue.queue_position(),
        a.queue.cars_ahead()
    ));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PredictResponse;
    use serde_json::json;

    fn assignment(raw: serde_json::Value) -> Assignment {
        serde_json::from_value::<PredictResponse>(raw)
            .unwrap()
            .into_assignment()
            .unwrap()
    }

    #[test]
    fn resumen_de_asignacion_con_mecanico() {
        let a = assignment(json!({
            "success": true,
            "service_id": "SRV_20240501",
            "predicted_time": 4.0,
            "worker_assigned": {
                "worker_id": "W3",
                "worker_name": "Ana",
                "specialization": "Engine",
                "rating": 4.7,
                "workload_percentage": 55.0
            },
            "inventory_status": {"available": true},
            "queue_info": {"total_active_jobs": 3}
        }));

        let lines = assignment_lines(&a);

        assert!(lines.contains(&"  id: SRV_20240501".to_string()));
        assert!(lines.contains(&"  tiempo estimado: 4.0 h (50% de la escala, amber)".to_string()));
        assert!(lines.contains(&"  mecánico: Ana".to_string()));
        assert!(lines.contains(&"  carga del mecánico: 55% (amber)".to_string()));
        assert!(lines.contains(&"  posición en la cola: 4 (3 autos adelante)".to_string()));
    }

    #[test]
    fn resumen_de_servicio_encolado_y_sin_repuestos() {
        let a = assignment(json!({
            "success": true,
            "service_id": "QUEUE_1",
            "predicted_time": 9.0,
            "worker_assigned": {"worker_name": "Queue", "queue_position": 2, "estimated_wait_time": 1.5},
            "inventory_status": {"available": false, "unavailable_parts": [
                {"part": "brake_pads", "required": 1, "available": 0}
            ]}
        }));

        let lines = assignment_lines(&a);

        assert!(lines.contains(&"  tiempo estimado: 9.0 h (100% de la escala, red)".to_string()));
        assert!(lines.contains(&"  en cola: posición 2".to_string()));
        assert!(lines.contains(&"    - brake_pads: requiere 1, hay 0".to_string()));
        assert!(lines.contains(&"  posición en la cola: 1 (0 autos adelante)".to_string()));
    }

    #[test]
    fn flags_pisan_al_sample() {
        let args = PredictArgs {
            sample: true,
            plate: Some("ka-01 mn 9999".into()),
            tasks: vec!["brake_pads".into()],
            ..Default::default()
        };

        let form = args.to_form();

        assert_eq!(form.car_model, "XC60");
        assert_eq!(form.number_plate, "ka-01 mn 9999");
        assert_eq!(form.selected_tasks, vec!["brake_pads".to_string()]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(form.validate(today).unwrap().number_plate, "KA01MN9999");
    }

    #[test]
    fn sin_sample_ni_flags_no_valida() {
        let form = PredictArgs::default().to_form();
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(form.validate(today).is_err());
    }
}
