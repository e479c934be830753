use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DashboardError;
use crate::worker::WorkerSnapshot;

/// Umbral (en %) bajo el cual un worker cuenta como disponible
/// cuando hay que sintetizar el resumen.
pub const AVAILABLE_BELOW_PERCENT: f64 = 70.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    #[serde(default)]
    pub total_workers: Option<u32>,
    #[serde(default)]
    pub total_active_jobs: Option<u32>,
    #[serde(default)]
    pub available_workers: Option<u32>,
    #[serde(default)]
    pub queued_services: Option<u32>,
    #[serde(default)]
    pub total_capacity_utilization: Option<f64>,
}

impl SummaryStats {
    /// Resumen derivado para la forma legacy (lista pelada de workers).
    /// La forma legacy no sabe nada de la cola ni de la capacidad,
    /// así que esos campos quedan en 0.
    pub fn derive_from(workers: &[WorkerSnapshot]) -> Self {
        let total_active_jobs = workers.iter().map(|w| w.current_jobs()).sum();
        let available_workers = workers
            .iter()
            .filter(|w| w.workload_percentage() < AVAILABLE_BELOW_PERCENT)
            .count() as u32;

        Self {
            total_workers: Some(workers.len() as u32),
            total_active_jobs: Some(total_active_jobs),
            available_workers: Some(available_workers),
            queued_services: Some(0),
            total_capacity_utilization: Some(0.0),
        }
    }
}

/// Las dos formas que puede tomar un reporte de carga en el cable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WorkloadReport {
    Current {
        workers: Vec<WorkerSnapshot>,
        summary: SummaryStats,
    },
    Legacy(Vec<WorkerSnapshot>),
}

/// Forma canónica que consumen los renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub workers: Vec<WorkerSnapshot>,
    pub summary: SummaryStats,
}

impl From<WorkloadReport> for Workload {
    fn from(report: WorkloadReport) -> Self {
        match report {
            WorkloadReport::Current { workers, summary } => Workload { workers, summary },
            WorkloadReport::Legacy(workers) => {
                let summary = SummaryStats::derive_from(&workers);
                Workload { workers, summary }
            }
        }
    }
}

/// Normaliza cualquier payload de carga (push, carga inicial, poll, recarga
/// tras una acción) a `{workers, summary}`.
pub fn normalize_workload(raw: Value) -> Result<Workload, DashboardError> {
    let shape_ok = match &raw {
        Value::Object(map) => map.contains_key("workers") && map.contains_key("summary"),
        Value::Array(_) => true,
        _ => false,
    };
    if !shape_ok {
        return Err(DashboardError::MalformedData(
            "invalid workload data structure received".to_string(),
        ));
    }

    let report: WorkloadReport =
        serde_json::from_value(raw).map_err(|e| DashboardError::malformed("workload", e))?;
    Ok(report.into())
}
