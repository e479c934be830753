use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::time::parse_timestamp;

pub type ServiceId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarDetails {
    pub car_model: String,
    pub service_type: String,
}

/// Datos de asignación. En servicios encolados llega sin `worker_id`
/// ni `completion_time`, solo con la posición en la cola.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub worker_name: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub completion_time: Option<String>,
    #[serde(default)]
    pub workload_percentage: Option<f64>,
    // opacos: los calcula el servidor, acá solo se muestran
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_wait_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service_id: ServiceId,
    pub car_details: CarDetails,
    /// Horas.
    pub predicted_time: f64,
    #[serde(default)]
    pub completion_time: Option<String>,
    #[serde(default)]
    pub worker_assigned: Option<WorkerAssignment>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Avance calculado de un servicio con hora de fin conocida.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceProgress {
    pub completion: DateTime<Local>,
    /// Horas restantes, nunca negativas.
    pub remaining_hours: f64,
    /// 0–100
    pub percent: f64,
}

impl ServiceRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Hora de fin: primero la del registro, si no la de la asignación.
    pub fn completion_time(&self) -> Option<DateTime<Local>> {
        self.completion_time
            .as_deref()
            .or_else(|| {
                self.worker_assigned
                    .as_ref()
                    .and_then(|w| w.completion_time.as_deref())
            })
            .and_then(parse_timestamp)
    }

    /// Sin mecánico asignado el servicio está en cola.
    pub fn is_queued(&self) -> bool {
        match &self.worker_assigned {
            None => true,
            Some(w) => w.worker_id.is_none() && self.completion_time().is_none(),
        }
    }

    pub fn worker_name(&self) -> Option<&str> {
        self.worker_assigned
            .as_ref()
            .and_then(|w| w.worker_name.as_deref())
    }

    pub fn progress(&self, now: DateTime<Local>) -> Option<ServiceProgress> {
        let completion = self.completion_time()?;
        let remaining_ms = (completion - now).num_milliseconds().max(0);
        let remaining_hours = remaining_ms as f64 / 3_600_000.0;

        let fraction = if self.predicted_time > 0.0 {
            1.0 - remaining_hours / self.predicted_time
        } else if remaining_hours == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(ServiceProgress {
            completion,
            remaining_hours,
            percent: fraction.clamp(0.0, 1.0) * 100.0,
        })
    }

    pub fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at.as_deref().and_then(parse_timestamp)
    }
}
