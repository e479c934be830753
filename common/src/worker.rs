use serde::{Deserialize, Serialize};

pub type WorkerId = String;

pub const DEFAULT_MAX_JOBS: u32 = 3;
pub const DEFAULT_RATING: f64 = 4.5;
pub const DEFAULT_STATUS_TEXT: &str = "Available";
pub const DEFAULT_SPECIALIZATION: &str = "General Maintenance";

/// Clasificación de carga que calcula el servidor.
/// El cliente no la recalcula a partir del porcentaje.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

/// Franja de color con la que se pinta una carga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Green,
    Amber,
    Red,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Green => "green",
            Tier::Amber => "amber",
            Tier::Red => "red",
        }
    }
}

impl WorkerStatus {
    /// Un status desconocido se pinta como carga baja.
    pub fn tier(&self) -> Tier {
        match self {
            WorkerStatus::Medium => Tier::Amber,
            WorkerStatus::High => Tier::Red,
            WorkerStatus::Low | WorkerStatus::Unknown => Tier::Green,
        }
    }
}

/// Foto de un mecánico tal como la manda el servidor.
/// Se reemplaza entera en cada actualización.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub current_jobs: Option<u32>,
    #[serde(default)]
    pub max_jobs: Option<u32>,
    /// 0–100
    #[serde(default)]
    pub workload_percentage: Option<f64>,
    #[serde(default)]
    pub status: Option<WorkerStatus>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub jobs_list: Vec<String>,
}

impl WorkerSnapshot {
    pub fn status(&self) -> WorkerStatus {
        self.status.unwrap_or(WorkerStatus::Unknown)
    }

    pub fn current_jobs(&self) -> u32 {
        self.current_jobs.unwrap_or(0)
    }

    pub fn max_jobs(&self) -> u32 {
        self.max_jobs.unwrap_or(DEFAULT_MAX_JOBS)
    }

    pub fn rating(&self) -> f64 {
        self.rating.unwrap_or(DEFAULT_RATING)
    }

    pub fn workload_percentage(&self) -> f64 {
        self.workload_percentage.unwrap_or(0.0)
    }

    pub fn specialization(&self) -> &str {
        self.specialization
            .as_deref()
            .unwrap_or(DEFAULT_SPECIALIZATION)
    }

    pub fn status_text(&self) -> &str {
        self.status_text.as_deref().unwrap_or(DEFAULT_STATUS_TEXT)
    }
}
