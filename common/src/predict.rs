use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DashboardError;
use crate::service::{ServiceId, WorkerAssignment};
use crate::worker::Tier;

/// Tareas que el taller sabe cotizar.
pub const TASK_CATALOG: &[&str] = &[
    "engine_oil",
    "air_filter",
    "spark_plugs",
    "brake_pads",
    "brake_fluid",
    "wheel_alignment",
    "tire_rotation",
    "ac_service",
    "ac_filter",
];

const MIN_PLATE_CHARS: usize = 5;
const MAX_PLATE_DISPLAY_LEN: usize = 13;
const KM_PER_DAY: i64 = 40;
const MIN_KM_ESTIMATE: i64 = 1000;
/// Tope de la escala del gauge de tiempo (horas).
const GAUGE_MAX_HOURS: f64 = 8.0;

/// Valores tal como los tipea el usuario (todo texto, como en un form).
#[derive(Debug, Clone, Default)]
pub struct ServiceRequestForm {
    pub car_model: String,
    pub manufacture_year: String,
    pub fuel_type: String,
    pub service_type: String,
    pub number_plate: String,
    pub last_service_date: Option<NaiveDate>,
    pub total_km: String,
    pub km_since_last_service: Option<i64>,
    pub days_since_last_service: Option<i64>,
    pub selected_tasks: Vec<String>,
}

/// Body de `POST /predict`. Los opcionales que faltan no viajan: el
/// servidor completa sus defaults solo si la clave no está.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub car_model: String,
    pub manufacture_year: i32,
    pub fuel_type: String,
    pub service_type: String,
    pub number_plate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_service_date: Option<NaiveDate>,
    pub total_km: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub km_since_last_service: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_last_service: Option<i64>,
    pub selected_tasks: Vec<String>,
}

impl ServiceRequestForm {
    /// Datos de demo para probar el flujo completo.
    pub fn sample() -> Self {
        Self {
            car_model: "XC60".to_string(),
            manufacture_year: "2022".to_string(),
            fuel_type: "Petrol".to_string(),
            service_type: "Regular".to_string(),
            number_plate: "MH12AB1234".to_string(),
            last_service_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            total_km: "35000".to_string(),
            km_since_last_service: Some(5000),
            days_since_last_service: None,
            selected_tasks: vec![
                "engine_oil".to_string(),
                "air_filter".to_string(),
                "brake_fluid".to_string(),
            ],
        }
    }

    /// Valida y arma la petición. Si falla no se debe llamar al servidor.
    pub fn validate(&self, today: NaiveDate) -> Result<PredictRequest, DashboardError> {
        let required = [
            ("car_model", &self.car_model),
            ("manufacture_year", &self.manufacture_year),
            ("fuel_type", &self.fuel_type),
            ("service_type", &self.service_type),
            ("number_plate", &self.number_plate),
            ("total_km", &self.total_km),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DashboardError::validation(
                    field,
                    format!("Please fill in the {} field", field.replace('_', " ")),
                ));
            }
        }

        if self.selected_tasks.is_empty() {
            return Err(DashboardError::validation(
                "selected_tasks",
                "Please select at least one service task",
            ));
        }
        if let Some(unknown) = self
            .selected_tasks
            .iter()
            .find(|t| !TASK_CATALOG.contains(&t.as_str()))
        {
            return Err(DashboardError::validation(
                "selected_tasks",
                format!("Unknown service task '{unknown}'"),
            ));
        }

        let plate = normalize_plate(&self.number_plate);
        if plate.len() < MIN_PLATE_CHARS {
            return Err(DashboardError::validation(
                "number_plate",
                "Please enter a valid number plate",
            ));
        }

        let manufacture_year: i32 = parse_number("manufacture_year", &self.manufacture_year)?;
        let total_km: i64 = parse_number("total_km", &self.total_km)?;

        let days_since_last_service = self
            .days_since_last_service
            .or_else(|| self.last_service_date.map(|d| days_since(d, today)));
        let km_since_last_service = self.km_since_last_service.or_else(|| {
            days_since_last_service.and_then(|days| estimate_km_since_service(total_km, days))
        });

        Ok(PredictRequest {
            car_model: self.car_model.trim().to_string(),
            manufacture_year,
            fuel_type: self.fuel_type.trim().to_string(),
            service_type: self.service_type.trim().to_string(),
            number_plate: plate,
            last_service_date: self.last_service_date,
            total_km,
            km_since_last_service,
            days_since_last_service,
            selected_tasks: self.selected_tasks.clone(),
        })
    }
}

fn parse_number<T: FromStr>(field: &str, raw: &str) -> Result<T, DashboardError> {
    raw.trim().parse::<T>().map_err(|_| {
        DashboardError::validation(field, format!("The {} field must be a number", field.replace('_', " ")))
    })
}

/// Patente en mayúsculas y sin nada que no sea alfanumérico.
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Formato de lectura: `MH 12 AB 1234`.
pub fn format_number_plate(raw: &str) -> String {
    let mut value = normalize_plate(raw);
    for pos in [2, 5, 8] {
        if value.len() > pos {
            value.insert(pos, ' ');
        }
    }
    value.truncate(MAX_PLATE_DISPLAY_LEN);
    value
}

pub fn days_since(last_service: NaiveDate, today: NaiveDate) -> i64 {
    (today - last_service).num_days().abs()
}

/// Estimación de km desde el último service: ~40 km por día,
/// al menos 1000 y nunca más que el total.
pub fn estimate_km_since_service(total_km: i64, days: i64) -> Option<i64> {
    if total_km <= 0 {
        return None;
    }
    Some(total_km.min((days * KM_PER_DAY).max(MIN_KM_ESTIMATE)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub available: bool,
    #[serde(default)]
    pub unavailable_parts: Vec<UnavailablePart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailablePart {
    pub part: String,
    pub required: i64,
    pub available: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    #[serde(default)]
    pub total_active_jobs: u32,
    #[serde(default)]
    pub available_workers: Option<u32>,
    #[serde(default)]
    pub queued_services: Option<u32>,
}

impl QueueInfo {
    pub fn queue_position(&self) -> u32 {
        self.total_active_jobs + 1
    }

    pub fn cars_ahead(&self) -> u32 {
        self.total_active_jobs
    }
}

/// Respuesta cruda de `POST /predict`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    #[serde(default)]
    pub predicted_time: Option<f64>,
    #[serde(default)]
    pub worker_assigned: Option<WorkerAssignment>,
    #[serde(default)]
    pub inventory_status: Option<InventoryStatus>,
    #[serde(default)]
    pub queue_info: Option<QueueInfo>,
}

/// Asignación confirmada, lista para mostrar.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub service_id: ServiceId,
    pub predicted_time: f64,
    pub worker: WorkerAssignment,
    pub inventory: InventoryStatus,
    pub queue: QueueInfo,
}

impl PredictResponse {
    pub fn into_assignment(self) -> Result<Assignment, DashboardError> {
        if !self.success {
            return Err(DashboardError::Rejected(
                self.error.unwrap_or_else(|| "Prediction failed".to_string()),
            ));
        }
        let service_id = self
            .service_id
            .ok_or_else(|| DashboardError::MalformedData("predict: missing service_id".into()))?;
        let predicted_time = self
            .predicted_time
            .ok_or_else(|| DashboardError::MalformedData("predict: missing predicted_time".into()))?;

        Ok(Assignment {
            service_id,
            predicted_time,
            worker: self.worker_assigned.unwrap_or_default(),
            inventory: self.inventory_status.unwrap_or_default(),
            queue: self.queue_info.unwrap_or_default(),
        })
    }
}

/// Porcentaje del gauge de tiempo y su color.
pub fn time_gauge(hours: f64) -> (f64, Tier) {
    let percent = (hours / GAUGE_MAX_HOURS * 100.0).min(100.0);
    let tier = if hours <= 3.0 {
        Tier::Green
    } else if hours <= 5.0 {
        Tier::Amber
    } else {
        Tier::Red
    };
    (percent, tier)
}

/// Color de la barra de carga del mecánico asignado.
pub fn workload_bar_tier(percent: f64) -> Tier {
    if percent < 40.0 {
        Tier::Green
    } else if percent < 70.0 {
        Tier::Amber
    } else {
        Tier::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn sample_valida_y_completa_derivados() {
        let req = ServiceRequestForm::sample().validate(today()).unwrap();

        assert_eq!(req.number_plate, "MH12AB1234");
        assert_eq!(req.manufacture_year, 2022);
        assert_eq!(req.total_km, 35000);
        // 2024-01-15 -> 2024-03-15
        assert_eq!(req.days_since_last_service, Some(60));
        // los km vienen dados en el sample
        assert_eq!(req.km_since_last_service, Some(5000));
    }

    #[test]
    fn campo_requerido_vacio_bloquea() {
        let form = ServiceRequestForm {
            car_model: "  ".to_string(),
            ..ServiceRequestForm::sample()
        };

        match form.validate(today()) {
            Err(DashboardError::ValidationFailure { field, message }) => {
                assert_eq!(field, "car_model");
                assert_eq!(message, "Please fill in the car model field");
            }
            other => panic!("esperaba ValidationFailure, llegó {other:?}"),
        }
    }

    #[test]
    fn sin_tareas_bloquea() {
        let form = ServiceRequestForm {
            selected_tasks: vec![],
            ..ServiceRequestForm::sample()
        };
        let err = form.validate(today()).unwrap_err();
        assert!(matches!(
            err,
            DashboardError::ValidationFailure { ref field, .. } if field == "selected_tasks"
        ));
    }

    #[test]
    fn tarea_fuera_de_catalogo_bloquea() {
        let form = ServiceRequestForm {
            selected_tasks: vec!["engine_oil".into(), "pintura".into()],
            ..ServiceRequestForm::sample()
        };
        assert!(form.validate(today()).is_err());
    }

    #[test]
    fn patente_corta_bloquea() {
        let form = ServiceRequestForm {
            number_plate: "mh-1 2".to_string(),
            ..ServiceRequestForm::sample()
        };
        match form.validate(today()) {
            Err(DashboardError::ValidationFailure { field, .. }) => {
                assert_eq!(field, "number_plate")
            }
            other => panic!("esperaba ValidationFailure, llegó {other:?}"),
        }
    }

    #[test]
    fn anio_no_numerico_bloquea() {
        let form = ServiceRequestForm {
            manufacture_year: "dos mil".to_string(),
            ..ServiceRequestForm::sample()
        };
        assert!(form.validate(today()).is_err());
    }

    #[test]
    fn anio_fuera_de_rango_bloquea() {
        let form = ServiceRequestForm {
            manufacture_year: "99999999999".to_string(),
            ..ServiceRequestForm::sample()
        };
        match form.validate(today()) {
            Err(DashboardError::ValidationFailure { field, .. }) => {
                assert_eq!(field, "manufacture_year")
            }
            other => panic!("esperaba ValidationFailure, llegó {other:?}"),
        }
    }

    #[test]
    fn opcionales_ausentes_no_viajan_como_null() {
        let form = ServiceRequestForm {
            last_service_date: None,
            km_since_last_service: None,
            ..ServiceRequestForm::sample()
        };
        let req = form.validate(today()).unwrap();

        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("last_service_date").is_none());
        assert!(body.get("km_since_last_service").is_none());
        assert!(body.get("days_since_last_service").is_none());
        assert_eq!(body["total_km"], 35000);
    }

    #[test]
    fn opcionales_presentes_si_viajan() {
        let req = ServiceRequestForm::sample().validate(today()).unwrap();

        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["last_service_date"], "2024-01-15");
        assert_eq!(body["km_since_last_service"], 5000);
        assert_eq!(body["days_since_last_service"], 60);
    }

    #[test]
    fn km_se_estiman_si_faltan() {
        let form = ServiceRequestForm {
            km_since_last_service: None,
            ..ServiceRequestForm::sample()
        };
        let req = form.validate(today()).unwrap();
        // 60 días * 40 km = 2400
        assert_eq!(req.km_since_last_service, Some(2400));
    }

    #[test]
    fn estimacion_de_km_respeta_minimo_y_total() {
        assert_eq!(estimate_km_since_service(35000, 3), Some(1000));
        assert_eq!(estimate_km_since_service(500, 300), Some(500));
        assert_eq!(estimate_km_since_service(0, 300), None);
    }

    #[test]
    fn formato_de_patente() {
        assert_eq!(format_number_plate("mh12ab1234"), "MH 12 AB 1234");
        assert_eq!(format_number_plate("MH 12-AB"), "MH 12 AB");
        assert_eq!(format_number_plate("mh"), "MH");
        assert_eq!(format_number_plate("MH12AB123456789"), "MH 12 AB 1234");
    }

    #[test]
    fn respuesta_exitosa_a_asignacion() {
        let resp: PredictResponse = serde_json::from_value(json!({
            "success": true,
            "service_id": "SRV_1",
            "predicted_time": 2.5,
            "worker_assigned": {"worker_id": "W1", "worker_name": "Ana", "workload_percentage": 45.0},
            "inventory_status": {"available": true, "required_parts": {"engine_oil": 1}},
            "queue_info": {"total_active_jobs": 4, "available_workers": 3}
        }))
        .unwrap();

        let a = resp.into_assignment().unwrap();
        assert_eq!(a.service_id, "SRV_1");
        assert_eq!(a.queue.queue_position(), 5);
        assert_eq!(a.queue.cars_ahead(), 4);
        assert!(a.inventory.available);
    }

    #[test]
    fn respuesta_rechazada_trae_el_error_del_servidor() {
        let resp: PredictResponse = serde_json::from_value(json!({
            "success": false,
            "error": "Missing required fields: total_km"
        }))
        .unwrap();

        assert_eq!(
            resp.into_assignment(),
            Err(DashboardError::Rejected("Missing required fields: total_km".into()))
        );
    }

    #[test]
    fn gauge_y_barra_por_franjas() {
        assert_eq!(time_gauge(2.0), (25.0, Tier::Green));
        assert_eq!(time_gauge(4.0).1, Tier::Amber);
        assert_eq!(time_gauge(12.0), (100.0, Tier::Red));

        assert_eq!(workload_bar_tier(39.9), Tier::Green);
        assert_eq!(workload_bar_tier(40.0), Tier::Amber);
        assert_eq!(workload_bar_tier(70.0), Tier::Red);
    }
}
