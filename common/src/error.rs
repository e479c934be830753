use thiserror::Error;

/// Fallos que el dashboard convierte en una notificación visible.
/// Ninguno es fatal: la región afectada simplemente no se toca.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DashboardError {
    /// La petición no llegó, o el servidor respondió con un status no-2xx.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// El payload no se pudo decodificar o clasificar.
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// Validación local del formulario; no se emite ninguna petición.
    #[error("{message}")]
    ValidationFailure { field: String, message: String },

    /// El servidor respondió `{success: false, error}`.
    #[error("{0}")]
    Rejected(String),

    /// No se pudo guardar algo en disco (reportes, página).
    #[error("io error: {0}")]
    Io(String),
}

impl DashboardError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DashboardError::ValidationFailure {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(what: &str, err: impl std::fmt::Display) -> Self {
        DashboardError::MalformedData(format!("{what}: {err}"))
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DashboardError::MalformedData(e.to_string())
        } else {
            DashboardError::NetworkFailure(e.to_string())
        }
    }
}
