use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

use crate::error::DashboardError;
use crate::inventory::Inventory;
use crate::predict::{PredictRequest, PredictResponse};
use crate::service::ServiceRecord;

/// Respuesta `{success, error, message}` de restock / complete.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionResult {
    pub fn into_result(self) -> Result<Option<String>, DashboardError> {
        if self.success {
            Ok(self.message)
        } else {
            Err(DashboardError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Nombre del archivo con el que se guarda un reporte.
pub fn report_file_name(service_id: &str) -> String {
    let safe: String = service_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{safe}_report.pdf")
}

/// Canal request/response contra el servidor. La carga de trabajo
/// vuelve cruda porque cada camino la pasa por `normalize_workload`.
pub trait DashboardApi: Send + Sync {
    fn workload(&self) -> impl Future<Output = Result<Value, DashboardError>> + Send;

    fn inventory(&self) -> impl Future<Output = Result<Inventory, DashboardError>> + Send;

    fn active_services(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceRecord>, DashboardError>> + Send;

    fn completed_services(
        &self,
    ) -> impl Future<Output = Result<Vec<ServiceRecord>, DashboardError>> + Send;

    fn predict(
        &self,
        req: &PredictRequest,
    ) -> impl Future<Output = Result<PredictResponse, DashboardError>> + Send;

    fn restock(
        &self,
        part_id: &str,
    ) -> impl Future<Output = Result<ActionResult, DashboardError>> + Send;

    fn complete_service(
        &self,
        service_id: &str,
    ) -> impl Future<Output = Result<ActionResult, DashboardError>> + Send;

    /// Cuerpo binario del PDF.
    fn generate_report(
        &self,
        service_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, DashboardError>> + Send;
}

/// Implementación sobre HTTP con reqwest.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<Response, DashboardError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self.client.get(&url).send().await?;
        check_status(resp, &url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, DashboardError> {
        let resp = self.get(path).await?;
        let raw: Value = resp.json().await?;
        serde_json::from_value(raw).map_err(|e| DashboardError::malformed(path, e))
    }

    /// restock y complete contestan `{success: false}` con status 200,
    /// pero también 404/500 con el mismo cuerpo; se intenta leerlo igual.
    async fn get_action(&self, path: &str) -> Result<ActionResult, DashboardError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        match resp.json::<ActionResult>().await {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(DashboardError::NetworkFailure(format!(
                "{url} respondió {status}"
            ))),
            Err(e) => Err(DashboardError::malformed(path, e)),
        }
    }
}

fn check_status(resp: Response, url: &str) -> Result<Response, DashboardError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(DashboardError::NetworkFailure(format!(
            "{url} respondió {status}"
        )))
    }
}

impl DashboardApi for HttpApi {
    async fn workload(&self) -> Result<Value, DashboardError> {
        self.get_json("/api/workload").await
    }

    async fn inventory(&self) -> Result<Inventory, DashboardError> {
        self.get_json("/api/inventory").await
    }

    async fn active_services(&self) -> Result<Vec<ServiceRecord>, DashboardError> {
        self.get_json("/api/active_services").await
    }

    async fn completed_services(&self) -> Result<Vec<ServiceRecord>, DashboardError> {
        self.get_json("/api/completed_services").await
    }

    async fn predict(&self, req: &PredictRequest) -> Result<PredictResponse, DashboardError> {
        let url = format!("{}/predict", self.base_url);
        debug!("POST {}", url);
        let resp = self.client.post(&url).json(req).send().await?;
        let resp = check_status(resp, &url)?;
        Ok(resp.json::<PredictResponse>().await?)
    }

    async fn restock(&self, part_id: &str) -> Result<ActionResult, DashboardError> {
        self.get_action(&format!("/restock/{part_id}")).await
    }

    async fn complete_service(&self, service_id: &str) -> Result<ActionResult, DashboardError> {
        self.get_action(&format!("/complete_service/{service_id}"))
            .await
    }

    async fn generate_report(&self, service_id: &str) -> Result<Vec<u8>, DashboardError> {
        let resp = self
            .get(&format!("/generate_report/{service_id}"))
            .await?;
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}
