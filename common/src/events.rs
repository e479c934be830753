//! Frames del canal push.
//!
//! El servidor habla Socket.IO (protocolo 5) sobre Engine.IO 4 por
//! WebSocket. Cada frame de texto arranca con el tipo de paquete
//! Engine.IO y, si es un mensaje (`4`), sigue el tipo Socket.IO:
//! `0{...}` open, `2` ping, `40{...}` conectado, `42["evento", data]`.

use serde_json::Value;

use crate::alert::AlertEvent;
use crate::error::DashboardError;
use crate::inventory::Inventory;
use crate::service::ServiceRecord;
use crate::workload::{normalize_workload, Workload};

/// Paquete ya clasificado. `Event` conserva el arreglo JSON crudo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketFrame<'a> {
    /// `0{sid, pingInterval, ...}`: hay que pedir el namespace con `40`.
    Open,
    /// `2`: el servidor espera un `3`.
    Ping,
    /// `40{...}`
    Connected,
    /// `44{...}`
    ConnectError(&'a str),
    /// `42[...]`
    Event(&'a str),
    /// `1` o `41`
    Close,
    /// pong, noop, acks y demás.
    Other,
}

/// Clasifica un frame de texto sin decodificar el payload.
pub fn decode_frame(text: &str) -> SocketFrame<'_> {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => SocketFrame::Open,
        Some('1') => SocketFrame::Close,
        Some('2') => SocketFrame::Ping,
        Some('4') => {
            let rest = chars.as_str();
            let kind = rest.chars().next();
            let body = skip_namespace(rest.get(1..).unwrap_or_default());
            match kind {
                Some('0') => SocketFrame::Connected,
                Some('1') => SocketFrame::Close,
                // el id de ack opcional va antes del arreglo
                Some('2') => SocketFrame::Event(body.trim_start_matches(|c: char| c.is_ascii_digit())),
                Some('4') => SocketFrame::ConnectError(body),
                _ => SocketFrame::Other,
            }
        }
        _ => SocketFrame::Other,
    }
}

/// `/admin,[...]` -> `[...]`. El namespace por defecto no viaja.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map(|(_, rest)| rest).unwrap_or_default()
    } else {
        body
    }
}

/// Eventos push ya decodificados. La carga de trabajo llega normalizada.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    WorkloadUpdate(Workload),
    InventoryUpdate(Inventory),
    ServiceAssigned(ServiceRecord),
    ActiveServicesUpdate(Vec<ServiceRecord>),
    CompletedServicesUpdate(Vec<ServiceRecord>),
    LowStockAlert(AlertEvent),
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::WorkloadUpdate(_) => "workload_update",
            PushEvent::InventoryUpdate(_) => "inventory_update",
            PushEvent::ServiceAssigned(_) => "service_assigned",
            PushEvent::ActiveServicesUpdate(_) => "active_services_update",
            PushEvent::CompletedServicesUpdate(_) => "completed_services_update",
            PushEvent::LowStockAlert(_) => "low_stock_alert",
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T, DashboardError> {
    serde_json::from_value(data).map_err(|e| DashboardError::malformed(event, e))
}

/// Decodifica el arreglo `["evento", data]` de un paquete EVENT.
///
/// `Ok(None)` para tipos de evento que no conocemos (se loguean y se ignoran);
/// `Err(MalformedData)` si el arreglo o su payload no se pueden interpretar.
pub fn parse_event_payload(payload: &str) -> Result<Option<PushEvent>, DashboardError> {
    let items: Vec<Value> =
        serde_json::from_str(payload).map_err(|e| DashboardError::malformed("push frame", e))?;
    let mut items = items.into_iter();
    let event = match items.next() {
        Some(Value::String(name)) => name,
        _ => {
            return Err(DashboardError::MalformedData(
                "push frame: missing event name".to_string(),
            ))
        }
    };
    let data = items.next().unwrap_or(Value::Null);

    let parsed = match event.as_str() {
        "workload_update" => PushEvent::WorkloadUpdate(normalize_workload(data)?),
        "inventory_update" => PushEvent::InventoryUpdate(decode(&event, data)?),
        "service_assigned" => PushEvent::ServiceAssigned(decode(&event, data)?),
        "active_services_update" => PushEvent::ActiveServicesUpdate(decode(&event, data)?),
        "completed_services_update" => PushEvent::CompletedServicesUpdate(decode(&event, data)?),
        "low_stock_alert" => PushEvent::LowStockAlert(decode(&event, data)?),
        other => {
            tracing::debug!("evento push desconocido '{}', se ignora", other);
            return Ok(None);
        }
    };

    Ok(Some(parsed))
}

/// Decodifica un frame de texto completo. Lo que no es un EVENT
/// (open, ping, connect...) da `Ok(None)`.
pub fn parse_push_message(text: &str) -> Result<Option<PushEvent>, DashboardError> {
    match decode_frame(text) {
        SocketFrame::Event(payload) => parse_event_payload(payload),
        _ => Ok(None),
    }
}
