use common::{DashboardError, Notification};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::render::UtilizationHistogram;

/// Regiones del dashboard. Cada render reemplaza una región completa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    WorkerGrid,
    Summary,
    Inventory,
    ActiveServices,
    CompletedServices,
    AlertFeed,
    LastUpdated,
}

/// Destino de los renders: algo que sabe reemplazar regiones,
/// actualizar el gráfico y mostrar notificaciones.
pub trait RenderTarget {
    fn replace(&mut self, region: Region, html: String);

    fn set_chart(&mut self, histogram: UtilizationHistogram);

    fn notify(&mut self, notification: Notification);

    /// Se llama después de cada evento aplicado y en cada tick de limpieza.
    fn flush(&mut self) -> impl Future<Output = Result<(), DashboardError>> + Send {
        std::future::ready(Ok(()))
    }
}

/// Target en memoria. Lo usan los tests y, envuelto, la página HTML.
#[derive(Debug)]
pub struct MemoryView {
    regions: BTreeMap<Region, String>,
    chart: Option<UtilizationHistogram>,
    notifications: Vec<(Notification, Instant)>,
    toast_ttl: Duration,
    /// Cantidad de reemplazos de región o gráfico aplicados.
    pub mutations: usize,
}

impl MemoryView {
    pub fn new(toast_ttl: Duration) -> Self {
        Self {
            regions: BTreeMap::new(),
            chart: None,
            notifications: Vec::new(),
            toast_ttl,
            mutations: 0,
        }
    }

    pub fn region(&self, region: Region) -> Option<&str> {
        self.regions.get(&region).map(|s| s.as_str())
    }

    pub fn chart(&self) -> Option<UtilizationHistogram> {
        self.chart
    }

    /// Notificaciones que todavía no vencieron.
    pub fn active_notifications(&self, now: Instant) -> Vec<&Notification> {
        self.notifications
            .iter()
            .filter(|(_, expires)| *expires > now)
            .map(|(n, _)| n)
            .collect()
    }

    /// Todas las notificaciones emitidas, vencidas o no.
    pub fn notification_history(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().map(|(n, _)| n)
    }

    /// Descarta las vencidas.
    pub fn prune(&mut self, now: Instant) {
        self.notifications.retain(|(_, expires)| *expires > now);
    }
}

impl RenderTarget for MemoryView {
    fn replace(&mut self, region: Region, html: String) {
        self.regions.insert(region, html);
        self.mutations += 1;
    }

    fn set_chart(&mut self, histogram: UtilizationHistogram) {
        self.chart = Some(histogram);
        self.mutations += 1;
    }

    fn notify(&mut self, notification: Notification) {
        let expires = Instant::now() + self.toast_ttl;
        self.notifications.push((notification, expires));
    }
}
