use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const ALERT_FEED_CAP: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub part_name: String,
    pub quantity: i64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Historial acotado de alertas de stock: la más nueva adelante,
/// la más vieja se descarta al pasar el tope.
#[derive(Debug, Clone)]
pub struct AlertFeed {
    entries: VecDeque<AlertEvent>,
    cap: usize,
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::with_capacity(ALERT_FEED_CAP)
    }
}

impl AlertFeed {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, alert: AlertEvent) {
        self.entries.push_front(alert);
        while self.entries.len() > self.cap {
            self.entries.pop_back();
        }
    }

    /// Más reciente primero.
    pub fn iter(&self) -> impl Iterator<Item = &AlertEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
