use common::{DashboardError, NoticeKind, Notification};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::render::{PageParts, Templates, UtilizationHistogram};
use crate::view::{MemoryView, Region, RenderTarget};

/// Página HTML en disco. Guarda las regiones en memoria y reescribe el
/// archivo completo en cada `flush` si algo cambió.
pub struct HtmlPage {
    view: MemoryView,
    templates: Templates,
    output: PathBuf,
    dirty: bool,
}

impl HtmlPage {
    pub fn new(output: PathBuf, toast_ttl: Duration, templates: Templates) -> Self {
        Self {
            view: MemoryView::new(toast_ttl),
            templates,
            output,
            dirty: true,
        }
    }

    pub fn view(&self) -> &MemoryView {
        &self.view
    }

    pub fn render(&self, now: Instant) -> Result<String, minijinja::Error> {
        let region = |r: Region| {
            self.view
                .region(r)
                .map(str::to_string)
                .unwrap_or_default()
        };
        self.templates.render_page(&PageParts {
            region: &region,
            chart: self.view.chart().unwrap_or_default(),
            toasts: self.view.active_notifications(now),
        })
    }
}

impl RenderTarget for HtmlPage {
    fn replace(&mut self, region: Region, html: String) {
        self.view.replace(region, html);
        self.dirty = true;
    }

    fn set_chart(&mut self, histogram: UtilizationHistogram) {
        self.view.set_chart(histogram);
        self.dirty = true;
    }

    fn notify(&mut self, notification: Notification) {
        match notification.kind {
            NoticeKind::Error => error!("[toast] {}", notification.message),
            NoticeKind::Warning => warn!("[toast] {}", notification.message),
            NoticeKind::Info | NoticeKind::Success => info!("[toast] {}", notification.message),
        }
        self.view.notify(notification);
        self.dirty = true;
    }

    /// Descarta toasts vencidos y reescribe el archivo si hace falta.
    async fn flush(&mut self) -> Result<(), DashboardError> {
        let now = Instant::now();
        let before = self.view.notification_history().count();
        self.view.prune(now);
        if self.view.notification_history().count() != before {
            self.dirty = true;
        }
        if !self.dirty {
            return Ok(());
        }

        let html = self
            .render(now)
            .map_err(|e| DashboardError::malformed("page", e))?;
        tokio::fs::write(&self.output, html)
            .await
            .map_err(|e| DashboardError::Io(format!("{}: {e}", self.output.display())))?;
        self.dirty = false;
        debug!("página escrita en {}", self.output.display());
        Ok(())
    }
}
