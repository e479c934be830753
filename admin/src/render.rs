//! Renders puros del dashboard.
//!
//! Cada función arma un view model a partir de un slice ya normalizado y
//! lo pasa por una plantilla minijinja (con auto-escape HTML). El resultado
//! reemplaza la región completa: mismos datos, mismo HTML.

use chrono::{DateTime, Local};
use common::{AlertFeed, Inventory, ServiceRecord, SummaryStats, WorkerSnapshot, WorkerStatus};
use minijinja::{context, Environment, Error};
use serde::Serialize;

use crate::view::Region;

/// Placeholder histórico cuando el resumen no trae total de workers.
pub const FALLBACK_TOTAL_WORKERS: u32 = 20;

const WORKER_GRID: &str = r#"{% if workers %}{% for w in workers %}
<div class="worker-card tier-{{ w.tier }}">
  <div class="worker-info">
    <div>
      <strong>{{ w.id }} - {{ w.name }}</strong>
      <div class="worker-meta">{{ w.specialization }} • ⭐ {{ w.rating }}</div>
    </div>
    <span class="workload-percent">{{ w.workload_percent }}%</span>
  </div>
  <div class="worker-progress"><div class="progress-fill progress-{{ w.tier }}" style="width: {{ w.workload_percent }}%"></div></div>
  <div class="worker-stats"><span>{{ w.current_jobs }}/{{ w.max_jobs }} jobs</span><span class="status-{{ w.tier }}">{{ w.status_text }}</span></div>
  {% if w.jobs %}<div class="worker-jobs"><strong>Current Jobs:</strong> {{ w.jobs }}</div>{% else %}<div class="worker-jobs empty">No active jobs</div>{% endif %}
</div>{% endfor %}
{% else %}<div class="no-services">No workers data available</div>{% endif %}"#;

const SUMMARY: &str = r#"<div class="stat"><span class="stat-label">Total Workers</span><span class="stat-value" id="total-workers">{{ s.total_workers }}</span></div>
<div class="stat"><span class="stat-label">Active Jobs</span><span class="stat-value" id="active-jobs">{{ s.total_active_jobs }}</span></div>
<div class="stat"><span class="stat-label">Available Workers</span><span class="stat-value" id="available-workers">{{ s.available_workers }}</span></div>
<div class="stat"><span class="stat-label">Queued Services</span><span class="stat-value" id="queued-services">{{ s.queued_services }}</span></div>
<div class="stat"><span class="stat-label">Capacity Utilization</span><span class="stat-value" id="capacity-utilization">{{ s.capacity_utilization }}%</span></div>"#;

const INVENTORY: &str = r#"{% if rows %}{% for r in rows %}
<tr class="{% if r.low_stock %}low-stock{% endif %}" data-part="{{ r.id }}">
  <td><strong>{{ r.name }}</strong><div class="unit">{{ r.unit }}</div></td>
  <td><span class="quantity">{{ r.quantity }}</span> {% if r.low_stock %}<span class="text-danger">❌ Low Stock</span>{% else %}<span class="text-success">✅ In Stock</span>{% endif %}</td>
  <td>{{ r.min_stock }}</td>
  <td><code>restock {{ r.id }}</code> 📦 Restock (+5)</td>
</tr>{% endfor %}
{% else %}<tr><td colspan="4" class="no-data">No inventory data available</td></tr>{% endif %}"#;

const ACTIVE_SERVICES: &str = r#"{% if services %}{% for s in services %}
<div class="service-item">
  <div class="service-header">
    <span class="service-id">{{ s.service_id }}</span>
    {% if s.queued %}<span class="service-worker queued">Queued</span>{% else %}<span class="service-worker">{{ s.worker_name }}</span>{% endif %}
  </div>
  <div class="service-details">
    <div><strong>Vehicle:</strong> {{ s.car_model }}</div>
    <div><strong>Service:</strong> {{ s.service_type }}</div>
    <div><strong>Predicted Time:</strong> {{ s.predicted_time }}h</div>
    <div><strong>Worker:</strong> {{ s.worker_label }}</div>
    {% if s.progress %}<div><strong>Time Left:</strong> {{ s.progress.time_left }}h</div>
    <div><strong>Completion:</strong> {{ s.progress.completion }}</div>
    {% else %}<div><strong>Queue Position:</strong> {{ s.queue_position }}</div>
    <div><strong>Est. Wait:</strong> {{ s.estimated_wait }}h</div>{% endif %}
  </div>
  {% if s.progress %}<div class="service-progress">
    <div class="progress-time"><span>Progress</span><span>{{ s.progress.percent }}%</span></div>
    <div class="worker-progress"><div class="progress-fill progress-medium" style="width: {{ s.progress.percent }}%"></div></div>
  </div>{% endif %}
  <div class="service-actions">{% if not s.queued %}<code>complete {{ s.service_id }}</code> {% endif %}<code>report {{ s.service_id }}</code></div>
</div>{% endfor %}
{% else %}<div class="no-services">No active services</div>{% endif %}"#;

const COMPLETED_SERVICES: &str = r#"{% if services %}{% for s in services %}
<div class="service-item">
  <div class="service-header">
    <span class="service-id">{{ s.service_id }}</span>
    <span class="service-worker">{{ s.worker_name }}</span>
  </div>
  <div class="service-details">
    <div><strong>Vehicle:</strong> {{ s.car_model }}</div>
    <div><strong>Service:</strong> {{ s.service_type }}</div>
    <div><strong>Actual Time:</strong> {{ s.predicted_time }}h</div>
    <div><strong>Completed:</strong> {{ s.completed_at }}</div>
  </div>
  <div class="service-actions"><code>report {{ s.service_id }}</code> 📄 Download Report</div>
</div>{% endfor %}
{% else %}<div class="no-services">No completed services yet</div>{% endif %}"#;

const ALERT_FEED: &str = r#"{% if alerts %}{% for a in alerts %}
<div class="alert-item">
  <strong>⚠️ Low Stock Alert: {{ a.part_name }}</strong>
  <div>Current quantity: {{ a.quantity }} • Action Required</div>
  <div class="alert-time">{{ a.time }}</div>
</div>{% endfor %}
{% else %}<div class="no-alerts">No alerts</div>{% endif %}"#;

const LAST_UPDATED: &str = r#"Last updated: <span id="last-update-time">{{ time }}</span>"#;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="5">
<title>VSIS Admin Dashboard</title>
</head>
<body>
{% for t in toasts %}<div class="toast {{ t.kind }}">{{ t.message }}</div>
{% endfor %}
<section class="stats" id="summary-stats">{{ summary }}</section>
<section class="chart" id="utilization-chart">
  <h3>Worker Utilization Distribution</h3>
  <ul>
    <li class="tier-green">Available: {{ chart.low }}</li>
    <li class="tier-amber">Moderate: {{ chart.medium }}</li>
    <li class="tier-red">Busy: {{ chart.high }}</li>
  </ul>
</section>
<section id="workload-grid">{{ workers }}</section>
<section id="active-services">{{ active }}</section>
<section id="completed-services">{{ completed }}</section>
<table><tbody id="inventory-table">{{ inventory }}</tbody></table>
<section id="email-alerts">{{ alerts }}</section>
<footer id="last-update">{{ last_updated }}</footer>
</body>
</html>
"#;

/// Histograma de 3 buckets del gráfico de utilización.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UtilizationHistogram {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

/// Cuenta por `status`; los desconocidos no suman en ningún bucket.
pub fn render_utilization_chart(workers: &[WorkerSnapshot]) -> UtilizationHistogram {
    workers
        .iter()
        .fold(UtilizationHistogram::default(), |mut acc, w| {
            match w.status() {
                WorkerStatus::Low => acc.low += 1,
                WorkerStatus::Medium => acc.medium += 1,
                WorkerStatus::High => acc.high += 1,
                WorkerStatus::Unknown => {}
            }
            acc
        })
}

/// Número con a lo sumo un decimal: 66.66 -> "66.7", 50.0 -> "50".
fn fmt_num(value: f64) -> String {
    format!("{}", (value * 10.0).round() / 10.0)
}

#[derive(Debug, Serialize)]
struct WorkerCard<'a> {
    id: &'a str,
    name: &'a str,
    specialization: &'a str,
    rating: String,
    workload_percent: String,
    current_jobs: u32,
    max_jobs: u32,
    tier: &'static str,
    status_text: &'a str,
    jobs: String,
}

impl<'a> From<&'a WorkerSnapshot> for WorkerCard<'a> {
    fn from(w: &'a WorkerSnapshot) -> Self {
        WorkerCard {
            id: &w.id,
            name: w.name.as_deref().unwrap_or(""),
            specialization: w.specialization(),
            rating: fmt_num(w.rating()),
            workload_percent: fmt_num(w.workload_percentage()),
            current_jobs: w.current_jobs(),
            max_jobs: w.max_jobs(),
            tier: w.status().tier().as_str(),
            status_text: w.status_text(),
            jobs: w.jobs_list.join(", "),
        }
    }
}

/// Valores ya resueltos del resumen (con defaults aplicados).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub total_workers: u32,
    pub total_active_jobs: u32,
    pub available_workers: u32,
    pub queued_services: u32,
    pub capacity_utilization: i64,
}

impl From<&SummaryStats> for SummaryView {
    fn from(s: &SummaryStats) -> Self {
        SummaryView {
            total_workers: s.total_workers.unwrap_or(FALLBACK_TOTAL_WORKERS),
            total_active_jobs: s.total_active_jobs.unwrap_or(0),
            available_workers: s.available_workers.unwrap_or(0),
            queued_services: s.queued_services.unwrap_or(0),
            capacity_utilization: s.total_capacity_utilization.unwrap_or(0.0).round() as i64,
        }
    }
}

#[derive(Debug, Serialize)]
struct InventoryRow<'a> {
    id: &'a str,
    name: &'a str,
    unit: &'a str,
    quantity: i64,
    min_stock: i64,
    low_stock: bool,
}

#[derive(Debug, Serialize)]
struct ProgressView {
    percent: String,
    time_left: String,
    completion: String,
}

#[derive(Debug, Serialize)]
struct ActiveServiceView<'a> {
    service_id: &'a str,
    car_model: &'a str,
    service_type: &'a str,
    predicted_time: String,
    queued: bool,
    worker_name: &'a str,
    worker_label: String,
    progress: Option<ProgressView>,
    queue_position: String,
    estimated_wait: String,
}

fn active_view(s: &ServiceRecord, now: DateTime<Local>) -> ActiveServiceView<'_> {
    let assignment = s.worker_assigned.as_ref();
    let queued = s.is_queued();
    let worker_name = s.worker_name().unwrap_or("Queue");
    let worker_label = match assignment {
        Some(w) if !queued => format!(
            "{} ({})",
            worker_name,
            w.specialization.as_deref().unwrap_or("General Maintenance")
        ),
        _ => "Queued".to_string(),
    };

    let progress = s.progress(now).map(|p| ProgressView {
        percent: format!("{:.1}", p.percent),
        time_left: format!("{:.1}", p.remaining_hours),
        completion: p.completion.format("%H:%M:%S").to_string(),
    });

    ActiveServiceView {
        service_id: &s.service_id,
        car_model: &s.car_details.car_model,
        service_type: &s.car_details.service_type,
        predicted_time: fmt_num(s.predicted_time),
        queued,
        worker_name,
        worker_label,
        progress,
        queue_position: assignment
            .and_then(|w| w.queue_position)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        estimated_wait: assignment
            .and_then(|w| w.estimated_wait_time)
            .map(fmt_num)
            .unwrap_or_else(|| "N/A".to_string()),
    }
}

#[derive(Debug, Serialize)]
struct CompletedServiceView<'a> {
    service_id: &'a str,
    worker_name: &'a str,
    car_model: &'a str,
    service_type: &'a str,
    predicted_time: String,
    completed_at: String,
}

#[derive(Debug, Serialize)]
struct AlertView<'a> {
    part_name: &'a str,
    quantity: i64,
    time: String,
}

#[derive(Debug, Serialize)]
struct ToastView<'a> {
    kind: &'static str,
    message: &'a str,
}

/// Contenido de todas las regiones para armar la página completa.
pub struct PageParts<'a> {
    pub region: &'a dyn Fn(Region) -> String,
    pub chart: UtilizationHistogram,
    pub toasts: Vec<&'a common::Notification>,
}

/// Entorno de plantillas, se arma una vez por dashboard.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        env.add_template("worker_grid.html", WORKER_GRID)?;
        env.add_template("summary.html", SUMMARY)?;
        env.add_template("inventory.html", INVENTORY)?;
        env.add_template("active_services.html", ACTIVE_SERVICES)?;
        env.add_template("completed_services.html", COMPLETED_SERVICES)?;
        env.add_template("alert_feed.html", ALERT_FEED)?;
        env.add_template("last_updated.html", LAST_UPDATED)?;
        env.add_template("page.html", PAGE)?;
        Ok(Self { env })
    }

    pub fn render_worker_grid(&self, workers: &[WorkerSnapshot]) -> Result<String, Error> {
        let cards: Vec<WorkerCard> = workers.iter().map(WorkerCard::from).collect();
        self.env
            .get_template("worker_grid.html")?
            .render(context! { workers => cards })
    }

    pub fn render_summary(&self, summary: &SummaryStats) -> Result<String, Error> {
        self.env
            .get_template("summary.html")?
            .render(context! { s => SummaryView::from(summary) })
    }

    pub fn render_inventory_table(&self, items: &Inventory) -> Result<String, Error> {
        let rows: Vec<InventoryRow> = items
            .iter()
            .map(|(id, item)| InventoryRow {
                id,
                name: &item.name,
                unit: item.unit(),
                quantity: item.quantity,
                min_stock: item.min_stock,
                low_stock: item.is_low_stock(),
            })
            .collect();
        self.env
            .get_template("inventory.html")?
            .render(context! { rows => rows })
    }

    pub fn render_active_services(
        &self,
        services: &[ServiceRecord],
        now: DateTime<Local>,
    ) -> Result<String, Error> {
        let views: Vec<ActiveServiceView> = services.iter().map(|s| active_view(s, now)).collect();
        self.env
            .get_template("active_services.html")?
            .render(context! { services => views })
    }

    pub fn render_completed_services(&self, services: &[ServiceRecord]) -> Result<String, Error> {
        let views: Vec<CompletedServiceView> = services
            .iter()
            .map(|s| CompletedServiceView {
                service_id: &s.service_id,
                worker_name: s.worker_name().unwrap_or("Unknown"),
                car_model: &s.car_details.car_model,
                service_type: &s.car_details.service_type,
                predicted_time: fmt_num(s.predicted_time),
                completed_at: s
                    .completed_at()
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
            })
            .collect();
        self.env
            .get_template("completed_services.html")?
            .render(context! { services => views })
    }

    pub fn render_alert_feed(&self, feed: &AlertFeed) -> Result<String, Error> {
        let alerts: Vec<AlertView> = feed
            .iter()
            .map(|a| AlertView {
                part_name: &a.part_name,
                quantity: a.quantity,
                time: a
                    .timestamp
                    .as_deref()
                    .and_then(common::time::parse_timestamp)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| a.timestamp.clone().unwrap_or_default()),
            })
            .collect();
        self.env
            .get_template("alert_feed.html")?
            .render(context! { alerts => alerts })
    }

    pub fn render_last_updated(&self, now: DateTime<Local>) -> Result<String, Error> {
        self.env
            .get_template("last_updated.html")?
            .render(context! { time => now.format("%H:%M:%S").to_string() })
    }

    /// Página completa. Las regiones ya vienen escapadas, por eso se
    /// insertan como `safe`.
    pub fn render_page(&self, parts: &PageParts<'_>) -> Result<String, Error> {
        use minijinja::Value;

        let region = |r: Region| Value::from_safe_string((parts.region)(r));
        let toasts: Vec<ToastView> = parts
            .toasts
            .iter()
            .map(|n| ToastView {
                kind: n.kind.as_str(),
                message: &n.message,
            })
            .collect();

        self.env.get_template("page.html")?.render(context! {
            toasts => toasts,
            chart => parts.chart,
            summary => region(Region::Summary),
            workers => region(Region::WorkerGrid),
            active => region(Region::ActiveServices),
            completed => region(Region::CompletedServices),
            inventory => region(Region::Inventory),
            alerts => region(Region::AlertFeed),
            last_updated => region(Region::LastUpdated),
        })
    }
}
