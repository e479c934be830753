use chrono::{DateTime, Local};
use common::{
    normalize_workload, time::now_iso, AlertEvent, AlertFeed, DashboardApi, DashboardError,
    Inventory, Notification, PushEvent, PushMessage, ServiceRecord, Workload,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::render::{render_utilization_chart, Templates};
use crate::view::{Region, RenderTarget};

/// Las cuatro lecturas de una recarga completa, ya normalizadas.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub workload: Workload,
    pub inventory: Inventory,
    pub active: Vec<ServiceRecord>,
    pub completed: Vec<ServiceRecord>,
}

/// Pide los cuatro slices en paralelo. Todo o nada: si uno falla se
/// devuelve el primer error y no se aplica nada.
pub async fn load_snapshot<A: DashboardApi>(api: &A) -> Result<Snapshot, DashboardError> {
    let (workload, inventory, active, completed) = tokio::try_join!(
        api.workload(),
        api.inventory(),
        api.active_services(),
        api.completed_services(),
    )?;

    Ok(Snapshot {
        workload: normalize_workload(workload)?,
        inventory,
        active,
        completed,
    })
}

/// Estado del dashboard admin. Lo posee una sola tarea (el loop de
/// eventos); los renders son síncronos y reemplazan regiones enteras.
pub struct DashboardState<T: RenderTarget> {
    target: T,
    templates: Templates,
    alerts: AlertFeed,
    active: Vec<ServiceRecord>,
    completed: Vec<ServiceRecord>,
}

impl<T: RenderTarget> DashboardState<T> {
    pub fn new(target: T, templates: Templates) -> Self {
        Self {
            target,
            templates,
            alerts: AlertFeed::default(),
            active: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn notify(&mut self, notification: Notification) {
        self.target.notify(notification);
    }

    /// Reemplaza una región si el render salió bien; si no, avisa y deja
    /// lo que había.
    fn put(&mut self, region: Region, rendered: Result<String, minijinja::Error>) {
        match rendered {
            Ok(html) => self.target.replace(region, html),
            Err(e) => {
                warn!("no se pudo renderizar {:?}: {}", region, e);
                self.notify(Notification::error(format!("Render failed: {e}")));
            }
        }
    }

    pub fn apply_workload(&mut self, workload: &Workload, now: DateTime<Local>) {
        debug!("workload: {} workers", workload.workers.len());
        let summary = self.templates.render_summary(&workload.summary);
        self.put(Region::Summary, summary);
        let grid = self.templates.render_worker_grid(&workload.workers);
        self.put(Region::WorkerGrid, grid);
        self.target
            .set_chart(render_utilization_chart(&workload.workers));
        let stamp = self.templates.render_last_updated(now);
        self.put(Region::LastUpdated, stamp);
    }

    pub fn apply_inventory(&mut self, inventory: &Inventory) {
        let html = self.templates.render_inventory_table(inventory);
        self.put(Region::Inventory, html);
    }

    pub fn apply_active_services(&mut self, services: Vec<ServiceRecord>, now: DateTime<Local>) {
        let completed: HashSet<&str> = self
            .completed
            .iter()
            .map(|s| s.service_id.as_str())
            .collect();
        // un servicio nunca aparece en las dos listas: gana completado
        self.active = services
            .into_iter()
            .filter(|s| !s.is_completed() && !completed.contains(s.service_id.as_str()))
            .collect();
        self.render_active(now);
    }

    /// `service_assigned`: alta o reemplazo por id en la lista activa.
    pub fn apply_service_assigned(&mut self, service: ServiceRecord, now: DateTime<Local>) {
        if self
            .completed
            .iter()
            .any(|s| s.service_id == service.service_id)
        {
            debug!("servicio {} ya completado, se ignora", service.service_id);
            return;
        }
        match self
            .active
            .iter_mut()
            .find(|s| s.service_id == service.service_id)
        {
            Some(existing) => *existing = service,
            None => self.active.push(service),
        }
        self.render_active(now);
    }

    pub fn apply_completed_services(&mut self, services: Vec<ServiceRecord>, now: DateTime<Local>) {
        self.completed = services;
        let html = self.templates.render_completed_services(&self.completed);
        self.put(Region::CompletedServices, html);

        let before = self.active.len();
        let completed: HashSet<&str> = self
            .completed
            .iter()
            .map(|s| s.service_id.as_str())
            .collect();
        self.active
            .retain(|s| !completed.contains(s.service_id.as_str()));
        if self.active.len() != before {
            self.render_active(now);
        }
    }

    fn render_active(&mut self, now: DateTime<Local>) {
        let html = self.templates.render_active_services(&self.active, now);
        self.put(Region::ActiveServices, html);
    }

    pub fn apply_alert(&mut self, mut alert: AlertEvent) {
        if alert.timestamp.is_none() {
            alert.timestamp = Some(now_iso());
        }
        let toast = Notification::warning(format!(
            "⚠️ Low stock: {} ({} left)",
            alert.part_name, alert.quantity
        ));
        self.alerts.push(alert);
        let html = self.templates.render_alert_feed(&self.alerts);
        self.put(Region::AlertFeed, html);
        self.notify(toast);
    }

    /// Recarga completa: las cuatro regiones de una vez.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now: DateTime<Local>) {
        let Snapshot {
            workload,
            inventory,
            active,
            completed,
        } = snapshot;

        self.apply_workload(&workload, now);
        self.apply_inventory(&inventory);
        // primero completados para que el filtro de activos los vea
        self.apply_completed_services(completed, now);
        self.apply_active_services(active, now);
        debug!("snapshot aplicado");
    }

    pub fn apply_snapshot_result(
        &mut self,
        result: Result<Snapshot, DashboardError>,
        now: DateTime<Local>,
    ) {
        match result {
            Ok(snapshot) => self.apply_snapshot(snapshot, now),
            Err(e) => self.notify(Notification::failure("Failed to load data", &e)),
        }
    }

    /// Evento push dirigido: solo toca la región que le corresponde.
    pub fn apply_push(&mut self, message: PushMessage, now: DateTime<Local>) {
        match message {
            Ok(PushEvent::WorkloadUpdate(w)) => self.apply_workload(&w, now),
            Ok(PushEvent::InventoryUpdate(inv)) => self.apply_inventory(&inv),
            Ok(PushEvent::ServiceAssigned(s)) => {
                info!("nuevo servicio asignado: {}", s.service_id);
                self.apply_service_assigned(s, now)
            }
            Ok(PushEvent::ActiveServicesUpdate(list)) => {
                debug!("servicios activos: {}", list.len());
                self.apply_active_services(list, now)
            }
            Ok(PushEvent::CompletedServicesUpdate(list)) => {
                self.apply_completed_services(list, now)
            }
            Ok(PushEvent::LowStockAlert(alert)) => self.apply_alert(alert),
            Err(e) => self.notify(Notification::failure("Invalid data received", &e)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::view::MemoryView;
    use common::{
        parse_push_message, ActionResult, NoticeKind, PredictRequest, PredictResponse,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Api falsa: respuestas fijas y, opcionalmente, un endpoint que falla.
    #[derive(Default)]
    pub struct FakeApi {
        pub workload: Value,
        pub fail_inventory: bool,
        pub restock_ok: bool,
        pub calls: AtomicUsize,
    }

    impl FakeApi {
        pub fn healthy() -> Self {
            Self {
                workload: json!({
                    "workers": [
                        {"id": "W1", "current_jobs": 1, "max_jobs": 3, "status": "low"},
                        {"id": "W2", "current_jobs": 3, "max_jobs": 3, "status": "high"}
                    ],
                    "summary": {"total_workers": 2, "total_active_jobs": 4,
                                "available_workers": 1, "queued_services": 0,
                                "total_capacity_utilization": 66}
                }),
                restock_ok: true,
                ..Default::default()
            }
        }
    }

    fn service(id: &str) -> ServiceRecord {
        serde_json::from_value(json!({
            "service_id": id,
            "car_details": {"car_model": "XC60", "service_type": "Regular"},
            "predicted_time": 2.0,
            "worker_assigned": {"worker_id": "W1", "worker_name": "Ana"}
        }))
        .unwrap()
    }

    impl DashboardApi for FakeApi {
        async fn workload(&self) -> Result<Value, DashboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.workload.clone())
        }

        async fn inventory(&self) -> Result<Inventory, DashboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_inventory {
                return Err(DashboardError::NetworkFailure("connection refused".into()));
            }
            Ok(serde_json::from_value(json!({
                "engine_oil": {"name": "Engine Oil", "quantity": 25, "min_stock": 5}
            }))
            .unwrap())
        }

        async fn active_services(&self) -> Result<Vec<ServiceRecord>, DashboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![service("SRV1"), service("SRV2")])
        }

        async fn completed_services(&self) -> Result<Vec<ServiceRecord>, DashboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn predict(&self, _req: &PredictRequest) -> Result<PredictResponse, DashboardError> {
            Ok(PredictResponse::default())
        }

        async fn restock(&self, part_id: &str) -> Result<ActionResult, DashboardError> {
            Ok(ActionResult {
                success: self.restock_ok,
                error: (!self.restock_ok).then(|| "Part not found".to_string()),
                message: Some(format!("{part_id} restocked successfully")),
            })
        }

        async fn complete_service(&self, _id: &str) -> Result<ActionResult, DashboardError> {
            Ok(ActionResult {
                success: true,
                ..Default::default()
            })
        }

        async fn generate_report(&self, service_id: &str) -> Result<Vec<u8>, DashboardError> {
            Ok(format!("%PDF-1.4 {service_id}").into_bytes())
        }
    }

    pub fn new_state() -> DashboardState<MemoryView> {
        DashboardState::new(
            MemoryView::new(Duration::from_secs(5)),
            Templates::new().unwrap(),
        )
    }

    fn errors(state: &DashboardState<MemoryView>) -> usize {
        state
            .target()
            .notification_history()
            .filter(|n| n.kind == NoticeKind::Error)
            .count()
    }

    #[tokio::test]
    async fn carga_inicial_aplica_las_cuatro_regiones() {
        let api = FakeApi::healthy();
        let mut state = new_state();

        state.apply_snapshot_result(load_snapshot(&api).await, Local::now());

        let view = state.target();
        for region in [
            Region::Summary,
            Region::WorkerGrid,
            Region::Inventory,
            Region::ActiveServices,
            Region::CompletedServices,
        ] {
            assert!(view.region(region).is_some(), "falta {region:?}");
        }
        assert!(view.region(Region::ActiveServices).unwrap().contains("SRV2"));
        assert_eq!(errors(&state), 0);
    }

    #[tokio::test]
    async fn carga_inicial_con_un_fetch_caido_no_toca_nada() {
        let api = FakeApi {
            fail_inventory: true,
            ..FakeApi::healthy()
        };
        let mut state = new_state();

        state.apply_snapshot_result(load_snapshot(&api).await, Local::now());

        assert_eq!(state.target().mutations, 0);
        assert_eq!(errors(&state), 1);
        assert!(state.target().region(Region::WorkerGrid).is_none());
    }

    #[tokio::test]
    async fn recarga_fallida_deja_lo_anterior() {
        let mut state = new_state();
        state.apply_snapshot_result(load_snapshot(&FakeApi::healthy()).await, Local::now());
        let before = state.target().region(Region::WorkerGrid).unwrap().to_string();
        let mutations = state.target().mutations;

        let broken = FakeApi {
            fail_inventory: true,
            ..FakeApi::healthy()
        };
        state.apply_snapshot_result(load_snapshot(&broken).await, Local::now());

        assert_eq!(state.target().mutations, mutations);
        assert_eq!(state.target().region(Region::WorkerGrid).unwrap(), before);
        assert_eq!(errors(&state), 1);
    }

    #[tokio::test]
    async fn workload_malformado_en_el_batch_es_todo_o_nada() {
        let api = FakeApi {
            workload: json!({}),
            ..FakeApi::healthy()
        };
        let mut state = new_state();

        state.apply_snapshot_result(load_snapshot(&api).await, Local::now());

        assert_eq!(state.target().mutations, 0);
        assert_eq!(errors(&state), 1);
    }

    #[test]
    fn push_workload_vacio_no_muta_y_avisa_una_vez() {
        let mut state = new_state();
        let msg = parse_push_message(&format!("42{}", json!(["workload_update", {}])))
            .map(|ev| ev.expect("evento conocido"));

        state.apply_push(msg, Local::now());

        assert_eq!(state.target().mutations, 0);
        assert_eq!(errors(&state), 1);
        assert_eq!(
            state.target().active_notifications(Instant::now()).len(),
            1
        );
    }

    #[test]
    fn push_workload_actualiza_grid_resumen_y_grafico() {
        let mut state = new_state();
        let frame = format!(
            "42{}",
            json!(["workload_update", FakeApi::healthy().workload])
        );
        let msg = parse_push_message(&frame).map(|ev| ev.unwrap());

        state.apply_push(msg, Local::now());

        let view = state.target();
        assert_eq!(
            view.region(Region::WorkerGrid)
                .unwrap()
                .matches("class=\"worker-card")
                .count(),
            2
        );
        assert!(view
            .region(Region::Summary)
            .unwrap()
            .contains(r#"id="available-workers">1<"#));
        let chart = view.chart().unwrap();
        assert_eq!((chart.low, chart.medium, chart.high), (1, 0, 1));
        // push dirigido: no toca inventario ni servicios
        assert!(view.region(Region::Inventory).is_none());
        assert!(view.region(Region::ActiveServices).is_none());
    }

    #[test]
    fn mismo_evento_dos_veces_converge() {
        let mut state = new_state();
        let now = Local::now();
        let event = PushEvent::ActiveServicesUpdate(vec![service("SRV1")]);

        state.apply_push(Ok(event.clone()), now);
        let first = state.target().region(Region::ActiveServices).unwrap().to_string();
        state.apply_push(Ok(event), now);

        assert_eq!(state.target().region(Region::ActiveServices).unwrap(), first);
    }

    #[test]
    fn service_assigned_hace_upsert_por_id() {
        let mut state = new_state();
        let now = Local::now();

        state.apply_service_assigned(service("SRV1"), now);
        state.apply_service_assigned(service("SRV1"), now);
        state.apply_service_assigned(service("SRV2"), now);

        let html = state.target().region(Region::ActiveServices).unwrap();
        assert_eq!(html.matches("<span class=\"service-id\">SRV1<").count(), 1);
        assert_eq!(html.matches("class=\"service-item\"").count(), 2);
    }

    #[test]
    fn completado_sale_de_la_lista_activa() {
        let mut state = new_state();
        let now = Local::now();
        state.apply_active_services(vec![service("SRV1"), service("SRV2")], now);

        let mut done = service("SRV1");
        done.completed_at = Some("2024-05-01T16:45:00".into());
        state.apply_completed_services(vec![done], now);

        let active = state.target().region(Region::ActiveServices).unwrap();
        assert!(!active.contains(">SRV1<"));
        assert!(active.contains(">SRV2<"));
        let completed = state.target().region(Region::CompletedServices).unwrap();
        assert!(completed.contains(">SRV1<"));

        // un service_assigned tardío del mismo id no lo revive
        state.apply_service_assigned(service("SRV1"), now);
        let active = state.target().region(Region::ActiveServices).unwrap();
        assert!(!active.contains(">SRV1<"));
    }

    #[test]
    fn alerta_va_al_feed_y_avisa() {
        let mut state = new_state();

        for i in 0..11 {
            state.apply_alert(AlertEvent {
                part_name: format!("Part {i}"),
                quantity: i,
                timestamp: None,
            });
        }

        let html = state.target().region(Region::AlertFeed).unwrap();
        assert_eq!(html.matches("class=\"alert-item\"").count(), 10);
        assert!(html.contains("Part 10"));
        assert!(!html.contains("Part 0<"));
        let warnings = state
            .target()
            .notification_history()
            .filter(|n| n.kind == NoticeKind::Warning)
            .count();
        assert_eq!(warnings, 11);
    }
}
