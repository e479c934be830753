//! Loop de eventos del dashboard.
//!
//! Todo lo que cambia el estado entra por una sola cola: eventos push,
//! ticks del poller, comandos de stdin y resultados de las tareas de red.
//! El loop es el único dueño de [`DashboardState`], así que no hay locks.

use chrono::Local;
use common::{
    run_push_channel, DashboardApi, DashboardConfig, DashboardError, Notification, PushMessage,
    ReconnectConfig,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{execute, Command, Input, Outcome};
use crate::render::Templates;
use crate::state::{load_snapshot, DashboardState, Snapshot};
use crate::view::RenderTarget;

/// Cada cuánto se limpian toasts vencidos y se reescribe la página.
const HOUSEKEEPING_TICK: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum DashboardEvent {
    Push(PushMessage),
    /// Recarga completa (poller, comando o tras una acción exitosa).
    Refresh,
    Snapshot(Result<Snapshot, DashboardError>),
    Command(Command),
    Outcome(Outcome),
    Notice(Notification),
    /// `quit` desde stdin.
    Quit,
}

pub struct Dashboard<A, T: RenderTarget> {
    api: Arc<A>,
    state: DashboardState<T>,
    tx: UnboundedSender<DashboardEvent>,
    rx: UnboundedReceiver<DashboardEvent>,
    reports_dir: PathBuf,
    cancel: CancellationToken,
}

impl<A, T> Dashboard<A, T>
where
    A: DashboardApi + 'static,
    T: RenderTarget,
{
    pub fn new(
        api: A,
        target: T,
        templates: Templates,
        reports_dir: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api: Arc::new(api),
            state: DashboardState::new(target, templates),
            tx,
            rx,
            reports_dir,
            cancel,
        }
    }

    pub fn sender(&self) -> UnboundedSender<DashboardEvent> {
        self.tx.clone()
    }

    /// Arranca poller, canal push y lector de stdin. Todos cortan con el token.
    pub fn spawn_inputs(&self, config: &DashboardConfig) {
        tokio::spawn(poller(
            self.sender(),
            config.poll_interval,
            self.cancel.clone(),
        ));
        tokio::spawn(push_forwarder(
            config.push_url.clone(),
            self.sender(),
            self.cancel.clone(),
        ));
        spawn_stdin_reader(self.sender());
    }

    /// Consume eventos hasta `quit` o cancelación.
    pub async fn run(mut self) -> DashboardState<T> {
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_TICK);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                ev = self.rx.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
                _ = housekeeping.tick() => {
                    self.flush().await;
                    continue;
                }
            };

            if !self.handle(event) {
                break;
            }
            self.flush().await;
        }

        info!("dashboard detenido");
        self.cancel.cancel();
        self.flush().await;
        self.state
    }

    async fn flush(&mut self) {
        if let Err(e) = self.state.target_mut().flush().await {
            warn!("no se pudo escribir la página: {}", e);
        }
    }

    /// Aplica un evento. Devuelve `false` si hay que cortar el loop.
    fn handle(&mut self, event: DashboardEvent) -> bool {
        let now = Local::now();
        match event {
            DashboardEvent::Push(msg) => self.state.apply_push(msg, now),
            DashboardEvent::Refresh => self.spawn_refresh(),
            DashboardEvent::Snapshot(result) => self.state.apply_snapshot_result(result, now),
            DashboardEvent::Quit => return false,
            DashboardEvent::Command(command) => self.spawn_command(command),
            DashboardEvent::Outcome(outcome) => {
                self.state.notify(outcome.notification);
                if outcome.reload {
                    self.spawn_refresh();
                }
            }
            DashboardEvent::Notice(n) => self.state.notify(n),
        }
        true
    }

    /// Las cuatro lecturas en una tarea aparte; el resultado vuelve por la cola.
    fn spawn_refresh(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.sender();
        tokio::spawn(async move {
            debug!("recargando snapshot");
            let result = load_snapshot(api.as_ref()).await;
            let _ = tx.send(DashboardEvent::Snapshot(result));
        });
    }

    fn spawn_command(&self, command: Command) {
        let api = Arc::clone(&self.api);
        let tx = self.sender();
        let reports_dir = self.reports_dir.clone();
        tokio::spawn(async move {
            let outcome = execute(api.as_ref(), &command, &reports_dir).await;
            let _ = tx.send(DashboardEvent::Outcome(outcome));
        });
    }
}

/// Manda `Refresh` cada `period`. El primer tick es inmediato y hace de
/// carga inicial.
pub async fn poller(
    tx: UnboundedSender<DashboardEvent>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if tx.send(DashboardEvent::Refresh).is_err() {
                    return;
                }
            }
        }
    }
}

async fn push_forwarder(url: String, tx: UnboundedSender<DashboardEvent>, cancel: CancellationToken) {
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_push_channel(
        url,
        ReconnectConfig::default(),
        push_tx,
        cancel.clone(),
    ));

    while let Some(msg) = push_rx.recv().await {
        if tx.send(DashboardEvent::Push(msg)).is_err() {
            cancel.cancel();
            return;
        }
    }
}

/// Lee stdin en un hilo propio. Un read de stdin no se puede cancelar,
/// así que el hilo queda suelto y muere con el proceso.
fn spawn_stdin_reader(tx: UnboundedSender<DashboardEvent>) {
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || read_commands(std::io::stdin().lock(), &tx));
    if let Err(e) = spawned {
        warn!("no se pudo leer stdin: {}", e);
    }
}

/// Una línea por comando. Las líneas inválidas se avisan como toast.
/// Corta en `quit`, en EOF o cuando el loop ya no escucha.
fn read_commands<R: BufRead>(reader: R, tx: &UnboundedSender<DashboardEvent>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("error leyendo stdin: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match line.parse::<Input>() {
            Ok(Input::Run(command)) => DashboardEvent::Command(command),
            Ok(Input::Quit) => DashboardEvent::Quit,
            Err(e) => DashboardEvent::Notice(Notification::failure("Invalid command", &e)),
        };
        let quit = matches!(event, DashboardEvent::Quit);
        if tx.send(event).is_err() || quit {
            return;
        }
    }
    debug!("stdin cerrado, sin más comandos");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::FakeApi;
    use crate::view::{MemoryView, Region};
    use common::{parse_push_message, NoticeKind};
    use serde_json::json;

    fn dashboard(api: FakeApi) -> Dashboard<FakeApi, MemoryView> {
        Dashboard::new(
            api,
            MemoryView::new(Duration::from_secs(5)),
            Templates::new().unwrap(),
            std::env::temp_dir(),
            CancellationToken::new(),
        )
    }

    fn push(event: &str, data: serde_json::Value) -> DashboardEvent {
        let frame = format!("42{}", json!([event, data]));
        DashboardEvent::Push(parse_push_message(&frame).map(|ev| ev.unwrap()))
    }

    #[tokio::test]
    async fn eventos_se_aplican_en_orden_hasta_quit() {
        let d = dashboard(FakeApi::healthy());
        let tx = d.sender();
        let part = |quantity: i64| {
            json!({"brake_pads": {"name": "Brake Pads", "quantity": quantity, "min_stock": 4}})
        };

        tx.send(push("inventory_update", part(2))).unwrap();
        tx.send(push("inventory_update", part(7))).unwrap();
        tx.send(DashboardEvent::Quit).unwrap();
        // lo que llegue después del quit no se aplica
        tx.send(push("inventory_update", json!({}))).unwrap();

        let state = d.run().await;

        let table = state.target().region(Region::Inventory).unwrap();
        assert!(table.contains(">7<"));
        assert!(!table.contains("low-stock"));
    }

    #[tokio::test]
    async fn refresh_trae_el_snapshot_por_la_cola() {
        let mut d = dashboard(FakeApi::healthy());

        assert!(d.handle(DashboardEvent::Refresh));
        let ev = d.rx.recv().await.unwrap();
        assert!(matches!(ev, DashboardEvent::Snapshot(Ok(_))));
        d.handle(ev);

        let view = d.state.target();
        assert!(view.region(Region::WorkerGrid).is_some());
        assert!(view.region(Region::Inventory).is_some());
        assert_eq!(d.api.calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn refresh_fallido_avisa_una_sola_vez() {
        let mut d = dashboard(FakeApi {
            fail_inventory: true,
            ..FakeApi::healthy()
        });

        d.handle(DashboardEvent::Refresh);
        let ev = d.rx.recv().await.unwrap();
        d.handle(ev);

        let view = d.state.target();
        assert_eq!(view.mutations, 0);
        let errors: Vec<_> = view
            .notification_history()
            .filter(|n| n.kind == NoticeKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Failed to load data"));
    }

    #[tokio::test]
    async fn accion_exitosa_dispara_recarga() {
        let mut d = dashboard(FakeApi::healthy());

        d.handle(DashboardEvent::Command(Command::Restock("engine_oil".into())));
        let outcome = d.rx.recv().await.unwrap();
        assert!(matches!(outcome, DashboardEvent::Outcome(_)));
        d.handle(outcome);

        // la recarga vuelve como snapshot
        let ev = d.rx.recv().await.unwrap();
        assert!(matches!(ev, DashboardEvent::Snapshot(_)));

        let toasts: Vec<_> = d.state.target().notification_history().collect();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn quit_corta_el_loop() {
        let mut d = dashboard(FakeApi::healthy());
        assert!(!d.handle(DashboardEvent::Quit));
    }

    #[tokio::test]
    async fn cancelar_termina_run_aunque_stdin_siga_abierto() {
        let d = dashboard(FakeApi::healthy());
        let cancel = d.cancel.clone();
        // un lector de stdin bloqueado solo tiene el sender
        let _blocked_reader = d.sender();

        cancel.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(2), d.run()).await;

        assert!(finished.is_ok(), "run no terminó tras cancelar");
    }

    #[test]
    fn lector_de_comandos_corta_en_quit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = std::io::Cursor::new("restock brake_pads\n\nvolar\nquit\nrestock engine_oil\n");

        read_commands(input, &tx);

        assert!(matches!(
            rx.try_recv(),
            Ok(DashboardEvent::Command(Command::Restock(p))) if p == "brake_pads"
        ));
        assert!(matches!(rx.try_recv(), Ok(DashboardEvent::Notice(_))));
        assert!(matches!(rx.try_recv(), Ok(DashboardEvent::Quit)));
        // lo que sigue al quit no se lee
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn lector_de_comandos_corta_si_nadie_escucha() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        // no debe quedarse leyendo: el primer send falla y vuelve
        read_commands(std::io::Cursor::new("refresh\nrefresh\n"), &tx);
    }

    #[tokio::test]
    async fn poller_primer_tick_inmediato() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poller(tx, Duration::from_secs(30), cancel.clone()));

        assert!(matches!(rx.recv().await, Some(DashboardEvent::Refresh)));
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn workload_por_push_no_toca_servicios() {
        let mut d = dashboard(FakeApi::healthy());
        let data = json!([
            {"id": "W1", "current_jobs": 2, "max_jobs": 3},
            {"id": "W2", "current_jobs": 5, "max_jobs": 5}
        ]);

        d.handle(push("workload_update", data));

        let view = d.state.target();
        assert!(view
            .region(Region::Summary)
            .unwrap()
            .contains(r#"id="active-jobs">7<"#));
        assert!(view.region(Region::ActiveServices).is_none());
    }
}
