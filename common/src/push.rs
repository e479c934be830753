//! Canal push: cliente Socket.IO mínimo sobre WebSocket.
//!
//! [`run_push_channel`] se conecta, hace el handshake (`0` -> `40`), contesta
//! los pings y reenvía cada evento decodificado por un `mpsc`. Si la conexión
//! se cae reintenta con backoff exponencial hasta que se cancela el token.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DashboardError;
use crate::events::{decode_frame, parse_event_payload, PushEvent, SocketFrame};

/// Lo que llega por el canal: un evento o el motivo por el que no se pudo leer.
pub type PushMessage = Result<PushEvent, DashboardError>;

pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Corre hasta que `cancel` se dispara o el receptor se cierra.
pub async fn run_push_channel(
    url: String,
    config: ReconnectConfig,
    tx: UnboundedSender<PushMessage>,
    cancel: CancellationToken,
) {
    let mut delay = config.initial_delay;

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            res = connect_async(url.as_str()) => res,
        };

        match connected {
            Ok((mut ws, _)) => {
                info!("canal push conectado a {}", url);
                delay = config.initial_delay;

                loop {
                    let frame = tokio::select! {
                        _ = cancel.cancelled() => return,
                        frame = ws.next() => frame,
                    };

                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => {
                            warn!("canal push cerrado por el servidor");
                            break;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!("error leyendo del canal push: {}", e);
                            break;
                        }
                    };

                    let payload = match decode_frame(&text) {
                        SocketFrame::Event(payload) => payload,
                        SocketFrame::Open => {
                            // pedir el namespace por defecto
                            if let Err(e) = ws.send(Message::Text("40".into())).await {
                                warn!("no se pudo abrir el namespace: {}", e);
                                break;
                            }
                            continue;
                        }
                        SocketFrame::Ping => {
                            if let Err(e) = ws.send(Message::Text("3".into())).await {
                                warn!("no se pudo contestar el ping: {}", e);
                                break;
                            }
                            continue;
                        }
                        SocketFrame::Connected => {
                            info!("canal push suscripto");
                            continue;
                        }
                        SocketFrame::ConnectError(reason) => {
                            warn!("el servidor rechazó la conexión: {}", reason);
                            break;
                        }
                        SocketFrame::Close => {
                            warn!("canal push cerrado por el servidor");
                            break;
                        }
                        SocketFrame::Other => continue,
                    };

                    let msg = match parse_event_payload(payload) {
                        Ok(Some(event)) => {
                            debug!("evento push {}", event.name());
                            Ok(event)
                        }
                        Ok(None) => continue,
                        Err(e) => {
                            warn!("evento push inválido: {}", e);
                            Err(e)
                        }
                    };

                    if tx.send(msg).is_err() {
                        // nadie escucha: no tiene sentido seguir conectado
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("no se pudo conectar al canal push {}: {}", url, e);
            }
        }

        debug!("reintentando canal push en {:?}", delay);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &config);
    }
}
