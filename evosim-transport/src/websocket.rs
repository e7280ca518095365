use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::Sender as CommandSender;
use evosim_core::OperatorCommand;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{Sender, TransportError};

type Clients = Arc<Mutex<HashSet<String>>>;

/// Broadcasts frames to every connected client and forwards the operator
/// commands they send back.
pub struct WebSocketSender {
    addr: SocketAddr,
    tx: Option<broadcast::Sender<String>>,
    runtime: Option<Runtime>,
    clients: Clients,
    commands: CommandSender<OperatorCommand>,
}

impl WebSocketSender {
    pub fn new(
        host: &str,
        port: u16,
        commands: CommandSender<OperatorCommand>,
    ) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| TransportError::WebSocket(format!("Invalid address: {}", e)))?;
        Ok(Self {
            addr,
            tx: None,
            runtime: None,
            clients: Arc::new(Mutex::new(HashSet::new())),
            commands,
        })
    }

    /// Binds the listener and starts accepting clients in the background.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        // Bind before returning so a taken port is reported to the caller.
        let listener = runtime.block_on(TcpListener::bind(self.addr))?;
        info!("WebSocket server listening on: {}", self.addr);

        let (tx, _) = broadcast::channel::<String>(16);
        self.tx = Some(tx.clone());

        let clients = self.clients.clone();
        let commands = self.commands.clone();
        runtime.spawn(async move {
            while let Ok((stream, addr)) = listener.accept().await {
                let peer = addr.to_string();
                if !lock(&clients).insert(peer.clone()) {
                    continue;
                }
                info!("Client connected: {}. Total clients: {}", peer, lock(&clients).len());

                tokio::spawn(handle_connection(
                    stream,
                    tx.subscribe(),
                    peer,
                    clients.clone(),
                    commands.clone(),
                ));
            }
        });

        self.runtime = Some(runtime);
        Ok(())
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }
}

impl Sender for WebSocketSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransportError::WebSocket("WebSocket server not started".to_string()))?;
        let text = std::str::from_utf8(data)
            .map_err(|e| TransportError::WebSocket(format!("Invalid UTF-8: {}", e)))?;

        // A send error only means nobody is subscribed right now.
        if self.client_count() > 0 && tx.send(text.to_string()).is_err() {
            debug!("Frame dropped: no receivers");
        }
        Ok(())
    }
}

async fn handle_connection(
    raw_stream: TcpStream,
    mut rx: broadcast::Receiver<String>,
    peer: String,
    clients: Clients,
    commands: CommandSender<OperatorCommand>,
) {
    let ws_stream = match accept_async(raw_stream).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Error during WebSocket handshake: {}", e);
            remove_client(&peer, &clients);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let receive_peer = peer.clone();
    let receive_clients = clients.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match text.parse::<OperatorCommand>() {
                    Ok(command) => {
                        debug!("Command from {}: {:?}", receive_peer, command);
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring message from {}: {}", receive_peer, e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    if !is_disconnect_error(&e) {
                        warn!("WebSocket receive error: {} - {}", receive_peer, e);
                    }
                    break;
                }
            }
        }
        remove_client(&receive_peer, &receive_clients);
    });

    loop {
        let data = match rx.recv().await {
            Ok(data) => data,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Client {} lagged by {} frames", peer, skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !lock(&clients).contains(&peer) {
            break;
        }
        if let Err(e) = ws_sender.send(Message::Text(data)).await {
            if !is_disconnect_error(&e) {
                warn!("WebSocket send error: {} - {}", peer, e);
            }
            break;
        }
    }

    remove_client(&peer, &clients);
    let _ = receive_task.await;
}

fn is_disconnect_error(e: &WsError) -> bool {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Io(io_err) => matches!(
            io_err.kind(),
            std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}

fn remove_client(peer: &str, clients: &Clients) {
    let mut set = lock(clients);
    if set.remove(peer) {
        info!("Client disconnected: {}. Total clients: {}", peer, set.len());
    }
}

fn lock(clients: &Clients) -> MutexGuard<'_, HashSet<String>> {
    clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_before_start_is_an_error() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut sender = WebSocketSender::new("127.0.0.1", 0, tx).unwrap();
        assert!(matches!(sender.send(b"{}"), Err(TransportError::WebSocket(_))));
    }

    #[test]
    fn bad_address_is_rejected() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        assert!(WebSocketSender::new("not an address", 80, tx).is_err());
    }

    #[test]
    fn started_server_accepts_frames_without_clients() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut sender = WebSocketSender::new("127.0.0.1", 0, tx).unwrap();
        sender.start().unwrap();
        assert_eq!(sender.client_count(), 0);
        sender.send(b"{\"frame\":0}").unwrap();
    }
}
