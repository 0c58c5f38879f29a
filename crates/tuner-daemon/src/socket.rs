use crate::core::DaemonEvent;
use crate::state::StateManager;
use crate::BroadcastMessage;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tuner_proto::catalog::{search, DEFAULT_SEARCH_LIMIT};
use tuner_proto::protocol::{Broadcast, Command, Message, MAX_FRAME_BYTES, PROTOCOL_VERSION};

pub async fn bind(bind_address: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("TCP server listening at {}", listener.local_addr()?);
    Ok(listener)
}

pub fn start_server(
    listener: TcpListener,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<DaemonEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut client_id = 0usize;

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    client_id += 1;
                    let id = client_id;
                    info!("Client {} connected from {}", id, peer);

                    let sm = state_manager.clone();
                    let evt_tx = event_tx.clone();
                    let bcast_rx = broadcast_tx.subscribe();

                    tokio::spawn(async move {
                        handle_client(stream, sm, id, evt_tx, bcast_rx).await;
                        info!("Client {} disconnected", id);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    })
}

async fn handle_client(
    stream: TcpStream,
    state_manager: Arc<StateManager>,
    client_id: usize,
    event_tx: mpsc::Sender<DaemonEvent>,
    mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut tmp = [0u8; 4096];
    let mut read_buf: Vec<u8> = Vec::new();

    // Hello with the current snapshot, then the channel directory.
    match encode_hello(&state_manager).await {
        Ok(encoded) => {
            if write_half.write_all(&encoded).await.is_err() {
                return;
            }
        }
        Err(e) => warn!("Client {}: hello not encoded: {}", client_id, e),
    }
    if let Ok(encoded) = encode_channels(&state_manager, None).await {
        if write_half.write_all(&encoded).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            result = read_half.read(&mut tmp) => {
                match result {
                    Ok(0) => {
                        info!("Client {} closed connection", client_id);
                        break;
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&tmp[..n]);

                        loop {
                            let Some(len) = Message::frame_len(&read_buf) else { break };
                            if len > MAX_FRAME_BYTES {
                                warn!("Client {} announced a {} byte frame, dropping client", client_id, len);
                                return;
                            }
                            if read_buf.len() < 4 + len { break; }
                            match Message::decode(&read_buf) {
                                Ok((Message::Command(Command::Search { term }), consumed)) => {
                                    read_buf.drain(..consumed);
                                    if let Ok(encoded) = encode_channels(&state_manager, Some(&term)).await {
                                        if write_half.write_all(&encoded).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                Ok((Message::Command(Command::GetState), consumed)) => {
                                    read_buf.drain(..consumed);
                                    if let Ok(encoded) = encode_state(&state_manager).await {
                                        if write_half.write_all(&encoded).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                // The resulting state arrives with the core's StateUpdated broadcast.
                                Ok((Message::Command(cmd), consumed)) => {
                                    read_buf.drain(..consumed);
                                    info!("Client {} sent command: {:?}", client_id, cmd);

                                    if event_tx.send(DaemonEvent::ClientCommand(cmd)).await.is_err() {
                                        warn!("DaemonEvent channel closed");
                                        return;
                                    }
                                }
                                Ok((_, consumed)) => {
                                    read_buf.drain(..consumed);
                                }
                                Err(e) => {
                                    warn!("Client {} sent an undecodable frame: {}", client_id, e);
                                    read_buf.drain(..4 + len);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Read error from client {}: {}", client_id, e);
                        break;
                    }
                }
            }

            msg = broadcast_rx.recv() => {
                let encoded = match msg {
                    Ok(BroadcastMessage::StateUpdated) => encode_state(&state_manager).await,
                    Ok(BroadcastMessage::Log(message)) => Message::Broadcast(Broadcast::Log { message }).encode(),
                    Ok(BroadcastMessage::Error(message)) => {
                        Message::Broadcast(Broadcast::Error { message }).encode()
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} missed {} broadcast messages", client_id, n);
                        encode_state(&state_manager).await
                    }
                    Err(_) => break,
                };
                if let Ok(encoded) = encoded {
                    if write_half.write_all(&encoded).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

async fn encode_hello(state_manager: &StateManager) -> anyhow::Result<Vec<u8>> {
    let state = state_manager.get_state().await;
    let rev = state.rev;
    Message::Broadcast(Broadcast::Hello {
        protocol_version: PROTOCOL_VERSION,
        daemon_rev: rev,
        state,
    })
    .encode()
}

async fn encode_state(state_manager: &StateManager) -> anyhow::Result<Vec<u8>> {
    let state = state_manager.get_state().await;
    Message::Broadcast(Broadcast::State { data: state }).encode()
}

/// Whole directory, or the hits for `term`.
async fn encode_channels(state_manager: &StateManager, term: Option<&str>) -> anyhow::Result<Vec<u8>> {
    let all = state_manager.get_channels().await;
    let channels = match term {
        Some(term) => search(&all, term, DEFAULT_SEARCH_LIMIT).into_iter().cloned().collect(),
        None => all.as_ref().clone(),
    };
    Message::Broadcast(Broadcast::Channels { channels }).encode()
}
