use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::dispatch::Dispatcher;
use crate::protocol::{
    FileService, FrameError, RequestFrame, ResponseFrame, RpcStatus, StatusCode, decode_request,
    read_frame, write_frame,
};

const REPLY_BUFFER: usize = 64;

/// Serves one client connection.
///
/// - Reads request frames until the client disconnects or shutdown is signalled.
/// - Every frame becomes its own task that submits the call to the dispatcher, so a
///   slow call does not hold up later frames on the same connection.
/// - Responses go through a single writer task and carry the request id.
/// - Once reading stops, pending responses get `drain_timeout` to reach the client;
///   whatever is still unsent after that is dropped.
pub async fn handle_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    service: Arc<FileService>,
    dispatcher: Arc<Dispatcher>,
    max_frame_bytes: usize,
    drain_timeout: Duration,
    mut stop: watch::Receiver<bool>,
) {
    info!("Client connected: {}", client_addr);

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (reply_tx, reply_rx) = mpsc::channel::<ResponseFrame>(REPLY_BUFFER);
    let mut writer = tokio::spawn(write_responses(write_half, reply_rx, client_addr));
    let mut in_flight = JoinSet::new();

    loop {
        if *stop.borrow() {
            break;
        }

        let frame = tokio::select! {
            _ = stop.changed() => break,
            frame = read_frame(&mut reader, max_frame_bytes) => frame,
        };

        match frame {
            Ok(None) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(Some(bytes)) if bytes.iter().all(u8::is_ascii_whitespace) => continue,
            Ok(Some(bytes)) => match decode_request(&bytes) {
                Ok(request) => {
                    in_flight.spawn(serve_request(
                        request,
                        client_addr,
                        Arc::clone(&service),
                        Arc::clone(&dispatcher),
                        reply_tx.clone(),
                    ));
                }
                Err((id, status)) => {
                    warn!("Malformed frame from {}: {}", client_addr, status.message);
                    let _ = reply_tx.send(ResponseFrame::failure(id, status)).await;
                }
            },
            Err(FrameError::TooLarge(limit)) => {
                warn!(
                    "Frame from {} exceeds {} bytes, closing connection",
                    client_addr, limit
                );
                let status = RpcStatus::invalid_argument(format!("Frame exceeds {} bytes", limit));
                let _ = reply_tx.send(ResponseFrame::failure(0, status)).await;
                break;
            }
            Err(FrameError::Io(e)) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        }

        while let Some(finished) = in_flight.try_join_next() {
            if let Err(e) = finished {
                error!("Request task for {} failed: {}", client_addr, e);
            }
        }
    }

    // Calls already submitted still complete and their responses are still sent,
    // unless the client stops reading them.
    let flushed = tokio::time::timeout(drain_timeout, async {
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!("Request task for {} failed: {}", client_addr, e);
            }
        }
        drop(reply_tx);
        (&mut writer).await
    })
    .await;

    match flushed {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Writer task for {} failed: {}", client_addr, e),
        Err(_) => {
            warn!(
                "Client {} did not take its responses within {:?}, dropping {} pending calls",
                client_addr,
                drain_timeout,
                in_flight.len()
            );
            in_flight.abort_all();
            writer.abort();
        }
    }

    info!("Client {} disconnected", client_addr);
}

async fn serve_request(
    request: RequestFrame,
    client_addr: SocketAddr,
    service: Arc<FileService>,
    dispatcher: Arc<Dispatcher>,
    reply_tx: mpsc::Sender<ResponseFrame>,
) {
    let RequestFrame { id, call } = request;
    let method = call.method();
    debug!("Received from {}: #{} {}", client_addr, id, method);

    let result = match dispatcher.submit(move || service.handle(call)).await {
        Ok(result) => result,
        Err(e) => Err(RpcStatus::from(e)),
    };

    let response = ResponseFrame::from_result(id, result);
    match response.status {
        StatusCode::Ok => info!("{} #{} {} -> ok", client_addr, id, method),
        code => info!(
            "{} #{} {} -> {}: {}",
            client_addr, id, method, code, response.message
        ),
    }

    if reply_tx.send(response).await.is_err() {
        warn!("Dropped response #{} for {}: writer gone", id, client_addr);
    }
}

async fn write_responses(
    mut write_half: OwnedWriteHalf,
    mut replies: mpsc::Receiver<ResponseFrame>,
    client_addr: SocketAddr,
) {
    while let Some(response) = replies.recv().await {
        if let Err(e) = write_frame(&mut write_half, &response).await {
            error!("Failed to write to {}: {}", client_addr, e);
            break;
        }
    }
}
