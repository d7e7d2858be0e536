//! Editor socket listener.
//!
//! The editor plugin connects over TCP and writes a stream of JSON values
//! back to back, one per buffer change, in its channel framing
//! `[msg_id, {"text": [...], "line": n}]`. Each value is decoded into a
//! [`ChangeEvent`](crate::session::ChangeEvent) and queued on the
//! coordinator.

use std::io::{self, BufReader, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};

use serde_json::Value;

use crate::session::{EventError, EventSender};

/// Default editor port.
pub const DEFAULT_PORT: u16 = 8090;

/// Bind `addr` and accept editor connections on a background thread, one
/// thread per connection.
///
/// Returns the bound address, which matters when binding port 0.
///
/// # Errors
/// Returns an error if the address cannot be bound.
pub fn spawn(
    addr: impl ToSocketAddrs,
    sender: EventSender,
) -> io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)?;
    let local = listener.local_addr()?;
    tracing::info!(%local, "listening for editor connections");

    let handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let sender = sender.clone();
                    thread::spawn(move || handle_connection(stream, &sender));
                }
                Err(err) => tracing::warn!(error = %err, "failed to accept editor connection"),
            }
        }
    });
    Ok((local, handle))
}

fn handle_connection(stream: TcpStream, sender: &EventSender) {
    let peer = stream.peer_addr().ok();
    tracing::debug!(?peer, "editor connected");
    let accepted = serve(stream, sender);
    tracing::debug!(?peer, accepted, "editor disconnected");
}

/// Decode JSON values from `reader` until it ends, forwarding each event.
///
/// Malformed events are logged and skipped. Invalid JSON ends the stream,
/// since there is no framing to resynchronise on. Returns the number of
/// events forwarded.
pub fn serve<R: Read>(reader: R, sender: &EventSender) -> usize {
    let mut accepted = 0;
    let values = serde_json::Deserializer::from_reader(BufReader::new(reader)).into_iter::<Value>();
    for value in values {
        let value = match value {
            Ok(value) => value,
            Err(err) if err.is_eof() => break,
            Err(err) => {
                tracing::warn!(error = %err, "invalid JSON from editor, closing stream");
                break;
            }
        };
        match sender.submit_value(value) {
            Ok(()) => accepted += 1,
            Err(EventError::Closed) => break,
            Err(err) => tracing::warn!(error = %err, "rejected change event"),
        }
    }
    accepted
}
