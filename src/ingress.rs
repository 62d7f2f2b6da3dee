//! Publisher ingress: one listener thread per configured publisher port.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::messagelog::MessageLog;
use crate::wire::{parse_publisher_frame, FrameReader};

const READ_BUFFER_SIZE: usize = 4096;

/// Binds and listens on `port`, accepting publisher connections until the
/// process terminates. Bind/listen failure is fatal (see SPEC_FULL.md §7).
pub fn spawn(port: u16, log: Arc<MessageLog>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("ingress-{port}"))
        .spawn(move || {
            let listener = match TcpListener::bind(("0.0.0.0", port)) {
                Ok(listener) => listener,
                Err(e) => {
                    error!("publisher ingress on port {port} failed to bind: {e}");
                    std::process::exit(1);
                }
            };
            info!("listening for publishers on port {port}");

            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => handle_connection(stream, &log),
                    Err(e) => error!("publisher accept failed on port {port}: {e}"),
                }
            }
        })
        .expect("failed to spawn publisher ingress thread")
}

fn handle_connection(mut stream: TcpStream, log: &Arc<MessageLog>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    debug!("publisher connected from {peer}");

    let mut reader = FrameReader::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("publisher {peer} disconnected normally");
                break;
            }
            Ok(n) => {
                for frame in reader.feed(&buf[..n]) {
                    if frame.is_empty() {
                        continue;
                    }
                    match parse_publisher_frame(&frame) {
                        Ok((topic, value)) => {
                            log.append(topic, value);
                        }
                        Err(e) => warn!("publisher {peer} sent a malformed frame: {e}"),
                    }
                }
            }
            Err(e) => {
                error!("reading from publisher {peer} failed: {e}");
                break;
            }
        }
    }
}
