//! Subscriber registrar and delivery workers.
//!
//! One registrar thread owns the subscriber port; each admitted
//! registration gets its own delivery worker thread for the rest of the
//! process's life — workers never terminate on their own, only on
//! process shutdown.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::admission::{Admission, AdmissionDecision};
use crate::messagelog::{MessageLog, PublisherMessage};
use crate::topic::matches as topics_match;
use crate::wire::{format_push, parse_registration, SubscriberRegistration};

const REGISTRATION_BUFFER_CAP: usize = 8192;

/// Binds and listens on `port`, accepting one registration per connection
/// until the process terminates.
pub fn spawn_registrar(port: u16, log: Arc<MessageLog>, admission: Arc<Admission>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("registrar".to_owned())
        .spawn(move || {
            let listener = match TcpListener::bind(("0.0.0.0", port)) {
                Ok(listener) => listener,
                Err(e) => {
                    error!("subscriber registrar failed to bind port {port}: {e}");
                    std::process::exit(1);
                }
            };
            info!("listening for subscribers on port {port}");

            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => handle_registration(stream, &log, &admission),
                    Err(e) => error!("subscriber accept failed on port {port}: {e}"),
                }
            }
        })
        .expect("failed to spawn subscriber registrar thread")
}

fn handle_registration(mut stream: TcpStream, log: &Arc<MessageLog>, admission: &Arc<Admission>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.contains(&b'\n') {
                    break;
                }
                if buf.len() > REGISTRATION_BUFFER_CAP {
                    warn!("subscriber registration exceeded {REGISTRATION_BUFFER_CAP} bytes without a newline, dropping");
                    return;
                }
            }
            Err(e) => {
                error!("reading subscriber registration failed: {e}");
                return;
            }
        }
    }

    let Some(newline) = buf.iter().position(|&b| b == b'\n') else {
        warn!("subscriber registration was not newline-terminated, dropping");
        return;
    };

    let line = match std::str::from_utf8(&buf[..newline]) {
        Ok(line) => line,
        Err(_) => {
            warn!("subscriber registration was not valid UTF-8, dropping");
            return;
        }
    };

    let registration = match parse_registration(line) {
        Ok(registration) => registration,
        Err(e) => {
            warn!("rejecting subscriber registration: {e}");
            return;
        }
    };

    match admission.try_admit(registration.port, registration.persistent) {
        AdmissionDecision::Admit => {
            info!(
                "admitted subscriber filter={} endpoint={}:{} persistent={}",
                registration.filter, registration.host, registration.port, registration.persistent
            );
            spawn_worker(registration, Arc::clone(log));
        }
        AdmissionDecision::DuplicatePort => {
            warn!(
                "rejecting duplicate non-persistent subscriber on port {}",
                registration.port
            );
        }
        AdmissionDecision::CapReached => {
            warn!(
                "rejecting subscriber registration for {}:{}: worker cap reached",
                registration.host, registration.port
            );
        }
    }
}

fn spawn_worker(registration: SubscriberRegistration, log: Arc<MessageLog>) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("sub-{}:{}", registration.host, registration.port))
        .spawn(move || run_worker(registration, log))
        .expect("failed to spawn subscriber delivery worker thread")
}

fn run_worker(registration: SubscriberRegistration, log: Arc<MessageLog>) {
    if registration.persistent {
        for message in log.snapshot() {
            if topics_match(&registration.filter, &message.topic) {
                forward(&registration, &message);
            }
        }
    }

    let mut cursor = log.count();
    loop {
        let (batch, new_count) = log.wait_and_drain(cursor, registration.persistent);
        for message in &batch {
            if topics_match(&registration.filter, &message.topic) {
                forward(&registration, message);
            }
        }
        cursor = new_count;
    }
}

fn forward(registration: &SubscriberRegistration, message: &PublisherMessage) {
    let line = format_push(&message.topic, &message.value);
    match TcpStream::connect((registration.host.as_str(), registration.port)) {
        Ok(mut stream) => match stream.write_all(line.as_bytes()) {
            Ok(()) => debug!("forwarded {line} to {}:{}", registration.host, registration.port),
            Err(e) => warn!(
                "forwarding to subscriber {}:{} failed: {e}",
                registration.host, registration.port
            ),
        },
        Err(e) => warn!(
            "connecting to subscriber {}:{} failed: {e}",
            registration.host, registration.port
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn registration(port: u16, persistent: bool) -> SubscriberRegistration {
        SubscriberRegistration {
            filter: crate::topic::Topic::parse("#").unwrap(),
            host: "127.0.0.1".to_owned(),
            port,
            persistent,
        }
    }

    #[test]
    fn forward_writes_the_formatted_push_line() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let registration = registration(port, true);
        let message = PublisherMessage {
            topic: crate::topic::Topic::parse("a/b").unwrap(),
            value: b"1".to_vec(),
            timestamp: 0,
        };

        forward(&registration, &message);

        let (stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        std::io::BufReader::new(stream).read_line(&mut line).unwrap();
        assert_eq!(line, "(topic: a/b, value: \"1\")");
    }

    #[test]
    fn forward_to_a_closed_port_does_not_panic() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener); // nothing listens here anymore

        let registration = registration(port, false);
        let message = PublisherMessage {
            topic: crate::topic::Topic::parse("a/b").unwrap(),
            value: b"1".to_vec(),
            timestamp: 0,
        };

        forward(&registration, &message); // must log and return, not panic
    }
}
