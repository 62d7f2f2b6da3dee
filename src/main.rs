use std::sync::Arc;

use clap::Parser;

use topicd::admission::Admission;
use topicd::config::{BrokerConfig, Cli, Retention};
use topicd::messagelog::MessageLog;
use topicd::{ingress, spawn_cleaner, subscriber};

fn main() {
    env_logger::init();

    let config: BrokerConfig = Cli::parse().into();
    log::info!(
        "starting broker: retention={:?} subscriber_port={} publisher_ports={:?} max_subscribers={}",
        config.retention, config.subscriber_port, config.publisher_ports, config.max_subscribers
    );

    let log = Arc::new(MessageLog::new());
    let admission = Arc::new(Admission::new(config.max_subscribers));

    let mut handles = Vec::new();

    if let Retention::Ttl(ttl_secs) = config.retention {
        handles.push(spawn_cleaner(Arc::clone(&log), ttl_secs));
    }

    handles.push(subscriber::spawn_registrar(
        config.subscriber_port,
        Arc::clone(&log),
        Arc::clone(&admission),
    ));

    for port in config.publisher_ports {
        handles.push(ingress::spawn(port, Arc::clone(&log)));
    }

    for handle in handles {
        let _ = handle.join();
    }
}
