//! The retention cleaner: a background thread that periodically drops the
//! log's head entry once it's older than the configured TTL.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::info;

use crate::messagelog::MessageLog;

/// Spawns the cleaner thread. Ticks every `ttl_secs`, which both doubles as
/// the TTL itself and bounds how long a backlog of expired head entries
/// takes to drain (one per tick).
pub fn spawn(log: Arc<MessageLog>, ttl_secs: u64) -> JoinHandle<()> {
    thread::Builder::new()
        .name("cleaner".to_owned())
        .spawn(move || loop {
            thread::sleep(Duration::from_secs(ttl_secs));
            let now = now_secs();
            if let Some(evicted) = log.evict_head_if_older(ttl_secs, now) {
                info!("cleaner evicted message topic={}", evicted.topic);
            }
        })
        .expect("failed to spawn retention cleaner thread")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
