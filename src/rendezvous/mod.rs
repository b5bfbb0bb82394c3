//! Job-Attribute Rendezvous
//!
//! The coordinator publishes its command address under a well-known key in
//! the job's attribute store; every worker polls that key until it appears.
//! The store is a JSON file on the shared submit filesystem in production,
//! swapped for an in-memory map in tests.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use parking_lot::Mutex;

use crate::context::Context;


/// Attribute key under which the coordinator address is published.
pub const COORDINATOR_ADDR_KEY: &str = "coordinator_addr";

/// Poll interval while a worker waits for the coordinator to publish.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A job-attribute store: string keys to string values, last write wins.
pub trait Rendezvous: Send + Sync {
    fn publish(&self, key: &str, value: &str) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Formats a socket address as the `ip,port` attribute value.
pub fn format_addr(addr: SocketAddr) -> String {
    format!("{},{}", addr.ip(), addr.port())
}

/// Parses an `ip,port` attribute value back into a socket address.
pub fn parse_addr(value: &str) -> Result<SocketAddr> {
    let Some((ip, port)) = value.split_once(',') else {
        bail!("malformed coordinator address '{value}', expected ip,port");
    };
    let ip = ip
        .trim()
        .parse()
        .with_context(|| format!("bad coordinator ip in '{value}'"))?;
    let port = port
        .trim()
        .parse()
        .with_context(|| format!("bad coordinator port in '{value}'"))?;
    Ok(SocketAddr::new(ip, port))
}

/// JSON file store, read-modify-written whole on every publish.
///
/// The file is small (a handful of attributes) and contended only between
/// the scheduler and rank 0, so whole-file rewrites are fine.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        FileStore { path }
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing attribute file {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => {
                Err(err).with_context(|| format!("reading attribute file {}", self.path.display()))
            }
        }
    }
}

impl Rendezvous for FileStore {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        let mut attrs = self.load()?;
        attrs.insert(key.to_owned(), value.to_owned());
        let text = serde_json::to_string_pretty(&attrs)?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("writing attribute file {}", self.path.display()))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    attrs: Mutex<BTreeMap<String, String>>,
}

impl Rendezvous for MemoryStore {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        self.attrs.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.attrs.lock().get(key).cloned())
    }
}

/// Publishes this process's command address as the coordinator address.
pub fn publish_coordinator(store: &dyn Rendezvous, ctx: &Context) -> Result<()> {
    let addr = SocketAddr::new(ctx.local_ip, ctx.port);
    tracing::info!("publishing coordinator address {}", addr);
    store.publish(COORDINATOR_ADDR_KEY, &format_addr(addr))
}

/// Worker-side poll loop: waits until the coordinator address appears in
/// the store, then records it on the context.
pub async fn await_coordinator(store: &dyn Rendezvous, ctx: &Arc<Context>) -> Result<SocketAddr> {
    loop {
        if let Some(value) = store.get(COORDINATOR_ADDR_KEY)? {
            let addr = parse_addr(&value)?;
            tracing::info!("coordinator is at {}", addr);
            ctx.set_coordinator(addr);
            return Ok(addr);
        }
        tracing::debug!("coordinator address not published yet");
        tokio::select! {
            _ = ctx.cancel.cancelled() => bail!("cancelled while waiting for the coordinator"),
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}
