#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use watermark_queue::*;

/// Succeeds unless the payload starts with `fail`; payloads starting with
/// `slow` take longer. Records concurrency and call order.
#[derive(Default)]
pub struct ScriptedTransformer {
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// `start:<payload>` / `end:<payload>` in the order they happened.
    pub log: Mutex<Vec<String>>,
}

impl ScriptedTransformer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Transformer for ScriptedTransformer {
    async fn transform(&self, bytes: &[u8], _media_type: &str) -> anyhow::Result<TransformOutput> {
        let label = String::from_utf8_lossy(bytes).to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("start:{}", label));

        let delay = if label.starts_with("slow") { 40 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.log.lock().unwrap().push(format!("end:{}", label));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if label.starts_with("fail") {
            anyhow::bail!("watermark not removable: {}", label);
        }
        let mut out = bytes.to_vec();
        out.extend_from_slice(b"-clean");
        Ok(TransformOutput::new(out))
    }
}

/// Reports each call on `started` and blocks until a permit is added to `gate`.
pub struct GatedTransformer {
    pub started: mpsc::UnboundedSender<Vec<u8>>,
    pub gate: Arc<Semaphore>,
}

impl GatedTransformer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>, Arc<Semaphore>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                started: tx,
                gate: Arc::clone(&gate),
            },
            rx,
            gate,
        )
    }
}

impl Transformer for GatedTransformer {
    async fn transform(&self, bytes: &[u8], _media_type: &str) -> anyhow::Result<TransformOutput> {
        let _ = self.started.send(bytes.to_vec());
        let permit = self.gate.acquire().await?;
        permit.forget();
        Ok(TransformOutput::new(bytes.to_vec()))
    }
}

pub fn png(label: &str) -> Input {
    Input::new(label.as_bytes().to_vec(), "image/png")
}
