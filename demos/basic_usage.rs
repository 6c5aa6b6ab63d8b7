use std::time::Duration;

use tracing_subscriber::EnvFilter;
use watermark_queue::*;

/// Pretends to strip watermarks; images whose bytes mention "corrupt" fail.
struct FakeRemover;

impl Transformer for FakeRemover {
    async fn transform(&self, bytes: &[u8], media_type: &str) -> anyhow::Result<TransformOutput> {
        tokio::time::sleep(Duration::from_millis(150)).await;
        if String::from_utf8_lossy(bytes).contains("corrupt") {
            anyhow::bail!("could not detect watermark region");
        }
        println!("  removed watermark from {} bytes of {}", bytes.len(), media_type);
        Ok(TransformOutput::new(bytes.to_vec()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let queue = ItemQueue::new().with_events(tx);

    // 12 inputs against a capacity of 10: the last two are dropped
    let inputs: Vec<Input> = (0..12)
        .map(|i| {
            let label = if i == 3 {
                "corrupt".to_string()
            } else {
                format!("photo-{}", i)
            };
            Input::new(label.into_bytes(), "image/jpeg")
        })
        .collect();
    let outcome = queue.add(inputs)?;
    println!(
        "Admitted {} item(s), rejected {}",
        outcome.admitted, outcome.rejected
    );

    let scheduler = BatchScheduler::new(FakeRemover);
    let summary = scheduler.run_all(&queue).await;
    println!(
        "Run finished in {}ms: {} succeeded, {} failed",
        summary.total_duration_ms, summary.succeeded, summary.failed
    );

    while let Ok(event) = rx.try_recv() {
        if let QueueEvent::ItemFinished {
            completed, total, ..
        } = event
        {
            println!("  progress {}/{}", completed, total);
        }
    }

    for item in queue.snapshot() {
        if let Some(error) = &item.error {
            println!("Item {} failed: {}", item.id, error);
        }
    }

    let stats = queue.stats();
    println!(
        "Stats: total={} completed={} success={} failed={}",
        stats.total, stats.completed, stats.success, stats.failed
    );

    queue.clear()?;
    println!("Live resources after clear: {}", queue.resources().live_count());
    Ok(())
}
