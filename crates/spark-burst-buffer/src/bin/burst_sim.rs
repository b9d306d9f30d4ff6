//! 突发缓冲模拟工具：以固定节奏录制、以间歇性变慢的写入端落盘，观察告警、淘汰与背压。
//!
//! # 使用方法
//! ```bash
//! RUST_LOG=debug cargo run -p spark-burst-buffer --features sim --bin burst-sim -- buffer.toml
//! ```
//! - `buffer.toml`：可选，[`BufferConfig`] 的 TOML 文本；缺省时使用 256 KiB 容量与 80% 水位。
//!
//! # 设计要点（Why）
//! - 写入端每接收 `STALL_EVERY` 字节就施加一次背压，并在 `STALL_FOR` 之后通过通知句柄恢复，
//!   录制速率高于写入端的平均吞吐，因此缓冲会依次经历高水位告警、溢出与淘汰。

use std::{
    env, fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::Context;
use bytes::Bytes;
use spark_burst_buffer::{
    BufferConfig, BurstBuffer, BurstBufferDriver, Chunk, ChunkWriter, WriteSignal, WriterError,
    WriterNotifier,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CHUNK_SIZE: usize = 8 * 1024;
const CHUNK_COUNT: usize = 400;
const RECORD_INTERVAL: Duration = Duration::from_millis(2);
const STALL_EVERY: usize = 64 * 1024;
const STALL_FOR: Duration = Duration::from_millis(40);

/// 间歇性变慢的写入端，只统计字节数。
struct StallingWriter {
    notifier: WriterNotifier,
    written: AtomicUsize,
    since_stall: AtomicUsize,
}

impl ChunkWriter for StallingWriter {
    fn write(&self, chunk: Chunk) -> Result<WriteSignal, WriterError> {
        self.written.fetch_add(chunk.len(), Ordering::Relaxed);
        let since = self.since_stall.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
        if since < STALL_EVERY {
            return Ok(WriteSignal::Accepted);
        }
        self.since_stall.store(0, Ordering::Relaxed);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            tokio::time::sleep(STALL_FOR).await;
            notifier.ready();
        });
        Ok(WriteSignal::FlowControlApplied)
    }
}

fn load_config() -> anyhow::Result<BufferConfig> {
    match env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("读取配置失败: {}", path.display()))?;
            Ok(BufferConfig::from_toml_str(&text)?)
        }
        None => Ok(BufferConfig::new(256 * 1024, 80.0, "burst-sim")),
    }
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("安装 tracing 订阅器失败")?;

    let config = load_config()?;
    let buffer = BurstBuffer::new(config)?;
    let (mut driver, handle) = BurstBufferDriver::new(buffer);
    let writer = Arc::new(StallingWriter {
        notifier: driver.notifier(),
        written: AtomicUsize::new(0),
        since_stall: AtomicUsize::new(0),
    });
    driver.attach(writer.clone())?;
    let task = driver.spawn();

    let payload = Bytes::from(vec![0u8; CHUNK_SIZE]);
    for _ in 0..CHUNK_COUNT {
        handle.accept(payload.clone());
        tokio::time::sleep(RECORD_INTERVAL).await;
    }

    let outcome = handle.flush().await?;
    let stats = handle.stats().await?;
    let metrics = handle.metrics().await?;
    println!("flush: {outcome:?}");
    println!("usage: {stats}");
    println!("metrics: {metrics:#?}");
    println!(
        "writer received {} bytes",
        writer.written.load(Ordering::Relaxed)
    );

    handle.destroy(None)?;
    task.await.context("驱动任务异常退出")??;
    Ok(())
}
