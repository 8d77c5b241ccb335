//! Shared helpers for integration tests

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tracing_subscriber::EnvFilter;

/// Base address used by every test controller
pub const BASE: &str = "123456";

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Let spawned tasks run without crossing any protocol timer
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[derive(Default)]
struct Recorded {
    bytes: Vec<u8>,
    fail_writes: bool,
}

/// In-memory stand-in for the stick's serial port
#[derive(Clone, Default)]
pub struct RecordingWriter {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, split into lines without the `\n`
    pub fn lines(&self) -> Vec<String> {
        let recorded = self.inner.lock().unwrap();
        String::from_utf8_lossy(&recorded.bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Only the `Zs` frame lines
    pub fn frames(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with("Zs"))
            .collect()
    }

    /// Make every following write fail with a broken pipe
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut recorded = self.inner.lock().unwrap();
        if recorded.fail_writes {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "serial port unplugged",
            )));
        }
        recorded.bytes.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
