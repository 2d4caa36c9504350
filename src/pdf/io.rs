use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use lopdf::Document;
use tracing::debug;

use crate::cli::IoArgs;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoPolicy {
    pub retries: u32,
    pub timeout: Option<Duration>,
}

impl IoPolicy {
    pub fn from_args(args: &IoArgs) -> Self {
        Self {
            retries: args.io_retries,
            timeout: (args.io_timeout_ms > 0).then(|| Duration::from_millis(args.io_timeout_ms)),
        }
    }

    pub fn run<T, F>(&self, label: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&Attempt) -> Result<T> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let attempts = self.retries.saturating_add(1);
        let mut last_error = anyhow!("{label}: no attempt was made");

        for attempt in 1..=attempts {
            let token = Attempt::default();
            let result = match self.timeout {
                Some(limit) => run_with_timeout(Arc::clone(&op), token, limit),
                None => op(&token),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(label, attempt, attempts, error = %err, "document I/O attempt failed");
                    last_error = err;
                }
            }
        }

        Err(last_error).with_context(|| format!("{label} failed after {attempts} attempt(s)"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Attempt {
    abandoned: Arc<AtomicBool>,
}

impl Attempt {
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }
}

fn run_with_timeout<T, F>(op: Arc<F>, token: Attempt, limit: Duration) -> Result<T>
where
    T: Send + 'static,
    F: Fn(&Attempt) -> Result<T> + Send + Sync + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let worker_token = token.clone();
    thread::Builder::new()
        .name("pdf-io".to_string())
        .spawn(move || {
            let _ = sender.send(op(&worker_token));
        })
        .context("failed to spawn document I/O worker")?;

    match receiver.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            token.abandon();
            bail!("timed out after {} ms", limit.as_millis())
        }
        Err(RecvTimeoutError::Disconnected) => bail!("document I/O worker exited without a result"),
    }
}

pub fn load_document(policy: &IoPolicy, path: &Path) -> Result<Document> {
    let owned = path.to_path_buf();
    policy.run(&format!("load {}", path.display()), move |_| {
        Document::load(&owned).with_context(|| format!("failed to load {}", owned.display()))
    })
}

pub fn write_atomic(policy: &IoPolicy, path: &Path, bytes: Vec<u8>) -> Result<()> {
    let target = path.to_path_buf();
    let bytes = Arc::new(bytes);
    let attempt_counter = Arc::new(AtomicU32::new(0));

    policy.run(&format!("write {}", path.display()), move |attempt| {
        let temporary = temporary_sibling(&target, attempt_counter.fetch_add(1, Ordering::Relaxed));
        write_then_rename(attempt, &bytes, &temporary, &target)
    })
}

fn write_then_rename(
    attempt: &Attempt,
    bytes: &[u8],
    temporary: &Path,
    target: &Path,
) -> Result<()> {
    let written = fs::write(temporary, bytes)
        .with_context(|| format!("failed to write {}", temporary.display()))
        .and_then(|()| {
            if attempt.is_abandoned() {
                bail!("attempt abandoned after timing out; {} left untouched", target.display());
            }
            fs::rename(temporary, target).with_context(|| {
                format!(
                    "failed to move {} to {}",
                    temporary.display(),
                    target.display()
                )
            })
        });

    if written.is_err() {
        let _ = fs::remove_file(temporary);
    }
    written
}

fn temporary_sibling(target: &Path, attempt: u32) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{attempt}.part"))
}
