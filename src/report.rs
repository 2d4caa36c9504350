use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::model::{SkipEntry, SkipReason};

pub trait Reporter: Send + Sync {
    fn skipped(&self, unit: &str, reason: &SkipReason);

    fn produced(&self, path: &Path, pages: usize);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn skipped(&self, unit: &str, reason: &SkipReason) {
        warn!(unit, kind = reason.kind(), reason = %reason, "skipped");
    }

    fn produced(&self, path: &Path, pages: usize) {
        info!(path = %path.display(), pages, "wrote document");
    }
}

#[derive(Debug, Default)]
pub struct CollectingReporter<R> {
    inner: R,
    skips: Mutex<Vec<SkipEntry>>,
    outputs: Mutex<Vec<(PathBuf, usize)>>,
}

impl<R: Reporter> CollectingReporter<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            skips: Mutex::new(Vec::new()),
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub fn skips(&self) -> Vec<SkipEntry> {
        lock(&self.skips).clone()
    }

    pub fn outputs(&self) -> Vec<(PathBuf, usize)> {
        lock(&self.outputs).clone()
    }

    #[cfg(test)]
    pub fn skip_kinds(&self) -> Vec<&'static str> {
        lock(&self.skips)
            .iter()
            .map(|entry| entry.reason.kind())
            .collect()
    }
}

impl<R: Reporter> Reporter for CollectingReporter<R> {
    fn skipped(&self, unit: &str, reason: &SkipReason) {
        lock(&self.skips).push(SkipEntry {
            unit: unit.to_string(),
            reason: reason.clone(),
        });
        self.inner.skipped(unit, reason);
    }

    fn produced(&self, path: &Path, pages: usize) {
        lock(&self.outputs).push((path.to_path_buf(), pages));
        self.inner.produced(path, pages);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

#[cfg(test)]
impl Reporter for NullReporter {
    fn skipped(&self, _unit: &str, _reason: &SkipReason) {}

    fn produced(&self, _path: &Path, _pages: usize) {}
}

#[cfg(test)]
pub type RecordingReporter = CollectingReporter<NullReporter>;
