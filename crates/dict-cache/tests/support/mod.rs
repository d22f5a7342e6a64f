#![allow(dead_code)]

use dict_cache::{DictError, DictLoader, RefreshPolicy, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Loader double: serves a configurable body or fails, and can be held
/// inside `fetch_raw` until released.
pub struct FakeLoader {
    calls: AtomicUsize,
    body: Mutex<Option<String>>,
    held: Mutex<bool>,
    released: Condvar,
    root: Mutex<Option<PathBuf>>,
    with_root: bool,
}

impl FakeLoader {
    pub fn serving(body: impl Into<String>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            body: Mutex::new(Some(body.into())),
            held: Mutex::new(false),
            released: Condvar::new(),
            root: Mutex::new(None),
            with_root: false,
        }
    }

    pub fn failing() -> Self {
        let loader = Self::serving("");
        loader.fail();
        loader
    }

    /// Variant that behaves like a local repository loader.
    pub fn with_repository_root(body: impl Into<String>) -> Self {
        Self {
            with_root: true,
            ..Self::serving(body)
        }
    }

    pub fn serve(&self, body: impl Into<String>) {
        *self.body.lock().unwrap() = Some(body.into());
    }

    pub fn fail(&self) {
        *self.body.lock().unwrap() = None;
    }

    pub fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    pub fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.released.notify_all();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DictLoader for FakeLoader {
    fn fetch_raw(&self) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.released.wait(held).unwrap();
        }
        drop(held);
        match self.body.lock().unwrap().clone() {
            Some(body) => Ok(body.into_bytes()),
            None => Err(DictError::Network("connection refused".into())),
        }
    }

    fn describe(&self) -> String {
        "Fake".into()
    }

    fn probe(&self) -> bool {
        self.body.lock().unwrap().is_some()
    }

    fn set_repository_root(&self, root: &Path) -> Result<()> {
        if !self.with_root {
            return Err(DictError::Unsupported("no repository root".into()));
        }
        *self.root.lock().unwrap() = Some(root.to_path_buf());
        Ok(())
    }

    fn repository_root(&self) -> Option<PathBuf> {
        self.root.lock().unwrap().clone()
    }

    fn uses_repository_root(&self) -> bool {
        self.with_root
    }
}

/// Schema with `count` fields named `<prefix>0..` under group `prefix`.
pub fn schema_with(prefix: &str, count: usize) -> String {
    let mut xml = format!(r#"<schema id="MDict"><complexType id="{prefix}">"#);
    for i in 0..count {
        xml.push_str(&format!(
            r#"<element id="{prefix}{i}" longname="{prefix}{i}" type="String" dbname="{prefix}_{i}"/>"#
        ));
    }
    xml.push_str("</complexType></schema>");
    xml
}

pub fn fast_policy() -> RefreshPolicy {
    RefreshPolicy {
        interval: Duration::from_millis(20),
        initial_delay: Duration::from_millis(0),
        fetch_timeout: Duration::from_secs(5),
        degraded_threshold: 5,
        suspend_threshold: 10,
    }
}

pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
