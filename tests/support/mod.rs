//! Shared test support: an in-memory storage backend and a wrapper that
//! tracks how many provider calls are in flight at once.

// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cryptomator_core::{DataProvider, Item, ProviderError};

fn norm(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

fn leaf_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((_, leaf)) => leaf.to_string(),
        None => path.to_string(),
    }
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// In-memory blob store with directory semantics.
#[derive(Default)]
pub struct MemoryProvider {
    state: Mutex<State>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored path (files and directories), sorted.
    pub fn all_paths(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut paths: Vec<String> = state.files.keys().cloned().collect();
        paths.extend(state.dirs.iter().cloned());
        paths.sort();
        paths
    }

    /// Raw file contents, if the path is a file.
    pub fn raw_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(&norm(path)).cloned()
    }

    /// Overwrite a file without any parent checks (for tampering tests).
    pub fn tamper_file(&self, path: &str, data: Vec<u8>) {
        self.state.lock().unwrap().files.insert(norm(path), data);
    }
}

#[async_trait]
impl DataProvider for MemoryProvider {
    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        Ok(state.files.contains_key(&path) || state.dirs.contains(&path))
    }

    async fn read_file_string(&self, path: &str) -> Result<String, ProviderError> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        let data = state
            .files
            .get(&path)
            .ok_or_else(|| ProviderError::NotFound(path.clone()))?;
        String::from_utf8(data.clone()).map_err(|e| ProviderError::Other(e.to_string()))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), ProviderError> {
        let path = norm(path);
        let parent = parent_of(&path);
        let mut state = self.state.lock().unwrap();
        if !parent.is_empty() && !state.dirs.contains(&parent) {
            return Err(ProviderError::NotFound(parent));
        }
        state.files.insert(path, data.to_vec());
        Ok(())
    }

    async fn create_dir(&self, path: &str, recursive: bool) -> Result<(), ProviderError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        if state.files.contains_key(&path) {
            return Err(ProviderError::AlreadyExists(path));
        }
        if recursive {
            let mut prefix = String::new();
            for segment in path.split('/') {
                if prefix.is_empty() {
                    prefix = segment.to_string();
                } else {
                    prefix = format!("{prefix}/{segment}");
                }
                state.dirs.insert(prefix.clone());
            }
        } else {
            if state.dirs.contains(&path) {
                return Err(ProviderError::AlreadyExists(path));
            }
            let parent = parent_of(&path);
            if !parent.is_empty() && !state.dirs.contains(&parent) {
                return Err(ProviderError::NotFound(parent));
            }
            state.dirs.insert(path);
        }
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), ProviderError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        if state.dirs.contains(&path) {
            return Err(ProviderError::Other(format!("is a directory: {path}")));
        }
        state
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(ProviderError::NotFound(path))
    }

    async fn remove_dir(&self, path: &str) -> Result<(), ProviderError> {
        let path = norm(path);
        let mut state = self.state.lock().unwrap();
        if !state.dirs.contains(&path) {
            return Err(ProviderError::NotFound(path));
        }
        let prefix = format!("{path}/");
        state.dirs.retain(|d| d != &path && !d.starts_with(&prefix));
        state.files.retain(|f, _| !f.starts_with(&prefix));
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), ProviderError> {
        let from = norm(from);
        let to = norm(to);
        let mut state = self.state.lock().unwrap();

        let to_parent = parent_of(&to);
        if !to_parent.is_empty() && !state.dirs.contains(&to_parent) {
            return Err(ProviderError::NotFound(to_parent));
        }

        if let Some(data) = state.files.remove(&from) {
            state.files.insert(to, data);
            return Ok(());
        }
        if state.dirs.contains(&from) {
            let prefix = format!("{from}/");
            let moved_dirs: Vec<String> = state
                .dirs
                .iter()
                .filter(|d| *d == &from || d.starts_with(&prefix))
                .cloned()
                .collect();
            for dir in moved_dirs {
                state.dirs.remove(&dir);
                state.dirs.insert(format!("{to}{}", &dir[from.len()..]));
            }
            let moved_files: Vec<String> = state
                .files
                .keys()
                .filter(|f| f.starts_with(&prefix))
                .cloned()
                .collect();
            for file in moved_files {
                let data = state.files.remove(&file).unwrap();
                state.files.insert(format!("{to}{}", &file[from.len()..]), data);
            }
            return Ok(());
        }
        Err(ProviderError::NotFound(from))
    }

    async fn list_items(&self, path: &str) -> Result<Vec<Item>, ProviderError> {
        let path = norm(path);
        let state = self.state.lock().unwrap();
        if !state.dirs.contains(&path) {
            return Err(ProviderError::NotFound(path));
        }
        let prefix = format!("{path}/");
        let mut items = Vec::new();
        for dir in &state.dirs {
            if let Some(rest) = dir.strip_prefix(&prefix) {
                if !rest.contains('/') {
                    items.push(Item::directory(leaf_of(dir), dir.clone()));
                }
            }
        }
        for (file, data) in &state.files {
            if let Some(rest) = file.strip_prefix(&prefix) {
                if !rest.contains('/') {
                    items.push(Item::file(leaf_of(file), file.clone(), data.len() as u64));
                }
            }
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}

/// Counts in-flight calls on an inner provider; each call yields once
/// while counted so batched fan-out becomes observable.
pub struct TrackingProvider<P> {
    inner: P,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl<P> TrackingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.current.store(0, Ordering::SeqCst);
        self.max_concurrent.store(0, Ordering::SeqCst);
    }

    async fn track<T, F>(&self, op: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(in_flight, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let out = op.await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for TrackingProvider<P> {
    async fn exists(&self, path: &str) -> Result<bool, ProviderError> {
        self.track(self.inner.exists(path)).await
    }

    async fn read_file_string(&self, path: &str) -> Result<String, ProviderError> {
        self.track(self.inner.read_file_string(path)).await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), ProviderError> {
        self.track(self.inner.write_file(path, data)).await
    }

    async fn create_dir(&self, path: &str, recursive: bool) -> Result<(), ProviderError> {
        self.track(self.inner.create_dir(path, recursive)).await
    }

    async fn remove_file(&self, path: &str) -> Result<(), ProviderError> {
        self.track(self.inner.remove_file(path)).await
    }

    async fn remove_dir(&self, path: &str) -> Result<(), ProviderError> {
        self.track(self.inner.remove_dir(path)).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), ProviderError> {
        self.track(self.inner.rename(from, to)).await
    }

    async fn list_items(&self, path: &str) -> Result<Vec<Item>, ProviderError> {
        self.track(self.inner.list_items(path)).await
    }
}
