//! In-process cache store backed by a HashMap.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};

use super::traits::{CacheStore, Response};

/// Cache store that keeps all generations in process memory.
///
/// Used by the test harness and by embedders that do not want
/// persistence across runs.
#[derive(Default)]
pub struct MemoryStore {
  generations: Mutex<HashMap<String, HashMap<String, Response>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CacheStore for MemoryStore {
  async fn open(&self, label: &str) -> Result<()> {
    let mut generations = lock(&self.generations)?;
    generations.entry(label.to_string()).or_default();
    Ok(())
  }

  async fn put(&self, label: &str, response: Response) -> Result<()> {
    let mut generations = lock(&self.generations)?;
    generations
      .entry(label.to_string())
      .or_default()
      .insert(response.url.clone(), response);
    Ok(())
  }

  async fn add_all(&self, label: &str, responses: Vec<Response>) -> Result<()> {
    let mut generations = lock(&self.generations)?;
    let generation = generations.entry(label.to_string()).or_default();
    for response in responses {
      generation.insert(response.url.clone(), response);
    }
    Ok(())
  }

  async fn match_in(&self, label: &str, url: &str) -> Result<Option<Response>> {
    let generations = lock(&self.generations)?;
    Ok(generations.get(label).and_then(|g| g.get(url)).cloned())
  }

  async fn match_any(&self, url: &str) -> Result<Option<Response>> {
    let generations = lock(&self.generations)?;

    let mut labels: Vec<&String> = generations.keys().collect();
    labels.sort();

    for label in labels {
      if let Some(response) = generations.get(label).and_then(|g| g.get(url)) {
        return Ok(Some(response.clone()));
      }
    }

    Ok(None)
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let generations = lock(&self.generations)?;
    let mut labels: Vec<String> = generations.keys().cloned().collect();
    labels.sort();
    Ok(labels)
  }

  async fn entries(&self, label: &str) -> Result<Vec<String>> {
    let generations = lock(&self.generations)?;
    let mut urls: Vec<String> = generations
      .get(label)
      .map(|g| g.keys().cloned().collect())
      .unwrap_or_default();
    urls.sort();
    Ok(urls)
  }

  async fn delete(&self, label: &str) -> Result<bool> {
    let mut generations = lock(&self.generations)?;
    Ok(generations.remove(label).is_some())
  }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
  mutex.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}
