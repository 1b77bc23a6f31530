use c8db_core::ArgumentError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Endpoint is a snapshot of one candidate host and its reachability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub index: usize,
    pub url: String,
    pub alive: bool,
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Health {
    suspected_dead: bool,
    last_failure: Option<DateTime<Utc>>,
}

/// Ordered set of candidate hosts with a rotating "active" pointer
///
/// Rotation is round-robin over the configured order. With a single host,
/// rotating is a no-op that returns the same endpoint.
pub struct HostPool {
    urls: Vec<String>,
    health: Mutex<Vec<Health>>,
    active: AtomicUsize,
}

impl HostPool {
    pub fn new(urls: Vec<String>) -> Result<Self, ArgumentError> {
        if urls.is_empty() {
            return Err(ArgumentError::InvalidArgument(
                "at least one endpoint url is required".to_string(),
            ));
        }
        let urls: Vec<String> = urls
            .into_iter()
            .map(|u| u.trim_end_matches('/').to_string())
            .collect();
        let health = vec![Health::default(); urls.len()];

        Ok(Self {
            urls,
            health: Mutex::new(health),
            active: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn url(&self, index: usize) -> Option<&str> {
        self.urls.get(index).map(String::as_str)
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire) % self.urls.len()
    }

    pub fn active_host(&self) -> Endpoint {
        self.endpoint(self.active_index())
    }

    /// Advance the active pointer by one, wrapping
    pub fn rotate(&self) -> Endpoint {
        let current = self.active_index();
        let next = self.rotate_from(current);
        self.endpoint(next)
    }

    /// Advance past `from` unless another caller already moved the pointer
    ///
    /// Returns the index now active. Concurrent failures on the same host
    /// therefore produce a single step.
    pub fn rotate_from(&self, from: usize) -> usize {
        let len = self.urls.len();
        if len == 1 {
            return 0;
        }
        let next = (from + 1) % len;
        match self
            .active
            .compare_exchange(from, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!(from = %self.urls[from], to = %self.urls[next], "Rotated active host");
                next
            }
            Err(current) => current % len,
        }
    }

    pub fn all(&self) -> Vec<Endpoint> {
        (0..self.urls.len()).map(|i| self.endpoint(i)).collect()
    }

    pub fn mark_failed(&self, index: usize) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(h) = health.get_mut(index) {
            h.suspected_dead = true;
            h.last_failure = Some(Utc::now());
        }
    }

    pub fn mark_alive(&self, index: usize) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(h) = health.get_mut(index) {
            h.suspected_dead = false;
        }
    }

    fn endpoint(&self, index: usize) -> Endpoint {
        let health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        let h = health.get(index).cloned().unwrap_or_default();
        Endpoint {
            index,
            url: self.urls[index].clone(),
            alive: !h.suspected_dead,
            last_failure: h.last_failure,
        }
    }
}
