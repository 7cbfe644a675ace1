//! AssetCache: keyed single-flight cache over a [`Fetcher`]
//!
//! Every key is in one of three states:
//! - absent: neither resolved nor in flight
//! - in flight: one resolution is running; waiters queue behind it
//! - resolved: the value is cached and handed out to every later request
//!
//! All state sits behind one mutex. The lock is never held while the fetcher
//! or a completion callback runs, so callbacks may call back into the cache.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::key::AssetKey;
use crate::stats::CacheStats;

type Notify<V> = Box<dyn FnOnce(Result<Arc<V>>) + Send>;

/// A queued completion callback
struct Waiter<V> {
    id: u64,
    notify: Notify<V>,
}

struct State<V> {
    /// Resolved values, never evicted
    resolved: HashMap<AssetKey, Arc<V>, RandomState>,

    /// In-flight keys and their waiters in arrival order; the initiating
    /// request is always at the head
    in_flight: HashMap<AssetKey, VecDeque<Waiter<V>>, RandomState>,

    next_waiter: u64,
}

struct Inner<F: Fetcher> {
    fetcher: F,
    state: Mutex<State<F::Output>>,
    stats: CacheStats,
    runtime: Handle,
}

/// Handle to one `fetch` request, used to cancel it while it is queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: AssetKey,
    waiter: Option<u64>,
}

impl Ticket {
    /// Key the request was made for
    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    /// Whether the request was answered from the cache before `fetch` returned
    pub fn is_immediate(&self) -> bool {
        self.waiter.is_none()
    }
}

/// Keyed single-flight cache
///
/// Concurrent requests for the same key result in exactly one call to the
/// fetcher; every request is notified exactly once with the shared result.
/// Successful values are retained for the lifetime of the cache. Failed
/// resolutions are reported to every waiter and leave the key absent so a
/// later request retries.
///
/// Cloning yields another handle to the same cache.
pub struct AssetCache<F: Fetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher> Clone for AssetCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Fetcher> AssetCache<F> {
    /// Create a cache that spawns resolutions on `runtime`
    pub fn new(fetcher: F, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Mutex::new(State {
                    resolved: HashMap::with_hasher(RandomState::new()),
                    in_flight: HashMap::with_hasher(RandomState::new()),
                    next_waiter: 0,
                }),
                stats: CacheStats::new(),
                runtime,
            }),
        }
    }

    /// Create a cache bound to the runtime of the calling context
    ///
    /// # Returns
    /// * `Result<AssetCache<F>>` - `Error::NoRuntime` outside a tokio runtime
    pub fn try_current(fetcher: F) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::new(fetcher, runtime))
    }

    /// Request the value for `key`
    ///
    /// `on_complete` receives `ctx` back together with the result, exactly once:
    /// - resolved key: synchronously, before `fetch` returns
    /// - in-flight key: after the running resolution finishes, behind earlier waiters
    /// - absent key: after a newly dispatched resolution finishes
    ///
    /// # Arguments
    /// * `key` - Resource to fetch
    /// * `ctx` - Caller data handed back to `on_complete`
    /// * `on_complete` - Completion callback
    ///
    /// # Returns
    /// * `Ticket` - Handle for [`AssetCache::cancel`]
    pub fn fetch<C, CB>(&self, key: AssetKey, ctx: C, on_complete: CB) -> Ticket
    where
        C: Send + 'static,
        CB: FnOnce(C, Result<Arc<F::Output>>) + Send + 'static,
    {
        let mut state = self.inner.state.lock();

        if let Some(value) = state.resolved.get(&key).cloned() {
            drop(state);
            self.inner.stats.record_hit();
            trace!(%key, "Sprite cache hit");
            on_complete(ctx, Ok(value));
            return Ticket { key, waiter: None };
        }

        let id = state.next_waiter;
        state.next_waiter += 1;
        let waiter = Waiter {
            id,
            notify: Box::new(move |result| on_complete(ctx, result)),
        };

        if let Some(waiters) = state.in_flight.get_mut(&key) {
            waiters.push_back(waiter);
            let queued = waiters.len();
            drop(state);
            self.inner.stats.record_join();
            debug!(%key, queued, "Joined in-flight sprite fetch");
            return Ticket {
                key,
                waiter: Some(id),
            };
        }

        state.in_flight.insert(key.clone(), VecDeque::from([waiter]));
        drop(state);
        self.inner.stats.record_miss();
        debug!(%key, "Dispatching sprite fetch");
        self.dispatch(key.clone());

        Ticket {
            key,
            waiter: Some(id),
        }
    }

    /// Fetch `key` and wait for the result
    ///
    /// Dropping the returned future before it completes withdraws its request;
    /// the underlying resolution keeps running for the other waiters.
    pub async fn get(&self, key: AssetKey) -> Result<Arc<F::Output>> {
        let (tx, rx) = oneshot::channel();
        let ticket = self.fetch(key.clone(), tx, |tx, result| {
            let _ = tx.send(result);
        });

        let mut pending = PendingGet {
            cache: self,
            ticket: Some(ticket),
        };
        let result = rx.await;
        pending.ticket = None;

        result.unwrap_or_else(|_| Err(Error::Aborted(key.to_string())))
    }

    /// Withdraw a queued request without invoking its callback
    ///
    /// Other waiters for the key keep their order and the resolution keeps
    /// running.
    ///
    /// # Returns
    /// * `bool` - false if the request was already notified or withdrawn
    pub fn cancel(&self, ticket: &Ticket) -> bool {
        let Some(id) = ticket.waiter else {
            return false;
        };

        let removed = {
            let mut state = self.inner.state.lock();
            state.in_flight.get_mut(&ticket.key).and_then(|waiters| {
                let pos = waiters.iter().position(|w| w.id == id)?;
                waiters.remove(pos)
            })
        };

        match removed {
            Some(_waiter) => {
                self.inner.stats.record_cancellation();
                debug!(key = %ticket.key, "Cancelled sprite request");
                true
            }
            None => false,
        }
    }

    /// Get a resolved value without fetching
    pub fn peek(&self, key: &str) -> Option<Arc<F::Output>> {
        self.inner.state.lock().resolved.get(key).cloned()
    }

    /// Check if a key is resolved
    pub fn contains(&self, key: &str) -> bool {
        self.inner.state.lock().resolved.contains_key(key)
    }

    /// Check if a resolution is running for a key
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.state.lock().in_flight.contains_key(key)
    }

    /// Number of requests waiting on a key
    pub fn pending_waiters(&self, key: &str) -> usize {
        self.inner
            .state
            .lock()
            .in_flight
            .get(key)
            .map_or(0, VecDeque::len)
    }

    /// Number of resolved keys
    pub fn len(&self) -> usize {
        self.inner.state.lock().resolved.len()
    }

    /// Check if no key is resolved
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().resolved.is_empty()
    }

    /// Number of keys with a running resolution
    pub fn in_flight_len(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// The underlying fetcher
    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    fn dispatch(&self, key: AssetKey) {
        // Armed before the fetcher runs so that a panic or a dropped task
        // still settles the key
        let completion = Completion {
            inner: Arc::clone(&self.inner),
            key: Some(key.clone()),
        };
        let resolution = self.inner.fetcher.fetch(&key);

        self.inner.runtime.spawn(async move {
            let result = resolution.await;
            completion.complete(result);
        });
    }
}

impl<F: Fetcher> Inner<F> {
    fn finish(&self, key: AssetKey, result: Result<Arc<F::Output>>) {
        let waiters = {
            let mut state = self.state.lock();
            let waiters = state.in_flight.remove(&key).unwrap_or_default();
            if let Ok(value) = &result {
                state.resolved.insert(key.clone(), Arc::clone(value));
            }
            waiters
        };

        match &result {
            Ok(_) => debug!(%key, waiters = waiters.len(), "Sprite resolved"),
            Err(e) => {
                self.stats.record_failure();
                warn!(
                    %key,
                    waiters = waiters.len(),
                    error = %e,
                    "Sprite resolution failed"
                );
            }
        }

        // A panicking callback must not strand the waiters queued behind it;
        // the first panic is re-raised once everyone has been notified
        let mut first_panic = None;
        for waiter in waiters {
            let result = result.clone();
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || (waiter.notify)(result)));
            if let Err(payload) = outcome {
                warn!(%key, "Sprite completion callback panicked");
                first_panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }
}

/// Settles an in-flight key exactly once, with `Error::Aborted` if dropped
/// before completing
struct Completion<F: Fetcher> {
    inner: Arc<Inner<F>>,
    key: Option<AssetKey>,
}

impl<F: Fetcher> Completion<F> {
    fn complete(mut self, result: Result<F::Output>) {
        if let Some(key) = self.key.take() {
            self.inner.finish(key, result.map(Arc::new));
        }
    }
}

impl<F: Fetcher> Drop for Completion<F> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let err = Error::Aborted(key.to_string());
            self.inner.finish(key, Err(err));
        }
    }
}

/// Withdraws the request of an abandoned `get`
struct PendingGet<'a, F: Fetcher> {
    cache: &'a AssetCache<F>,
    ticket: Option<Ticket>,
}

impl<F: Fetcher> Drop for PendingGet<'_, F> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.cache.cancel(&ticket);
        }
    }
}
