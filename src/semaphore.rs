//! A fixed-capacity [counting semaphore].
//!
//! See the [`CountingSemaphore`] type's documentation for details.
//!
//! [counting semaphore]: https://en.wikipedia.org/wiki/Semaphore_(programming)
use crate::{
    loom::sync::atomic::{AtomicUsize, Ordering::*},
    util::fmt,
};
use maitake_sync::{
    util::{Backoff, CachePadded},
    WaitQueue,
};


/// A fixed-capacity pool of interchangeable tokens.
///
/// A `CountingSemaphore` is created holding `capacity` tokens. Tokens are
/// taken from the pool with the `acquire` family of methods, and returned to
/// it with the `release` family. The number of available tokens always stays
/// within `0..=capacity`: an acquire that would take more tokens than are
/// available, or a release that would return more tokens than the pool can
/// hold, does not happen until it can.
///
/// Unlike [`maitake_sync::Semaphore`], tokens are not represented by RAII
/// permits. Any caller may release tokens, whether or not it acquired them,
/// as long as the pool has room for them.
///
/// # Waiting
///
/// Each operation comes in several forms:
///
/// - [`try_acquire`] and [`try_release`] never wait, and return `false` if
///   the operation cannot be performed right now.
/// - [`acquire`] and [`release`] are `async`, and wait until the operation
///   can be performed.
/// - [`acquire_blocking`] and [`release_blocking`] park the calling thread
///   until the operation can be performed. These require the "std" feature.
/// - [`acquire_spin`] and [`release_spin`] busy-wait with an exponential
///   backoff. They are intended for `no_std` environments, and only for
///   short waits.
///
/// Waiting callers are not served in any particular order. Whenever tokens are
/// acquired, every caller waiting to release is woken to try again, and
/// vice versa. A request for more tokens than the semaphore's capacity can
/// never succeed, so waiting for one never completes.
///
/// # Examples
///
/// Limiting the number of concurrent tasks:
///
/// ```
/// # #[tokio::main(flavor = "multi_thread")]
/// # async fn main() {
/// use spore::CountingSemaphore;
/// use std::sync::{
///     atomic::{AtomicUsize, Ordering::SeqCst},
///     Arc,
/// };
///
/// const MAX_RUNNING: usize = 4;
///
/// let sem = Arc::new(CountingSemaphore::new(MAX_RUNNING));
/// let running = Arc::new(AtomicUsize::new(0));
///
/// let tasks: Vec<_> = (0..16)
///     .map(|_| {
///         let sem = sem.clone();
///         let running = running.clone();
///         tokio::spawn(async move {
///             sem.acquire(1).await;
///             assert!(running.fetch_add(1, SeqCst) < MAX_RUNNING);
///             tokio::task::yield_now().await;
///             running.fetch_sub(1, SeqCst);
///             sem.release(1).await;
///         })
///     })
///     .collect();
///
/// for task in tasks {
///     task.await.unwrap();
/// }
/// assert_eq!(sem.available(), MAX_RUNNING);
/// # }
/// ```
///
/// [`try_acquire`]: Self::try_acquire
/// [`try_release`]: Self::try_release
/// [`acquire`]: Self::acquire
/// [`release`]: Self::release
/// [`acquire_blocking`]: Self::acquire_blocking
/// [`release_blocking`]: Self::release_blocking
/// [`acquire_spin`]: Self::acquire_spin
/// [`release_spin`]: Self::release_spin
pub struct CountingSemaphore {
    capacity: usize,
    available: CachePadded<AtomicUsize>,
    /// Tasks waiting for tokens to become available.
    acquire_wait: WaitQueue,
    /// Tasks waiting for room to return tokens.
    release_wait: WaitQueue,
}

impl CountingSemaphore {
    loom_const_fn! {
        /// Returns a new `CountingSemaphore` holding `capacity` tokens, all of
        /// which are available.
        #[must_use]
        pub fn new(capacity: usize) -> Self {
            Self {
                capacity,
                available: CachePadded::new(AtomicUsize::new(capacity)),
                acquire_wait: WaitQueue::new(),
                release_wait: WaitQueue::new(),
            }
        }
    }

    /// Returns the semaphore's capacity: the number of tokens it was created
    /// with.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Returns the number of tokens currently available.
    ///
    /// The count may change as soon as it is read, if other threads are
    /// acquiring or releasing tokens.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.available.load(Acquire)
    }

    /// Attempts to take `count` tokens without waiting.
    ///
    /// Returns `true` if the tokens were taken. Returns `false`, leaving the
    /// semaphore unchanged, if fewer than `count` tokens are available. If
    /// `count` exceeds the semaphore's [capacity](Self::size), this always
    /// returns `false`.
    pub fn try_acquire(&self, count: usize) -> bool {
        if count > self.capacity {
            trace!(
                count,
                capacity = self.capacity,
                "CountingSemaphore::try_acquire -> exceeds capacity"
            );
            return false;
        }

        let mut available = self.available.load(Acquire);
        loop {
            let Some(remaining) = available.checked_sub(count) else {
                trace!(
                    count,
                    available,
                    "CountingSemaphore::try_acquire -> insufficient tokens"
                );
                return false;
            };

            match test_dbg!(self.available.compare_exchange_weak(
                available, remaining, AcqRel, Acquire
            )) {
                Ok(_) => {
                    trace!(count, remaining, "CountingSemaphore::try_acquire -> acquired");
                    if count > 0 {
                        self.release_wait.wake_all();
                    }
                    return true;
                }
                Err(actual) => available = actual,
            }
        }
    }

    /// Attempts to return `count` tokens without waiting.
    ///
    /// Returns `true` if the tokens were returned. Returns `false`, leaving
    /// the semaphore unchanged, if returning them would leave more than
    /// [`size()`](Self::size) tokens available.
    pub fn try_release(&self, count: usize) -> bool {
        let mut available = self.available.load(Acquire);
        loop {
            let Some(updated) = available
                .checked_add(count)
                .filter(|&updated| updated <= self.capacity)
            else {
                trace!(
                    count,
                    available,
                    capacity = self.capacity,
                    "CountingSemaphore::try_release -> exceeds capacity"
                );
                return false;
            };

            match test_dbg!(self.available.compare_exchange_weak(
                available, updated, AcqRel, Acquire
            )) {
                Ok(_) => {
                    trace!(count, available = updated, "CountingSemaphore::try_release -> released");
                    if count > 0 {
                        self.acquire_wait.wake_all();
                    }
                    return true;
                }
                Err(actual) => available = actual,
            }
        }
    }

    /// Takes `count` tokens, waiting until they are available.
    ///
    /// If `count` exceeds the semaphore's [capacity](Self::size), the
    /// returned future never completes.
    ///
    /// # Cancellation
    ///
    /// Dropping the returned future before it completes takes no tokens.
    pub async fn acquire(&self, count: usize) {
        test_trace!(count, "CountingSemaphore::acquire");
        let res = self
            .acquire_wait
            .wait_for(|| self.try_acquire(count))
            .await;
        if let Err(error) = res {
            unreachable!("a semaphore's wait queues are never closed ({error})");
        }
    }

    /// Returns `count` tokens, waiting until there is room for them.
    ///
    /// If `count` exceeds the semaphore's [capacity](Self::size), the
    /// returned future never completes.
    ///
    /// # Cancellation
    ///
    /// Dropping the returned future before it completes returns no tokens.
    pub async fn release(&self, count: usize) {
        test_trace!(count, "CountingSemaphore::release");
        let res = self
            .release_wait
            .wait_for(|| self.try_release(count))
            .await;
        if let Err(error) = res {
            unreachable!("a semaphore's wait queues are never closed ({error})");
        }
    }

    /// Takes `count` tokens, parking the current thread until they are
    /// available.
    ///
    /// This is the blocking equivalent of [`acquire`](Self::acquire).
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn acquire_blocking(&self, count: usize) {
        crate::loom::blocking::block_on(self.acquire(count))
    }

    /// Returns `count` tokens, parking the current thread until there is room
    /// for them.
    ///
    /// This is the blocking equivalent of [`release`](Self::release).
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn release_blocking(&self, count: usize) {
        crate::loom::blocking::block_on(self.release(count))
    }

    /// Takes `count` tokens, spinning until they are available.
    ///
    /// This busy-waits with an exponential [`Backoff`], and should only be
    /// used where parking is not possible and the wait is known to be short.
    /// Prefer [`acquire`](Self::acquire), or `acquire_blocking` when the
    /// "std" feature is enabled.
    pub fn acquire_spin(&self, count: usize) {
        let mut backoff = Backoff::new();
        while !self.try_acquire(count) {
            backoff.spin();
        }
    }

    /// Returns `count` tokens, spinning until there is room for them.
    ///
    /// See [`acquire_spin`](Self::acquire_spin) for caveats.
    pub fn release_spin(&self, count: usize) {
        let mut backoff = Backoff::new();
        while !self.try_release(count) {
            backoff.spin();
        }
    }
}

impl fmt::Debug for CountingSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingSemaphore")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("acquire_wait", &self.acquire_wait)
            .field("release_wait", &self.release_wait)
            .finish()
    }
}
