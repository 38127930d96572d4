//! Write-once values that are broadcast to every listener.
//!
//! A [`BroadcastFuture`] starts out empty. Any number of tasks or threads may
//! call [`get`] on it, at any time, to obtain a [`Receiver`] for its value.
//! The first call to [`set`] stores the value and sends a clone of it to every
//! [`Receiver`] obtained so far, and to every [`Receiver`] obtained later.
//! Each [`Receiver`] yields the value exactly once, and then reports that it
//! is closed.
//!
//! An [`ImmediateFuture`] is created already holding its value. Both types
//! implement the [`Broadcast`] trait, so code that only needs to read (or
//! race to write) a value can be generic over either.
//!
//! [`get`]: Broadcast::get
//! [`set`]: Broadcast::set
use crate::{
    loom::{
        cell::UnsafeCell,
        sync::atomic::{AtomicUsize, Ordering::*},
    },
    oneshot::{self, Receiver},
    util::fmt,
};
use alloc::boxed::Box;
use cordyceps::{
    stack::{self, TransferStack},
    Linked,
};
use core::{
    mem::MaybeUninit,
    ptr::{self, NonNull},
};
use maitake_sync::util::CachePadded;


/// The panic message used when [`set`](Broadcast::set) is called on an
/// [`ImmediateFuture`].
pub const SET_ON_IMMEDIATE_FUTURE: &str = "you cannot set a value on an immediate future";

/// A value of type `T` which will be available at some point.
///
/// This trait is implemented by [`BroadcastFuture`], which is set at most
/// once at runtime, and [`ImmediateFuture`], which is constructed with its
/// value.
pub trait Broadcast<T> {
    /// Returns a [`Receiver`] that will yield the value once it is available.
    ///
    /// This may be called any number of times, from any number of threads,
    /// before or after the value is set. Each returned [`Receiver`] yields the
    /// value exactly once, and then reports that it is closed.
    fn get(&self) -> Receiver<T>;

    /// Sets the value, notifying every [`Receiver`].
    ///
    /// Returns `true` if this call set the value, or `false` if the value was
    /// already set (or is being set by a concurrent call). In that case,
    /// `value` is dropped.
    fn set(&self, value: T) -> bool;
}

/// A write-once value, broadcast to every listener.
///
/// See the [module-level documentation](self) for an overview.
///
/// # Implementation notes
///
/// Listeners are registered by pushing the sending half of a
/// [single-slot channel](crate::oneshot) onto a lock-free intrusive stack.
/// After every registration, and after the value is stored, the future
/// *publishes*: if the value is set, it atomically takes every listener
/// currently in the stack, and sends each a clone of the value. Taking the
/// whole stack is a single atomic swap, so each listener is taken, and sent
/// the value, by exactly one publish.
///
/// A registration cannot be missed: the push and the swap are both
/// read-modify-write operations on the stack's head, so either the swap
/// observes the pushed listener, or the registering thread observes the value
/// when it publishes after its push.
///
/// Sending into a single-slot channel never blocks, so neither
/// [`set`](Self::set) nor [`get`](Self::get) waits for slow receivers.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use spore::BroadcastFuture;
/// use std::sync::Arc;
///
/// let future = Arc::new(BroadcastFuture::new());
///
/// // listeners may be registered before the value is set...
/// let mut rx1 = future.get();
///
/// tokio::spawn({
///     let future = future.clone();
///     async move {
///         assert!(future.set("hello"));
///         // only the first call to `set` wins
///         assert!(!future.set("goodbye"));
///     }
/// });
///
/// assert_eq!(rx1.recv().await, Some("hello"));
///
/// // ...or after.
/// let mut rx2 = future.get();
/// assert_eq!(rx2.recv().await, Some("hello"));
///
/// // each receiver yields the value only once.
/// assert_eq!(rx1.recv().await, None);
/// # }
/// ```
///
/// Dropping a `BroadcastFuture` that was never set closes every outstanding
/// [`Receiver`] without a value.
pub struct BroadcastFuture<T> {
    state: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
    listeners: TransferStack<Listener<T>>,
    registered: CachePadded<AtomicUsize>,
    published: CachePadded<AtomicUsize>,
}

/// A [`Broadcast`] value which is available as soon as it is constructed.
///
/// Calling [`get`](Self::get) returns a [`Receiver`] which already holds a
/// clone of the value. Calling [`set`](Self::set) is a programming error, and
/// panics.
///
/// # Examples
///
/// ```
/// use spore::ImmediateFuture;
///
/// let future = ImmediateFuture::new("hello");
/// for _ in 0..10 {
///     assert_eq!(future.get().try_recv(), Ok("hello"));
/// }
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImmediateFuture<T> {
    value: T,
}

/// A registered listener: the sending half of its channel, linked into a
/// [`BroadcastFuture`]'s stack of listeners awaiting the value.
struct Listener<T> {
    links: stack::Links<Listener<T>>,
    tx: oneshot::Sender<T>,
}

/// An in-progress delivery of the value to the listeners taken from a
/// [`BroadcastFuture`]'s stack.
///
/// On drop, including during unwinding, any listeners still pending are
/// returned to the future's stack and the delivered count is published.
struct Publish<'a, T> {
    future: &'a BroadcastFuture<T>,
    pending: stack::Stack<Listener<T>>,
    delivered: usize,
}

const EMPTY: usize = 0;
const WRITING: usize = 1;
const SET: usize = 2;

// === impl BroadcastFuture ===

impl<T> BroadcastFuture<T> {
    loom_const_fn! {
        /// Returns a new, empty `BroadcastFuture`.
        #[must_use]
        pub fn new() -> Self {
            Self {
                state: AtomicUsize::new(EMPTY),
                value: UnsafeCell::new(MaybeUninit::uninit()),
                listeners: TransferStack::new(),
                registered: CachePadded::new(AtomicUsize::new(0)),
                published: CachePadded::new(AtomicUsize::new(0)),
            }
        }
    }

    /// Returns `true` if the value has been set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.load(Acquire) == SET
    }

    /// Returns a reference to the value, if it has been set.
    ///
    /// This does not register a listener.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        if test_dbg!(self.state.load(Acquire)) != SET {
            return None;
        }

        // Safety: the value was initialized before the state became `SET`,
        // and it is never written again.
        Some(self.value.with(|value| unsafe { (*value).assume_init_ref() }))
    }

    /// Returns the number of listeners registered by [`get`](Self::get).
    #[must_use]
    pub fn listeners(&self) -> usize {
        self.registered.load(Acquire)
    }

    /// Returns the number of listeners that have been sent the value.
    ///
    /// A value read from `notified` never exceeds a value read from
    /// [`listeners`](Self::listeners) *afterwards*. Once the value is set,
    /// the two eventually become equal.
    #[must_use]
    pub fn notified(&self) -> usize {
        self.published.load(Acquire)
    }
}

impl<T: Clone> BroadcastFuture<T> {
    /// Returns a [`Receiver`] that will yield the value once it is set.
    ///
    /// See [`Broadcast::get`].
    pub fn get(&self) -> Receiver<T> {
        self.registered.fetch_add(1, AcqRel);

        if let Some(value) = self.peek() {
            // already set, so there is nothing to wait for.
            let rx = Receiver::ready(value.clone());
            self.published.fetch_add(1, AcqRel);
            trace!(future = ?fmt::ptr(self), "BroadcastFuture::get -> already set");

            // listeners may have been returned to the stack by a publish whose
            // clone panicked.
            self.publish();
            return rx;
        }

        let (tx, rx) = oneshot::channel();
        self.listeners.push(Box::new(Listener {
            links: stack::Links::new(),
            tx,
        }));
        trace!(future = ?fmt::ptr(self), "BroadcastFuture::get -> registered");

        // the value may have been set while the listener was being pushed.
        self.publish();
        rx
    }

    /// Sets the value, notifying every listener.
    ///
    /// See [`Broadcast::set`].
    pub fn set(&self, value: T) -> bool {
        if let Err(_state) = test_dbg!(self
            .state
            .compare_exchange(EMPTY, WRITING, AcqRel, Acquire))
        {
            trace!(future = ?fmt::ptr(self), state = _state, "BroadcastFuture::set -> already set");
            return false;
        }

        // Safety: winning the `EMPTY -> WRITING` transition grants exclusive
        // write access, and nothing reads the value until the state is `SET`.
        self.value.with_mut(|slot| unsafe {
            (*slot).write(value);
        });
        self.state.store(SET, Release);
        trace!(future = ?fmt::ptr(self), "BroadcastFuture::set -> set");

        self.publish();
        true
    }

    /// Sends the value to every listener that has not yet received it.
    ///
    /// This does nothing if the value has not been set. Each listener is taken
    /// out of the stack by exactly one call to `publish`, so no listener is
    /// sent the value twice.
    ///
    /// If cloning the value panics, the listeners that were not sent a clone
    /// are pushed back onto the stack, and are sent the value by the next
    /// call to `publish`.
    fn publish(&self) {
        let Some(value) = self.peek() else {
            return;
        };

        let mut publish = Publish {
            future: self,
            pending: self.listeners.take_all(),
            delivered: 0,
        };
        while !publish.pending.is_empty() {
            // clone before popping, so a panicking clone leaves the listener
            // in `pending`.
            let value = value.clone();
            if let Some(listener) = publish.pending.pop() {
                let Listener { tx, .. } = *listener;
                tx.send(value);
                publish.delivered += 1;
            }
        }
    }
}

impl<T: Clone> Broadcast<T> for BroadcastFuture<T> {
    #[inline]
    fn get(&self) -> Receiver<T> {
        BroadcastFuture::get(self)
    }

    #[inline]
    fn set(&self, value: T) -> bool {
        BroadcastFuture::set(self, value)
    }
}

impl<T> Default for BroadcastFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BroadcastFuture<T> {
    fn drop(&mut self) {
        if self.state.load(Acquire) == SET {
            // Safety: the value was initialized, and we have exclusive access.
            self.value
                .with_mut(|value| unsafe { (*value).assume_init_drop() });
        }
        // any listeners still in the stack are dropped along with it, closing
        // their channels.
    }
}

impl<T: fmt::Debug> fmt::Debug for BroadcastFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `notified` is loaded first, so that it never exceeds `listeners`.
        let notified = self.notified();
        f.debug_struct("BroadcastFuture")
            .field("value", &self.peek())
            .field("listeners", &self.listeners())
            .field("notified", &notified)
            .finish()
    }
}

// Safety: the value is written once, by the caller that wins the race to set
// it, before any reference to it is handed out; afterwards it is only read.
// Listeners are only accessed through the atomic stack.
unsafe impl<T: Send> Send for BroadcastFuture<T> {}
unsafe impl<T: Send + Sync> Sync for BroadcastFuture<T> {}

// === impl Publish ===

impl<T> Drop for Publish<'_, T> {
    fn drop(&mut self) {
        let mut returned = 0usize;
        while let Some(listener) = self.pending.pop() {
            self.future.listeners.push(listener);
            returned += 1;
        }

        if self.delivered > 0 {
            let _published = self
                .future
                .published
                .fetch_add(self.delivered, AcqRel)
                + self.delivered;
            trace!(
                future = ?fmt::ptr(self.future),
                delivered = self.delivered,
                published = _published,
                "BroadcastFuture::publish"
            );
        }

        if returned > 0 {
            test_debug!(returned, "BroadcastFuture::publish -> interrupted, listeners returned");
        }
    }
}

// === impl ImmediateFuture ===

impl<T> ImmediateFuture<T> {
    /// Returns a new `ImmediateFuture` holding `value`.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Returns a reference to the value.
    #[must_use]
    pub fn peek(&self) -> &T {
        &self.value
    }

    /// Consumes the future, returning the value.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Clone> ImmediateFuture<T> {
    /// Returns a [`Receiver`] which already holds a clone of the value.
    pub fn get(&self) -> Receiver<T> {
        Receiver::ready(self.value.clone())
    }

    /// Always panics: an immediate future's value cannot be replaced.
    ///
    /// # Panics
    ///
    /// Always, with the message [`SET_ON_IMMEDIATE_FUTURE`].
    #[track_caller]
    pub fn set(&self, _value: T) -> bool {
        panic!("{SET_ON_IMMEDIATE_FUTURE}")
    }
}

impl<T: Clone> Broadcast<T> for ImmediateFuture<T> {
    #[inline]
    fn get(&self) -> Receiver<T> {
        ImmediateFuture::get(self)
    }

    #[inline]
    #[track_caller]
    fn set(&self, value: T) -> bool {
        ImmediateFuture::set(self, value)
    }
}

impl<T> From<T> for ImmediateFuture<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

// === impl Listener ===

unsafe impl<T> Linked<stack::Links<Self>> for Listener<T> {
    type Handle = Box<Self>;

    fn into_ptr(handle: Box<Self>) -> NonNull<Self> {
        NonNull::from(Box::leak(handle))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Box<Self> {
        // Safety: every pointer in the stack came from `into_ptr`.
        Box::from_raw(ptr.as_ptr())
    }

    unsafe fn links(target: NonNull<Self>) -> NonNull<stack::Links<Self>> {
        // Safety: using `ptr::addr_of_mut!` avoids creating a temporary
        // reference to the whole listener.
        let links = ptr::addr_of_mut!((*target.as_ptr()).links);
        NonNull::new_unchecked(links)
    }
}
