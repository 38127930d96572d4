//! A single-slot channel that carries at most one value.
//!
//! Every listener registered with a [`BroadcastFuture`] is handed the
//! [`Receiver`] half of one of these channels, while the future keeps the
//! [`Sender`] half. The channel is closed as soon as its value is sent (or its
//! [`Sender`] is dropped), so a [`Receiver`] yields at most one value and then
//! reports that it is closed.
//!
//! Sending never blocks: the value is stored in the slot and the receiving
//! task, if any, is woken.
//!
//! [`BroadcastFuture`]: crate::BroadcastFuture
use crate::{
    loom::{
        cell::UnsafeCell,
        sync::{
            atomic::{AtomicUsize, Ordering::*},
            Arc,
        },
    },
    util::fmt,
};
use core::{
    future::Future,
    mem::MaybeUninit,
    pin::Pin,
    task::{Context, Poll},
};
use maitake_sync::{wait_cell::PollWaitError, WaitCell};

/// Returns a new single-slot channel.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use spore::oneshot;
///
/// let (tx, mut rx) = oneshot::channel();
/// tx.send(1);
///
/// assert_eq!(rx.recv().await, Some(1));
/// // the channel closes once its value has been sent.
/// assert_eq!(rx.recv().await, None);
/// # }
/// ```
#[must_use]
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let slot = Arc::new(Slot::new());
    let tx = Sender {
        slot: Some(slot.clone()),
    };
    (tx, Receiver { slot })
}

/// The sending half of a [single-slot channel](channel).
///
/// Dropping a `Sender` without calling [`send`](Self::send) closes the
/// channel; the [`Receiver`] will then never receive a value.
pub struct Sender<T> {
    slot: Option<Arc<Slot<T>>>,
}

/// The receiving half of a [single-slot channel](channel).
pub struct Receiver<T> {
    slot: Arc<Slot<T>>,
}

/// Future returned by [`Receiver::recv`].
///
/// Dropping this future before it completes does not lose the value: it stays
/// in the channel until the next call to [`Receiver::recv`] or
/// [`Receiver::try_recv`].
#[derive(Debug)]
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Recv<'rx, T> {
    rx: &'rx mut Receiver<T>,
}

/// Errors returned by [`Receiver::try_recv`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TryRecvError {
    /// No value has been sent yet, but the channel is still open.
    Empty,
    /// The channel is closed, and there is no value left to receive.
    Closed,
}

struct Slot<T> {
    state: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
    rx_wait: WaitCell,
}

/// A value is stored in the slot and has not been received.
const VALUE: usize = 0b01;
/// The sender has finished: no value will be stored after this bit is set.
const CLOSED: usize = 0b10;

// === impl Sender ===

impl<T> Sender<T> {
    /// Sends `value` to the [`Receiver`], closing the channel.
    ///
    /// This never blocks. If the [`Receiver`] has been dropped, the value is
    /// dropped with the channel.
    pub fn send(mut self, value: T) {
        if let Some(slot) = self.slot.take() {
            slot.fill(value);
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            trace!(slot = ?fmt::ptr(&*slot), "Sender::drop -> closing without a value");
            slot.close();
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Sender");
        match self.slot {
            Some(ref slot) => s.field("slot", slot),
            None => s.field("slot", &fmt::display("<sent>")),
        };
        s.finish()
    }
}

// === impl Receiver ===

impl<T> Receiver<T> {
    /// Returns a `Receiver` which already holds `value` and is closed.
    ///
    /// The first receive operation yields `value`; every later one reports
    /// that the channel is closed.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self {
            slot: Arc::new(Slot::filled(value)),
        }
    }

    /// Waits for the value to be sent.
    ///
    /// # Returns
    ///
    /// - [`Some`]`(T)` the first time the value is received.
    /// - [`None`] if the value has already been received, or if the
    ///   [`Sender`] was dropped without sending a value.
    ///
    /// If the value is never sent and the [`Sender`] is never dropped, the
    /// returned future never completes. Callers that need a deadline should
    /// race it against a timer, for instance with `select!`.
    pub fn recv(&mut self) -> Recv<'_, T> {
        Recv { rx: self }
    }

    /// Attempts to receive the value without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(T)` if the value was sent and has not yet been received.
    /// - `Err(`[`TryRecvError::Empty`]`)` if no value has been sent yet.
    /// - `Err(`[`TryRecvError::Closed`]`)` if the value was already received,
    ///   or the [`Sender`] was dropped without sending a value.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let state = test_dbg!(self.slot.state.load(Acquire));
        if state & VALUE == VALUE {
            // Safety: the `VALUE` bit is only set after the value is written,
            // and only the receiver clears it, so the value is initialized and
            // nothing else is reading it.
            let value = self
                .slot
                .value
                .with(|value| unsafe { (*value).assume_init_read() });
            self.slot.state.fetch_and(!VALUE, AcqRel);
            trace!(slot = ?fmt::ptr(&*self.slot), "Receiver::try_recv -> received");
            return Ok(value);
        }

        if state & CLOSED == CLOSED {
            return Err(TryRecvError::Closed);
        }

        Err(TryRecvError::Empty)
    }

    /// Returns `true` if the sending half has finished.
    ///
    /// Once this returns `true`, no new value will arrive. A value that was
    /// sent but not yet received can still be received.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slot.state.load(Acquire) & CLOSED == CLOSED
    }

    /// Blocks the current thread until the value is sent.
    ///
    /// This behaves like [`recv`](Self::recv), but parks the calling thread
    /// instead of yielding to an executor. See [`blocking`](crate::blocking)
    /// for details.
    #[cfg(feature = "std")]
    #[cfg_attr(docsrs, doc(cfg(feature = "std")))]
    pub fn recv_blocking(&mut self) -> Option<T> {
        crate::loom::blocking::block_on(self.recv())
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("slot", &self.slot)
            .finish()
    }
}

// === impl Recv ===

impl<T> Future for Recv<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = &mut *self.get_mut().rx;
        loop {
            match rx.try_recv() {
                Ok(value) => return Poll::Ready(Some(value)),
                Err(TryRecvError::Closed) => return Poll::Ready(None),
                Err(TryRecvError::Empty) => {}
            }

            match test_dbg!(rx.slot.rx_wait.poll_wait(cx)) {
                Poll::Pending => return Poll::Pending,
                // either we were woken, or the sender closed the cell after
                // finishing with the slot. in both cases, the slot's state
                // must be checked again.
                Poll::Ready(Ok(())) | Poll::Ready(Err(PollWaitError::Closed)) => {}
                // only the receiver registers wakers, and it is borrowed
                // mutably here, so this should not happen. yield rather than
                // spin if it does.
                Poll::Ready(Err(PollWaitError::Busy)) => {
                    test_debug!("Recv::poll -> wait cell busy, yielding");
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
            }
        }
    }
}

// === impl TryRecvError ===

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.pad("channel is empty"),
            Self::Closed => f.pad("channel closed"),
        }
    }
}

feature! {
    #![feature = "core-error"]
    impl core::error::Error for TryRecvError {}
}

// === impl Slot ===

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
            value: UnsafeCell::new(MaybeUninit::uninit()),
            rx_wait: WaitCell::new(),
        }
    }

    fn filled(value: T) -> Self {
        Self {
            state: AtomicUsize::new(VALUE | CLOSED),
            value: UnsafeCell::new(MaybeUninit::new(value)),
            rx_wait: WaitCell::new(),
        }
    }

    fn fill(&self, value: T) {
        // Safety: only the sender writes the value, exactly once, and the
        // receiver does not read it until the `VALUE` bit is set below.
        self.value.with_mut(|slot| unsafe {
            (*slot).write(value);
        });
        let prev = test_dbg!(self.state.fetch_or(VALUE | CLOSED, AcqRel));
        debug_assert_eq!(prev, 0, "a slot may only be filled once");
        trace!(slot = ?fmt::ptr(self), "Sender::send -> sent");
        self.rx_wait.close();
    }

    fn close(&self) {
        self.state.fetch_or(CLOSED, AcqRel);
        self.rx_wait.close();
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if self.state.load(Acquire) & VALUE == VALUE {
            // Safety: the value was sent but never received, and this is the
            // last reference to the slot.
            self.value
                .with_mut(|value| unsafe { (*value).assume_init_drop() });
        }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load(Acquire);
        f.debug_struct("Slot")
            .field("has_value", &(state & VALUE == VALUE))
            .field("closed", &(state & CLOSED == CLOSED))
            .field("rx_wait", &self.rx_wait)
            .finish()
    }
}

// Safety: the value is written by exactly one party (the `Sender`) and read by
// exactly one party (the `Receiver`), and the handoff is synchronized by the
// `state` word.
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}
