//! Blocking adapters for threads that are not running on an async executor.
//!
//! Every waiting operation in this crate is asynchronous at its core. The
//! `*_blocking` variants (such as [`Receiver::recv_blocking`] and
//! [`CountingSemaphore::acquire_blocking`]) drive those futures to completion
//! on the calling thread using [`block_on`], which parks the thread while the
//! operation cannot make progress, rather than spinning.
//!
//! [`Receiver::recv_blocking`]: crate::oneshot::Receiver::recv_blocking
//! [`CountingSemaphore::acquire_blocking`]: crate::CountingSemaphore::acquire_blocking
use core::{
    future::Future,
    pin::pin,
    task::{Context, Poll, Waker},
};
use std::{
    sync::Arc,
    task::Wake,
    thread::{self, Thread},
};

/// Runs a future to completion on the current thread, parking the thread
/// whenever the future is not ready.
///
/// The thread is unparked when the future's [`Waker`] is woken. Spurious
/// unparks are harmless: the future is simply polled again.
///
/// # Examples
///
/// ```
/// use spore::{blocking, BroadcastFuture};
/// use std::{sync::Arc, thread};
///
/// let future = Arc::new(BroadcastFuture::new());
/// let mut rx = future.get();
///
/// thread::spawn({
///     let future = future.clone();
///     move || future.set("hello")
/// });
///
/// assert_eq!(blocking::block_on(rx.recv()), Some("hello"));
/// ```
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = Waker::from(Arc::new(Unparker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => {
                test_trace!("block_on -> parking");
                thread::park();
            }
        }
    }
}

struct Unparker(Thread);

impl Wake for Unparker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}
