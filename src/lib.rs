#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg, doc_cfg_hide))]
#![cfg_attr(docsrs, doc(cfg_hide(docsrs, loom)))]
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]

extern crate alloc;

pub(crate) mod loom;

#[macro_use]
pub(crate) mod util;

pub mod future;
pub mod oneshot;
pub mod outcome;
pub mod semaphore;

feature! {
    #![feature = "std"]
    pub mod blocking;
}

#[doc(inline)]
pub use self::future::{Broadcast, BroadcastFuture, ImmediateFuture};
#[doc(inline)]
pub use self::outcome::Outcome;
#[doc(inline)]
pub use self::semaphore::CountingSemaphore;
