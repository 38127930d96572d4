//! Internal utilities: diagnostics macros, formatting helpers, and test
//! support.

#[cfg(any(test, feature = "tracing", loom))]
macro_rules! trace {
    ($($t:tt)*) => { tracing::trace!($($t)*) }
}

#[cfg(not(any(test, feature = "tracing", loom)))]
macro_rules! trace {
    ($($t:tt)*) => {};
}

#[cfg(all(not(test), not(all(spore_ultraverbose, feature = "tracing"))))]
macro_rules! test_dbg {
    ($e:expr) => {
        $e
    };
}

#[cfg(any(test, all(spore_ultraverbose, feature = "tracing")))]
macro_rules! test_dbg {
    ($e:expr) => {
        match $e {
            e => {
                tracing::debug!(
                    location = %core::panic::Location::caller(),
                    "{} = {:?}",
                    stringify!($e),
                    &e
                );
                e
            }
        }
    };
}

#[cfg(all(not(test), not(all(spore_ultraverbose, feature = "tracing"))))]
macro_rules! test_debug {
    ($($t:tt)*) => {};
}

#[cfg(any(test, all(spore_ultraverbose, feature = "tracing")))]
macro_rules! test_debug {
    ($($t:tt)*) => { tracing::debug!($($t)*) }
}

#[cfg(all(not(test), not(all(spore_ultraverbose, feature = "tracing"))))]
macro_rules! test_trace {
    ($($t:tt)*) => {};
}

#[cfg(any(test, all(spore_ultraverbose, feature = "tracing")))]
macro_rules! test_trace {
    ($($t:tt)*) => { tracing::trace!($($t)*) }
}

macro_rules! feature {
    (
        #![$meta:meta]
        $($item:item)*
    ) => {
        $(
            #[cfg($meta)]
            #[cfg_attr(docsrs, doc(cfg($meta)))]
            $item
        )*
    }
}

macro_rules! loom_const_fn {
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident($($arg:ident: $T:ty),*) -> $Ret:ty $body:block
    ) => {
        $(#[$meta])*
        #[cfg(not(loom))]
        $vis const fn $name($($arg: $T),*) -> $Ret $body

        $(#[$meta])*
        #[cfg(loom)]
        $vis fn $name($($arg: $T),*) -> $Ret $body
    }
}

pub(crate) mod fmt {
    pub(crate) use core::fmt::*;

    /// Formats a value using the provided function, so that pointers and
    /// other values without a useful `Debug` impl can be recorded as
    /// `tracing` fields.
    pub(crate) struct FormatWith<T, F = fn(&T, &mut Formatter<'_>) -> Result>
    where
        F: Fn(&T, &mut Formatter<'_>) -> Result,
    {
        value: T,
        fmt: F,
    }

    #[cfg(any(test, feature = "tracing", loom))]
    #[inline]
    #[must_use]
    pub(crate) fn ptr<T: Pointer>(value: T) -> FormatWith<T> {
        FormatWith {
            value,
            fmt: Pointer::fmt,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn display<T: Display>(value: T) -> FormatWith<T> {
        FormatWith {
            value,
            fmt: Display::fmt,
        }
    }

    impl<T, F> Debug for FormatWith<T, F>
    where
        F: Fn(&T, &mut Formatter<'_>) -> Result,
    {
        #[inline]
        fn fmt(&self, f: &mut Formatter<'_>) -> Result {
            (self.fmt)(&self.value, f)
        }
    }
}
