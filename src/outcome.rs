//! A value paired with an optional error.

/// The outcome of an operation: a value, and an error that may or may not be
/// present.
///
/// Unlike [`Result`], an `Outcome` does not make the value and the error
/// mutually exclusive. It is constructed from whatever the producer had on
/// hand, and [`unwrap`](Self::unwrap) hands both back unchanged. By
/// convention, an `Outcome` built with [`Outcome::error`] carries
/// [`T::default()`](Default::default) as its value, but nothing prevents a
/// producer from supplying a meaningful value alongside an error. Which of the
/// two takes precedence is up to the consumer.
///
/// `Outcome`s are commonly broadcast through a
/// [`BroadcastFuture`](crate::BroadcastFuture), so that every listener learns
/// both the value and whether the producer failed.
///
/// # Examples
///
/// ```
/// use spore::Outcome;
///
/// let ok: Outcome<u32, &str> = Outcome::value(7);
/// assert_eq!(ok.unwrap(), (7, None));
///
/// let failed: Outcome<u32, &str> = Outcome::error("disk on fire");
/// assert!(failed.is_error());
/// assert_eq!(failed.unwrap(), (0, Some("disk on fire")));
///
/// // both may be present at once.
/// let partial = Outcome::new(3, Some("truncated"));
/// assert_eq!(partial.value_ref(), &3);
/// assert_eq!(partial.error_ref(), Some(&"truncated"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Outcome<T, E> {
    value: T,
    error: Option<E>,
}

impl<T, E> Outcome<T, E> {
    /// Returns an `Outcome` holding both `value` and `error`, exactly as
    /// given.
    #[must_use]
    pub const fn new(value: T, error: Option<E>) -> Self {
        Self { value, error }
    }

    /// Returns a successful `Outcome`, holding `value` and no error.
    #[must_use]
    pub const fn value(value: T) -> Self {
        Self { value, error: None }
    }

    /// Returns a failed `Outcome`, holding `error` and the default value.
    #[must_use]
    pub fn error(error: E) -> Self
    where
        T: Default,
    {
        Self {
            value: T::default(),
            error: Some(error),
        }
    }

    /// Consumes the `Outcome`, returning the value and the error.
    #[must_use]
    pub fn unwrap(self) -> (T, Option<E>) {
        (self.value, self.error)
    }

    /// Returns a reference to the value.
    #[must_use]
    pub fn value_ref(&self) -> &T {
        &self.value
    }

    /// Returns a reference to the error, if there is one.
    #[must_use]
    pub fn error_ref(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// Returns `true` if an error is present, regardless of the value.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<T: Default, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::value(value),
            Err(error) => Self::error(error),
        }
    }
}
