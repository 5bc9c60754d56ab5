use std::fmt;

/// Wrapper for credential material that must never reach a log line.
///
/// Used for the token signing key, raw bearer tokens, and stored password
/// hashes. `Debug` and `Display` always print `[REDACTED]`; the only way to
/// the value is [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use trip_access::Secret;
///
/// let key = Secret::new("hs256-signing-key".to_string());
/// assert_eq!(format!("{key:?}"), "[REDACTED]");
/// assert_eq!(key.expose_secret(), "hs256-signing-key");
/// ```
// No Clone/Copy/Default: duplicating a secret must be an explicit expose + new.
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Returns the wrapped value. Do not log the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl Secret<String> {
    /// True when the wrapped string is empty after trimming.
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl<T> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
