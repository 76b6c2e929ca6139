//! Password newtype.

use std::fmt;

/// A user-supplied archive password.
///
/// `Debug` output never contains the secret. An empty password is treated as
/// "no password" by the decoder.
///
/// # Examples
///
/// ```
/// use arcsift_core::types::Password;
///
/// let password = Password::from("hunter2");
/// assert_eq!(format!("{password:?}"), "Password(***)");
/// assert_eq!(password.as_bytes(), b"hunter2");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Wraps a password string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Password as UTF-8 text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Password bytes fed to the key derivation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns `true` for the empty password.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Returns the password only if it can actually key a cipher.
pub(crate) fn usable(password: Option<&Password>) -> Option<&Password> {
    password.filter(|p| !p.is_empty())
}
