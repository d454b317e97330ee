//! Caller-supplied credentials held in zeroizing storage.

use zeroize::{Zeroize, Zeroizing};

/// Username and password lifted out of a connection string.
///
/// Both values are kept exactly as written in the string (still
/// percent-encoded) so the string can be rebuilt without altering it.
/// Memory is zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username.into()),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the username as written in the connection string
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Checks if password is present without exposing it
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// The `user:password` userinfo for rebuilding a URI.
    pub(crate) fn userinfo(&self) -> Zeroizing<String> {
        Zeroizing::new(match self.password.as_deref() {
            Some(password) => format!("{}:{password}", self.username.as_str()),
            None => self.username.to_string(),
        })
    }

    /// The userinfo with the password replaced by `****`.
    pub fn redacted_userinfo(&self) -> String {
        if self.has_password() {
            format!("{}:****", self.username.as_str())
        } else {
            self.username.to_string()
        }
    }

    /// Scrubs the password from free text, in both its encoded and decoded
    /// forms.
    ///
    /// Driver messages may echo either form, so both are replaced.
    pub fn mask(&self, text: &str) -> String {
        let Some(password) = self.password.as_deref() else {
            return text.to_string();
        };
        let masked = crate::error::mask_secret(text, password);
        let decoded = percent_decode(password);
        if decoded.as_str() == password {
            masked
        } else {
            crate::error::mask_secret(&masked, &decoded)
        }
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.username.as_str() == other.username.as_str()
            && self.password.as_deref() == other.password.as_deref()
    }
}

impl Eq for Credentials {}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field(
                "password",
                &if self.has_password() {
                    "****"
                } else {
                    "<none>"
                },
            )
            .finish()
    }
}

/// Percent-decodes a userinfo component.
///
/// `+` is literal in userinfo, so it is protected from form decoding.
fn percent_decode(value: &str) -> Zeroizing<String> {
    let protected = value.replace('+', "%2B");
    let decoded: String = url::form_urlencoded::parse(format!("v={protected}").as_bytes())
        .map(|(_, v)| v.into_owned())
        .collect();
    Zeroizing::new(decoded)
}
