//! Connection-string checks and normalization.
//!
//! [`preflight`] rejects obviously malformed strings before any network
//! activity. [`normalize`] turns an accepted string into a
//! [`ConnectionSpec`] with the database name resolved and the default query
//! parameters filled in.

use crate::error::{AtlasDumpError, PreflightError};
use crate::security::Credentials;
use url::form_urlencoded;
use zeroize::Zeroizing;

/// Database used when the connection string names none.
pub const DEFAULT_DATABASE: &str = "admin";

/// Query parameters added when absent, in this order.
const DEFAULT_OPTIONS: [(&str, &str); 3] = [
    ("authSource", "admin"),
    ("retryWrites", "true"),
    ("w", "majority"),
];

/// URI scheme of a MongoDB connection string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `mongodb://` with an explicit host list
    Standard,
    /// `mongodb+srv://` resolved through DNS seed lists
    Srv,
}

impl Scheme {
    /// The scheme prefix including `://`.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Standard => "mongodb://",
            Self::Srv => "mongodb+srv://",
        }
    }

    fn strip(raw: &str) -> Option<(Self, &str)> {
        if let Some(rest) = raw.strip_prefix(Self::Srv.prefix()) {
            Some((Self::Srv, rest))
        } else {
            raw.strip_prefix(Self::Standard.prefix())
                .map(|rest| (Self::Standard, rest))
        }
    }
}

/// Authentication mechanisms tried when the first connection attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    ScramSha256,
    ScramSha1,
}

impl AuthMechanism {
    /// Fallback order used by the export path.
    pub const RETRY_ORDER: [Self; 2] = [Self::ScramSha256, Self::ScramSha1];

    /// Value of the `authMechanism` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha1 => "SCRAM-SHA-1",
        }
    }
}

/// A normalized connection string.
///
/// Userinfo and hosts are stored as written by the caller (percent-encoding
/// is preserved). Query parameters are stored decoded and re-encoded by
/// [`ConnectionSpec::to_uri`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    scheme: Scheme,
    credentials: Option<Credentials>,
    hosts: String,
    database: String,
    options: Vec<(String, String)>,
}

/// Normalizes a raw connection string.
///
/// Surrounding whitespace is removed, the database name is taken from the
/// path (defaulting to `admin`), and `authSource=admin`, `retryWrites=true`
/// and `w=majority` are added when the caller did not set them. Existing
/// parameters are never overwritten.
///
/// # Errors
/// Returns [`PreflightError::InvalidFormat`] when the string does not start
/// with `mongodb://` or `mongodb+srv://`.
///
/// # Example
/// ```rust
/// use atlasdump_core::connection_string::normalize;
///
/// let spec = normalize("  mongodb+srv://reader:pw@cluster0.example.net  ")?;
/// assert_eq!(spec.database(), "admin");
/// assert_eq!(spec.option("authSource"), Some("admin"));
/// # Ok::<(), atlasdump_core::AtlasDumpError>(())
/// ```
pub fn normalize(raw: &str) -> Result<ConnectionSpec, AtlasDumpError> {
    let trimmed = raw.trim();
    let (scheme, rest) = Scheme::strip(trimmed).ok_or(PreflightError::InvalidFormat)?;

    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));

    let (credentials, location) = match base.rfind('@') {
        Some(at) => {
            let userinfo = &base[..at];
            let credentials = match userinfo.split_once(':') {
                Some((username, password)) => {
                    Credentials::new(username, Some(password.to_string()))
                }
                None => Credentials::new(userinfo, None),
            };
            (Some(credentials), &base[at.saturating_add(1)..])
        }
        None => (None, base),
    };

    let (hosts, database) = match location.split_once('/') {
        Some((hosts, path)) => {
            let name = path.rsplit('/').next().unwrap_or_default();
            (hosts, name)
        }
        None => (location, ""),
    };
    let database = if database.is_empty() {
        DEFAULT_DATABASE
    } else {
        database
    };

    let mut options: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    for (key, value) in DEFAULT_OPTIONS {
        if !options.iter().any(|(k, _)| k.eq_ignore_ascii_case(key)) {
            options.push((key.to_string(), value.to_string()));
        }
    }

    Ok(ConnectionSpec {
        scheme,
        credentials,
        hosts: hosts.to_string(),
        database: database.to_string(),
        options,
    })
}

/// Checks the shape of a raw connection string without touching the network.
///
/// # Errors
/// In order of evaluation:
/// 1. missing or blank → [`PreflightError::MissingUrl`]
/// 2. wrong scheme → [`PreflightError::InvalidFormat`]
/// 3. no `@` → [`PreflightError::MissingCredentials`]
/// 4. credentials without `:`, empty username or empty password →
///    [`PreflightError::MalformedCredentials`]
/// 5. empty host → [`PreflightError::InvalidHost`] ("Missing host information")
/// 6. host without a `.` → [`PreflightError::InvalidHost`] ("Invalid hostname format")
pub fn preflight(raw: Option<&str>) -> Result<(), PreflightError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(PreflightError::MissingUrl);
    }

    let (_, rest) = Scheme::strip(raw).ok_or(PreflightError::InvalidFormat)?;
    let (base, _) = rest.split_once('?').unwrap_or((rest, ""));

    let at = base.rfind('@').ok_or(PreflightError::MissingCredentials)?;
    let (userinfo, host_part) = (&base[..at], &base[at.saturating_add(1)..]);

    let (username, password) =
        userinfo
            .split_once(':')
            .ok_or(PreflightError::MalformedCredentials {
                reason: "Invalid credential format in connection string",
                part: "credentials",
            })?;
    if username.is_empty() {
        return Err(PreflightError::MalformedCredentials {
            reason: "Username is missing or empty",
            part: "username",
        });
    }
    if password.is_empty() {
        return Err(PreflightError::MalformedCredentials {
            reason: "Password is missing or empty",
            part: "password",
        });
    }

    let host = host_part.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(PreflightError::InvalidHost {
            reason: "Missing host information",
        });
    }
    if !host.contains('.') {
        return Err(PreflightError::InvalidHost {
            reason: "Invalid hostname format",
        });
    }

    Ok(())
}

impl ConnectionSpec {
    /// URI scheme.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Host list exactly as written (`host[:port][,host[:port]...]`).
    pub fn hosts(&self) -> &str {
        &self.hosts
    }

    /// The first host without its port, for reporting.
    pub fn primary_host(&self) -> &str {
        let first = self.hosts.split(',').next().unwrap_or_default();
        first.rsplit_once(':').map_or(first, |(host, _)| host)
    }

    /// The first host's port, when one is written.
    pub fn primary_port(&self) -> Option<u16> {
        let first = self.hosts.split(',').next().unwrap_or_default();
        first
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }

    /// Requested database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Username, if the string carried credentials.
    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(Credentials::username)
    }

    /// Credentials, if the string carried them.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Decoded query parameters in order.
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Value of a query parameter, matching the key case-insensitively.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The effective `authSource`.
    pub fn auth_source(&self) -> &str {
        self.option("authSource").unwrap_or(DEFAULT_DATABASE)
    }

    /// Renders the full connection string, password included.
    ///
    /// The result is zeroed on drop. Use [`ConnectionSpec::redacted`] for
    /// anything that may be logged or returned.
    pub fn to_uri(&self) -> Zeroizing<String> {
        let userinfo = self.credentials.as_ref().map(Credentials::userinfo);
        Zeroizing::new(self.render(userinfo.as_ref().map(|u| u.as_str())))
    }

    /// Renders the connection string with the password replaced by `****`.
    pub fn redacted(&self) -> String {
        let userinfo = self.credentials.as_ref().map(Credentials::redacted_userinfo);
        self.render(userinfo.as_deref())
    }

    fn render(&self, userinfo: Option<&str>) -> String {
        let mut uri = String::from(self.scheme.prefix());
        if let Some(userinfo) = userinfo {
            uri.push_str(userinfo);
            uri.push('@');
        }
        uri.push_str(&self.hosts);
        uri.push('/');
        uri.push_str(&self.database);
        if !self.options.is_empty() {
            uri.push('?');
            uri.push_str(
                &form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&self.options)
                    .finish(),
            );
        }
        uri
    }

    /// Scrubs this string's password out of free text.
    pub fn mask(&self, text: &str) -> String {
        match &self.credentials {
            Some(credentials) => credentials.mask(text),
            None => text.to_string(),
        }
    }

    /// A copy with `authMechanism` set to `mechanism`, replacing any
    /// existing value.
    pub fn with_auth_mechanism(&self, mechanism: AuthMechanism) -> Self {
        let mut spec = self.clone();
        spec.options
            .retain(|(k, _)| !k.eq_ignore_ascii_case("authMechanism"));
        spec.options
            .push(("authMechanism".to_string(), mechanism.as_str().to_string()));
        spec
    }

    /// A copy addressing another database on the same cluster.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        let mut spec = self.clone();
        spec.database = database.into();
        spec
    }
}

impl std::fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl std::fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("scheme", &self.scheme)
            .field("credentials", &self.credentials)
            .field("hosts", &self.hosts)
            .field("database", &self.database)
            .field("options", &self.options)
            .finish()
    }
}
