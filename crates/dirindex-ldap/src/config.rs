//! Configuration for LDAP directory connections

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use dirindex_core::error::{CrawlError, CrawlResult};

/// Default read timeout applied when none is configured.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 90;

/// Upper bound on the read timeout, in seconds. Values above this are
/// clamped so the millisecond conversion cannot overflow an i32 socket
/// option.
const MAX_READ_TIMEOUT_SECS: u64 = (i32::MAX / 1000) as u64;

/// How to reach the directory server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectMethod {
    /// Plain LDAP on port 389.
    #[default]
    Standard,
    /// LDAP over TLS on port 636.
    Ssl,
}

impl ConnectMethod {
    /// URL scheme for this connection method.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            ConnectMethod::Standard => "ldap",
            ConnectMethod::Ssl => "ldaps",
        }
    }

    /// Well-known port for this connection method.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        match self {
            ConnectMethod::Standard => 389,
            ConnectMethod::Ssl => 636,
        }
    }
}

/// Configuration for one LDAP directory connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapServerConfig {
    /// Dashboard nickname for this connection. Falls back to the host name
    /// when empty.
    #[serde(default)]
    pub name: String,

    /// Directory server host name.
    pub host: String,

    /// Connection method, plain or TLS.
    #[serde(default)]
    pub connect_method: ConnectMethod,

    /// Server port. Defaults to the connection method's well-known port.
    #[serde(default)]
    pub port: Option<u16>,

    /// DN of the service account used to bind.
    pub bind_dn: String,

    /// Bind password, stored in encoded form and decoded at connect time.
    pub bind_password: String,

    /// Base DN under which entities are searched.
    pub base_dn: String,

    /// LDAP filter selecting the entities to index.
    pub user_filter: String,

    /// Comma-separated list of attributes to fetch for each entity.
    pub attributes: String,

    /// Template rendering an entity into document body text. `{attr}`
    /// placeholders are replaced by attribute values. When absent, a
    /// template listing every fetched attribute is generated.
    #[serde(default)]
    pub display_template: Option<String>,

    /// Read timeout in seconds, as written in the deployment config.
    /// Empty and "0" both mean the 90 second default.
    #[serde(default)]
    pub read_timeout_secs: String,
}

impl LdapServerConfig {
    /// Validate required fields and the display template.
    pub fn validate(&self) -> CrawlResult<()> {
        for (field, value) in [
            ("host", &self.host),
            ("bind_dn", &self.bind_dn),
            ("bind_password", &self.bind_password),
            ("user_filter", &self.user_filter),
            ("attributes", &self.attributes),
        ] {
            if value.trim().is_empty() {
                return Err(CrawlError::invalid_configuration(format!(
                    "{field} is required"
                )));
            }
        }
        validate_display_template(&self.effective_display_template())?;
        self.read_timeout()?;
        Ok(())
    }

    /// Dashboard label, the nickname when set or else the host name.
    #[must_use]
    pub fn nickname(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.host
        } else {
            &self.name
        }
    }

    /// The port to connect to.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.connect_method.default_port())
    }

    /// Connection URL for this server.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.connect_method.scheme(),
            self.host,
            self.effective_port()
        )
    }

    /// Attribute names to fetch, split from the configured list.
    #[must_use]
    pub fn attribute_list(&self) -> Vec<String> {
        self.attributes
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// The display template in effect, configured or generated.
    #[must_use]
    pub fn effective_display_template(&self) -> String {
        match &self.display_template {
            Some(t) if !t.trim().is_empty() => t.clone(),
            _ => default_display_template(&self.attributes),
        }
    }

    /// Resolve the configured read timeout.
    ///
    /// An empty value or "0" selects the 90 second default. Values too
    /// large for a millisecond socket option are clamped with a warning.
    /// Anything non-numeric is a configuration error.
    pub fn read_timeout(&self) -> CrawlResult<Duration> {
        let raw = self.read_timeout_secs.trim();
        if raw.is_empty() {
            return Ok(Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS));
        }
        let mut secs: u64 = raw.parse().map_err(|_| {
            CrawlError::invalid_configuration(format!(
                "read_timeout_secs is not a valid number: {raw}"
            ))
        })?;
        if secs == 0 {
            return Ok(Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS));
        }
        if secs > MAX_READ_TIMEOUT_SECS {
            warn!(
                configured = secs,
                clamped = MAX_READ_TIMEOUT_SECS,
                "read timeout too large, clamping"
            );
            secs = MAX_READ_TIMEOUT_SECS;
        }
        Ok(Duration::from_secs(secs))
    }

    /// Copy of this configuration with the password masked, for logging.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            bind_password: "********".to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for LdapServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapServerConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("connect_method", &self.connect_method)
            .field("port", &self.port)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"********")
            .field("base_dn", &self.base_dn)
            .field("user_filter", &self.user_filter)
            .field("attributes", &self.attributes)
            .field("display_template", &self.display_template)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

/// Generate the fallback template showing every fetched attribute, one
/// `name: value` line per attribute in configured order.
#[must_use]
pub fn default_display_template(attributes: &str) -> String {
    let mut template = String::new();
    for attr in attributes.split(',') {
        let attr = attr.trim();
        template.push_str(&format!("{attr}: {{{attr}}}<br>"));
    }
    template
}

/// Check that every `{` in a display template has a matching `}` and that
/// braces do not nest. Runs at startup so rendering never sees a
/// malformed template.
pub fn validate_display_template(template: &str) -> CrawlResult<()> {
    let mut brace_level = 0i32;
    let mut open_at = 0usize;
    for (position, c) in template.chars().enumerate() {
        match c {
            '{' => {
                if brace_level > 0 {
                    return Err(CrawlError::invalid_configuration(format!(
                        "invalid display template: {template}. \
                         Nested open brace at character {position}"
                    )));
                }
                brace_level += 1;
                open_at = position;
            }
            '}' => {
                if brace_level == 0 {
                    return Err(CrawlError::invalid_configuration(format!(
                        "invalid display template: {template}. \
                         Unmatched close brace at character {position}"
                    )));
                }
                brace_level -= 1;
            }
            _ => {}
        }
    }
    if brace_level != 0 {
        return Err(CrawlError::invalid_configuration(format!(
            "invalid display template: {template}. \
             No close brace matches open at character {open_at}"
        )));
    }
    Ok(())
}
