//! Cart identity: who a cart belongs to.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{CustomerId, SessionId};

const SESSION_PREFIX: &str = "session:";
const CUSTOMER_PREFIX: &str = "customer:";

/// The durable identity that keys a remote cart.
///
/// A shopper's cart is keyed by exactly one of these at a time. Identity
/// changes (login, logout) are explicit inputs to the cart engine rather than
/// ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartIdentity {
    /// A guest identified by a client-generated session ID.
    Anonymous(SessionId),
    /// A logged-in customer.
    Authenticated(CustomerId),
}

impl CartIdentity {
    /// Stable string key, used in API paths and local storage file names.
    ///
    /// `session:<uuid>` or `customer:<id>`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.to_string()
    }

    /// Whether this identity belongs to a logged-in customer.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl fmt::Display for CartIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous(session) => write!(f, "{SESSION_PREFIX}{session}"),
            Self::Authenticated(customer) => write!(f, "{CUSTOMER_PREFIX}{customer}"),
        }
    }
}

/// Errors from parsing a [`CartIdentity`] storage key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityParseError {
    /// Key has neither a `session:` nor a `customer:` prefix.
    #[error("identity must start with 'session:' or 'customer:': {0}")]
    UnknownKind(String),
    /// The session part is not a UUID.
    #[error("invalid session id: {0}")]
    InvalidSession(String),
    /// The customer part is not an integer.
    #[error("invalid customer id: {0}")]
    InvalidCustomer(String),
}

impl FromStr for CartIdentity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(SESSION_PREFIX) {
            return rest
                .parse::<SessionId>()
                .map(Self::Anonymous)
                .map_err(|_| IdentityParseError::InvalidSession(rest.to_owned()));
        }
        if let Some(rest) = s.strip_prefix(CUSTOMER_PREFIX) {
            return rest
                .parse::<CustomerId>()
                .map(Self::Authenticated)
                .map_err(|_| IdentityParseError::InvalidCustomer(rest.to_owned()));
        }
        Err(IdentityParseError::UnknownKind(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_roundtrip() {
        let anon = CartIdentity::Anonymous(SessionId::generate());
        assert_eq!(anon.storage_key().parse::<CartIdentity>().unwrap(), anon);

        let customer = CartIdentity::Authenticated(CustomerId::new(12));
        assert_eq!(customer.storage_key(), "customer:12");
        assert_eq!("customer:12".parse::<CartIdentity>().unwrap(), customer);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "user:1".parse::<CartIdentity>(),
            Err(IdentityParseError::UnknownKind(_))
        ));
        assert!(matches!(
            "session:not-a-uuid".parse::<CartIdentity>(),
            Err(IdentityParseError::InvalidSession(_))
        ));
        assert!(matches!(
            "customer:abc".parse::<CartIdentity>(),
            Err(IdentityParseError::InvalidCustomer(_))
        ));
    }

    #[test]
    fn test_is_authenticated() {
        assert!(CartIdentity::Authenticated(CustomerId::new(1)).is_authenticated());
        assert!(!CartIdentity::Anonymous(SessionId::generate()).is_authenticated());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(CartIdentity::Authenticated(CustomerId::new(3))).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "authenticated", "id": 3}));
    }
}
