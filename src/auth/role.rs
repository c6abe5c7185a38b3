use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;
use ts_rs::TS;
use utoipa::ToSchema;

use super::session::SessionClaims;

/// Role
///
/// The closed set of access tiers. Serialized as `"user"` / `"admin"` both in
/// session claims and in the `users.role` column; any other spelling is rejected
/// at decode time rather than silently treated as one tier or the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(ThisError, Debug, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// is_admin
///
/// Authorization predicate over already-validated claims. Callers must have passed
/// the authentication gate first; unauthenticated requests never reach here.
pub fn is_admin(claims: &SessionClaims) -> bool {
    match claims.role {
        Role::Admin => true,
        Role::User => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_with(role: Role) -> SessionClaims {
        SessionClaims {
            iss: "test".to_string(),
            uid: 1,
            role,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(is_admin(&claims_with(Role::Admin)));
        assert!(!is_admin(&claims_with(Role::User)));
    }

    #[test]
    fn test_role_parsing_is_strict() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("Admin".parse::<Role>().is_err());
        assert!("administrator".parse::<Role>().is_err());
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }

    #[test]
    fn test_unknown_role_error() {
        let err = "root".parse::<Role>().unwrap_err();
        assert_eq!(err, UnknownRole("root".to_string()));
        assert_eq!(err.to_string(), "unknown role 'root'");

        // Usable as a boxed source error.
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert_eq!(boxed.to_string(), "unknown role 'root'");
    }
}
