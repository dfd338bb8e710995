//! Authentication utilities
//!
//! Provides:
//! - The resolved request principal (`user id` + `role`)
//! - JWT token generation and validation
//! - An axum extractor that turns a bearer token into a [`Principal`]
//!
//! How tokens are minted for real users is outside this service; the
//! gateway only verifies them.

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Workflow roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Lecturer,
    Examiner,
    Hod,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Lecturer => "lecturer",
            Role::Examiner => "examiner",
            Role::Hod => "hod",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lecturer" => Ok(Role::Lecturer),
            "examiner" => Ok(Role::Examiner),
            "hod" => Ok(Role::Hod),
            other => Err(AppError::Unauthorized {
                message: format!("Unknown role '{}'", other),
            }),
        }
    }
}

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub department: Option<String>,
    /// Course codes an examiner moderates; empty for other roles
    pub assigned_course_codes: Vec<String>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, full_name: impl Into<String>) -> Self {
        Self {
            user_id,
            role,
            full_name: full_name.into(),
            department: None,
            assigned_course_codes: Vec::new(),
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_courses<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assigned_course_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_assigned_to(&self, course_code: &str) -> bool {
        self.assigned_course_codes.iter().any(|c| c == course_code)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Workflow role
    pub role: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Assigned course codes (examiners)
    #[serde(default)]
    pub courses: Vec<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl TryFrom<JwtClaims> for Principal {
    type Error = AppError;

    fn try_from(claims: JwtClaims) -> Result<Self> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        Ok(Principal {
            user_id,
            role: claims.role.parse()?,
            full_name: claims.name,
            department: claims.department,
            assigned_course_codes: claims.courses,
        })
    }
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a token for a principal
    pub fn generate_token(&self, principal: &Principal) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: principal.user_id.to_string(),
            role: principal.role.to_string(),
            name: principal.full_name.clone(),
            department: principal.department.clone(),
            courses: principal.assigned_course_codes.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }

    /// Resolve the principal carried by a token
    pub fn authenticate(&self, token: &str) -> Result<Principal> {
        self.validate_token(token)?.try_into()
    }
}

/// Extract the token from an `Authorization: Bearer` header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for Principal
impl<S> FromRequestParts<S> for Principal
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        jwt.authenticate(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Lecturer, Role::Examiner, Role::Hod] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_jwt_resolves_principal() {
        let manager = JwtManager::new("test_secret", 3600);
        let principal = Principal::new(Uuid::new_v4(), Role::Examiner, "Dr. Moderator")
            .with_department("Computing")
            .with_courses(["CS101", "CS205"]);

        let token = manager.generate_token(&principal).unwrap();
        let resolved = manager.authenticate(&token).unwrap();

        assert_eq!(resolved, principal);
        assert!(resolved.is_assigned_to("CS205"));
        assert!(!resolved.is_assigned_to("MA100"));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let issuer = JwtManager::new("secret-a", 3600);
        let verifier = JwtManager::new("secret-b", 3600);
        let token = issuer
            .generate_token(&Principal::new(Uuid::new_v4(), Role::Hod, "Head"))
            .unwrap();

        assert!(matches!(verifier.authenticate(&token), Err(AppError::InvalidToken)));
    }
}
