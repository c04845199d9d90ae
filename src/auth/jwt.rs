//! JWT verification against the bootstrapped authority key.

use std::str::FromStr;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::{AuthError, Authenticator};
use crate::config::AuthConfig;
use crate::session::{Identity, IdentityId};

/// Claims issued by the authority service.
#[derive(Debug, Deserialize)]
struct GatewayClaims {
    #[serde(default)]
    sub: Option<IdentityId>,
    #[serde(default, rename = "userId")]
    user_id: Option<IdentityId>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    roles: Option<Vec<String>>,
    #[serde(default)]
    authorities: Option<Vec<String>>,
}

/// Verifies bearer tokens locally with `jsonwebtoken`.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl JwtAuthenticator {
    /// Build from key material: a PEM public key for asymmetric algorithms,
    /// the raw shared secret for HS*.
    pub fn from_key_material(material: &str, config: &AuthConfig) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(&config.algorithm)?;
        let material = material.trim();
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(material.as_bytes())
            }
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(material.as_bytes())?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(material.as_bytes())?,
            _ => DecodingKey::from_rsa_pem(material.as_bytes())?,
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self { key, validation })
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode::<GatewayClaims>(token, &self.key, &self.validation)?.claims;

        let id = claims
            .user_id
            .or(claims.sub)
            .ok_or(AuthError::MissingIdentity)?;
        let display_name = claims.username.unwrap_or_else(|| id.to_string());
        let roles = claims
            .roles
            .into_iter()
            .chain(claims.authorities)
            .flatten();

        Ok(Identity::new(id, display_name, roles))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub(crate) const PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rsa_private.pem");
    pub(crate) const PUBLIC_PEM: &str = include_str!("../../tests/fixtures/rsa_public.pem");
    const OTHER_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/other_public.pem");

    pub(crate) fn sign(claims: serde_json::Value) -> String {
        let key = EncodingKey::from_rsa_pem(PRIVATE_PEM.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    pub(crate) fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    fn authenticator(pem: &str) -> JwtAuthenticator {
        JwtAuthenticator::from_key_material(pem, &AuthConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_yields_identity() {
        let token = sign(json!({
            "sub": "42",
            "username": "alice",
            "roles": ["ROLE_admin"],
            "exp": future_exp(),
        }));

        let identity = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap();
        assert_eq!(identity.id.as_str(), "42");
        assert_eq!(identity.display_name, "alice");
        assert!(identity.roles.contains("ROLE_admin"));
    }

    #[tokio::test]
    async fn test_numeric_user_id_and_authorities_alias() {
        let token = sign(json!({
            "userId": 7,
            "authorities": ["ROLE_operator"],
            "exp": future_exp(),
        }));

        let identity = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap();
        assert_eq!(identity.id, IdentityId::from(7u64));
        assert_eq!(identity.display_name, "7");
        assert!(identity.has_any_role(&["ROLE_operator"]));
    }

    #[tokio::test]
    async fn test_roles_and_authorities_are_merged() {
        let token = sign(json!({
            "sub": "5",
            "roles": ["ROLE_viewer"],
            "authorities": ["ROLE_admin"],
            "exp": future_exp(),
        }));

        let identity = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap();
        assert!(identity.roles.contains("ROLE_viewer"));
        assert!(identity.roles.contains("ROLE_admin"));
    }

    #[tokio::test]
    async fn test_numeric_subject() {
        let token = sign(json!({ "sub": 11, "roles": ["ROLE_admin"], "exp": future_exp() }));

        let identity = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap();
        assert_eq!(identity.id, IdentityId::from(11u64));
    }

    #[tokio::test]
    async fn test_user_id_preferred_over_subject() {
        let token = sign(json!({ "userId": 12, "sub": "alice@example", "exp": future_exp() }));

        let identity = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap();
        assert_eq!(identity.id.as_str(), "12");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let token = sign(json!({ "sub": "1", "exp": chrono::Utc::now().timestamp() - 3600 }));
        let err = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn test_signature_from_other_key() {
        let token = sign(json!({ "sub": "1", "exp": future_exp() }));
        let err = authenticator(OTHER_PUBLIC_PEM).authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let err = authenticator(PUBLIC_PEM).authenticate("not.a.jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_identity_claim() {
        let token = sign(json!({ "roles": ["ROLE_admin"], "exp": future_exp() }));
        let err = authenticator(PUBLIC_PEM).authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingIdentity));
    }

    #[tokio::test]
    async fn test_shared_secret_algorithm() {
        let config = AuthConfig {
            algorithm: "HS256".into(),
            ..AuthConfig::default()
        };
        let auth = JwtAuthenticator::from_key_material("s3cret\n", &config).unwrap();
        let token = encode(
            &Header::default(),
            &json!({ "sub": "9", "exp": future_exp() }),
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();

        assert_eq!(auth.authenticate(&token).await.unwrap().id.as_str(), "9");
    }
}
