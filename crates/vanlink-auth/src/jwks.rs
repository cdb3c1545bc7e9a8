//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! Keys are fetched from the identity provider's JWKS endpoint and cached
//! until the refresh interval elapses or an unknown key ID is seen.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::prelude::*;
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// JWKS response from the identity provider.
#[derive(Debug, Deserialize)]
pub struct JwksResponse {
    /// The list of keys.
    pub keys: Vec<JwkKey>,
}

/// A single JWK (JSON Web Key).
#[derive(Debug, Deserialize)]
pub struct JwkKey {
    /// Key type ("RSA" or "OKP").
    pub kty: String,
    /// Key ID.
    pub kid: Option<String>,
    /// Key use (e.g., "sig").
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// Algorithm (e.g., "RS256", `EdDSA`).
    pub alg: Option<String>,
    /// RSA modulus (base64url encoded).
    pub n: Option<String>,
    /// RSA public exponent (base64url encoded).
    pub e: Option<String>,
    /// OKP curve (e.g., "Ed25519").
    pub crv: Option<String>,
    /// OKP public key (base64url encoded).
    pub x: Option<String>,
}

/// A decoding key together with the algorithm it verifies.
#[derive(Clone)]
pub struct VerificationKey {
    /// The decoding key.
    pub key: DecodingKey,
    /// The signature algorithm for this key.
    pub algorithm: Algorithm,
}

/// Cached JWKS keys with expiration.
struct CachedKeys {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Instant,
}

impl Default for CachedKeys {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            // Set to far past so first access triggers fetch
            fetched_at: Instant::now()
                .checked_sub(Duration::from_secs(24 * 3600))
                .unwrap_or_else(Instant::now),
        }
    }
}

/// JWKS key provider that fetches and caches keys.
pub struct JwksProvider {
    config: AuthConfig,
    client: reqwest::Client,
    cache: RwLock<CachedKeys>,
}

impl JwksProvider {
    /// Create a new JWKS provider with the given configuration.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            config,
            client,
            cache: RwLock::new(CachedKeys::default()),
        }
    }

    /// Get a verification key by key ID, fetching from JWKS if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not found or JWKS fetch fails.
    pub async fn get_key(&self, kid: &str) -> Result<VerificationKey> {
        {
            let cache = self.cache.read();
            let refresh_interval = Duration::from_secs(self.config.jwks_refresh_seconds);
            if cache.fetched_at.elapsed() < refresh_interval {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.cache.read();
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    /// Refresh the JWKS cache by fetching from the server.
    async fn refresh_keys(&self) -> Result<()> {
        let jwks_url = &self.config.jwks_url;
        tracing::debug!(url = %jwks_url, "Fetching JWKS");

        let response: JwksResponse = self
            .client
            .get(jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::JwksFetchFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchFailed(e.to_string()))?;

        let mut new_keys = HashMap::new();

        for key in response.keys {
            let Some(kid) = &key.kid else {
                continue;
            };
            match Self::parse_key(&key) {
                Ok(Some(parsed)) => {
                    new_keys.insert(kid.clone(), parsed);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(kid = %kid, error = %e, "Skipping malformed JWK"),
            }
        }

        tracing::debug!(count = new_keys.len(), "Cached JWKS keys");

        let mut cache = self.cache.write();
        cache.keys = new_keys;
        cache.fetched_at = Instant::now();

        Ok(())
    }

    /// Parse a JWK into a verification key.
    ///
    /// Returns `Ok(None)` for key types this service does not verify.
    fn parse_key(key: &JwkKey) -> Result<Option<VerificationKey>> {
        match key.kty.as_str() {
            "RSA" => {
                let (Some(n), Some(e)) = (key.n.as_deref(), key.e.as_deref()) else {
                    return Err(AuthError::InvalidToken(
                        "RSA key missing n or e".to_string(),
                    ));
                };
                let algorithm = match key.alg.as_deref() {
                    None | Some("RS256") => Algorithm::RS256,
                    Some("RS384") => Algorithm::RS384,
                    Some("RS512") => Algorithm::RS512,
                    Some(other) => {
                        tracing::warn!(alg = other, "Unsupported RSA algorithm");
                        return Ok(None);
                    }
                };
                let decoding_key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| AuthError::InvalidToken(format!("invalid RSA key: {e}")))?;

                Ok(Some(VerificationKey {
                    key: decoding_key,
                    algorithm,
                }))
            }
            "OKP" => {
                let crv = key.crv.as_deref().unwrap_or("");
                if crv != "Ed25519" {
                    tracing::warn!(crv = crv, "Unsupported OKP curve");
                    return Ok(None);
                }

                let x = key
                    .x
                    .as_ref()
                    .ok_or_else(|| AuthError::InvalidToken("missing x parameter".to_string()))?;

                let public_key = BASE64_URL_SAFE_NO_PAD
                    .decode(x.trim_end_matches('='))
                    .map_err(|e| AuthError::InvalidToken(format!("invalid base64: {e}")))?;

                Ok(Some(VerificationKey {
                    key: DecodingKey::from_ed_der(&public_key),
                    algorithm: Algorithm::EdDSA,
                }))
            }
            other => {
                tracing::warn!(kty = other, "Unknown key type");
                Ok(None)
            }
        }
    }

    /// Force a refresh of the JWKS cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the JWKS fetch fails.
    pub async fn force_refresh(&self) -> Result<()> {
        self.refresh_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ED25519_X: &str = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";

    fn okp_key(kid: &str) -> JwkKey {
        JwkKey {
            kty: "OKP".to_string(),
            kid: Some(kid.to_string()),
            key_use: Some("sig".to_string()),
            alg: Some("EdDSA".to_string()),
            n: None,
            e: None,
            crv: Some("Ed25519".to_string()),
            x: Some(ED25519_X.to_string()),
        }
    }

    fn config_for(server: &MockServer) -> AuthConfig {
        AuthConfig {
            jwks_url: format!("{}/jwks", server.uri()),
            ..AuthConfig::for_project("test-project")
        }
    }

    #[test]
    fn parse_ed25519_key() {
        let result = JwksProvider::parse_key(&okp_key("k1")).unwrap().unwrap();
        assert_eq!(result.algorithm, Algorithm::EdDSA);
    }

    #[test]
    fn parse_rsa_key() {
        let key = JwkKey {
            kty: "RSA".to_string(),
            kid: Some("rsa-1".to_string()),
            key_use: Some("sig".to_string()),
            alg: Some("RS256".to_string()),
            n: Some("sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw".to_string()),
            e: Some("AQAB".to_string()),
            crv: None,
            x: None,
        };

        let result = JwksProvider::parse_key(&key).unwrap().unwrap();
        assert_eq!(result.algorithm, Algorithm::RS256);
    }

    #[test]
    fn rsa_key_without_modulus_is_rejected() {
        let key = JwkKey {
            kty: "RSA".to_string(),
            kid: Some("rsa-1".to_string()),
            key_use: None,
            alg: None,
            n: None,
            e: Some("AQAB".to_string()),
            crv: None,
            x: None,
        };
        assert!(JwksProvider::parse_key(&key).is_err());
    }

    #[test]
    fn skip_unsupported_curve() {
        let mut key = okp_key("k1");
        key.crv = Some("X25519".to_string());

        let result = JwksProvider::parse_key(&key).unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fetches_and_caches_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{"kty": "OKP", "crv": "Ed25519", "x": ED25519_X, "kid": "k1", "alg": "EdDSA"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = JwksProvider::new(config_for(&server));
        assert!(provider.get_key("k1").await.is_ok());
        // Served from cache: the mock only allows one request.
        assert!(provider.get_key("k1").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid_is_key_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{"kty": "OKP", "crv": "Ed25519", "x": ED25519_X, "kid": "k1"}]
            })))
            .mount(&server)
            .await;

        let provider = JwksProvider::new(config_for(&server));
        let result = provider.get_key("other").await;
        assert!(matches!(result, Err(AuthError::KeyNotFound(kid)) if kid == "other"));
    }

    #[tokio::test]
    async fn server_error_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = JwksProvider::new(config_for(&server));
        let result = provider.get_key("k1").await;
        assert!(matches!(result, Err(AuthError::JwksFetchFailed(_))));
    }
}
