use async_trait::async_trait;
use chrono::Utc;
use config::GraphSourceConfig;
use errors::SourceError;
use metrics::counter;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tg_core::{AccessToken, ClientCredentials, IdentityProvider};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Refresh a cached token when it has less than this many seconds left.
pub const DEFAULT_REFRESH_SKEW_SECONDS: i64 = 300;

pub fn client_credentials(config: &GraphSourceConfig) -> ClientCredentials {
    ClientCredentials {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        authority: config.authority(),
        scope: config.scope.clone()
    }
}

/// OAuth2 client-credentials grant against `{authority}/oauth2/v2.0/token`.
pub struct AzureAdIdentityProvider {
    http_client: Client,
    timeout_ms: u64
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64
}

impl AzureAdIdentityProvider {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::from_reqwest(&e, timeout.as_millis() as u64))?;

        Ok(Self {
            http_client,
            timeout_ms: timeout.as_millis() as u64
        })
    }
}

#[async_trait]
impl IdentityProvider for AzureAdIdentityProvider {
    async fn acquire_token(&self, credentials: &ClientCredentials) -> Result<AccessToken, SourceError> {
        let token_url = format!(
            "{}/oauth2/v2.0/token",
            credentials.authority.trim_end_matches('/')
        );

        let body = format!(
            "client_id={}&client_secret={}&scope={}&grant_type=client_credentials",
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(&credentials.client_secret),
            urlencoding::encode(&credentials.scope)
        );

        let response = self
            .http_client
            .post(&token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| match SourceError::from_reqwest(&e, self.timeout_ms) {
                timeout @ SourceError::Timeout { .. } => timeout,
                other => SourceError::Auth {
                    reason: format!("Token request failed: {}", other)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth {
                reason: format!("Token request failed: {} - {}", status, error_body)
            });
        }

        let token_response: OAuthTokenResponse =
            response.json().await.map_err(|e| SourceError::Auth {
                reason: format!("Failed to parse token response: {}", e)
            })?;

        let lifetime = chrono::Duration::try_seconds(token_response.expires_in as i64)
            .unwrap_or(chrono::Duration::zero());

        Ok(AccessToken {
            token: token_response.access_token,
            expires_at: Utc::now() + lifetime
        })
    }
}

/// A cached bearer token over an [`IdentityProvider`].
///
/// At most one refresh is in flight at a time. Callers that queued behind it
/// share its outcome: the token it produced, or the error it failed with.
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    credentials: ClientCredentials,
    refresh_skew: chrono::Duration,
    state: RwLock<TokenState>,
    refresh_lock: Mutex<()>
}

struct TokenState {
    token: Option<AccessToken>,
    /// Skew applied to `token`, clamped to half its issued lifetime.
    skew: chrono::Duration,
    /// Bumped by every completed refresh attempt.
    generation: u64,
    last_failure: Option<SourceError>
}

impl TokenState {
    fn fresh_token(&self) -> Option<String> {
        self.token
            .as_ref()
            .filter(|t| t.is_fresh(Utc::now(), self.skew))
            .map(|t| t.token.clone())
    }
}

impl AuthSession {
    pub fn new(provider: Arc<dyn IdentityProvider>, credentials: ClientCredentials) -> Self {
        Self {
            provider,
            credentials,
            refresh_skew: chrono::Duration::seconds(DEFAULT_REFRESH_SKEW_SECONDS),
            state: RwLock::new(TokenState {
                token: None,
                skew: chrono::Duration::zero(),
                generation: 0,
                last_failure: None
            }),
            refresh_lock: Mutex::new(())
        }
    }

    pub fn from_config(provider: Arc<dyn IdentityProvider>, config: &GraphSourceConfig) -> Self {
        let skew = chrono::Duration::try_seconds(config.refresh_skew_seconds as i64)
            .unwrap_or(chrono::Duration::seconds(DEFAULT_REFRESH_SKEW_SECONDS));
        Self::new(provider, client_credentials(config)).with_refresh_skew(skew)
    }

    pub fn with_refresh_skew(mut self, skew: chrono::Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Returns a bearer token that stays valid past the refresh skew. For
    /// tokens issued with a lifetime shorter than twice the skew, the skew
    /// shrinks to half that lifetime.
    pub async fn token(&self) -> Result<String, SourceError> {
        let observed = {
            let state = self.state.read().await;
            if let Some(token) = state.fresh_token() {
                return Ok(token);
            }
            state.generation
        };

        let _refresh = self.refresh_lock.lock().await;
        {
            let state = self.state.read().await;
            if let Some(token) = state.fresh_token() {
                debug!("Reusing token refreshed by a concurrent caller");
                return Ok(token);
            }
            if state.generation != observed {
                if let Some(failure) = &state.last_failure {
                    debug!("Sharing failure of a concurrent token refresh");
                    return Err(failure.clone());
                }
            }
        }

        let outcome = self.provider.acquire_token(&self.credentials).await;
        let mut state = self.state.write().await;
        state.generation += 1;

        match outcome {
            Ok(fresh) => {
                counter!("tierguard_token_refresh_total", "outcome" => "success").increment(1);
                info!(expires_at = %fresh.expires_at, "Access token refreshed");
                let lifetime = fresh.expires_at - Utc::now();
                state.skew = self
                    .refresh_skew
                    .min(lifetime / 2)
                    .max(chrono::Duration::zero());
                let token = fresh.token.clone();
                state.token = Some(fresh);
                state.last_failure = None;
                Ok(token)
            }
            Err(e) => {
                counter!("tierguard_token_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %e, "Access token refresh failed");
                let failure = match e {
                    SourceError::Auth { .. } | SourceError::Timeout { .. } => e,
                    other => SourceError::Auth {
                        reason: other.to_string()
                    }
                };
                state.last_failure = Some(failure.clone());
                Err(failure)
            }
        }
    }

    /// Drops the cached token so the next call refreshes. Used on HTTP 401.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        if state.token.take().is_some() {
            debug!("Cached access token invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::CountingIdentityProvider;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(provider: Arc<CountingIdentityProvider>) -> AuthSession {
        AuthSession::new(provider, testing::credentials())
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
        let session = session(provider.clone());

        assert_eq!(session.token().await.unwrap(), "token-1");
        assert_eq!(session.token().await.unwrap(), "token-1");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::zero()));
        let session = session(provider.clone());

        assert_eq!(session.token().await.unwrap(), "token-1");
        assert_eq!(session.token().await.unwrap(), "token-2");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_short_lived_token_is_reused() {
        let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::minutes(2)));
        let session = session(provider.clone());

        for _ in 0..5 {
            assert_eq!(session.token().await.unwrap(), "token-1");
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let provider = Arc::new(
            CountingIdentityProvider::new(chrono::Duration::hours(1))
                .with_delay(Duration::from_millis(50))
        );
        let session = Arc::new(session(provider.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.token().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let provider = Arc::new(CountingIdentityProvider::new(chrono::Duration::hours(1)));
        let session = session(provider.clone());

        session.token().await.unwrap();
        session.invalidate().await;
        assert_eq!(session.token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_refresh_failure_is_auth_error() {
        let provider = Arc::new(CountingIdentityProvider::failing());
        let session = session(provider.clone());

        let err = session.token().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failed_refresh() {
        let provider = Arc::new(
            CountingIdentityProvider::failing().with_delay(Duration::from_millis(50))
        );
        let session = Arc::new(session(provider.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.token().await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.to_string().contains("invalid_client"));
        }
        assert_eq!(provider.calls(), 1);

        // A later caller starts a new attempt rather than replaying the failure.
        assert!(session.token().await.is_err());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_azure_ad_client_credentials_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "graph-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = AzureAdIdentityProvider::new(Duration::from_secs(5)).unwrap();
        let credentials = ClientCredentials {
            client_id: "app-id".into(),
            client_secret: "secret".into(),
            authority: format!("{}/contoso-tenant", server.uri()),
            scope: "https://graph.microsoft.com/.default".into()
        };

        let token = provider.acquire_token(&credentials).await.unwrap();
        assert_eq!(token.token, "graph-token");
        assert!(token.is_fresh(Utc::now(), chrono::Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_azure_ad_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contoso-tenant/oauth2/v2.0/token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#)
            )
            .mount(&server)
            .await;

        let provider = AzureAdIdentityProvider::new(Duration::from_secs(5)).unwrap();
        let credentials = ClientCredentials {
            client_id: "app-id".into(),
            client_secret: "wrong".into(),
            authority: format!("{}/contoso-tenant", server.uri()),
            scope: "scope".into()
        };

        let err = provider.acquire_token(&credentials).await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("invalid_client"));
    }
}
