//! OAuth2 sign-in against the Microsoft identity platform
//!
//! The [`AuthSession`] owns the active account and its bearer credential for
//! the lifetime of the process. Nothing is written to disk: tokens live in the
//! authenticator's in-memory cache and are dropped on logout.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::ApplicationSecret;

use crate::config::IdentityConfig;
use crate::error::{ReportError, Result};

/// Graph permissions the report needs: read groups, send the report mail
pub const GRAPH_SCOPES: &[&str] = &[
    "https://graph.microsoft.com/Group.Read.All",
    "https://graph.microsoft.com/Mail.Send",
];

/// OpenID scopes for the account identity and refresh tokens
pub const IDENTITY_SCOPES: &[&str] = &["openid", "profile", "offline_access"];

/// Refresh credentials this long before they actually expire
const EXPIRY_SKEW_SECS: i64 = 60;

/// Scope set used for sign-in and for every silent reacquire
pub fn session_scopes() -> Vec<String> {
    GRAPH_SCOPES
        .iter()
        .chain(IDENTITY_SCOPES.iter())
        .map(|s| s.to_string())
        .collect()
}

/// Authenticator type produced by the installed-app flow builder
pub type OAuthAuthenticator = yup_oauth2::authenticator::Authenticator<
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
>;

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// `{object id}.{tenant id}`
    pub home_account_id: String,
    pub username: String,
    pub name: Option<String>,
}

impl Account {
    /// `Name <username>` when the token carried a display name
    pub fn display_label(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{} <{}>", name, self.username),
            None => self.username.clone(),
        }
    }

    fn unknown() -> Self {
        Self {
            home_account_id: String::new(),
            username: "unknown account".to_string(),
            name: None,
        }
    }
}

/// Bearer token bound to an account
#[derive(Clone)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub account: Account,
}

impl Credential {
    /// Usable at `now`, keeping a safety margin before expiry
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECS) < expires_at,
            None => true,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("account", &self.account)
            .finish()
    }
}

/// Source of bearer credentials
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive sign-in flow
    async fn sign_in_interactive(&self) -> Result<Credential>;

    /// Reacquire a credential for `account` without user interaction
    async fn acquire_silent(&self, account: &Account) -> Result<Credential>;

    /// Forget everything cached for `account`
    async fn sign_out(&self, account: &Account) -> Result<()>;
}

/// Explicit sign-in session shared with the Graph client
pub struct AuthSession {
    provider: Box<dyn IdentityProvider>,
    active: Mutex<Option<Credential>>,
}

impl AuthSession {
    pub fn new(provider: Box<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            active: Mutex::new(None),
        }
    }

    /// Interactive sign-in; the returned account becomes the active one
    ///
    /// On failure no account is active afterwards.
    pub async fn login(&self) -> Result<Account> {
        let mut active = self.active.lock().await;
        match self.provider.sign_in_interactive().await {
            Ok(credential) => {
                let account = credential.account.clone();
                info!("Signed in as {}", account.username);
                debug!("Home account id {}", account.home_account_id);
                *active = Some(credential);
                Ok(account)
            }
            Err(e) => {
                *active = None;
                warn!("Sign-in failed: {}", e);
                Err(match e {
                    ReportError::AuthFailure(_) => e,
                    other => ReportError::AuthFailure(other.to_string()),
                })
            }
        }
    }

    /// Tear down the session, returning the account that was active
    pub async fn logout(&self) -> Result<Option<Account>> {
        let previous = self.active.lock().await.take();
        match previous {
            Some(credential) => {
                self.provider.sign_out(&credential.account).await?;
                info!("Signed out {}", credential.account.username);
                Ok(Some(credential.account))
            }
            None => Ok(None),
        }
    }

    pub async fn active_account(&self) -> Option<Account> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|credential| credential.account.clone())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Bearer credential for the active account, reacquired silently when stale
    pub async fn get_credential(&self) -> Result<Credential> {
        let mut active = self.active.lock().await;
        let current = active.as_ref().ok_or(ReportError::AuthRequired)?;

        if current.is_valid_at(Utc::now()) {
            return Ok(current.clone());
        }

        debug!("Credential for {} expired, reacquiring silently", current.account.username);
        let refreshed = self.provider.acquire_silent(&current.account).await?;
        *active = Some(refreshed.clone());
        Ok(refreshed)
    }
}

/// Installed-app flow delegate that only shows the sign-in URL during login
///
/// Silent acquisition shares the authenticator; if the library falls back to
/// the interactive flow there, the delegate refuses and the call fails instead
/// of prompting.
#[derive(Clone)]
pub struct SignInDelegate {
    interactive_allowed: Arc<AtomicBool>,
}

impl SignInDelegate {
    pub fn new(interactive_allowed: Arc<AtomicBool>) -> Self {
        Self { interactive_allowed }
    }
}

impl InstalledFlowDelegate for SignInDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            if !self.interactive_allowed.load(Ordering::SeqCst) {
                return Err("interactive sign-in is only allowed during login".to_string());
            }
            if need_code {
                return Err("manual authorization code entry is not supported".to_string());
            }
            println!("Open this URL in your browser to sign in:\n\n  {}\n", url);
            Ok(String::new())
        })
    }
}

/// Application secret for a public client registered with the identity platform
pub fn application_secret(identity: &IdentityConfig) -> ApplicationSecret {
    ApplicationSecret {
        client_id: identity.client_id.clone(),
        client_secret: String::new(),
        auth_uri: identity.authorize_url(),
        token_uri: identity.token_url(),
        redirect_uris: vec![identity.redirect_uri()],
        ..Default::default()
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    oid: Option<String>,
    tid: Option<String>,
    preferred_username: Option<String>,
    name: Option<String>,
}

/// Read the account identity from an ID token's claims
///
/// The signature is not checked; the token came straight from the token
/// endpoint over TLS.
pub fn account_from_id_token(id_token: &str) -> Result<Account> {
    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| ReportError::AuthFailure("Malformed ID token".to_string()))?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ReportError::AuthFailure(format!("Malformed ID token payload: {}", e)))?;

    let claims: IdTokenClaims = serde_json::from_slice(&decoded)
        .map_err(|e| ReportError::AuthFailure(format!("Unreadable ID token claims: {}", e)))?;

    let home_account_id = match (&claims.oid, &claims.tid) {
        (Some(oid), Some(tid)) => format!("{}.{}", oid, tid),
        (Some(oid), None) => oid.clone(),
        _ => String::new(),
    };

    Ok(Account {
        home_account_id,
        username: claims
            .preferred_username
            .unwrap_or_else(|| "unknown account".to_string()),
        name: claims.name,
    })
}

/// [`IdentityProvider`] backed by yup-oauth2's installed-app redirect flow
pub struct OAuthIdentityProvider {
    identity: IdentityConfig,
    scopes: Vec<String>,
    authenticator: Mutex<Option<OAuthAuthenticator>>,
    interactive_allowed: Arc<AtomicBool>,
}

impl OAuthIdentityProvider {
    pub fn new(identity: IdentityConfig) -> Self {
        Self {
            identity,
            scopes: session_scopes(),
            authenticator: Mutex::new(None),
            interactive_allowed: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn build_authenticator(&self) -> Result<OAuthAuthenticator> {
        let secret = application_secret(&self.identity);

        // In-memory token storage only: nothing survives the process
        yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPPortRedirect(self.identity.redirect_port),
        )
        .flow_delegate(Box::new(SignInDelegate::new(Arc::clone(
            &self.interactive_allowed,
        ))))
        .build()
        .await
        .map_err(|e| ReportError::AuthFailure(format!("Failed to build authenticator: {}", e)))
    }

    async fn credential_from(&self, auth: &OAuthAuthenticator, account: Option<&Account>) -> Result<Credential> {
        let token = auth
            .token(self.scopes.as_slice())
            .await
            .map_err(|e| ReportError::AuthFailure(format!("Failed to obtain token: {}", e)))?;

        let access_token = token
            .token()
            .ok_or_else(|| ReportError::AuthFailure("Token response had no access token".to_string()))?
            .to_string();

        let expires_at = token
            .expiration_time()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.unix_timestamp(), 0));

        let account = match account {
            Some(account) => account.clone(),
            None => match auth.id_token(self.scopes.as_slice()).await {
                Ok(Some(id_token)) => account_from_id_token(&id_token)?,
                Ok(None) => {
                    warn!("Token response carried no ID token");
                    Account::unknown()
                }
                Err(e) => {
                    warn!("Could not read ID token: {}", e);
                    Account::unknown()
                }
            },
        };

        Ok(Credential {
            access_token,
            expires_at,
            account,
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    async fn sign_in_interactive(&self) -> Result<Credential> {
        let auth = self.build_authenticator().await?;

        self.interactive_allowed.store(true, Ordering::SeqCst);
        let result = self.credential_from(&auth, None).await;
        self.interactive_allowed.store(false, Ordering::SeqCst);

        let credential = result?;
        *self.authenticator.lock().await = Some(auth);
        Ok(credential)
    }

    async fn acquire_silent(&self, account: &Account) -> Result<Credential> {
        let guard = self.authenticator.lock().await;
        let auth = guard.as_ref().ok_or(ReportError::AuthRequired)?;
        self.credential_from(auth, Some(account)).await
    }

    async fn sign_out(&self, account: &Account) -> Result<()> {
        self.authenticator.lock().await.take();
        info!(
            "Cleared cached tokens for {}. To end the browser session as well, visit {}",
            account.username,
            self.identity.logout_url()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mockall::mock! {
        pub Provider {}

        #[async_trait]
        impl IdentityProvider for Provider {
            async fn sign_in_interactive(&self) -> Result<Credential>;
            async fn acquire_silent(&self, account: &Account) -> Result<Credential>;
            async fn sign_out(&self, account: &Account) -> Result<()>;
        }
    }

    fn test_account() -> Account {
        Account {
            home_account_id: "oid.tid".to_string(),
            username: "admin@contoso.com".to_string(),
            name: Some("Admin".to_string()),
        }
    }

    fn credential(token: &str, expires_in_secs: i64) -> Credential {
        Credential {
            access_token: token.to_string(),
            expires_at: Some(Utc::now() + Duration::seconds(expires_in_secs)),
            account: test_account(),
        }
    }

    fn encode_id_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    #[tokio::test]
    async fn test_login_sets_active_account() {
        let mut provider = MockProvider::new();
        provider
            .expect_sign_in_interactive()
            .times(1)
            .returning(|| Ok(credential("token-1", 3600)));

        let session = AuthSession::new(Box::new(provider));
        let account = session.login().await.unwrap();

        assert_eq!(account.username, "admin@contoso.com");
        assert!(session.is_logged_in().await);
        assert_eq!(session.active_account().await, Some(test_account()));
    }

    #[tokio::test]
    async fn test_failed_login_leaves_no_active_account() {
        let mut provider = MockProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_sign_in_interactive()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(credential("token-1", 3600)));
        provider
            .expect_sign_in_interactive()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(ReportError::NetworkError("connection refused".to_string())));

        let session = AuthSession::new(Box::new(provider));
        session.login().await.unwrap();

        let result = session.login().await;
        assert!(matches!(result, Err(ReportError::AuthFailure(_))));
        assert!(!session.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_get_credential_without_login() {
        let provider = MockProvider::new();
        let session = AuthSession::new(Box::new(provider));

        let result = session.get_credential().await;
        assert!(matches!(result, Err(ReportError::AuthRequired)));
    }

    #[tokio::test]
    async fn test_get_credential_reuses_valid_token() {
        let mut provider = MockProvider::new();
        provider
            .expect_sign_in_interactive()
            .returning(|| Ok(credential("token-1", 3600)));
        provider.expect_acquire_silent().never();

        let session = AuthSession::new(Box::new(provider));
        session.login().await.unwrap();

        let first = session.get_credential().await.unwrap();
        let second = session.get_credential().await.unwrap();
        assert_eq!(first.access_token, "token-1");
        assert_eq!(second.access_token, "token-1");
    }

    #[tokio::test]
    async fn test_get_credential_reacquires_expired_token_silently() {
        let mut provider = MockProvider::new();
        provider
            .expect_sign_in_interactive()
            .times(1)
            .returning(|| Ok(credential("stale", 30)));
        provider
            .expect_acquire_silent()
            .withf(|account| account.username == "admin@contoso.com")
            .times(1)
            .returning(|_| Ok(credential("fresh", 3600)));

        let session = AuthSession::new(Box::new(provider));
        session.login().await.unwrap();

        // 30s left is inside the skew margin
        let credential = session.get_credential().await.unwrap();
        assert_eq!(credential.access_token, "fresh");

        // The refreshed credential is cached
        let again = session.get_credential().await.unwrap();
        assert_eq!(again.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_logout_tears_down_session() {
        let mut provider = MockProvider::new();
        provider
            .expect_sign_in_interactive()
            .returning(|| Ok(credential("token-1", 3600)));
        provider.expect_sign_out().times(1).returning(|_| Ok(()));

        let session = AuthSession::new(Box::new(provider));
        session.login().await.unwrap();

        let signed_out = session.logout().await.unwrap();
        assert_eq!(signed_out, Some(test_account()));
        assert!(!session.is_logged_in().await);
        assert!(matches!(
            session.get_credential().await,
            Err(ReportError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn test_logout_without_login_is_noop() {
        let mut provider = MockProvider::new();
        provider.expect_sign_out().never();

        let session = AuthSession::new(Box::new(provider));
        assert_eq!(session.logout().await.unwrap(), None);
    }

    #[test]
    fn test_credential_validity() {
        let now = Utc::now();
        let fresh = credential("t", 3600);
        assert!(fresh.is_valid_at(now));

        let nearly_expired = credential("t", 10);
        assert!(!nearly_expired.is_valid_at(now));

        let no_expiry = Credential {
            expires_at: None,
            ..credential("t", 0)
        };
        assert!(no_expiry.is_valid_at(now));
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let debug = format!("{:?}", credential("super-secret-token", 3600));
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_account_from_id_token() {
        let token = encode_id_token(serde_json::json!({
            "oid": "11111111-aaaa",
            "tid": "22222222-bbbb",
            "preferred_username": "admin@contoso.com",
            "name": "Contoso Admin"
        }));

        let account = account_from_id_token(&token).unwrap();
        assert_eq!(account.home_account_id, "11111111-aaaa.22222222-bbbb");
        assert_eq!(account.username, "admin@contoso.com");
        assert_eq!(account.name.as_deref(), Some("Contoso Admin"));
    }

    #[test]
    fn test_account_from_malformed_id_token() {
        assert!(matches!(
            account_from_id_token("not-a-jwt"),
            Err(ReportError::AuthFailure(_))
        ));
        assert!(matches!(
            account_from_id_token("a.!!!.c"),
            Err(ReportError::AuthFailure(_))
        ));
    }

    #[test]
    fn test_application_secret() {
        let identity = IdentityConfig {
            client_id: "client-123".to_string(),
            tenant_id: "contoso.onmicrosoft.com".to_string(),
            ..Default::default()
        };

        let secret = application_secret(&identity);
        assert_eq!(secret.client_id, "client-123");
        assert!(secret.client_secret.is_empty());
        assert_eq!(
            secret.auth_uri,
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/authorize"
        );
        assert_eq!(
            secret.token_uri,
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
        assert_eq!(secret.redirect_uris, vec!["http://localhost:8000".to_string()]);
    }

    #[test]
    fn test_session_scopes_are_consistent() {
        let scopes = session_scopes();
        assert!(scopes.contains(&"https://graph.microsoft.com/Group.Read.All".to_string()));
        assert!(scopes.contains(&"https://graph.microsoft.com/Mail.Send".to_string()));
        assert!(scopes.contains(&"offline_access".to_string()));
        assert_eq!(scopes.len(), GRAPH_SCOPES.len() + IDENTITY_SCOPES.len());
    }

    #[tokio::test]
    async fn test_delegate_refuses_outside_login() {
        let allowed = Arc::new(AtomicBool::new(false));
        let delegate = SignInDelegate::new(Arc::clone(&allowed));

        let result = delegate
            .present_user_url("https://login.microsoftonline.com/authorize", false)
            .await;
        assert!(result.is_err());

        allowed.store(true, Ordering::SeqCst);
        let result = delegate
            .present_user_url("https://login.microsoftonline.com/authorize", false)
            .await;
        assert_eq!(result, Ok(String::new()));
    }

    #[test]
    fn test_account_display_label() {
        assert_eq!(test_account().display_label(), "Admin <admin@contoso.com>");

        let unnamed = Account {
            name: None,
            ..test_account()
        };
        assert_eq!(unnamed.display_label(), "admin@contoso.com");
    }
}
