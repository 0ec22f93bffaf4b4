//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tenant_groups_report::auth::{Account, AuthSession, Credential, IdentityProvider};
use tenant_groups_report::error::Result;

pub const TEST_TOKEN: &str = "test-access-token";

pub fn test_account() -> Account {
    Account {
        home_account_id: "00000000-0000-0000-0000-000000000001.tenant".to_string(),
        username: "admin@contoso.com".to_string(),
        name: Some("Tenant Admin".to_string()),
    }
}

/// Identity provider handing out a fixed token, counting silent reacquisitions
pub struct StaticIdentityProvider {
    pub token: String,
    pub lifetime_secs: i64,
    pub silent_calls: Arc<AtomicUsize>,
}

impl StaticIdentityProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            lifetime_secs: 3600,
            silent_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn credential(&self) -> Credential {
        Credential {
            access_token: self.token.clone(),
            expires_at: Some(Utc::now() + Duration::seconds(self.lifetime_secs)),
            account: test_account(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn sign_in_interactive(&self) -> Result<Credential> {
        Ok(self.credential())
    }

    async fn acquire_silent(&self, _account: &Account) -> Result<Credential> {
        self.silent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.credential())
    }

    async fn sign_out(&self, _account: &Account) -> Result<()> {
        Ok(())
    }
}

/// Session already signed in with [`TEST_TOKEN`]
pub async fn logged_in_session() -> Arc<AuthSession> {
    let session = Arc::new(AuthSession::new(Box::new(StaticIdentityProvider::new(TEST_TOKEN))));
    session
        .login()
        .await
        .expect("static provider sign-in cannot fail");
    session
}

/// Session nobody has signed into
pub fn anonymous_session() -> Arc<AuthSession> {
    Arc::new(AuthSession::new(Box::new(StaticIdentityProvider::new(TEST_TOKEN))))
}

/// One `GET /groups` entry
pub fn group_json(
    id: &str,
    name: &str,
    mail: Option<&str>,
    group_types: &[&str],
    mail_enabled: bool,
    options: &[&str],
) -> serde_json::Value {
    json!({
        "id": id,
        "displayName": name,
        "mail": mail,
        "groupTypes": group_types,
        "mailEnabled": mail_enabled,
        "resourceProvisioningOptions": options,
    })
}

/// A small tenant covering each inclusion rule
pub fn tenant_groups_response() -> serde_json::Value {
    json!({
        "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#groups(id,displayName,mail,groupTypes,mailEnabled,resourceProvisioningOptions)",
        "value": [
            group_json("g-sales", "Sales", Some("sales@contoso.com"), &[], true, &[]),
            group_json("g-team", "Project Team", Some("team@contoso.com"), &["Unified"], true, &["Team"]),
            group_json("g-m365", "All Staff", Some("staff@contoso.com"), &["Unified"], true, &[]),
            group_json("g-yammer", "Community", Some("community@contoso.com"), &["Unified"], true, &["Yammer"]),
            group_json("g-sec", "VPN Users", None, &[], false, &[]),
        ]
    })
}

/// `GET /groups/{id}/members` payload with `users` users and one nested group
pub fn members_response(users: usize) -> serde_json::Value {
    let mut value: Vec<serde_json::Value> = (0..users)
        .map(|i| json!({ "@odata.type": "#microsoft.graph.user", "id": format!("u-{}", i) }))
        .collect();
    value.push(json!({ "@odata.type": "#microsoft.graph.group", "id": "nested" }));
    json!({ "value": value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_response_shape() {
        let response = members_response(2);
        assert_eq!(response["value"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_tenant_groups_response_shape() {
        let response = tenant_groups_response();
        assert_eq!(response["value"].as_array().unwrap().len(), 5);
        assert_eq!(response["value"][1]["resourceProvisioningOptions"][0], "Team");
    }
}
