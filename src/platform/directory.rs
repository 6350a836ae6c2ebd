// Account directory and bearer-token issuance for the reference platform

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AccountConfig;
use crate::workflows::{Role, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Result of a successful credential check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: String,
    pub account: Account,
    pub redirect: String,
}

#[derive(Debug, Default)]
pub struct AccountDirectory {
    accounts: HashMap<String, Account>,
    tokens: Mutex<HashMap<String, String>>,
}

impl AccountDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.id.clone(), account))
                .collect(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// One account per configured role; ids derive from the role so they are
    /// stable across restarts of the same configuration
    pub fn from_config(accounts: &[AccountConfig]) -> Self {
        Self::new(
            accounts
                .iter()
                .map(|account| Account {
                    id: format!("user-{}", account.role.as_str().to_lowercase().replace('_', "-")),
                    email: account.email.clone(),
                    role: account.role,
                    password: account.password.clone(),
                })
                .collect(),
        )
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn account(&self, user_id: &str) -> Option<&Account> {
        self.accounts.get(user_id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginGrant, WorkflowError> {
        let account = self
            .accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .filter(|account| account.password == password)
            .ok_or_else(|| {
                warn!(email = %email, "Rejected login with bad credentials");
                WorkflowError::Unauthenticated("invalid email or password".to_string())
            })?;

        let token = Uuid::new_v4().simple().to_string();
        self.tokens().insert(token.clone(), account.id.clone());
        info!(user_id = %account.id, role = %account.role, "Issued session token");

        Ok(LoginGrant {
            token,
            account: account.clone(),
            redirect: account.role.dashboard_path().to_string(),
        })
    }

    /// Returns whether the token was live
    pub fn logout(&self, token: &str) -> bool {
        self.tokens().remove(token).is_some()
    }

    pub fn resolve(&self, token: &str) -> Result<&Account, WorkflowError> {
        let user_id = self
            .tokens()
            .get(token)
            .cloned()
            .ok_or_else(|| WorkflowError::Unauthenticated("unknown or expired session".to_string()))?;
        self.account(&user_id)
            .ok_or_else(|| WorkflowError::Unauthenticated("session user no longer exists".to_string()))
    }

    pub fn live_sessions(&self) -> usize {
        self.tokens().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> AccountDirectory {
        AccountDirectory::from_config(&[
            AccountConfig::new(Role::Writer, "writer@test.local", "pw"),
            AccountConfig::new(Role::StoryManager, "story-manager@test.local", "pw"),
        ])
    }

    #[test]
    fn test_login_issues_distinct_tokens() {
        let directory = directory();
        let first = directory.login("writer@test.local", "pw").unwrap();
        let second = directory.login("WRITER@test.local", "pw").unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(first.redirect, "/dashboard/writer");
        assert_eq!(directory.resolve(&first.token).unwrap().role, Role::Writer);
        assert_eq!(directory.live_sessions(), 2);
    }

    #[test]
    fn test_bad_password_rejected() {
        let directory = directory();
        let error = directory.login("writer@test.local", "nope").unwrap_err();
        assert_eq!(error.code(), "unauthenticated");
    }

    #[test]
    fn test_logout_revokes_token() {
        let directory = directory();
        let grant = directory.login("story-manager@test.local", "pw").unwrap();
        assert!(directory.logout(&grant.token));
        assert!(directory.resolve(&grant.token).is_err());
        assert!(!directory.logout(&grant.token));
    }
}
