// Multi-actor session management for the e2e harness

pub mod broker;
pub mod lifecycle;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::AccountConfig;
use crate::workflows::{Role, WorkflowError};

pub use broker::SessionBroker;
pub use lifecycle::{SessionSlot, SlotEvent, SlotPhase};

/// One authenticated actor. Sessions never share HTTP state with each other.
#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    pub user_id: String,
    pub email: String,
    pub token: String,
    /// Where the platform sent the actor after login
    pub landing: String,
    pub opened_at: DateTime<Utc>,
    http: Option<reqwest::Client>,
}

impl Session {
    pub fn new(role: Role, user_id: String, email: String, token: String, landing: String) -> Self {
        Self {
            role,
            user_id,
            email,
            token,
            landing,
            opened_at: Utc::now(),
            http: None,
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn http_client(&self) -> Option<&reqwest::Client> {
        self.http.as_ref()
    }
}

/// Turns configured credentials into a live session and back
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, account: &AccountConfig) -> Result<Session, WorkflowError>;

    /// Server-side logout
    async fn release(&self, session: &Session) -> Result<(), WorkflowError>;
}
