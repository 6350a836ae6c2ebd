// Per-role session cache with isolated, retried authentication

use futures::future::join_all;
use futures::FutureExt;
use statig::prelude::*;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};

use super::lifecycle::{SessionSlot, SlotEvent, SlotPhase};
use super::{Authenticator, Session};
use crate::config::{AccountConfig, HarnessConfig};
use crate::retry::{with_timeout, RetryPolicy};
use crate::telemetry::{create_session_span, generate_correlation_id};
use crate::workflows::{Role, WorkflowError};

struct RoleSlot {
    lifecycle: StateMachine<SessionSlot>,
    session: Option<Session>,
}

pub struct SessionBroker {
    authenticator: Arc<dyn Authenticator>,
    accounts: HashMap<Role, AccountConfig>,
    slots: HashMap<Role, Mutex<RoleSlot>>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for SessionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBroker")
            .field("roles", &self.accounts.keys().collect::<Vec<_>>())
            .field("retry", &self.retry)
            .finish()
    }
}

impl SessionBroker {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        accounts: &[AccountConfig],
        retry: RetryPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        let accounts: HashMap<Role, AccountConfig> = accounts
            .iter()
            .map(|account| (account.role, account.clone()))
            .collect();
        let slots = accounts
            .keys()
            .map(|role| {
                let slot = RoleSlot {
                    lifecycle: SessionSlot::new(*role).state_machine(),
                    session: None,
                };
                (*role, Mutex::new(slot))
            })
            .collect();

        Self {
            authenticator,
            accounts,
            slots,
            retry,
            attempt_timeout,
        }
    }

    pub fn from_config(authenticator: Arc<dyn Authenticator>, config: &HarnessConfig) -> Self {
        Self::new(
            authenticator,
            &config.accounts,
            RetryPolicy::from(&config.retry),
            config.request_timeout(),
        )
    }

    fn slot(&self, role: Role) -> Result<&Mutex<RoleSlot>, WorkflowError> {
        self.slots.get(&role).ok_or_else(|| WorkflowError::AuthFailure {
            role,
            attempts: 0,
            reason: "no credentials configured for role".to_string(),
        })
    }

    /// Cached session for `role`, authenticating a fresh isolated one if needed
    pub async fn get_session(&self, role: Role) -> Result<Session, WorkflowError> {
        let slot = self.slot(role)?;
        let mut slot = slot.lock().await;
        if let Some(session) = &slot.session {
            debug!(role = %role, "Reusing cached session");
            return Ok(session.clone());
        }

        let account = self.accounts.get(&role).ok_or_else(|| WorkflowError::AuthFailure {
            role,
            attempts: 0,
            reason: "no credentials configured for role".to_string(),
        })?;

        let correlation_id = generate_correlation_id();
        let span = create_session_span("authenticate", role, Some(&correlation_id));
        slot.lifecycle.handle(&SlotEvent::BeginAuth);

        let attempts = AtomicU32::new(0);
        let outcome = self
            .retry
            .run_if(
                "authenticate",
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    self.attempt(account)
                },
                |error| error.is_retryable() || matches!(error, WorkflowError::AuthFailure { .. }),
            )
            .instrument(span)
            .await;
        let attempts = attempts.load(Ordering::SeqCst);

        match outcome {
            Ok(session) => {
                slot.lifecycle.handle(&SlotEvent::Authenticated { attempts });
                slot.session = Some(session.clone());
                Ok(session)
            }
            Err(error) => {
                let reason = match error {
                    WorkflowError::AuthFailure { reason, .. } => reason,
                    other => other.to_string(),
                };
                slot.lifecycle.handle(&SlotEvent::Exhausted {
                    attempts,
                    reason: reason.clone(),
                });
                Err(WorkflowError::AuthFailure { role, attempts, reason })
            }
        }
    }

    /// One bounded login attempt; a wrong landing page counts as a failure
    async fn attempt(&self, account: &AccountConfig) -> Result<Session, WorkflowError> {
        let session = with_timeout(
            "authenticate",
            self.attempt_timeout,
            self.authenticator.authenticate(account),
        )
        .await?;

        let expected = account.expected_landing();
        if session.landing != expected {
            if let Err(error) = self.authenticator.release(&session).await {
                debug!(role = %account.role, error = %error, "Could not release misrouted session");
            }
            return Err(WorkflowError::AuthFailure {
                role: account.role,
                attempts: 0,
                reason: format!("landed on '{}', expected '{expected}'", session.landing),
            });
        }
        Ok(session)
    }

    /// Release and evict the session for `role`; the slot is vacated even if
    /// the server-side logout fails
    pub async fn close_session(&self, role: Role) -> Result<(), WorkflowError> {
        let slot = self.slot(role)?;
        let mut slot = slot.lock().await;
        let Some(session) = slot.session.take() else {
            return Ok(());
        };
        slot.lifecycle.handle(&SlotEvent::Released);

        let span = create_session_span("release", role, None);
        let released = with_timeout(
            "release",
            self.attempt_timeout,
            self.authenticator.release(&session),
        )
        .instrument(span)
        .await;
        if let Err(error) = &released {
            warn!(role = %role, error = %error, "Server-side logout failed; session evicted anyway");
        }
        released
    }

    /// Authenticate several roles concurrently. Every attempt runs to
    /// completion; if any role fails, the sessions that did open are
    /// released again.
    pub async fn provision_all(&self, roles: &[Role]) -> Result<Vec<Session>, WorkflowError> {
        info!(roles = ?roles, "Provisioning sessions");
        let outcomes = join_all(roles.iter().map(|role| self.get_session(*role))).await;

        let mut sessions = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(session) => sessions.push(session),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        let Some(error) = first_error else {
            return Ok(sessions);
        };
        warn!(error = %error, opened = sessions.len(), "Provisioning failed, releasing opened sessions");
        for session in &sessions {
            if let Err(release_error) = self.close_session(session.role).await {
                debug!(role = %session.role, error = %release_error, "Release after failed provisioning");
            }
        }
        Err(error)
    }

    /// Close every cached session, reporting the first release failure
    pub async fn close_all(&self) -> Result<(), WorkflowError> {
        let results = join_all(self.slots.keys().map(|role| self.close_session(*role))).await;
        results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    /// Run `body` with sessions for `roles`, tearing every session down
    /// afterwards whether `body` succeeded, failed or panicked
    pub async fn with_sessions<F, Fut, T, E>(&self, roles: &[Role], body: F) -> Result<T, E>
    where
        F: FnOnce(Vec<Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<WorkflowError>,
    {
        let outcome = match self.provision_all(roles).await {
            Ok(sessions) => AssertUnwindSafe(body(sessions)).catch_unwind().await,
            Err(error) => Ok(Err(E::from(error))),
        };
        let teardown = self.close_all().await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => {
                if let Err(error) = &teardown {
                    warn!(error = %error, "Teardown after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        };
        let value = outcome?;
        teardown?;
        Ok(value)
    }

    pub async fn phase(&self, role: Role) -> Option<SlotPhase> {
        let slot = self.slots.get(&role)?;
        Some(slot.lock().await.lifecycle.inner().phase())
    }

    pub async fn cached_roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        for (role, slot) in &self.slots {
            if slot.lock().await.session.is_some() {
                roles.push(*role);
            }
        }
        roles.sort();
        roles
    }
}
