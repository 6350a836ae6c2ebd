// Shared fixtures: a reference platform on an ephemeral port plus the
// harness pieces wired against it over real HTTP.

#![allow(dead_code)]

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use submission_flow::platform::server;
use submission_flow::{
    HarnessConfig, HttpPlatform, NewSubmission, RetryPolicy, Role, Session, SessionBroker,
    Verifier, WorkflowService,
};

pub struct TestPlatform {
    pub config: HarnessConfig,
    pub service: Arc<WorkflowService>,
    pub http: Arc<HttpPlatform>,
    pub broker: SessionBroker,
    pub base_url: String,
}

impl TestPlatform {
    pub async fn start() -> Self {
        Self::start_with(HarnessConfig::default()).await
    }

    pub async fn start_with(mut config: HarnessConfig) -> Self {
        let service = Arc::new(WorkflowService::from_config(&config));
        let (addr, _handle) = server::spawn(service.clone())
            .await
            .expect("failed to bind reference platform");
        let base_url = format!("http://{addr}");
        config.platform.base_url = base_url.clone();

        let http = Arc::new(
            HttpPlatform::new(&base_url, 1_000, Duration::from_secs(5), RetryPolicy::immediate(3))
                .expect("failed to build http client"),
        );
        let broker = SessionBroker::new(
            http.clone(),
            &config.accounts,
            RetryPolicy::immediate(3),
            Duration::from_secs(5),
        );

        Self {
            config,
            service,
            http,
            broker,
            base_url,
        }
    }

    pub async fn session(&self, role: Role) -> Session {
        self.broker
            .get_session(role)
            .await
            .unwrap_or_else(|e| panic!("no session for {role}: {e}"))
    }

    pub async fn verifier(&self) -> Verifier {
        Verifier::new(self.http.clone(), self.session(Role::Admin).await, Duration::from_millis(10))
    }

    /// Log every cached session out server-side
    pub async fn teardown(&self) {
        if let Err(e) = self.broker.close_all().await {
            eprintln!("teardown: {e}");
        }
        assert!(self.broker.cached_roles().await.is_empty());
    }
}

/// Start a platform, run `body` against it and tear its sessions down
/// even when `body` panics
pub async fn with_platform<F, Fut>(body: F)
where
    F: FnOnce(Arc<TestPlatform>) -> Fut,
    Fut: Future<Output = ()>,
{
    let platform = Arc::new(TestPlatform::start().await);
    let outcome = AssertUnwindSafe(body(platform.clone())).catch_unwind().await;
    platform.teardown().await;
    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }
}

pub fn story(title: &str) -> NewSubmission {
    NewSubmission {
        title: title.to_string(),
        content: "<p>Once upon a time there was a story worth telling.</p>".to_string(),
        summary: Some("Test summary".to_string()),
    }
}
