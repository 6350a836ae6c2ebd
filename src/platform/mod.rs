// Reference publishing platform: accounts, sessions and the workflow engine
// behind one handle, served over HTTP by `server`

pub mod directory;
pub mod server;

use std::sync::Arc;
use tracing::info;

use crate::config::HarnessConfig;
use crate::workflows::{ConflictPolicy, WorkflowDispatcher};
use directory::AccountDirectory;

pub use directory::{Account, LoginGrant};

#[derive(Debug)]
pub struct WorkflowService {
    dispatcher: WorkflowDispatcher,
}

impl WorkflowService {
    pub fn new(directory: AccountDirectory, conflict_policy: ConflictPolicy) -> Self {
        Self {
            dispatcher: WorkflowDispatcher::new(Arc::new(directory), conflict_policy),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        let directory = AccountDirectory::from_config(&config.accounts);
        info!(
            accounts = config.accounts.len(),
            conflict_policy = ?config.workflow.conflict_policy,
            "Seeded reference platform"
        );
        Self::new(directory, config.workflow.conflict_policy)
    }

    pub fn dispatcher(&self) -> &WorkflowDispatcher {
        &self.dispatcher
    }

    pub fn directory(&self) -> &AccountDirectory {
        self.dispatcher.directory()
    }
}
