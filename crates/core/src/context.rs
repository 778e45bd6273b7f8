//! Composition root: one coordinator per collection plus the shared config.

use log::warn;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{ConfigSource, SharedConfigStore};
use crate::records::{ExpenseBody, LimitBody, SavingBody, SpecialDateBody};
use crate::settings::SyncSettings;
use crate::sync::{ConnectionMode, RecordSyncCoordinator, SyncPorts};

/// Startup handles returned by [`SyncContext::initialize_all`].
pub struct StartupHandles {
    pub config: JoinHandle<ConfigSource>,
    pub expenses: JoinHandle<ConnectionMode>,
    pub savings: JoinHandle<ConnectionMode>,
    pub limits: JoinHandle<ConnectionMode>,
    pub special_dates: JoinHandle<ConnectionMode>,
}

pub struct SyncContext {
    pub settings: SyncSettings,
    pub shared_config: Arc<SharedConfigStore>,
    pub expenses: RecordSyncCoordinator<ExpenseBody>,
    pub savings: RecordSyncCoordinator<SavingBody>,
    pub limits: RecordSyncCoordinator<LimitBody>,
    pub special_dates: RecordSyncCoordinator<SpecialDateBody>,
}

impl SyncContext {
    pub fn new(ports: SyncPorts, settings: SyncSettings) -> Self {
        let shared_config = Arc::new(SharedConfigStore::new(
            settings.partition.clone(),
            ports.clone(),
        ));
        Self {
            expenses: RecordSyncCoordinator::new(
                ports.clone(),
                Arc::clone(&shared_config),
                settings.clone(),
            ),
            savings: RecordSyncCoordinator::new(
                ports.clone(),
                Arc::clone(&shared_config),
                settings.clone(),
            ),
            limits: RecordSyncCoordinator::new(
                ports.clone(),
                Arc::clone(&shared_config),
                settings.clone(),
            ),
            special_dates: RecordSyncCoordinator::new(
                ports,
                Arc::clone(&shared_config),
                settings.clone(),
            ),
            shared_config,
            settings,
        }
    }

    pub fn shared_config(&self) -> Arc<SharedConfigStore> {
        Arc::clone(&self.shared_config)
    }

    pub fn expenses(&self) -> RecordSyncCoordinator<ExpenseBody> {
        self.expenses.clone()
    }

    pub fn savings(&self) -> RecordSyncCoordinator<SavingBody> {
        self.savings.clone()
    }

    pub fn limits(&self) -> RecordSyncCoordinator<LimitBody> {
        self.limits.clone()
    }

    pub fn special_dates(&self) -> RecordSyncCoordinator<SpecialDateBody> {
        self.special_dates.clone()
    }

    /// Load every backup synchronously, then start the remote phase of each
    /// collection and of the shared config in the background. The config is
    /// loaded once and then followed live.
    pub fn initialize_all(&self) -> StartupHandles {
        self.shared_config.load_backup();
        let config = self.shared_config();
        StartupHandles {
            config: tokio::spawn(async move {
                let source = config.load().await;
                if let Err(err) = config.subscribe().await {
                    warn!("[SharedConfig] Live updates unavailable: {}", err);
                }
                source
            }),
            expenses: self.expenses.initialize(),
            savings: self.savings.initialize(),
            limits: self.limits.initialize(),
            special_dates: self.special_dates.initialize(),
        }
    }
}
