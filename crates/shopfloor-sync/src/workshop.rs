//! Wiring of cache, dispatcher, controller and actions for one client.

use std::sync::Arc;
use std::time::Duration;

use shopfloor_core::{Clock, Result, ShopfloorConfig, SyncConfig, SystemClock};

use crate::actions::JobActions;
use crate::cache::CacheStore;
use crate::dispatcher::Dispatcher;
use crate::execution::ExecutionController;
use crate::remote::{self, RemoteStore};
use crate::ticker::DisplayTicker;

/// Everything a client needs to read and change jobs.
pub struct Workshop {
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    execution: ExecutionController,
    actions: JobActions,
}

impl Workshop {
    /// Builds a workshop over an explicit remote store and clock.
    pub fn new(remote: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(remote, Arc::clone(&clock), config));
        Self {
            execution: ExecutionController::new(Arc::clone(&dispatcher), Arc::clone(&clock)),
            actions: JobActions::new(Arc::clone(&dispatcher), Arc::clone(&clock)),
            dispatcher,
            clock,
        }
    }

    /// Builds a workshop from configuration, using the system clock.
    ///
    /// # Errors
    /// Returns an error if the configured backend cannot be created.
    pub fn from_config(config: &ShopfloorConfig) -> Result<Self> {
        let remote = remote::connect(&config.backend, config.api_key())?;
        Ok(Self::new(remote, Arc::new(SystemClock), config.sync.clone()))
    }

    /// The dispatcher, for loading views and waiting on reconciliation.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The cache read by views.
    pub fn cache(&self) -> &Arc<CacheStore> {
        self.dispatcher.cache()
    }

    /// Task clock operations.
    pub fn execution(&self) -> &ExecutionController {
        &self.execution
    }

    /// Every other job, task and reminder action.
    pub fn actions(&self) -> &JobActions {
        &self.actions
    }

    /// The clock stamping every change.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Starts a display ticker on this workshop's clock.
    pub fn ticker(&self, period: Duration) -> DisplayTicker {
        DisplayTicker::spawn(Arc::clone(&self.clock), period)
    }
}
