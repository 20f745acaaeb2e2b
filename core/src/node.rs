//! Assembles a ledger, its pool and the background services from a
//! [`NodeConfig`].

use {
    crate::{manager::Manager, node_config::NodeConfig, repush_service::RepushService},
    log::*,
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    },
    strata_ledger::{consensus::ConsensusSchedule, genesis_config::GenesisConfig, Ledger},
    strata_perf::SignatureEngine,
    strata_runtime::{
        actuator::{ActuatorRegistry, ResourceProcessor},
        transaction_processor::TransactionProcessor,
        trigger::TriggerSink,
    },
    strata_versioned_store::Persistence,
};

/// The implementations the ledger calls into.
pub struct Collaborators {
    pub actuators: ActuatorRegistry,
    pub resources: Arc<dyn ResourceProcessor>,
    pub consensus: Arc<dyn ConsensusSchedule>,
    pub signature_engine: Arc<dyn SignatureEngine>,
    pub trigger_sink: Option<Arc<dyn TriggerSink>>,
}

pub struct Node {
    manager: Arc<Manager>,
    repush_service: RepushService,
    exit: Arc<AtomicBool>,
    shutdown_flush_window: Duration,
}

impl Node {
    pub fn new(
        config: &NodeConfig,
        genesis: &GenesisConfig,
        backend: Arc<dyn Persistence>,
        collaborators: Collaborators,
    ) -> strata_ledger::Result<Self> {
        let exit = Arc::new(AtomicBool::new(false));
        let processor = Arc::new(TransactionProcessor::new(
            config.processor_config(),
            collaborators.actuators,
            collaborators.resources,
            collaborators.signature_engine,
            Arc::new(config.status_cache()),
        ));
        let ledger = Arc::new(Ledger::new(
            config.ledger_config(),
            genesis,
            backend,
            processor,
            collaborators.consensus,
            collaborators.trigger_sink,
            exit.clone(),
        )?);
        let manager = Arc::new(Manager::new(ledger, config.pool_config()));
        let repush_service = RepushService::new(
            manager.pool().clone(),
            config.repush_idle_sleep(),
            exit.clone(),
        );
        info!("node started at {}", manager.ledger().head());
        Ok(Self {
            manager,
            repush_service,
            exit,
            shutdown_flush_window: config.shutdown_flush_window(),
        })
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn exit(&self) -> &Arc<AtomicBool> {
        &self.exit
    }

    /// Stops the background services and flushes the ledger.
    pub fn close(self) -> strata_ledger::Result<()> {
        self.exit.store(true, Ordering::Relaxed);
        let ledger = self.manager.ledger();
        ledger.set_shutdown_deadline(Some(Instant::now() + self.shutdown_flush_window));
        if self.repush_service.join().is_err() {
            error!("repush service panicked");
        }
        ledger.shutdown()
    }
}
