//! Background re-admission of the re-push queue.

use {
    crate::txpool::TransactionPool,
    log::*,
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{self, Builder, JoinHandle},
        time::Duration,
    },
};

pub const DEFAULT_REPUSH_IDLE_SLEEP: Duration = Duration::from_millis(50);

pub struct RepushService {
    thread_hdl: JoinHandle<()>,
}

impl RepushService {
    pub fn new(pool: Arc<TransactionPool>, idle_sleep: Duration, exit: Arc<AtomicBool>) -> Self {
        let thread_hdl = Builder::new()
            .name("strRepush".to_string())
            .spawn(move || {
                info!("repush service started");
                while !exit.load(Ordering::Relaxed) {
                    if !pool.repush_one() {
                        thread::sleep(idle_sleep);
                    }
                }
                info!("repush service stopped");
            })
            .unwrap();
        Self { thread_hdl }
    }

    pub fn join(self) -> thread::Result<()> {
        self.thread_hdl.join()
    }
}
