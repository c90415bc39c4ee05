//! Wait for launched instances to leave the pending state
//!
//! There is no timeout: an instance that never leaves
//! `pending` keeps the CLI waiting until the operator interrupts it.

use crate::cluster::ClusterSnapshot;
use crate::error::Result;
use clusterflow_cloud::{ComputeProvider, InstanceBatch};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Timing of the readiness wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Pause before the first query; new instances are not immediately describable
    pub settle_delay: Duration,
    /// Pause between two queries of a batch that still has pending instances
    pub poll_interval: Duration,
    /// Pause after every batch settled, for services on the nodes to boot
    pub grace_period: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(40),
        }
    }
}

impl ReadinessConfig {
    /// No pauses at all
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            grace_period: Duration::ZERO,
        }
    }
}

pub struct ReadinessPoller<'a> {
    provider: &'a dyn ComputeProvider,
    config: ReadinessConfig,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(provider: &'a dyn ComputeProvider, config: ReadinessConfig) -> Self {
        Self { provider, config }
    }

    /// Block until no instance of `batch` is pending, then refresh its view.
    /// Returns the number of poll intervals slept.
    pub async fn await_batch(&self, batch: &mut InstanceBatch) -> Result<usize> {
        let ids = batch.instance_ids();
        let mut rounds = 0;

        loop {
            let current = self.provider.describe_instances(&ids).await?;
            if !current.iter().any(|i| i.state.is_pending()) {
                break;
            }
            rounds += 1;
            debug!("Batch {} still pending (round {})", batch.id, rounds);
            sleep(self.config.poll_interval).await;
        }

        // One more read to pick up the final addresses
        let fresh = self.provider.describe_instances(&ids).await?;
        batch.refresh_from(&fresh);
        Ok(rounds)
    }

    /// Await each batch in the given order, one after another
    pub async fn await_ready(&self, batches: &mut [&mut InstanceBatch]) -> Result<usize> {
        let mut rounds = 0;
        for batch in batches.iter_mut() {
            rounds += self.await_batch(batch).await?;
        }
        Ok(rounds)
    }

    /// Wait for a whole cluster: settle, await primary, worker and coordinator
    /// batches, then the grace period
    pub async fn await_cluster(&self, snapshot: &mut ClusterSnapshot) -> Result<()> {
        info!("Waiting for instances to start up...");
        sleep(self.config.settle_delay).await;

        self.await_ready(&mut snapshot.batches_mut()).await?;

        info!(
            "Waiting {} more seconds...",
            self.config.grace_period.as_secs()
        );
        sleep(self.config.grace_period).await;
        Ok(())
    }
}
