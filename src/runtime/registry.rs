use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc;

use crate::model::features::ContextFeatures;
use crate::model::observation::Observation;
use crate::model::order::MarketConditions;

/// One tick's worth of pipeline input, fanned out to symbol workers.
#[derive(Debug, Clone)]
pub struct TickEvent {
    pub observation: Observation,
    pub features: ContextFeatures,
    pub market: MarketConditions,
    pub external_prior: Option<Vec<f64>>,
}

#[derive(Default)]
pub struct PipelineWorkerRegistry {
    workers: HashMap<String, PipelineWorkerHandle>,
    workers_by_symbol: HashMap<String, BTreeSet<String>>,
}

struct PipelineWorkerHandle {
    symbol: String,
    tick_tx: mpsc::Sender<TickEvent>,
}

impl PipelineWorkerRegistry {
    pub fn register(
        &mut self,
        worker_id: impl Into<String>,
        symbol: impl Into<String>,
        tick_tx: mpsc::Sender<TickEvent>,
    ) {
        let worker_id = worker_id.into();
        let symbol = symbol.into().to_ascii_uppercase();

        if let Some(existing) = self.workers.remove(&worker_id) {
            if let Some(ids) = self.workers_by_symbol.get_mut(&existing.symbol) {
                ids.remove(&worker_id);
                if ids.is_empty() {
                    self.workers_by_symbol.remove(&existing.symbol);
                }
            }
        }

        self.workers.insert(
            worker_id.clone(),
            PipelineWorkerHandle {
                symbol: symbol.clone(),
                tick_tx,
            },
        );
        self.workers_by_symbol
            .entry(symbol)
            .or_default()
            .insert(worker_id);
    }

    pub fn unregister(&mut self, worker_id: &str) {
        let Some(existing) = self.workers.remove(worker_id) else {
            return;
        };
        if let Some(ids) = self.workers_by_symbol.get_mut(&existing.symbol) {
            ids.remove(worker_id);
            if ids.is_empty() {
                self.workers_by_symbol.remove(&existing.symbol);
            }
        }
    }

    /// Fan a tick out to every worker on its symbol. Uses `try_send` so a
    /// stalled worker drops the event instead of blocking the feed; state
    /// estimation going stale is worse than one skipped decision.
    pub fn dispatch_tick(&self, symbol: &str, event: TickEvent) {
        let key = symbol.to_ascii_uppercase();
        let Some(worker_ids) = self.workers_by_symbol.get(&key) else {
            return;
        };

        for worker_id in worker_ids {
            if let Some(worker) = self.workers.get(worker_id) {
                if worker.tick_tx.try_send(event.clone()).is_err() {
                    tracing::warn!(
                        worker = %worker_id,
                        symbol = %key,
                        "Worker queue full, dropping tick"
                    );
                }
            }
        }
    }

    /// Worker ids for the symbol in deterministic lexical order.
    pub fn worker_ids_for_symbol(&self, symbol: &str) -> Vec<String> {
        let key = symbol.trim().to_ascii_uppercase();
        self.workers_by_symbol
            .get(&key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}
