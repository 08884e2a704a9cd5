use std::{collections::HashMap, future::Future, sync::Arc};

use anyhow::Result;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{error, info};

use crate::{
    config::Config,
    export::Exporter,
    netatmo::{AccessToken, MeasureApi},
    station::{FetchMode, Station},
};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan {
    pub device_names: Vec<String>,

    pub mode: FetchMode,
}

pub fn plan_retry(failed: &[String], decision: RetryDecision) -> Option<RetryPlan> {
    if failed.is_empty() || decision == RetryDecision::Skip {
        return None;
    }

    Some(RetryPlan {
        device_names: failed.to_vec(),
        mode: FetchMode::FullHistory,
    })
}

#[derive(Debug)]
pub struct PassReport {
    pub stations: Vec<Station>,

    pub failed: Vec<String>,
}

#[derive(Debug)]
pub struct FleetReport {
    pub stations: Vec<Station>,

    pub first_pass_failed: Vec<String>,

    /// `None` when no retry pass ran.
    pub retry_failed: Option<Vec<String>>,
}

impl FleetReport {
    pub fn failed(&self) -> &[String] {
        self.retry_failed
            .as_deref()
            .unwrap_or(&self.first_pass_failed)
    }

    pub fn advance_checkpoints(&mut self, config: &mut Config) -> Result<()> {
        for station in &mut self.stations {
            station.advance_checkpoint(config)?;
        }
        Ok(())
    }
}

pub struct Fleet<A: ?Sized> {
    api: Arc<A>,
    token: AccessToken,
    exporter: Exporter,
    concurrency: usize,
}

impl<A> Fleet<A>
where
    A: MeasureApi + ?Sized + 'static,
{
    pub fn new(api: Arc<A>, token: AccessToken, exporter: Exporter, concurrency: usize) -> Self {
        Self {
            api,
            token,
            exporter,
            concurrency: concurrency.clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    pub async fn run_pass(&self, stations: Vec<Station>, mode: FetchMode) -> PassReport {
        let names: Vec<String> = stations.iter().map(|s| s.name().to_string()).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, mut station) in stations.into_iter().enumerate() {
            let api = Arc::clone(&self.api);
            let token = self.token.clone();
            let exporter = self.exporter.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let ok = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        station
                            .retrieve_and_export(&*api, &token, mode, &exporter)
                            .await
                    }
                    Err(_) => false,
                };
                (index, station, ok)
            });
        }

        let mut finished = Vec::with_capacity(names.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => finished.push(result),
                Err(e) => error!("device task failed: {e}"),
            }
        }
        finished.sort_by_key(|(index, _, _)| *index);

        let mut ok_by_index: HashMap<usize, bool> = HashMap::new();
        let mut stations = Vec::with_capacity(finished.len());
        for (index, station, ok) in finished {
            ok_by_index.insert(index, ok);
            stations.push(station);
        }

        // a station whose task panicked is gone and counts as failed
        let failed = names
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !ok_by_index.get(index).copied().unwrap_or(false))
            .map(|(_, name)| name)
            .collect();

        PassReport { stations, failed }
    }

    /// Runs the first pass and, when `decide` agrees, a full-history pass for the failures.
    pub async fn run<F, Fut>(&self, stations: Vec<Station>, decide: F) -> FleetReport
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = RetryDecision>,
    {
        let order: HashMap<String, usize> = stations
            .iter()
            .enumerate()
            .map(|(index, s)| (s.name().to_string(), index))
            .collect();

        let first = self.run_pass(stations, FetchMode::Incremental).await;
        info!(failed = first.failed.len(), "first pass finished");

        if first.failed.is_empty() {
            return FleetReport {
                stations: first.stations,
                first_pass_failed: first.failed,
                retry_failed: None,
            };
        }

        let decision = decide(first.failed.clone()).await;
        let Some(plan) = plan_retry(&first.failed, decision) else {
            return FleetReport {
                stations: first.stations,
                first_pass_failed: first.failed,
                retry_failed: None,
            };
        };

        let (retry, mut stations): (Vec<Station>, Vec<Station>) = first
            .stations
            .into_iter()
            .partition(|s| plan.device_names.iter().any(|name| name == s.name()));

        // devices lost to a panicked task have no station left to retry
        let lost: Vec<String> = plan
            .device_names
            .iter()
            .filter(|name| !retry.iter().any(|s| s.name() == name.as_str()))
            .cloned()
            .collect();

        info!(devices = ?plan.device_names, "retrying without a begin timestamp");
        let second = self.run_pass(retry, plan.mode).await;

        let position = |name: &str| order.get(name).copied().unwrap_or(usize::MAX);

        stations.extend(second.stations);
        stations.sort_by_key(|s| position(s.name()));

        let mut retry_failed = second.failed;
        retry_failed.extend(lost);
        retry_failed.sort_by_key(|name| position(name.as_str()));

        FleetReport {
            stations,
            first_pass_failed: first.failed,
            retry_failed: Some(retry_failed),
        }
    }
}
