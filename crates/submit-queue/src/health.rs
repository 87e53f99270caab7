//! Rolling stability history of the tracked CI jobs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Stability of every tracked job in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthRecord {
    pub time: DateTime<Utc>,
    pub stable_jobs: usize,
    pub total_jobs: usize,
    pub jobs: BTreeMap<String, bool>,
}

impl HealthRecord {
    pub fn new(time: DateTime<Utc>, jobs: BTreeMap<String, bool>) -> Self {
        Self {
            time,
            stable_jobs: jobs.values().filter(|stable| **stable).count(),
            total_jobs: jobs.len(),
            jobs,
        }
    }

    /// Every tracked job was stable
    pub fn is_stable(&self) -> bool {
        self.stable_jobs == self.total_jobs
    }
}

/// Cumulative counters plus the records inside the retention window
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub start_time: DateTime<Utc>,
    pub total_loops: u64,
    pub num_stable: u64,
    pub num_stable_per_job: BTreeMap<String, u64>,
    records: Vec<HealthRecord>,
    #[serde(skip)]
    retention: Duration,
}

impl Health {
    pub fn new(start_time: DateTime<Utc>, retention: Duration) -> Self {
        Self {
            start_time,
            total_loops: 0,
            num_stable: 0,
            num_stable_per_job: BTreeMap::new(),
            records: Vec::new(),
            retention,
        }
    }

    /// Count one cycle and drop records older than the retention window
    pub fn update(&mut self, record: HealthRecord, now: DateTime<Utc>) {
        self.total_loops += 1;
        if record.is_stable() {
            self.num_stable += 1;
        }
        for (job, stable) in &record.jobs {
            let count = self.num_stable_per_job.entry(job.clone()).or_insert(0);
            if *stable {
                *count += 1;
            }
        }
        self.records.push(record);

        let cutoff = now - self.retention;
        self.records.retain(|r| r.time >= cutoff);
    }

    /// Records inside the retention window, oldest first
    pub fn records(&self) -> &[HealthRecord] {
        &self.records
    }

    /// Share of the windowed cycles in which every job was stable
    pub fn stable_ratio(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let stable = self.records.iter().filter(|r| r.is_stable()).count();
        Some(stable as f64 / self.records.len() as f64)
    }
}
