//! Aggregate download progress across the jobs of one attempt

/// Snapshot reported to the notification channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// In `[0, 1]`; never lower than any earlier snapshot of the attempt
    pub fraction: f64,
    /// Bytes received by jobs whose total is known
    pub received: u64,
    /// Sum of the known totals
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct JobProgress {
    received: u64,
    total: Option<u64>,
}

/// Tracks bytes per job and turns them into a monotonic fraction
///
/// Jobs whose total is still unknown contribute nothing until it is known.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    jobs: Vec<JobProgress>,
    last_fraction: f64,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(job_count: usize) -> Self {
        Self {
            jobs: vec![JobProgress::default(); job_count],
            last_fraction: 0.0,
        }
    }

    /// Record a progress report; unknown job indices are ignored
    pub fn update(&mut self, job: usize, received: u64, total: Option<u64>) -> ProgressSnapshot {
        if let Some(entry) = self.jobs.get_mut(job) {
            entry.received = entry.received.max(received);
            if total.is_some() {
                entry.total = total;
            }
        }
        self.snapshot()
    }

    /// Record a finished job; a job that never learned its total uses the
    /// received size
    pub fn complete(&mut self, job: usize, bytes: u64) -> ProgressSnapshot {
        if let Some(entry) = self.jobs.get_mut(job) {
            entry.received = bytes;
            entry.total = Some(entry.total.unwrap_or(bytes).max(bytes));
        }
        self.snapshot()
    }

    #[must_use]
    pub fn fraction(&self) -> f64 {
        self.last_fraction
    }

    fn snapshot(&mut self) -> ProgressSnapshot {
        let (received, total) = self
            .jobs
            .iter()
            .filter_map(|job| job.total.map(|total| (job.received.min(total), total)))
            .fold((0u64, 0u64), |(r, t), (received, total)| {
                (r.saturating_add(received), t.saturating_add(total))
            });

        #[allow(clippy::cast_precision_loss)]
        let computed = if total == 0 {
            0.0
        } else {
            received as f64 / total as f64
        };
        self.last_fraction = computed.clamp(0.0, 1.0).max(self.last_fraction);

        ProgressSnapshot {
            fraction: self.last_fraction,
            received,
            total,
        }
    }
}
