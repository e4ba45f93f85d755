//! Interval scheduler for unattended per-account fetches.
//!
//! Each scheduled account gets one background task that runs the ingest
//! pipeline on a fixed interval. The job table is guarded by a single mutex
//! and the scheduler is owned by the application state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use super::account_service::AccountService;
use super::error::{ensure_range, ServiceResult};
use super::ingest_service::IngestService;
use crate::domain::{Account, AccountId, EmailRecord};
use crate::providers::email::{GmailProvider, MailSource};

/// Bounds for an explicitly requested interval, in minutes.
pub const SCHEDULE_INTERVAL_RANGE: (i64, i64) = (5, 1440);

/// Builds the mail source a scheduled fetch reads from.
pub trait AccountSourceFactory: Send + Sync {
    fn source_for(&self, account: &Account) -> Arc<dyn MailSource>;
}

/// Gmail source built from the account's stored tokens.
#[derive(Debug, Clone)]
pub struct GmailSourceFactory {
    timeout: Duration,
}

impl GmailSourceFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl AccountSourceFactory for GmailSourceFactory {
    fn source_for(&self, account: &Account) -> Arc<dyn MailSource> {
        Arc::new(GmailProvider::from_account(account).with_timeout(self.timeout))
    }
}

/// Public view of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub account_id: AccountId,
    pub interval_minutes: u32,
    pub next_run: DateTime<Utc>,
    pub trigger: String,
}

/// Job id for an account.
pub fn job_id(account_id: AccountId) -> String {
    format!("fetch_account_{account_id}")
}

/// Human-readable trigger, e.g. `interval[0:15:00]`.
pub fn describe_interval(minutes: u32) -> String {
    format!("interval[{}:{:02}:00]", minutes / 60, minutes % 60)
}

struct Job {
    interval_minutes: u32,
    next_run: Arc<StdMutex<DateTime<Utc>>>,
    handle: JoinHandle<()>,
}

impl Job {
    fn info(&self, account_id: AccountId) -> JobInfo {
        let next_run = self
            .next_run
            .lock()
            .map(|at| *at)
            .unwrap_or_else(|poisoned| *poisoned.into_inner());
        JobInfo {
            id: job_id(account_id),
            account_id,
            interval_minutes: self.interval_minutes,
            next_run,
            trigger: describe_interval(self.interval_minutes),
        }
    }
}

/// Shared pieces a job task needs on every tick.
struct JobContext {
    accounts: AccountService,
    ingest: IngestService,
    sources: Arc<dyn AccountSourceFactory>,
    max_results: u32,
}

impl JobContext {
    async fn run(&self, account_id: AccountId) -> ServiceResult<Vec<EmailRecord>> {
        let account = self.accounts.get(account_id).await?;
        let source = self.sources.source_for(&account);
        self.ingest
            .ingest(source.as_ref(), Some(account_id), self.max_results)
            .await
    }
}

/// Background interval scheduler.
pub struct Scheduler {
    context: Arc<JobContext>,
    jobs: Mutex<HashMap<AccountId, Job>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        accounts: AccountService,
        ingest: IngestService,
        sources: Arc<dyn AccountSourceFactory>,
        max_results: u32,
    ) -> Self {
        Self {
            context: Arc::new(JobContext {
                accounts,
                ingest,
                sources,
                max_results,
            }),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Schedules every active, fetch-enabled account at its own interval.
    ///
    /// Existing jobs for those accounts are replaced.
    pub async fn start_all(&self) -> ServiceResult<Vec<JobInfo>> {
        let accounts = self.context.accounts.list(true).await?;
        let mut jobs = self.jobs.lock().await;
        for account in accounts.iter().filter(|a| a.is_schedulable()) {
            self.schedule_locked(&mut jobs, account.id, account.fetch_interval_minutes);
        }
        info!(active_jobs = jobs.len(), "Scheduler started");
        Ok(sorted_infos(&jobs))
    }

    /// Schedules one account, replacing any existing job for it.
    pub async fn add_account(
        &self,
        account_id: AccountId,
        interval_minutes: u32,
    ) -> ServiceResult<(Account, JobInfo)> {
        let (min, max) = SCHEDULE_INTERVAL_RANGE;
        ensure_range("interval_minutes", interval_minutes as i64, min, max)?;
        let account = self.context.accounts.get(account_id).await?;

        let mut jobs = self.jobs.lock().await;
        let info = self.schedule_locked(&mut jobs, account_id, interval_minutes);
        Ok((account, info))
    }

    /// Removes an account's job. Returns whether one existed.
    pub async fn remove_account(&self, account_id: AccountId) -> bool {
        let removed = self.jobs.lock().await.remove(&account_id);
        match removed {
            Some(job) => {
                job.handle.abort();
                info!(job_id = %job_id(account_id), "Removed fetch schedule");
                true
            }
            None => false,
        }
    }

    /// Lists scheduled jobs ordered by account.
    pub async fn jobs(&self) -> Vec<JobInfo> {
        sorted_infos(&*self.jobs.lock().await)
    }

    /// Runs one fetch for an account immediately.
    pub async fn run_now(&self, account_id: AccountId) -> ServiceResult<Vec<EmailRecord>> {
        self.context.run(account_id).await
    }

    /// Aborts every job.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (_, job) in jobs.drain() {
            job.handle.abort();
        }
        info!("Scheduler shutdown");
    }

    fn schedule_locked(
        &self,
        jobs: &mut HashMap<AccountId, Job>,
        account_id: AccountId,
        interval_minutes: u32,
    ) -> JobInfo {
        if let Some(previous) = jobs.remove(&account_id) {
            previous.handle.abort();
        }

        let period = Duration::from_secs(u64::from(interval_minutes.max(1)) * 60);
        let next_run = Arc::new(StdMutex::new(Utc::now() + period_delta(period)));
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.context),
            account_id,
            period,
            Arc::clone(&next_run),
        ));

        let job = Job {
            interval_minutes,
            next_run,
            handle,
        };
        let info = job.info(account_id);
        jobs.insert(account_id, job);
        info!(job_id = %info.id, interval_minutes, "Scheduled email fetch");
        info
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.handle.abort();
        }
    }
}

fn period_delta(period: Duration) -> chrono::Duration {
    chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::minutes(1))
}

fn sorted_infos(jobs: &HashMap<AccountId, Job>) -> Vec<JobInfo> {
    let mut infos: Vec<JobInfo> = jobs.iter().map(|(id, job)| job.info(*id)).collect();
    infos.sort_by_key(|info| info.account_id);
    infos
}

async fn run_job(
    context: Arc<JobContext>,
    account_id: AccountId,
    period: Duration,
    next_run: Arc<StdMutex<DateTime<Utc>>>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Ok(mut at) = next_run.lock() {
            *at = Utc::now() + period_delta(period);
        }

        info!(account_id = %account_id, "Running scheduled fetch");
        match context.run(account_id).await {
            Ok(records) => {
                info!(account_id = %account_id, count = records.len(), "Scheduled fetch stored emails")
            }
            Err(e) => error!(account_id = %account_id, error = %e, "Scheduled fetch failed"),
        }
    }
}
