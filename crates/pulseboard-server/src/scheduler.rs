//! Background scheduler for feed reloads.
//!
//! Drives the [`FeedLoader`](crate::FeedLoader) with a periodic tick and
//! forwards reload commands from request handlers and SIGHUP. A manual
//! refresh starts a cooldown; failures stretch the next tick with exponential
//! backoff but never cause an immediate retry.

use std::future::Future;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::loader::LoadTrigger;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between reloads.
    pub sync_interval: Duration,
    /// Jitter added to each tick, as a fraction of the interval (0.0-1.0).
    pub jitter_fraction: f64,
    /// Non-forced refreshes inside this window after a refresh are dropped.
    pub refresh_cooldown: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(300),
            jitter_fraction: 0.1,
            refresh_cooldown: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl SchedulerConfig {
    pub fn new(sync_interval: Duration) -> Self {
        Self {
            sync_interval,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// The regular tick delay: the interval plus or minus jitter.
    pub fn next_sync_delay(&self) -> Duration {
        let base = self.sync_interval.as_secs_f64();
        Duration::from_secs_f64((base + jitter(base * self.jitter_fraction)).max(0.0))
    }

    /// Delay after `failures` consecutive failed reloads, capped at `max_backoff`.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// A value in `[-range, range]` taken from the clock's sub-second part.
fn jitter(range: f64) -> f64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (f64::from(nanos) / 1e9 * 2.0 - 1.0) * range
}

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Reload now, ignoring the cooldown (SIGHUP).
    SyncNow,
    /// Manual refresh; respects the cooldown unless `force`.
    Refresh { force: bool },
    Stop,
}

/// What the loop remembers between reloads.
#[derive(Debug, Default)]
struct History {
    consecutive_failures: u32,
    last_refresh: Option<Instant>,
}

impl History {
    fn in_cooldown(&self, cooldown: Duration) -> bool {
        self.last_refresh
            .is_some_and(|at| at.elapsed() < cooldown)
    }

    fn next_delay(&self, config: &SchedulerConfig) -> Duration {
        if self.consecutive_failures > 0 {
            return config
                .backoff_delay(self.consecutive_failures)
                .max(config.next_sync_delay());
        }
        config.next_sync_delay()
    }
}

/// Periodic reload driver.
pub struct Scheduler {
    config: SchedulerConfig,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: Option<mpsc::Receiver<SchedulerCommand>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Runs until [`SchedulerHandle::stop`] or every handle is dropped.
    ///
    /// `load` receives the trigger and whether the load is forced, and
    /// returns an error message on failure. The first load runs immediately.
    pub async fn run<F, Fut>(mut self, load: F)
    where
        F: Fn(LoadTrigger, bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send,
    {
        let Some(mut command_rx) = self.command_rx.take() else {
            error!("Scheduler already running");
            return;
        };
        // Keep only handles alive, so dropping them all ends the loop.
        drop(self.command_tx);

        info!(
            interval_secs = self.config.sync_interval.as_secs(),
            "Scheduler started"
        );

        let mut history = History::default();
        reload(&load, &mut history, LoadTrigger::Startup, false).await;

        loop {
            let delay = history.next_delay(&self.config);
            debug!(delay_secs = delay.as_secs(), "Next reload scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    reload(&load, &mut history, LoadTrigger::Tick, false).await;
                }
                command = command_rx.recv() => match command {
                    Some(SchedulerCommand::SyncNow) => {
                        reload(&load, &mut history, LoadTrigger::Refresh, false).await;
                    }
                    Some(SchedulerCommand::Refresh { force }) => {
                        if !force && history.in_cooldown(self.config.refresh_cooldown) {
                            debug!("Refresh dropped during cooldown");
                            continue;
                        }
                        history.last_refresh = Some(Instant::now());
                        reload(&load, &mut history, LoadTrigger::Refresh, force).await;
                    }
                    Some(SchedulerCommand::Stop) | None => {
                        info!("Scheduler stopping");
                        break;
                    }
                },
            }
        }
    }
}

async fn reload<F, Fut>(load: &F, history: &mut History, trigger: LoadTrigger, force: bool)
where
    F: Fn(LoadTrigger, bool) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    match load(trigger, force).await {
        Ok(()) => history.consecutive_failures = 0,
        Err(e) => {
            history.consecutive_failures = history.consecutive_failures.saturating_add(1);
            warn!(
                %trigger,
                failures = history.consecutive_failures,
                error = %e,
                "Reload failed"
            );
        }
    }
}

/// Sends commands to a running [`Scheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    pub async fn sync_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::SyncNow).await
    }

    pub async fn refresh(
        &self,
        force: bool,
    ) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx
            .send(SchedulerCommand::Refresh { force })
            .await
    }

    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }
}
