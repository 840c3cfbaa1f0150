use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PollSettings;
use crate::content::ContentKind;

/// Status line and size of a probed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub status: u16,
    pub content_length: Option<u64>,
}

impl ProbeReport {
    /// The backend answers missing files with a small JSON body and status 200,
    /// so only a body larger than `min_content_length` counts as the artifact.
    pub fn is_ready(&self, min_content_length: u64) -> bool {
        self.status == 200
            && self
                .content_length
                .is_some_and(|len| len > min_content_length)
    }
}

#[async_trait]
pub trait ArtifactProbe: Send + Sync {
    async fn probe(&self, filename: &str) -> anyhow::Result<ProbeReport>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub backoff: f64,
    pub max_interval: Duration,
    pub timeout: Duration,
    pub min_content_length: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollPolicy {
    fn from(settings: &PollSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            interval: Duration::from_millis(settings.interval_ms),
            backoff: settings.backoff,
            max_interval: Duration::from_millis(settings.max_interval_ms),
            timeout: Duration::from_secs(settings.timeout_secs),
            min_content_length: settings.min_content_length,
        }
    }
}

impl PollPolicy {
    /// Grows `current` by the backoff factor; anything that overflows caps at
    /// `max_interval`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff.max(1.0))
            .map_or(self.max_interval, |next| next.min(self.max_interval))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready {
        report: ProbeReport,
        attempts: u32,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
    },
    Cancelled {
        attempts: u32,
    },
}

impl PollOutcome {
    pub fn into_result(self, filename: &str) -> anyhow::Result<ProbeReport> {
        match self {
            PollOutcome::Ready { report, .. } => Ok(report),
            PollOutcome::TimedOut { attempts, elapsed } => anyhow::bail!(
                "timed out waiting for {filename} after {attempts} probe(s) in {}s",
                elapsed.as_secs()
            ),
            PollOutcome::Cancelled { .. } => anyhow::bail!("stopped waiting for {filename}"),
        }
    }
}

/// Waits for a deferred job's output file to appear on the backend.
pub struct JobPoller<'a, P: ?Sized> {
    probe: &'a P,
    policy: PollPolicy,
}

impl<'a, P> JobPoller<'a, P>
where
    P: ArtifactProbe + ?Sized,
{
    pub fn new(probe: &'a P, policy: PollPolicy) -> Self {
        Self { probe, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Probes `filename` until it is ready, the timeout passes, or `cancel` fires.
    ///
    /// Probe failures (404s, refused connections) count as "not ready yet".
    pub async fn wait_for(
        &self,
        filename: &str,
        kind: ContentKind,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let started = Instant::now();
        let deadline = after(started, self.policy.timeout);
        let mut delay = self.policy.initial_delay;
        let mut interval = self.policy.interval;
        let mut attempts = 0u32;

        tracing::info!(
            kind = %kind,
            filename,
            timeout_secs = self.policy.timeout.as_secs(),
            "waiting for deferred job"
        );

        loop {
            let wake = after(Instant::now(), delay).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(kind = %kind, filename, attempts, "poll cancelled");
                    return PollOutcome::Cancelled { attempts };
                }
                _ = tokio::time::sleep_until(wake) => {}
            }

            attempts += 1;
            let probed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(kind = %kind, filename, attempts, "poll cancelled");
                    return PollOutcome::Cancelled { attempts };
                }
                probed = tokio::time::timeout_at(deadline, self.probe.probe(filename)) => probed,
            };

            match probed {
                Ok(Ok(report)) if report.is_ready(self.policy.min_content_length) => {
                    tracing::info!(
                        kind = %kind,
                        filename,
                        attempts,
                        bytes = report.content_length,
                        "deferred job ready"
                    );
                    return PollOutcome::Ready { report, attempts };
                }
                Ok(Ok(report)) => {
                    tracing::debug!(
                        filename,
                        attempt = attempts,
                        status = report.status,
                        bytes = report.content_length,
                        "not ready yet"
                    );
                }
                Ok(Err(err)) => {
                    tracing::debug!(filename, attempt = attempts, ?err, "probe failed; retrying");
                }
                Err(_) => {}
            }

            if Instant::now() >= deadline {
                let elapsed = started.elapsed();
                tracing::warn!(kind = %kind, filename, attempts, ?elapsed, "poll timed out");
                return PollOutcome::TimedOut { attempts, elapsed };
            }

            delay = interval;
            interval = self.policy.next_interval(interval);
        }
    }
}

/// `start + wait`, saturating at roughly thirty years out.
fn after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .unwrap_or_else(|| start + Duration::from_secs(86_400 * 365 * 30))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedProbe {
        script: Mutex<VecDeque<anyhow::Result<ProbeReport>>>,
        fallback: ProbeReport,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: Vec<anyhow::Result<ProbeReport>>, fallback: ProbeReport) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactProbe for ScriptedProbe {
        async fn probe(&self, _filename: &str) -> anyhow::Result<ProbeReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or(Ok(self.fallback))
        }
    }

    fn report(status: u16, len: Option<u64>) -> ProbeReport {
        ProbeReport {
            status,
            content_length: len,
        }
    }

    fn policy(timeout_secs: u64) -> PollPolicy {
        PollPolicy {
            timeout: Duration::from_secs(timeout_secs),
            ..PollPolicy::default()
        }
    }

    #[test]
    fn readiness_requires_200_and_real_size() {
        assert!(report(200, Some(5_000)).is_ready(1024));
        assert!(!report(200, Some(1024)).is_ready(1024));
        assert!(!report(200, Some(0)).is_ready(1024));
        assert!(!report(200, None).is_ready(1024));
        assert!(!report(404, Some(5_000)).is_ready(1024));
    }

    #[test]
    fn backoff_grows_then_caps() {
        let policy = PollPolicy::default();
        let second = policy.next_interval(Duration::from_secs(3));
        assert_eq!(second, Duration::from_millis(4_500));
        assert_eq!(
            policy.next_interval(Duration::from_secs(25)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn backoff_overflow_caps_instead_of_panicking() {
        let policy = PollPolicy {
            backoff: 1e300,
            ..PollPolicy::default()
        };
        assert_eq!(
            policy.next_interval(Duration::from_secs(3)),
            policy.max_interval
        );
        let policy = PollPolicy {
            backoff: f64::NAN,
            ..PollPolicy::default()
        };
        assert_eq!(
            policy.next_interval(Duration::from_secs(3)),
            Duration::from_secs(3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn huge_waits_park_instead_of_panicking() {
        let probe = ScriptedProbe::new(Vec::new(), report(200, Some(4_096)));
        let poller = JobPoller::new(
            &probe,
            PollPolicy {
                timeout: Duration::from_secs(u64::MAX),
                initial_delay: Duration::MAX,
                ..PollPolicy::default()
            },
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            poller.wait_for("Video_a.mp4", ContentKind::Video, &CancellationToken::new()),
        )
        .await;
        // The first probe is parked far in the future rather than panicking.
        assert!(outcome.is_err());
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_first_ready_probe() {
        let probe = ScriptedProbe::new(
            vec![
                Ok(report(404, Some(22))),
                Ok(report(200, Some(40))),
                Ok(report(200, Some(250_000))),
            ],
            report(200, Some(250_000)),
        );
        let poller = JobPoller::new(&probe, policy(600));
        let started = Instant::now();

        let outcome = poller
            .wait_for("Video_a.mp4", ContentKind::Video, &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            PollOutcome::Ready {
                report: report(200, Some(250_000)),
                attempts: 3
            }
        );
        assert_eq!(probe.calls(), 3);
        // 2s initial delay, then 3s, then 4.5s.
        assert_eq!(started.elapsed(), Duration::from_millis(9_500));
    }

    #[tokio::test(start_paused = true)]
    async fn placeholder_files_never_count_as_ready() {
        let probe = ScriptedProbe::new(Vec::new(), report(200, Some(45)));
        let poller = JobPoller::new(&probe, policy(60));

        let outcome = poller
            .wait_for("Video_a.mp4", ContentKind::Video, &CancellationToken::new())
            .await;

        let PollOutcome::TimedOut { attempts, elapsed } = outcome else {
            panic!("expected timeout, got {outcome:?}");
        };
        assert!(attempts > 1);
        assert_eq!(attempts as usize, probe.calls());
        assert!(elapsed >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_are_retried() {
        let probe = ScriptedProbe::new(
            vec![
                Err(anyhow::anyhow!("connection refused")),
                Err(anyhow::anyhow!("connection refused")),
            ],
            report(200, Some(4_096)),
        );
        let poller = JobPoller::new(&probe, policy(600));

        let outcome = poller
            .wait_for("Plan_a_0.pdf", ContentKind::Plan, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, PollOutcome::Ready { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let probe = ScriptedProbe::new(Vec::new(), report(404, None));
        let poller = JobPoller::new(&probe, policy(600));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            trigger.cancel();
        });

        let outcome = poller
            .wait_for("Video_a.mp4", ContentKind::Video, &cancel)
            .await;

        // Probes at 2s and 5s, cancelled before the 9.5s probe.
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 2 });
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_short_circuits() {
        let probe = ScriptedProbe::new(Vec::new(), report(200, Some(10_000)));
        let poller = JobPoller::new(&probe, policy(600));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller
            .wait_for("Video_a.mp4", ContentKind::Video, &cancel)
            .await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 0 });
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn outcome_errors_name_the_file() {
        let err = PollOutcome::TimedOut {
            attempts: 4,
            elapsed: Duration::from_secs(60),
        }
        .into_result("Video_a.mp4")
        .unwrap_err();
        assert!(err.to_string().contains("Video_a.mp4"));
    }
}
