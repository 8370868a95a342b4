//! Monitoring of remote export jobs

use std::time::{Duration, Instant};

use geoclass_cloud::{CloudError, JobReference, JobStatus, SessionProvider};
use geoclass_core::{Error, Result};

/// How often and for how long [`wait_for_job`] polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(60 * 60)),
        }
    }
}

/// Poll `job` until it completes.
///
/// `on_poll` sees every status returned by the backend. A failed job is an
/// error; it is never resubmitted.
pub fn wait_for_job(
    session: &dyn SessionProvider,
    job: &JobReference,
    options: WaitOptions,
    mut on_poll: impl FnMut(&JobStatus),
) -> Result<()> {
    let started = Instant::now();
    loop {
        let status = session.job_status(job)?;
        tracing::debug!(job = %job.id, status = %status, "polled export job");
        on_poll(&status);

        match status {
            JobStatus::Completed => {
                tracing::info!(job = %job.id, destination = %job.destination, elapsed = ?started.elapsed(), "export completed");
                return Ok(());
            }
            JobStatus::Failed { reason } => {
                return Err(CloudError::JobFailed {
                    job: job.id.clone(),
                    reason,
                }
                .into())
            }
            JobStatus::Pending | JobStatus::Running => {}
        }

        if let Some(limit) = options.timeout {
            if started.elapsed() + options.poll_interval > limit {
                return Err(Error::BackendTimeout {
                    operation: format!("waiting for job {}", job.id),
                    timeout: limit,
                });
            }
        }
        std::thread::sleep(options.poll_interval);
    }
}

/// Ask the backend to stop `job`. It may keep running for a while.
pub fn cancel_job(session: &dyn SessionProvider, job: &JobReference) -> Result<()> {
    session.cancel(job)?;
    tracing::info!(job = %job.id, "cancel requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoclass_cloud::{AssetHandle, ExportOptions, InMemorySession};

    fn quick() -> WaitOptions {
        WaitOptions {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    fn submit(session: &InMemorySession) -> JobReference {
        session.add_image("users/me/lc", vec![("b1", vec![1, 2])], None);
        session
            .export(&AssetHandle::new("users/me/lc"), "users/me/copy", &ExportOptions::table("copy"))
            .unwrap()
    }

    #[test]
    fn test_wait_until_completed() {
        let session = InMemorySession::new();
        let job = submit(&session);
        let mut seen = Vec::new();
        wait_for_job(&session, &job, quick(), |s| seen.push(s.clone())).unwrap();
        assert_eq!(seen, vec![JobStatus::Running, JobStatus::Completed]);
        assert!(session.contains("users/me/copy"));
    }

    #[test]
    fn test_failed_job_is_an_error() {
        let session = InMemorySession::new();
        session.fail_next_export("quota exceeded");
        let job = submit(&session);
        let err = wait_for_job(&session, &job, quick(), |_| {}).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_cancelled_job_fails() {
        let session = InMemorySession::new();
        let job = submit(&session);
        cancel_job(&session, &job).unwrap();
        assert!(wait_for_job(&session, &job, quick(), |_| {}).is_err());
        assert!(!session.contains("users/me/copy"));
    }

    #[test]
    fn test_zero_timeout() {
        let session = InMemorySession::new();
        let job = submit(&session);
        let options = WaitOptions {
            poll_interval: Duration::from_millis(10),
            timeout: Some(Duration::ZERO),
        };
        let err = wait_for_job(&session, &job, options, |_| {}).unwrap_err();
        assert!(matches!(err, Error::BackendTimeout { .. }));
    }
}
