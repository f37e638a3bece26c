//! Polling of an uploaded file until its analysis completes.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Polling{n} --progress == 100--> Done
//! Polling{n} --progress < 100, n < budget--> (sleep) Polling{n + 1}
//! Polling{n} --progress < 100, n == budget--> TimedOut
//! Polling{n} --malformed body / transport error--> Failed
//! ```
//!
//! Waiting goes through a [`Sleeper`] so tests run without real delays.

use std::time::Duration;

use tracing::{debug, info};

use crate::api::{decode, PollResponse};
use crate::error::{Result, ScanError, Stage};
use crate::transport::{HttpResponse, Transport};
use crate::verdict::{ScanVerdict, VerdictSource};

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);

    /// Total time spent in [`Sleeper::sleep`].
    fn elapsed(&self) -> Duration;
}

/// Blocks the current thread.
#[derive(Debug, Default)]
pub struct ThreadSleeper {
    slept: Duration,
}

impl ThreadSleeper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
        self.slept += duration;
    }

    fn elapsed(&self) -> Duration {
        self.slept
    }
}

/// Records requested waits without blocking. Elapsed time is the sum of them.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    pub sleeps: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }

    fn elapsed(&self) -> Duration {
        self.sleeps.iter().sum()
    }
}

#[derive(Debug)]
pub enum PollState {
    Polling { attempt: u32 },
    Done(ScanVerdict),
    TimedOut { attempts: u32 },
    Failed(ScanError),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling { .. })
    }
}

/// Outcome of one poll response.
#[derive(Debug)]
enum Progress {
    Running(f64),
    Complete(ScanVerdict),
}

pub struct Poller<'a, T: Transport, S: Sleeper> {
    transport: &'a T,
    data_id: &'a str,
    interval: Duration,
    max_attempts: u32,
    sleeper: &'a mut S,
}

impl<'a, T: Transport, S: Sleeper> Poller<'a, T, S> {
    pub fn new(
        transport: &'a T,
        data_id: &'a str,
        interval: Duration,
        max_attempts: u32,
        sleeper: &'a mut S,
    ) -> Self {
        Self {
            transport,
            data_id,
            interval,
            max_attempts: max_attempts.max(1),
            sleeper,
        }
    }

    /// Advance by one transition. Terminal states are returned unchanged.
    pub fn step(&mut self, state: PollState) -> PollState {
        let PollState::Polling { attempt } = state else {
            return state;
        };

        let progress = self
            .transport
            .get(Stage::Poll, &format!("file/{}", self.data_id))
            .and_then(|resp| classify(&resp, self.data_id));

        match progress {
            Ok(Progress::Complete(verdict)) => {
                info!(data_id = self.data_id, attempt, "analysis complete");
                PollState::Done(verdict)
            }
            Ok(Progress::Running(pct)) if attempt >= self.max_attempts => {
                debug!(data_id = self.data_id, attempt, pct, "attempt budget exhausted");
                PollState::TimedOut { attempts: attempt }
            }
            Ok(Progress::Running(pct)) => {
                info!(
                    data_id = self.data_id,
                    attempt,
                    "analysis {pct:.0}% complete, retrying in {}s",
                    self.interval.as_secs()
                );
                self.sleeper.sleep(self.interval);
                PollState::Polling {
                    attempt: attempt + 1,
                }
            }
            Err(e) => PollState::Failed(e),
        }
    }

    pub fn run(mut self) -> Result<ScanVerdict> {
        let mut state = PollState::Polling { attempt: 1 };
        while !state.is_terminal() {
            state = self.step(state);
        }
        match state {
            PollState::Done(verdict) => Ok(verdict),
            PollState::TimedOut { attempts } => Err(ScanError::Timeout {
                attempts,
                waited: self.sleeper.elapsed(),
            }),
            PollState::Failed(e) => Err(e),
            PollState::Polling { .. } => unreachable!("loop exits only on terminal states"),
        }
    }
}

fn classify(resp: &HttpResponse, data_id: &str) -> Result<Progress> {
    let malformed = |msg: String| ScanError::transport(Stage::Poll, msg);

    let parsed: Result<PollResponse> = decode(Stage::Poll, &resp.body);
    if !resp.is_success() {
        let detail = match parsed.ok().and_then(|p| p.error) {
            Some(err) => err.to_string(),
            None => resp.excerpt().to_string(),
        };
        return Err(malformed(format!("HTTP {}: {detail}", resp.status)));
    }

    let parsed = parsed?;
    if let Some(err) = parsed.error {
        return Err(malformed(format!("service reported an error: {err}")));
    }
    let results = parsed
        .scan_results
        .ok_or_else(|| malformed("response has no scan_results".into()))?;
    let pct = results
        .progress_percentage
        .ok_or_else(|| malformed("response has no progress_percentage".into()))?;

    if !(0.0..=100.0).contains(&pct) {
        return Err(malformed(format!("progress_percentage out of range: {pct}")));
    }
    if pct < 100.0 {
        return Ok(Progress::Running(pct));
    }

    let source = VerdictSource::Analysis {
        data_id: data_id.to_string(),
    };
    ScanVerdict::from_results(results, parsed.file_info, source)
        .map(Progress::Complete)
        .ok_or_else(|| malformed("analysis complete but scan_details missing".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct Scripted {
        responses: RefCell<VecDeque<HttpResponse>>,
        paths: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(bodies: &[&str]) -> Self {
            Self {
                responses: RefCell::new(bodies.iter().map(|b| HttpResponse::new(200, *b)).collect()),
                paths: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.paths.borrow().len()
        }
    }

    impl Transport for Scripted {
        fn get(&self, _stage: Stage, path: &str) -> Result<HttpResponse> {
            self.paths.borrow_mut().push(path.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| ScanError::transport(Stage::Poll, "script exhausted"))
        }

        fn post_file(&self, _: &str, _: &str, _: Vec<u8>) -> Result<HttpResponse> {
            unreachable!("poller never uploads")
        }
    }

    const RUNNING: &str = r#"{"scan_results":{"progress_percentage":40}}"#;
    const DONE: &str = r#"{"scan_results":{"progress_percentage":100,"scan_all_result_a":"No Threat Detected","scan_details":{"EngineX":{"threat_found":"","scan_time":12,"scan_result_i":0,"def_time":"2020-01-01"}}}}"#;

    fn run(transport: &Scripted, sleeper: &mut RecordingSleeper) -> Result<ScanVerdict> {
        Poller::new(transport, "job1", Duration::from_secs(10), 6, sleeper).run()
    }

    #[test]
    fn completes_on_first_attempt_without_sleeping() {
        let transport = Scripted::new(&[DONE]);
        let mut sleeper = RecordingSleeper::default();
        let verdict = run(&transport, &mut sleeper).unwrap();

        assert_eq!(verdict.engines.len(), 1);
        assert_eq!(verdict.overall.as_deref(), Some("No Threat Detected"));
        assert_eq!(
            verdict.source,
            VerdictSource::Analysis {
                data_id: "job1".into()
            }
        );
        assert!(sleeper.sleeps.is_empty());
        assert_eq!(transport.paths.borrow().as_slice(), ["file/job1"]);
    }

    #[test]
    fn completes_on_last_attempt() {
        let transport = Scripted::new(&[RUNNING, RUNNING, RUNNING, RUNNING, RUNNING, DONE]);
        let mut sleeper = RecordingSleeper::default();
        assert!(run(&transport, &mut sleeper).is_ok());
        assert_eq!(sleeper.sleeps.len(), 5);
        assert_eq!(transport.calls(), 6);
    }

    #[test]
    fn times_out_after_budget() {
        let transport = Scripted::new(&[RUNNING; 8]);
        let mut sleeper = RecordingSleeper::default();
        let err = run(&transport, &mut sleeper).unwrap_err();

        match err {
            ScanError::Timeout { attempts, waited } => {
                assert_eq!(attempts, 6);
                assert_eq!(waited, Duration::from_secs(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(transport.calls(), 6);
        assert!(sleeper.sleeps.iter().all(|d| *d == Duration::from_secs(10)));
    }

    #[test]
    fn progress_just_below_complete_keeps_polling() {
        let transport = Scripted::new(&[
            r#"{"scan_results":{"progress_percentage":99.9,"scan_details":{}}}"#,
            DONE,
        ]);
        let mut sleeper = RecordingSleeper::default();
        let verdict = run(&transport, &mut sleeper).unwrap();
        assert!(verdict.engines.contains_key("EngineX"));
        assert_eq!(sleeper.sleeps.len(), 1);
    }

    #[test]
    fn malformed_body_fails_immediately() {
        let transport = Scripted::new(&["not json", DONE]);
        let mut sleeper = RecordingSleeper::default();
        let err = run(&transport, &mut sleeper).unwrap_err();
        assert!(matches!(err, ScanError::Transport { stage: Stage::Poll, .. }));
        assert_eq!(transport.calls(), 1);
        assert!(sleeper.sleeps.is_empty());
    }

    #[test]
    fn missing_progress_is_malformed() {
        let transport = Scripted::new(&[r#"{"scan_results":{}}"#]);
        let mut sleeper = RecordingSleeper::default();
        assert!(matches!(
            run(&transport, &mut sleeper),
            Err(ScanError::Transport { .. })
        ));
    }

    #[test]
    fn complete_without_details_is_malformed() {
        let transport = Scripted::new(&[r#"{"scan_results":{"progress_percentage":100}}"#]);
        let mut sleeper = RecordingSleeper::default();
        let err = run(&transport, &mut sleeper).unwrap_err();
        assert!(err.to_string().contains("scan_details missing"));
    }

    #[test]
    fn error_status_fails() {
        let transport = Scripted {
            responses: RefCell::new(VecDeque::from([HttpResponse::new(
                401,
                r#"{"error":{"code":401006,"messages":["Invalid apikey"]}}"#,
            )])),
            paths: RefCell::new(Vec::new()),
        };
        let mut sleeper = RecordingSleeper::default();
        let err = run(&transport, &mut sleeper).unwrap_err();
        assert!(err.to_string().contains("HTTP 401"));
        assert!(err.to_string().contains("Invalid apikey"));
    }

    #[test]
    fn out_of_range_progress_is_malformed() {
        for body in [
            r#"{"scan_results":{"progress_percentage":-1}}"#,
            r#"{"scan_results":{"progress_percentage":150}}"#,
        ] {
            let transport = Scripted::new(&[body, DONE]);
            let mut sleeper = RecordingSleeper::default();
            let err = run(&transport, &mut sleeper).unwrap_err();
            assert!(err.to_string().contains("out of range"), "{err}");
            assert_eq!(transport.calls(), 1);
            assert!(sleeper.sleeps.is_empty());
        }
    }

    #[test]
    fn thread_sleeper_counts_only_time_slept() {
        let mut sleeper = ThreadSleeper::new();
        assert_eq!(sleeper.elapsed(), Duration::ZERO);
        sleeper.sleep(Duration::from_millis(1));
        sleeper.sleep(Duration::from_millis(2));
        assert_eq!(sleeper.elapsed(), Duration::from_millis(3));
    }

    #[test]
    fn timeout_reports_slept_time_with_thread_sleeper() {
        let transport = Scripted::new(&[RUNNING; 3]);
        let mut sleeper = ThreadSleeper::new();
        let err = Poller::new(&transport, "job1", Duration::from_millis(1), 3, &mut sleeper)
            .run()
            .unwrap_err();
        match err {
            ScanError::Timeout { attempts, waited } => {
                assert_eq!(attempts, 3);
                assert_eq!(waited, Duration::from_millis(2));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn step_leaves_terminal_state_alone() {
        let transport = Scripted::new(&[]);
        let mut sleeper = RecordingSleeper::default();
        let mut poller = Poller::new(&transport, "job1", Duration::from_secs(1), 3, &mut sleeper);
        let state = poller.step(PollState::TimedOut { attempts: 3 });
        assert!(matches!(state, PollState::TimedOut { attempts: 3 }));
        assert_eq!(transport.calls(), 0);
    }
}
