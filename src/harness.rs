//! Small runner for timing placement workloads from the command line.
//!
//! A [`TestCase`] validates itself once, then runs either inline or on a
//! number of threads that all execute the same case. Process CPU time and
//! wall-clock time of the timed section are reported with the thread and
//! iteration counts.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use cpu_time::ProcessTime;
use log::{error, info};

/// `--key value` pairs given to a case.
pub type Params = HashMap<String, String>;

pub trait TestCase: Sync {
    /// Check the case produces correct output before it is timed.
    fn validate(&self) -> Result<bool>;

    /// One timed run: every iteration of the workload.
    fn run(&self) -> Result<()>;

    /// Threads to run on concurrently; 0 runs on the calling thread.
    fn threads(&self) -> usize;

    fn iterations(&self) -> usize;
}

/// Collect `--key value` and `-key value` pairs. A value is any argument
/// not starting with `-` that follows an argument that does; lone flags
/// and stray values are ignored.
pub fn collect_params<I, S>(args: I) -> Params
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = Params::new();
    let mut previous: Option<String> = None;
    for arg in args {
        let arg = arg.as_ref();
        if !arg.is_empty() && !arg.starts_with('-') {
            if let Some(key) = previous
                .as_deref()
                .filter(|p| p.starts_with('-'))
                .map(|p| p.trim_start_matches('-'))
                && !key.is_empty()
            {
                params.insert(key.to_string(), arg.to_string());
            }
        }
        previous = Some(arg.to_string());
    }
    params
}

/// Typed lookup with a fallback for missing keys.
pub fn param<T>(params: &Params, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match params.get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err| anyhow!("invalid value {raw:?} for --{key}: {err}")),
        None => Ok(default),
    }
}

/// Time spent in the timed section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// CPU time of the whole process, summed over every thread.
    pub cpu: Duration,
    pub wall: Duration,
}

struct Clock {
    cpu: ProcessTime,
    wall: Instant,
}

impl Clock {
    fn start() -> Result<Self> {
        Ok(Self {
            cpu: ProcessTime::try_now().context("failed to read process CPU time")?,
            wall: Instant::now(),
        })
    }

    fn stop(self) -> Result<Timing> {
        Ok(Timing {
            cpu: self
                .cpu
                .try_elapsed()
                .context("failed to read process CPU time")?,
            wall: self.wall.elapsed(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub timing: Timing,
    pub threads: usize,
    pub iterations: usize,
}

/// Time one run of `case`, on its configured number of threads. Workers
/// are spawned before the clocks start and wait until they have.
pub fn measure<C: TestCase + ?Sized>(case: &C) -> Result<Timing> {
    let threads = case.threads();
    if threads == 0 {
        let clock = Clock::start()?;
        case.run()?;
        return clock.stop();
    }
    let gate = Barrier::new(threads + 1);
    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    gate.wait();
                    case.run()
                })
            })
            .collect();
        let clock = Clock::start();
        gate.wait();
        let clock = clock?;
        for (idx, worker) in workers.into_iter().enumerate() {
            worker
                .join()
                .map_err(|_| anyhow!("worker thread {idx} panicked"))?
                .with_context(|| format!("worker thread {idx} failed"))?;
        }
        clock.stop()
    })
}

fn execute<C: TestCase + ?Sized>(case: &C, name: &str) -> Result<Option<Report>> {
    if !case.validate()? {
        return Ok(None);
    }
    let report = Report {
        timing: measure(case)?,
        threads: case.threads(),
        iterations: case.iterations(),
    };
    info!(
        case = name,
        cpu_millis = report.timing.cpu.as_millis() as u64,
        wall_millis = report.timing.wall.as_millis() as u64,
        threads = report.threads,
        iterations = report.iterations;
        "Benchmark finished"
    );
    Ok(Some(report))
}

/// Validate and time `case`, printing
/// `name: <cpu ms>ms cpu <wall ms>ms wall t:<threads> i:<iterations>`.
///
/// Returns the process exit status: 0 on success, -1 when validation fails
/// or the case errors or panics.
pub fn run_case<C: TestCase + ?Sized>(case: &C, name: &str) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(|| execute(case, name))) {
        Ok(Ok(Some(report))) => {
            eprintln!(
                "{name}: {}ms cpu {}ms wall t:{} i:{}",
                report.timing.cpu.as_millis(),
                report.timing.wall.as_millis(),
                report.threads,
                report.iterations
            );
            0
        }
        Ok(Ok(None)) => {
            error!(case = name; "Test did not validate");
            eprintln!("test did not validate: {name}");
            -1
        }
        Ok(Err(err)) => {
            error!(case = name; "Test runner did not complete: {err:#}");
            eprintln!("test runner did not complete: {err:#}");
            -1
        }
        Err(_) => {
            error!(case = name; "Test runner panicked");
            eprintln!("test runner did not complete: panic");
            -1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        valid: bool,
        threads: usize,
        runs: AtomicUsize,
    }

    impl Counting {
        fn new(valid: bool, threads: usize) -> Self {
            Self {
                valid,
                threads,
                runs: AtomicUsize::new(0),
            }
        }
    }

    impl TestCase for Counting {
        fn validate(&self) -> Result<bool> {
            Ok(self.valid)
        }

        fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn threads(&self) -> usize {
            self.threads
        }

        fn iterations(&self) -> usize {
            1
        }
    }

    // Burns CPU on every worker for a fixed stretch of wall time.
    struct Spinning {
        threads: usize,
    }

    impl TestCase for Spinning {
        fn validate(&self) -> Result<bool> {
            Ok(true)
        }

        fn run(&self) -> Result<()> {
            let start = Instant::now();
            let mut acc = 0u64;
            while start.elapsed() < Duration::from_millis(30) {
                acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(7));
            }
            Ok(())
        }

        fn threads(&self) -> usize {
            self.threads
        }

        fn iterations(&self) -> usize {
            1
        }
    }

    struct Failing;

    impl TestCase for Failing {
        fn validate(&self) -> Result<bool> {
            Ok(true)
        }

        fn run(&self) -> Result<()> {
            panic!("boom")
        }

        fn threads(&self) -> usize {
            0
        }

        fn iterations(&self) -> usize {
            1
        }
    }

    #[test]
    fn params_pair_flags_with_values() {
        let params = collect_params(["--features", "500", "-mode", "line", "--verbose", "--x"]);
        assert_eq!(params.get("features").map(String::as_str), Some("500"));
        assert_eq!(params.get("mode").map(String::as_str), Some("line"));
        assert!(!params.contains_key("verbose"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn stray_values_are_ignored() {
        let params = collect_params(["value", "--a", "1", "2"]);
        assert_eq!(params.len(), 1);
        assert_eq!(params["a"], "1");
    }

    #[test]
    fn typed_param_falls_back_and_reports_bad_input() {
        let params = collect_params(["--n", "abc"]);
        assert_eq!(param(&params, "missing", 7usize).unwrap(), 7);
        assert!(param::<usize>(&params, "n", 0).is_err());
    }

    #[test]
    fn runs_once_per_thread() {
        let case = Counting::new(true, 4);
        assert_eq!(run_case(&case, "count"), 0);
        assert_eq!(case.runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn zero_threads_runs_inline() {
        let case = Counting::new(true, 0);
        assert_eq!(run_case(&case, "inline"), 0);
        assert_eq!(case.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_validation_skips_the_run() {
        let case = Counting::new(false, 2);
        assert_eq!(run_case(&case, "invalid"), -1);
        assert_eq!(case.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn busy_case_reports_cpu_time() {
        for threads in [0, 2] {
            let timing = measure(&Spinning { threads }).unwrap();
            assert!(timing.wall >= Duration::from_millis(30));
            assert!(timing.cpu >= Duration::from_millis(10), "{timing:?}");
        }
    }

    #[test]
    fn worker_errors_propagate_from_measure() {
        struct Erroring;
        impl TestCase for Erroring {
            fn validate(&self) -> Result<bool> {
                Ok(true)
            }
            fn run(&self) -> Result<()> {
                Err(anyhow!("no fonts"))
            }
            fn threads(&self) -> usize {
                3
            }
            fn iterations(&self) -> usize {
                1
            }
        }
        let err = measure(&Erroring).unwrap_err();
        assert!(format!("{err:#}").contains("no fonts"));
    }

    #[test]
    fn panicking_case_reports_failure() {
        assert_eq!(run_case(&Failing, "panics"), -1);
    }
}
