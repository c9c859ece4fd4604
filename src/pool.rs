//! Fixed-size worker pool for batch fan-out

use crate::{PrsError, PrsResult};
use std::sync::mpsc;
use std::sync::Arc;

/// Worker pool that runs submitted tasks and streams their results back.
///
/// Tasks run on OS threads but share nothing mutable: each scoring task opens
/// its own variant-file handle and reads configuration through an `Arc`.
/// Results only reach the caller through the channel.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> PrsResult<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("prs-worker-{}", i))
            .panic_handler(|_| log::error!("A worker panicked; its batch result is lost"))
            .build()
            .map_err(|e| PrsError::Configuration(format!("Failed to build worker pool: {}", e)))?;

        Ok(WorkerPool { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Submit every task and hand each result to `collect` as soon as it arrives.
    ///
    /// Results arrive in completion order, tagged with the task's submission
    /// index. `collect` runs on the calling thread only. An error from
    /// `collect` stops collection; tasks still queued run but their results
    /// are dropped.
    pub fn run<T, R, F, C>(&self, tasks: Vec<T>, work: F, mut collect: C) -> PrsResult<()>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
        C: FnMut(usize, R) -> PrsResult<()>,
    {
        let submitted = tasks.len();
        let work = Arc::new(work);
        let (tx, rx) = mpsc::channel();

        for (index, task) in tasks.into_iter().enumerate() {
            let tx = tx.clone();
            let work = Arc::clone(&work);
            self.pool.spawn(move || {
                let _ = tx.send((index, work(task)));
            });
        }
        drop(tx);

        let mut received = 0;
        for (index, result) in rx {
            received += 1;
            collect(index, result)?;
        }

        if received != submitted {
            return Err(PrsError::Computation(format!(
                "{} of {} worker tasks did not return a result",
                submitted - received,
                submitted
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_collects_every_result() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.workers(), 3);

        let mut seen = vec![None; 10];
        pool.run(
            (0..10u64).collect(),
            |x| x * x,
            |index, value| {
                seen[index] = Some(value);
                Ok(())
            },
        )
        .unwrap();

        let expected: Vec<_> = (0..10u64).map(|x| Some(x * x)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_run_single_worker() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.workers(), 1);

        let mut sum = 0;
        pool.run(vec![1, 2, 3], |x: i32| x + 1, |_, v| {
            sum += v;
            Ok(())
        })
        .unwrap();
        assert_eq!(sum, 9);
    }

    #[test]
    fn test_run_stops_on_collect_error() {
        let pool = WorkerPool::new(2).unwrap();
        let mut collected = 0;
        let result = pool.run(vec![1, 2, 3, 4], |x: i32| x, |_, _| {
            collected += 1;
            Err(PrsError::Format("stop".to_string()))
        });
        assert!(matches!(result, Err(PrsError::Format(_))));
        assert_eq!(collected, 1);
    }

    #[test]
    fn test_run_reports_lost_results() {
        let pool = WorkerPool::new(2).unwrap();
        let mut collected = Vec::new();
        let result = pool.run(
            vec![1, 2, 3],
            |x: i32| {
                if x == 2 {
                    panic!("task {} failed", x);
                }
                x
            },
            |_, v| {
                collected.push(v);
                Ok(())
            },
        );

        assert!(matches!(result, Err(PrsError::Computation(msg)) if msg.starts_with("1 of 3")));
        collected.sort();
        assert_eq!(collected, vec![1, 3]);
    }

    #[test]
    fn test_run_no_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        pool.run(Vec::<u8>::new(), |x| x, |_, _| Ok(())).unwrap();
    }
}
