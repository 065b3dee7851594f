//! Bounded-concurrency windowed task runner.
//!
//! The runner keeps a fixed-size window of tasks in flight against a lazy
//! work source. Whenever any task completes, the coordinating thread handles
//! the result and immediately submits exactly one replacement, so the window
//! stays full until the source is exhausted. This is a strict replenishment
//! policy, not a batch model: one completion, one submission.
//!
//! Worker threads execute the task function and report back over a bounded
//! channel; the coordinator blocks on first-completion waits and is the only
//! thread that touches the source, the handler, and any state they capture.

use std::thread;

use crossbeam_channel::bounded;

use crate::error::{EngineError, PipelineError, PipelineResult};

/// Generic bounded-concurrency executor.
///
/// All three pipeline phases run through the same runner with a different
/// source/task/handler policy plugged in.
#[derive(Debug, Clone, Copy)]
pub struct WindowRunner {
    width: usize,
}

impl WindowRunner {
    /// Creates a runner with the given window width (clamped to at least 1).
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Configured window width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Drives the source to exhaustion with never more than `width` tasks in
    /// flight, returning the number of successfully handled completions.
    ///
    /// - `source` lazily produces the next work item; it runs only on the
    ///   coordinating thread and may fail (fatal).
    /// - `task` executes one item on a worker thread.
    /// - `on_complete` handles each `(item, result)` pair on the coordinating
    ///   thread. Returning `Some(item)` enqueues a derived item that takes
    ///   priority over the source as the replacement submission; this is the
    ///   extension point the redo phase uses to grow work from results.
    ///
    /// On the first task, source, or handler error the runner stops
    /// submitting, lets in-flight tasks finish naturally, tears the window
    /// down, and returns that error. Completions that arrive after the error
    /// are discarded.
    ///
    /// # Errors
    /// The first error raised by the task function, the source, the handler,
    /// or the channel plumbing.
    pub fn run<I, R, S, T, H>(
        &self,
        mut source: S,
        task: T,
        mut on_complete: H,
    ) -> PipelineResult<u64>
    where
        I: Send,
        R: Send,
        S: FnMut() -> PipelineResult<Option<I>>,
        T: Fn(&I) -> Result<R, EngineError> + Sync,
        H: FnMut(I, R) -> PipelineResult<Option<I>>,
    {
        let (job_tx, job_rx) = bounded::<I>(self.width);
        let (done_tx, done_rx) = bounded::<(I, Result<R, EngineError>)>(self.width);
        let task = &task;

        thread::scope(|scope| {
            for _ in 0..self.width {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move || {
                    while let Ok(item) = job_rx.recv() {
                        let outcome = task(&item);
                        if done_tx.send((item, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            // The coordinator keeps only the sending half of the job channel
            // and the receiving half of the completion channel.
            drop(job_rx);
            drop(done_tx);

            let mut in_flight = 0usize;
            let mut completed = 0u64;
            let mut fatal: Option<PipelineError> = None;

            // Prime the window: up to `width` items, fewer if the source is
            // already exhausted.
            for _ in 0..self.width {
                match source() {
                    Ok(Some(item)) => {
                        if job_tx.send(item).is_err() {
                            fatal = Some(PipelineError::Disconnected);
                            break;
                        }
                        in_flight += 1;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        fatal = Some(err);
                        break;
                    }
                }
            }

            while in_flight > 0 {
                let (item, outcome) = match done_rx.recv() {
                    Ok(pair) => pair,
                    Err(_) => {
                        // All workers gone while tasks were outstanding.
                        fatal.get_or_insert(PipelineError::Disconnected);
                        break;
                    }
                };
                // Every completed task leaves the window before its
                // replacement is submitted.
                in_flight -= 1;

                if fatal.is_some() {
                    // Draining after a fatal error: let stragglers finish,
                    // submit nothing new.
                    continue;
                }

                let result = match outcome {
                    Ok(result) => result,
                    Err(err) => {
                        log::error!("task failed, shutting the window down: {err}");
                        fatal = Some(err.into());
                        continue;
                    }
                };

                completed += 1;
                let derived = match on_complete(item, result) {
                    Ok(derived) => derived,
                    Err(err) => {
                        fatal = Some(err);
                        continue;
                    }
                };

                // Exactly one replacement per completion: the handler's
                // derived item first, otherwise the next source item.
                let replacement = match derived {
                    Some(item) => Some(item),
                    None => match source() {
                        Ok(next) => next,
                        Err(err) => {
                            fatal = Some(err);
                            None
                        }
                    },
                };
                if let Some(item) = replacement {
                    if job_tx.send(item).is_err() {
                        fatal = Some(PipelineError::Disconnected);
                        continue;
                    }
                    in_flight += 1;
                }
            }

            // Closing the job channel releases the workers; the scope joins
            // them before returning.
            drop(job_tx);
            match fatal {
                Some(err) => Err(err),
                None => Ok(completed),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn counting_source(items: Vec<u64>) -> impl FnMut() -> PipelineResult<Option<u64>> {
        let mut iter = items.into_iter();
        move || Ok(iter.next())
    }

    #[test]
    fn empty_source_terminates_with_zero_completions() {
        let runner = WindowRunner::new(4);
        let completed = runner
            .run(
                counting_source(Vec::new()),
                |item: &u64| Ok(*item),
                |_, _| Ok(None),
            )
            .unwrap();
        assert_eq!(completed, 0);
    }

    #[test]
    fn every_item_is_handled_exactly_once() {
        let runner = WindowRunner::new(4);
        let handled = Mutex::new(Vec::new());
        let completed = runner
            .run(
                counting_source((0..100).collect()),
                |item: &u64| Ok(*item * 2),
                |item, result| {
                    assert_eq!(result, item * 2);
                    handled.lock().unwrap().push(item);
                    Ok(None)
                },
            )
            .unwrap();
        assert_eq!(completed, 100);

        let mut handled = handled.into_inner().unwrap();
        handled.sort_unstable();
        assert_eq!(handled, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn in_flight_never_exceeds_window_width() {
        const WIDTH: usize = 3;
        let runner = WindowRunner::new(WIDTH);
        let live = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        runner
            .run(
                counting_source((0..50).collect()),
                |_item: &u64| {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    live.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                |_, ()| Ok(None),
            )
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= WIDTH);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn width_one_preserves_source_order() {
        let runner = WindowRunner::new(1);
        let seen = Mutex::new(Vec::new());
        runner
            .run(
                counting_source((0..20).collect()),
                |item: &u64| Ok(*item),
                |item, _| {
                    seen.lock().unwrap().push(item);
                    Ok(None)
                },
            )
            .unwrap();
        assert_eq!(seen.into_inner().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn task_error_aborts_the_run() {
        let runner = WindowRunner::new(2);
        let err = runner
            .run(
                counting_source((0..10).collect()),
                |item: &u64| {
                    if *item == 3 {
                        Err(EngineError::internal("boom"))
                    } else {
                        Ok(*item)
                    }
                },
                |_, _| Ok(None),
            )
            .unwrap_err();
        assert!(err.is_engine());
    }

    #[test]
    fn source_error_propagates() {
        let runner = WindowRunner::new(2);
        let mut remaining = 3u64;
        let err = runner
            .run(
                move || {
                    if remaining == 0 {
                        Err(PipelineError::decode("truncated", "{"))
                    } else {
                        remaining -= 1;
                        Ok(Some(remaining))
                    }
                },
                |item: &u64| Ok(*item),
                |_, _| Ok(None),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn handler_error_propagates() {
        let runner = WindowRunner::new(2);
        let err = runner
            .run(
                counting_source((0..5).collect()),
                |item: &u64| Ok(*item),
                |_, _| -> PipelineResult<Option<u64>> {
                    Err(PipelineError::Io(std::io::Error::other("disk full")))
                },
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn handler_derived_items_replenish_the_window() {
        // One seed item; the handler keeps the window alive until five
        // completions have been handled, the redo-phase feedback shape.
        let runner = WindowRunner::new(2);
        let mut seeded = false;
        let mut handled = 0u64;
        let completed = runner
            .run(
                move || {
                    if seeded {
                        Ok(None)
                    } else {
                        seeded = true;
                        Ok(Some(0u64))
                    }
                },
                |item: &u64| Ok(*item),
                |_, _| {
                    handled += 1;
                    if handled < 5 {
                        Ok(Some(handled))
                    } else {
                        Ok(None)
                    }
                },
            )
            .unwrap();
        assert_eq!(completed, 5);
    }
}
