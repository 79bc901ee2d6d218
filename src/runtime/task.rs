//! Periodic loops running on their own threads

use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Duration;

use super::shutdown::Shutdown;
use crate::error::{Error, Result};

/// One periodic loop of the controller
pub trait Task: Send {
    /// Thread name, also used in log lines
    const NAME: &'static str;

    /// Runs one iteration and returns how long to wait before the next one
    fn step(&mut self) -> Duration;

    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Runs `task` until shutdown is requested, returning the iteration count
///
/// The flag is only checked between iterations, so a loop always finishes
/// the iteration and the pause it is in.
pub fn run<T: Task>(task: &mut T, shutdown: &Shutdown) -> u64 {
    log::info!("{} loop started", T::NAME);
    let mut iterations = 0;
    while shutdown.is_running() {
        let pause = task.step();
        task.pause(pause);
        iterations += 1;
    }
    log::info!("{} loop stopped after {} iterations", T::NAME, iterations);
    iterations
}

/// A loop thread that hands its task back when joined
#[derive(Debug)]
pub struct TaskHandle<'scope, T> {
    name: &'static str,
    thread: ScopedJoinHandle<'scope, T>,
}

impl<'scope, T> TaskHandle<'scope, T> {
    pub fn join(self) -> Result<T> {
        self.thread.join().map_err(|_| Error::TaskPanicked(self.name))
    }
}

/// Starts `task` on a named thread of `scope`
pub fn spawn<'scope, 'env, T>(
    scope: &'scope Scope<'scope, 'env>,
    mut task: T,
    shutdown: &'scope Shutdown,
) -> Result<TaskHandle<'scope, T>>
where
    T: Task + 'scope,
{
    let thread = thread::Builder::new()
        .name(T::NAME.to_string())
        .spawn_scoped(scope, move || {
            run(&mut task, shutdown);
            task
        })
        .map_err(Error::Spawn)?;
    Ok(TaskHandle {
        name: T::NAME,
        thread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter<'a> {
        steps: u32,
        stop_after: u32,
        shutdown: &'a Shutdown,
    }

    impl Task for Counter<'_> {
        const NAME: &'static str = "counter";

        fn step(&mut self) -> Duration {
            self.steps += 1;
            if self.steps == self.stop_after {
                self.shutdown.request();
            }
            Duration::ZERO
        }
    }

    #[test]
    fn finishes_the_iteration_that_requested_shutdown() {
        let shutdown = Shutdown::new();
        let mut task = Counter {
            steps: 0,
            stop_after: 3,
            shutdown: &shutdown,
        };
        assert_eq!(run(&mut task, &shutdown), 3);
        assert_eq!(task.steps, 3);
    }

    struct Sleeper;

    impl Task for Sleeper {
        const NAME: &'static str = "sleeper";

        fn step(&mut self) -> Duration {
            Duration::from_millis(20)
        }
    }

    #[test]
    fn spawned_task_comes_back_on_join() {
        let shutdown = Shutdown::new();
        thread::scope(|s| {
            let handle = spawn(s, Sleeper, &shutdown).unwrap();
            thread::sleep(Duration::from_millis(50));
            shutdown.request();
            assert!(handle.join().is_ok());
        });
    }

    struct Panics;

    impl Task for Panics {
        const NAME: &'static str = "panics";

        fn step(&mut self) -> Duration {
            panic!("boom")
        }
    }

    #[test]
    fn panic_is_reported_by_name() {
        let shutdown = Shutdown::new();
        thread::scope(|s| {
            let handle = spawn(s, Panics, &shutdown).unwrap();
            assert!(matches!(handle.join(), Err(Error::TaskPanicked("panics"))));
        });
    }
}
