//! Background tasks.
//!
//! A hook that needs to block (HTTP requests, disk I/O) hands the work to a
//! [`Task`]. [`start`] runs it on its own named OS thread, so the dispatch
//! loop never waits on it. Tasks are not pooled and cannot be cancelled.
//!
//! Failures stay inside the task thread: an `Err` or a panic from
//! [`Task::run`] is logged once with the task name and the hook that
//! started it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::connection::BotHandle;
use crate::error::{panic_message, BotError, Result};
use crate::protocol::Event;

/// What a task gets to work with: its own copy of the triggering event and a
/// handle back to the bot.
#[derive(Clone)]
pub struct TaskContext {
    pub bot: BotHandle,
    /// Name of the hook that started the task.
    pub hook: String,
    pub event: Event,
}

impl TaskContext {
    pub fn new(bot: BotHandle, hook: impl Into<String>, event: Event) -> Self {
        Self {
            bot,
            hook: hook.into(),
            event,
        }
    }
}

/// A unit of work run off the dispatch loop.
pub trait Task: Send {
    fn name(&self) -> &str;

    /// The work itself. May block.
    fn run(&mut self, ctx: &TaskContext) -> Result<()>;
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed { task: String, error: String },
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Handle to a running task thread.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    thread: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the task to end.
    pub fn join(self) -> TaskOutcome {
        self.thread.join().unwrap_or_else(|payload| TaskOutcome::Failed {
            task: self.name,
            error: panic_message(payload.as_ref()),
        })
    }
}

/// Run `task` on a dedicated thread.
///
/// The thread logs through the caller's tracing dispatcher. Fails only if
/// the OS refuses to spawn a thread.
pub fn start<T>(mut task: T, ctx: TaskContext) -> Result<TaskHandle>
where
    T: Task + 'static,
{
    let name = task.name().to_string();
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());

    let thread = thread::Builder::new()
        .name(format!("task-{}", name))
        .spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                debug!(task = %task.name(), hook = %ctx.hook, "Task started");
                let result = catch_unwind(AssertUnwindSafe(|| task.run(&ctx)));
                let failure = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(payload) => Some(panic_message(payload.as_ref())),
                };
                match failure {
                    None => {
                        debug!(task = %task.name(), hook = %ctx.hook, "Task finished");
                        TaskOutcome::Completed
                    }
                    Some(error) => {
                        error!(
                            task = %task.name(),
                            hook = %ctx.hook,
                            event = %ctx.event.name(),
                            error = %error,
                            "Task failed"
                        );
                        TaskOutcome::Failed {
                            task: task.name().to_string(),
                            error,
                        }
                    }
                }
            })
        })
        .map_err(|e| BotError::Task(format!("cannot spawn task '{}': {}", name, e)))?;

    Ok(TaskHandle { name, thread })
}

/// A task built from a name and a closure.
pub struct FnTask<F> {
    name: String,
    body: F,
}

impl<F> Task for FnTask<F>
where
    F: FnMut(&TaskContext) -> Result<()> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &TaskContext) -> Result<()> {
        (self.body)(ctx)
    }
}

/// Adapt a closure into a [`Task`].
pub fn from_fn<F>(name: impl Into<String>, body: F) -> FnTask<F>
where
    F: FnMut(&TaskContext) -> Result<()> + Send,
{
    FnTask {
        name: name.into(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::IrcCommands;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn context(hook: &str) -> (TaskContext, crate::connection::HandleReceivers) {
        let (bot, receivers) = BotHandle::detached(Config::default());
        let event = Event::new("PRIVMSG")
            .with_origin("alice!a@h")
            .with_target("#chan")
            .with_body("hello");
        (TaskContext::new(bot, hook, event), receivers)
    }

    #[test]
    fn test_task_sends_through_outbound() {
        let (ctx, mut receivers) = context("echo");
        let handle = start(
            from_fn("echo", |ctx: &TaskContext| {
                let target = ctx.event.reply_target().unwrap_or_default().to_string();
                ctx.bot.msg(&target, ctx.event.body_str());
                Ok(())
            }),
            ctx,
        )
        .unwrap();

        assert_eq!(handle.name(), "echo");
        assert_eq!(handle.join(), TaskOutcome::Completed);
        assert_eq!(
            receivers.outbound.try_recv().unwrap(),
            "PRIVMSG #chan :hello\r\n"
        );
    }

    #[test]
    fn test_failing_task_logs_once() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let outcome = tracing::subscriber::with_default(subscriber, || {
            let (ctx, _receivers) = context("lookup");
            start(
                from_fn("weather", |_ctx: &TaskContext| {
                    Err(BotError::Task("service unavailable".to_string()))
                }),
                ctx,
            )
            .unwrap()
            .join()
        });

        assert_eq!(
            outcome,
            TaskOutcome::Failed {
                task: "weather".to_string(),
                error: "Task error: service unavailable".to_string(),
            }
        );
        let logs = capture.text();
        assert_eq!(logs.matches("Task failed").count(), 1);
        assert!(logs.contains("task=weather"));
        assert!(logs.contains("hook=lookup"));
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let (ctx, _receivers) = context("lookup");
        let handle = start(
            from_fn("explode", |_ctx: &TaskContext| -> Result<()> { panic!("kaboom") }),
            ctx,
        )
        .unwrap();

        match handle.join() {
            TaskOutcome::Failed { task, error } => {
                assert_eq!(task, "explode");
                assert_eq!(error, "kaboom");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_struct_task_completes() {
        struct Counter {
            runs: u32,
        }

        impl Task for Counter {
            fn name(&self) -> &str {
                "counter"
            }

            fn run(&mut self, _ctx: &TaskContext) -> Result<()> {
                self.runs += 1;
                Ok(())
            }
        }

        let (ctx, _receivers) = context("count");
        let outcome = start(Counter { runs: 0 }, ctx).unwrap().join();
        assert!(outcome.is_completed());
    }
}
