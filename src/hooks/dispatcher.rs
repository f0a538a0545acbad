//! Hook activation and event fan-out.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info};

use crate::connection::BotHandle;
use crate::error::panic_message;
use crate::protocol::Event;

use super::registry::HookRegistry;
use super::Hook;

struct ActiveHook {
    name: String,
    plugin: String,
    hook: Box<dyn Hook>,
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Hooks whose `matches` returned true.
    pub matched: usize,
    /// Names of hooks that failed in `matches` or `call`.
    pub failed: Vec<String>,
}

/// The activated hook instances.
///
/// One instance per registered type, in registration order. A failing hook
/// never stops the remaining hooks from seeing the event.
#[derive(Default)]
pub struct HookDispatcher {
    hooks: Vec<ActiveHook>,
}

impl HookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set with fresh instances of every registered type.
    ///
    /// Returns the number of active hooks. A factory that panics is logged
    /// and skipped.
    pub fn activate(&mut self, registry: &HookRegistry, bot: &BotHandle) -> usize {
        self.hooks.clear();
        for hook_type in registry.iter() {
            match catch_unwind(AssertUnwindSafe(|| hook_type.build(bot))) {
                Ok(hook) => self.hooks.push(ActiveHook {
                    name: hook_type.name().to_string(),
                    plugin: hook_type.plugin().to_string(),
                    hook,
                }),
                Err(payload) => error!(
                    hook = %hook_type.name(),
                    plugin = %hook_type.plugin(),
                    error = %panic_message(payload.as_ref()),
                    "Hook activation failed"
                ),
            }
        }
        info!(hooks = self.hooks.len(), "Hooks activated");
        self.hooks.len()
    }

    /// Add an already built instance at the end of the active set.
    pub fn push(&mut self, name: impl Into<String>, plugin: impl Into<String>, hook: Box<dyn Hook>) {
        self.hooks.push(ActiveHook {
            name: name.into(),
            plugin: plugin.into(),
            hook,
        });
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Names of the active hooks in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name.as_str()).collect()
    }

    /// Offer `event` to every active hook in order.
    pub fn dispatch(&mut self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport::default();

        for active in &mut self.hooks {
            let hook = &mut active.hook;
            let matched = match catch_unwind(AssertUnwindSafe(|| hook.matches(event))) {
                Ok(matched) => matched,
                Err(payload) => {
                    error!(
                        hook = %active.name,
                        plugin = %active.plugin,
                        event = %event.name(),
                        error = %panic_message(payload.as_ref()),
                        "Hook match failed"
                    );
                    report.failed.push(active.name.clone());
                    continue;
                }
            };
            if !matched {
                continue;
            }

            report.matched += 1;
            debug!(hook = %active.name, event = %event.name(), "Calling hook");

            let outcome = catch_unwind(AssertUnwindSafe(|| hook.call(event)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };
            if let Some(failure) = failure {
                error!(
                    hook = %active.name,
                    plugin = %active.plugin,
                    event = %event.name(),
                    error = %failure,
                    "Hook call failed"
                );
                report.failed.push(active.name.clone());
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::BotError;
    use crate::hooks::{HookType, MockHook};
    use mockall::Sequence;
    use std::sync::{Arc, Mutex};

    struct Exploding {
        in_match: bool,
    }

    impl Hook for Exploding {
        fn matches(&self, _event: &Event) -> bool {
            if self.in_match {
                panic!("matcher exploded");
            }
            true
        }

        fn call(&mut self, _event: &Event) -> crate::Result<()> {
            panic!("hook exploded")
        }
    }

    fn event() -> Event {
        Event::new("PRIVMSG")
            .with_origin("alice!a@h")
            .with_target("#chan")
            .with_body("hi")
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let mut seq = Sequence::new();
        let mut dispatcher = HookDispatcher::new();

        for name in ["first", "second", "third"] {
            let mut hook = MockHook::new();
            hook.expect_matches()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| true);
            hook.expect_call()
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
            dispatcher.push(name, "test", Box::new(hook));
        }

        let report = dispatcher.dispatch(&event());
        assert_eq!(report.matched, 3);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_unmatched_hook_is_not_called() {
        let mut hook = MockHook::new();
        hook.expect_matches().returning(|e| e.is("PING"));
        hook.expect_call().never();

        let mut dispatcher = HookDispatcher::new();
        dispatcher.push("ping_only", "test", Box::new(hook));
        let report = dispatcher.dispatch(&event());
        assert_eq!(report.matched, 0);
    }

    #[test]
    fn test_failing_hook_does_not_stop_dispatch() {
        let mut failing = MockHook::new();
        failing.expect_matches().returning(|_| true);
        failing
            .expect_call()
            .times(1)
            .returning(|_| Err(BotError::Hook("boom".to_string())));

        let mut last = MockHook::new();
        last.expect_matches().returning(|_| true);
        last.expect_call().times(1).returning(|_| Ok(()));

        let mut dispatcher = HookDispatcher::new();
        dispatcher.push("failing", "test", Box::new(failing));
        dispatcher.push("panicking", "test", Box::new(Exploding { in_match: false }));
        dispatcher.push("bad_matcher", "test", Box::new(Exploding { in_match: true }));
        dispatcher.push("last", "test", Box::new(last));

        let report = dispatcher.dispatch(&event());
        assert_eq!(report.matched, 3);
        assert_eq!(report.failed, vec!["failing", "panicking", "bad_matcher"]);
    }

    #[test]
    fn test_error_in_one_matching_hook_still_reaches_the_next() {
        let mut dispatcher = HookDispatcher::new();
        for (index, hit) in [false, true, false, true].into_iter().enumerate() {
            let mut hook = MockHook::new();
            hook.expect_matches().times(1).returning(move |_| hit);
            match (hit, index) {
                (false, _) => {
                    hook.expect_call().never();
                }
                (true, 1) => {
                    hook.expect_call()
                        .times(1)
                        .returning(|_| Err(BotError::Hook("first match failed".to_string())));
                }
                (true, _) => {
                    hook.expect_call().times(1).returning(|_| Ok(()));
                }
            }
            dispatcher.push(format!("hook{}", index), "test", Box::new(hook));
        }

        let report = dispatcher.dispatch(&event());
        assert_eq!(report.matched, 2);
        assert_eq!(report.failed, vec!["hook1"]);
    }

    #[test]
    fn test_activate_builds_one_instance_per_type() {
        let (bot, _receivers) = BotHandle::detached(Config::default());
        let built = Arc::new(Mutex::new(Vec::new()));

        let mut registry = HookRegistry::new();
        for name in ["a", "b"] {
            let built = Arc::clone(&built);
            registry.register(HookType::new(name, "test", move |_bot| {
                built.lock().unwrap().push(name);
                let mut hook = MockHook::new();
                hook.expect_matches().returning(|_| false);
                Box::new(hook) as Box<dyn Hook>
            }));
        }

        let mut dispatcher = HookDispatcher::new();
        assert_eq!(dispatcher.activate(&registry, &bot), 2);
        assert_eq!(dispatcher.names(), vec!["a", "b"]);

        // Re-activation replaces the instances instead of appending.
        assert_eq!(dispatcher.activate(&registry, &bot), 2);
        assert_eq!(*built.lock().unwrap(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_activate_skips_panicking_factory() {
        let (bot, _receivers) = BotHandle::detached(Config::default());
        let mut registry = HookRegistry::new();
        registry.register(HookType::new("broken", "test", |_bot| -> Box<dyn Hook> {
            panic!("cannot build")
        }));
        registry.register(HookType::new("fine", "test", |_bot| {
            Box::new(MockHook::new()) as Box<dyn Hook>
        }));

        let mut dispatcher = HookDispatcher::new();
        assert_eq!(dispatcher.activate(&registry, &bot), 1);
        assert_eq!(dispatcher.names(), vec!["fine"]);
    }
}
