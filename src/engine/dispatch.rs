//! Command dispatch loop
//!
//! Polls the bus, turns events under the engine's tag into commands, invokes
//! the registered handler and tracks one [`PendingOperation`] per target key.
//! Operations whose deadline has passed are reverted through the handler on
//! the next iteration, so the poll interval bounds how late a revert can be.
//!
//! Each event is processed inside an error boundary: decode failures,
//! handler errors and handler panics are logged and the loop keeps going.

use futures::FutureExt;
use minion_events::{CallResult, EventEnvelope};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command::Command;
use super::handler::{EffectHandler, Outcome};
use super::pending::{PendingOperation, PendingTable};
use crate::bus::SharedBus;
use crate::error::DispatchError;

/// Event-driven dispatcher for one effect handler
pub struct Dispatcher<H: EffectHandler> {
    handler: Arc<H>,
    bus: SharedBus,
    tag: String,
    poll_interval: Duration,
    pending: PendingTable,
    shutdown: CancellationToken,
}

impl<H: EffectHandler> Dispatcher<H> {
    pub fn new(
        handler: Arc<H>,
        bus: SharedBus,
        tag: impl Into<String>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            handler,
            bus,
            tag: tag.into(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            pending: PendingTable::new(),
            shutdown,
        }
    }

    /// Operations currently in effect
    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(mut self) {
        let engine = self.handler.name();
        info!("Starting engine {} on {}", engine, self.tag);
        debug!(
            engine,
            commands = ?self.handler.registry().names().collect::<Vec<_>>(),
            "Registered commands"
        );

        let mut rx = self.bus.subscribe();

        loop {
            let wait = self.wait_time(Instant::now());

            let received = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Engine {} cancelled via token", engine);
                    break;
                }
                received = tokio::time::timeout(wait, rx.recv()) => received,
            };

            match received {
                Ok(Ok(event)) => self.dispatch(&event).await,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(engine, skipped, "Engine fell behind the bus, events dropped");
                }
                Ok(Err(RecvError::Closed)) => {
                    warn!("Bus closed, stopping engine {}", engine);
                    break;
                }
                // Poll interval elapsed
                Err(_) => {}
            }

            self.expire(Instant::now()).await;
            self.refresh().await;
        }

        info!(
            "Engine {} stopped with {} pending operation(s)",
            engine,
            self.pending.len()
        );
    }

    /// Process one event and apply its effect to the pending table.
    ///
    /// Returns `Ok(None)` for events that are ignored: wrong tag or a
    /// command name that is not registered.
    pub async fn process(
        &mut self,
        event: &EventEnvelope,
        now: Instant,
    ) -> Result<Option<CallResult>, DispatchError> {
        if !event.matches_prefix(&self.tag) {
            return Ok(None);
        }

        let engine = self.handler.name();
        let command = Command::from_payload(
            &event.data,
            self.handler.default_command(),
            self.handler.target_field(),
        )?;

        let Some(kind) = self.handler.registry().lookup(&command.name) else {
            debug!(engine, command = %command.name, "Dropping unknown command");
            return Ok(None);
        };

        let outcome = self.handler.invoke(kind, &command.arguments).await?;
        let result = outcome.to_result();

        match outcome {
            Outcome::Applied { targets, comment } => {
                debug!(
                    engine,
                    command = %command.name,
                    timeout = ?command.timeout,
                    targets = targets.len(),
                    "{}",
                    comment
                );
                // A deadline past the clock's range never expires
                let deadline = command.timeout.and_then(|timeout| now.checked_add(timeout));
                let command = Arc::new(command);
                for key in targets {
                    self.pending
                        .replace(PendingOperation::new(key, command.clone(), deadline));
                }
            }
            Outcome::Cleared { targets, comment } => {
                debug!(engine, command = %command.name, "{}", comment);
                for key in &targets {
                    self.pending.remove(key);
                }
            }
            Outcome::Rejected { comment } => {
                warn!(engine, command = %command.name, "Command rejected: {}", comment);
            }
        }

        Ok(Some(result))
    }

    /// Revert every operation whose deadline is at or before `now`
    pub async fn expire(&mut self, now: Instant) {
        let expired = self.pending.take_expired(now);
        if expired.is_empty() {
            return;
        }

        let engine = self.handler.name();
        debug!(engine, count = expired.len(), "Reverting expired operations");

        if let Err(e) = guarded(self.handler.revert(&expired)).await {
            error!(engine, "Failed to revert expired operations: {}", e);
        }
    }

    async fn refresh(&self) {
        if self.pending.is_empty() {
            return;
        }
        if let Err(e) = guarded(self.handler.refresh(&self.pending)).await {
            error!(engine = self.handler.name(), "Refresh failed: {}", e);
        }
    }

    /// Error boundary around a single event
    async fn dispatch(&mut self, event: &EventEnvelope) {
        if !event.matches_prefix(&self.tag) {
            return;
        }

        let engine = self.handler.name();
        let tag = event.tag.clone();
        let now = Instant::now();

        match AssertUnwindSafe(self.process(event, now)).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(engine, %tag, "Failed to process event: {}", e),
            Err(panic) => error!(
                engine,
                %tag,
                "{}",
                DispatchError::Panicked(panic_message(panic.as_ref()))
            ),
        }
    }

    /// How long to wait for the next event before checking deadlines again
    fn wait_time(&self, now: Instant) -> Duration {
        match self.pending.next_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(now)
                .min(self.poll_interval),
            None => self.poll_interval,
        }
    }
}

/// Run a handler future, turning errors and panics into [`DispatchError`]
async fn guarded<F, E>(future: F) -> Result<(), DispatchError>
where
    F: Future<Output = Result<(), E>>,
    DispatchError: From<E>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => Ok(result?),
        Err(panic) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{create_bus, create_bus_with_capacity};
    use crate::engine::command::Arguments;
    use crate::engine::handler::decode_args;
    use crate::engine::pending::TargetKey;
    use crate::engine::registry::Registry;
    use crate::error::HandlerError;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    const TAG: &str = "/test/minion/widgets";

    #[derive(Debug, Clone, Copy)]
    enum Kind {
        Set,
        Reject,
        Fail,
        Panic,
        Clear,
    }

    #[derive(Deserialize)]
    struct TargetArgs {
        #[serde(default)]
        targets: Vec<String>,
    }

    /// Records every call so tests can assert on what the loop did
    struct RecordingHandler {
        registry: Registry<Kind>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            let registry = Registry::builder()
                .register("set", Kind::Set)
                .register("reject", Kind::Reject)
                .register("fail", Kind::Fail)
                .register("panic", Kind::Panic)
                .register("clear", Kind::Clear)
                .build()
                .unwrap();
            Arc::new(Self {
                registry,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EffectHandler for RecordingHandler {
        type Kind = Kind;

        fn name(&self) -> &'static str {
            "recording"
        }

        fn registry(&self) -> &Registry<Kind> {
            &self.registry
        }

        async fn invoke(&self, kind: Kind, arguments: &Arguments) -> Result<Outcome, HandlerError> {
            let args: TargetArgs = decode_args(arguments)?;
            let targets: Vec<TargetKey> = args
                .targets
                .iter()
                .map(|t| TargetKey::Widget(t.clone()))
                .collect();
            self.calls
                .lock()
                .unwrap()
                .push(format!("{:?}:{}", kind, args.targets.join(",")));

            match kind {
                Kind::Set => Ok(Outcome::applied(targets, "set")),
                Kind::Clear => Ok(Outcome::cleared(targets, "cleared")),
                Kind::Reject => Ok(Outcome::rejected("no")),
                Kind::Fail => Err(HandlerError::InvalidArguments(
                    serde_json::from_str::<u8>("x").unwrap_err(),
                )),
                Kind::Panic => panic!("handler exploded"),
            }
        }

        async fn revert(&self, expired: &[PendingOperation]) -> Result<(), HandlerError> {
            let keys: Vec<String> = expired.iter().map(|op| op.key.to_string()).collect();
            self.calls
                .lock()
                .unwrap()
                .push(format!("revert:{}", keys.join(",")));
            Ok(())
        }
    }

    fn event(mode: &str, targets: &[&str], timeout: Option<u64>) -> EventEnvelope {
        EventEnvelope::new(
            TAG,
            json!({"mode": mode, "kwargs": {"targets": targets, "timeout": timeout}}),
        )
    }

    fn dispatcher(handler: Arc<RecordingHandler>) -> Dispatcher<RecordingHandler> {
        Dispatcher::new(
            handler,
            create_bus(),
            TAG,
            Duration::from_secs(1),
            CancellationToken::new(),
        )
    }

    fn widget(name: &str) -> TargetKey {
        TargetKey::Widget(name.to_string())
    }

    #[tokio::test]
    async fn test_other_tags_ignored() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());

        let foreign = EventEnvelope::new("/salt/job/123", json!({"mode": "set"}));
        let result = dispatcher.process(&foreign, Instant::now()).await.unwrap();

        assert!(result.is_none());
        assert!(handler.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_dropped() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());

        let result = dispatcher
            .process(&event("explode", &["a"], None), Instant::now())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(handler.calls().is_empty());
        assert!(dispatcher.pending().is_empty());
    }

    #[tokio::test]
    async fn test_timed_command_reverts_at_deadline() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());
        let start = Instant::now();

        let result = dispatcher
            .process(&event("set", &["a", "b"], Some(5)), start)
            .await
            .unwrap();
        assert_eq!(result, Some(CallResult::ok("set")));
        assert_eq!(dispatcher.pending().len(), 2);

        dispatcher.expire(start + Duration::from_millis(4999)).await;
        assert_eq!(dispatcher.pending().len(), 2);

        dispatcher.expire(start + Duration::from_secs(5)).await;
        assert!(dispatcher.pending().is_empty());
        assert_eq!(handler.calls(), vec!["Set:a,b", "revert:widget:a,widget:b"]);
    }

    #[tokio::test]
    async fn test_untimed_command_persists() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());
        let start = Instant::now();

        dispatcher
            .process(&event("set", &["a"], None), start)
            .await
            .unwrap();
        dispatcher.expire(start + Duration::from_secs(86_400)).await;

        assert!(dispatcher.pending().get(&widget("a")).is_some());
        assert_eq!(handler.calls(), vec!["Set:a"]);
    }

    #[tokio::test]
    async fn test_superseding_command_cancels_revert() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());
        let start = Instant::now();

        dispatcher
            .process(&event("set", &["a"], Some(5)), start)
            .await
            .unwrap();
        dispatcher
            .process(&event("set", &["a"], Some(20)), start + Duration::from_secs(2))
            .await
            .unwrap();

        dispatcher.expire(start + Duration::from_secs(5)).await;
        assert!(!handler.calls().iter().any(|c| c.starts_with("revert")));

        let op = dispatcher.pending().get(&widget("a")).unwrap();
        assert_eq!(op.deadline, Some(start + Duration::from_secs(22)));

        dispatcher.expire(start + Duration::from_secs(22)).await;
        assert_eq!(handler.calls().last().unwrap(), "revert:widget:a");
    }

    #[tokio::test]
    async fn test_out_of_range_timeout_never_expires() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());
        let start = Instant::now();

        dispatcher
            .process(&event("set", &["a"], Some(5)), start)
            .await
            .unwrap();

        for timeout in [json!(1e19), json!(1e20)] {
            let far = EventEnvelope::new(
                TAG,
                json!({"mode": "set", "kwargs": {"targets": ["a"], "timeout": timeout}}),
            );
            let result = dispatcher.process(&far, start).await.unwrap();
            assert_eq!(result, Some(CallResult::ok("set")));

            let op = dispatcher.pending().get(&widget("a")).unwrap();
            assert_eq!(op.deadline, None);
        }

        dispatcher.expire(start + Duration::from_secs(5)).await;
        assert!(dispatcher.pending().get(&widget("a")).is_some());
        assert_eq!(handler.calls(), vec!["Set:a", "Set:a", "Set:a"]);
    }

    #[tokio::test]
    async fn test_rejected_command_changes_nothing() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());
        let start = Instant::now();

        dispatcher
            .process(&event("set", &["a"], Some(5)), start)
            .await
            .unwrap();
        let result = dispatcher
            .process(&event("reject", &["a"], None), start)
            .await
            .unwrap();

        assert_eq!(result, Some(CallResult::failed("no")));
        let op = dispatcher.pending().get(&widget("a")).unwrap();
        assert_eq!(op.command.name, "set");
    }

    #[tokio::test]
    async fn test_clear_removes_pending() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler.clone());
        let start = Instant::now();

        dispatcher
            .process(&event("set", &["a", "b"], Some(5)), start)
            .await
            .unwrap();
        dispatcher
            .process(&event("clear", &["a"], None), start)
            .await
            .unwrap();

        assert!(dispatcher.pending().get(&widget("a")).is_none());
        dispatcher.expire(start + Duration::from_secs(5)).await;
        assert_eq!(handler.calls().last().unwrap(), "revert:widget:b");
    }

    #[tokio::test]
    async fn test_handler_errors_are_returned() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler);

        let result = dispatcher
            .process(&event("fail", &[], None), Instant::now())
            .await;
        assert!(matches!(result, Err(DispatchError::Handler(_))));

        let malformed = EventEnvelope::new(TAG, json!(["not", "an", "object"]));
        let result = dispatcher.process(&malformed, Instant::now()).await;
        assert!(matches!(result, Err(DispatchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_wait_time_tracks_next_deadline() {
        let handler = RecordingHandler::new();
        let mut dispatcher = dispatcher(handler);
        let start = Instant::now();

        assert_eq!(dispatcher.wait_time(start), Duration::from_secs(1));

        let quick = EventEnvelope::new(
            TAG,
            json!({"mode": "set", "kwargs": {"targets": ["a"], "timeout": 0.25}}),
        );
        dispatcher.process(&quick, start).await.unwrap();
        assert_eq!(dispatcher.wait_time(start), Duration::from_millis(250));
        assert_eq!(
            dispatcher.wait_time(start + Duration::from_secs(1)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_bad_events() {
        let handler = RecordingHandler::new();
        let bus = create_bus();
        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            handler.clone(),
            bus.clone(),
            TAG,
            Duration::from_secs(1),
            shutdown.clone(),
        );
        let task = tokio::spawn(dispatcher.run());
        while bus.receiver_count() == 0 {
            tokio::task::yield_now().await;
        }

        bus.emit(json!("garbage"), TAG);
        bus.emit(json!({"mode": "panic", "kwargs": {}}), TAG);
        bus.emit(json!({"mode": "fail", "kwargs": {}}), TAG);
        bus.emit(json!({"mode": "set", "kwargs": {"targets": ["a"], "timeout": 3}}), TAG);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(handler.calls(), vec!["Panic:", "Fail:", "Set:a"]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handler.calls().last().unwrap(), "revert:widget:a");

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_continues_after_lagging() {
        let handler = RecordingHandler::new();
        let bus = create_bus_with_capacity(1);
        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            handler.clone(),
            bus.clone(),
            TAG,
            Duration::from_secs(1),
            shutdown.clone(),
        );
        let task = tokio::spawn(dispatcher.run());
        while bus.receiver_count() == 0 {
            tokio::task::yield_now().await;
        }

        // Only the newest event fits in the channel
        for target in ["a", "b", "c"] {
            bus.emit(json!({"mode": "set", "kwargs": {"targets": [target]}}), TAG);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handler.calls(), vec!["Set:c"]);

        bus.emit(json!({"mode": "set", "kwargs": {"targets": ["d"], "timeout": 1}}), TAG);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(handler.calls(), vec!["Set:c", "Set:d", "revert:widget:d"]);

        shutdown.cancel();
        task.await.unwrap();
    }
}
