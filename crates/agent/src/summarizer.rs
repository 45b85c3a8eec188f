//! Background summarization — folds long histories into a rolling summary.
//!
//! Triggered after a turn when the history grows past 20 entries or past
//! 75% of the context window (estimated). The last four entries always stay
//! live; the rest is summarized (in halves with a merge call when long) and
//! the session truncates to the kept suffix. A per-session sentinel
//! guarantees at most one summarization in flight per session.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use hermitclaw_core::event::{DomainEvent, EventBus};
use hermitclaw_core::message::{estimated_tokens, Message, Role};
use hermitclaw_core::provider::{ChatParams, LlmProvider};
use hermitclaw_core::HEARTBEAT_PREFIX;
use hermitclaw_session::{SessionBackend, SessionStore};

use crate::loop_runner::chat_with_failover;

/// History entries always kept live after summarization.
const KEEP_LIVE: usize = 4;

/// Entry-count trigger.
const HISTORY_TRIGGER: usize = 20;

/// Batches longer than this are split in halves and merged.
const SPLIT_THRESHOLD: usize = 10;

/// Whole-job deadline, independent of the triggering turn.
const DEADLINE: Duration = Duration::from_secs(120);

fn summary_params() -> ChatParams {
    ChatParams {
        max_tokens: 1024,
        temperature: 0.3,
    }
}

pub struct Summarizer {
    providers: Vec<Arc<dyn LlmProvider>>,
    model: String,
    context_window: usize,
    sessions: Arc<SessionStore>,
    backend: Option<Arc<dyn SessionBackend>>,
    events: Arc<EventBus>,
    /// Sessions with a summarization currently in flight.
    in_flight: Mutex<HashSet<String>>,
}

impl Summarizer {
    pub fn new(
        providers: Vec<Arc<dyn LlmProvider>>,
        model: String,
        context_window: usize,
        sessions: Arc<SessionStore>,
        backend: Option<Arc<dyn SessionBackend>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            providers,
            model,
            context_window,
            sessions,
            backend,
            events,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Rebuild with a durable backend attached.
    pub fn with_backend(&self, backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            providers: self.providers.clone(),
            model: self.model.clone(),
            context_window: self.context_window,
            sessions: self.sessions.clone(),
            backend: Some(backend),
            events: self.events.clone(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a history is past either trigger threshold.
    pub fn should_summarize(&self, history: &[Message]) -> bool {
        history.len() > HISTORY_TRIGGER
            || estimated_tokens(history) > self.context_window * 75 / 100
    }

    /// Whether a summarization is currently running for a session.
    pub fn is_in_flight(&self, session_key: &str) -> bool {
        self.in_flight.lock().unwrap().contains(session_key)
    }

    /// Schedule a summarization if thresholds are exceeded and none is in
    /// flight for this session. Heartbeat sessions never summarize.
    pub fn maybe_schedule(self: &Arc<Self>, session_key: &str) {
        if session_key.starts_with(HEARTBEAT_PREFIX) {
            return;
        }

        let history = self.sessions.get_history(session_key);
        if !self.should_summarize(&history) {
            return;
        }

        // The sentinel: first scheduler wins, concurrent triggers no-op.
        if !self.in_flight.lock().unwrap().insert(session_key.to_string()) {
            debug!(session_key, "Summarization already in flight");
            return;
        }

        let this = self.clone();
        let key = session_key.to_string();
        tokio::spawn(async move {
            if timeout(DEADLINE, this.summarize_session(&key)).await.is_err() {
                warn!(session_key = %key, "Summarization deadline exceeded");
            }
            this.in_flight.lock().unwrap().remove(&key);
        });
    }

    /// The summarization job itself.
    async fn summarize_session(&self, session_key: &str) {
        let history = self.sessions.get_history(session_key);
        let prior_summary = self.sessions.get_summary(session_key);

        if history.len() <= KEEP_LIVE {
            return;
        }

        let to_summarize = &history[..history.len() - KEEP_LIVE];

        // Keep only plain user/assistant messages and drop anything so large
        // it could not share a summarization call with the rest.
        let max_message_tokens = self.context_window / 2;
        let mut omitted = false;
        let valid: Vec<Message> = to_summarize
            .iter()
            .filter(|m| {
                if !matches!(m.role, Role::User | Role::Assistant) {
                    return false;
                }
                if m.content.len() / 4 > max_message_tokens {
                    omitted = true;
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        if valid.is_empty() {
            return;
        }

        let mut final_summary = if valid.len() > SPLIT_THRESHOLD {
            let mid = valid.len() / 2;
            let first = self.summarize_batch(&valid[..mid], "").await.unwrap_or_default();
            let second = self.summarize_batch(&valid[mid..], "").await.unwrap_or_default();

            let merge_prompt = format!(
                "Merge these two conversation summaries into one cohesive summary:\n\n\
                 1: {first}\n\n2: {second}"
            );
            match chat_with_failover(
                &self.providers,
                &[Message::user(merge_prompt)],
                &[],
                &self.model,
                &summary_params(),
            )
            .await
            {
                Ok(response) => response.content,
                Err(e) => {
                    warn!(session_key, error = %e, "Summary merge failed, concatenating");
                    format!("{first} {second}")
                }
            }
        } else {
            self.summarize_batch(&valid, &prior_summary)
                .await
                .unwrap_or_default()
        };

        if omitted && !final_summary.is_empty() {
            final_summary.push_str(
                "\n[Note: Some oversized messages were omitted from this summary for efficiency.]",
            );
        }

        if final_summary.is_empty() {
            return;
        }

        self.sessions.set_summary(session_key, &final_summary);
        self.sessions.truncate_history(session_key, KEEP_LIVE);
        self.sessions.save(session_key);

        if let Some(backend) = &self.backend {
            if backend.is_connected() {
                let kept = self.sessions.get_history(session_key);
                if let Err(e) = backend.save_session(session_key, &kept).await {
                    warn!(session_key, error = %e, "Failed to mirror summarized session");
                }
            }
        }

        self.events.publish(DomainEvent::SummaryCompleted {
            session_key: session_key.to_string(),
            kept_messages: KEEP_LIVE,
            timestamp: Utc::now(),
        });

        info!(
            session_key,
            summary_chars = final_summary.len(),
            "Session summarized"
        );
    }

    /// Summarize one batch of messages, folding in any prior summary.
    async fn summarize_batch(
        &self,
        batch: &[Message],
        existing_summary: &str,
    ) -> Option<String> {
        let mut prompt = String::from(
            "Provide a concise summary of this conversation segment, preserving core \
             context and key points.\n",
        );
        if !existing_summary.is_empty() {
            prompt.push_str(&format!("Existing context: {existing_summary}\n"));
        }
        prompt.push_str("\nCONVERSATION:\n");
        for m in batch {
            prompt.push_str(&format!("{}: {}\n", m.role, m.content));
        }

        match chat_with_failover(
            &self.providers,
            &[Message::user(prompt)],
            &[],
            &self.model,
            &summary_params(),
        )
        .await
        {
            Ok(response) => Some(response.content),
            Err(e) => {
                warn!(error = %e, "Batch summarization failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hermitclaw_core::error::ProviderError;
    use hermitclaw_core::provider::{ChatResponse, ToolDefinition};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct CountingProvider {
        response: String,
        calls: AtomicU32,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.into(),
                calls: AtomicU32::new(0),
                delay: Duration::from_millis(0),
            })
        }

        fn slow(response: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                response: response.into(),
                calls: AtomicU32::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _model: &str,
            _params: &ChatParams,
        ) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(ChatResponse::text(self.response.clone()))
        }
    }

    fn summarizer_with(
        provider: Arc<dyn LlmProvider>,
        context_window: usize,
    ) -> (Arc<Summarizer>, Arc<SessionStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let sessions = Arc::new(SessionStore::new(dir.path()));
        let summarizer = Arc::new(Summarizer::new(
            vec![provider],
            "test-model".into(),
            context_window,
            sessions.clone(),
            None,
            Arc::new(EventBus::default()),
        ));
        (summarizer, sessions, dir)
    }

    fn seed_history(sessions: &SessionStore, key: &str, pairs: usize) {
        for i in 0..pairs {
            sessions.add_message(key, Role::User, format!("question {i}"));
            sessions.add_message(key, Role::Assistant, format!("answer {i}"));
        }
    }

    async fn wait_until_done(summarizer: &Summarizer, key: &str) {
        for _ in 0..200 {
            if !summarizer.is_in_flight(key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("summarization for {key} never finished");
    }

    #[test]
    fn trigger_thresholds() {
        let (summarizer, _, _dir) = summarizer_with(CountingProvider::new("s"), 128_000);

        let short: Vec<Message> = (0..20).map(|i| Message::user(format!("m{i}"))).collect();
        assert!(!summarizer.should_summarize(&short));

        let long: Vec<Message> = (0..21).map(|i| Message::user(format!("m{i}"))).collect();
        assert!(summarizer.should_summarize(&long));

        // Token trigger: few messages, huge content, small window.
        let (summarizer, _, _dir) = summarizer_with(CountingProvider::new("s"), 2000);
        let heavy = vec![Message::user("x".repeat(8000))];
        assert!(summarizer.should_summarize(&heavy));
    }

    #[tokio::test]
    async fn summarization_round_trip() {
        let provider = CountingProvider::new("the conversation so far");
        let (summarizer, sessions, _dir) = summarizer_with(provider, 128_000);

        seed_history(&sessions, "s1", 11); // 22 entries > trigger
        summarizer.maybe_schedule("s1");
        wait_until_done(&summarizer, "s1").await;

        let history = sessions.get_history("s1");
        assert_eq!(history.len(), KEEP_LIVE);
        // The kept suffix is the last four entries.
        assert_eq!(history[3].content, "answer 10");

        let summary = sessions.get_summary("s1");
        assert!(summary.contains("the conversation so far"));
    }

    #[tokio::test]
    async fn at_most_one_summarization_per_session() {
        // A slow provider keeps the first job in flight while we re-trigger.
        let provider = CountingProvider::slow("summary", Duration::from_millis(200));
        let (summarizer, sessions, _dir) = summarizer_with(provider.clone(), 128_000);

        seed_history(&sessions, "s1", 11);
        summarizer.maybe_schedule("s1");
        assert!(summarizer.is_in_flight("s1"));

        // Concurrent triggers are no-ops while the first runs.
        summarizer.maybe_schedule("s1");
        summarizer.maybe_schedule("s1");
        wait_until_done(&summarizer, "s1").await;

        // 18 valid messages > SPLIT_THRESHOLD: two batch calls + one merge.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn heartbeat_sessions_never_summarize() {
        let provider = CountingProvider::new("summary");
        let (summarizer, sessions, _dir) = summarizer_with(provider.clone(), 128_000);

        seed_history(&sessions, "heartbeat:1234", 15);
        summarizer.maybe_schedule("heartbeat:1234");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sessions.get_history("heartbeat:1234").len(), 30);
    }

    #[tokio::test]
    async fn short_batch_uses_single_call_with_prior_summary() {
        let provider = CountingProvider::new("updated summary");
        let (summarizer, sessions, _dir) = summarizer_with(provider.clone(), 2000);

        // Few messages but over the token trigger (2000 * 0.75 = 1500 tokens).
        for i in 0..4 {
            sessions.add_message("s1", Role::User, "q".repeat(2000));
            sessions.add_message("s1", Role::Assistant, format!("a{i}"));
        }
        sessions.set_summary("s1", "earlier context");

        summarizer.maybe_schedule("s1");
        wait_until_done(&summarizer, "s1").await;

        // 4 filtered messages <= SPLIT_THRESHOLD: exactly one LLM call.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(sessions.get_summary("s1").contains("updated summary"));
    }

    #[tokio::test]
    async fn oversized_messages_dropped_with_note() {
        let provider = CountingProvider::new("summary of the rest");
        // Window 2000 → per-message cap 1000 tokens = 4000 chars.
        let (summarizer, sessions, _dir) = summarizer_with(provider, 2000);

        sessions.add_message("s1", Role::User, "x".repeat(20_000)); // dropped
        for i in 0..12 {
            sessions.add_message("s1", Role::User, format!("q{i}"));
            sessions.add_message("s1", Role::Assistant, format!("a{i}"));
        }

        summarizer.maybe_schedule("s1");
        wait_until_done(&summarizer, "s1").await;

        let summary = sessions.get_summary("s1");
        assert!(summary.contains("omitted"), "missing omission note: {summary}");
    }

    #[tokio::test]
    async fn nothing_to_summarize_aborts() {
        let provider = CountingProvider::new("summary");
        let (summarizer, sessions, _dir) = summarizer_with(provider.clone(), 128_000);

        // 25 tool-role entries: all filtered out, last 4 kept anyway.
        for i in 0..25 {
            sessions.add_full_message("s1", Message::tool_result(format!("t{i}"), "out"));
        }

        summarizer.maybe_schedule("s1");
        wait_until_done(&summarizer, "s1").await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(sessions.get_summary("s1").is_empty());
        // History untouched when the job aborts.
        assert_eq!(sessions.get_history("s1").len(), 25);
    }
}
