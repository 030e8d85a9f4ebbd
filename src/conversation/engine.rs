//! The tool-calling conversation loop
//!
//! One `handle()` call turns one utterance into one reply:
//!
//! ```text
//! user turn -> [backend call -> tool dispatch -> backend call ...] -> answer
//! ```
//!
//! The loop runs at most `max_iterations` backend calls. Each iteration's
//! turns are committed to history only after the iteration completes, so a
//! backend failure leaves no partial assistant/tool turns behind.

use super::history::ConversationHistory;
use super::turn::{ConversationTurn, ToolInvocation};
use crate::llm::{LlmRequest, LlmService, ToolDefinition};
use crate::system_prompt;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// Returned when the backend keeps requesting tools past the iteration cap.
/// Not recorded in history.
pub const ITERATION_LIMIT_MESSAGE: &str =
    "I've hit my reasoning limit for this request. Could you try asking in a simpler way?";

/// Returned when the backend call fails for any reason
pub const BACKEND_FAILURE_MESSAGE: &str =
    "I'm having trouble thinking right now. Please check my configuration.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Most recent turns sent with each call (system prompt excluded)
    pub window: usize,
    /// Backend calls allowed per `handle()`
    pub max_iterations: usize,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: 15,
            max_iterations: 5,
            max_tokens: Some(500),
            temperature: Some(0.7),
        }
    }
}

pub struct ConversationEngine {
    system_prompt: String,
    llm: Arc<dyn LlmService>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(llm: Arc<dyn LlmService>, tools: Arc<ToolRegistry>) -> Self {
        let system_prompt = system_prompt::build_system_prompt(&tools.specs());
        Self {
            system_prompt,
            llm,
            tools,
            config: EngineConfig::default(),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = EngineConfig {
            window: config.window.max(1),
            max_iterations: config.max_iterations.max(1),
            ..config
        };
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Produce the reply to `utterance`, mutating `history`.
    ///
    /// Empty utterances are not rejected here; callers are expected to
    /// filter blank input before calling.
    pub async fn handle(&self, history: &mut ConversationHistory, utterance: &str) -> String {
        history.push(ConversationTurn::user(utterance));
        let definitions = self.tools.definitions();

        for iteration in 1..=self.config.max_iterations {
            let request = self.build_request(history, &definitions);

            let response = match self.llm.complete(&request).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(
                        iteration,
                        kind = ?e.kind,
                        error = %e,
                        "Backend call failed, abandoning turn"
                    );
                    return BACKEND_FAILURE_MESSAGE.to_string();
                }
            };

            if !response.has_tool_calls() {
                let answer = response.text_content().to_string();
                history.push(ConversationTurn::assistant(answer.clone()));
                tracing::debug!(iteration, history_len = history.len(), "Turn complete");
                return answer;
            }

            let mut round = Vec::with_capacity(response.tool_calls.len() + 1);
            for call in &response.tool_calls {
                let output = self.run_tool(call).await;
                round.push(ConversationTurn::tool_result(&call.id, &call.name, output));
            }
            history.push(ConversationTurn::assistant_with_calls(
                response.content,
                response.tool_calls,
            ));
            history.extend(round);
        }

        tracing::warn!(
            max_iterations = self.config.max_iterations,
            "Iteration limit reached without a final answer"
        );
        ITERATION_LIMIT_MESSAGE.to_string()
    }

    /// Forget everything said in this session
    pub fn reset(&self, history: &mut ConversationHistory) {
        history.clear();
        tracing::debug!("Conversation history cleared");
    }

    fn build_request(
        &self,
        history: &ConversationHistory,
        definitions: &[ToolDefinition],
    ) -> LlmRequest {
        LlmRequest {
            system: self.system_prompt.clone(),
            messages: history.window(self.config.window).to_vec(),
            tools: definitions.to_vec(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Dispatch one call; every failure becomes the tool's textual result
    async fn run_tool(&self, call: &ToolInvocation) -> String {
        let start = std::time::Instant::now();
        match self.tools.dispatch(&call.name, &call.arguments).await {
            Ok(output) => {
                tracing::info!(
                    tool = %call.name,
                    call_id = %call.id,
                    duration_ms = %start.elapsed().as_millis(),
                    "Tool executed"
                );
                output
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool failed");
                format!("Error: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::llm::testing::MockLlmService;
    use crate::llm::{LlmError, LlmResponse};
    use crate::tools::{ToolArgs, ToolError, ToolHandler, ToolSpec};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    /// Tool recording the arguments of each call
    struct RecordingTool {
        reply: String,
        calls: Mutex<Vec<ToolArgs>>,
    }

    impl RecordingTool {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ToolHandler for RecordingTool {
        async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
            self.calls.lock().unwrap().push(args.clone());
            Ok(self.reply.clone())
        }
    }

    fn call(id: &str, name: &str) -> ToolInvocation {
        ToolInvocation::new(id, name, Map::new())
    }

    fn engine_with(
        mock: &Arc<MockLlmService>,
        tools: Vec<(&str, Arc<RecordingTool>)>,
    ) -> ConversationEngine {
        let mut registry = ToolRegistry::new();
        for (name, tool) in tools {
            registry.register(ToolSpec::new(name, format!("{name} tool")), tool);
        }
        ConversationEngine::new(mock.clone(), Arc::new(registry)).with_system_prompt("SYSTEM")
    }

    #[tokio::test]
    async fn test_tool_free_reply_adds_two_turns() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![]);
        let mut history = ConversationHistory::new();

        for i in 0..3 {
            mock.queue_response(LlmResponse::text(format!("reply {i}")));
            let before = history.len();
            let reply = engine.handle(&mut history, &format!("msg {i}")).await;
            assert_eq!(reply, format!("reply {i}"));
            assert_eq!(history.len(), before + 2);
        }

        let roles: Vec<_> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_request_carries_system_prompt_tools_and_parameters() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![("time", RecordingTool::new("noon"))]);
        let mut history = ConversationHistory::new();

        mock.queue_response(LlmResponse::text("hi"));
        engine.handle(&mut history, "hello").await;

        let requests = mock.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].system, "SYSTEM");
        assert_eq!(requests[0].messages, vec![ConversationTurn::user("hello")]);
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "time");
        assert_eq!(requests[0].max_tokens, Some(500));
    }

    #[tokio::test]
    async fn test_single_tool_round() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let time = RecordingTool::new("10:30 AM");
        let calc = RecordingTool::new("2 + 2 = 4");
        let engine = engine_with(&mock, vec![("time", time.clone()), ("calculator", calc.clone())]);
        let mut history = ConversationHistory::new();

        let mut calc_call = call("call_b", "calculator");
        calc_call.arguments.insert("expression".to_string(), json!("2 + 2"));
        mock.queue_response(LlmResponse::tool_calls(vec![call("call_a", "time"), calc_call]));
        mock.queue_response(LlmResponse::text("It's 10:30 and 2+2 is 4."));

        let reply = engine.handle(&mut history, "time and 2+2?").await;
        assert_eq!(reply, "It's 10:30 and 2+2 is 4.");

        // user + assistant-with-calls + 2 results + final answer
        assert_eq!(history.len(), 1 + 1 + 2 + 1);
        let turns = history.turns();
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].tool_calls.len(), 2);
        assert_eq!(turns[2].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(turns[2].text(), "10:30 AM");
        assert_eq!(turns[3].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(turns[3].tool_name.as_deref(), Some("calculator"));
        assert_eq!(turns[3].text(), "2 + 2 = 4");
        assert_eq!(turns[4].text(), "It's 10:30 and 2+2 is 4.");

        assert_eq!(time.call_count(), 1);
        assert_eq!(calc.calls.lock().unwrap()[0]["expression"], "2 + 2");

        // Second backend call sees the tool results
        let second = &mock.recorded_requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert!(second.messages[3].is_tool_result());
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_text_and_loop_continues() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![]);
        let mut history = ConversationHistory::new();

        mock.queue_response(LlmResponse::tool_calls(vec![call("c1", "teleport")]));
        mock.queue_response(LlmResponse::text("I can't do that."));

        let reply = engine.handle(&mut history, "beam me up").await;
        assert_eq!(reply, "I can't do that.");
        assert_eq!(mock.call_count(), 2);

        let result = &history.turns()[2];
        assert!(result.is_tool_result());
        assert_eq!(result.text(), "Error: Unknown tool 'teleport'");
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let tool = RecordingTool::new("again");
        let engine = engine_with(&mock, vec![("loop", tool.clone())]);
        let mut history = ConversationHistory::new();

        for i in 0..10 {
            mock.queue_response(LlmResponse::tool_calls(vec![call(&format!("c{i}"), "loop")]));
        }

        let reply = engine.handle(&mut history, "go").await;
        assert_eq!(reply, ITERATION_LIMIT_MESSAGE);
        assert_eq!(mock.call_count(), 5);
        assert_eq!(tool.call_count(), 5);

        // Fallback is not recorded: user + 5 * (assistant + result)
        assert_eq!(history.len(), 1 + 5 * 2);
        assert!(history.turns().last().unwrap().is_tool_result());
    }

    #[tokio::test]
    async fn test_custom_iteration_cap() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![("loop", RecordingTool::new("x"))]).with_config(
            EngineConfig {
                max_iterations: 2,
                ..EngineConfig::default()
            },
        );
        let mut history = ConversationHistory::new();
        for i in 0..5 {
            mock.queue_response(LlmResponse::tool_calls(vec![call(&format!("c{i}"), "loop")]));
        }
        assert_eq!(engine.handle(&mut history, "go").await, ITERATION_LIMIT_MESSAGE);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_gives_fresh_session_shape() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![]);

        let mut fresh = ConversationHistory::new();
        mock.queue_response(LlmResponse::text("Hello!"));
        engine.handle(&mut fresh, "hello").await;

        let mut reused = ConversationHistory::new();
        mock.queue_response(LlmResponse::text("first"));
        engine.handle(&mut reused, "something else").await;
        engine.reset(&mut reused);
        engine.reset(&mut reused);
        assert!(reused.is_empty());

        mock.queue_response(LlmResponse::text("Hello!"));
        engine.handle(&mut reused, "hello").await;
        assert_eq!(reused.turns(), fresh.turns());

        // The post-reset request carries nothing from before the reset
        let last = mock.recorded_requests().pop().unwrap();
        assert_eq!(last.messages, vec![ConversationTurn::user("hello")]);
    }

    #[tokio::test]
    async fn test_backend_failure_after_tool_round_keeps_committed_turns() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![("time", RecordingTool::new("noon"))]);
        let mut history = ConversationHistory::new();

        mock.queue_response(LlmResponse::tool_calls(vec![call("c1", "time")]));
        mock.queue_error(LlmError::timeout("deadline exceeded"));

        let reply = engine.handle(&mut history, "what time is it").await;
        assert_eq!(reply, BACKEND_FAILURE_MESSAGE);

        // user + iteration 1 (assistant-with-calls + result); nothing from iteration 2
        let roles: Vec<_> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);

        // Session survives: next call is attempted fresh
        mock.queue_response(LlmResponse::text("It's noon."));
        assert_eq!(engine.handle(&mut history, "again?").await, "It's noon.");
    }

    #[tokio::test]
    async fn test_backend_failure_on_first_call_keeps_user_turn() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![]);
        let mut history = ConversationHistory::new();

        mock.queue_error(LlmError::auth("bad key"));
        assert_eq!(engine.handle(&mut history, "hi").await, BACKEND_FAILURE_MESSAGE);
        assert_eq!(history.turns(), &[ConversationTurn::user("hi")]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_replaced_tool_invoked_once() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let old = RecordingTool::new("old");
        let new = RecordingTool::new("new");

        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new("echo", "v1"), old.clone());
        registry.register(ToolSpec::new("echo", "v2"), new.clone());
        let engine = ConversationEngine::new(mock.clone(), Arc::new(registry));
        let mut history = ConversationHistory::new();

        mock.queue_response(LlmResponse::tool_calls(vec![call("c1", "echo")]));
        mock.queue_response(LlmResponse::text("done"));
        engine.handle(&mut history, "echo").await;

        assert_eq!(old.call_count(), 0);
        assert_eq!(new.call_count(), 1);
        assert_eq!(history.turns()[2].text(), "new");
        assert_eq!(mock.recorded_requests()[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn test_window_bounds_payload() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let engine = engine_with(&mock, vec![]).with_config(EngineConfig {
            window: 3,
            ..EngineConfig::default()
        });
        let mut history = ConversationHistory::new();

        for i in 0..4 {
            mock.queue_response(LlmResponse::text(format!("r{i}")));
            engine.handle(&mut history, &format!("u{i}")).await;
        }

        let last = mock.recorded_requests().pop().unwrap();
        let texts: Vec<_> = last.messages.iter().map(ConversationTurn::text).collect();
        assert_eq!(texts, vec!["u2", "r2", "u3"]);
        assert_eq!(last.system, "SYSTEM");
        assert_eq!(history.len(), 8);
    }

    #[tokio::test]
    async fn test_tool_round_wider_than_window_reaches_backend_whole() {
        let mock = Arc::new(MockLlmService::new("mock"));
        let time = RecordingTool::new("noon");
        let engine = engine_with(&mock, vec![("time", time.clone())]).with_config(EngineConfig {
            window: 3,
            ..EngineConfig::default()
        });
        let mut history = ConversationHistory::new();

        mock.queue_response(LlmResponse::tool_calls(vec![
            call("c1", "time"),
            call("c2", "time"),
            call("c3", "time"),
        ]));
        mock.queue_response(LlmResponse::text("Noon, three times over."));

        let reply = engine.handle(&mut history, "time x3").await;
        assert_eq!(reply, "Noon, three times over.");
        assert_eq!(time.call_count(), 3);

        // Second payload: assistant-with-calls plus every result
        let second = &mock.recorded_requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[0].tool_calls.len(), 3);
        let ids: Vec<_> = second.messages[1..]
            .iter()
            .map(|t| t.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }
}
