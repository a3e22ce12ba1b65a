use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::assembler::{BlockDelta, BlockKind, StreamEvent};
use crate::backend::ModelBackend;
use crate::conversation::{Fragment, Role, ToolResultStatus, Turn};
use crate::error::OrchestratorError;
use crate::provider::{PromptInfo, PromptMessage, ToolOutput, ToolSession};
use crate::test_support::{
    text_response, tool_response, Behaviour, FakeSession, RecordingSink, Scripted,
    ScriptedBackend,
};
use crate::AiError;

fn orchestrator(backend: &Arc<ScriptedBackend>) -> Orchestrator {
    Orchestrator::new(Arc::clone(backend) as Arc<dyn ModelBackend>)
}

fn as_session(session: &Arc<FakeSession>) -> Arc<dyn ToolSession> {
    Arc::clone(session) as Arc<dyn ToolSession>
}

/// `(tool_use_id, content, status)` of every result in a tool-result turn.
fn results(turn: &Turn) -> Vec<(String, String, ToolResultStatus)> {
    assert_eq!(turn.role, Role::ToolResult);
    turn.content
        .iter()
        .map(|f| match f {
            Fragment::ToolResult {
                tool_use_id,
                content,
                status,
            } => (tool_use_id.clone(), content.clone(), *status),
            other => panic!("unexpected fragment {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn plain_answer_appends_two_turns() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Response(text_response(
        "Hi there",
    ))]));
    let tools = Arc::new(FakeSession::new("docs").with_tool("read"));
    let mut orch = orchestrator(&backend)
        .with_session(as_session(&tools))
        .with_system_prompt("be brief");

    let outcome = orch.chat("hello", &CancellationToken::new()).await.unwrap();

    assert_eq!(
        outcome,
        ChatOutcome::Answer {
            text: "Hi there".into(),
            tool_rounds: 0
        }
    );
    assert_eq!(orch.state(), OrchestratorState::Final);
    assert_eq!(orch.conversation().len(), 2);
    assert_eq!(orch.tracker().call_count(), 1);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].catalog[0].name, "read");
    assert_eq!(requests[0].system.as_deref(), Some("be brief"));
}

#[tokio::test]
async fn tool_round_results_follow_request_order() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Scripted::Response(tool_response(&[
            ("tu_a", "slow", json!({"n": 1})),
            ("tu_b", "fast", json!({"n": 2})),
        ])),
        Scripted::Response(text_response("Both done")),
    ]));
    let tools = Arc::new(
        FakeSession::new("math")
            .with_tool_behaviour(
                "slow",
                Behaviour::Delay(Duration::from_millis(30), ToolOutput::text("slow result")),
            )
            .with_tool_behaviour("fast", Behaviour::Reply(ToolOutput::text("fast result"))),
    );
    let mut orch = orchestrator(&backend).with_session(as_session(&tools));

    let outcome = orch.chat("go", &CancellationToken::new()).await.unwrap();
    assert_eq!(
        outcome,
        ChatOutcome::Answer {
            text: "Both done".into(),
            tool_rounds: 1
        }
    );

    let turns = orch.conversation().turns();
    let roles: Vec<_> = turns.iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::ToolResult, Role::Assistant]
    );
    let ids: Vec<_> = results(&turns[2]).into_iter().map(|r| r.0).collect();
    assert_eq!(ids, vec!["tu_a", "tu_b"]);
    assert!(orch.conversation().unanswered_tool_uses().is_empty());

    // The second request carries the tool results.
    assert_eq!(backend.requests()[1].turns.len(), 3);
    assert_eq!(orch.tracker().call_count(), 2);
}

#[tokio::test]
async fn backend_failure_appends_no_assistant_turn() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Fail(AiError::RateLimited)]));
    let mut orch = orchestrator(&backend);

    let err = orch.chat("hello", &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        OrchestratorError::BackendUnavailable(AiError::RateLimited)
    ));
    assert_eq!(orch.conversation().len(), 1);
    assert_eq!(orch.conversation().turns()[0].role, Role::User);
    assert_eq!(orch.state(), OrchestratorState::AwaitingUserInput);
}

#[tokio::test]
async fn round_cap_answers_every_request() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Scripted::Response(tool_response(&[("tu_1", "add", json!({}))])),
        Scripted::Response(tool_response(&[
            ("tu_2", "add", json!({})),
            ("tu_3", "add", json!({})),
        ])),
    ]));
    let tools = Arc::new(FakeSession::new("math").with_tool("add"));
    let mut orch = orchestrator(&backend)
        .with_session(as_session(&tools))
        .with_max_tool_rounds(1);

    let err = orch.chat("loop", &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::MaxToolRounds { limit: 1 }));
    assert_eq!(tools.calls().len(), 1);
    assert!(orch.conversation().unanswered_tool_uses().is_empty());

    let last = results(orch.conversation().last().unwrap());
    assert_eq!(last.len(), 2);
    for (_, content, status) in last {
        assert_eq!(status, ToolResultStatus::Error);
        assert!(content.contains("tool round limit reached (1)"));
    }
}

#[tokio::test]
async fn cancel_during_tool_round_closes_every_tool_use() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Response(tool_response(&[
        ("tu_1", "quick", json!({})),
        ("tu_2", "stuck", json!({})),
    ]))]));
    let tools = Arc::new(
        FakeSession::new("io")
            .with_tool("quick")
            .with_tool_behaviour("stuck", Behaviour::Hang),
    );
    let mut orch = orchestrator(&backend).with_session(as_session(&tools));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = orch.chat("do it", &cancel).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Cancelled));
    assert_eq!(orch.state(), OrchestratorState::AwaitingUserInput);
    assert!(orch.conversation().unanswered_tool_uses().is_empty());

    let last = results(orch.conversation().last().unwrap());
    assert_eq!(last[0].2, ToolResultStatus::Success);
    assert_eq!(last[1].1, r#"{"error":"cancelled"}"#);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn cancel_while_sending_appends_nothing() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Hang]));
    let mut orch = orchestrator(&backend);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = orch.chat("hello", &cancel).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Cancelled));
    assert_eq!(orch.conversation().len(), 1);
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Scripted::Response(tool_response(&[("tu_1", "delete_everything", json!({}))])),
        Scripted::Response(text_response("I can't do that")),
    ]));
    let mut orch = orchestrator(&backend)
        .with_session(as_session(&Arc::new(FakeSession::new("docs").with_tool("read"))));

    let outcome = orch.chat("wipe it", &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.text(), "I can't do that");

    let round = results(&orch.conversation().turns()[2]);
    assert_eq!(round[0].2, ToolResultStatus::Error);
    let payload: Value = serde_json::from_str(&round[0].1).unwrap();
    assert_eq!(payload["error"], "tool not found: delete_everything");
}

#[tokio::test]
async fn command_loads_prompt_without_model_call() {
    let backend = Arc::new(ScriptedBackend::new(Vec::new()));
    let docs = Arc::new(FakeSession::new("docs").with_prompt(
        PromptInfo {
            name: "summary".into(),
            description: Some("Summarize a document".into()),
            arguments: Vec::new(),
        },
        vec![PromptMessage::user("Summarize the document doc42.")],
    ));
    let mut orch = orchestrator(&backend).with_prompt_session(as_session(&docs));

    let outcome = orch
        .chat("/summary doc42", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ChatOutcome::PromptLoaded {
            command: "summary".into(),
            turns: 1
        }
    );
    assert!(backend.requests().is_empty());
    assert_eq!(orch.conversation().len(), 1);
    assert_eq!(
        orch.conversation().turns()[0].text(),
        "Summarize the document doc42."
    );

    let requests = docs.prompt_requests();
    assert_eq!(requests[0].0, "summary");
    assert_eq!(requests[0].1.get("doc_id").map(String::as_str), Some("doc42"));
}

#[tokio::test]
async fn unknown_command_is_a_prompt_error() {
    let backend = Arc::new(ScriptedBackend::new(Vec::new()));
    let docs = Arc::new(FakeSession::new("docs"));
    let mut orch = orchestrator(&backend).with_prompt_session(as_session(&docs));

    let err = orch
        .chat("/nope x", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Prompt(_)));
    assert!(orch.conversation().is_empty());
}

#[tokio::test]
async fn slash_text_without_prompt_session_goes_to_model() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Response(text_response(
        "ok",
    ))]));
    let mut orch = orchestrator(&backend);

    orch.chat("/summary doc42", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(orch.conversation().turns()[0].text(), "/summary doc42");
}

#[tokio::test]
async fn streaming_reports_text_and_tool_calls() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Scripted::Response(tool_response(&[("tu_1", "add", json!({"a": 1, "b": 2}))])),
        Scripted::Response(text_response("All done")),
    ]));
    let tools = Arc::new(FakeSession::new("math").with_tool("add"));
    let mut orch = orchestrator(&backend).with_session(as_session(&tools));

    let mut sink = RecordingSink::default();
    let outcome = orch
        .chat_streaming("add", &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.text(), "All done");
    assert_eq!(sink.texts.concat(), "All done");
    assert_eq!(sink.texts.len(), 2);
    assert_eq!(sink.tool_calls.len(), 1);
    assert_eq!(sink.tool_calls[0].0, "add");
    let shown: Value = serde_json::from_str(&sink.tool_calls[0].1).unwrap();
    assert_eq!(shown, json!({"a": 1, "b": 2}));

    assert_eq!(tools.calls(), vec![("add".to_string(), json!({"a": 1, "b": 2}))]);
    assert_eq!(orch.conversation().len(), 4);
}

#[tokio::test]
async fn truncated_stream_is_backend_failure() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Events(vec![
        StreamEvent::MessageStart { input_tokens: 3 },
        StreamEvent::BlockStart {
            index: 0,
            block: BlockKind::Text,
        },
        StreamEvent::BlockDelta {
            index: 0,
            delta: BlockDelta::Text("partial".into()),
        },
    ])]));
    let mut orch = orchestrator(&backend);

    let mut sink = RecordingSink::default();
    let err = orch
        .chat_streaming("hello", &mut sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::BackendUnavailable(_)));
    assert_eq!(sink.texts, vec!["partial"]);
    assert_eq!(orch.conversation().len(), 1);
}

#[tokio::test]
async fn cancel_mid_stream_keeps_shown_text_out_of_the_log() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Stall(vec![
        StreamEvent::MessageStart { input_tokens: 3 },
        StreamEvent::BlockStart {
            index: 0,
            block: BlockKind::Text,
        },
        StreamEvent::BlockDelta {
            index: 0,
            delta: BlockDelta::Text("Once upon".into()),
        },
    ])]));
    let mut orch = orchestrator(&backend);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut sink = RecordingSink::default();
    let err = orch
        .chat_streaming("tell me a story", &mut sink, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Cancelled));
    assert_eq!(sink.texts, vec!["Once upon"]);
    assert_eq!(orch.conversation().len(), 1);
    assert_eq!(orch.conversation().last().unwrap().role, Role::User);
    assert_eq!(orch.state(), OrchestratorState::AwaitingUserInput);
    assert_eq!(orch.tracker().call_count(), 0);
}

#[tokio::test]
async fn mentions_inline_document_content() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Scripted::Response(text_response("May.")),
        Scripted::Response(text_response("Still May.")),
    ]));
    let docs = Arc::new(
        FakeSession::new("docs")
            .with_resource(
                "docs://documents",
                "application/json",
                r#"["plan.md","notes.md"]"#,
            )
            .with_resource("docs://documents/plan.md", "text/plain", "Ship in May."),
    );
    let mut orch = orchestrator(&backend).with_resource_session(as_session(&docs));

    orch.chat("when does @plan.md ship?", &CancellationToken::new())
        .await
        .unwrap();
    let first = orch.conversation().turns()[0].text();
    assert!(first.contains("<document id=\"plan.md\">\nShip in May.\n</document>"));

    // Unknown mentions leave the query untouched.
    orch.chat("and @other.md?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(orch.conversation().turns()[2].text(), "and @other.md?");
}

#[tokio::test]
async fn mentions_can_be_disabled() {
    let backend = Arc::new(ScriptedBackend::new(vec![Scripted::Response(text_response(
        "ok",
    ))]));
    let docs = Arc::new(FakeSession::new("docs").with_resource(
        "docs://documents",
        "application/json",
        r#"["plan.md"]"#,
    ));
    let mut orch = orchestrator(&backend)
        .with_resource_session(as_session(&docs))
        .with_resource_mentions(false);

    orch.chat("about @plan.md", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(orch.conversation().turns()[0].text(), "about @plan.md");
}

#[tokio::test]
async fn first_session_serves_colliding_tool() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Scripted::Response(tool_response(&[("tu_1", "search", json!({}))])),
        Scripted::Response(text_response("found")),
    ]));
    let first = Arc::new(FakeSession::new("first").with_tool("search"));
    let second = Arc::new(FakeSession::new("second").with_tool("search"));
    let mut orch = orchestrator(&backend)
        .with_sessions([as_session(&first), as_session(&second)]);

    let report = orch.refresh_tools().await;
    assert_eq!(report.collisions.len(), 1);

    orch.chat("look", &CancellationToken::new()).await.unwrap();
    assert_eq!(first.calls().len(), 1);
    assert!(second.calls().is_empty());
    assert_eq!(orch.catalog().len(), 1);
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let backend = Arc::new(ScriptedBackend::new(Vec::new()));
    let mut orch = orchestrator(&backend);

    let outcome = orch.chat("   ", &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.text(), "");
    assert!(orch.conversation().is_empty());
    assert!(backend.requests().is_empty());
}
