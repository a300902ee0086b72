//! Tests for payload compaction budgets.

use muninn::providers::compaction::{compact, normalize_roles, truncate};
use muninn::{CompactionConfig, Message, ToolCall};

fn config() -> CompactionConfig {
    CompactionConfig::new()
        .max_system_chars(40)
        .max_recent_turns(3)
        .max_turn_chars(20)
        .truncation_marker("...")
}

#[test]
fn defaults() {
    let config = CompactionConfig::default();
    assert_eq!(config.max_system_chars, 6_000);
    assert_eq!(config.max_recent_turns, 6);
    assert_eq!(config.max_turn_chars, 1_500);
}

#[test]
fn keeps_system_and_last_turns() {
    let messages = vec![
        Message::system("be brief"),
        Message::user("one"),
        Message::assistant("two"),
        Message::user("three"),
        Message::assistant("four"),
        Message::user("five"),
    ];
    let out = compact(&messages, &config());

    let texts: Vec<&str> = out.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["be brief", "three", "four", "five"]);
}

#[test]
fn no_turn_exceeds_its_budget() {
    let messages = vec![
        Message::system("s".repeat(100)),
        Message::user("u".repeat(100)),
        Message::assistant("é".repeat(100)),
    ];
    let out = compact(&messages, &config());

    assert_eq!(out[0].text().chars().count(), 40);
    assert!(out[0].text().ends_with("..."));
    for msg in &out[1..] {
        assert_eq!(msg.text().chars().count(), 20);
        assert!(msg.text().ends_with("..."));
    }
}

#[test]
fn without_system_turn() {
    let messages: Vec<Message> = (0..5).map(|i| Message::user(format!("q{i}"))).collect();
    let out = compact(&messages, &config());
    let texts: Vec<&str> = out.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["q2", "q3", "q4"]);
}

#[test]
fn only_first_system_turn_is_privileged() {
    let messages = vec![
        Message::system("rules"),
        Message::user("a"),
        Message::system("late note"),
        Message::user("b"),
    ];
    let out = compact(&messages, &config().max_recent_turns(2));
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].text(), "rules");
    assert!(out[1].role.is_system());
    assert_eq!(out[2].text(), "b");
}

#[test]
fn orphaned_tool_results_are_dropped() {
    let call = ToolCall::new("call_1", "run_query", "{}");
    let messages = vec![
        Message::user("q"),
        Message::assistant_with_tool_calls(None, vec![call]),
        Message::tool_result("call_1", "42 rows"),
        Message::assistant("there are 42"),
        Message::user("and last year?"),
    ];
    // window of 3 starts at the tool result
    let out = compact(&messages, &config());
    let texts: Vec<&str> = out.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["there are 42", "and last year?"]);
}

#[test]
fn tool_calls_survive_truncation() {
    let call = ToolCall::new("call_1", "run_query", "{}");
    let messages = vec![
        Message::assistant_with_tool_calls(Some("x".repeat(50)), vec![call.clone()]),
        Message::tool_result("call_1", "ok"),
    ];
    let out = compact(&messages, &config());
    assert_eq!(out[0].tool_calls.as_deref(), Some(&[call][..]));
    assert_eq!(out[0].text().chars().count(), 20);
}

#[test]
fn empty_input() {
    assert!(compact(&[], &config()).is_empty());
    assert!(normalize_roles(&[]).is_empty());
}

#[test]
fn compaction_is_stable() {
    let messages = vec![
        Message::system("s".repeat(100)),
        Message::user("u".repeat(100)),
        Message::assistant("a".repeat(10)),
    ];
    let once = compact(&messages, &config());
    assert_eq!(compact(&once, &config()), once);
}

#[test]
fn truncate_exact_budget_untouched() {
    assert_eq!(truncate("abcde", 5, "..."), "abcde");
    assert_eq!(truncate("abcdef", 5, "..."), "ab...");
}
