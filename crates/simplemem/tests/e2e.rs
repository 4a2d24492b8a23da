// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete SimpleMem pipeline.
//!
//! Each test creates an isolated TestHarness with scripted capabilities and
//! its own database. Tests are independent and order-insensitive.

use chrono::{NaiveDateTime, NaiveTime};
use simplemem_core::types::{ExtractedProposition, Reference, Resolution, TemporalExpression};
use simplemem_core::{RetrievalResult, SimpleMemError, ViewKind};
use simplemem_test_utils::{HashEmbedder, ScriptedExtractor, TestHarness};

const T1: &str = "Bob, let's meet at Starbucks tomorrow at 2pm to discuss the new product.";
const T2: &str = "Can I join the meeting with Bob?";
const T3: &str = "Sure, she can join us.";

fn conversation_extractor() -> ScriptedExtractor {
    let mut meeting = ExtractedProposition::new(
        "Alice will meet Bob at Starbucks tomorrow at 2pm to discuss the new product",
    );
    meeting.entities = vec!["Alice".into(), "Bob".into(), "Starbucks".into()];
    meeting.temporals = vec![TemporalExpression::Relative {
        surface: "tomorrow at 2pm".into(),
        day_offset: 1,
        time: NaiveTime::from_hms_opt(14, 0, 0),
    }];

    let mut join = ExtractedProposition::new("Carol wants to join the meeting with Bob");
    join.entities = vec!["Carol".into(), "Bob".into()];

    let mut agree = ExtractedProposition::new("Alice agreed that she can join the meeting");
    agree.entities = vec!["Alice".into()];
    agree.references = vec![Reference {
        surface: "she".into(),
        candidates: vec!["Alice".into(), "Carol".into()],
    }];
    agree.supporting_turns = vec![2];

    ScriptedExtractor::new()
        .with_script(T1, vec![meeting])
        .with_script(T2, vec![join])
        .with_script(T3, vec![agree])
}

const CONVERSATION: [(&str, &str, &str); 3] = [
    ("Alice", T1, "2025-11-15T14:30:00"),
    ("Carol", T2, "2025-11-15T14:31:00"),
    ("Alice", T3, "2025-11-15T14:32:00"),
];

fn ranking(result: &RetrievalResult) -> Vec<(String, u64)> {
    result
        .hits
        .iter()
        .map(|h| (h.fact.id.to_string(), h.fact.version))
        .collect()
}

// ---- Scenario: basic round trip ----

#[tokio::test]
async fn test_conversation_resolves_time_and_coreference() {
    let harness = TestHarness::builder()
        .with_extractor(conversation_extractor())
        .build()
        .await
        .unwrap();

    let summary = harness.ingest(&CONVERSATION).await.unwrap();
    assert_eq!(summary.facts_created, 3);
    assert_eq!(summary.facts_unresolved, 0);
    assert_eq!(summary.windows_processed, 1);

    let facts = harness.system.list_facts(None, 0).await.unwrap();
    let texts: Vec<&str> = facts.iter().map(|f| f.text.as_str()).collect();
    assert!(texts.iter().any(|t| t.contains("on 2025-11-16T14:00:00")), "{texts:?}");
    // Carol was mentioned more recently than Alice when turn 3 was compressed.
    let agreed = facts
        .iter()
        .find(|f| f.text.starts_with("Alice agreed"))
        .unwrap();
    assert_eq!(agreed.text, "Alice agreed that Carol can join the meeting");
    assert_eq!(agreed.resolution, Resolution::Resolved);
    assert_eq!(agreed.source_turns.first, 2);
    assert_eq!(agreed.source_turns.last, 3);
    assert_eq!(agreed.speakers, vec!["Carol", "Alice"]);

    let result = harness
        .system
        .ask("When is the Starbucks meeting with Bob?", None)
        .await
        .unwrap();
    let top = &result.hits[0].fact;
    assert!(top.text.contains("Starbucks"), "top hit: {}", top.text);
    let when = top.time.unwrap().start;
    assert_eq!(
        when,
        NaiveDateTime::parse_from_str("2025-11-16T14:00:00", "%Y-%m-%dT%H:%M:%S").unwrap()
    );
}

// ---- Scenario: two-turn meeting, asked where and when ----

const LETS_MEET: &str = "Let's meet at Starbucks tomorrow at 2pm";
const BRING_REPORT: &str = "Sure, I'll bring the report";

#[tokio::test]
async fn test_alice_and_bob_meeting_answers_when_and_where() {
    let mut meeting = ExtractedProposition::new("Alice and Bob will meet at Starbucks tomorrow at 2pm");
    meeting.entities = vec!["Alice".into(), "Bob".into(), "Starbucks".into()];
    meeting.temporals = vec![TemporalExpression::Relative {
        surface: "tomorrow at 2pm".into(),
        day_offset: 1,
        time: NaiveTime::from_hms_opt(14, 0, 0),
    }];
    let mut report = ExtractedProposition::new("I will bring the report to the meeting with Alice");
    report.entities = vec!["Bob".into(), "Alice".into()];
    report.references = vec![Reference {
        surface: "I".into(),
        candidates: vec!["Bob".into()],
    }];
    let harness = TestHarness::builder()
        .with_extractor(
            ScriptedExtractor::new()
                .with_script(LETS_MEET, vec![meeting])
                .with_script(BRING_REPORT, vec![report]),
        )
        .build()
        .await
        .unwrap();

    let summary = harness
        .ingest(&[
            ("Alice", LETS_MEET, "2025-11-15T14:30:00"),
            ("Bob", BRING_REPORT, "2025-11-15T14:31:00"),
        ])
        .await
        .unwrap();
    assert_eq!(summary.facts_created, 2);
    assert_eq!(summary.facts_unresolved, 0);

    let facts = harness.system.list_facts(None, 0).await.unwrap();
    assert_eq!(facts.len(), 2);
    for fact in &facts {
        assert_eq!(fact.resolution, Resolution::Resolved, "{}", fact.text);
        assert!(fact.unresolved_references.is_empty());
    }
    assert!(
        facts
            .iter()
            .any(|f| f.text == "Bob will bring the report to the meeting with Alice"),
        "{facts:?}"
    );

    let result = harness
        .system
        .ask("When and where will Alice and Bob meet?", Some(5))
        .await
        .unwrap();
    assert!(!result.is_partial());
    assert!(
        result.hits.iter().any(|h| h.fact.text.contains("2025-11-16T14:00:00")
            && h.fact.text.contains("Starbucks")),
        "hits: {:?}",
        ranking(&result)
    );
}

// ---- Scenario: bad input never reaches the store ----

#[tokio::test]
async fn test_rejected_vector_and_absurd_offset_leave_store_and_index_equal() {
    let harness = TestHarness::builder()
        .with_embedder(HashEmbedder::default().corrupting("green tea"))
        .with_window_size(1)
        .build()
        .await
        .unwrap();

    let err = harness
        .system
        .add_turn("Zed", "see you then", "+99999999999999d")
        .await
        .unwrap_err();
    assert!(matches!(err, SimpleMemError::MalformedTimestamp { .. }), "{err}");

    let summary = harness
        .ingest(&[
            ("Alice", LETS_MEET, "2025-11-15T14:30:00"),
            ("Zed", "Zed likes green tea every morning.", "2025-11-15T14:31:00"),
        ])
        .await
        .unwrap();
    assert_eq!(summary.windows_dropped, 1);
    assert_eq!(summary.facts_created, 1);

    let stats = harness.system.stats().await.unwrap();
    assert_eq!(stats.total_facts_stored, stats.indexed_facts as u64);
    assert!(harness.system.check_consistency().await.unwrap().is_empty());
    let result = harness.system.ask("green tea", None).await.unwrap();
    assert!(result.hits.iter().all(|h| !h.fact.text.contains("green tea")));
}

// ---- Scenario: empty buffer finalize ----

#[tokio::test]
async fn test_empty_finalize_changes_nothing() {
    let harness = TestHarness::new().await.unwrap();
    let before = harness.system.stats().await.unwrap();
    let summary = harness.system.finalize().await.unwrap();
    assert_eq!(summary.facts_created, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(harness.system.stats().await.unwrap(), before);
    assert_eq!(harness.extractor.calls(), 0);
}

// ---- Scenario: unresolved timestamp ----

#[tokio::test]
async fn test_next_january_is_stored_but_flagged() {
    let content = "I'm starting at the Berlin office next January.";
    let mut prop = ExtractedProposition::new("Alice is starting at the Berlin office next January");
    prop.entities = vec!["Alice".into(), "Berlin".into()];
    prop.temporals = vec![TemporalExpression::Unanchored {
        surface: "next January".into(),
    }];
    let harness = TestHarness::builder()
        .with_extractor(ScriptedExtractor::new().with_script(content, vec![prop]))
        .build()
        .await
        .unwrap();

    let summary = harness
        .ingest(&[("Alice", content, "2025-11-15T10:00:00")])
        .await
        .unwrap();
    assert_eq!((summary.facts_created, summary.facts_unresolved), (1, 1));

    // Unresolved facts still take part in retrieval.
    let result = harness.system.ask("Berlin office", None).await.unwrap();
    assert_eq!(result.hits.len(), 1);
    assert!(result.hits[0].fact.is_unresolved());
    assert!(result.hits[0].fact.text.contains("next January"));
}

// ---- Scenario: partial view outage ----

#[tokio::test]
async fn test_semantic_outage_degrades_to_partial_result() {
    let harness = TestHarness::builder()
        .with_extractor(conversation_extractor())
        .build()
        .await
        .unwrap();
    harness.ingest(&CONVERSATION).await.unwrap();

    harness.embedder.set_available(false);
    let result = harness
        .system
        .ask("Starbucks product discussion", None)
        .await
        .unwrap();
    assert!(result.is_partial());
    assert!(result.unavailable_views.contains(&ViewKind::Semantic));
    assert!(!result.is_empty());
    assert!(result.hits.iter().all(|h| h.ranks.semantic.is_none()));

    harness.embedder.set_available(true);
    let healed = harness
        .system
        .ask("Starbucks product discussion", None)
        .await
        .unwrap();
    assert!(!healed.is_partial());
}

// ---- Property: deterministic fusion, also across an index rebuild ----

#[tokio::test]
async fn test_ranking_is_stable_across_queries_and_reopen() {
    let harness = TestHarness::builder()
        .with_extractor(conversation_extractor())
        .on_disk()
        .build()
        .await
        .unwrap();
    harness.ingest(&CONVERSATION).await.unwrap();

    let query = "meeting with Bob";
    let first = harness.system.ask(query, Some(3)).await.unwrap();
    let second = harness.system.ask(query, Some(3)).await.unwrap();
    assert_eq!(ranking(&first), ranking(&second));
    let scores = |r: &RetrievalResult| r.hits.iter().map(|h| h.score).collect::<Vec<_>>();
    assert_eq!(scores(&first), scores(&second));

    let harness = harness.reopen().await.unwrap();
    let rebuilt = harness.system.ask(query, Some(3)).await.unwrap();
    assert_eq!(ranking(&first), ranking(&rebuilt));
}

// ---- Property: idempotent finalize ----

#[tokio::test]
async fn test_second_finalize_adds_nothing() {
    let harness = TestHarness::builder()
        .with_extractor(conversation_extractor())
        .build()
        .await
        .unwrap();
    harness.ingest(&CONVERSATION).await.unwrap();
    let before = harness.system.list_facts(Some(100), 0).await.unwrap();

    let again = harness.system.finalize().await.unwrap();
    assert_eq!(again.facts_created + again.facts_updated, 0);
    let after = harness.system.list_facts(Some(100), 0).await.unwrap();
    assert_eq!(before, after);
    assert!(harness.system.check_consistency().await.unwrap().is_empty());
}

// ---- Property: readers never observe a half-committed fact ----

#[tokio::test]
async fn test_queries_during_finalize_see_consistent_facts() {
    let harness = TestHarness::builder()
        .with_window_size(3)
        .build()
        .await
        .unwrap();
    for i in 0..24 {
        harness
            .system
            .add_turn(
                if i % 2 == 0 { "Alice" } else { "Bob" },
                format!("Project status note {i} about the quarterly roadmap review"),
                format!("2025-11-15T10:{i:02}:00"),
            )
            .await
            .unwrap();
    }

    let reader = async {
        let mut seen = Vec::new();
        for _ in 0..20 {
            let result = harness.system.ask("roadmap review", Some(5)).await.unwrap();
            seen.push(result);
            tokio::task::yield_now().await;
        }
        seen
    };
    let (summary, seen) = tokio::join!(harness.system.finalize(), reader);
    let summary = summary.unwrap();
    assert_eq!(summary.facts_created, 24);

    for result in seen {
        for hit in &result.hits {
            let stored = harness.system.get_fact(&hit.fact.id).await.unwrap().unwrap();
            assert_eq!(stored.version, hit.fact.version);
            assert_eq!(stored.text, hit.fact.text);
        }
    }
    assert!(harness.system.check_consistency().await.unwrap().is_empty());
    assert_eq!(harness.system.stats().await.unwrap().indexed_facts, 24);
}
