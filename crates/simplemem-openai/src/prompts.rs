// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt text for the chat-backed capabilities.

use std::fmt::Write as _;

use simplemem_core::types::{DialogueTurn, ExtractionRequest, TIMESTAMP_FORMAT};

pub const QUALITY_SYSTEM: &str = "\
You rate dialogue turns for how much lasting, memorable information they carry \
(facts about people, plans, preferences, events, decisions). Greetings, filler and \
acknowledgements score near 0; dense factual statements score near 1.
Reply with a JSON object {\"scores\": [..]} holding exactly one number in [0, 1] per \
turn, in the order given.";

pub const EXTRACTION_SYSTEM: &str = "\
You decompose one dialogue turn into atomic, self-contained propositions.
Rules:
- One fact per proposition, written as a full sentence in the third person.
- Name speakers explicitly instead of writing I, you or we.
- Keep indirect references (he, she, they, the manager) in the text but list each in \
`references` with `surface` (exact text) and `candidates` (entity names it may denote, \
drawn from the context and known entities; empty if unknown).
- Keep time expressions in the text and list each in `temporals`:
  {\"kind\":\"absolute\",\"surface\":..,\"at\":\"YYYY-MM-DDTHH:MM:SS\"} for explicit dates,
  {\"kind\":\"relative\",\"surface\":..,\"day_offset\":N,\"time\":\"HH:MM:SS\"|null} for \
expressions relative to the turn's timestamp (tomorrow at 2pm is day_offset 1, time 14:00:00),
  {\"kind\":\"unanchored\",\"surface\":..} when the date cannot be fixed from the turn alone.
- `entities`: people, places, organizations and things the proposition mentions.
- `keywords`: a few topic words.
- `supporting_turns`: ids of context turns the proposition depends on.
- `correlation_key`: a short stable slug naming the fact (e.g. \"alice-employer\") only \
when the turn corrects or updates an earlier fact; otherwise null.
Reply with a JSON object {\"propositions\": [..]}. Return an empty list when the turn \
carries no facts.";

pub const COMPLEXITY_SYSTEM: &str = "\
You estimate how complex a memory lookup question is: 0 for a single direct fact, \
around 0.5 for questions combining two facts or a time constraint, 1 for multi-hop or \
aggregate questions over many facts.
Reply with a JSON object {\"complexity\": number in [0, 1]}.";

fn turn_line(out: &mut String, turn: &DialogueTurn) {
    let _ = writeln!(
        out,
        "[{}] (turn {}) {}: {}",
        turn.timestamp.format(TIMESTAMP_FORMAT),
        turn.id,
        turn.speaker,
        turn.content
    );
}

pub fn quality_user(window: &[DialogueTurn]) -> String {
    let mut out = format!("Rate these {} turns:\n", window.len());
    for turn in window {
        turn_line(&mut out, turn);
    }
    out
}

pub fn extraction_user(request: &ExtractionRequest) -> String {
    let mut out = String::new();
    if !request.known_entities.is_empty() {
        let _ = writeln!(out, "Known entities: {}", request.known_entities.join(", "));
    }
    if !request.context.is_empty() {
        out.push_str("Context:\n");
        for turn in &request.context {
            turn_line(&mut out, turn);
        }
    }
    out.push_str("Turn to decompose:\n");
    turn_line(&mut out, &request.turn);
    out
}

pub fn complexity_user(query: &str) -> String {
    format!("Question: {query}")
}
