// SPDX-FileCopyrightText: 2026 SimpleMem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered buffer of dialogue turns awaiting compression.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use simplemem_core::types::{DialogueTurn, TurnId, TurnInput};
use simplemem_core::SimpleMemError;
use tokio::sync::Mutex;
use tracing::debug;

use crate::timestamp::resolve_timestamp;

#[derive(Default)]
struct BufferState {
    turns: VecDeque<DialogueTurn>,
    next_seq: u64,
    /// Timestamp of the most recently appended turn; anchors relative offsets.
    last_timestamp: Option<NaiveDateTime>,
}

/// Accumulates turns in arrival order and hands them out in windows.
///
/// All operations take one lock, so a drain never races an append: each turn
/// ends up in exactly one window.
pub struct DialogueBuffer {
    state: Mutex<BufferState>,
}

impl DialogueBuffer {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Buffer whose first turn receives sequence number `next_seq`.
    pub fn starting_at(next_seq: u64) -> Self {
        Self {
            state: Mutex::new(BufferState {
                next_seq: next_seq.max(1),
                ..Default::default()
            }),
        }
    }

    /// Validate and append one turn.
    pub async fn append(&self, input: TurnInput) -> Result<TurnId, SimpleMemError> {
        let mut state = self.state.lock().await;
        let timestamp = resolve_timestamp(&input.timestamp, state.last_timestamp)?;
        let id = push(&mut state, input, timestamp);
        debug!(turn = id.0, "turn buffered");
        Ok(id)
    }

    /// Validate every turn, then append them all, or none if any is invalid.
    ///
    /// Relative offsets inside the batch anchor on the preceding turn of the batch.
    pub async fn append_batch(
        &self,
        inputs: Vec<TurnInput>,
    ) -> Result<Vec<TurnId>, SimpleMemError> {
        let mut state = self.state.lock().await;

        let mut reference = state.last_timestamp;
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let ts = resolve_timestamp(&input.timestamp, reference)?;
            reference = Some(ts);
            resolved.push(ts);
        }

        let ids: Vec<TurnId> = inputs
            .into_iter()
            .zip(resolved)
            .map(|(input, ts)| push(&mut state, input, ts))
            .collect();
        debug!(count = ids.len(), "turn batch buffered");
        Ok(ids)
    }

    /// Remove and return up to `max_size` oldest turns, in order.
    pub async fn drain_window(&self, max_size: usize) -> Vec<DialogueTurn> {
        let mut state = self.state.lock().await;
        let n = max_size.min(state.turns.len());
        state.turns.drain(..n).collect()
    }

    /// Drain everything currently buffered as consecutive windows of at most `max_size`.
    pub async fn drain_windows(&self, max_size: usize) -> Vec<Vec<DialogueTurn>> {
        let size = max_size.max(1);
        let mut state = self.state.lock().await;
        let all: Vec<DialogueTurn> = state.turns.drain(..).collect();
        all.chunks(size).map(<[DialogueTurn]>::to_vec).collect()
    }

    /// Put a window that could not be compressed back at the front, keeping sequence order.
    pub async fn restore(&self, window: Vec<DialogueTurn>) {
        if window.is_empty() {
            return;
        }
        let mut state = self.state.lock().await;
        let mut merged: Vec<DialogueTurn> = window;
        merged.extend(state.turns.drain(..));
        merged.sort_by_key(|t| t.id);
        state.turns = merged.into();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.turns.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.turns.is_empty()
    }

    /// Sequence number the next appended turn will receive.
    pub async fn next_seq(&self) -> u64 {
        self.state.lock().await.next_seq
    }

    /// Drop all buffered turns and reset numbering to `next_seq`.
    pub async fn reset(&self, next_seq: u64) {
        let mut state = self.state.lock().await;
        *state = BufferState {
            next_seq: next_seq.max(1),
            ..Default::default()
        };
    }
}

impl Default for DialogueBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn push(state: &mut BufferState, input: TurnInput, timestamp: NaiveDateTime) -> TurnId {
    let id = TurnId(state.next_seq);
    state.next_seq += 1;
    state.last_timestamp = Some(timestamp);
    state.turns.push_back(DialogueTurn {
        id,
        speaker: input.speaker,
        content: input.content,
        timestamp,
    });
    id
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn turn(content: &str, ts: &str) -> TurnInput {
        TurnInput::new("alice", content, ts)
    }

    #[tokio::test]
    async fn append_assigns_sequential_ids() {
        let buffer = DialogueBuffer::new();
        let a = buffer.append(turn("one", "2025-11-15T10:00:00")).await.unwrap();
        let b = buffer.append(turn("two", "+5m")).await.unwrap();
        assert_eq!((a.0, b.0), (1, 2));

        let window = buffer.drain_window(10).await;
        assert_eq!(window.len(), 2);
        assert_eq!(window[1].timestamp.to_string(), "2025-11-15 10:05:00");
    }

    #[tokio::test]
    async fn malformed_timestamp_is_rejected() {
        let buffer = DialogueBuffer::new();
        let err = buffer.append(turn("x", "not a time")).await.unwrap_err();
        assert!(matches!(err, SimpleMemError::MalformedTimestamp { .. }));
        assert!(buffer.is_empty().await);
        assert_eq!(buffer.next_seq().await, 1);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let buffer = DialogueBuffer::new();
        let result = buffer
            .append_batch(vec![
                turn("ok", "2025-11-15T10:00:00"),
                turn("bad", "whenever"),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(buffer.len().await, 0);

        let ids = buffer
            .append_batch(vec![turn("a", "2025-11-15T10:00:00"), turn("b", "+1h")])
            .await
            .unwrap();
        assert_eq!(ids, vec![TurnId(1), TurnId(2)]);
    }

    #[tokio::test]
    async fn drain_window_takes_oldest() {
        let buffer = DialogueBuffer::new();
        for i in 0..5 {
            buffer
                .append(turn(&format!("t{i}"), "2025-11-15T10:00:00"))
                .await
                .unwrap();
        }
        let first = buffer.drain_window(3).await;
        assert_eq!(first.iter().map(|t| t.id.0).collect::<Vec<_>>(), vec![1, 2, 3]);
        let rest = buffer.drain_window(3).await;
        assert_eq!(rest.len(), 2);
        assert!(buffer.drain_window(3).await.is_empty());
    }

    #[tokio::test]
    async fn drain_windows_chunks_everything() {
        let buffer = DialogueBuffer::new();
        for _ in 0..7 {
            buffer.append(turn("x", "2025-11-15T10:00:00")).await.unwrap();
        }
        let windows = buffer.drain_windows(3).await;
        assert_eq!(
            windows.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn restore_puts_window_back_in_order() {
        let buffer = DialogueBuffer::new();
        for _ in 0..4 {
            buffer.append(turn("x", "2025-11-15T10:00:00")).await.unwrap();
        }
        let window = buffer.drain_window(2).await;
        buffer.append(turn("late", "2025-11-15T11:00:00")).await.unwrap();
        buffer.restore(window).await;

        let all = buffer.drain_window(10).await;
        assert_eq!(
            all.iter().map(|t| t.id.0).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_and_drains_lose_nothing() {
        let buffer = Arc::new(DialogueBuffer::new());
        let mut writers = Vec::new();
        for w in 0..4 {
            let buffer = Arc::clone(&buffer);
            writers.push(tokio::spawn(async move {
                for i in 0..50 {
                    buffer
                        .append(turn(&format!("{w}-{i}"), "2025-11-15T10:00:00"))
                        .await
                        .unwrap();
                }
            }));
        }

        let drainer = {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..100 {
                    seen.extend(buffer.drain_window(7).await);
                    tokio::task::yield_now().await;
                }
                seen
            })
        };

        for w in writers {
            w.await.unwrap();
        }
        let mut seen = drainer.await.unwrap();
        seen.extend(buffer.drain_window(usize::MAX).await);

        let mut ids: Vec<u64> = seen.iter().map(|t| t.id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(seen.len(), 200);
    }
}
