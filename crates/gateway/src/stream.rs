//! Streaming event router: stamps strictly increasing sequence
//! numbers onto a provider's transcoded chunks, detects degenerate
//! "batched" streams, accumulates incremental tool-call fragments into
//! complete `{id, name, arguments}` triples, and validates the
//! responses-API event nesting.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Instant;

use futures::Stream;
use schema::chunk::{ResponsesChunk, ResponsesEventType, StreamChunk, StreamChunkBody, UnifiedStreamingToolCall};
use schema::{ErrorCategory, ErrorField};

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ErrorField>> + Send>>;

/// Per-stream sequencer: stamps `sequence`/`provider`/`latency_ms` on every
/// chunk a transport produces, and records chunk arrival timing so the
/// test-only batched-stream heuristic can be computed once the
/// stream ends.
pub struct Sequencer {
    provider: String,
    next_sequence: u64,
    started_at: Instant,
    last_arrival: Option<Instant>,
    intervals: Vec<std::time::Duration>,
}

impl Sequencer {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            next_sequence: 1,
            started_at: Instant::now(),
            last_arrival: None,
            intervals: Vec::new(),
        }
    }

    /// Stamps one chunk. `terminal` chunks carry the whole stream's
    /// end-to-end latency; every other chunk carries zero.
    pub fn stamp(&mut self, body: StreamChunkBody, terminal: bool) -> StreamChunk {
        let now = Instant::now();
        if let Some(last) = self.last_arrival {
            self.intervals.push(now.duration_since(last));
        }
        self.last_arrival = Some(now);

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        StreamChunk {
            sequence,
            provider: self.provider.clone(),
            latency_ms: if terminal {
                self.started_at.elapsed().as_millis() as u64
            } else {
                0
            },
            batched: terminal && self.is_batched(),
            body,
        }
    }

    /// Test-oracle heuristic: flags a stream as `batched` when the
    /// upstream claims incremental delivery but actually buffered
    /// everything and emitted it near-simultaneously. Requires at least 20
    /// chunks, the first inter-chunk gap under 50µs, and at least 80% of
    /// all gaps under 50µs. This is informational only; it never affects
    /// dispatch or fallback behavior.
    pub fn is_batched(&self) -> bool {
        const THRESHOLD: std::time::Duration = std::time::Duration::from_micros(50);
        const MIN_CHUNKS: usize = 20;

        if self.intervals.len() + 1 < MIN_CHUNKS {
            return false;
        }

        let Some(first_gap) = self.intervals.first() else {
            return false;
        };
        if *first_gap >= THRESHOLD {
            return false;
        }

        let under_threshold = self.intervals.iter().filter(|gap| **gap < THRESHOLD).count();
        let ratio = under_threshold as f64 / self.intervals.len() as f64;
        ratio >= 0.8
    }
}

/// Validates that a sequence of responses-API event types never violates
/// the nesting rule: every `output_item.added` has a matching
/// `output_item.done` before `completed`; every `content_part.added` has a
/// matching `content_part.done`; both nest strictly (a `content_part` is
/// always closed before its enclosing `output_item`).
#[derive(Default)]
pub struct ResponsesStateMachine {
    open_output_items: u32,
    open_content_parts: u32,
    completed: bool,
    errored: bool,
}

impl ResponsesStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `event` against the current state and advances it. Returns
    /// a `stream_protocol` error if `event` violates nesting; the router
    /// surfaces that as an error chunk and closes the channel rather than
    /// forwarding the offending event, so a caller never sees a stream
    /// that silently skipped a malformed event.
    pub fn advance(&mut self, event: ResponsesEventType) -> Result<(), ErrorField> {
        if self.completed || self.errored {
            return Err(protocol_error(format!("event {event:?} received after stream already terminated")));
        }

        match event {
            ResponsesEventType::Created | ResponsesEventType::InProgress => Ok(()),
            ResponsesEventType::OutputItemAdded => {
                self.open_output_items += 1;
                Ok(())
            }
            ResponsesEventType::OutputItemDone => {
                if self.open_content_parts > 0 {
                    return Err(protocol_error("output_item.done received with unclosed content_part"));
                }
                if self.open_output_items == 0 {
                    return Err(protocol_error("output_item.done received without a matching output_item.added"));
                }
                self.open_output_items -= 1;
                Ok(())
            }
            ResponsesEventType::ContentPartAdded => {
                if self.open_output_items == 0 {
                    return Err(protocol_error("content_part.added received outside any output_item"));
                }
                self.open_content_parts += 1;
                Ok(())
            }
            ResponsesEventType::ContentPartDone => {
                if self.open_content_parts == 0 {
                    return Err(protocol_error("content_part.done received without a matching content_part.added"));
                }
                self.open_content_parts -= 1;
                Ok(())
            }
            ResponsesEventType::OutputTextDelta
            | ResponsesEventType::OutputTextDone
            | ResponsesEventType::FunctionCallArgumentsDelta
            | ResponsesEventType::FunctionCallArgumentsDone
            | ResponsesEventType::ReasoningSummaryPartAdded
            | ResponsesEventType::ReasoningSummaryTextDelta
            | ResponsesEventType::WebSearchCallInProgress
            | ResponsesEventType::WebSearchCallSearching
            | ResponsesEventType::WebSearchCallCompleted => Ok(()),
            ResponsesEventType::Error => {
                self.errored = true;
                Ok(())
            }
            ResponsesEventType::Completed => {
                if self.open_output_items > 0 || self.open_content_parts > 0 {
                    return Err(protocol_error("completed received with unclosed output_item or content_part"));
                }
                self.completed = true;
                Ok(())
            }
        }
    }
}

fn protocol_error(message: impl Into<String>) -> ErrorField {
    ErrorField::new(ErrorCategory::StreamProtocol, message.into()).with_retryable(false)
}

/// A tool call accumulated across streaming fragments. Bytes are appended
/// in arrival order, and `id`/`name` are overwritten on first non-empty
/// presence rather than on every fragment, since a provider may send the
/// id once on the `Start` fragment and nothing but argument deltas
/// afterward.
#[derive(Debug, Default, Clone)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl AccumulatedToolCall {
    /// Whether this call is complete: all three
    /// of `id`, `name`, `arguments` must be non-empty.
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && !self.arguments.is_empty()
    }
}

/// Accumulates OpenAI-shaped streaming tool-call fragments, keyed by `id`
/// when present and falling back to `index` otherwise. Single-
/// writer during accumulation (the router), single-reader afterwards (the
/// caller of [`ChatToolCallAccumulator::finish`]) — no lock needed.
#[derive(Default)]
pub struct ChatToolCallAccumulator {
    by_index: BTreeMap<usize, AccumulatedToolCall>,
    index_to_id: BTreeMap<usize, String>,
}

impl ChatToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, fragment: &UnifiedStreamingToolCall) {
        match fragment {
            UnifiedStreamingToolCall::Start { index, id, function } => {
                let entry = self.by_index.entry(*index).or_default();
                if !id.is_empty() {
                    entry.id = id.clone();
                    self.index_to_id.insert(*index, id.clone());
                }
                if !function.name.is_empty() {
                    entry.name = function.name.clone();
                }
                entry.arguments.push_str(&function.arguments);
            }
            UnifiedStreamingToolCall::Delta { index, function } => {
                let entry = self.by_index.entry(*index).or_default();
                entry.arguments.push_str(&function.arguments);
            }
        }
    }

    /// Finalizes accumulation, returning every call that completed with a
    /// non-empty `{id, name, arguments}` triple, in index order (the order
    /// the provider originally introduced each call).
    pub fn finish(self) -> Vec<AccumulatedToolCall> {
        self.by_index
            .into_values()
            .filter(AccumulatedToolCall::is_complete)
            .collect()
    }
}

/// Accumulates responses-API tool-call fragments (`function_call.arguments.delta/done`),
/// keyed primarily by `item_id`, with a second-chance key of `call_id` and
/// a tertiary key of function name for fragments that arrive before any id
/// is known, migrated to the real id once it appears.
#[derive(Default)]
pub struct ResponsesToolCallAccumulator {
    entries: BTreeMap<String, AccumulatedToolCall>,
}

impl ResponsesToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `key` should be the best available identifier at the time of the
    /// call: `item_id` if present, else `call_id`, else the function name.
    /// Callers that later learn the real `item_id` for a tertiary-keyed
    /// entry should call [`Self::migrate`].
    pub fn accept_delta(&mut self, key: &str, name: Option<&str>, arguments_delta: &str) {
        let entry = self.entries.entry(key.to_string()).or_default();
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            entry.name = name.to_string();
        }
        if entry.id.is_empty() {
            entry.id = key.to_string();
        }
        entry.arguments.push_str(arguments_delta);
    }

    /// Re-keys an entry registered under a provisional key (e.g. function
    /// name, before the id was known) to its real id, preserving
    /// accumulated state.
    pub fn migrate(&mut self, provisional_key: &str, real_id: &str) {
        if provisional_key == real_id {
            return;
        }
        if let Some(mut entry) = self.entries.remove(provisional_key) {
            entry.id = real_id.to_string();
            self.entries.insert(real_id.to_string(), entry);
        }
    }

    pub fn finish(self) -> Vec<AccumulatedToolCall> {
        self.entries.into_values().filter(AccumulatedToolCall::is_complete).collect()
    }
}

/// Derives the event type a [`ResponsesChunk`] carries, for feeding into
/// [`ResponsesStateMachine::advance`].
pub fn responses_event_type(chunk: &ResponsesChunk) -> ResponsesEventType {
    chunk.event_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::chunk::{TextChunk, UnifiedFunctionDelta, UnifiedFunctionStart};

    #[test]
    fn sequencer_stamps_strictly_increasing_sequence_numbers() {
        let mut sequencer = Sequencer::new("openai");
        let first = sequencer.stamp(StreamChunkBody::Text(TextChunk { id: "1".into(), model: "m".into(), text: "a".into(), finish_reason: None }), false);
        let second = sequencer.stamp(StreamChunkBody::Text(TextChunk { id: "1".into(), model: "m".into(), text: "b".into(), finish_reason: None }), true);

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.latency_ms, 0);
    }

    #[test]
    fn responses_state_machine_accepts_well_nested_sequence() {
        let mut machine = ResponsesStateMachine::new();
        let events = [
            ResponsesEventType::Created,
            ResponsesEventType::InProgress,
            ResponsesEventType::OutputItemAdded,
            ResponsesEventType::ContentPartAdded,
            ResponsesEventType::OutputTextDelta,
            ResponsesEventType::OutputTextDone,
            ResponsesEventType::ContentPartDone,
            ResponsesEventType::OutputItemDone,
            ResponsesEventType::Completed,
        ];
        for event in events {
            machine.advance(event).unwrap();
        }
    }

    #[test]
    fn responses_state_machine_rejects_completed_with_unclosed_item() {
        let mut machine = ResponsesStateMachine::new();
        machine.advance(ResponsesEventType::Created).unwrap();
        machine.advance(ResponsesEventType::OutputItemAdded).unwrap();
        let error = machine.advance(ResponsesEventType::Completed).unwrap_err();
        assert_eq!(error.category, ErrorCategory::StreamProtocol);
    }

    #[test]
    fn responses_state_machine_rejects_content_part_done_without_added() {
        let mut machine = ResponsesStateMachine::new();
        machine.advance(ResponsesEventType::OutputItemAdded).unwrap();
        let error = machine.advance(ResponsesEventType::ContentPartDone).unwrap_err();
        assert_eq!(error.category, ErrorCategory::StreamProtocol);
    }

    #[test]
    fn chat_tool_call_accumulator_appends_arguments_in_order() {
        let mut accumulator = ChatToolCallAccumulator::new();
        accumulator.accept(&UnifiedStreamingToolCall::Start {
            index: 0,
            id: "call_1".to_string(),
            function: UnifiedFunctionStart { name: "get_weather".to_string(), arguments: "{\"loc".to_string() },
        });
        accumulator.accept(&UnifiedStreamingToolCall::Delta {
            index: 0,
            function: UnifiedFunctionDelta { arguments: "ation\":\"NYC\"}".to_string() },
        });

        let calls = accumulator.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, "{\"location\":\"NYC\"}");
    }

    #[test]
    fn chat_tool_call_accumulator_drops_incomplete_calls() {
        let mut accumulator = ChatToolCallAccumulator::new();
        accumulator.accept(&UnifiedStreamingToolCall::Delta {
            index: 0,
            function: UnifiedFunctionDelta { arguments: "{}".to_string() },
        });

        assert!(accumulator.finish().is_empty());
    }

    #[test]
    fn responses_tool_call_accumulator_migrates_provisional_key() {
        let mut accumulator = ResponsesToolCallAccumulator::new();
        accumulator.accept_delta("get_weather", Some("get_weather"), "{\"loc\":1}");
        accumulator.migrate("get_weather", "item_123");

        let calls = accumulator.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "item_123");
        assert_eq!(calls[0].arguments, "{\"loc\":1}");
    }

    #[test]
    fn batched_stream_detection_requires_minimum_sample_size() {
        let sequencer = Sequencer::new("openai");
        assert!(!sequencer.is_batched());
    }

    #[test]
    fn terminal_chunk_carries_batched_flag_when_stream_is_degenerate() {
        let mut sequencer = Sequencer::new("openai");
        let mut last = None;
        for i in 0..25 {
            let chunk = sequencer.stamp(StreamChunkBody::Text(TextChunk { id: "1".into(), model: "m".into(), text: i.to_string(), finish_reason: None }), false);
            assert!(!chunk.batched);
            last = Some(chunk);
        }
        let _ = last;

        let terminal = sequencer.stamp(StreamChunkBody::Text(TextChunk { id: "1".into(), model: "m".into(), text: "done".into(), finish_reason: None }), true);
        assert!(terminal.batched);
    }

    #[test]
    fn non_terminal_chunks_never_carry_the_batched_flag() {
        let mut sequencer = Sequencer::new("openai");
        let chunk = sequencer.stamp(StreamChunkBody::Text(TextChunk { id: "1".into(), model: "m".into(), text: "a".into(), finish_reason: None }), false);
        assert!(!chunk.batched);
    }
}
