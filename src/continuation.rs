//! Multi-pass continuation streaming.
//!
//! A single generation request is capped in output tokens, so the model
//! regularly runs out before finishing the document. This module drives up
//! to [`MAX_PASSES`] sequential sessions against an [`LlmClient`], asking
//! each follow-up pass to resume from where the previous one stopped, and
//! reduces the provider's raw fragments to true deltas along the way. The
//! caller consumes a lazy sequence of deltas; concatenated, they are
//! exactly the final document, ending at the first end marker when one
//! was produced.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::constants::{END_MARK, MAX_PASSES, TAIL_WINDOW};
use crate::llms::{GenerationRequest, LlmClient, LlmError, StreamEvent};
use crate::reconcile::{END_MARK_MAX_LEN, end_mark_end, incremental_delta, stitch};

/// Shared cancellation flag.
///
/// Setting it stops the orchestrator before the next emission or pass; it
/// never interrupts an in-flight network read. Consumers should check it
/// after every delta they receive and abandon the stream once set.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pass orchestrator: `Idle → Running(pass 1..N) → done`, where done is
/// either the end marker (complete), the pass budget (partial document),
/// a provider failure, or cancellation.
pub struct ContinuationStreamer {
    client: Arc<dyn LlmClient>,
    max_passes: usize,
    tail_window: usize,
}

impl ContinuationStreamer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client, max_passes: MAX_PASSES, tail_window: TAIL_WINDOW }
    }

    #[must_use]
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    #[must_use]
    pub fn with_tail_window(mut self, tail_window: usize) -> Self {
        self.tail_window = tail_window;
        self
    }

    /// Start streaming. Returns a lazy, finite sequence of document
    /// deltas; it ends when the end marker appears, the pass budget is
    /// exhausted (no error — the partial document is the result), or a
    /// failure was yielded.
    pub fn stream(&self, initial_prompt: String, cancel: CancelFlag) -> DeltaStream {
        let (tx, rx) = mpsc::channel();
        let client = Arc::clone(&self.client);
        let max_passes = self.max_passes;
        let tail_window = self.tail_window;

        thread::spawn(move || {
            run_passes(&client, &initial_prompt, max_passes, tail_window, &cancel, &tx);
        });

        DeltaStream { rx }
    }
}

/// Lazy sequence of emitted document deltas. Each item is a non-empty
/// delta or the provider failure that ended the stream.
pub struct DeltaStream {
    rx: Receiver<Result<String, LlmError>>,
}

impl Iterator for DeltaStream {
    type Item = Result<String, LlmError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

/// Outcome of emitting one delta.
enum Step {
    /// Keep going.
    Continue,
    /// End marker reached; the document is complete.
    Complete,
    /// Consumer dropped the stream.
    Stopped,
}

fn run_passes(
    client: &Arc<dyn LlmClient>,
    initial_prompt: &str,
    max_passes: usize,
    tail_window: usize,
    cancel: &CancelFlag,
    tx: &Sender<Result<String, LlmError>>,
) {
    let mut acc = String::new();

    for pass in 1..=max_passes {
        if cancel.is_cancelled() {
            return;
        }

        let prompt = if pass == 1 {
            initial_prompt.to_string()
        } else {
            continuation_prompt(&acc, tail_window)
        };
        let request = GenerationRequest { prompt };

        let (ptx, prx) = mpsc::channel();
        let pass_client = Arc::clone(client);
        let handle = thread::spawn(move || {
            if let Err(e) = pass_client.stream(&request, ptx.clone()) {
                let _ = ptx.send(StreamEvent::Error(e));
            }
        });

        // Raw text observed from this session, pre-delta-extraction.
        // Resets every pass, unlike the accumulator.
        let mut seen = String::new();
        let mut final_text: Option<String> = None;

        for event in prx.iter() {
            match event {
                StreamEvent::Fragment(raw) => {
                    let delta = incremental_delta(&seen, &raw).to_string();
                    if delta.is_empty() {
                        continue;
                    }
                    seen.push_str(&delta);
                    match emit(tx, &mut acc, &delta) {
                        Step::Continue => {}
                        Step::Complete | Step::Stopped => return,
                    }
                    if cancel.is_cancelled() {
                        return;
                    }
                }
                StreamEvent::Done { final_text: f } => {
                    final_text = f;
                    break;
                }
                StreamEvent::Error(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }

        // The session must have fully ended before the next pass starts.
        let _ = handle.join();

        // Reconcile against the end-of-session snapshot: recover any
        // trailing content the fragment stream dropped, never re-emitting
        // text already yielded.
        if let Some(full) = final_text {
            let merged = stitch(&seen, &full);
            let tail = incremental_delta(&seen, &merged).to_string();
            if !tail.is_empty() {
                match emit(tx, &mut acc, &tail) {
                    Step::Continue => {}
                    Step::Complete | Step::Stopped => return,
                }
            }
        }

        if cancel.is_cancelled() {
            return;
        }
    }

    // Pass budget exhausted without an end marker: degraded success. The
    // channel closes and the caller keeps whatever accumulated.
}

/// Append `delta` to the accumulator and forward the part that survives
/// end-marker truncation. Once a marker appears the accumulated document
/// ends exactly at its first occurrence, marker included.
fn emit(tx: &Sender<Result<String, LlmError>>, acc: &mut String, delta: &str) -> Step {
    acc.push_str(delta);

    // Earlier emissions already cleared everything before this delta, so
    // only the tail (delta plus one marker-length of slack) needs a scan.
    let mut start = acc.len().saturating_sub(delta.len() + END_MARK_MAX_LEN);
    while !acc.is_char_boundary(start) {
        start -= 1;
    }

    if let Some(rel_end) = end_mark_end(&acc[start..]) {
        let end = start + rel_end;
        let overshoot = acc.len() - end;
        acc.truncate(end);
        let kept = delta.len().saturating_sub(overshoot);
        if kept > 0 {
            let _ = tx.send(Ok(delta[..kept].to_string()));
        }
        return Step::Complete;
    }

    if tx.send(Ok(delta.to_string())).is_err() {
        return Step::Stopped;
    }
    Step::Continue
}

/// Build the pass-k (k > 1) prompt: resume instructions plus a bounded
/// tail of the accumulated document as the anchor.
pub fn continuation_prompt(acc: &str, tail_window: usize) -> String {
    [
        "Continue the SAME README from exactly where you left off.",
        "Do NOT repeat any text already written.",
        &format!("End by emitting {} once.", END_MARK),
        "Tail:",
        "```markdown",
        tail_chars(acc, tail_window),
        "```",
    ]
    .join("\n")
}

/// Last `n` characters of `s` (the whole string when shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted provider: plays back one list of events per pass and
    /// records every prompt it was asked to stream.
    struct ScriptedClient {
        passes: Mutex<VecDeque<Vec<StreamEvent>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(passes: Vec<Vec<StreamEvent>>) -> Arc<Self> {
            Arc::new(Self {
                passes: Mutex::new(passes.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl LlmClient for ScriptedClient {
        fn stream(&self, request: &GenerationRequest, tx: Sender<StreamEvent>) -> Result<(), LlmError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let events = self.passes.lock().unwrap().pop_front().unwrap_or_default();
            for event in events {
                let _ = tx.send(event);
            }
            Ok(())
        }
    }

    fn frag(s: &str) -> StreamEvent {
        StreamEvent::Fragment(s.to_string())
    }

    fn done(final_text: Option<&str>) -> StreamEvent {
        StreamEvent::Done { final_text: final_text.map(str::to_string) }
    }

    fn collect_ok(stream: DeltaStream) -> String {
        stream.map(|r| r.expect("stream should not fail")).collect()
    }

    #[test]
    fn cumulative_fragments_yield_no_duplicates() {
        let client = ScriptedClient::new(vec![vec![
            frag("Hello"),
            frag("Hello wor"), // cumulative resend
            frag("ld"),
            done(None),
        ]]);
        let streamer = ContinuationStreamer::new(client).with_max_passes(1);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "Hello world");
    }

    #[test]
    fn exact_resends_and_empty_fragments_are_dropped() {
        let client = ScriptedClient::new(vec![vec![
            frag("abc"),
            frag(""),
            frag("abc"), // exact resend
            frag("def"),
            done(None),
        ]]);
        let streamer = ContinuationStreamer::new(client).with_max_passes(1);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "abcdef");
    }

    #[test]
    fn snapshot_recovers_dropped_tail() {
        let client = ScriptedClient::new(vec![vec![
            frag("hello wor"),
            done(Some("hello world!")),
        ]]);
        let streamer = ContinuationStreamer::new(client).with_max_passes(1);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "hello world!");
    }

    #[test]
    fn shorter_snapshot_adds_nothing() {
        let client = ScriptedClient::new(vec![vec![
            frag("hello world"),
            done(Some("hello")),
        ]]);
        let streamer = ContinuationStreamer::new(client).with_max_passes(1);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "hello world");
    }

    #[test]
    fn disjoint_longer_snapshot_is_kept() {
        // No shared boundary at all: the longer candidate wins, appended
        // past its (empty) common prefix with what was observed.
        let client = ScriptedClient::new(vec![vec![
            frag("abc"),
            done(Some("xyzuvw")),
        ]]);
        let streamer = ContinuationStreamer::new(client).with_max_passes(1);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "abcxyzuvw");
    }

    #[test]
    fn end_mark_in_second_pass_stops_after_two_passes() {
        let client = ScriptedClient::new(vec![
            vec![frag("# Title\nSome body text"), done(None)],
            vec![
                frag("more text <!-- END_OF_README -->"),
                frag(" trailing junk"),
                done(None),
            ],
            vec![frag("never requested"), done(None)],
        ]);
        let streamer = ContinuationStreamer::new(Arc::clone(&client) as Arc<dyn LlmClient>);
        let out = collect_ok(streamer.stream("initial".into(), CancelFlag::new()));

        assert!(out.ends_with(END_MARK));
        assert_eq!(out.matches(END_MARK).count(), 1);
        assert!(out.starts_with("# Title\nSome body text"));
        assert_eq!(client.prompts().len(), 2);
    }

    #[test]
    fn text_after_mid_fragment_end_mark_is_cut() {
        let client = ScriptedClient::new(vec![vec![
            frag("done <!-- END_OF_README --> extra chatter"),
            done(None),
        ]]);
        let streamer = ContinuationStreamer::new(client).with_max_passes(1);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "done <!-- END_OF_README -->");
    }

    #[test]
    fn escaped_end_mark_also_completes() {
        let client = ScriptedClient::new(vec![
            vec![frag("body &lt;!-- END_OF_README --&gt; tail"), done(None)],
            vec![frag("second pass"), done(None)],
        ]);
        let streamer = ContinuationStreamer::new(Arc::clone(&client) as Arc<dyn LlmClient>);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));
        assert_eq!(out, "body &lt;!-- END_OF_README --&gt;");
        assert_eq!(client.prompts().len(), 1);
    }

    #[test]
    fn pass_budget_is_respected() {
        let client = ScriptedClient::new(vec![
            vec![frag("one "), done(None)],
            vec![frag("two "), done(None)],
            vec![frag("three"), done(None)],
        ]);
        let streamer = ContinuationStreamer::new(Arc::clone(&client) as Arc<dyn LlmClient>)
            .with_max_passes(3);
        let out = collect_ok(streamer.stream("p".into(), CancelFlag::new()));

        assert_eq!(out, "one two three");
        assert_eq!(client.prompts().len(), 3);
        assert!(!crate::reconcile::contains_end_mark(&out));
    }

    #[test]
    fn continuation_prompt_differs_and_carries_bounded_tail() {
        let pass_one = format!("START{}", "x".repeat(2000));
        let client = ScriptedClient::new(vec![
            vec![frag(&pass_one), done(None)],
            vec![done(None)],
        ]);
        let streamer = ContinuationStreamer::new(Arc::clone(&client) as Arc<dyn LlmClient>)
            .with_max_passes(2);
        let _ = collect_ok(streamer.stream("initial prompt".into(), CancelFlag::new()));

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], "initial prompt");
        assert_ne!(prompts[1], prompts[0]);
        assert!(prompts[1].starts_with("Continue the SAME README"));
        assert!(prompts[1].contains(END_MARK));
        // Anchor is bounded by the tail window: exactly the last 1200
        // chars made it in, the leading "START" did not.
        assert!(prompts[1].contains(&"x".repeat(1200)));
        assert!(!prompts[1].contains("START"));
    }

    #[test]
    fn provider_error_surfaces_as_stream_failure() {
        let client = ScriptedClient::new(vec![vec![
            frag("partial "),
            StreamEvent::Error(LlmError::Api { status: 429, body: "rate limited".into() }),
        ]]);
        let streamer = ContinuationStreamer::new(client);
        let items: Vec<_> = streamer.stream("p".into(), CancelFlag::new()).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial ");
        assert!(matches!(items[1], Err(LlmError::Api { status: 429, .. })));
    }

    #[test]
    fn cancel_before_start_makes_no_calls() {
        let client = ScriptedClient::new(vec![vec![frag("never"), done(None)]]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let streamer = ContinuationStreamer::new(Arc::clone(&client) as Arc<dyn LlmClient>);
        let items: Vec<_> = streamer.stream("p".into(), cancel).collect();

        assert!(items.is_empty());
        assert!(client.prompts().is_empty());
    }

    #[test]
    fn tail_chars_handles_sizes_and_multibyte() {
        assert_eq!(tail_chars("hello", 3), "llo");
        assert_eq!(tail_chars("hi", 10), "hi");
        assert_eq!(tail_chars("hello", 0), "");
        assert_eq!(tail_chars("héllö", 2), "lö");
    }
}
