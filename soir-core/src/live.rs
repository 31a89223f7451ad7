//! Live registry: setup blocks that re-run only when their source changes.
//!
//! A live is idempotent setup code. On re-declaration the engine compares
//! the textual slice of the snapshot that defined it against the slice
//! captured last time; only a differing slice triggers a re-run. Loops,
//! by contrast, are re-entered on beat boundaries regardless of edits.

use crate::api::{Api, Body};
use crate::engine::State;
use crate::host::Host;

/// A line range into the snapshot text, 1-based and inclusive.
///
/// Recorded at declaration time by whatever front-end produced the
/// snapshot; the engine only slices with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The text covered by this span.
    pub fn slice(&self, text: &str) -> String {
        let start = self.start.max(1) - 1;
        let count = self.end.saturating_sub(start);
        text.lines()
            .skip(start)
            .take(count)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub(crate) struct LiveArtifact {
    pub body: Body,
    /// Source slice captured at registration, the change detector.
    pub source: String,
    pub updated_at: u64,
    pub eval_at: f64,
}

/// Register or refresh a live under the current generation, running its
/// body when it is new or its source changed.
pub(crate) fn declare(st: &mut State, host: &dyn Host, name: &str, span: SourceSpan, body: Body) {
    let source = span.slice(&st.code);

    if !st.lives.contains_key(name) {
        st.lives.insert(
            name.to_string(),
            LiveArtifact {
                body,
                source,
                updated_at: st.generation,
                eval_at: st.timeline.beat(),
            },
        );
        run(st, host, name);
        return;
    }

    let now = st.timeline.beat();
    let mut changed = false;
    if let Some(lv) = st.lives.get_mut(name) {
        lv.updated_at = st.generation;
        if lv.source != source {
            lv.body = body;
            lv.source = source;
            lv.eval_at = now;
            changed = true;
        }
    }
    if changed {
        run(st, host, name);
    }
}

/// Execute a live body right away under a "current live" binding.
fn run(st: &mut State, host: &dyn Host, name: &str) {
    let body = match st.lives.get(name) {
        Some(lv) => lv.body.clone(),
        None => return,
    };

    let previous = st.exec.current_live.replace(name.to_string());
    let result = {
        let mut api = Api::new(st, host);
        body(&mut api)
    };
    st.exec.current_live = previous;

    // A failing body stays registered: it will re-run on the next
    // source change.
    if let Err(e) = result {
        host.log(&format!("error in live {}: {:#}", name, e));
    }
}
