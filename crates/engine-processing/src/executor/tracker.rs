use engine_core::connectors::source::SourcePosition;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    InFlight,
    Committed { items: u64 },
    Failed,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    position: SourcePosition,
    state: ChunkState,
}

/// Orders chunk completions so that only a prefix of fully committed chunks
/// is ever checkpointed.
///
/// Chunks are registered in read order together with the source position
/// taken right after they were read. Completions may arrive in any order;
/// `advance` yields the position of the last chunk of the committed prefix.
/// A failed chunk pins the watermark for the rest of the step.
#[derive(Debug, Default)]
pub struct CheckpointTracker {
    chunks: VecDeque<Entry>,
    items_committed: u64,
}

impl CheckpointTracker {
    pub fn new(items_committed: u64) -> Self {
        Self {
            chunks: VecDeque::new(),
            items_committed,
        }
    }

    pub fn register(&mut self, seq: u64, position: SourcePosition) {
        self.chunks.push_back(Entry {
            seq,
            position,
            state: ChunkState::InFlight,
        });
    }

    pub fn committed(&mut self, seq: u64, items: u64) {
        self.set(seq, ChunkState::Committed { items });
    }

    pub fn failed(&mut self, seq: u64) {
        self.set(seq, ChunkState::Failed);
    }

    /// Items written by all chunks at or below the watermark.
    pub fn items_committed(&self) -> u64 {
        self.items_committed
    }

    /// Pops the committed prefix and returns its last position, if any.
    pub fn advance(&mut self) -> Option<SourcePosition> {
        let mut latest = None;
        while let Some(ChunkState::Committed { items }) = self.chunks.front().map(|e| e.state) {
            if let Some(entry) = self.chunks.pop_front() {
                self.items_committed += items;
                latest = Some(entry.position);
            }
        }
        latest
    }

    fn set(&mut self, seq: u64, state: ChunkState) {
        if let Some(entry) = self.chunks.iter_mut().find(|e| e.seq == seq) {
            entry.state = state;
        }
    }
}
