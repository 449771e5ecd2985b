/// Per-type publish depth tracking
///
/// Nested publishes recurse depth-first. A chain of same-type publishes that
/// goes deeper than the configured limit is a cyclic event storm: the
/// refusing publish flags the type, and every outer frame of that type stops
/// before its next handler. The flag clears when the chain fully unwinds.
use dashmap::DashMap;
use std::any::TypeId;

#[derive(Debug, Default, Clone, Copy)]
struct FrameDepth {
    depth: usize,
    storming: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ReentrancyTracker {
    frames: DashMap<TypeId, FrameDepth>,
}

impl ReentrancyTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enters a publish frame. Returns the new depth, or `Err(depth)` if the
    /// limit is already reached, in which case the type is marked storming.
    pub(crate) fn enter(&self, type_id: TypeId, max_depth: usize) -> Result<usize, usize> {
        let mut frame = self.frames.entry(type_id).or_default();
        if frame.depth >= max_depth {
            frame.storming = true;
            return Err(frame.depth);
        }
        frame.depth += 1;
        Ok(frame.depth)
    }

    pub(crate) fn exit(&self, type_id: TypeId) {
        if let Some(mut frame) = self.frames.get_mut(&type_id) {
            frame.depth = frame.depth.saturating_sub(1);
            if frame.depth == 0 {
                frame.storming = false;
            }
        }
    }

    pub(crate) fn is_storming(&self, type_id: TypeId) -> bool {
        self.frames.get(&type_id).map(|f| f.storming).unwrap_or(false)
    }

    pub(crate) fn depth(&self, type_id: TypeId) -> usize {
        self.frames.get(&type_id).map(|f| f.depth).unwrap_or(0)
    }
}

/// Leaves the frame on drop, including when a publish unwinds.
pub(crate) struct FrameGuard<'a> {
    tracker: &'a ReentrancyTracker,
    type_id: TypeId,
}

impl<'a> FrameGuard<'a> {
    pub(crate) fn new(tracker: &'a ReentrancyTracker, type_id: TypeId) -> Self {
        Self { tracker, type_id }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.tracker.exit(self.type_id);
    }
}
