// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The host rendering subsystem, as seen by the scheduler.

Hosts submit work in one of two ways:

* **Per target**: the host keeps a set of command lists attached to each rendering target
  (camera) at some insertion point, and fires a pre-render callback for every target it
  draws.  Several targets may render in one frame.
* **Frame wide**: the host fires one callback per frame with the full list of targets and
  an [ExecutionContext] to submit work through directly.

The scheduler asks which one is in use when it subscribes and only listens to that one.
*/

use crate::command_list::CommandList;

/// Identity of a rendering target such as a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// Rendering path a target is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderingPath {
    #[default]
    Forward,
    VertexLit,
    DeferredLighting,
    DeferredShading,
}

/// Stage of a target's rendering at which an attached list runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertionPoint {
    BeforeGBuffer,
    BeforeForwardOpaque,
}

impl RenderingPath {
    /// The earliest stage on this path, which is where uploads have to land.
    pub const fn insertion_point(self) -> InsertionPoint {
        match self {
            RenderingPath::DeferredLighting | RenderingPath::DeferredShading => InsertionPoint::BeforeGBuffer,
            RenderingPath::Forward | RenderingPath::VertexLit => InsertionPoint::BeforeForwardOpaque,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetInfo {
    pub id: TargetId,
    pub rendering_path: RenderingPath,
}

impl TargetInfo {
    pub const fn new(id: TargetId, rendering_path: RenderingPath) -> Self {
        TargetInfo { id, rendering_path }
    }
}

/// The two submission models a host can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionKind {
    /// One pre-render callback per target, lists attached to targets.
    PerTarget,
    /// One callback per frame with an execution context.
    FrameWide,
}

/**
Receives the command list for immediate execution in the current frame.
*/
pub trait ExecutionContext {
    fn execute(&mut self, list: &CommandList);
}

/**
Host rendering subsystem.

Implementations must not call back into the scheduler from any of these methods; the
scheduler is mid-dispatch while they run and will refuse with [crate::error::ScheduleError::Busy].
*/
pub trait RenderHost {
    /// Submission model of the active pipeline.  Queried each time the scheduler subscribes.
    fn submission_kind(&self) -> SubmissionKind;

    /// Start delivering `kind` frame callbacks to the scheduler.
    fn subscribe(&mut self, kind: SubmissionKind);
    /// Stop delivering `kind` frame callbacks.
    fn unsubscribe(&mut self, kind: SubmissionKind);

    /**
    Attach `list` to `target` at `at`.  The host replays it every time the target renders
    until it is detached.

    Only used by the per-target model.
    */
    fn attach(&mut self, target: TargetId, at: InsertionPoint, list: &CommandList) {
        let _ = (target, at, list);
    }
    /// Detach the list previously attached to `target` at `at`.
    fn detach(&mut self, target: TargetId, at: InsertionPoint, list: &CommandList) {
        let _ = (target, at, list);
    }
}
