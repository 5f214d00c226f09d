// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Binding the command list to the frame's rendering target.

Each host submission model gets one [SubmissionModel] implementation.  The scheduler owns
the policy shared by both (unsubscribe when empty, rebuild when dirty, retire one-shot
handles); the models own what differs: which callbacks count as the start of a frame and
how the list reaches the GPU.
*/

use std::fmt::Debug;

use crate::command_list::CommandList;
use crate::host::{ExecutionContext, InsertionPoint, RenderHost, SubmissionKind, TargetId, TargetInfo};

/// A frame callback delivered by the host.
pub(crate) enum FrameEvent<'a> {
    /// A target is about to render.  May fire several times per frame.
    PreRender { target: TargetInfo, frame_index: u64 },
    /// The frame is starting, with every target it will render.
    BeginFrame {
        context: &'a mut dyn ExecutionContext,
        targets: &'a [TargetInfo],
    },
}

impl FrameEvent<'_> {
    pub(crate) fn kind(&self) -> SubmissionKind {
        match self {
            FrameEvent::PreRender { .. } => SubmissionKind::PerTarget,
            FrameEvent::BeginFrame { .. } => SubmissionKind::FrameWide,
        }
    }
}

pub(crate) trait SubmissionModel: Debug {
    fn kind(&self) -> SubmissionKind;

    /// Whether `event` is the one callback of its frame that should be processed.
    fn begins_frame(&mut self, event: &FrameEvent<'_>) -> bool;

    /// Whether what is already bound on the host is correct for `event`.
    fn is_current(&self, event: &FrameEvent<'_>, dirty: bool) -> bool;

    fn submit(&mut self, host: &mut dyn RenderHost, list: &CommandList, event: FrameEvent<'_>);

    /// Removes anything [Self::submit] left bound on the host.
    fn release(&mut self, host: &mut dyn RenderHost, list: &CommandList);

    fn bound_target(&self) -> Option<TargetId> {
        None
    }
}

pub(crate) fn for_kind(kind: SubmissionKind) -> Box<dyn SubmissionModel> {
    match kind {
        SubmissionKind::PerTarget => Box::new(PerTargetSubmission::default()),
        SubmissionKind::FrameWide => Box::new(FrameWideSubmission),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
    target: TargetId,
    at: InsertionPoint,
}

/**
Per-target model.

The list is attached to at most one target at a time.  Only the first pre-render callback
of each frame index is processed; later ones in the same frame come from other targets
rendering in the same tick.
*/
#[derive(Debug, Default)]
pub(crate) struct PerTargetSubmission {
    bound: Option<Binding>,
    last_frame: Option<u64>,
}

impl SubmissionModel for PerTargetSubmission {
    fn kind(&self) -> SubmissionKind {
        SubmissionKind::PerTarget
    }

    fn begins_frame(&mut self, event: &FrameEvent<'_>) -> bool {
        let FrameEvent::PreRender { frame_index, .. } = event else {
            return false;
        };
        if self.last_frame == Some(*frame_index) {
            return false;
        }
        self.last_frame = Some(*frame_index);
        true
    }

    fn is_current(&self, event: &FrameEvent<'_>, dirty: bool) -> bool {
        let FrameEvent::PreRender { target, .. } = event else {
            return false;
        };
        !dirty
            && self.bound
                == Some(Binding {
                    target: target.id,
                    at: target.rendering_path.insertion_point(),
                })
    }

    fn submit(&mut self, host: &mut dyn RenderHost, list: &CommandList, event: FrameEvent<'_>) {
        let FrameEvent::PreRender { target, frame_index } = event else {
            return;
        };
        if let Some(previous) = self.bound.take() {
            host.detach(previous.target, previous.at, list);
            if previous.target != target.id {
                logwise::info_sync!(
                    "rebinding uploads from target {from} to {to} at frame {frame}",
                    from = previous.target.0,
                    to = target.id.0,
                    frame = frame_index
                );
            }
        }
        let at = target.rendering_path.insertion_point();
        host.attach(target.id, at, list);
        self.bound = Some(Binding { target: target.id, at });
    }

    fn release(&mut self, host: &mut dyn RenderHost, list: &CommandList) {
        if let Some(previous) = self.bound.take() {
            host.detach(previous.target, previous.at, list);
        }
    }

    fn bound_target(&self) -> Option<TargetId> {
        self.bound.map(|b| b.target)
    }
}

/// Frame-wide model: the host iterates targets itself, so the list is just executed.
#[derive(Debug, Default)]
pub(crate) struct FrameWideSubmission;

impl SubmissionModel for FrameWideSubmission {
    fn kind(&self) -> SubmissionKind {
        SubmissionKind::FrameWide
    }

    fn begins_frame(&mut self, event: &FrameEvent<'_>) -> bool {
        matches!(event, FrameEvent::BeginFrame { .. })
    }

    fn is_current(&self, _event: &FrameEvent<'_>, _dirty: bool) -> bool {
        false
    }

    fn submit(&mut self, _host: &mut dyn RenderHost, list: &CommandList, event: FrameEvent<'_>) {
        if let FrameEvent::BeginFrame { context, targets } = event {
            logwise::trace_sync!(
                "executing {count} uploads for a frame of {targets} targets",
                count = list.len(),
                targets = targets.len()
            );
            context.execute(list);
        }
    }

    fn release(&mut self, _host: &mut dyn RenderHost, _list: &CommandList) {}
}
