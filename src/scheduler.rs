// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The frame scheduler.

Tracks which handles want an upload, keeps one command list reflecting them, and hands
that list to the host once per frame.

Handles are split into two sets:

* `repeating`, uploaded every frame until cancelled,
* `one_shot`, uploaded on the next processed frame and then forgotten.

A handle is in at most one set.  Asking for every-frame updates on a one-shot handle moves
it; asking for a one-shot update on a repeating handle does nothing.

The command list is rebuilt lazily: any change to the sets marks it dirty and the next
processed frame rebuilds it.

Requests a handle makes while a frame is being dispatched can't reach the scheduler.  They
wait on the handle and are picked up when the next frame begins.

The scheduler subscribes to the host's frame callbacks when its first handle is added and
unsubscribes when the last one is removed (or when a frame arrives with nothing to do).

Everything here runs on the thread driving the host frame loop; see [crate::runtime].
*/

mod submission;

use std::rc::Rc;

use crate::command_list::CommandList;
use crate::config::Config;
use crate::handle::{Deferred, HandleState};
use crate::host::{RenderHost, SubmissionKind, TargetId};

pub(crate) use submission::FrameEvent;
use submission::SubmissionModel;

/// Snapshot of scheduler state, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub repeating: usize,
    pub one_shot: usize,
    pub dirty: bool,
    /// Submission model currently subscribed, if any.
    pub subscription: Option<SubmissionKind>,
    /// Target holding the command list (per-target model only).
    pub bound_target: Option<TargetId>,
    /// Commands in the most recently built list.
    pub commands: usize,
    pub rebuilds: u64,
    pub submissions: u64,
}

pub(crate) struct FrameScheduler {
    host: Box<dyn RenderHost>,
    config: Config,
    repeating: Vec<Rc<HandleState>>,
    one_shot: Vec<Rc<HandleState>>,
    dirty: bool,
    command_list: CommandList,
    //kept across unsubscription so the per-target frame guard survives resubscribing mid-frame
    submission: Option<Box<dyn SubmissionModel>>,
    subscribed: bool,
    rebuilds: u64,
    submissions: u64,
}

fn position(set: &[Rc<HandleState>], state: &Rc<HandleState>) -> Option<usize> {
    set.iter().position(|h| Rc::ptr_eq(h, state))
}

fn remove(set: &mut Vec<Rc<HandleState>>, state: &Rc<HandleState>) -> bool {
    match position(set, state) {
        Some(index) => {
            set.remove(index);
            true
        }
        None => false,
    }
}

impl FrameScheduler {
    pub(crate) fn new(host: Box<dyn RenderHost>, config: Config) -> Self {
        let command_list = CommandList::new(config.label.clone());
        FrameScheduler {
            host,
            config,
            repeating: Vec::new(),
            one_shot: Vec::new(),
            dirty: false,
            command_list,
            submission: None,
            subscribed: false,
            rebuilds: 0,
            submissions: 0,
        }
    }

    fn handles_count(&self) -> usize {
        self.repeating.len() + self.one_shot.len()
    }

    pub(crate) fn schedule_repeating(&mut self, state: &Rc<HandleState>) {
        self.schedule(state, true)
    }

    pub(crate) fn schedule_once(&mut self, state: &Rc<HandleState>) {
        self.schedule(state, false)
    }

    fn schedule(&mut self, state: &Rc<HandleState>, every_frame: bool) {
        //scheduling again supersedes anything requested during the last dispatch
        if state.take_deferred() != Deferred::Nothing {
            self.dirty = true;
        }
        if !state.is_valid()
            || position(&self.repeating, state).is_some()
            || (!every_frame && position(&self.one_shot, state).is_some())
        {
            return;
        }
        if every_frame {
            remove(&mut self.one_shot, state);
            self.repeating.push(state.clone());
        } else {
            self.one_shot.push(state.clone());
        }
        self.dirty = true;
        if !self.subscribed {
            self.subscribe();
        }
    }

    /// Returns whether the handle was scheduled.
    pub(crate) fn cancel(&mut self, state: &Rc<HandleState>) -> bool {
        let removed = remove(&mut self.repeating, state) || remove(&mut self.one_shot, state);
        if removed {
            self.dirty = true;
            if self.subscribed && self.handles_count() == 0 {
                self.unsubscribe();
            }
        }
        removed
    }

    pub(crate) fn mark_dirty(&mut self, state: &Rc<HandleState>) {
        if self.is_scheduled(state) {
            self.dirty = true;
        }
    }

    pub(crate) fn is_scheduled(&self, state: &Rc<HandleState>) -> bool {
        position(&self.repeating, state).is_some() || position(&self.one_shot, state).is_some()
    }

    fn rebuild_command_list(&mut self) {
        self.command_list.clear();
        for state in self.repeating.iter().chain(self.one_shot.iter()) {
            state.fill_command_list(&mut self.command_list);
        }
        self.dirty = false;
        self.rebuilds += 1;
        logwise::trace_sync!(
            "rebuilt command list with {count} uploads ({repeating} repeating, {one_shot} one-shot)",
            count = self.command_list.len(),
            repeating = self.repeating.len(),
            one_shot = self.one_shot.len()
        );
    }

    /**
    Applies what changed while the scheduler couldn't be reached.

    Drops handles that were cancelled mid-dispatch or disposed since they were scheduled,
    and marks the list dirty if a handle asked for it or a texture it points at is gone.
    */
    fn apply_deferred(&mut self) {
        let before = self.handles_count();
        let mut marked = false;
        for set in [&mut self.repeating, &mut self.one_shot] {
            set.retain(|state| match state.take_deferred() {
                Deferred::Cancel => false,
                deferred => {
                    marked |= deferred == Deferred::Dirty;
                    state.id().is_registered()
                }
            });
        }
        let dropped = before - self.handles_count();
        if dropped > 0 {
            logwise::trace_sync!("dropped {dropped} cancelled or disposed handles", dropped = dropped);
        }
        if dropped > 0 || marked || self.command_list.has_dead_targets() {
            self.dirty = true;
        }
    }

    //one-shot handles already in the built list fire this frame; the next rebuild drops them
    fn retire_one_shots(&mut self) {
        if !self.one_shot.is_empty() {
            self.one_shot.clear();
            self.dirty = true;
        }
    }

    fn subscribe(&mut self) {
        let kind = self.config.submission.resolve(self.host.submission_kind());
        if self.submission.as_ref().map(|s| s.kind()) != Some(kind) {
            self.submission = Some(submission::for_kind(kind));
        }
        self.host.subscribe(kind);
        self.subscribed = true;
        logwise::info_sync!("subscribed to {kind} frame callbacks", kind = logwise::privacy::LogIt(&kind));
    }

    fn unsubscribe(&mut self) {
        if !self.subscribed {
            return;
        }
        if let Some(model) = self.submission.as_mut() {
            self.host.unsubscribe(model.kind());
            model.release(self.host.as_mut(), &self.command_list);
            logwise::info_sync!(
                "unsubscribed from {kind} frame callbacks",
                kind = logwise::privacy::LogIt(&model.kind())
            );
        }
        self.subscribed = false;
    }

    /// Frame callback entry point shared by both submission models.
    pub(crate) fn on_frame(&mut self, event: FrameEvent<'_>) {
        if !self.subscribed {
            return;
        }
        {
            let Some(model) = self.submission.as_mut() else {
                return;
            };
            if model.kind() != event.kind() {
                logwise::warn_sync!(
                    "ignoring {got} frame callback while subscribed to {expected}",
                    got = logwise::privacy::LogIt(&event.kind()),
                    expected = logwise::privacy::LogIt(&model.kind())
                );
                return;
            }
            if !model.begins_frame(&event) {
                return;
            }
        }
        self.apply_deferred();
        if self.handles_count() == 0 {
            self.unsubscribe();
            return;
        }
        if self
            .submission
            .as_ref()
            .is_some_and(|model| model.is_current(&event, self.dirty))
        {
            return;
        }
        if self.dirty {
            self.rebuild_command_list();
        }
        self.retire_one_shots();
        if let Some(model) = self.submission.as_mut() {
            model.submit(self.host.as_mut(), &self.command_list, event);
            self.submissions += 1;
        }
    }

    /**
    Clears both sets, releases the command list from the host, then unsubscribes.

    Idempotent.
    */
    pub(crate) fn shutdown(&mut self) {
        self.repeating.clear();
        self.one_shot.clear();
        if let Some(model) = self.submission.as_mut() {
            model.release(self.host.as_mut(), &self.command_list);
        }
        self.command_list.clear();
        self.dirty = false;
        self.unsubscribe();
    }

    pub(crate) fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            repeating: self.repeating.len(),
            one_shot: self.one_shot.len(),
            dirty: self.dirty,
            subscription: if self.subscribed {
                self.submission.as_ref().map(|s| s.kind())
            } else {
                None
            },
            bound_target: self.submission.as_ref().and_then(|s| s.bound_target()),
            commands: self.command_list.len(),
            rebuilds: self.rebuilds,
            submissions: self.submissions,
        }
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("config", &self.config)
            .field("repeating", &self.repeating)
            .field("one_shot", &self.one_shot)
            .field("dirty", &self.dirty)
            .field("command_list", &self.command_list)
            .field("submission", &self.submission)
            .field("subscribed", &self.subscribed)
            .finish_non_exhaustive()
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
