// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Frame scheduling driven through the public runtime against a recording host.
//!
//! Each test installs its own scheduler on the test thread.
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use std::cell::RefCell;
use std::rc::Rc;

use texture_apply_async::command_list::CommandList;
use texture_apply_async::config::{Config, SubmissionPreference};
use texture_apply_async::error::{InitError, ScheduleError};
use texture_apply_async::host::{
    ExecutionContext, InsertionPoint, RenderHost, RenderingPath, SubmissionKind, TargetId, TargetInfo,
};
use texture_apply_async::native::{BufferRegistry, UploadId, UploadPrimitive};
use texture_apply_async::pixel_formats::TextureFormat;
use texture_apply_async::runtime::{self, RuntimeGuard};
use texture_apply_async::texture::{TextureDescriptor, UploadTarget};
use texture_apply_async::UploadHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Subscribe(SubmissionKind),
    Unsubscribe(SubmissionKind),
    Attach(TargetId, InsertionPoint, Vec<UploadId>),
    Detach(TargetId, InsertionPoint),
}

#[derive(Clone)]
struct Recorder {
    kind: SubmissionKind,
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Recorder {
    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
    fn attaches(&self) -> usize {
        self.calls.borrow().iter().filter(|c| matches!(c, Call::Attach(..))).count()
    }
    fn detaches(&self) -> usize {
        self.calls.borrow().iter().filter(|c| matches!(c, Call::Detach(..))).count()
    }
}

impl RenderHost for Recorder {
    fn submission_kind(&self) -> SubmissionKind {
        self.kind
    }
    fn subscribe(&mut self, kind: SubmissionKind) {
        self.calls.borrow_mut().push(Call::Subscribe(kind));
    }
    fn unsubscribe(&mut self, kind: SubmissionKind) {
        self.calls.borrow_mut().push(Call::Unsubscribe(kind));
    }
    fn attach(&mut self, target: TargetId, at: InsertionPoint, list: &CommandList) {
        self.calls.borrow_mut().push(Call::Attach(target, at, list.upload_ids()));
    }
    fn detach(&mut self, target: TargetId, at: InsertionPoint, _list: &CommandList) {
        self.calls.borrow_mut().push(Call::Detach(target, at));
    }
}

/// Records the ids executed each frame.
#[derive(Default)]
struct Capture {
    frames: Vec<Vec<UploadId>>,
}

impl ExecutionContext for Capture {
    fn execute(&mut self, list: &CommandList) {
        self.frames.push(list.upload_ids());
    }
}

struct Fixture {
    recorder: Recorder,
    registry: Rc<dyn UploadPrimitive>,
    textures: Vec<Rc<dyn UploadTarget>>,
    runtime: RuntimeGuard,
}

impl Fixture {
    fn new(kind: SubmissionKind) -> Self {
        Self::with_config(kind, Config::default())
    }

    fn with_config(kind: SubmissionKind, config: Config) -> Self {
        let recorder = Recorder {
            kind,
            calls: Rc::default(),
        };
        let runtime = runtime::init(Box::new(recorder.clone()), config).unwrap();
        Fixture {
            recorder,
            registry: Rc::new(BufferRegistry::new()),
            textures: Vec::new(),
            runtime,
        }
    }

    fn handle(&mut self) -> UploadHandle {
        let texture: Rc<dyn UploadTarget> = Rc::new(TextureDescriptor::new(
            format!("texture {}", self.textures.len()),
            4,
            4,
            TextureFormat::Rgba32,
        ));
        self.textures.push(texture.clone());
        UploadHandle::new(&texture, self.registry.clone()).unwrap()
    }
}

const T1: TargetInfo = TargetInfo::new(TargetId(1), RenderingPath::Forward);
const T2: TargetInfo = TargetInfo::new(TargetId(2), RenderingPath::Forward);

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn one_shot_uploads_exactly_once() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    h.schedule_once().unwrap();

    let mut capture = Capture::default();
    runtime::on_begin_frame(&mut capture, &[T1]).unwrap();
    runtime::on_begin_frame(&mut capture, &[T1]).unwrap();

    assert_eq!(capture.frames, vec![vec![h.id()]]);
    assert_eq!(
        fixture.recorder.calls(),
        vec![
            Call::Subscribe(SubmissionKind::FrameWide),
            Call::Unsubscribe(SubmissionKind::FrameWide)
        ]
    );
    let stats = runtime::stats().unwrap();
    assert_eq!(stats.one_shot, 0);
    assert_eq!(stats.subscription, None);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn repeating_outlives_one_shot() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h1 = fixture.handle();
    let h2 = fixture.handle();
    h1.schedule_every_frame().unwrap();
    h2.schedule_once().unwrap();

    let mut capture = Capture::default();
    runtime::on_begin_frame(&mut capture, &[T1, T2]).unwrap();
    runtime::on_begin_frame(&mut capture, &[T1, T2]).unwrap();
    runtime::on_begin_frame(&mut capture, &[T1, T2]).unwrap();

    assert_eq!(
        capture.frames,
        vec![vec![h1.id(), h2.id()], vec![h1.id()], vec![h1.id()]]
    );
    //the third frame reuses the list built for the second
    assert_eq!(runtime::stats().unwrap().rebuilds, 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn handles_are_never_duplicated() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let a = fixture.handle();
    let b = fixture.handle();

    a.schedule_once().unwrap();
    a.schedule_once().unwrap();
    b.schedule_every_frame().unwrap();
    b.schedule_every_frame().unwrap();
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.repeating, stats.one_shot), (1, 1));

    //upgrading moves the handle rather than copying it
    a.schedule_every_frame().unwrap();
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.repeating, stats.one_shot), (2, 0));

    let mut capture = Capture::default();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    assert_eq!(capture.frames, vec![vec![b.id(), a.id()]]);
    assert_eq!(fixture.recorder.calls(), vec![Call::Subscribe(SubmissionKind::FrameWide)]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn repeating_handle_ignores_one_shot_request() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();
    h.schedule_once().unwrap();

    let stats = runtime::stats().unwrap();
    assert_eq!((stats.repeating, stats.one_shot), (1, 0));

    let mut capture = Capture::default();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    assert_eq!(capture.frames, vec![vec![h.id()], vec![h.id()]]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn cancelling_last_handle_unsubscribes() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();

    let mut capture = Capture::default();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    h.cancel_updates();
    assert!(!h.is_scheduled());
    assert_eq!(
        fixture.recorder.calls(),
        vec![
            Call::Subscribe(SubmissionKind::FrameWide),
            Call::Unsubscribe(SubmissionKind::FrameWide)
        ]
    );

    //cancel left the list dirty, but nothing is listening any more
    let before = runtime::stats().unwrap();
    assert!(before.dirty);
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    let after = runtime::stats().unwrap();
    assert_eq!(after.rebuilds, before.rebuilds);
    assert_eq!(capture.frames.len(), 1);

    //cancelling again is a no-op
    h.cancel_updates();
    assert_eq!(fixture.recorder.calls().len(), 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn resubscribes_after_going_idle() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    let mut capture = Capture::default();

    h.schedule_once().unwrap();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();
    h.schedule_once().unwrap();
    runtime::on_begin_frame(&mut capture, &[]).unwrap();

    assert_eq!(capture.frames, vec![vec![h.id()], vec![h.id()]]);
    assert_eq!(
        fixture.recorder.calls(),
        vec![
            Call::Subscribe(SubmissionKind::FrameWide),
            Call::Unsubscribe(SubmissionKind::FrameWide),
            Call::Subscribe(SubmissionKind::FrameWide),
        ]
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn rebinding_detaches_previous_target() {
    let mut fixture = Fixture::new(SubmissionKind::PerTarget);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();

    runtime::on_pre_render(T1, 0).unwrap();
    runtime::on_pre_render(T2, 1).unwrap();

    let at = InsertionPoint::BeforeForwardOpaque;
    assert_eq!(
        fixture.recorder.calls(),
        vec![
            Call::Subscribe(SubmissionKind::PerTarget),
            Call::Attach(TargetId(1), at, vec![h.id()]),
            Call::Detach(TargetId(1), at),
            Call::Attach(TargetId(2), at, vec![h.id()]),
        ]
    );
    assert_eq!(runtime::stats().unwrap().bound_target, Some(TargetId(2)));
    //at no point is the list attached to two targets
    assert_eq!(fixture.recorder.attaches() - fixture.recorder.detaches(), 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn second_target_in_same_frame_is_ignored() {
    let mut fixture = Fixture::new(SubmissionKind::PerTarget);
    let h = fixture.handle();
    h.schedule_once().unwrap();

    runtime::on_pre_render(T1, 7).unwrap();
    let after_first = runtime::stats().unwrap();
    runtime::on_pre_render(T2, 7).unwrap();
    let after_second = runtime::stats().unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(after_second.bound_target, Some(TargetId(1)));
    assert_eq!(fixture.recorder.attaches(), 1);
    assert_eq!(fixture.recorder.detaches(), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn one_shot_added_mid_frame_waits_for_next_frame() {
    let mut fixture = Fixture::new(SubmissionKind::PerTarget);
    let repeating = fixture.handle();
    let late = fixture.handle();
    repeating.schedule_every_frame().unwrap();

    runtime::on_pre_render(T1, 0).unwrap();
    late.schedule_once().unwrap();
    runtime::on_pre_render(T2, 0).unwrap();
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.rebuilds, stats.submissions), (1, 1));
    assert_eq!(fixture.recorder.attaches(), 1);
    assert_eq!(stats.bound_target, Some(TargetId(1)));

    runtime::on_pre_render(T1, 1).unwrap();
    let at = T1.rendering_path.insertion_point();
    let calls = fixture.recorder.calls();
    assert_eq!(
        calls[calls.len() - 2..],
        [
            Call::Detach(TargetId(1), at),
            Call::Attach(TargetId(1), at, vec![repeating.id(), late.id()]),
        ]
    );
    assert_eq!(runtime::stats().unwrap().one_shot, 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn clean_list_on_same_target_is_left_alone() {
    let mut fixture = Fixture::new(SubmissionKind::PerTarget);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();

    runtime::on_pre_render(T1, 0).unwrap();
    runtime::on_pre_render(T1, 1).unwrap();
    runtime::on_pre_render(T1, 2).unwrap();
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.rebuilds, stats.submissions), (1, 1));

    //marking dirty forces a rebuild and a fresh attach on the same target
    h.mark_dirty().unwrap();
    runtime::on_pre_render(T1, 3).unwrap();
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.rebuilds, stats.submissions), (2, 2));
    assert_eq!(fixture.recorder.attaches(), 2);
    assert_eq!(fixture.recorder.detaches(), 1);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn per_target_one_shot_detaches_when_idle() {
    let mut fixture = Fixture::new(SubmissionKind::PerTarget);
    let h = fixture.handle();
    h.schedule_once().unwrap();

    runtime::on_pre_render(T1, 0).unwrap();
    runtime::on_pre_render(T1, 1).unwrap();

    let at = InsertionPoint::BeforeForwardOpaque;
    assert_eq!(
        fixture.recorder.calls(),
        vec![
            Call::Subscribe(SubmissionKind::PerTarget),
            Call::Attach(TargetId(1), at, vec![h.id()]),
            Call::Unsubscribe(SubmissionKind::PerTarget),
            Call::Detach(TargetId(1), at),
        ]
    );
    assert_eq!(runtime::stats().unwrap().bound_target, None);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn teardown_detaches_then_unsubscribes() {
    let mut fixture = Fixture::new(SubmissionKind::PerTarget);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();
    let deferred = TargetInfo::new(TargetId(3), RenderingPath::DeferredShading);
    runtime::on_pre_render(deferred, 0).unwrap();

    let Fixture { recorder, runtime: guard, .. } = fixture;
    guard.teardown();

    assert_eq!(
        recorder.calls()[2..],
        [
            Call::Detach(TargetId(3), InsertionPoint::BeforeGBuffer),
            Call::Unsubscribe(SubmissionKind::PerTarget),
        ]
    );
    assert!(!runtime::is_initialized());
    assert!(!h.is_scheduled());
    assert_eq!(h.schedule_once(), Err(ScheduleError::NotInitialized));
    //cancel and dispose still work without a scheduler
    drop(h);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn mismatched_callbacks_are_ignored() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();

    runtime::on_pre_render(T1, 0).unwrap();
    assert_eq!(runtime::stats().unwrap().submissions, 0);
    assert_eq!(fixture.recorder.attaches(), 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn config_overrides_host_model() {
    let config = Config {
        submission: SubmissionPreference::FrameWide,
        ..Config::default()
    };
    let mut fixture = Fixture::with_config(SubmissionKind::PerTarget, config);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();

    runtime::on_pre_render(T1, 0).unwrap();
    let mut capture = Capture::default();
    runtime::on_begin_frame(&mut capture, &[T1]).unwrap();

    assert_eq!(capture.frames, vec![vec![h.id()]]);
    assert_eq!(fixture.recorder.calls(), vec![Call::Subscribe(SubmissionKind::FrameWide)]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn list_carries_configured_label() {
    struct Labels(Vec<String>);
    impl ExecutionContext for Labels {
        fn execute(&mut self, list: &CommandList) {
            self.0.push(list.label().to_string());
        }
    }
    let config = Config {
        label: "uploads".to_string(),
        ..Config::default()
    };
    let mut fixture = Fixture::with_config(SubmissionKind::FrameWide, config);
    let h = fixture.handle();
    h.schedule_once().unwrap();
    let mut labels = Labels(Vec::new());
    runtime::on_begin_frame(&mut labels, &[]).unwrap();
    assert_eq!(labels.0, vec!["uploads".to_string()]);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn init_twice_fails() {
    let _fixture = Fixture::new(SubmissionKind::FrameWide);
    let recorder = Recorder {
        kind: SubmissionKind::FrameWide,
        calls: Rc::default(),
    };
    let err = runtime::init(Box::new(recorder), Config::default()).unwrap_err();
    assert_eq!(err, InitError::AlreadyInitialized);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn uninitialized_thread_rejects_scheduling() {
    assert!(!runtime::is_initialized());
    let texture: Rc<dyn UploadTarget> = Rc::new(TextureDescriptor::new("t", 1, 1, TextureFormat::R8));
    let h = UploadHandle::new(&texture, Rc::new(BufferRegistry::new())).unwrap();
    assert_eq!(h.schedule_every_frame(), Err(ScheduleError::NotInitialized));
    assert_eq!(h.mark_dirty(), Err(ScheduleError::NotInitialized));
    assert_eq!(runtime::on_pre_render(T1, 0), Err(ScheduleError::NotInitialized));
    assert!(runtime::stats().is_none());
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn other_threads_see_no_scheduler() {
    let _fixture = Fixture::new(SubmissionKind::FrameWide);
    let result = std::thread::spawn(|| {
        let mut capture = Capture::default();
        runtime::on_begin_frame(&mut capture, &[])
    })
    .join()
    .unwrap();
    assert_eq!(result, Err(ScheduleError::NotInitialized));
    assert!(runtime::is_initialized());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn reentrant_calls_wait_for_next_frame() {
    struct Reentrant<'a> {
        scheduled: &'a UploadHandle,
        newcomer: &'a UploadHandle,
        dirty: Option<Result<(), ScheduleError>>,
        schedule: Option<Result<(), ScheduleError>>,
    }
    impl ExecutionContext for Reentrant<'_> {
        fn execute(&mut self, _list: &CommandList) {
            if self.dirty.is_none() {
                self.dirty = Some(self.scheduled.mark_dirty());
                self.schedule = Some(self.newcomer.schedule_once());
            }
        }
    }

    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    let newcomer = fixture.handle();
    h.schedule_every_frame().unwrap();
    let mut context = Reentrant {
        scheduled: &h,
        newcomer: &newcomer,
        dirty: None,
        schedule: None,
    };
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    assert_eq!(context.dirty, Some(Ok(())));
    assert_eq!(context.schedule, Some(Err(ScheduleError::Busy)));
    assert!(!newcomer.is_scheduled());
    //the dispatch finished normally
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.rebuilds, stats.submissions), (1, 1));

    //the dirty mark lands on the following frame
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.rebuilds, stats.submissions), (2, 2));
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    assert_eq!(runtime::stats().unwrap().rebuilds, 2);
}

/// Drops the handles it holds the first time it runs.
struct DropDuringFrame {
    doomed: Vec<UploadHandle>,
    frames: Vec<Vec<UploadId>>,
}

impl ExecutionContext for DropDuringFrame {
    fn execute(&mut self, list: &CommandList) {
        self.frames.push(list.upload_ids());
        self.doomed.clear();
    }
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn handle_dropped_during_frame_leaves_next_frame() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let kept = fixture.handle();
    let doomed = fixture.handle();
    kept.schedule_every_frame().unwrap();
    doomed.schedule_every_frame().unwrap();
    let doomed_id = doomed.id();

    let mut context = DropDuringFrame {
        doomed: vec![doomed],
        frames: Vec::new(),
    };
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    runtime::on_begin_frame(&mut context, &[]).unwrap();

    assert_eq!(
        context.frames,
        vec![vec![kept.id(), doomed_id], vec![kept.id()], vec![kept.id()]]
    );
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.repeating, stats.one_shot), (1, 0));
    assert_eq!(stats.rebuilds, 2);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn last_handle_dropped_during_frame_unsubscribes() {
    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let only = fixture.handle();
    only.schedule_every_frame().unwrap();

    let mut context = DropDuringFrame {
        doomed: vec![only],
        frames: Vec::new(),
    };
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    assert!(runtime::stats().unwrap().subscription.is_some());
    runtime::on_begin_frame(&mut context, &[]).unwrap();

    assert_eq!(context.frames.len(), 1);
    assert_eq!(
        fixture.recorder.calls().last(),
        Some(&Call::Unsubscribe(SubmissionKind::FrameWide))
    );
    let stats = runtime::stats().unwrap();
    assert_eq!((stats.repeating, stats.one_shot), (0, 0));
    assert_eq!(stats.subscription, None);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn cancel_during_frame_then_reschedule_keeps_handle() {
    struct CancelOnce<'a> {
        handle: &'a UploadHandle,
        done: bool,
    }
    impl ExecutionContext for CancelOnce<'_> {
        fn execute(&mut self, _list: &CommandList) {
            if !self.done {
                self.handle.cancel_updates();
                self.done = true;
            }
        }
    }

    let mut fixture = Fixture::new(SubmissionKind::FrameWide);
    let h = fixture.handle();
    h.schedule_every_frame().unwrap();
    let mut context = CancelOnce { handle: &h, done: false };
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    //a later request made outside the callback wins over the pending cancel
    h.schedule_every_frame().unwrap();
    runtime::on_begin_frame(&mut context, &[]).unwrap();
    assert!(h.is_scheduled());
    assert_eq!(runtime::stats().unwrap().repeating, 1);
}
