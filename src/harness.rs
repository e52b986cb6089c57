//! Headless test harness
//!
//! Stands in for the window system: records requested transitions, keeps a
//! fake list of running tasks that follows the recorded batches, and drives the
//! controller's transition callbacks. Used by the integration tests and by the
//! `--replay` mode of the binary.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::DesktopConfig;
use crate::controller::DesktopController;
use crate::display::DisplayInfo;
use crate::drag::DragAction;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::{
    CancelKind, DesktopEvent, EnterReason, EventHandler, EventRecord, ExitReason, MinimizeReason,
    TileSide, UnminimizeReason,
};
use crate::geometry::Rect;
use crate::ids::{DeskId, DisplayId, TaskId, TransitionToken};
use crate::repository::{DeskRepository, PersistenceDispatcher, RepositorySnapshot};
use crate::task::{Notice, NoticeSink, RunningTask, TaskSource, WindowingMode};
use crate::transition::{
    AnimationHandler, BatchOp, ChangeMode, MutationBatch, TransitionChange, TransitionInfo,
    TransitionKind, Transitions,
};

/// One transition as it was requested
#[derive(Debug, Clone, PartialEq)]
pub struct StartedTransition {
    pub token: TransitionToken,
    pub kind: TransitionKind,
    pub batch: MutationBatch,
    pub handler: Option<AnimationHandler>,
}

#[derive(Debug, Default)]
struct TransitionLog {
    started: Vec<StartedTransition>,
    finish_requests: Vec<TransitionToken>,
}

/// Transition system that only records what it is asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingTransitions {
    log: Rc<RefCell<TransitionLog>>,
}

impl RecordingTransitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<StartedTransition> {
        self.log.borrow().started.clone()
    }

    pub fn get(&self, token: TransitionToken) -> Option<StartedTransition> {
        self.log
            .borrow()
            .started
            .iter()
            .find(|started| started.token == token)
            .cloned()
    }

    pub fn last(&self) -> Option<StartedTransition> {
        self.log.borrow().started.last().cloned()
    }

    /// Tokens the controller asked to finish, in order
    pub fn finish_requests(&self) -> Vec<TransitionToken> {
        self.log.borrow().finish_requests.clone()
    }
}

impl Transitions for RecordingTransitions {
    fn start_transition(
        &mut self,
        kind: TransitionKind,
        batch: MutationBatch,
        handler: Option<AnimationHandler>,
    ) -> TransitionToken {
        let token = TransitionToken::next();
        self.log.borrow_mut().started.push(StartedTransition {
            token,
            kind,
            batch,
            handler,
        });
        token
    }

    fn finish_transition(&mut self, token: TransitionToken) {
        self.log.borrow_mut().finish_requests.push(token);
    }
}

/// Running tasks, front to back per display
#[derive(Debug, Clone, Default)]
pub struct FakeTaskSource {
    tasks: Rc<RefCell<Vec<RunningTask>>>,
}

impl FakeTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a task, putting it in front
    pub fn insert(&self, task: RunningTask) {
        let mut tasks = self.tasks.borrow_mut();
        tasks.retain(|t| t.id != task.id);
        tasks.insert(0, task);
    }

    pub fn remove(&self, task: TaskId) -> Option<RunningTask> {
        let mut tasks = self.tasks.borrow_mut();
        let index = tasks.iter().position(|t| t.id == task)?;
        Some(tasks.remove(index))
    }

    pub fn get(&self, task: TaskId) -> Option<RunningTask> {
        self.tasks.borrow().iter().find(|t| t.id == task).cloned()
    }

    pub fn update(&self, task: TaskId, f: impl FnOnce(&mut RunningTask)) {
        if let Some(running) = self.tasks.borrow_mut().iter_mut().find(|t| t.id == task) {
            f(running);
        }
    }

    fn move_to_front(&self, task: TaskId) {
        if let Some(running) = self.remove(task) {
            self.tasks.borrow_mut().insert(0, running);
        }
    }

    fn move_to_back(&self, task: TaskId) {
        if let Some(running) = self.remove(task) {
            self.tasks.borrow_mut().push(running);
        }
    }

    /// Apply what a window system would do for `batch`
    pub fn apply_batch(&self, batch: &MutationBatch) {
        for op in batch.ops() {
            match op {
                BatchOp::ReorderToTop { task } | BatchOp::RestoreOrder { task } => {
                    self.move_to_front(*task)
                }
                BatchOp::ReorderToBack { task } => self.move_to_back(*task),
                BatchOp::SetBounds { task, bounds } => {
                    self.update(*task, |t| t.bounds = *bounds)
                }
                BatchOp::SetWindowingMode { task, mode } => self.update(*task, |t| t.mode = *mode),
                BatchOp::StartTask { task } => {
                    self.update(*task, |t| t.running = true);
                    self.move_to_front(*task);
                }
                BatchOp::RemoveTask { task } => {
                    self.remove(*task);
                }
                BatchOp::ExitSplit { task } => self.update(*task, |t| {
                    if t.mode == WindowingMode::MultiWindow {
                        t.mode = WindowingMode::Fullscreen;
                    }
                }),
                BatchOp::ReparentToDisplay { task, display } => {
                    self.update(*task, |t| t.display = *display)
                }
                BatchOp::EnterPip { task } => self.update(*task, |t| t.mode = WindowingMode::Pinned),
                BatchOp::SplitSelect { task, .. } => {
                    self.update(*task, |t| t.mode = WindowingMode::MultiWindow)
                }
                BatchOp::ExitImmersive { .. }
                | BatchOp::MoveTaskToDesk { .. }
                | BatchOp::ActivateDesk { .. }
                | BatchOp::DeactivateDesk { .. }
                | BatchOp::RemoveDeskRoot { .. }
                | BatchOp::LaunchHome { .. }
                | BatchOp::ShowWallpaper { .. }
                | BatchOp::RemoveWallpaper { .. }
                | BatchOp::ReorderDisplayToTop { .. }
                | BatchOp::StartNewInstance { .. } => {}
            }
        }
    }

    /// Describe `batch` the way the window system reports a ready transition
    ///
    /// Must be called before the batch is applied so start bounds are the
    /// current ones.
    pub fn describe(&self, kind: TransitionKind, batch: &MutationBatch) -> TransitionInfo {
        let mut modes: BTreeMap<TaskId, ChangeMode> = BTreeMap::new();
        for op in batch.ops() {
            let Some(task) = op.task() else {
                continue;
            };
            let mode = match op {
                BatchOp::RemoveTask { .. } => ChangeMode::Close,
                BatchOp::StartTask { .. } => ChangeMode::Open,
                BatchOp::ReorderToBack { .. } => ChangeMode::ToBack,
                BatchOp::ReorderToTop { .. } | BatchOp::RestoreOrder { .. } => ChangeMode::ToFront,
                _ => ChangeMode::Change,
            };
            // The strongest change wins: close > open > to back > to front > change
            let rank = |m: &ChangeMode| match m {
                ChangeMode::Close => 4,
                ChangeMode::Open => 3,
                ChangeMode::ToBack => 2,
                ChangeMode::ToFront => 1,
                ChangeMode::Change => 0,
            };
            let entry = modes.entry(task).or_insert(mode);
            if rank(&mode) > rank(entry) {
                *entry = mode;
            }
        }

        let changes = modes
            .into_iter()
            .filter_map(|(task, mode)| {
                let running = self.get(task)?;
                let windowing_mode = batch
                    .ops()
                    .iter()
                    .rev()
                    .find_map(|op| match op {
                        BatchOp::SetWindowingMode { task: t, mode } if *t == task => Some(*mode),
                        BatchOp::EnterPip { task: t } if *t == task => Some(WindowingMode::Pinned),
                        _ => None,
                    })
                    .unwrap_or(running.mode);
                Some(TransitionChange {
                    task,
                    display: running.display,
                    mode,
                    windowing_mode,
                    start_bounds: Some(running.bounds),
                    end_bounds: Some(batch.bounds_for(task).unwrap_or(running.bounds)),
                    app: running.app.clone(),
                    transparent: running.transparent,
                })
            })
            .collect();
        TransitionInfo { kind, changes }
    }
}

impl TaskSource for FakeTaskSource {
    fn task(&self, id: TaskId) -> Option<RunningTask> {
        self.get(id)
    }

    fn running_tasks(&self, display: DisplayId) -> Vec<RunningTask> {
        self.tasks
            .borrow()
            .iter()
            .filter(|t| t.display == display)
            .cloned()
            .collect()
    }
}

/// Keeps every notice shown
#[derive(Debug, Clone, Default)]
pub struct RecordingNotices {
    shown: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingNotices {
    pub fn shown(&self) -> Vec<Notice> {
        self.shown.borrow().clone()
    }
}

impl NoticeSink for RecordingNotices {
    fn show(&mut self, notice: Notice) {
        self.shown.borrow_mut().push(notice);
    }
}

/// Keeps every published desktop event
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
    events: Rc<RefCell<Vec<DesktopEvent>>>,
}

impl EventCollector {
    pub fn events(&self) -> Vec<DesktopEvent> {
        self.events.borrow().clone()
    }
}

impl EventHandler for EventCollector {
    fn handle_event(&mut self, record: &EventRecord) {
        self.events.borrow_mut().push(record.event.clone());
    }
}

/// Controller wired to recording collaborators
pub struct Harness {
    pub controller: DesktopController,
    pub transitions: RecordingTransitions,
    pub tasks: FakeTaskSource,
    pub notices: RecordingNotices,
    pub events: EventCollector,
    /// Finish requests already reported back to the controller
    delivered_finishes: usize,
    /// Transitions already driven by `settle`
    settled: usize,
    ready: BTreeSet<TransitionToken>,
}

impl Harness {
    pub fn new(config: DesktopConfig) -> Self {
        Self::with_persistence(config, PersistenceDispatcher::disabled())
    }

    pub fn with_persistence(config: DesktopConfig, persistence: PersistenceDispatcher) -> Self {
        let transitions = RecordingTransitions::new();
        let tasks = FakeTaskSource::new();
        let notices = RecordingNotices::default();
        let events = EventCollector::default();

        let mut controller = DesktopController::new(
            config,
            Box::new(transitions.clone()),
            Box::new(tasks.clone()),
            persistence,
        );
        controller.set_notice_sink(Box::new(notices.clone()));
        controller
            .events_mut()
            .register_handler(Box::new(events.clone()));

        Self {
            controller,
            transitions,
            tasks,
            notices,
            events,
            delivered_finishes: 0,
            settled: 0,
            ready: BTreeSet::new(),
        }
    }

    pub fn repo(&self) -> &DeskRepository {
        self.controller.repository()
    }

    pub fn add_display(&mut self, info: DisplayInfo) -> DeskResult<Option<DeskId>> {
        self.controller.on_display_added(info)
    }

    pub fn add_task(&mut self, task: RunningTask) {
        self.tasks.insert(task);
    }

    /// Report `token` as started
    pub fn ready(&mut self, token: TransitionToken) -> DeskResult<()> {
        let started = self
            .transitions
            .get(token)
            .ok_or_log(|| DeskError::UnknownTransition(token))?;
        let info = self.tasks.describe(started.kind, &started.batch);
        self.tasks.apply_batch(&started.batch);
        self.ready.insert(token);
        self.controller.on_transition_ready(token, &info)
    }

    pub fn finish(&mut self, token: TransitionToken) {
        self.controller.on_transition_finished(token, false);
        self.pump();
    }

    pub fn abort(&mut self, token: TransitionToken) {
        self.controller.on_transition_finished(token, true);
        self.pump();
    }

    /// Play `token` start to end
    pub fn complete(&mut self, token: TransitionToken) -> DeskResult<()> {
        self.ready(token)?;
        self.finish(token);
        Ok(())
    }

    /// Merge `merged` into `into` the way the player would
    pub fn merge(&mut self, merged: TransitionToken, into: TransitionToken) -> DeskResult<DragAction> {
        if !self.ready.contains(&merged) {
            self.ready(merged)?;
        }
        let action = self.controller.merge_animation(merged, into)?;
        self.pump();
        Ok(action)
    }

    /// Report finish requests made by the controller back to it
    pub fn pump(&mut self) {
        loop {
            let requests = self.transitions.finish_requests();
            if self.delivered_finishes >= requests.len() {
                break;
            }
            let token = requests[self.delivered_finishes];
            self.delivered_finishes += 1;
            self.controller.on_transition_finished(token, false);
        }
    }

    /// A transition the window system started on its own
    pub fn system_transition(
        &mut self,
        kind: TransitionKind,
        changes: Vec<TransitionChange>,
    ) -> DeskResult<TransitionToken> {
        let token = TransitionToken::next();
        let info = TransitionInfo { kind, changes };
        self.controller.on_transition_ready(token, &info)?;
        Ok(token)
    }

    /// Drive every transition requested since the last call to completion
    ///
    /// Drag transitions follow the gesture: the start transition keeps
    /// playing, terminal transitions merge into it and commit animations end
    /// at once.
    pub fn settle(&mut self) -> DeskResult<()> {
        loop {
            let started = self.transitions.started();
            let Some(next) = started.get(self.settled).cloned() else {
                break;
            };
            self.settled += 1;

            match (next.handler, next.kind) {
                (Some(AnimationHandler::DragToDesktop), TransitionKind::DragToDesktopStart) => {
                    self.ready(next.token)?;
                }
                (Some(AnimationHandler::DragToDesktop), _) => {
                    let start = started
                        .iter()
                        .rev()
                        .find(|s| s.kind == TransitionKind::DragToDesktopStart)
                        .map(|s| s.token)
                        .ok_or_log(|| DeskError::UnknownTransition(next.token))?;
                    if let DragAction::Animating(_) = self.merge(next.token, start)? {
                        self.controller.on_drag_animation_finished();
                        self.pump();
                    }
                }
                _ => self.complete(next.token)?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("controller", &self.controller)
            .field("started", &self.transitions.started().len())
            .finish()
    }
}

/// One step of a replay script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    AddDisplay { display: DisplayInfo },
    RemoveDisplay { display: DisplayId },
    AddTask { task: RunningTask },
    MoveToDesk {
        task: TaskId,
        #[serde(default)]
        desk: Option<DeskId>,
    },
    MoveToFullscreen { task: TaskId },
    Minimize { task: TaskId },
    Close { task: TaskId },
    Front { task: TaskId },
    Launch { task: TaskId },
    NewInstance { task: TaskId },
    Snap {
        task: TaskId,
        side: TileSide,
        #[serde(default)]
        start_bounds: Option<Rect>,
    },
    ToggleMaximize { task: TaskId },
    ToggleImmersive { task: TaskId },
    MoveToDisplay { task: TaskId, display: DisplayId },
    CreateDesk { display: DisplayId },
    ActivateDesk { desk: DeskId },
    DeactivateDesk { desk: DeskId },
    RemoveDesk { desk: DeskId },
    DragStart { task: TaskId, bounds: Rect },
    DragMove { bounds: Rect },
    DragCommit { bounds: Rect },
    DragCancel { kind: CancelKind },
    DragAnimationFinished,
}

impl Harness {
    /// Run one script step and settle the transitions it started
    pub fn run_step(&mut self, step: ScriptStep) -> DeskResult<()> {
        tracing::debug!("Replaying {step:?}");
        let controller = &mut self.controller;
        match step {
            ScriptStep::AddDisplay { display } => {
                controller.on_display_added(display)?;
            }
            ScriptStep::RemoveDisplay { display } => {
                controller.on_display_removed(display);
            }
            ScriptStep::AddTask { task } => self.tasks.insert(task),
            ScriptStep::MoveToDesk { task, desk } => {
                controller.move_task_to_desk(task, desk, EnterReason::KeyboardShortcut)?;
            }
            ScriptStep::MoveToFullscreen { task } => {
                controller.move_task_to_fullscreen(task, ExitReason::TaskFullscreen)?;
            }
            ScriptStep::Minimize { task } => {
                controller.minimize_task(task, MinimizeReason::MinimizeButton)?;
            }
            ScriptStep::Close { task } => {
                controller.close_task(task)?;
            }
            ScriptStep::Front { task } => {
                controller.move_task_to_front(task, UnminimizeReason::TaskbarTap)?;
            }
            ScriptStep::Launch { task } => {
                controller.launch_task(task)?;
            }
            ScriptStep::NewInstance { task } => {
                controller.open_new_instance(task)?;
            }
            ScriptStep::Snap {
                task,
                side,
                start_bounds,
            } => {
                controller.snap_to_half(task, side, start_bounds)?;
            }
            ScriptStep::ToggleMaximize { task } => {
                controller.toggle_maximize(task)?;
            }
            ScriptStep::ToggleImmersive { task } => {
                controller.toggle_full_immersive(task)?;
            }
            ScriptStep::MoveToDisplay { task, display } => {
                controller.move_task_to_display(task, display)?;
            }
            ScriptStep::CreateDesk { display } => {
                controller.create_desk(display)?;
            }
            ScriptStep::ActivateDesk { desk } => {
                controller.activate_desk(desk)?;
            }
            ScriptStep::DeactivateDesk { desk } => {
                controller.deactivate_desk(desk)?;
            }
            ScriptStep::RemoveDesk { desk } => {
                controller.remove_desk(desk)?;
            }
            ScriptStep::DragStart { task, bounds } => {
                controller.start_drag_to_desktop(task, bounds)?;
            }
            ScriptStep::DragMove { bounds } => controller.update_drag_position(bounds),
            ScriptStep::DragCommit { bounds } => {
                controller.finish_drag_to_desktop(bounds)?;
            }
            ScriptStep::DragCancel { kind } => {
                controller.cancel_drag_to_desktop(kind);
            }
            ScriptStep::DragAnimationFinished => {
                controller.on_drag_animation_finished();
            }
        }
        self.settle()
    }
}

/// Replay `steps` against a fresh harness and return the final repository state
pub fn replay(config: DesktopConfig, steps: Vec<ScriptStep>) -> DeskResult<RepositorySnapshot> {
    let mut harness = Harness::new(config);
    for step in steps {
        harness.run_step(step)?;
    }
    Ok(harness.repo().snapshot())
}
