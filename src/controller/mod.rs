//! Desktop transition orchestration
//!
//! Every user-facing operation composes one [`MutationBatch`] for the window
//! system and one [`PendingEffects`] for the repository. The batch is handed to
//! [`Transitions`]; the effects wait in the observer until the transition is
//! confirmed started, so an aborted transition leaves the repository untouched.
//!
//! Operations are split by concern:
//! - `enter`: moving tasks into desks, bringing tasks to front, launches
//! - `exit`: fullscreen, minimize, close and the desk exit cleanup
//! - `bounds`: snapping, maximize, immersive, moving between displays
//! - `desks`: desk lifecycle and display hotplug
//! - `drag`: the drag-to-desktop gesture

mod bounds;
mod desks;
mod drag;
mod enter;
mod exit;

use crate::compat::CompatPolicy;
use crate::config::{DesktopConfig, DesktopFeatures};
use crate::display::{DisplayInfo, DisplayRegistry};
use crate::drag::{DragState, DragToDesktop};
use crate::error::{log_error, DeskError, DeskResult, OptionExt};
use crate::event::{DesktopEvent, EnterReason, EventBus, ExitReason, MinimizeReason};
use crate::geometry::Rect;
use crate::ids::{DeskId, DisplayId, TaskId, TransitionToken, UserId};
use crate::limiter::TaskLimiter;
use crate::observer::TransitionObserver;
use crate::remote::{RemoteCommand, RemoteCommandQueue};
use crate::repository::users::UserRepositories;
use crate::repository::{DeskRepository, PersistenceDispatcher};
use crate::shortcut::{self, PendingLookup};
use crate::task::{LogNotices, NoticeSink, RunningTask, TaskSource};
use crate::transition::{
    AnimationHandler, BatchOp, MutationBatch, PendingEffects, RepositoryEffect, TransitionInfo,
    TransitionKind, Transitions,
};

/// Orchestrates desktop windowing on top of the repository
pub struct DesktopController {
    config: DesktopConfig,
    repos: UserRepositories,
    transitions: Box<dyn Transitions>,
    tasks: Box<dyn TaskSource>,
    displays: DisplayRegistry,
    limiter: TaskLimiter,
    compat: CompatPolicy,
    notices: Box<dyn NoticeSink>,
    observer: TransitionObserver,
    drag: DragToDesktop,
    events: EventBus,
    remote_commands: Option<RemoteCommandQueue>,
    lookup_runtime: Option<tokio::runtime::Handle>,
}

impl std::fmt::Debug for DesktopController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopController")
            .field("user", &self.repos.current_user())
            .field("displays", &self.displays.len())
            .field("drag", self.drag.state())
            .field("pending", &self.observer.pending_count())
            .finish()
    }
}

impl DesktopController {
    pub fn new(
        config: DesktopConfig,
        transitions: Box<dyn Transitions>,
        tasks: Box<dyn TaskSource>,
        persistence: PersistenceDispatcher,
    ) -> Self {
        tracing::info!(
            "Desktop controller starting with {:?} desks, task limit {:?}",
            config.desk_mode,
            config.max_tasks
        );
        let persistence = if config.has(DesktopFeatures::PERSIST_DESKS) {
            persistence
        } else {
            PersistenceDispatcher::disabled()
        };
        Self {
            repos: UserRepositories::new(config.desk_mode, persistence),
            limiter: TaskLimiter::new(config.max_tasks),
            compat: CompatPolicy::new(&config.incompatible_apps),
            config,
            transitions,
            tasks,
            displays: DisplayRegistry::new(),
            notices: Box::new(LogNotices),
            observer: TransitionObserver::new(),
            drag: DragToDesktop::new(),
            events: EventBus::new(),
            remote_commands: None,
            lookup_runtime: None,
        }
    }

    pub fn set_notice_sink(&mut self, notices: Box<dyn NoticeSink>) {
        self.notices = notices;
    }

    pub fn set_remote_commands(&mut self, queue: RemoteCommandQueue) {
        self.remote_commands = Some(queue);
    }

    /// Runtime used for shortcut lookups; without one they resolve inline
    pub fn set_lookup_runtime(&mut self, handle: tokio::runtime::Handle) {
        self.lookup_runtime = Some(handle);
    }

    pub fn config(&self) -> &DesktopConfig {
        &self.config
    }

    pub fn repository(&self) -> &DeskRepository {
        self.repos.current()
    }

    pub fn repository_mut(&mut self) -> &mut DeskRepository {
        self.repos.current_mut()
    }

    pub fn displays(&self) -> &DisplayRegistry {
        &self.displays
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn observer(&self) -> &TransitionObserver {
        &self.observer
    }

    pub fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    pub fn current_user(&self) -> UserId {
        self.repos.current_user()
    }

    pub fn switch_user(&mut self, user: UserId) {
        self.repos.switch_user(user);
    }

    fn repo(&self) -> &DeskRepository {
        self.repos.current()
    }

    fn has(&self, feature: DesktopFeatures) -> bool {
        self.config.has(feature)
    }

    fn running_task(&self, task: TaskId) -> DeskResult<RunningTask> {
        self.tasks
            .task(task)
            .ok_or_log(|| DeskError::TaskNotFound(task))
    }

    fn display_info(&self, display: DisplayId) -> DeskResult<DisplayInfo> {
        self.displays
            .get(display)
            .cloned()
            .ok_or_log(|| DeskError::DisplayNotFound(display))
    }

    /// Display of `desk`, including a per-display desk not created yet
    fn desk_display(&self, desk: DeskId, fallback: DisplayId) -> DeskResult<DisplayId> {
        let repo = self.repo();
        match repo.display_for_desk(desk) {
            Some(display) => Ok(display),
            None if repo.target_desk_id(fallback) == Some(desk) => Ok(fallback),
            None => None::<DisplayId>.ok_or_log(|| DeskError::DeskNotFound(desk)),
        }
    }

    /// Start a transition and park its effects until it is ready
    fn submit(
        &mut self,
        kind: TransitionKind,
        batch: MutationBatch,
        effects: PendingEffects,
        handler: Option<AnimationHandler>,
    ) -> TransitionToken {
        let token = self.transitions.start_transition(kind, batch, handler);
        tracing::debug!("Requested {kind:?} as {token}");
        self.observer.add_pending(token, effects);
        token
    }

    /// Size and place a new window: a fraction of the stable area, centered,
    /// then cascaded by `cascade_index` steps when cascading is on
    fn default_bounds(&self, info: &DisplayInfo, cascade_index: usize) -> Rect {
        let stable = info.stable_bounds;
        let scale = self.config.initial_bounds_scale;
        let w = (stable.w as f32 * scale).round() as i32;
        let h = (stable.h as f32 * scale).round() as i32;
        let base = stable.centered_child(w, h);
        if cascade_index == 0 || !self.has(DesktopFeatures::CASCADE_WINDOWS) {
            return base;
        }

        let step = info.dp_to_px(self.config.cascade_offset_dp).max(1);
        let room = (stable.right() - base.right()).min(stable.bottom() - base.bottom());
        let positions = (room / step).max(0) as usize + 1;
        let n = (cascade_index % positions) as i32;
        base.translated(n * step, n * step)
    }

    /// Minimize the backmost task of `desk` if adding `new_task` (or a pending
    /// launch) would exceed the task limit
    fn apply_task_limit(
        &self,
        display: DisplayId,
        desk: DeskId,
        new_task: Option<TaskId>,
        pending_launch: bool,
        batch: &mut MutationBatch,
        effects: &mut PendingEffects,
    ) {
        let expanded = self.repo().expanded_tasks_in_desk_ordered(desk);
        let Some(victim) = self
            .limiter
            .task_to_minimize(&expanded, new_task, pending_launch)
        else {
            return;
        };
        batch.push(BatchOp::ReorderToBack { task: victim });
        effects.push(RepositoryEffect::MinimizeTask {
            display,
            task: victim,
        });
        effects.emit(DesktopEvent::TaskMinimized {
            task: victim,
            reason: MinimizeReason::TaskLimit,
        });
    }

    /// Activate `desk`, restacking its expanded tasks below `front`
    fn add_desk_activation(
        &self,
        display: DisplayId,
        desk: DeskId,
        front: Option<TaskId>,
        reason: EnterReason,
        batch: &mut MutationBatch,
        effects: &mut PendingEffects,
    ) {
        if !self.repo().is_any_desk_active(display) {
            batch.push(BatchOp::ShowWallpaper { display });
        }
        batch.push(BatchOp::ActivateDesk { display, desk });
        let expanded = self.repo().expanded_tasks_in_desk_ordered(desk);
        for task in expanded.iter().rev().filter(|t| Some(**t) != front) {
            batch.push(BatchOp::ReorderToTop { task: *task });
        }
        effects.push(RepositoryEffect::ActivateDesk { display, desk });
        effects.emit(DesktopEvent::DeskEntered {
            display,
            desk,
            task: front.or_else(|| expanded.first().copied()),
            reason,
        });
    }

    /// Tear down a desk that is left without visible tasks
    ///
    /// `end_at_home` relaunches home unless the exit leaves another task
    /// filling the screen.
    fn add_desk_exit_cleanup(
        &self,
        display_id: DisplayId,
        desk: DeskId,
        reason: ExitReason,
        end_at_home: bool,
        batch: &mut MutationBatch,
        effects: &mut PendingEffects,
    ) {
        tracing::debug!("Exiting {desk} on {display_id}: {reason:?}");
        if self.has(DesktopFeatures::REMOVE_WALLPAPER_ON_EXIT) {
            batch.push(BatchOp::RemoveWallpaper { display: display_id });
        }
        if end_at_home && self.has(DesktopFeatures::RELAUNCH_HOME_ON_EXIT) {
            batch.push(BatchOp::LaunchHome { display: display_id });
        }
        batch.push(BatchOp::DeactivateDesk { desk });
        effects.push(RepositoryEffect::DeactivateDesk { desk });
        effects.emit(DesktopEvent::DeskExited {
            display: display_id,
            desk,
            reason,
        });
    }

    /// Whether removing `task` from view empties its active desk
    fn exits_desk(&self, task: TaskId, desk: DeskId) -> bool {
        let repo = self.repo();
        repo.is_desk_active(desk) && repo.is_only_visible_non_closing_task_in_desk(task, desk)
    }

    // Transition callbacks

    /// The transition started playing
    pub fn on_transition_ready(
        &mut self,
        token: TransitionToken,
        info: &TransitionInfo,
    ) -> DeskResult<()> {
        if let Some(session) = self.drag.session() {
            let captured = info
                .change_for(session.origin.task())
                .and_then(|change| change.start_bounds);
            self.drag.on_start_animation(token, captured);
        }

        let features = self.config.features;
        let events =
            self.observer
                .on_transition_ready(token, info, self.repos.current_mut(), features)?;
        self.events.emit_all(events);
        Ok(())
    }

    /// `merged` was folded into the playing transition `into`
    pub fn on_transition_merged(
        &mut self,
        merged: TransitionToken,
        into: TransitionToken,
    ) -> DeskResult<()> {
        let events = self
            .observer
            .on_transition_merged(merged, into, self.repos.current_mut())?;
        self.events.emit_all(events);
        Ok(())
    }

    pub fn on_transition_finished(&mut self, token: TransitionToken, aborted: bool) {
        tracing::debug!("{token} finished, aborted: {aborted}");
        self.observer
            .on_transition_finished(token, aborted, self.repos.current_mut());
        self.finish_drag_transition(token, aborted);
    }

    // Queries

    /// Whether desktop windowing is what the user sees on `display`
    ///
    /// A transparent fullscreen task on top of a desk hides it unless it is
    /// configured to count as part of the desktop.
    pub fn is_desktop_mode_showing(&self, display: DisplayId) -> bool {
        let repo = self.repo();
        if repo.top_transparent_fullscreen_task(display).is_some()
            && !self.has(DesktopFeatures::TRANSPARENT_FULLSCREEN_IS_DESKTOP)
        {
            return false;
        }
        repo.is_any_desk_active(display)
    }

    /// Start looking up the task a shortcut for `app` should focus
    pub fn lookup_shortcut_task(&self, app: &str) -> PendingLookup {
        let repo = self.repo();
        let mut running = Vec::new();
        let mut in_desks = std::collections::BTreeSet::new();
        for display in self.displays.ids() {
            running.extend(self.tasks.running_tasks(display));
            in_desks.extend(repo.active_tasks(display));
        }
        let app = app.to_string();
        match &self.lookup_runtime {
            Some(handle) => PendingLookup::spawn(handle, move || {
                shortcut::find_task_for_app(&running, &in_desks, &app)
            }),
            None => PendingLookup::ready(shortcut::find_task_for_app(&running, &in_desks, &app)),
        }
    }

    // Remote

    /// Run every queued remote command, returning how many ran
    pub fn drain_remote_commands(&mut self) -> usize {
        let mut commands = Vec::new();
        if let Some(queue) = self.remote_commands.as_mut() {
            while let Some(command) = queue.try_next() {
                commands.push(command);
            }
        }
        let count = commands.len();
        for command in commands {
            self.run_remote_command(command);
        }
        count
    }

    fn run_remote_command(&mut self, command: RemoteCommand) {
        tracing::debug!("Running remote command {command:?}");
        match command {
            RemoteCommand::ActivateDesk { desk } => {
                log_error(self.activate_desk(desk));
            }
            RemoteCommand::RemoveDesk { desk } => {
                log_error(self.remove_desk(desk));
            }
            RemoteCommand::CreateDesk { display } => {
                log_error(self.create_desk(display));
            }
            RemoteCommand::MoveToDesktop { task, desk } => {
                log_error(self.move_task_to_desk(task, desk, EnterReason::Remote));
            }
        }
    }
}
