//! Desk and task repository
//!
//! In-memory ground truth for which desks exist on which display and which
//! tasks are active, visible, minimized or closing in each of them. The
//! repository knows nothing about transitions; callers decide when to mutate.
//!
//! Every mutation goes through one wrapper that compares observable state before
//! and after, so listeners fire only on actual change and persistence only sees
//! desks that really changed.

pub mod desk;
pub mod listeners;
pub mod persistence;
pub mod store;
pub mod users;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::config::DeskMode;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::event::TileSide;
use crate::geometry::{Rect, Region};
use crate::ids::{DeskId, DisplayId, TaskId, UserId};

pub use desk::Desk;
pub use listeners::{
    ActiveTasksListener, DeliveryContext, DeskChangeListener, ExclusionRegionListener, Immediate,
    ListenerRegistry, TokioDelivery, VisibleTasksListener,
};
pub use persistence::{
    DeskPersistence, DeskSnapshot, MemoryPersistence, PersistenceDispatcher, PersistenceError,
};
pub use store::DeskStore;
use validation::{ValidateConsistency, ValidationResult};

/// Which saved bounds record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsSlot {
    BeforeMaximize,
    BeforeMinimize,
    BeforeFullImmersive,
}

/// Immutable copy of everything the repository holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub user: UserId,
    pub desks: Vec<Desk>,
    pub active_desks: BTreeMap<DisplayId, DeskId>,
    pub saved_bounds: BTreeMap<TaskId, BTreeMap<BoundsSlot, Rect>>,
    pub exclusion_regions: BTreeMap<TaskId, Region>,
}

#[derive(Debug, Default, PartialEq)]
struct DisplayObservation {
    desks: BTreeSet<DeskId>,
    active_desk: Option<DeskId>,
    active_tasks: BTreeSet<TaskId>,
    visible_count: usize,
}

/// What listeners and persistence can observe
struct Observation {
    desks: BTreeMap<DeskId, Desk>,
    displays: BTreeMap<DisplayId, DisplayObservation>,
}

impl Observation {
    fn capture(store: &dyn DeskStore) -> Self {
        let mut displays: BTreeMap<DisplayId, DisplayObservation> = BTreeMap::new();
        let mut desks = BTreeMap::new();
        for desk in store.desks() {
            let display = displays.entry(desk.display).or_default();
            display.desks.insert(desk.id);
            display.active_tasks.extend(desk.active_tasks.iter().copied());
            desks.insert(desk.id, desk.clone());
        }
        for active in store.all_active_desks() {
            if let Some(display) = displays.get_mut(&active.display) {
                display.active_desk = Some(active.id);
            }
        }
        for (id, display) in displays.iter_mut() {
            display.visible_count = store
                .active_desk(*id)
                .map(|desk| desk.visible_tasks.len())
                .unwrap_or(0);
        }
        Self { desks, displays }
    }
}

pub struct DeskRepository {
    user: UserId,
    store: Box<dyn DeskStore>,
    saved_bounds: BTreeMap<TaskId, BTreeMap<BoundsSlot, Rect>>,
    exclusion_regions: BTreeMap<TaskId, Region>,
    listeners: ListenerRegistry,
    persistence: PersistenceDispatcher,
}

impl std::fmt::Debug for DeskRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeskRepository")
            .field("user", &self.user)
            .field("store", &self.store)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl DeskRepository {
    pub fn new(user: UserId, mode: DeskMode, persistence: PersistenceDispatcher) -> Self {
        Self {
            user,
            store: store::store_for_mode(mode),
            saved_bounds: BTreeMap::new(),
            exclusion_regions: BTreeMap::new(),
            listeners: ListenerRegistry::default(),
            persistence,
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn mode(&self) -> DeskMode {
        self.store.mode()
    }

    fn mutate<R>(
        &mut self,
        f: impl FnOnce(&mut dyn DeskStore) -> DeskResult<R>,
    ) -> DeskResult<R> {
        let before = Observation::capture(self.store.as_ref());
        let result = f(self.store.as_mut());
        let after = Observation::capture(self.store.as_ref());
        self.notify(&before, &after);
        self.persist(&before, &after);

        #[cfg(debug_assertions)]
        if let Err(errors) = self.validate_consistency() {
            validation::log_validation_errors(&errors);
        }

        result
    }

    fn notify(&self, before: &Observation, after: &Observation) {
        let displays: BTreeSet<DisplayId> = before
            .displays
            .keys()
            .chain(after.displays.keys())
            .copied()
            .collect();
        let empty = DisplayObservation::default();

        for display in displays {
            let old = before.displays.get(&display).unwrap_or(&empty);
            let new = after.displays.get(&display).unwrap_or(&empty);
            if old == new {
                continue;
            }

            for &desk in new.desks.difference(&old.desks) {
                self.listeners.desk_added(display, desk);
            }
            for &desk in old.desks.difference(&new.desks) {
                self.listeners.desk_removed(display, desk);
            }
            match (old.active_desk, new.active_desk) {
                (previous, Some(active)) if previous != Some(active) => {
                    self.listeners.active_desk_changed(display, active, previous)
                }
                (Some(previous), None) => self.listeners.desk_deactivated(display, previous),
                _ => {}
            }
            if old.active_tasks != new.active_tasks {
                self.listeners
                    .active_tasks_changed(display, &new.active_tasks);
            }
            if old.visible_count != new.visible_count {
                self.listeners
                    .visible_count_changed(display, new.visible_count);
            }
        }
    }

    fn persist(&self, before: &Observation, after: &Observation) {
        if !self.persistence.is_enabled() {
            return;
        }
        for (id, desk) in &after.desks {
            if before.desks.get(id) != Some(desk) {
                self.persistence
                    .upsert_desk(DeskSnapshot::from_desk(self.user, desk));
            }
        }
        for id in before.desks.keys() {
            if !after.desks.contains_key(id) {
                self.persistence.remove_desk(self.user, *id);
            }
        }
    }

    // Desks

    pub fn add_desk(&mut self, display_id: DisplayId, desk: DeskId) -> DeskResult<()> {
        tracing::debug!("Adding {desk} on {display_id}");
        self.mutate(|store| store.create_desk(display_id, desk))
    }

    /// Remove a desk, returning the tasks that were active in it
    pub fn remove_desk(&mut self, desk: DeskId) -> DeskResult<BTreeSet<TaskId>> {
        tracing::debug!("Removing {desk}");
        let tasks = self.mutate(|store| {
            store
                .remove(desk)
                .map(|removed| removed.active_tasks)
                .ok_or_log(|| DeskError::DeskNotFound(desk))
        })?;
        self.forget_tasks(&tasks);
        Ok(tasks)
    }

    /// Drop all desks of a display, returning their active tasks
    pub fn remove_display(&mut self, display_id: DisplayId) -> BTreeSet<TaskId> {
        tracing::debug!("Removing desks of {display_id}");
        let removed = self.mutate(|store| Ok(store.remove_display(display_id)));
        let tasks: BTreeSet<TaskId> = removed
            .unwrap_or_default()
            .into_iter()
            .flat_map(|desk| desk.active_tasks)
            .collect();
        self.forget_tasks(&tasks);
        tasks
    }

    pub fn ensure_default_desk(&mut self, display: DisplayId) -> DeskResult<DeskId> {
        self.mutate(|store| store.ensure_default_desk(display))
    }

    pub fn set_active_desk(&mut self, display: DisplayId, desk: DeskId) -> DeskResult<()> {
        self.mutate(|store| store.set_active_desk(display, desk))
    }

    pub fn set_desk_inactive(&mut self, desk: DeskId) {
        let _ = self.mutate(|store| {
            store.set_desk_inactive(desk);
            Ok(())
        });
    }

    // Tasks

    /// Add or move `task` to the front of `desk`
    ///
    /// The task is removed from every other desk. Re-adding an active task only
    /// updates its visibility and z-order.
    pub fn add_task_to_desk(
        &mut self,
        display_id: DisplayId,
        desk: DeskId,
        task: TaskId,
        visible: bool,
    ) -> DeskResult<()> {
        self.mutate(|store| {
            // Lazily created alias desk under one desk per display
            if store.desk(desk).is_none() && store.target_desk_id(display_id) == Some(desk) {
                store.create_desk(display_id, desk)?;
            }
            let owner = store
                .display_for_desk(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?;
            if owner != display_id {
                tracing::warn!("{desk} lives on {owner}, not {display_id}");
            }

            store.for_all_desks(&mut |other: &mut Desk| {
                if other.id != desk && other.remove_task(task) {
                    tracing::debug!("Moving {task} out of {}", other.id);
                }
            });

            let target = store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?;
            target.bring_to_front(task);
            target.set_visible(task, visible);
            Ok(())
        })
    }

    /// Add `task` to the default desk of `display`
    pub fn add_task(&mut self, display: DisplayId, task: TaskId, visible: bool) -> DeskResult<()> {
        let desk = self
            .store
            .target_desk_id(display)
            .ok_or_log(|| DeskError::NoDeskOnDisplay(display))?;
        self.add_task_to_desk(display, desk, task, visible)
    }

    /// Update visibility, adding the task to the default desk if it is unknown
    pub fn update_task(&mut self, display: DisplayId, task: TaskId, visible: bool) -> DeskResult<()> {
        let Some(desk) = self.desk_id_for_task(task) else {
            if visible {
                return self.add_task(display, task, true);
            }
            tracing::debug!("Ignoring hidden update for unknown {task}");
            return Ok(());
        };
        self.mutate(|store| {
            store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .set_visible(task, visible);
            Ok(())
        })
    }

    pub fn minimize_task(&mut self, display_id: DisplayId, task: TaskId) -> DeskResult<()> {
        let Some(desk) = self.desk_id_for_task(task) else {
            tracing::warn!("Minimizing {task} on {display_id} which is in no desk");
            return Ok(());
        };
        self.mutate(|store| {
            let desk = store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?;
            desk.visible_tasks.remove(&task);
            desk.minimized_tasks.insert(task);
            Ok(())
        })
    }

    pub fn unminimize_task(&mut self, display_id: DisplayId, task: TaskId) -> DeskResult<()> {
        let Some(desk) = self.desk_id_for_task(task) else {
            tracing::debug!("Unminimizing {task} on {display_id} which is in no desk");
            return Ok(());
        };
        self.mutate(|store| {
            store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .minimized_tasks
                .remove(&task);
            Ok(())
        })
    }

    /// Remove `task` from `desk` only, keeping its auxiliary records
    pub fn remove_task_from_desk(&mut self, desk: DeskId, task: TaskId) -> DeskResult<bool> {
        self.mutate(|store| {
            Ok(store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .remove_task(task))
        })
    }

    /// Remove `task` from every desk and drop its auxiliary records
    pub fn remove_task(&mut self, display_id: DisplayId, task: TaskId) -> bool {
        tracing::debug!("Removing {task} from {display_id}");
        let mut removed = false;
        let _ = self.mutate(|store| {
            store.for_all_desks(&mut |desk: &mut Desk| removed |= desk.remove_task(task));
            Ok(())
        });
        self.forget_tasks(&BTreeSet::from([task]));
        removed
    }

    pub fn add_closing_task(&mut self, desk: DeskId, task: TaskId) -> DeskResult<()> {
        self.mutate(|store| {
            let desk = store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?;
            if desk.contains(task) {
                desk.closing_tasks.insert(task);
            }
            Ok(())
        })
    }

    pub fn remove_closing_task(&mut self, task: TaskId) {
        let _ = self.mutate(|store| {
            store.for_all_desks(&mut |desk: &mut Desk| {
                desk.closing_tasks.remove(&task);
            });
            Ok(())
        });
    }

    pub fn set_task_in_full_immersive(
        &mut self,
        display: DisplayId,
        task: TaskId,
        immersive: bool,
    ) -> DeskResult<()> {
        let desk = self
            .desk_id_for_task(task)
            .or_else(|| self.store.target_desk_id(display))
            .ok_or_log(|| DeskError::NoDeskOnDisplay(display))?;
        self.mutate(|store| {
            let desk = store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?;
            if immersive {
                desk.full_immersive_task = Some(task);
            } else if desk.full_immersive_task == Some(task) {
                desk.full_immersive_task = None;
            }
            Ok(())
        })
    }

    /// Track a transparent fullscreen task overlaying the desk of `display`
    pub fn set_top_transparent_fullscreen_task(
        &mut self,
        display: DisplayId,
        task: Option<TaskId>,
    ) -> DeskResult<()> {
        let desk = self
            .store
            .default_desk(display)
            .map(|desk| desk.id)
            .ok_or_log(|| DeskError::NoDeskOnDisplay(display))?;
        self.mutate(|store| {
            store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .top_transparent_fullscreen_task = task;
            Ok(())
        })
    }

    pub fn set_tiled_task(
        &mut self,
        desk: DeskId,
        side: TileSide,
        task: Option<TaskId>,
    ) -> DeskResult<()> {
        self.mutate(|store| {
            store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .set_tiled_task(side, task);
            Ok(())
        })
    }

    pub fn untile_task(&mut self, desk: DeskId, task: TaskId) -> DeskResult<()> {
        self.mutate(|store| {
            store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .untile(task);
            Ok(())
        })
    }

    pub fn set_pip_task(&mut self, desk: DeskId, task: Option<TaskId>) -> DeskResult<()> {
        self.mutate(|store| {
            store
                .desk_mut(desk)
                .ok_or_log(|| DeskError::DeskNotFound(desk))?
                .pip_task = task;
            Ok(())
        })
    }

    // Auxiliary records

    pub fn save_bounds(&mut self, task: TaskId, slot: BoundsSlot, bounds: Rect) {
        self.saved_bounds.entry(task).or_default().insert(slot, bounds);
    }

    pub fn saved_bounds(&self, task: TaskId, slot: BoundsSlot) -> Option<Rect> {
        self.saved_bounds.get(&task)?.get(&slot).copied()
    }

    pub fn remove_saved_bounds(&mut self, task: TaskId, slot: BoundsSlot) -> Option<Rect> {
        let slots = self.saved_bounds.get_mut(&task)?;
        let bounds = slots.remove(&slot);
        if slots.is_empty() {
            self.saved_bounds.remove(&task);
        }
        bounds
    }

    pub fn update_task_exclusion_region(&mut self, task: TaskId, region: Region) {
        self.exclusion_regions.insert(task, region);
        self.push_exclusion_region();
    }

    pub fn remove_exclusion_region(&mut self, task: TaskId) {
        if self.exclusion_regions.remove(&task).is_some() {
            self.push_exclusion_region();
        }
    }

    /// Union of every task's exclusion region
    pub fn exclusion_region(&self) -> Region {
        let mut union = Region::new();
        for region in self.exclusion_regions.values() {
            union.union(region);
        }
        union
    }

    fn push_exclusion_region(&self) {
        self.listeners.exclusion_changed(&self.exclusion_region());
    }

    fn forget_tasks(&mut self, tasks: &BTreeSet<TaskId>) {
        let mut region_changed = false;
        for task in tasks {
            self.saved_bounds.remove(task);
            region_changed |= self.exclusion_regions.remove(task).is_some();
        }
        if region_changed {
            self.push_exclusion_region();
        }
    }

    // Queries

    pub fn desk(&self, desk: DeskId) -> Option<Desk> {
        self.store.desk(desk).cloned()
    }

    pub fn desk_id_for_task(&self, task: TaskId) -> Option<DeskId> {
        self.store
            .desks()
            .find(|desk| desk.contains(task))
            .map(|desk| desk.id)
    }

    pub fn display_for_desk(&self, desk: DeskId) -> Option<DisplayId> {
        self.store.display_for_desk(desk)
    }

    pub fn active_desk_id(&self, display: DisplayId) -> Option<DeskId> {
        self.store
            .active_desk(display)
            .filter(|desk| self.store.is_desk_active(desk.id))
            .map(|desk| desk.id)
    }

    pub fn default_desk_id(&self, display: DisplayId) -> Option<DeskId> {
        self.store.default_desk(display).map(|desk| desk.id)
    }

    /// Desk a task entering desktop mode on `display` should join
    pub fn target_desk_id(&self, display: DisplayId) -> Option<DeskId> {
        self.store.target_desk_id(display)
    }

    pub fn next_desk_id(&self, display: DisplayId) -> DeskId {
        self.store.next_desk_id(display)
    }

    pub fn desk_ids(&self, display: DisplayId) -> Vec<DeskId> {
        self.store
            .desks_on_display(display)
            .into_iter()
            .map(|desk| desk.id)
            .collect()
    }

    pub fn number_of_desks(&self, display: DisplayId) -> usize {
        self.store.desks_on_display(display).len()
    }

    pub fn is_any_desk_active(&self, display: DisplayId) -> bool {
        self.store.is_any_desk_active(display)
    }

    pub fn is_desk_active(&self, desk: DeskId) -> bool {
        self.store.is_desk_active(desk)
    }

    fn task_desk(&self, task: TaskId) -> Option<&Desk> {
        self.store.desks().find(|desk| desk.contains(task))
    }

    pub fn is_active_task(&self, task: TaskId) -> bool {
        self.task_desk(task).is_some()
    }

    pub fn is_visible_task(&self, task: TaskId) -> bool {
        self.task_desk(task)
            .is_some_and(|desk| desk.visible_tasks.contains(&task))
    }

    pub fn is_minimized_task(&self, task: TaskId) -> bool {
        self.task_desk(task)
            .is_some_and(|desk| desk.minimized_tasks.contains(&task))
    }

    pub fn is_closing_task(&self, task: TaskId) -> bool {
        self.task_desk(task)
            .is_some_and(|desk| desk.closing_tasks.contains(&task))
    }

    /// `visible - closing - minimized == {task}`, computed fresh on every call
    pub fn is_only_visible_non_closing_task_in_desk(&self, task: TaskId, desk: DeskId) -> bool {
        self.store
            .desk(desk)
            .is_some_and(|desk| desk.is_only_visible_non_closing_task(task))
    }

    /// Expanded tasks of `desk`, front to back
    pub fn expanded_tasks_in_desk_ordered(&self, desk: DeskId) -> Vec<TaskId> {
        self.store
            .desk(desk)
            .map(Desk::expanded_tasks_ordered)
            .unwrap_or_default()
    }

    /// Expanded tasks of the default desk of `display`, front to back
    pub fn expanded_tasks_ordered(&self, display: DisplayId) -> Vec<TaskId> {
        self.store
            .default_desk(display)
            .map(Desk::expanded_tasks_ordered)
            .unwrap_or_default()
    }

    pub fn visible_task_count(&self, display: DisplayId) -> usize {
        self.store
            .active_desk(display)
            .map(|desk| desk.visible_tasks.len())
            .unwrap_or(0)
    }

    /// Active tasks of every desk on `display`
    pub fn active_tasks(&self, display: DisplayId) -> BTreeSet<TaskId> {
        self.store
            .desks_on_display(display)
            .into_iter()
            .flat_map(|desk| desk.active_tasks.iter().copied())
            .collect()
    }

    pub fn minimized_tasks(&self, display: DisplayId) -> BTreeSet<TaskId> {
        self.store
            .desks_on_display(display)
            .into_iter()
            .flat_map(|desk| desk.minimized_tasks.iter().copied())
            .collect()
    }

    pub fn top_transparent_fullscreen_task(&self, display: DisplayId) -> Option<TaskId> {
        self.store
            .default_desk(display)
            .and_then(|desk| desk.top_transparent_fullscreen_task)
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        let desks: Vec<Desk> = self.store.desks().cloned().collect();
        let active_desks = self
            .store
            .all_active_desks()
            .into_iter()
            .map(|desk| (desk.display, desk.id))
            .collect();
        RepositorySnapshot {
            user: self.user,
            desks,
            active_desks,
            saved_bounds: self.saved_bounds.clone(),
            exclusion_regions: self.exclusion_regions.clone(),
        }
    }

    // Listeners

    pub fn add_desk_change_listener(&mut self, listener: Arc<dyn DeskChangeListener>) {
        self.listeners.desk_changes.push(listener);
    }

    pub fn add_active_tasks_listener(&mut self, listener: Arc<dyn ActiveTasksListener>) {
        self.listeners.active_tasks.push(listener);
    }

    /// Register a visible count listener; it is told the current counts at once
    pub fn add_visible_tasks_listener(
        &mut self,
        listener: Arc<dyn VisibleTasksListener>,
        context: Arc<dyn DeliveryContext>,
    ) {
        let displays: BTreeSet<DisplayId> = self.store.desks().map(|desk| desk.display).collect();
        for display in displays {
            listeners::deliver_visible(
                &listener,
                context.as_ref(),
                display,
                self.visible_task_count(display),
            );
        }
        self.listeners.visible_tasks.push((listener, context));
    }

    pub fn add_exclusion_region_listener(
        &mut self,
        listener: Arc<dyn ExclusionRegionListener>,
        context: Arc<dyn DeliveryContext>,
    ) {
        let region = self.exclusion_region();
        let first = listener.clone();
        context.deliver(Box::new(move || first.on_exclusion_region_changed(&region)));
        self.listeners.exclusion.push((listener, context));
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn set_listeners(&mut self, listeners: ListenerRegistry) {
        self.listeners = listeners;
    }

    /// Tell listeners how this repository differs from `previous`, which it
    /// replaces as the one on screen
    pub(crate) fn announce_takeover(&self, previous: &DeskRepository) {
        let before = Observation::capture(previous.store.as_ref());
        let after = Observation::capture(self.store.as_ref());
        self.notify(&before, &after);

        let region = self.exclusion_region();
        if region != previous.exclusion_region() {
            self.listeners.exclusion_changed(&region);
        }
    }
}

impl ValidateConsistency for DeskRepository {
    fn validate_consistency(&self) -> ValidationResult {
        validation::validate_store(self.store.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingListener {
        visible: Mutex<Vec<(DisplayId, usize)>>,
        desks: Mutex<Vec<String>>,
    }

    impl VisibleTasksListener for CountingListener {
        fn on_visible_tasks_changed(&self, display: DisplayId, visible_count: usize) {
            self.visible.lock().unwrap().push((display, visible_count));
        }
    }

    impl DeskChangeListener for CountingListener {
        fn on_desk_added(&self, _display: DisplayId, desk: DeskId) {
            self.desks.lock().unwrap().push(format!("added {desk}"));
        }
        fn on_desk_removed(&self, _display: DisplayId, desk: DeskId) {
            self.desks.lock().unwrap().push(format!("removed {desk}"));
        }
        fn on_active_desk_changed(&self, _display: DisplayId, new: DeskId, _old: Option<DeskId>) {
            self.desks.lock().unwrap().push(format!("active {new}"));
        }
        fn on_desk_deactivated(&self, _display: DisplayId, desk: DeskId) {
            self.desks.lock().unwrap().push(format!("inactive {desk}"));
        }
    }

    fn repo(mode: DeskMode) -> DeskRepository {
        DeskRepository::new(UserId::SYSTEM, mode, PersistenceDispatcher::disabled())
    }

    #[test]
    fn single_mode_creates_desk_lazily() {
        let mut repo = repo(DeskMode::Single);
        let display = DisplayId::new(1);
        repo.add_task(display, TaskId::new(10), true).unwrap();

        assert_eq!(repo.desk_id_for_task(TaskId::new(10)), Some(DeskId::new(1)));
        assert!(repo.is_any_desk_active(display));
        assert_eq!(repo.active_desk_id(display), Some(DeskId::new(1)));
    }

    #[test]
    fn multi_mode_requires_a_desk() {
        let mut repo = repo(DeskMode::Multi);
        assert!(matches!(
            repo.add_task(DisplayId::DEFAULT, TaskId::new(1), true),
            Err(DeskError::NoDeskOnDisplay(_))
        ));
        assert!(matches!(
            repo.remove_desk(DeskId::new(4)),
            Err(DeskError::DeskNotFound(_))
        ));
    }

    #[test]
    fn visible_listener_fires_only_on_change() {
        let mut repo = repo(DeskMode::Single);
        let listener = Arc::new(CountingListener::default());
        repo.add_visible_tasks_listener(listener.clone(), Arc::new(Immediate));

        let display = DisplayId::DEFAULT;
        repo.add_task(display, TaskId::new(1), true).unwrap();
        repo.update_task(display, TaskId::new(1), true).unwrap();
        repo.add_task(display, TaskId::new(2), true).unwrap();
        repo.minimize_task(display, TaskId::new(1)).unwrap();

        assert_eq!(
            *listener.visible.lock().unwrap(),
            vec![(display, 1), (display, 2), (display, 1)]
        );
    }

    #[test]
    fn desk_listener_sees_activation_changes() {
        let mut repo = repo(DeskMode::Multi);
        let listener = Arc::new(CountingListener::default());
        repo.add_desk_change_listener(listener.clone());

        let display = DisplayId::DEFAULT;
        repo.add_desk(display, DeskId::new(0)).unwrap();
        repo.add_desk(display, DeskId::new(1)).unwrap();
        repo.set_active_desk(display, DeskId::new(1)).unwrap();
        repo.set_active_desk(display, DeskId::new(1)).unwrap();
        repo.set_desk_inactive(DeskId::new(1));
        repo.remove_desk(DeskId::new(0)).unwrap();

        assert_eq!(
            *listener.desks.lock().unwrap(),
            vec![
                "added Desk(0)",
                "added Desk(1)",
                "active Desk(1)",
                "inactive Desk(1)",
                "removed Desk(0)",
            ]
        );
    }

    #[test]
    fn remove_task_clears_aux_records() {
        let mut repo = repo(DeskMode::Single);
        let task = TaskId::new(3);
        repo.add_task(DisplayId::DEFAULT, task, true).unwrap();
        repo.save_bounds(task, BoundsSlot::BeforeMaximize, Rect::new(1, 2, 3, 4));
        repo.update_task_exclusion_region(task, Region::from_rect(Rect::new(0, 0, 10, 10)));

        assert!(repo.remove_task(DisplayId::DEFAULT, task));
        assert_eq!(repo.saved_bounds(task, BoundsSlot::BeforeMaximize), None);
        assert!(repo.exclusion_region().is_empty());
    }

    #[test]
    fn exclusion_region_is_union_of_tasks() {
        let mut repo = repo(DeskMode::Single);
        repo.update_task_exclusion_region(TaskId::new(1), Region::from_rect(Rect::new(0, 0, 10, 10)));
        repo.update_task_exclusion_region(TaskId::new(2), Region::from_rect(Rect::new(50, 0, 10, 10)));
        assert_eq!(repo.exclusion_region().rects().len(), 2);

        repo.remove_exclusion_region(TaskId::new(1));
        assert_eq!(repo.exclusion_region().rects(), &[Rect::new(50, 0, 10, 10)]);
    }
}
