//! Desk storage strategies
//!
//! The repository never branches on the desk mode. It talks to a [`DeskStore`]
//! picked once at construction:
//! - [`SingleDeskStore`]: one implicit desk per display, desk id aliased to the
//!   display id, created lazily and cleared in place instead of removed. Whether
//!   the desk is active is inferred from its visible tasks.
//! - [`MultiDeskStore`]: an ordered list of desks per display plus an optional
//!   active desk. Removed ids are retired and never handed out again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::desk::Desk;
use crate::config::DeskMode;
use crate::error::{DeskError, DeskResult, OptionExt};
use crate::ids::{DeskId, DisplayId};

/// Desk bookkeeping strategy
pub trait DeskStore: fmt::Debug + Send {
    /// Create `desk` on `display`; creating an existing desk is a no-op
    fn create_desk(&mut self, display: DisplayId, desk: DeskId) -> DeskResult<()>;

    fn desk(&self, desk: DeskId) -> Option<&Desk>;

    fn desk_mut(&mut self, desk: DeskId) -> Option<&mut Desk>;

    /// The desk currently presented on `display`
    fn active_desk(&self, display: DisplayId) -> Option<&Desk>;

    fn set_active_desk(&mut self, display: DisplayId, desk: DeskId) -> DeskResult<()>;

    fn set_desk_inactive(&mut self, desk: DeskId);

    /// Some desk of `display`, preferring the active one
    fn default_desk(&self, display: DisplayId) -> Option<&Desk>;

    /// Desk id a new task on `display` should go to, even if not created yet
    fn target_desk_id(&self, display: DisplayId) -> Option<DeskId>;

    /// Next unused desk id
    fn next_desk_id(&self, display: DisplayId) -> DeskId;

    fn all_active_desks(&self) -> Vec<&Desk>;

    fn for_all_desks(&mut self, f: &mut dyn FnMut(&mut Desk));

    fn desks(&self) -> Box<dyn Iterator<Item = &Desk> + '_>;

    fn desks_on_display(&self, display: DisplayId) -> Vec<&Desk>;

    /// Remove a desk, returning what it held
    fn remove(&mut self, desk: DeskId) -> Option<Desk>;

    fn display_for_desk(&self, desk: DeskId) -> Option<DisplayId>;

    /// Drop every desk of `display`, returning them
    fn remove_display(&mut self, display: DisplayId) -> Vec<Desk>;

    /// Make sure `display` has a desk and return its id
    fn ensure_default_desk(&mut self, display: DisplayId) -> DeskResult<DeskId>;

    fn is_any_desk_active(&self, display: DisplayId) -> bool {
        self.active_desk(display)
            .is_some_and(|desk| self.is_desk_active(desk.id))
    }

    fn is_desk_active(&self, desk: DeskId) -> bool;

    fn mode(&self) -> DeskMode;
}

/// Build the store for `mode`
pub fn store_for_mode(mode: DeskMode) -> Box<dyn DeskStore> {
    match mode {
        DeskMode::Single => Box::new(SingleDeskStore::default()),
        DeskMode::Multi => Box::new(MultiDeskStore::default()),
    }
}

#[derive(Debug, Default)]
pub struct SingleDeskStore {
    desks: BTreeMap<DisplayId, Desk>,
}

impl SingleDeskStore {
    fn display_of(desk: DeskId) -> DisplayId {
        DisplayId::new(desk.get())
    }
}

impl DeskStore for SingleDeskStore {
    fn create_desk(&mut self, display: DisplayId, desk: DeskId) -> DeskResult<()> {
        if desk != DeskId::for_display(display) {
            return Err(DeskError::InvalidOperation(format!(
                "{desk} cannot live on {display} with one desk per display"
            )));
        }
        self.desks
            .entry(display)
            .or_insert_with(|| Desk::new(desk, display));
        Ok(())
    }

    fn desk(&self, desk: DeskId) -> Option<&Desk> {
        self.desks.get(&Self::display_of(desk))
    }

    fn desk_mut(&mut self, desk: DeskId) -> Option<&mut Desk> {
        self.desks.get_mut(&Self::display_of(desk))
    }

    fn active_desk(&self, display: DisplayId) -> Option<&Desk> {
        self.desks.get(&display)
    }

    fn set_active_desk(&mut self, _display: DisplayId, _desk: DeskId) -> DeskResult<()> {
        Ok(())
    }

    fn set_desk_inactive(&mut self, _desk: DeskId) {}

    fn default_desk(&self, display: DisplayId) -> Option<&Desk> {
        self.desks.get(&display)
    }

    fn target_desk_id(&self, display: DisplayId) -> Option<DeskId> {
        Some(DeskId::for_display(display))
    }

    fn next_desk_id(&self, display: DisplayId) -> DeskId {
        DeskId::for_display(display)
    }

    fn all_active_desks(&self) -> Vec<&Desk> {
        self.desks
            .values()
            .filter(|desk| !desk.visible_tasks.is_empty())
            .collect()
    }

    fn for_all_desks(&mut self, f: &mut dyn FnMut(&mut Desk)) {
        self.desks.values_mut().for_each(f);
    }

    fn desks(&self) -> Box<dyn Iterator<Item = &Desk> + '_> {
        Box::new(self.desks.values())
    }

    fn desks_on_display(&self, display: DisplayId) -> Vec<&Desk> {
        self.desks.get(&display).into_iter().collect()
    }

    fn remove(&mut self, desk: DeskId) -> Option<Desk> {
        let slot = self.desks.get_mut(&Self::display_of(desk))?;
        let removed = slot.clone();
        slot.clear();
        Some(removed)
    }

    fn display_for_desk(&self, desk: DeskId) -> Option<DisplayId> {
        self.desks.get(&Self::display_of(desk)).map(|d| d.display)
    }

    fn remove_display(&mut self, display: DisplayId) -> Vec<Desk> {
        self.desks.remove(&display).into_iter().collect()
    }

    fn ensure_default_desk(&mut self, display: DisplayId) -> DeskResult<DeskId> {
        let desk = DeskId::for_display(display);
        self.create_desk(display, desk)?;
        Ok(desk)
    }

    fn is_desk_active(&self, desk: DeskId) -> bool {
        self.desk(desk)
            .is_some_and(|desk| !desk.visible_tasks.is_empty())
    }

    fn mode(&self) -> DeskMode {
        DeskMode::Single
    }
}

#[derive(Debug, Default)]
struct DisplayDesks {
    /// Creation order
    order: Vec<DeskId>,
    active: Option<DeskId>,
}

#[derive(Debug, Default)]
pub struct MultiDeskStore {
    desks: BTreeMap<DeskId, Desk>,
    displays: BTreeMap<DisplayId, DisplayDesks>,
    retired: BTreeSet<DeskId>,
}

impl MultiDeskStore {
    fn highest_used_id(&self) -> Option<DeskId> {
        let live = self.desks.keys().next_back().copied();
        let retired = self.retired.iter().next_back().copied();
        live.max(retired)
    }
}

impl DeskStore for MultiDeskStore {
    fn create_desk(&mut self, display: DisplayId, desk: DeskId) -> DeskResult<()> {
        if self.retired.contains(&desk) {
            return Err(DeskError::DeskRetired(desk));
        }
        if let Some(existing) = self.desks.get(&desk) {
            if existing.display != display {
                return Err(DeskError::InvalidOperation(format!(
                    "{desk} already exists on {}",
                    existing.display
                )));
            }
            tracing::debug!("{desk} already exists on {}", existing.display);
            return Ok(());
        }
        self.desks.insert(desk, Desk::new(desk, display));
        self.displays.entry(display).or_default().order.push(desk);
        Ok(())
    }

    fn desk(&self, desk: DeskId) -> Option<&Desk> {
        self.desks.get(&desk)
    }

    fn desk_mut(&mut self, desk: DeskId) -> Option<&mut Desk> {
        self.desks.get_mut(&desk)
    }

    fn active_desk(&self, display: DisplayId) -> Option<&Desk> {
        let active = self.displays.get(&display)?.active?;
        self.desks.get(&active)
    }

    fn set_active_desk(&mut self, display: DisplayId, desk: DeskId) -> DeskResult<()> {
        let on_display = self
            .desks
            .get(&desk)
            .filter(|d| d.display == display)
            .ok_or_log(|| DeskError::DeskNotFound(desk))?;
        let id = on_display.id;
        self.displays.entry(display).or_default().active = Some(id);
        Ok(())
    }

    fn set_desk_inactive(&mut self, desk: DeskId) {
        for display in self.displays.values_mut() {
            if display.active == Some(desk) {
                display.active = None;
            }
        }
    }

    fn default_desk(&self, display: DisplayId) -> Option<&Desk> {
        let desks = self.displays.get(&display)?;
        desks
            .active
            .or_else(|| desks.order.first().copied())
            .and_then(|id| self.desks.get(&id))
    }

    fn target_desk_id(&self, display: DisplayId) -> Option<DeskId> {
        self.default_desk(display).map(|d| d.id)
    }

    fn next_desk_id(&self, _display: DisplayId) -> DeskId {
        self.highest_used_id()
            .map(|id| DeskId::new(id.get() + 1))
            .unwrap_or(DeskId::new(0))
    }

    fn all_active_desks(&self) -> Vec<&Desk> {
        self.displays
            .values()
            .filter_map(|d| d.active)
            .filter_map(|id| self.desks.get(&id))
            .collect()
    }

    fn for_all_desks(&mut self, f: &mut dyn FnMut(&mut Desk)) {
        self.desks.values_mut().for_each(f);
    }

    fn desks(&self) -> Box<dyn Iterator<Item = &Desk> + '_> {
        Box::new(self.desks.values())
    }

    fn desks_on_display(&self, display: DisplayId) -> Vec<&Desk> {
        self.displays
            .get(&display)
            .map(|d| d.order.iter().filter_map(|id| self.desks.get(id)).collect())
            .unwrap_or_default()
    }

    fn remove(&mut self, desk: DeskId) -> Option<Desk> {
        let removed = self.desks.remove(&desk)?;
        if let Some(display) = self.displays.get_mut(&removed.display) {
            display.order.retain(|id| *id != desk);
            if display.active == Some(desk) {
                display.active = None;
            }
        }
        self.retired.insert(desk);
        Some(removed)
    }

    fn display_for_desk(&self, desk: DeskId) -> Option<DisplayId> {
        self.desks.get(&desk).map(|d| d.display)
    }

    fn remove_display(&mut self, display: DisplayId) -> Vec<Desk> {
        let Some(desks) = self.displays.remove(&display) else {
            return Vec::new();
        };
        desks
            .order
            .into_iter()
            .filter_map(|id| {
                self.retired.insert(id);
                self.desks.remove(&id)
            })
            .collect()
    }

    fn ensure_default_desk(&mut self, display: DisplayId) -> DeskResult<DeskId> {
        if let Some(desk) = self.default_desk(display) {
            return Ok(desk.id);
        }
        let desk = self.next_desk_id(display);
        self.create_desk(display, desk)?;
        Ok(desk)
    }

    fn is_desk_active(&self, desk: DeskId) -> bool {
        self.displays.values().any(|d| d.active == Some(desk))
    }

    fn mode(&self) -> DeskMode {
        DeskMode::Multi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TaskId;

    #[test]
    fn single_store_aliases_and_clears_in_place() {
        let mut store = SingleDeskStore::default();
        let display = DisplayId::new(2);
        let desk = store.ensure_default_desk(display).unwrap();
        assert_eq!(desk, DeskId::new(2));
        assert!(store.create_desk(display, DeskId::new(5)).is_err());

        let task = TaskId::new(1);
        if let Some(d) = store.desk_mut(desk) {
            d.bring_to_front(task);
            d.set_visible(task, true);
        }
        assert!(store.is_desk_active(desk));

        let removed = store.remove(desk).unwrap();
        assert!(removed.contains(task));
        assert!(store.desk(desk).is_some_and(|d| d.active_tasks.is_empty()));
        assert!(!store.is_any_desk_active(display));
    }

    #[test]
    fn multi_store_default_falls_back_to_first_created() {
        let mut store = MultiDeskStore::default();
        let display = DisplayId::DEFAULT;
        store.create_desk(display, DeskId::new(1)).unwrap();
        store.create_desk(display, DeskId::new(2)).unwrap();

        assert_eq!(store.default_desk(display).map(|d| d.id), Some(DeskId::new(1)));
        store.set_active_desk(display, DeskId::new(2)).unwrap();
        assert_eq!(store.default_desk(display).map(|d| d.id), Some(DeskId::new(2)));
        store.set_desk_inactive(DeskId::new(2));
        assert!(!store.is_any_desk_active(display));
        assert_eq!(store.default_desk(display).map(|d| d.id), Some(DeskId::new(1)));
    }

    #[test]
    fn multi_store_never_reuses_removed_ids() {
        let mut store = MultiDeskStore::default();
        let display = DisplayId::DEFAULT;
        let first = store.ensure_default_desk(display).unwrap();
        assert!(store.remove(first).is_some());

        assert!(matches!(
            store.create_desk(display, first),
            Err(DeskError::DeskRetired(_))
        ));
        assert_ne!(store.next_desk_id(display), first);
    }

    #[test]
    fn multi_store_rejects_activation_across_displays() {
        let mut store = MultiDeskStore::default();
        store.create_desk(DisplayId::new(1), DeskId::new(1)).unwrap();
        assert!(store.set_active_desk(DisplayId::new(2), DeskId::new(1)).is_err());
    }
}
