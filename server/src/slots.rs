//! Fixed two-slot storage keyed by [`Side`].
//!
//! Holds at most one value per side and always iterates left before right.

use pong_shared::protocol::Side;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideSlots<T> {
    left: Option<T>,
    right: Option<T>,
}

impl<T> Default for SideSlots<T> {
    fn default() -> Self {
        Self {
            left: None,
            right: None,
        }
    }
}

impl<T> SideSlots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, side: Side) -> &Option<T> {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<T> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn get(&self, side: Side) -> Option<&T> {
        self.slot(side).as_ref()
    }

    pub fn get_mut(&mut self, side: Side) -> Option<&mut T> {
        self.slot_mut(side).as_mut()
    }

    pub fn contains(&self, side: Side) -> bool {
        self.slot(side).is_some()
    }

    /// Fill an empty slot. Returns the value back if the slot is occupied.
    pub fn insert(&mut self, side: Side, value: T) -> Result<(), T> {
        let slot = self.slot_mut(side);
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn take(&mut self, side: Side) -> Option<T> {
        self.slot_mut(side).take()
    }

    /// First empty side, left before right
    pub fn first_free(&self) -> Option<Side> {
        Side::ALL.into_iter().find(|side| !self.contains(*side))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Occupied slots, left first
    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        Side::ALL
            .into_iter()
            .filter_map(move |side| self.get(side).map(|v| (side, v)))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.left.iter_mut().chain(self.right.iter_mut())
    }
}
