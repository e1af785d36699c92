//! Player slots. A slot index is also the player id carried on the wire.

use shared::{Entity, Ship, MAX_PLAYERS};

#[derive(Debug, Clone, Default)]
pub struct Roster {
    slots: Vec<Option<Ship>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `ship` into `slot`, growing the roster with empty slots as needed.
    /// Returns the ship previously held there. Slots past [`MAX_PLAYERS`] do
    /// not exist, so a ship for one is dropped.
    pub fn insert(&mut self, slot: usize, mut ship: Ship) -> Option<Ship> {
        if slot >= MAX_PLAYERS {
            return None;
        }
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }
        ship.set_player_id(slot);
        self.slots[slot].replace(ship)
    }

    pub fn remove(&mut self, slot: usize) -> Option<Ship> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Slot for the next remote player: the lowest emptied slot if there is
    /// one, otherwise the end of the roster. Slot 0 belongs to the host.
    pub fn free_slot(&self) -> Option<usize> {
        if let Some(slot) = (1..self.slots.len()).find(|&i| self.slots[i].is_none()) {
            return Some(slot);
        }
        let next = self.slots.len().max(1);
        (next < MAX_PLAYERS).then_some(next)
    }

    pub fn get(&self, slot: usize) -> Option<&Ship> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Ship> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Ship)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|ship| (i, ship)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Ship)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|ship| (i, ship)))
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Mutable access to two different slots at once.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> Option<(&mut Ship, &mut Ship)> {
        if a == b || a >= self.slots.len() || b >= self.slots.len() {
            return None;
        }
        let (low, high) = (a.min(b), a.max(b));
        let (left, right) = self.slots.split_at_mut(high);
        let (first, second) = (left[low].as_mut()?, right[0].as_mut()?);
        if a < b {
            Some((first, second))
        } else {
            Some((second, first))
        }
    }

    /// True when every ship is out of play with no lives left.
    pub fn all_out_of_lives(&self) -> bool {
        !self.is_empty()
            && self
                .iter()
                .all(|(_, ship)| ship.is_destroyed() && ship.lives() == 0)
    }

    pub fn any_accelerating(&self) -> bool {
        self.iter().any(|(_, ship)| ship.is_accelerating())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(slots: &[usize]) -> Roster {
        let mut roster = Roster::new();
        for &slot in slots {
            roster.insert(slot, Ship::new(0));
        }
        roster
    }

    #[test]
    fn test_insert_ignores_slots_past_capacity() {
        let mut roster = roster_with(&[0]);
        assert!(roster.insert(MAX_PLAYERS, Ship::new(0)).is_none());
        assert!(roster.insert(usize::MAX, Ship::new(0)).is_none());
        assert_eq!(roster.slot_count(), 1);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_insert_sets_player_id_and_grows() {
        let roster = roster_with(&[0, 3]);
        assert_eq!(roster.slot_count(), 4);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(3).map(|s| s.player_id()), Some(3));
        assert!(roster.get(1).is_none());
    }

    #[test]
    fn test_free_slot_reuses_lowest_gap() {
        let mut roster = roster_with(&[0, 1, 2, 3]);
        assert_eq!(roster.free_slot(), None);

        roster.remove(2);
        roster.remove(1);
        assert_eq!(roster.free_slot(), Some(1));

        let roster = roster_with(&[0]);
        assert_eq!(roster.free_slot(), Some(1));

        let roster = Roster::new();
        assert_eq!(roster.free_slot(), Some(1));
    }

    #[test]
    fn test_empty_slot_operations_are_noops() {
        let mut roster = roster_with(&[0]);
        assert!(roster.remove(3).is_none());
        assert!(roster.remove(7).is_none());
        assert!(roster.get_mut(2).is_none());
        assert!(roster.pair_mut(0, 2).is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_pair_mut_keeps_argument_order() {
        let mut roster = roster_with(&[0, 1, 2]);
        let (a, b) = roster.pair_mut(2, 0).unwrap();
        assert_eq!(a.player_id(), 2);
        assert_eq!(b.player_id(), 0);
    }

    #[test]
    fn test_all_out_of_lives() {
        let mut roster = roster_with(&[0, 1]);
        assert!(!roster.all_out_of_lives());

        for (_, ship) in roster.iter_mut() {
            ship.set_lives(0);
        }
        assert!(roster.all_out_of_lives());

        roster.get_mut(1).unwrap().spawn(0);
        assert!(!roster.all_out_of_lives());
    }
}
