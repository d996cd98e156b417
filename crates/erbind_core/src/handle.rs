//! Handle tokens and the generational table behind them.
//!
//! Callers never see native handle values. A token packs a slot index and the
//! slot's generation into a `u64`; releasing a slot bumps its generation, so a
//! token that outlived its resource can never resolve again, even after the
//! slot is reused.

use std::fmt;

macro_rules! handle_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Rebuilds a token from its raw value.
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw token value. Zero is never issued.
            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

handle_token!(
    /// A configuration document opened by `ConfigService::create` or `load`.
    ConfigHandle
);

handle_token!(
    /// An entity list cursor opened by `DiagnosticService::get_entity_list_by_size`.
    EntityListHandle
);

#[derive(Debug)]
struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

/// A generational arena keyed by raw `u64` tokens.
#[derive(Debug)]
pub struct HandleTable<V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    len: usize,
}

impl<V> HandleTable<V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores a value and returns its token.
    pub fn insert(&mut self, value: V) -> u64 {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                // Tables never hold anywhere near u32::MAX live resources.
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;
        pack(index, slot.generation)
    }

    /// Returns the value a token names.
    pub fn get(&self, token: u64) -> Option<&V> {
        let (index, generation) = unpack(token);
        self.slots
            .get(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns the value a token names, mutably.
    pub fn get_mut(&mut self, token: u64) -> Option<&mut V> {
        let (index, generation) = unpack(token);
        self.slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Releases a token and returns its value.
    pub fn remove(&mut self, token: u64) -> Option<V> {
        let (index, generation) = unpack(token);
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        self.release(index);
        Some(value)
    }

    /// Releases every token and returns the values.
    pub fn drain(&mut self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.len);
        for index in 0..self.slots.len() {
            if let Some(value) = self.slots[index].value.take() {
                values.push(value);
                self.release(index as u32);
            }
        }
        values
    }

    /// Returns the number of live tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no token is live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        // Generation 0 is skipped so that no token is ever zero.
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(index);
        self.len -= 1;
    }
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

const fn pack(index: u32, generation: u32) -> u64 {
    ((generation as u64) << 32) | index as u64
}

const fn unpack(token: u64) -> (u32, u32) {
    (token as u32, (token >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_get_remove() {
        let mut table = HandleTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, b);
        assert_eq!(table.get(a), Some(&"a"));
        assert_eq!(table.len(), 2);

        assert_eq!(table.remove(a), Some("a"));
        assert_eq!(table.get(a), None);
        assert_eq!(table.remove(a), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reused_slot_rejects_stale_token() {
        let mut table = HandleTable::new();
        let old = table.insert(1);
        table.remove(old);
        let new = table.insert(2);

        assert_eq!(old as u32, new as u32, "slot index is reused");
        assert_ne!(old, new);
        assert_eq!(table.get(old), None);
        assert_eq!(table.get(new), Some(&2));
    }

    #[test]
    fn drain_invalidates_everything() {
        let mut table = HandleTable::new();
        let tokens: Vec<u64> = (0..4).map(|n| table.insert(n)).collect();
        let mut values = table.drain();
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2, 3]);
        assert!(table.is_empty());
        assert!(tokens.iter().all(|t| table.get(*t).is_none()));

        let next = table.insert(9);
        assert!(!tokens.contains(&next));
    }

    #[test]
    fn zero_is_never_issued() {
        let mut table = HandleTable::new();
        let token = table.insert(());
        assert_ne!(token, 0);
        assert_eq!(table.get(0), None);
    }

    #[test]
    fn token_formatting() {
        let handle = ConfigHandle::from_raw(0x1_0000_0000);
        assert_eq!(handle.as_raw(), 0x1_0000_0000);
        assert_eq!(handle.to_string(), "0x100000000");
        assert_eq!(format!("{handle:?}"), "ConfigHandle(0x100000000)");
    }

    proptest! {
        #[test]
        fn live_tokens_are_unique(ops in prop::collection::vec(any::<bool>(), 1..200)) {
            let mut table = HandleTable::new();
            let mut live: Vec<u64> = Vec::new();
            let mut dead: Vec<u64> = Vec::new();
            for insert in ops {
                if insert || live.is_empty() {
                    let token = table.insert(());
                    prop_assert!(!live.contains(&token));
                    prop_assert!(!dead.contains(&token));
                    live.push(token);
                } else {
                    let token = live.remove(0);
                    prop_assert!(table.remove(token).is_some());
                    dead.push(token);
                }
            }
            prop_assert_eq!(table.len(), live.len());
            for token in &dead {
                prop_assert!(table.get(*token).is_none());
            }
        }
    }
}
