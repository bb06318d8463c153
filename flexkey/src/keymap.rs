//! Position → key action lookup.

use crate::action::KeyAction;
use crate::event::KeyPos;

/// Fixed keymap for a `ROW x COL` matrix, registered once at startup.
pub struct KeyMap<'a, const ROW: usize, const COL: usize> {
    map: &'a [[KeyAction; COL]; ROW],
}

impl<'a, const ROW: usize, const COL: usize> KeyMap<'a, ROW, COL> {
    pub const fn new(map: &'a [[KeyAction; COL]; ROW]) -> Self {
        Self { map }
    }

    /// Action at a position; out-of-range positions resolve to nothing.
    pub fn get(&self, pos: KeyPos) -> KeyAction {
        self.map
            .get(pos.row as usize)
            .and_then(|row| row.get(pos.col as usize))
            .copied()
            .unwrap_or(KeyAction::No)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::{Key, KeyCode};

    #[test]
    fn lookup_and_out_of_range() {
        static MAP: [[KeyAction; 2]; 1] = [[
            KeyAction::Key(Key::new(KeyCode::A)),
            KeyAction::No,
        ]];
        let keymap = KeyMap::new(&MAP);
        assert_eq!(
            keymap.get(KeyPos { row: 0, col: 0 }),
            KeyAction::Key(Key::new(KeyCode::A))
        );
        assert_eq!(keymap.get(KeyPos { row: 0, col: 1 }), KeyAction::No);
        assert_eq!(keymap.get(KeyPos { row: 5, col: 0 }), KeyAction::No);
    }
}
