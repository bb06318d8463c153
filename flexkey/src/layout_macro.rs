//! Macros for building keymap literals.

/// Plain key, `k!(A)`
#[macro_export]
macro_rules! k {
    ($k:ident) => {
        $crate::action::KeyAction::Key($crate::keycode::Key::new($crate::keycode::KeyCode::$k))
    };
}

/// Key with modifiers, `wm!(A, SHIFT)`
#[macro_export]
macro_rules! wm {
    ($k:ident, $m:expr) => {
        $crate::action::KeyAction::Key($crate::keycode::Key::with_modifiers(
            $crate::keycode::KeyCode::$k,
            $m,
        ))
    };
}

/// `a!(No)` for an empty position
#[macro_export]
macro_rules! a {
    (No) => {
        $crate::action::KeyAction::No
    };
}

/// Flex key reference by definition index, `fx!(0)`
#[macro_export]
macro_rules! fx {
    ($id:expr) => {
        $crate::action::KeyAction::Flex($crate::action::FlexKeyId($id))
    };
}
