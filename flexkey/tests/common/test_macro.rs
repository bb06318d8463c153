extern crate flexkey;

// a macro to create a key sequence simulating key presses
#[macro_export]
macro_rules! key_sequence {
    ($([$row:expr, $col:expr, $pressed:expr, $delay:expr]),* $(,)?) => {
        vec![
            $(
                $crate::common::TestKeyPress {
                    row: $row,
                    col: $col,
                    pressed: $pressed,
                    delay: $delay,
                },
            )*
        ]
    };
}

// a macro to create the expected hid report list
#[macro_export]
macro_rules! key_report {
    ($([$modifier:expr, $keys:expr]),* $(,)?) => {
        vec![
            $(
                flexkey::hid::KeyboardReport {
                    modifier: $modifier,
                    keycodes: $keys,
                    leds: 0,
                    reserved: 0,
                },
            )*
        ]
    };
}

// a macro to map a keycode name to its report byte
#[macro_export]
macro_rules! kc8 {
    ($key:ident) => {
        flexkey::keycode::KeyCode::$key as u8
    };
}
