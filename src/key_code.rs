//! Symbolic names for the key codes reported by the kernel (see [input-event-codes.h]).
//!
//! [input-event-codes.h]: https://elixir.bootlin.com/linux/v5.19.17/source/include/uapi/linux/input-event-codes.h#L64

use std::fmt;

macro_rules! key_codes {
    ($($code:literal => $variant:ident: $name:literal,)*) => {
        /// A physical key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KeyCode {
            $($variant,)*
            /// A key without a symbolic name.
            Other(u16),
        }

        impl From<u16> for KeyCode {
            fn from(code: u16) -> Self {
                match code {
                    $($code => KeyCode::$variant,)*
                    n => KeyCode::Other(n),
                }
            }
        }

        impl KeyCode {
            /// The raw key code.
            pub fn code(self) -> u16 {
                match self {
                    $(KeyCode::$variant => $code,)*
                    KeyCode::Other(n) => n,
                }
            }
        }

        impl fmt::Display for KeyCode {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(KeyCode::$variant => f.write_str($name),)*
                    KeyCode::Other(n) => write!(f, "KEY_{n}"),
                }
            }
        }
    };
}

key_codes! {
    1 => Esc: "ESC",
    2 => Num1: "NUM_1",
    3 => Num2: "NUM_2",
    4 => Num3: "NUM_3",
    5 => Num4: "NUM_4",
    6 => Num5: "NUM_5",
    7 => Num6: "NUM_6",
    8 => Num7: "NUM_7",
    9 => Num8: "NUM_8",
    10 => Num9: "NUM_9",
    11 => Num0: "NUM_0",
    12 => Minus: "MINUS",
    13 => Equals: "EQUALS",
    14 => Backspace: "BACKSPACE",
    15 => Tab: "TAB",
    16 => Q: "Q",
    17 => W: "W",
    18 => E: "E",
    19 => R: "R",
    20 => T: "T",
    21 => Y: "Y",
    22 => U: "U",
    23 => I: "I",
    24 => O: "O",
    25 => P: "P",
    26 => LeftBracket: "LEFT_BRACKET",
    27 => RightBracket: "RIGHT_BRACKET",
    28 => Enter: "ENTER",
    29 => LeftControl: "LEFT_CONTROL",
    30 => A: "A",
    31 => S: "S",
    32 => D: "D",
    33 => F: "F",
    34 => G: "G",
    35 => H: "H",
    36 => J: "J",
    37 => K: "K",
    38 => L: "L",
    39 => Semicolon: "SEMICOLON",
    40 => Apostrophe: "APOSTROPHE",
    41 => Tilde: "TILDE",
    42 => LeftShift: "LEFT_SHIFT",
    43 => Backslash: "BACKSLASH",
    44 => Z: "Z",
    45 => X: "X",
    46 => C: "C",
    47 => V: "V",
    48 => B: "B",
    49 => N: "N",
    50 => M: "M",
    51 => Comma: "COMMA",
    52 => Period: "PERIOD",
    53 => Slash: "SLASH",
    54 => RightShift: "RIGHT_SHIFT",
    55 => NumpadMultiply: "NUMPAD_MULTIPLY",
    56 => LeftAlt: "LEFT_ALT",
    57 => Space: "SPACE",
    58 => CapsLock: "CAPS_LOCK",
    59 => F1: "F1",
    60 => F2: "F2",
    61 => F3: "F3",
    62 => F4: "F4",
    63 => F5: "F5",
    64 => F6: "F6",
    65 => F7: "F7",
    66 => F8: "F8",
    67 => F9: "F9",
    68 => F10: "F10",
    69 => NumLock: "NUM_LOCK",
    70 => ScrollLock: "SCROLL_LOCK",
    71 => Numpad7: "NUMPAD_7",
    72 => Numpad8: "NUMPAD_8",
    73 => Numpad9: "NUMPAD_9",
    74 => NumpadMinus: "NUMPAD_MINUS",
    75 => Numpad4: "NUMPAD_4",
    76 => Numpad5: "NUMPAD_5",
    77 => Numpad6: "NUMPAD_6",
    78 => NumpadPlus: "NUMPAD_PLUS",
    79 => Numpad1: "NUMPAD_1",
    80 => Numpad2: "NUMPAD_2",
    81 => Numpad3: "NUMPAD_3",
    82 => Numpad0: "NUMPAD_0",
    83 => NumpadPeriod: "NUMPAD_PERIOD",
    87 => F11: "F11",
    88 => F12: "F12",
    96 => NumpadEnter: "NUMPAD_ENTER",
    97 => RightControl: "RIGHT_CONTROL",
    98 => NumpadDivide: "NUMPAD_DIVIDE",
    99 => PrintScreen: "PRINT_SCREEN",
    100 => RightAlt: "RIGHT_ALT",
    102 => Home: "HOME",
    103 => UpArrow: "UP_ARROW",
    104 => PageUp: "PAGE_UP",
    105 => LeftArrow: "LEFT_ARROW",
    106 => RightArrow: "RIGHT_ARROW",
    107 => End: "END",
    108 => DownArrow: "DOWN_ARROW",
    109 => PageDown: "PAGE_DOWN",
    110 => Insert: "INSERT",
    111 => Delete: "DELETE",
    119 => Pause: "PAUSE",
    125 => LeftMeta: "WINDOWS",
    126 => RightMeta: "RIGHT_WINDOWS",
    127 => Menu: "MENU",
    183 => F13: "F13",
    184 => F14: "F14",
    185 => F15: "F15",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_symbolic_names() {
        assert_eq!(KeyCode::from(30), KeyCode::A);
        assert_eq!(KeyCode::from(30).to_string(), "A");
        assert_eq!(KeyCode::from(2).to_string(), "NUM_1");
        assert_eq!(KeyCode::from(42).to_string(), "LEFT_SHIFT");
        assert_eq!(KeyCode::from(96).to_string(), "NUMPAD_ENTER");
    }

    #[test]
    fn unknown_codes_are_kept() {
        let key = KeyCode::from(240);

        assert_eq!(key, KeyCode::Other(240));
        assert_eq!(key.code(), 240);
        assert_eq!(key.to_string(), "KEY_240");
    }

    #[test]
    fn code_round_trips_for_named_keys() {
        for code in [1u16, 14, 57, 88, 111, 185] {
            assert_eq!(KeyCode::from(code).code(), code);
        }
    }
}
