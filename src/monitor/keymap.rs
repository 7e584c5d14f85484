//! Key name resolution: "F8" to X11 keycode.
//!
//! Used for `--capture-key`. Only the key itself matters: the capture
//! combination matches on keycode, whatever modifiers are held.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, Keysym, Setup};

use super::MonitorError;

/// Resolve a key name to a keycode on the connected server.
pub fn resolve_key(name: &str, conn: &impl Connection, setup: &Setup) -> Result<u32, MonitorError> {
    let keysym = key_name_to_keysym(name.trim())
        .ok_or_else(|| MonitorError::InvalidKey(format!("unknown key: {name:?}")))?;

    keysym_to_keycode(conn, setup, keysym)
        .map(u32::from)
        .ok_or_else(|| {
            MonitorError::InvalidKey(format!(
                "keysym 0x{keysym:04x} not found in keyboard mapping"
            ))
        })
}

/// Map a key name to an X11 keysym.
///
/// Single ASCII letters and digits, F1-F24, and the named keys that do
/// nothing on their own in most applications: Pause, Scroll_Lock, Print,
/// Insert and Menu.
fn key_name_to_keysym(name: &str) -> Option<Keysym> {
    if name.len() == 1 {
        let ch = name.chars().next()?;
        if ch.is_ascii_alphabetic() {
            return Some(ch.to_ascii_lowercase() as Keysym);
        }
        if ch.is_ascii_digit() {
            return Some(ch as Keysym);
        }
    }

    // XK_F1 = 0xffbe and the rest follow contiguously.
    if let Some(rest) = name.strip_prefix('F').or_else(|| name.strip_prefix('f'))
        && let Ok(n) = rest.parse::<u32>()
        && (1..=24).contains(&n)
    {
        return Some(0xffbe + n - 1);
    }

    match name.to_ascii_lowercase().as_str() {
        "pause" => Some(0xff13),
        "scroll_lock" | "scrolllock" => Some(0xff14),
        "print" => Some(0xff61),
        "insert" => Some(0xff63),
        "menu" => Some(0xff67),
        _ => None,
    }
}

/// First keycode that produces `keysym` in the server's keyboard mapping.
fn keysym_to_keycode(conn: &impl Connection, setup: &Setup, keysym: Keysym) -> Option<u8> {
    let min_keycode = setup.min_keycode;
    let max_keycode = setup.max_keycode;
    let count = max_keycode - min_keycode + 1;

    let reply = xproto::get_keyboard_mapping(conn, min_keycode, count)
        .ok()?
        .reply()
        .ok()?;

    let syms_per_code = reply.keysyms_per_keycode as usize;
    if syms_per_code == 0 {
        return None;
    }

    reply
        .keysyms
        .chunks(syms_per_code)
        .position(|syms| syms.contains(&keysym))
        .map(|i| min_keycode + i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_lowercase_keysyms() {
        assert_eq!(key_name_to_keysym("C"), Some(0x63));
        assert_eq!(key_name_to_keysym("z"), Some(0x7a));
    }

    #[test]
    fn digits() {
        assert_eq!(key_name_to_keysym("0"), Some(0x30));
        assert_eq!(key_name_to_keysym("9"), Some(0x39));
    }

    #[test]
    fn function_keys() {
        assert_eq!(key_name_to_keysym("F1"), Some(0xffbe));
        assert_eq!(key_name_to_keysym("f8"), Some(0xffc5));
        assert_eq!(key_name_to_keysym("F24"), Some(0xffd5));
        assert_eq!(key_name_to_keysym("F0"), None);
        assert_eq!(key_name_to_keysym("F25"), None);
    }

    #[test]
    fn named_keys() {
        assert_eq!(key_name_to_keysym("pause"), Some(0xff13));
        assert_eq!(key_name_to_keysym("Scroll_Lock"), Some(0xff14));
        assert_eq!(key_name_to_keysym("scrolllock"), Some(0xff14));
        assert_eq!(key_name_to_keysym("Print"), Some(0xff61));
        assert_eq!(key_name_to_keysym("Insert"), Some(0xff63));
        assert_eq!(key_name_to_keysym("Menu"), Some(0xff67));
    }

    #[test]
    fn editing_keys_are_not_capture_keys() {
        for name in ["Escape", "esc", "Return", "Tab", "space", "Super_L"] {
            assert_eq!(key_name_to_keysym(name), None, "{name}");
        }
    }

    #[test]
    fn unknown_key() {
        assert_eq!(key_name_to_keysym(""), None);
        assert_eq!(key_name_to_keysym("Hyper"), None);
    }
}
