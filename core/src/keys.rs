//! Key codes and modifier masks at the native boundary.
//!
//! Key ids are X11 keysyms and modifiers are the X11 state mask with the
//! release bit at 30, which is what host adapters already hand to
//! composition engines. [`KeyEvent::decode`] turns a raw pair into the keys
//! the reference table engine understands.

/// Modifier mask bits.
pub mod modifier {
    pub const SHIFT: u32 = 1 << 0;
    pub const LOCK: u32 = 1 << 1;
    pub const CONTROL: u32 = 1 << 2;
    pub const ALT: u32 = 1 << 3;
    pub const SUPER: u32 = 1 << 26;
    pub const RELEASE: u32 = 1 << 30;
}

/// Keysyms for non-printable keys.
pub mod keysym {
    pub const BACKSPACE: u32 = 0xff08;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const HOME: u32 = 0xff50;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const PAGE_UP: u32 = 0xff55;
    pub const PAGE_DOWN: u32 = 0xff56;
    pub const END: u32 = 0xff57;
    pub const DELETE: u32 = 0xffff;
}

/// Keysym of a printable character. Latin-1 maps to itself, everything
/// else uses the `0x0100_0000 + codepoint` range.
pub fn key_code(ch: char) -> u32 {
    let cp = ch as u32;
    if (0x20..=0x7e).contains(&cp) || (0xa0..=0xff).contains(&cp) {
        cp
    } else {
        0x0100_0000 + cp
    }
}

/// Decoded key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Char(char),
    Space,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
    PageUp,
    PageDown,
    Enter,
    Escape,
    Tab,
    /// Key release, or a chord with Control/Alt/Super.
    Modified,
    Unknown(u32),
}

impl KeyEvent {
    pub fn decode(key_id: u32, modifier_mask: u32) -> Self {
        if modifier_mask & (modifier::RELEASE | modifier::CONTROL | modifier::ALT | modifier::SUPER)
            != 0
        {
            return KeyEvent::Modified;
        }
        match key_id {
            0x20 => KeyEvent::Space,
            keysym::BACKSPACE => KeyEvent::Backspace,
            keysym::DELETE => KeyEvent::Delete,
            keysym::LEFT => KeyEvent::Left,
            keysym::RIGHT => KeyEvent::Right,
            keysym::HOME => KeyEvent::Home,
            keysym::END => KeyEvent::End,
            keysym::UP => KeyEvent::Up,
            keysym::DOWN => KeyEvent::Down,
            keysym::PAGE_UP => KeyEvent::PageUp,
            keysym::PAGE_DOWN => KeyEvent::PageDown,
            keysym::RETURN => KeyEvent::Enter,
            keysym::ESCAPE => KeyEvent::Escape,
            keysym::TAB => KeyEvent::Tab,
            0x21..=0x7e | 0xa0..=0xff => {
                char::from_u32(key_id).map_or(KeyEvent::Unknown(key_id), KeyEvent::Char)
            }
            0x0100_0100..=0x0110_ffff => char::from_u32(key_id - 0x0100_0000)
                .map_or(KeyEvent::Unknown(key_id), KeyEvent::Char),
            other => KeyEvent::Unknown(other),
        }
    }
}
