//! Key scripts for `imegate type`.
//!
//! Plain characters are sent as their key codes. Named keys go in braces,
//! e.g. `nihao{Page_Down}2` or `wo{BackSpace}{Escape}`; `{{` is a literal `{`.

use anyhow::{bail, Result};
use imegate_core::keys::{key_code, keysym, modifier};

/// One key press: (key id, modifier mask).
pub type KeyPress = (u32, u32);

fn named_key(name: &str) -> Option<u32> {
    let code = match name {
        "BackSpace" => keysym::BACKSPACE,
        "Tab" => keysym::TAB,
        "Return" => keysym::RETURN,
        "Escape" => keysym::ESCAPE,
        "Home" => keysym::HOME,
        "Left" => keysym::LEFT,
        "Up" => keysym::UP,
        "Right" => keysym::RIGHT,
        "Down" => keysym::DOWN,
        "Page_Up" => keysym::PAGE_UP,
        "Page_Down" => keysym::PAGE_DOWN,
        "End" => keysym::END,
        "Delete" => keysym::DELETE,
        "space" => key_code(' '),
        _ => return None,
    };
    Some(code)
}

/// Parse a key script. `{Control+a}` style prefixes add modifiers.
pub fn parse(script: &str) -> Result<Vec<KeyPress>> {
    let mut keys = Vec::new();
    let mut chars = script.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '{' {
            keys.push((key_code(ch), 0));
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            keys.push((key_code('{'), 0));
            continue;
        }
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => bail!("unterminated key name `{{{}`", name),
            }
        }
        keys.push(parse_named(&name)?);
    }
    Ok(keys)
}

fn parse_named(name: &str) -> Result<KeyPress> {
    let mut mask = 0;
    let mut parts: Vec<&str> = name.split('+').collect();
    let key = parts.pop().unwrap_or_default();
    for m in parts {
        mask |= match m {
            "Shift" => modifier::SHIFT,
            "Control" => modifier::CONTROL,
            "Alt" => modifier::ALT,
            "Super" => modifier::SUPER,
            "Release" => modifier::RELEASE,
            other => bail!("unknown modifier `{}`", other),
        };
    }
    let mut single = key.chars();
    let code = match (single.next(), single.next()) {
        (Some(c), None) => key_code(c),
        _ => match named_key(key) {
            Some(code) => code,
            None => bail!("unknown key `{}`", key),
        },
    };
    Ok((code, mask))
}
