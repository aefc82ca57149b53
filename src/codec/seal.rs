//! Escaping of user text embedded in wire messages.
//!
//! Keys, values, subjects and reply addresses may contain any character,
//! while the message grammar reserves `& = | ~ % #`. Each reserved
//! character is written as a `#<code>#` token:
//!
//! | char | token |
//! |------|-------|
//! | `&`  | `#a#` |
//! | `=`  | `#e#` |
//! | `\|` | `#p#` |
//! | `~`  | `#t#` |
//! | `%`  | `#c#` |
//! | `#`  | `#h#` |
//!
//! Text without reserved characters passes through unchanged.

use crate::CodecError;

const TOKENS: [(char, &str); 6] = [
    ('&', "a"),
    ('=', "e"),
    ('|', "p"),
    ('~', "t"),
    ('%', "c"),
    ('#', "h"),
];

fn token_for(c: char) -> Option<&'static str> {
    TOKENS.iter().find(|(ch, _)| *ch == c).map(|(_, token)| *token)
}

fn char_for(token: &str) -> Option<char> {
    TOKENS.iter().find(|(_, t)| *t == token).map(|(ch, _)| *ch)
}

/// Escapes every reserved character of `raw`
pub fn seal(raw: &str) -> String {
    if !raw.chars().any(|c| token_for(c).is_some()) {
        return raw.to_string();
    }

    let mut sealed = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match token_for(c) {
            Some(token) => {
                sealed.push('#');
                sealed.push_str(token);
                sealed.push('#');
            }
            None => sealed.push(c),
        }
    }
    sealed
}

/// Reverses [`seal`]
///
/// Fails on an unterminated `#` or an unknown token, so that a corrupted
/// message is rejected instead of silently storing mangled text.
pub fn unseal(sealed: &str) -> Result<String, CodecError> {
    if !sealed.contains('#') {
        return Ok(sealed.to_string());
    }

    let mut raw = String::with_capacity(sealed.len());
    let mut rest = sealed;
    while let Some(start) = rest.find('#') {
        raw.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('#').ok_or_else(|| CodecError::InvalidEscape(sealed.to_string()))?;
        let c = char_for(&after[..end]).ok_or_else(|| CodecError::InvalidEscape(sealed.to_string()))?;
        raw.push(c);
        rest = &after[end + 1..];
    }
    raw.push_str(rest);
    Ok(raw)
}
