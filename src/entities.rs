/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub mod predefined {
    pub const LT: &str = "&lt;";
    pub const GT: &str = "&gt;";
    pub const AMP: &str = "&amp;";
    pub const APOS: &str = "&apos;";
    pub const QUOT: &str = "&quot;";
}

fn entity(c: u8) -> Option<&'static str> {
    match c {
        b'<' => Some(predefined::LT),
        b'>' => Some(predefined::GT),
        b'&' => Some(predefined::AMP),
        b'\'' => Some(predefined::APOS),
        b'"' => Some(predefined::QUOT),
        _ => None,
    }
}

pub fn escaped_size(s: &str) -> usize {
    s.bytes()
        .map(|c| entity(c).map_or(1, |ent| ent.len()))
        .sum()
}

pub fn escape<W: std::fmt::Write>(s: &str, out: &mut W) -> std::fmt::Result {
    let mut back = 0;
    for (pos, c) in s.bytes().enumerate() {
        if let Some(ent) = entity(c) {
            out.write_str(&s[back..pos])?;
            out.write_str(ent)?;
            back = pos + 1;
        }
    }
    out.write_str(&s[back..])
}
