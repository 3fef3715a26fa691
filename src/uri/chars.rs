//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mimetree.
//
// Mimetree is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mimetree is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mimetree. If not, see <http://www.gnu.org/licenses/>.

//! Character classes of the RFC 3987 grammar, over code points.
//!
//! None of these include `%`; percent-encoded triplets are checked by the
//! callers.

fn is_ascii_in(c: u32, set: &[u8]) -> bool {
    c < 0x80 && set.contains(&(c as u8))
}

fn is_alnum(c: u32) -> bool {
    c < 0x80 && (c as u8).is_ascii_alphanumeric()
}

/// `ucschar`, as far as the classes other than `iquery` allow it.
fn is_ucschar(c: u32) -> bool {
    (c >= 0xA0 && c <= 0xD7FF)
        || (c >= 0xF900 && c <= 0xFDCF)
        || (c >= 0xFDF0 && c <= 0xFFEF)
        || (c >= 0x10000 && c <= 0xEFFFD && (c & 0xFFFE) != 0xFFFE)
}

/// `ucschar` or `iprivate`.
fn is_ucschar_or_iprivate(c: u32) -> bool {
    (c >= 0xA0 && c <= 0xD7FF)
        || (c >= 0xE000 && c <= 0xFDCF)
        || (c >= 0xFDF0 && c <= 0xFFEF)
        || (c >= 0x10000 && c <= 0x10FFFD && (c & 0xFFFE) != 0xFFFE)
}

pub fn is_hex(c: u32) -> bool {
    c < 0x80 && (c as u8).is_ascii_hexdigit()
}

pub fn is_digit(c: u32) -> bool {
    c < 0x80 && (c as u8).is_ascii_digit()
}

pub fn is_alpha(c: u32) -> bool {
    c < 0x80 && (c as u8).is_ascii_alphabetic()
}

pub fn is_scheme_char(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b"+-.")
}

/// `ipchar`, plus `/`.
pub fn is_ipchar(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b"/-._~:@!$&'()*+,;=") || is_ucschar(c)
}

pub fn is_iquery_char(c: u32) -> bool {
    is_alnum(c)
        || is_ascii_in(c, b"/?-._~:@!$&'()*+,;=")
        || is_ucschar_or_iprivate(c)
}

pub fn is_ifragment_char(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b"/?-._~:@!$&'()*+,;=") || is_ucschar(c)
}

pub fn is_ireg_name_char(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b"-._~!$&'()*+,;=") || is_ucschar(c)
}

pub fn is_iuserinfo_char(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b"-._~:!$&'()*+,;=") || is_ucschar(c)
}

pub fn is_ipvfuture_char(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b":-._~!$&'()*+,;=")
}

pub fn is_unreserved(c: u32) -> bool {
    is_alnum(c) || is_ascii_in(c, b"-._~")
}
