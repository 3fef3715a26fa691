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

//! Percent-encoding of characters that may not appear in references.

use std::fmt::Write as _;

use super::chars::is_hex;
use super::split::split_iri;
use super::text::IriText;
use super::ParseMode;

/// Selects which characters `escape_uri` encodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeMode {
    /// Non-ASCII characters and every ASCII character that cannot appear
    /// in a URI, whether or not the input is a valid URI.
    Uri,
    /// Only non-ASCII characters, and only if the input is a valid IRI.
    ValidIri,
    /// Only non-ASCII characters, whether or not the input is valid.
    Iri,
    /// Like `Uri`, but a `%` which does not begin a valid percent-encoded
    /// triplet is also encoded.
    UriStrictPercent,
}

impl EscapeMode {
    /// Looks up the mode by its traditional number, 0 through 3.
    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            0 => Some(EscapeMode::Uri),
            1 => Some(EscapeMode::ValidIri),
            2 => Some(EscapeMode::Iri),
            3 => Some(EscapeMode::UriStrictPercent),
            _ => None,
        }
    }
}

fn percent_encode_utf8(out: &mut String, ch: char) {
    let mut buf = [0u8; 4];
    for &b in ch.encode_utf8(&mut buf).as_bytes() {
        let _ = write!(out, "%{:02X}", b);
    }
}

/// Escapes characters of `s` which cannot appear in a URI or IRI.
///
/// Square brackets are left alone inside the authority and escaped
/// anywhere else. Unpaired surrogates are read as U+FFFD. Returns `None`
/// only in `ValidIri` mode when `s` is not a valid IRI.
///
/// Escaping is idempotent: escaping the result again with the same mode
/// does not change it.
pub fn escape_uri<T: IriText + ?Sized>(
    s: &T,
    mode: EscapeMode,
) -> Option<String> {
    let segments = if EscapeMode::ValidIri == mode {
        Some(split_iri(s, ParseMode::IriStrict)?)
    } else {
        split_iri(s, ParseMode::IriSurrogateLenient)
    };
    let authority = segments.and_then(|segments| segments.authority);
    let in_authority = |ix: usize| {
        authority.as_ref().map_or(false, |range| range.contains(&ix))
    };

    let len = s.unit_len();
    let mut out = String::with_capacity(len);
    let mut index = 0;
    while index < len {
        let (c, next) = s.decode_at(index, len);
        let ch = c.and_then(std::char::from_u32).unwrap_or('\u{FFFD}');

        let escape = match mode {
            EscapeMode::Uri | EscapeMode::UriStrictPercent => {
                if '%' == ch && EscapeMode::UriStrictPercent == mode {
                    !(index + 2 < len
                        && is_hex(s.unit(index + 1))
                        && is_hex(s.unit(index + 2)))
                } else if ch >= '\x7F'
                    || ch <= ' '
                    || "{}|^\\`<>\"".contains(ch)
                {
                    true
                } else {
                    ('[' == ch || ']' == ch) && !in_authority(index)
                }
            },
            EscapeMode::ValidIri | EscapeMode::Iri => {
                !ch.is_ascii()
                    || (('[' == ch || ']' == ch) && !in_authority(index))
            },
        };

        if escape {
            percent_encode_utf8(&mut out, ch);
        } else {
            out.push(ch);
        }

        index = next;
    }

    Some(out)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn esc(s: &str, mode: EscapeMode) -> String {
        escape_uri(s, mode).unwrap()
    }

    #[test]
    fn escape_unsafe_ascii() {
        assert_eq!(
            "http://example.com/a%20b",
            esc("http://example.com/a b", EscapeMode::Uri)
        );
        assert_eq!("%3Cx%3E%7B%7D%22", esc("<x>{}\"", EscapeMode::Uri));
        assert_eq!("a%7Fb%0A", esc("a\x7Fb\n", EscapeMode::Uri));
        assert_eq!("caf%C3%A9", esc("caf\u{e9}", EscapeMode::Uri));
        assert_eq!("%F0%9F%98%80", esc("\u{1F600}", EscapeMode::Uri));
    }

    #[test]
    fn escape_percent() {
        assert_eq!("100%", esc("100%", EscapeMode::Uri));
        assert_eq!("100%25", esc("100%", EscapeMode::UriStrictPercent));
        assert_eq!("a%41", esc("a%41", EscapeMode::UriStrictPercent));
        assert_eq!("a%25zz", esc("a%zz", EscapeMode::UriStrictPercent));
        assert_eq!("%25a", esc("%a", EscapeMode::UriStrictPercent));
    }

    #[test]
    fn escape_brackets() {
        assert_eq!(
            "http://[::1]/%5Bx%5D",
            esc("http://[::1]/[x]", EscapeMode::Uri)
        );
        // Brackets outside the authority make the input invalid
        assert_eq!(None, escape_uri("http://[::1]/[x]", EscapeMode::ValidIri));
        assert_eq!(
            "http://[::1]/x%C3%A9",
            esc("http://[::1]/x\u{e9}", EscapeMode::ValidIri)
        );
        assert_eq!("a%5B%5D", esc("a[]", EscapeMode::Iri));
    }

    #[test]
    fn escape_non_ascii_only() {
        assert_eq!("a b%C3%A9", esc("a b\u{e9}", EscapeMode::Iri));
        assert_eq!(None, escape_uri("a b", EscapeMode::ValidIri));
        assert_eq!("caf%C3%A9", esc("caf\u{e9}", EscapeMode::ValidIri));
    }

    #[test]
    fn escape_utf16() {
        let text = [0x61u16, 0xD800, 0x62];
        assert_eq!(
            Some("a%EF%BF%BDb".to_owned()),
            escape_uri(&text[..], EscapeMode::Uri)
        );
        assert_eq!(None, escape_uri(&text[..], EscapeMode::ValidIri));

        let text: Vec<u16> = "//h/\u{1F600}".encode_utf16().collect();
        assert_eq!(
            Some("//h/%F0%9F%98%80".to_owned()),
            escape_uri(&text[..], EscapeMode::Iri)
        );
    }

    proptest! {
        #[test]
        fn escaping_is_idempotent(
            s in "[a-f0-9%/?#:@ {}<>\\[\\]\u{e9}\u{1F600}]{0,20}",
            mode in 0u32..4,
        ) {
            let mode = EscapeMode::from_number(mode).unwrap();
            if let Some(once) = escape_uri(&s[..], mode) {
                let twice = escape_uri(&once[..], mode);
                prop_assert_eq!(Some(once), twice);
            }
        }
    }
}
