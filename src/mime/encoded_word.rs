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

//! RFC 2047 "encoded words" and the small string transforms behind them.

use std::borrow::Cow;
use std::collections::VecDeque;

use lazy_static::lazy_static;
use log::warn;
use memchr::memchr;
use regex::Regex;

use super::charset::get_charset;
use super::content_encoding::base64_value;
use super::header::comment_length;
use super::transform::ByteTransform;
use crate::support::error::Error;

/// RFC 2047 limits encoded words to 75 characters, delimiters included.
const MAX_ENCODED_WORD_LEN: usize = 75;

lazy_static! {
    // charset (with optional RFC 2231 language), encoding, encoded text
    static ref ENCODED_WORD: Regex = Regex::new(
        r"^=\?([!#-'*+\-0-9A-Z^-~]+)\?([bBqQ])\?([!->@-~]+)\?=$"
    ).unwrap();
    static ref LANGUAGE_TAG: Regex =
        Regex::new(r"^[A-Za-z]{1,8}(-[A-Za-z0-9]{1,8})*$").unwrap();
}

/// Decodes the "B" encoding of encoded words.
///
/// Characters outside the base64 alphabet (padding included) are skipped. A
/// single dangling character at the end decodes to `?`.
#[derive(Clone, Debug)]
pub struct BEncodingTransform<'a> {
    input: &'a [u8],
    pending: VecDeque<u8>,
}

impl<'a> BEncodingTransform<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        BEncodingTransform {
            input,
            pending: VecDeque::with_capacity(3),
        }
    }
}

impl ByteTransform for BEncodingTransform<'_> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }

        let mut value = 0u32;
        let mut count = 0;
        while count < 4 {
            let (&c, rest) = match self.input.split_first() {
                Some(split) => split,
                None => break,
            };
            self.input = rest;
            if let Some(v) = base64_value(c) {
                value = (value << 6) | v;
                count += 1;
            }
        }

        match count {
            4 => {
                self.pending.push_back((value >> 8) as u8);
                self.pending.push_back(value as u8);
                Ok(Some((value >> 16) as u8))
            },
            3 => {
                value <<= 6;
                self.pending.push_back((value >> 8) as u8);
                Ok(Some((value >> 16) as u8))
            },
            2 => {
                value <<= 12;
                Ok(Some((value >> 16) as u8))
            },
            1 => Ok(Some(b'?')),
            _ => Ok(None),
        }
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Shared state machine for the hex-escape based string encodings.
#[derive(Clone, Debug)]
struct HexEscapedText<'a> {
    input: &'a [u8],
    replay: Option<u8>,
    escape: u8,
    underscore_is_space: bool,
    allow_tab: bool,
    lowest_printable: u8,
}

impl HexEscapedText<'_> {
    fn next(&mut self) -> Option<u8> {
        if let Some(b) = self.replay.take() {
            return Some(b);
        }

        let (&c, rest) = self.input.split_first()?;
        self.input = rest;

        if c == self.escape {
            let (b1, hi) = match self
                .input
                .first()
                .and_then(|&b| hex_value(b).map(|v| (b, v)))
            {
                Some(digit) => digit,
                // The bad byte gets read again as a normal character
                None => return Some(b'?'),
            };
            self.input = &self.input[1..];

            let lo = match self.input.first().and_then(|&b| hex_value(b)) {
                Some(lo) => lo,
                None => {
                    self.replay = Some(b1);
                    return Some(b'?');
                },
            };
            self.input = &self.input[1..];
            Some((hi << 4) | lo)
        } else if b'\r' == c || b'\n' == c {
            Some(b'?')
        } else if self.underscore_is_space && b'_' == c {
            Some(b' ')
        } else if b'\t' == c {
            Some(if self.allow_tab { c } else { b'?' })
        } else if c < self.lowest_printable || c >= 0x7f {
            Some(b'?')
        } else {
            Some(c)
        }
    }
}

/// Decodes the "Q" encoding of encoded words.
///
/// `_` is a space; anything that cannot legally appear in Q-encoded text
/// becomes `?`, as does a malformed `=XX` escape.
#[derive(Clone, Debug)]
pub struct QEncodingTransform<'a>(HexEscapedText<'a>);

impl<'a> QEncodingTransform<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        QEncodingTransform(HexEscapedText {
            input,
            replay: None,
            escape: b'=',
            underscore_is_space: true,
            allow_tab: false,
            lowest_printable: b'!',
        })
    }
}

impl ByteTransform for QEncodingTransform<'_> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        Ok(self.0.next())
    }
}

/// Decodes `%XX` escapes, as used by RFC 2231 extended parameter values.
///
/// Spaces and tabs pass through; other control characters, line breaks,
/// non-ASCII bytes and malformed escapes become `?`.
#[derive(Clone, Debug)]
pub struct PercentEncodingTransform<'a>(HexEscapedText<'a>);

impl<'a> PercentEncodingTransform<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        PercentEncodingTransform(HexEscapedText {
            input,
            replay: None,
            escape: b'%',
            underscore_is_space: false,
            allow_tab: true,
            lowest_printable: b' ',
        })
    }
}

impl ByteTransform for PercentEncodingTransform<'_> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        Ok(self.0.next())
    }
}

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word" in a
/// charset we know, and return its decoded value if so.
fn decode_word(word: &str) -> Option<String> {
    let captures = ENCODED_WORD.captures(word)?;

    let mut charset = captures.get(1)?.as_str();
    if let Some(star) = charset.find('*') {
        if !LANGUAGE_TAG.is_match(&charset[star + 1..]) {
            return None;
        }
        charset = &charset[..star];
    }
    if charset.is_empty() {
        return None;
    }

    let text = captures.get(3)?.as_str().as_bytes();
    let charset = match get_charset(charset) {
        Some(charset) => charset,
        None => {
            warn!("Unknown charset in encoded word: {}", word);
            return None;
        },
    };

    let decoded = if captures.get(2)?.as_str().eq_ignore_ascii_case("b") {
        charset.get_string(&mut BEncodingTransform::new(text))
    } else {
        charset.get_string(&mut QEncodingTransform::new(text))
    };
    decoded.ok()
}

/// The decoded form of one whitespace-delimited token.
struct Token<'a> {
    text: Cow<'a, str>,
    starts_with_word: bool,
    ends_with_word: bool,
}

fn decode_token(token: &str, in_comments: bool) -> Token<'_> {
    let unchanged = Token {
        text: Cow::Borrowed(token),
        starts_with_word: false,
        ends_with_word: false,
    };

    let (prefix, body) = if in_comments && token.starts_with("(=?") {
        token.split_at(1)
    } else {
        ("", token)
    };
    if !body.starts_with("=?") {
        return unchanged;
    }

    let end = body
        .bytes()
        .position(|b| {
            b <= b' '
                || b >= 0x7f
                || (in_comments && (b'(' == b || b')' == b))
        })
        .unwrap_or(body.len());
    let (candidate, rest) = body.split_at(end);
    if candidate.len() > MAX_ENCODED_WORD_LEN {
        return unchanged;
    }

    match decode_word(candidate) {
        Some(decoded) => Token {
            text: Cow::Owned(format!("{}{}{}", prefix, decoded, rest)),
            starts_with_word: prefix.is_empty(),
            ends_with_word: rest.is_empty(),
        },
        None => unchanged,
    }
}

/// Replaces every RFC 2047 encoded word in `value` with its decoded text.
///
/// Whitespace separating two adjacent encoded words is removed. When
/// `in_comments` is set, encoded words may also open or close a comment, as
/// in `(=?utf-8?q?x?=)`, which is where they may appear in structured
/// fields. Words in unknown charsets and malformed words stay as they are.
pub fn replace_encoded_words(value: &str, in_comments: bool) -> Cow<'_, str> {
    if value.len() < 9 || memchr(b'=', value.as_bytes()).is_none() {
        return Cow::Borrowed(value);
    }

    let is_wsp = |c: char| ' ' == c || '\t' == c;
    let mut out = String::with_capacity(value.len());
    let mut previous_ended_with_word = false;
    let mut rest = value;
    loop {
        let ws_end = rest.find(|c| !is_wsp(c)).unwrap_or(rest.len());
        let (ws, tail) = rest.split_at(ws_end);
        if tail.is_empty() {
            out.push_str(ws);
            break;
        }

        let token_end = tail.find(is_wsp).unwrap_or(tail.len());
        let (token, tail) = tail.split_at(token_end);
        rest = tail;

        let token = decode_token(token, in_comments);
        if !(previous_ended_with_word && token.starts_with_word) {
            out.push_str(ws);
        }
        out.push_str(&token.text);
        previous_ended_with_word = token.ends_with_word;
    }

    Cow::Owned(out)
}

/// Removes comments and collapses each run of whitespace and comments into
/// a single space, trimming both ends.
///
/// An unterminated comment is left as literal text.
pub fn strip_comments_and_extra_space(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut need_space = false;
    let mut rest = value;

    while let Some(c) = rest.chars().next() {
        if ' ' == c || '\t' == c || '\r' == c || '\n' == c {
            rest = &rest[1..];
            need_space = true;
            continue;
        }

        if '(' == c {
            if let Some(len) = comment_length(rest.as_bytes()) {
                rest = &rest[len..];
                need_space = true;
                continue;
            }
        }

        if need_space && !out.is_empty() {
            out.push(' ');
        }
        need_space = false;
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    out
}
