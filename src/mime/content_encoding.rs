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

//! Content-transfer-encoding decoders, as described by RFC 2045 section 6.
//!
//! Every decoder wraps another `ByteTransform` and yields the decoded bytes.
//! Grammar violations are reported as `Error::InvalidData` rather than being
//! passed through, except where a decoder documents a lenient substitution.

use std::collections::VecDeque;
use std::fmt;

use log::debug;

use super::quoted_printable::QuotedPrintable;
use super::transform::{ByteTransform, PushbackTransform};
use crate::support::config::ParserConfig;
use crate::support::error::Error;

/// Base64 lines may not be longer than this, not counting the line ending.
const BASE64_MAX_LINE: usize = 76;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
    /// Any token not defined by RFC 2045.
    Unknown,
}

impl Default for TransferEncoding {
    fn default() -> Self {
        TransferEncoding::SevenBit
    }
}

impl TransferEncoding {
    /// Interprets the value of a `Content-Transfer-Encoding` header whose
    /// comments and extra whitespace have already been removed.
    pub fn from_token(token: &str) -> Self {
        if "7bit".eq_ignore_ascii_case(token) {
            TransferEncoding::SevenBit
        } else if "8bit".eq_ignore_ascii_case(token) {
            TransferEncoding::EightBit
        } else if "binary".eq_ignore_ascii_case(token) {
            TransferEncoding::Binary
        } else if "quoted-printable".eq_ignore_ascii_case(token) {
            TransferEncoding::QuotedPrintable
        } else if "base64".eq_ignore_ascii_case(token) {
            TransferEncoding::Base64
        } else {
            TransferEncoding::Unknown
        }
    }

    /// Whether the encoding leaves the octets of the content as they are.
    ///
    /// Only these encodings are permitted on `multipart` and `message`
    /// entities.
    pub fn is_identity(self) -> bool {
        match self {
            TransferEncoding::SevenBit
            | TransferEncoding::EightBit
            | TransferEncoding::Binary => true,
            _ => false,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::Unknown => "unknown",
        })
    }
}

/// Strict 7bit content. NUL and bytes above 0x80 are rejected.
#[derive(Debug)]
pub struct SevenBit<T> {
    input: T,
}

impl<T> SevenBit<T> {
    pub fn new(input: T) -> Self {
        SevenBit { input }
    }
}

impl<T: ByteTransform> ByteTransform for SevenBit<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        match self.input.read_next()? {
            Some(b) if b > 0x80 || 0 == b => {
                Err(Error::data("Invalid character in message body"))
            },
            next => Ok(next),
        }
    }
}

/// 7bit content where bad bytes are replaced by `?` instead of failing.
///
/// Used for `text/plain`, where a lot of real mail declares 7bit (or
/// nothing at all) and then contains 8-bit text anyway.
#[derive(Debug)]
pub struct LiberalSevenBit<T> {
    input: T,
}

impl<T> LiberalSevenBit<T> {
    pub fn new(input: T) -> Self {
        LiberalSevenBit { input }
    }
}

impl<T: ByteTransform> ByteTransform for LiberalSevenBit<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        Ok(self
            .input
            .read_next()?
            .map(|b| if b > 0x80 || 0 == b { b'?' } else { b }))
    }
}

/// 8bit content. Only NUL is rejected.
#[derive(Debug)]
pub struct EightBit<T> {
    input: T,
}

impl<T> EightBit<T> {
    pub fn new(input: T) -> Self {
        EightBit { input }
    }
}

impl<T: ByteTransform> ByteTransform for EightBit<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        match self.input.read_next()? {
            Some(0) => Err(Error::data("Invalid character in message body")),
            next => Ok(next),
        }
    }
}

/// Binary content, passed through untouched.
#[derive(Debug)]
pub struct Binary<T> {
    input: T,
}

impl<T> Binary<T> {
    pub fn new(input: T) -> Self {
        Binary { input }
    }
}

impl<T: ByteTransform> ByteTransform for Binary<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        self.input.read_next()
    }
}

pub(super) fn base64_value(b: u8) -> Option<u32> {
    match b {
        b'A'..=b'Z' => Some((b - b'A') as u32),
        b'a'..=b'z' => Some((b - b'a') as u32 + 26),
        b'0'..=b'9' => Some((b - b'0') as u32 + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes the base64 content transfer encoding.
///
/// Characters outside the base64 alphabet (including `=` padding) are
/// skipped. A trailing group of 2 or 3 characters decodes to 1 or 2 bytes,
/// so padding is not required. Lines are limited to 76 characters; only
/// CRLF ends a line unless `lenient_line_breaks` is set, in which case a
/// bare CR or LF does too.
#[derive(Debug)]
pub struct Base64<T> {
    input: PushbackTransform<T>,
    lenient_line_breaks: bool,
    line_chars: usize,
    pending: VecDeque<u8>,
}

impl<T> Base64<T> {
    pub fn new(input: T, lenient_line_breaks: bool) -> Self {
        Base64 {
            input: PushbackTransform::new(input),
            lenient_line_breaks,
            line_chars: 0,
            pending: VecDeque::with_capacity(2),
        }
    }

    pub fn into_inner(self) -> T {
        self.input.into_inner()
    }
}

impl<T: ByteTransform> ByteTransform for Base64<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }

        let mut value = 0u32;
        let mut count = 0;
        while count < 4 {
            let c = match self.input.read_next()? {
                Some(c) => c,
                None => {
                    return match count {
                        0 => Ok(None),
                        1 => Err(Error::data(
                            "Invalid number of base64 characters",
                        )),
                        2 => {
                            self.input.unget();
                            value <<= 12;
                            Ok(Some((value >> 16) as u8))
                        },
                        _ => {
                            self.input.unget();
                            value <<= 6;
                            self.pending.push_back((value >> 8) as u8);
                            Ok(Some((value >> 16) as u8))
                        },
                    };
                },
            };

            match c {
                b'\r' => {
                    if Some(b'\n') == self.input.read_next()? {
                        self.line_chars = 0;
                    } else {
                        self.input.unget();
                        if self.lenient_line_breaks {
                            self.line_chars = 0;
                        }
                    }
                },
                b'\n' => {
                    if self.lenient_line_breaks {
                        self.line_chars = 0;
                    }
                },
                c => {
                    self.line_chars += 1;
                    if self.line_chars > BASE64_MAX_LINE {
                        return Err(Error::data("Encoded base64 line too long"));
                    }

                    if let Some(v) = base64_value(c) {
                        value = (value << 6) | v;
                        count += 1;
                    }
                },
            }
        }

        self.pending.push_back((value >> 8) as u8);
        self.pending.push_back(value as u8);
        Ok(Some((value >> 16) as u8))
    }
}

/// The decoder chosen for one piece of content.
#[derive(Debug)]
pub enum TransferDecoder<T> {
    SevenBit(SevenBit<T>),
    LiberalSevenBit(LiberalSevenBit<T>),
    EightBit(EightBit<T>),
    Binary(Binary<T>),
    QuotedPrintable(QuotedPrintable<T>),
    Base64(Base64<T>),
}

impl<T> TransferDecoder<T> {
    /// Selects the decoder for content declared with `encoding`.
    ///
    /// `plain_text` is whether the content is `text/plain`, which gets the
    /// liberal 7bit decoder. Unknown encodings are read as 8bit.
    pub fn new(
        input: T,
        encoding: TransferEncoding,
        plain_text: bool,
        config: &ParserConfig,
    ) -> Self {
        debug!(
            "Decoding {} content (text/plain: {})",
            encoding, plain_text
        );
        match encoding {
            TransferEncoding::QuotedPrintable => {
                TransferDecoder::QuotedPrintable(QuotedPrintable::new(
                    input,
                    config.lenient_line_breaks,
                    config.quoted_printable_line_limit,
                ))
            },
            TransferEncoding::Base64 => TransferDecoder::Base64(Base64::new(
                input,
                config.lenient_line_breaks,
            )),
            TransferEncoding::EightBit | TransferEncoding::Unknown => {
                TransferDecoder::EightBit(EightBit::new(input))
            },
            TransferEncoding::Binary => {
                TransferDecoder::Binary(Binary::new(input))
            },
            TransferEncoding::SevenBit if plain_text => {
                TransferDecoder::LiberalSevenBit(LiberalSevenBit::new(input))
            },
            TransferEncoding::SevenBit => {
                TransferDecoder::SevenBit(SevenBit::new(input))
            },
        }
    }

    /// Recovers the wrapped transform.
    ///
    /// Only meaningful once the decoder has returned `None`.
    pub fn into_inner(self) -> T {
        match self {
            TransferDecoder::SevenBit(d) => d.input,
            TransferDecoder::LiberalSevenBit(d) => d.input,
            TransferDecoder::EightBit(d) => d.input,
            TransferDecoder::Binary(d) => d.input,
            TransferDecoder::QuotedPrintable(d) => d.into_inner(),
            TransferDecoder::Base64(d) => d.into_inner(),
        }
    }
}

impl<T: ByteTransform> ByteTransform for TransferDecoder<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        match *self {
            TransferDecoder::SevenBit(ref mut d) => d.read_next(),
            TransferDecoder::LiberalSevenBit(ref mut d) => d.read_next(),
            TransferDecoder::EightBit(ref mut d) => d.read_next(),
            TransferDecoder::Binary(ref mut d) => d.read_next(),
            TransferDecoder::QuotedPrintable(ref mut d) => d.read_next(),
            TransferDecoder::Base64(ref mut d) => d.read_next(),
        }
    }
}
