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

use std::collections::VecDeque;

use super::transform::{ByteTransform, PushbackTransform};
use crate::support::error::Error;

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decodes quoted-printable encoding, as described by RFC 2045.
///
/// `=XX` escapes are decoded (either case), soft line breaks are discarded,
/// and CRLF is passed through. Spaces and tabs at the end of a line are
/// deleted as RFC 2045 requires of decoders. A `=` at the very end of the
/// input is ignored.
///
/// Unlike most of what is seen in the wild, this is strict: control
/// characters, 8-bit bytes, malformed escapes, and lines longer than the
/// configured limit are all errors. If `lenient_line_breaks` is set, a bare
/// CR or LF is accepted as a line break and decoded as CRLF.
#[derive(Debug)]
pub struct QuotedPrintable<T> {
    input: PushbackTransform<T>,
    lenient_line_breaks: bool,
    max_line: usize,
    line_chars: usize,
    pending: VecDeque<u8>,
}

impl<T> QuotedPrintable<T> {
    pub fn new(input: T, lenient_line_breaks: bool, max_line: usize) -> Self {
        QuotedPrintable {
            input: PushbackTransform::new(input),
            lenient_line_breaks,
            max_line,
            line_chars: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.input.into_inner()
    }

    fn count_chars(&mut self, n: usize) -> Result<(), Error> {
        self.line_chars += n;
        if self.line_chars > self.max_line {
            Err(Error::data("Encoded quoted-printable line too long"))
        } else {
            Ok(())
        }
    }

    fn line_break(&mut self) -> Option<u8> {
        self.line_chars = 0;
        self.pending.push_back(b'\n');
        Some(b'\r')
    }

    fn bare_break(&self, message: &str) -> Result<(), Error> {
        if self.lenient_line_breaks {
            Ok(())
        } else {
            Err(Error::data(message))
        }
    }
}

impl<T: ByteTransform> ByteTransform for QuotedPrintable<T> {
    fn read_next(&mut self) -> Result<Option<u8>, Error> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(Some(b));
        }

        'outer: loop {
            let c = match self.input.read_next()? {
                Some(c) => c,
                None => return Ok(None),
            };

            match c {
                b'\r' => {
                    if Some(b'\n') != self.input.read_next()? {
                        self.input.unget();
                        self.bare_break("Expected LF after CR")?;
                    }
                    return Ok(self.line_break());
                },

                b'\n' => {
                    self.bare_break("Expected LF after CR")?;
                    return Ok(self.line_break());
                },

                b'=' => {
                    self.count_chars(1)?;
                    match self.input.read_next()? {
                        // Equal sign at the end of the input, ignore
                        None => return Ok(None),
                        Some(b'\r') => {
                            if Some(b'\n') != self.input.read_next()? {
                                self.input.unget();
                                self.bare_break("Expected LF after CR")?;
                            }
                            self.line_chars = 0;
                        },
                        Some(b'\n') => {
                            self.bare_break("Bare LF not expected")?;
                            self.line_chars = 0;
                        },
                        Some(b1) => {
                            let b2 = self.input.read_next()?.ok_or_else(|| {
                                Error::data("Invalid data after equal sign")
                            })?;
                            let decoded = hex_value(b1)
                                .and_then(|hi| {
                                    hex_value(b2).map(|lo| hi << 4 | lo)
                                })
                                .ok_or_else(|| {
                                    Error::data("Invalid hex character")
                                })?;
                            self.count_chars(2)?;
                            return Ok(Some(decoded));
                        },
                    }
                },

                b' ' | b'\t' => {
                    // Whitespace must be held back until we know whether
                    // the line ends right after it.
                    self.count_chars(1)?;
                    loop {
                        match self.input.read_next()? {
                            Some(w @ b' ') | Some(w @ b'\t') => {
                                self.count_chars(1)?;
                                self.pending.push_back(w);
                            },
                            None => {
                                self.pending.clear();
                                return Ok(None);
                            },
                            Some(b'\n') => {
                                self.input.unget();
                                self.pending.clear();
                                continue 'outer;
                            },
                            Some(b'\r') if self.lenient_line_breaks => {
                                self.input.unget();
                                self.pending.clear();
                                continue 'outer;
                            },
                            Some(b'\r') => {
                                if Some(b'\n') != self.input.read_next()? {
                                    return Err(Error::data(
                                        "Expected LF after CR",
                                    ));
                                }
                                self.pending.clear();
                                return Ok(self.line_break());
                            },
                            Some(_) => {
                                self.input.unget();
                                return Ok(Some(c));
                            },
                        }
                    }
                },

                c if c < 0x20 || c >= 0x7f => {
                    return Err(Error::data(
                        "Invalid character in quoted-printable",
                    ));
                },

                c => {
                    self.count_chars(1)?;
                    return Ok(Some(c));
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::mime::transform::read_to_end;

    fn qp(input: &[u8]) -> Result<Vec<u8>, Error> {
        read_to_end(&mut QuotedPrintable::new(input, false, 76))
    }

    fn qp_lenient(input: &[u8]) -> Result<Vec<u8>, Error> {
        read_to_end(&mut QuotedPrintable::new(input, true, 76))
    }

    fn assert_qp(expected: &[u8], input: &[u8]) {
        assert_eq!(expected, &qp(input).unwrap()[..]);
    }

    fn assert_qp_fails(input: &[u8]) {
        assert_matches!(Err(Error::InvalidData(..)), qp(input));
    }

    #[test]
    fn test_qp_decode() {
        assert_qp(b"hello world", b"hello world");
        assert_qp(b"\xabfoo", b"=ABfoo");
        assert_qp(b"fo\xabo", b"fo=abo");
        assert_qp(b"foo==", b"foo=3D=3d");
        assert_qp(b"foobar", b"foo=\r\nbar");
        assert_qp(b"foo\r\nbar", b"foo\r\nbar");
        assert_qp(b"foo", b"foo=");
    }

    #[test]
    fn test_qp_trailing_whitespace() {
        assert_qp(b"foo\r\nbar", b"foo \t \r\nbar");
        assert_qp(b"foo", b"foo  ");
        assert_qp(b"foo \t bar", b"foo \t bar");
        assert_qp(b"a b", b"a=\r\n b");
        assert_eq!(b"foo\r\nbar".to_vec(), qp_lenient(b"foo  \nbar").unwrap());
        assert_eq!(b"foo\r\nbar".to_vec(), qp_lenient(b"foo \rbar").unwrap());
    }

    #[test]
    fn test_qp_line_breaks() {
        assert_qp_fails(b"foo\nbar");
        assert_qp_fails(b"foo\rbar");
        assert_qp_fails(b"foo=\nbar");
        assert_qp_fails(b"foo \rbar");
        assert_eq!(b"a\r\nb".to_vec(), qp_lenient(b"a\nb").unwrap());
        assert_eq!(b"a\r\nb".to_vec(), qp_lenient(b"a\rb").unwrap());
        assert_eq!(b"ab".to_vec(), qp_lenient(b"a=\nb").unwrap());
        assert_eq!(b"ab".to_vec(), qp_lenient(b"a=\rb").unwrap());
    }

    #[test]
    fn test_qp_errors() {
        assert_qp_fails(b"foo=4");
        assert_qp_fails(b"foo=XYbar");
        assert_qp_fails(b"foo=4Gbar");
        assert_qp_fails(b"foo\x01");
        assert_qp_fails(b"caf\xc3\xa9");
        assert_qp_fails(b"del\x7f");
        assert_qp(b"tab\there", b"tab\there");
    }

    #[test]
    fn test_qp_line_length() {
        let ok = "a".repeat(76);
        assert_qp(ok.as_bytes(), ok.as_bytes());
        assert_qp_fails("a".repeat(77).as_bytes());
        let with_break = format!("{}\r\n{}", ok, ok);
        assert_qp(with_break.as_bytes(), with_break.as_bytes());
        let soft = format!("{}=\r\n{}", "a".repeat(75), "a".repeat(75));
        assert_qp("a".repeat(150).as_bytes(), soft.as_bytes());

        let long = "b".repeat(150);
        assert_eq!(
            long.as_bytes(),
            &read_to_end(&mut QuotedPrintable::new(long.as_bytes(), false, 200))
                .unwrap()[..]
        );
    }

    fn encode_for_test(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut line = 0;
        for &b in data {
            if line >= 70 {
                out.extend_from_slice(b"=\r\n");
                line = 0;
            }

            if b.is_ascii_alphanumeric() {
                out.push(b);
                line += 1;
            } else {
                out.extend_from_slice(format!("={:02X}", b).as_bytes());
                line += 3;
            }
        }
        out
    }

    proptest! {
        #[test]
        fn qp_round_trip(data in prop::collection::vec(any::<u8>(), 0..500)) {
            let encoded = encode_for_test(&data);
            prop_assert_eq!(data, qp(&encoded).unwrap());
        }

        #[test]
        fn qp_lenient_output_has_no_bare_line_breaks(
            s in "[ -<>-~\r\n]{0,60}"
        ) {
            let decoded = read_to_end(
                &mut QuotedPrintable::new(s.as_bytes(), true, 1000)).unwrap();
            for (ix, &b) in decoded.iter().enumerate() {
                if b'\r' == b {
                    prop_assert_eq!(Some(&b'\n'), decoded.get(ix + 1));
                }
                if b'\n' == b {
                    prop_assert!(ix > 0 && b'\r' == decoded[ix - 1]);
                }
            }
        }
    }
}
