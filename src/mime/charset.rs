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

use std::fmt;

use encoding_rs::Encoding;

use super::transform::{read_to_end, ByteTransform};
use crate::support::error::Error;

/// A character set that bytes from a message can be decoded through.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Charset(&'static Encoding);

/// Looks up a charset by any of its registered labels, case-insensitively.
///
/// Returns `None` for labels that are unknown, and for the "replacement"
/// pseudo-encoding which would turn the entire input into U+FFFD.
pub fn get_charset(name: &str) -> Option<Charset> {
    Encoding::for_label_no_replacement(name.trim().as_bytes()).map(Charset)
}

impl Charset {
    /// The canonical name of this charset.
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Decodes `bytes`. Sequences that are invalid in this charset become
    /// U+FFFD.
    ///
    /// A leading byte order mark is decoded as U+FEFF like any other
    /// character, since header text arrives in many small pieces.
    pub fn decode(self, bytes: &[u8]) -> String {
        self.0.decode_without_bom_handling(bytes).0.into_owned()
    }

    /// Decodes a whole document, such as a body, dropping a leading byte
    /// order mark for this charset.
    pub fn decode_document(self, bytes: &[u8]) -> String {
        self.0.decode_with_bom_removal(bytes).0.into_owned()
    }

    /// Drains `input` and decodes everything it produced.
    pub fn get_string<T: ByteTransform + ?Sized>(
        self,
        input: &mut T,
    ) -> Result<String, Error> {
        let bytes = read_to_end(input)?;
        Ok(self.decode(&bytes))
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Charset({})", self.name())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!("UTF-8", get_charset("utf-8").unwrap().name());
        assert_eq!("UTF-8", get_charset("UTF8").unwrap().name());
        assert_eq!("ISO-8859-2", get_charset(" iso-8859-2 ").unwrap().name());
        assert!(get_charset("x-no-such-charset").is_none());
        assert!(get_charset("iso-2022-kr").is_none());
    }

    #[test]
    fn decoding() {
        let latin1 = get_charset("iso-8859-1").unwrap();
        assert_eq!("Andr\u{e9}", latin1.decode(b"Andr\xE9"));
        assert_eq!(
            "Andr\u{e9}",
            latin1.get_string(&mut &b"Andr\xE9"[..]).unwrap()
        );

        let utf8 = get_charset("utf-8").unwrap();
        assert_eq!("a\u{fffd}b", utf8.decode(b"a\xFFb"));
        assert_eq!("\u{feff}bom", utf8.decode(b"\xEF\xBB\xBFbom"));
        assert_eq!("bom", utf8.decode_document(b"\xEF\xBB\xBFbom"));
    }
}
