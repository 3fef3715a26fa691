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

/// Text that references can be parsed from.
///
/// Indices are in code units. Only positions returned by the parser or
/// known to hold an ASCII delimiter are ever passed to `decode_at`.
pub trait IriText {
    /// The length in code units.
    fn unit_len(&self) -> usize;

    /// The code unit at `ix`, widened to `u32`.
    ///
    /// For UTF-8 text this is a byte, so any non-ASCII character reads as
    /// one or more units at or above 0x80.
    fn unit(&self, ix: usize) -> u32;

    /// Whether a code point may start at `ix`.
    fn is_boundary(&self, ix: usize) -> bool;

    /// Decodes the code point starting at `ix`, not reading at or past
    /// `end`.
    ///
    /// Returns the code point and the index just after it. An unpaired
    /// surrogate yields `None` and occupies one unit.
    fn decode_at(&self, ix: usize, end: usize) -> (Option<u32>, usize);
}

impl IriText for str {
    fn unit_len(&self) -> usize {
        self.len()
    }

    fn unit(&self, ix: usize) -> u32 {
        u32::from(self.as_bytes()[ix])
    }

    fn is_boundary(&self, ix: usize) -> bool {
        self.is_char_boundary(ix)
    }

    fn decode_at(&self, ix: usize, end: usize) -> (Option<u32>, usize) {
        match self.get(ix..end).and_then(|s| s.chars().next()) {
            Some(ch) => (Some(u32::from(ch)), ix + ch.len_utf8()),
            None => (None, ix + 1),
        }
    }
}

impl IriText for [u16] {
    fn unit_len(&self) -> usize {
        self.len()
    }

    fn unit(&self, ix: usize) -> u32 {
        u32::from(self[ix])
    }

    fn is_boundary(&self, ix: usize) -> bool {
        ix <= self.len()
    }

    fn decode_at(&self, ix: usize, end: usize) -> (Option<u32>, usize) {
        let hi = u32::from(self[ix]);
        if (hi & 0xFC00) == 0xD800 && ix + 1 < end {
            let lo = u32::from(self[ix + 1]);
            if (lo & 0xFC00) == 0xDC00 {
                let cp = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                return (Some(cp), ix + 2);
            }
        }

        if (hi & 0xF800) == 0xD800 {
            (None, ix + 1)
        } else {
            (Some(hi), ix + 1)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_utf8() {
        let s = "a\u{e9}\u{1F600}";
        assert_eq!((Some(0x61), 1), s.decode_at(0, s.len()));
        assert_eq!((Some(0xE9), 3), s.decode_at(1, s.len()));
        assert_eq!((Some(0x1F600), 7), s.decode_at(3, s.len()));
        assert!(!s.is_boundary(2));
    }

    #[test]
    fn decode_utf16() {
        let s: Vec<u16> = "x\u{1F600}".encode_utf16().collect();
        assert_eq!((Some(0x78), 1), s[..].decode_at(0, s.len()));
        assert_eq!((Some(0x1F600), 3), s[..].decode_at(1, s.len()));
        // A high surrogate cut off by the end of the range is unpaired
        assert_eq!((None, 2), s[..].decode_at(1, 2));
        // A lone low surrogate
        assert_eq!((None, 3), s[..].decode_at(2, 3));
    }
}
