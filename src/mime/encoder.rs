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

//! Re-encoding of header fields and choice of transfer encoding for
//! serialisation.

use super::content_encoding::TransferEncoding;
use super::media_type::MediaType;

/// RFC 2047 and RFC 2045 both want lines of at most 76 characters.
const MAX_LINE_LENGTH: usize = 76;
const WORD_PREFIX: &str = "=?utf-8?q?";
const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Whether `s` cannot be written as-is into an unstructured header field:
/// it has non-ASCII, control characters other than tab, or a word too long
/// to ever be folded.
pub fn has_non_ascii_or_ctl_or_too_long_word(s: &str) -> bool {
    let mut word_length = 0;
    for c in s.chars() {
        if c >= '\x7f' || (c < ' ' && '\t' != c) {
            return true;
        }

        if ' ' == c || '\t' == c {
            word_length = 0;
        } else {
            word_length += 1;
            if word_length > 75 {
                return true;
            }
        }
    }

    false
}

/// Writes text as a sequence of folded `=?utf-8?q?...?=` encoded words.
#[derive(Clone, Debug)]
pub struct EncodedWordEncoder {
    full: String,
    current_word: String,
    line_length: usize,
}

impl EncodedWordEncoder {
    /// Starts a new encoding after `prefix`, typically `"Name:"`.
    pub fn new(prefix: &str) -> Self {
        EncodedWordEncoder {
            full: prefix.to_owned(),
            current_word: String::new(),
            line_length: prefix.len(),
        }
    }

    pub fn add_str(&mut self, s: &str) {
        for c in s.chars() {
            self.add_char(c);
        }
    }

    pub fn add_char(&mut self, c: char) {
        if self.current_word.is_empty() {
            self.current_word.push_str(WORD_PREFIX);
        }

        if ' ' == c {
            self.prepare_to_append(1);
            self.current_word.push('_');
        } else if c > ' ' && c < '\x7f' && !"\"(),.:;<>@[\\]=?_".contains(c) {
            self.prepare_to_append(1);
            self.current_word.push(c);
        } else {
            let mut buf = [0u8; 4];
            let bytes = c.encode_utf8(&mut buf).as_bytes();
            self.prepare_to_append(3 * bytes.len());
            for &b in bytes {
                self.current_word.push('=');
                self.current_word.push(HEX[(b >> 4) as usize] as char);
                self.current_word.push(HEX[(b & 15) as usize] as char);
            }
        }
    }

    /// Makes room for `n` more characters in the current word.
    ///
    /// The current word, with a leading space and its closing `?=`, always
    /// fits on the current line.
    fn prepare_to_append(&mut self, n: usize) {
        let fits = |line_length: usize, word: &str| {
            line_length + 1 + word.len() + n + 2 <= MAX_LINE_LENGTH
        };

        if fits(self.line_length, &self.current_word) {
            return;
        }

        if self.current_word.len() > WORD_PREFIX.len() {
            self.flush_word();
            self.current_word.push_str(WORD_PREFIX);
        }

        if !fits(self.line_length, &self.current_word) {
            self.full.push_str("\r\n");
            self.line_length = 0;
        }
    }

    fn flush_word(&mut self) {
        self.full.push(' ');
        self.full.push_str(&self.current_word);
        self.full.push_str("?=");
        self.line_length += 3 + self.current_word.len();
        self.current_word.clear();
    }

    /// Closes the last word and returns the encoded text.
    pub fn finish(mut self) -> String {
        if self.current_word.len() > WORD_PREFIX.len() {
            self.flush_word();
        }
        self.full
    }
}

/// Folds text at whitespace so lines stay within 76 characters where
/// possible.
#[derive(Clone, Debug)]
pub struct WordWrapEncoder {
    full: String,
    last_spaces: String,
    line_length: usize,
}

impl WordWrapEncoder {
    pub fn new(prefix: &str) -> Self {
        let mut full = prefix.to_owned();
        let line_length = if full.len() >= MAX_LINE_LENGTH {
            full.push_str("\r\n");
            0
        } else {
            full.len()
        };

        WordWrapEncoder {
            full,
            last_spaces: " ".to_owned(),
            line_length,
        }
    }

    pub fn add_str(&mut self, s: &str) {
        let is_wsp = |c: char| ' ' == c || '\t' == c;
        let mut rest = s;
        while !rest.is_empty() {
            let word_end = rest.find(is_wsp).unwrap_or(rest.len());
            if word_end > 0 {
                self.append_word(&rest[..word_end]);
            }
            rest = &rest[word_end..];

            let spaces_end = rest.find(|c| !is_wsp(c)).unwrap_or(rest.len());
            if spaces_end > 0 {
                self.append_spaces(&rest[..spaces_end]);
            }
            rest = &rest[spaces_end..];
        }
    }

    fn append_spaces(&mut self, spaces: &str) {
        self.last_spaces.clear();
        if self.line_length + spaces.len() > MAX_LINE_LENGTH {
            self.last_spaces.push(' ');
        } else {
            self.last_spaces.push_str(spaces);
        }
    }

    fn append_word(&mut self, word: &str) {
        if self.line_length + self.last_spaces.len() + word.len()
            > MAX_LINE_LENGTH
        {
            self.full.push_str("\r\n");
            self.last_spaces.clear();
            self.last_spaces.push(' ');
            self.line_length = 0;
        }

        self.full.push_str(&self.last_spaces);
        self.full.push_str(word);
        self.line_length += self.last_spaces.len() + word.len();
        self.last_spaces.clear();
    }

    pub fn finish(self) -> String {
        self.full
    }
}

/// Chooses the transfer encoding to declare when writing out a body of
/// type `content_type`.
///
/// Text is written as 7bit if it all fits the 7bit rules, otherwise it is
/// quoted-printable, or base64 if more than a third of what was inspected
/// is 8-bit. Only the first 4096 bytes are inspected.
pub fn transfer_encoding_to_use(
    content_type: &MediaType,
    body: &[u8],
) -> TransferEncoding {
    match content_type.top_level_type() {
        "message" | "multipart" => return TransferEncoding::SevenBit,
        "text" => (),
        _ => return TransferEncoding::Base64,
    }

    let length_check = body.len().min(4096);
    let mut high_bytes = 0;
    let mut line_length = 0;
    let mut all_text_bytes = true;
    let mut i = 0;
    while i < length_check {
        let b = body[i];
        if b >= 0x80 {
            high_bytes += 1;
            all_text_bytes = false;
        } else if 0 == b || b'\n' == b {
            all_text_bytes = false;
        } else if b'\r' == b {
            if Some(&b'\n') != body.get(i + 1) {
                all_text_bytes = false;
            } else if i > 0 && (b' ' == body[i - 1] || b'\t' == body[i - 1])
            {
                // Whitespace before a line break does not survive transport
                all_text_bytes = false;
            } else {
                i += 2;
                line_length = 0;
                continue;
            }
        }

        line_length += 1;
        if line_length > MAX_LINE_LENGTH {
            all_text_bytes = false;
        }
        i += 1;
    }

    if length_check == body.len() && all_text_bytes {
        TransferEncoding::SevenBit
    } else if high_bytes > length_check / 3 {
        TransferEncoding::Base64
    } else {
        TransferEncoding::QuotedPrintable
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::mime::encoded_word::replace_encoded_words;

    fn encode_words(prefix: &str, s: &str) -> String {
        let mut encoder = EncodedWordEncoder::new(prefix);
        encoder.add_str(s);
        encoder.finish()
    }

    fn wrap(prefix: &str, s: &str) -> String {
        let mut encoder = WordWrapEncoder::new(prefix);
        encoder.add_str(s);
        encoder.finish()
    }

    #[test]
    fn needs_encoding() {
        assert!(!has_non_ascii_or_ctl_or_too_long_word("plain\ttext"));
        assert!(has_non_ascii_or_ctl_or_too_long_word("caf\u{e9}"));
        assert!(has_non_ascii_or_ctl_or_too_long_word("a\x01"));
        assert!(has_non_ascii_or_ctl_or_too_long_word("a\x7f"));
        assert!(!has_non_ascii_or_ctl_or_too_long_word(&"x".repeat(75)));
        assert!(has_non_ascii_or_ctl_or_too_long_word(&"x".repeat(76)));
    }

    #[test]
    fn encoded_words() {
        assert_eq!(
            "Subject: =?utf-8?q?caf=C3=A9_au_lait=3F?=",
            encode_words("Subject:", "caf\u{e9} au lait?")
        );
        assert_eq!(
            "Subject: =?utf-8?q?=F0=9F=98=80?=",
            encode_words("Subject:", "\u{1f600}")
        );
        assert_eq!("Subject:", encode_words("Subject:", ""));
    }

    #[test]
    fn encoded_words_fold() {
        let text = "\u{e9}".repeat(60);
        let encoded = encode_words("Subject:", &text);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "{:?}", line);
            assert!(!line.trim().is_empty(), "{:?}", encoded);
        }
        assert!(encoded.contains("\r\n "));
        let unfolded = encoded["Subject:".len()..].replace("\r\n", "");
        assert_eq!(text, replace_encoded_words(&unfolded, false).trim());
    }

    #[test]
    fn word_wrap() {
        assert_eq!("To: a@b", wrap("To:", "a@b"));
        assert_eq!("To:", wrap("To:", ""));
        assert_eq!("X: one  two", wrap("X:", "one  two   "));

        let words = vec!["word"; 30].join(" ");
        let wrapped = wrap("Subject:", &words);
        for line in wrapped.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "{:?}", line);
        }
        assert!(wrapped.contains("\r\n word"));
        assert_eq!(words, wrapped["Subject: ".len()..].replace("\r\n", ""));
    }

    #[test]
    fn transfer_encoding_choice() {
        let text = MediaType::text_plain_ascii();
        assert_eq!(
            TransferEncoding::SevenBit,
            transfer_encoding_to_use(&text, b"hello\r\nworld\r\n")
        );
        assert_eq!(
            TransferEncoding::QuotedPrintable,
            transfer_encoding_to_use(&text, b"hello \r\nworld")
        );
        assert_eq!(
            TransferEncoding::QuotedPrintable,
            transfer_encoding_to_use(&text, b"bare\nlf")
        );
        assert_eq!(
            TransferEncoding::QuotedPrintable,
            transfer_encoding_to_use(&text, "caf\u{e9} au lait".as_bytes())
        );
        assert_eq!(
            TransferEncoding::QuotedPrintable,
            transfer_encoding_to_use(&text, &[b'x'; 77])
        );
        assert_eq!(
            TransferEncoding::Base64,
            transfer_encoding_to_use(&text, "\u{e9}\u{e9}".as_bytes())
        );
        assert_eq!(
            TransferEncoding::QuotedPrintable,
            transfer_encoding_to_use(&text, &vec![b'a'; 5000])
        );
        assert_eq!(
            TransferEncoding::Base64,
            transfer_encoding_to_use(
                &MediaType::application_octet_stream(),
                b"abc"
            )
        );
        assert_eq!(
            TransferEncoding::SevenBit,
            transfer_encoding_to_use(&MediaType::message_rfc822(), b"\xFF")
        );
    }

    proptest! {
        #[test]
        fn encoded_words_round_trip(s in "[^\r\n]{0,200}") {
            let encoded = encode_words("X:", &s);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            let unfolded = encoded[2..].replace("\r\n", "");
            let decoded = replace_encoded_words(&unfolded, false);
            let decoded = decoded.strip_prefix(' ').unwrap_or(&*decoded);
            prop_assert_eq!(s.as_str(), decoded);
        }
    }
}
