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

use std::collections::BTreeMap;
use std::fmt;

use super::charset::get_charset;
use super::encoded_word::PercentEncodingTransform;
use super::header::{is_token_char, parse_media_type};

/// A parsed `Content-Type`.
///
/// Type, subtype and parameter names are always lowercase. Parameter values
/// keep their case; RFC 2231 extended values (`name*=charset'lang'text`)
/// are stored decoded under the plain name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaType {
    top_level_type: String,
    subtype: String,
    parameters: BTreeMap<String, String>,
}

impl MediaType {
    pub fn new(top_level_type: &str, subtype: &str) -> Self {
        MediaType {
            top_level_type: top_level_type.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    /// `text/plain; charset=us-ascii`, the RFC 2045 default.
    pub fn text_plain_ascii() -> Self {
        MediaType::new("text", "plain").with_parameter("charset", "us-ascii")
    }

    pub fn text_plain_utf8() -> Self {
        MediaType::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// The default type of parts of a `multipart/digest`.
    pub fn message_rfc822() -> Self {
        MediaType::new("message", "rfc822")
    }

    pub fn application_octet_stream() -> Self {
        MediaType::new("application", "octet-stream")
    }

    /// Parses a `Content-Type` header value, returning `default` if it is
    /// not syntactically valid.
    pub fn parse(value: &str, default: MediaType) -> Self {
        MediaType::try_parse(value).unwrap_or(default)
    }

    /// Parses a `Content-Type` header value.
    pub fn try_parse(value: &str) -> Option<Self> {
        let raw = parse_media_type(value.as_bytes())?;
        let mut media_type = MediaType::new(
            &String::from_utf8_lossy(raw.typ),
            &String::from_utf8_lossy(raw.subtype),
        );

        for (name, value) in raw.parameters {
            let name = String::from_utf8_lossy(name).to_ascii_lowercase();
            let value = String::from_utf8_lossy(&value);

            if name.len() > 1 && name.ends_with('*') {
                let name = &name[..name.len() - 1];
                if let Some(decoded) = decode_extended_value(&value) {
                    // Extended values take precedence over plain ones
                    media_type.parameters.insert(name.to_owned(), decoded);
                    continue;
                }
            }

            media_type
                .parameters
                .entry(name)
                .or_insert_with(|| value.into_owned());
        }

        Some(media_type)
    }

    pub fn top_level_type(&self) -> &str {
        &self.top_level_type
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Returns `"type/subtype"`.
    pub fn type_and_subtype(&self) -> String {
        format!("{}/{}", self.top_level_type, self.subtype)
    }

    pub fn is(&self, top_level_type: &str, subtype: &str) -> bool {
        self.top_level_type == top_level_type && self.subtype == subtype
    }

    pub fn is_multipart(&self) -> bool {
        "multipart" == self.top_level_type
    }

    pub fn is_text(&self) -> bool {
        "text" == self.top_level_type
    }

    /// Looks up a parameter by case-insensitive name.
    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::text_plain_ascii()
    }
}

/// Decodes an RFC 2231 `charset'language'%XX` value.
fn decode_extended_value(value: &str) -> Option<String> {
    let mut split = value.splitn(3, '\'');
    let charset = split.next()?;
    let _language = split.next()?;
    let text = split.next()?;

    let charset = if charset.is_empty() {
        get_charset("us-ascii")?
    } else {
        get_charset(charset)?
    };
    charset
        .get_string(&mut PercentEncodingTransform::new(text.as_bytes()))
        .ok()
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.top_level_type, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, "; {}=", name)?;
            if !value.is_empty() && value.bytes().all(is_token_char) {
                f.write_str(value)?;
            } else {
                f.write_str("\"")?;
                for c in value.chars() {
                    if '"' == c || '\\' == c {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")?;
            }
        }
        Ok(())
    }
}
