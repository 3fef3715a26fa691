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

//! Locating the components of an IRI reference.

use std::ops::Range;

use super::chars::*;
use super::text::IriText;
use super::ParseMode;
use crate::support::error::Error;

/// The locations of the components of a reference.
///
/// The path is always present, though it may be empty. The delimiters
/// (`:`, `//`, `?`, `#`) are not included in the ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IriSegments {
    pub scheme: Option<Range<usize>>,
    pub authority: Option<Range<usize>>,
    pub path: Range<usize>,
    pub query: Option<Range<usize>>,
    pub fragment: Option<Range<usize>>,
}

impl IriSegments {
    /// Flattens this into five (start, end) pairs in the order scheme,
    /// authority, path, query, fragment, with -1 for absent components.
    pub fn to_indices(&self) -> [i64; 10] {
        let mut ret = [-1i64; 10];
        let ranges = [
            self.scheme.as_ref(),
            self.authority.as_ref(),
            Some(&self.path),
            self.query.as_ref(),
            self.fragment.as_ref(),
        ];
        for (ix, range) in ranges.iter().enumerate() {
            if let Some(range) = *range {
                ret[ix * 2] = range.start as i64;
                ret[ix * 2 + 1] = range.end as i64;
            }
        }
        ret
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AuthorityState {
    UserInfo,
    Host,
    Port,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PathState {
    Path,
    Query,
    Fragment,
}

fn decode<T: IriText + ?Sized>(
    s: &T,
    ix: usize,
    end: usize,
    mode: ParseMode,
) -> Option<(u32, usize)> {
    match s.decode_at(ix, end) {
        (Some(c), next) => Some((c, next)),
        (None, next) if ParseMode::IriSurrogateLenient == mode => {
            Some((0xFFFD, next))
        },
        (None, _) => None,
    }
}

/// Whether `ix` starts a percent-encoded triplet that ends before `end`.
fn is_pct_encoded<T: IriText + ?Sized>(s: &T, ix: usize, end: usize) -> bool {
    ix + 2 < end && is_hex(s.unit(ix + 1)) && is_hex(s.unit(ix + 2))
}

fn check_range<T: IriText + ?Sized>(
    s: &T,
    offset: usize,
    length: usize,
) -> Result<usize, Error> {
    let end = offset.checked_add(length).filter(|&end| {
        end <= s.unit_len() && s.is_boundary(offset) && s.is_boundary(end)
    });
    end.ok_or_else(|| {
        Error::InvalidArgument(format!(
            "range {}+{} does not fit in text of length {}",
            offset,
            length,
            s.unit_len()
        ))
    })
}

/// Splits the substring of `s` at `offset` of `length` code units into the
/// components of an IRI reference.
///
/// Returns `Ok(None)` if the substring is not a valid reference under
/// `mode`. Indices in the result are relative to the start of `s`.
pub fn split_iri_at<T: IriText + ?Sized>(
    s: &T,
    offset: usize,
    length: usize,
    mode: ParseMode,
) -> Result<Option<IriSegments>, Error> {
    let end = check_range(s, offset, length)?;
    Ok(split(s, offset, end, mode))
}

/// Splits all of `s` into the components of an IRI reference.
pub fn split_iri<T: IriText + ?Sized>(
    s: &T,
    mode: ParseMode,
) -> Option<IriSegments> {
    if s.is_boundary(0) {
        split(s, 0, s.unit_len(), mode)
    } else {
        None
    }
}

fn split<T: IriText + ?Sized>(
    s: &T,
    offset: usize,
    end: usize,
    mode: ParseMode,
) -> Option<IriSegments> {
    let mut segments = IriSegments {
        scheme: None,
        authority: None,
        path: offset..offset,
        query: None,
        fragment: None,
    };
    if offset == end {
        return Some(segments);
    }

    let ascii_only = mode.is_ascii_only();
    let strict = mode.is_strict();
    let mut index = offset;

    while index < end {
        let c = s.unit(index);
        if index > offset && ':' as u32 == c {
            segments.scheme = Some(offset..index);
            index += 1;
            break;
        }

        if strict {
            if index == offset && !is_alpha(c) {
                break;
            } else if index > offset && !is_scheme_char(c) {
                break;
            }
        } else if "#:?/".chars().any(|d| d as u32 == c) {
            break;
        }

        index += 1;
    }

    if segments.scheme.is_none() {
        index = offset;
    }

    if index + 2 <= end
        && '/' as u32 == s.unit(index)
        && '/' as u32 == s.unit(index + 1)
    {
        index += 2;
        let authority_start = index;
        let mut authority_end = end;
        let mut state = AuthorityState::UserInfo;

        while index < end {
            if ascii_only && s.unit(index) >= 0x80 {
                return None;
            }

            let (c, next) = decode(s, index, end, mode)?;

            if '%' as u32 == c && strict && AuthorityState::Port != state {
                if is_pct_encoded(s, index, end) {
                    index += 3;
                    continue;
                } else {
                    return None;
                }
            }

            let ends_authority = "/?#".chars().any(|d| d as u32 == c);
            match state {
                AuthorityState::UserInfo => {
                    if ends_authority {
                        state = AuthorityState::Host;
                        index = authority_start;
                    } else if strict && '@' as u32 == c {
                        state = AuthorityState::Host;
                        index = next;
                    } else if strict && is_iuserinfo_char(c) {
                        index = next;
                        if index == end {
                            state = AuthorityState::Host;
                            index = authority_start;
                        }
                    } else {
                        state = AuthorityState::Host;
                        index = authority_start;
                    }
                },

                AuthorityState::Host => {
                    if ends_authority {
                        authority_end = index;
                        break;
                    } else if !strict {
                        index = next;
                    } else if '[' as u32 == c {
                        index = parse_ip_literal(s, next, end)?;
                    } else if ':' as u32 == c {
                        state = AuthorityState::Port;
                        index = next;
                    } else if is_ireg_name_char(c) {
                        index = next;
                    } else {
                        return None;
                    }
                },

                AuthorityState::Port => {
                    if ends_authority {
                        authority_end = index;
                        break;
                    } else if is_digit(c) {
                        index = next;
                    } else {
                        return None;
                    }
                },
            }
        }

        segments.authority = Some(authority_start..authority_end);
    }

    let fully_relative = index == offset;
    let mut colon = false;
    let mut segment = false;
    let mut state = PathState::Path;
    segments.path = index..end;

    while index < end {
        if ascii_only && s.unit(index) >= 0x80 {
            return None;
        }

        let (c, next) = decode(s, index, end, mode)?;

        if '%' as u32 == c && strict {
            if is_pct_encoded(s, index, end) {
                index += 3;
                continue;
            } else {
                return None;
            }
        }

        match state {
            PathState::Path => {
                if ':' as u32 == c && fully_relative {
                    colon = true;
                } else if '/' as u32 == c && fully_relative && !segment {
                    // A relative path may not have a colon in its first
                    // segment
                    if strict && colon {
                        return None;
                    }
                    segment = true;
                }

                if '?' as u32 == c {
                    segments.path.end = index;
                    segments.query = Some(index + 1..end);
                    state = PathState::Query;
                } else if '#' as u32 == c {
                    segments.path.end = index;
                    segments.fragment = Some(index + 1..end);
                    state = PathState::Fragment;
                } else if strict && !is_ipchar(c) {
                    return None;
                }
            },

            PathState::Query => {
                if '#' as u32 == c {
                    if let Some(ref mut query) = segments.query {
                        query.end = index;
                    }
                    segments.fragment = Some(index + 1..end);
                    state = PathState::Fragment;
                } else if strict && !is_iquery_char(c) {
                    return None;
                }
            },

            PathState::Fragment => {
                if strict && !is_ifragment_char(c) {
                    return None;
                }
            },
        }

        index = next;
    }

    if strict && fully_relative && colon && !segment {
        // Something like `x@y:z`, which is neither a scheme nor a path
        return None;
    }

    Some(segments)
}

/// Parses a `dec-octet` followed by `delim` at `ix`, returning the number
/// of digits.
fn dec_octet<T: IriText + ?Sized>(
    s: &T,
    ix: usize,
    end: usize,
    delim: char,
) -> Option<usize> {
    let at = |i: usize| if i < end { s.unit(i) } else { 0 };
    let digit_in = |i: usize, lo: char, hi: char| {
        let c = at(i);
        c >= lo as u32 && c <= hi as u32
    };
    let delim = delim as u32;

    if digit_in(ix, '1', '9')
        && ix + 2 < end
        && digit_in(ix + 1, '0', '9')
        && delim == at(ix + 2)
    {
        Some(2)
    } else if '2' as u32 == at(ix)
        && ix + 3 < end
        && '5' as u32 == at(ix + 1)
        && digit_in(ix + 2, '0', '5')
        && delim == at(ix + 3)
    {
        Some(3)
    } else if '2' as u32 == at(ix)
        && ix + 3 < end
        && digit_in(ix + 1, '0', '4')
        && digit_in(ix + 2, '0', '9')
        && delim == at(ix + 3)
    {
        Some(3)
    } else if '1' as u32 == at(ix)
        && ix + 3 < end
        && digit_in(ix + 1, '0', '9')
        && digit_in(ix + 2, '0', '9')
        && delim == at(ix + 3)
    {
        Some(3)
    } else if digit_in(ix, '0', '9') && ix + 1 < end && delim == at(ix + 1) {
        Some(1)
    } else {
        None
    }
}

/// Parses an `IP-literal` whose opening `[` immediately precedes `offset`.
///
/// Returns the index just past the closing `]`.
fn parse_ip_literal<T: IriText + ?Sized>(
    s: &T,
    offset: usize,
    end: usize,
) -> Option<usize> {
    if offset >= end {
        return None;
    }

    let mut index = offset;
    let first = s.unit(index);

    if 'v' as u32 == first {
        // IPvFuture
        index += 1;
        let start = index;
        while index < end && is_hex(s.unit(index)) {
            index += 1;
        }
        if index == start || index >= end || '.' as u32 != s.unit(index) {
            return None;
        }

        index += 1;
        let start = index;
        while index < end && is_ipvfuture_char(s.unit(index)) {
            index += 1;
        }
        if index == start || index >= end || ']' as u32 != s.unit(index) {
            return None;
        }

        return Some(index + 1);
    }

    if ':' as u32 != first && !is_hex(first) {
        return None;
    }

    // IPv6. Groups before and after the `::`, if any.
    let mut head = 0;
    let mut tail = 0;
    let mut compressed = false;
    let mut expect_hex = false;
    let mut expect_colon = false;

    while index < end {
        let c = s.unit(index);
        let groups = head + tail + compressed as usize;

        if ':' as u32 == c && !expect_hex {
            if groups >= 8 {
                return None;
            }

            index += 1;
            if index < end && ':' as u32 == s.unit(index) {
                if compressed {
                    return None;
                }
                compressed = true;
                index += 1;
            }

            expect_hex = true;
            expect_colon = false;
            continue;
        }

        if is_digit(c) && !expect_colon && (compressed || 6 == groups) {
            if let Some(digits) = dec_octet(s, index, end, '.') {
                // Trailing dotted-quad IPv4 address
                if groups > 6 {
                    return None;
                }

                tail += 2;
                index += digits + 1;
                for _ in 0..2 {
                    index += dec_octet(s, index, end, '.')? + 1;
                }
                index += dec_octet(s, index, end, ']')
                    .or_else(|| dec_octet(s, index, end, '%'))?;
                break;
            }
        }

        if is_hex(c) && !expect_colon {
            if compressed {
                tail += 1;
            } else {
                head += 1;
            }

            index += 1;
            for _ in 0..3 {
                if index < end && is_hex(s.unit(index)) {
                    index += 1;
                } else {
                    break;
                }
            }

            expect_hex = false;
            expect_colon = true;
        } else {
            break;
        }
    }

    if (!compressed && head + tail != 8) || (compressed && head + 1 + tail > 8)
    {
        return None;
    }

    if index >= end {
        return None;
    }

    let c = s.unit(index);
    if '%' as u32 == c {
        // RFC 6874 zone identifier, introduced by an encoded `%`
        if !(index + 2 < end
            && '2' as u32 == s.unit(index + 1)
            && '5' as u32 == s.unit(index + 2))
        {
            return None;
        }

        index += 3;
        let mut have_char = false;
        while index < end {
            let c = s.unit(index);
            if ']' as u32 == c {
                return if have_char { Some(index + 1) } else { None };
            } else if '%' as u32 == c {
                if !is_pct_encoded(s, index, end) {
                    return None;
                }
                index += 3;
            } else if is_unreserved(c) {
                index += 1;
            } else {
                return None;
            }
            have_char = true;
        }

        None
    } else if ']' as u32 == c {
        Some(index + 1)
    } else {
        None
    }
}

/// Whether `reference` is a valid IRI with a scheme.
pub fn has_scheme<T: IriText + ?Sized>(reference: &T) -> bool {
    split_iri(reference, ParseMode::IriStrict)
        .map_or(false, |segments| segments.scheme.is_some())
}

/// Whether `reference` is a valid URI with a scheme.
pub fn has_scheme_for_uri<T: IriText + ?Sized>(reference: &T) -> bool {
    split_iri(reference, ParseMode::UriStrict)
        .map_or(false, |segments| segments.scheme.is_some())
}

pub fn is_valid_iri<T: IriText + ?Sized>(s: &T) -> bool {
    split_iri(s, ParseMode::IriStrict).is_some()
}

/// Whether the given substring is a valid CURIE reference under RDFa 1.1,
/// i.e., the part of a CURIE after the colon.
pub fn is_valid_curie_reference<T: IriText + ?Sized>(
    s: &T,
    offset: usize,
    length: usize,
) -> Result<bool, Error> {
    let end = check_range(s, offset, length)?;
    let mut index = offset;

    // No authority allowed
    if index + 2 <= end
        && '/' as u32 == s.unit(index)
        && '/' as u32 == s.unit(index + 1)
    {
        return Ok(false);
    }

    let mut state = PathState::Path;
    while index < end {
        let (c, next) = match s.decode_at(index, end) {
            (Some(c), next) => (c, next),
            (None, _) => return Ok(false),
        };

        if '%' as u32 == c {
            if is_pct_encoded(s, index, end) {
                index += 3;
                continue;
            } else {
                return Ok(false);
            }
        }

        let valid = match state {
            PathState::Path if '?' as u32 == c => {
                state = PathState::Query;
                true
            },
            PathState::Path | PathState::Query if '#' as u32 == c => {
                state = PathState::Fragment;
                true
            },
            PathState::Path => is_ipchar(c),
            PathState::Query => is_iquery_char(c),
            PathState::Fragment => is_ifragment_char(c),
        };

        if !valid {
            return Ok(false);
        }

        index = next;
    }

    Ok(true)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn parts(s: &str, mode: ParseMode) -> Option<[Option<&str>; 5]> {
        split_iri(s, mode).map(|seg| {
            let get = move |r: Option<Range<usize>>| r.map(|r| &s[r]);
            [
                get(seg.scheme),
                get(seg.authority),
                get(Some(seg.path)),
                get(seg.query),
                get(seg.fragment),
            ]
        })
    }

    #[test]
    fn split_full_reference() {
        assert_eq!(
            Some([
                Some("http"),
                Some("user@example.com:8080"),
                Some("/a/b"),
                Some("q=1"),
                Some("frag"),
            ]),
            parts(
                "http://user@example.com:8080/a/b?q=1#frag",
                ParseMode::IriStrict
            )
        );
        assert_eq!(
            Some([None, None, Some("a/b"), None, Some("")]),
            parts("a/b#", ParseMode::IriStrict)
        );
        assert_eq!(
            Some([None, Some(""), Some("/x"), None, None]),
            parts("///x", ParseMode::IriStrict)
        );
        assert_eq!(
            Some([None, None, Some(""), Some("a"), Some("b")]),
            parts("?a#b", ParseMode::IriStrict)
        );
    }

    #[test]
    fn split_indices() {
        let seg = split_iri("example:/ww", ParseMode::IriStrict).unwrap();
        assert_eq!(Some(0..7), seg.scheme);
        assert_eq!([0, 7, -1, -1, 8, 11, -1, -1, -1, -1], seg.to_indices());

        let seg = split_iri("", ParseMode::IriStrict).unwrap();
        assert_eq!([-1, -1, -1, -1, 0, 0, -1, -1, -1, -1], seg.to_indices());
    }

    #[test]
    fn split_substring() {
        let s = "<<http://a/b>>";
        let seg = split_iri_at(s, 2, 10, ParseMode::IriStrict)
            .unwrap()
            .unwrap();
        assert_eq!(Some(2..6), seg.scheme);
        assert_eq!(Some(9..10), seg.authority);
        assert_eq!(10..12, seg.path);

        assert_matches!(
            Err(Error::InvalidArgument(..)),
            split_iri_at(s, 10, 5, ParseMode::IriStrict)
        );
        assert_matches!(
            Err(Error::InvalidArgument(..)),
            split_iri_at("\u{e9}", 1, 0, ParseMode::IriStrict)
        );
    }

    #[test]
    fn ambiguous_scheme_rejected() {
        assert!(split_iri("x@y:/z", ParseMode::IriStrict).is_none());
        assert!(split_iri("x@y:z", ParseMode::IriStrict).is_none());
        assert!(split_iri("./x@y:z", ParseMode::IriStrict).is_some());
        assert!(split_iri("x@y:/z", ParseMode::IriLenient).is_some());
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("example://y/z"));
        assert!(has_scheme("example:/ww"));
        assert!(has_scheme("xx-x:mm"));
        assert!(has_scheme("a+b.c:d"));
        assert!(!has_scheme("/x/y/z"));
        assert!(!has_scheme("example.xyz"));
        assert!(!has_scheme("x@y:/z"));
        assert!(!has_scheme("1a:b"));

        assert!(has_scheme_for_uri("example://y/z"));
        assert!(!has_scheme_for_uri("example:/\u{e9}"));
        assert!(has_scheme("example:/\u{e9}"));
    }

    #[test]
    fn percent_encoding_validated() {
        assert!(is_valid_iri("a%41b"));
        assert!(is_valid_iri("a%4f"));
        assert!(!is_valid_iri("a%4"));
        assert!(!is_valid_iri("a%zz"));
        assert!(!is_valid_iri("http://a%2/"));
        assert!(split_iri("a%zz", ParseMode::IriLenient).is_some());
    }

    #[test]
    fn character_classes_enforced() {
        assert!(!is_valid_iri("a b"));
        assert!(!is_valid_iri("a/b?c d"));
        assert!(!is_valid_iri("a#b#c"));
        assert!(is_valid_iri("a?b?c/d"));
        assert!(!is_valid_iri("http://exa mple/"));
        assert!(!is_valid_iri("http://a:80x/"));
        assert!(is_valid_iri("http://a:80/"));
        assert!(is_valid_iri("caf\u{e9}"));
        assert!(split_iri("caf\u{e9}", ParseMode::UriStrict).is_none());
        assert!(split_iri("caf\u{e9}", ParseMode::UriLenient).is_none());
        assert!(split_iri("a b", ParseMode::IriLenient).is_some());
    }

    #[test]
    fn ip_literals() {
        for valid in &[
            "http://[::1]/",
            "http://[::]/",
            "http://[1:2:3:4:5:6:7:8]/",
            "http://[1::8]:80/",
            "http://[::ffff:192.168.0.1]/",
            "http://[1:2:3:4:5:6:10.0.0.255]/",
            "http://[fe80::1%25eth0]/",
            "http://[fe80::1%25%41]/",
            "http://[v1.x:y]/",
        ] {
            assert!(is_valid_iri(*valid), "rejected {}", valid);
        }

        for invalid in &[
            "http://[]/",
            "http://[1:2:3:4:5:6:7]/",
            "http://[1:2:3:4:5:6:7:8:9]/",
            "http://[1::2::3]/",
            "http://[::1/",
            "http://[::256.0.0.1]/",
            "http://[fe80::1%eth0]/",
            "http://[fe80::1%25]/",
            "http://[v.x]/",
            "http://[vz.x]/",
            "http://[12345::]/",
        ] {
            assert!(!is_valid_iri(*invalid), "accepted {}", invalid);
        }
    }

    #[test]
    fn utf16_surrogates() {
        let mut text: Vec<u16> = "a:b".encode_utf16().collect();
        text.push(0xD800);
        assert!(split_iri(&text[..], ParseMode::IriStrict).is_none());
        assert!(split_iri(&text[..], ParseMode::IriLenient).is_none());
        assert!(split_iri(&text[..], ParseMode::IriSurrogateLenient).is_some());

        let text: Vec<u16> = "a:\u{10000}".encode_utf16().collect();
        let seg = split_iri(&text[..], ParseMode::IriStrict).unwrap();
        assert_eq!(2..4, seg.path);
    }

    #[test]
    fn curie_references() {
        let check = |s: &str| is_valid_curie_reference(s, 0, s.len()).unwrap();
        assert!(check(""));
        assert!(check("foo"));
        assert!(check("a/b?c#d"));
        assert!(check("x%20y"));
        assert!(!check("//host/path"));
        assert!(!check("a b"));
        assert!(!check("a%2"));
        assert!(!check("a#b#c"));
        assert!(is_valid_curie_reference("pre:fix", 4, 3).unwrap());
        assert_matches!(
            Err(Error::InvalidArgument(..)),
            is_valid_curie_reference("abc", 2, 2)
        );
    }

    proptest! {
        #[test]
        fn split_segments_are_ordered(s in "[a-z:/?#@.%0-9]{0,24}") {
            if let Some(seg) = split_iri(&s[..], ParseMode::IriLenient) {
                let ix = seg.to_indices();
                let mut last = 0;
                for pair in ix.chunks(2) {
                    if pair[0] >= 0 {
                        prop_assert!(pair[0] >= last);
                        prop_assert!(pair[1] >= pair[0]);
                        prop_assert!(pair[1] as usize <= s.len());
                        last = pair[1];
                    }
                }
            }
        }
    }
}
