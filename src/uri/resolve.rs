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

//! Dot-segment removal and reference resolution (RFC 3986 section 5).

use std::ops::Range;

use super::split::{split_iri, IriSegments};
use super::ParseMode;

/// Removes `.` and `..` segments from `path`.
///
/// `..` segments which would climb above the root are dropped.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() || "." == path || ".." == path {
        return String::new();
    }

    if !path.contains("/.") && !path.contains("./") {
        return path.to_owned();
    }

    let bytes = path.as_bytes();
    let len = bytes.len();
    let starts = |ix: usize, pat: &[u8]| bytes[ix..].starts_with(pat);
    let is = |ix: usize, pat: &[u8]| &bytes[ix..] == pat;

    let mut out = String::with_capacity(len);
    let mut index = 0;
    while index < len {
        if starts(index, b"/./") || is(index, b"..") {
            index += 2;
        } else if starts(index, b"../") {
            index += 3;
        } else if starts(index, b"./") {
            index += 2;
        } else if is(index, b".") {
            index += 1;
        } else if is(index, b"/.") {
            out.push('/');
            break;
        } else if is(index, b"/..") {
            pop_segment(&mut out);
            out.push('/');
            break;
        } else if starts(index, b"/../") {
            pop_segment(&mut out);
            index += 3;
        } else {
            let segment_end = bytes[index + 1..]
                .iter()
                .position(|&b| b'/' == b)
                .map_or(len, |p| index + 1 + p);
            out.push_str(&path[index..segment_end]);
            index = segment_end;
        }
    }

    out
}

fn pop_segment(out: &mut String) {
    let keep = out.rfind('/').unwrap_or(0);
    out.truncate(keep);
}

/// Everything in `path` up to and including the last `/`.
fn path_parent(path: &str) -> &str {
    path.rfind('/').map_or("", |ix| &path[..=ix])
}

fn component<'a>(s: &'a str, range: &Option<Range<usize>>) -> Option<&'a str> {
    range.as_ref().map(|r| &s[r.clone()])
}

/// Accumulates the resolved reference.
struct Resolved(String);

impl Resolved {
    fn scheme(&mut self, s: &str, segments: &IriSegments) {
        if let Some(scheme) = component(s, &segments.scheme) {
            self.0.push_str(scheme);
            self.0.push(':');
        }
    }

    fn authority(&mut self, s: &str, segments: &IriSegments) {
        if let Some(authority) = component(s, &segments.authority) {
            self.0.push_str("//");
            self.0.push_str(authority);
        }
    }

    fn path(&mut self, path: &str) {
        self.0.push_str(path);
    }

    fn query(&mut self, s: &str, segments: &IriSegments) {
        if let Some(query) = component(s, &segments.query) {
            self.0.push('?');
            self.0.push_str(query);
        }
    }

    fn fragment(&mut self, s: &str, segments: &IriSegments) {
        if let Some(fragment) = component(s, &segments.fragment) {
            self.0.push('#');
            self.0.push_str(fragment);
        }
    }
}

/// Resolves `reference` against `base`.
///
/// Returns `None` if `reference` is not valid under `mode`. If `base` is
/// not valid, `reference` is returned unchanged.
pub fn relative_resolve(
    reference: &str,
    base: &str,
    mode: ParseMode,
) -> Option<String> {
    let rseg = split_iri(reference, mode)?;
    let bseg = match split_iri(base, mode) {
        Some(bseg) => bseg,
        None => return Some(reference.to_owned()),
    };

    let ref_path = &reference[rseg.path.clone()];
    let base_path = &base[bseg.path.clone()];
    let mut out = Resolved(String::with_capacity(reference.len() + base.len()));

    if rseg.scheme.is_some() {
        out.scheme(reference, &rseg);
        out.authority(reference, &rseg);
        out.path(&normalize_path(ref_path));
        out.query(reference, &rseg);
    } else if rseg.authority.is_some() {
        out.scheme(base, &bseg);
        out.authority(reference, &rseg);
        out.path(&normalize_path(ref_path));
        out.query(reference, &rseg);
    } else if ref_path.is_empty() {
        out.scheme(base, &bseg);
        out.authority(base, &bseg);
        out.path(base_path);
        if rseg.query.is_some() {
            out.query(reference, &rseg);
        } else {
            out.query(base, &bseg);
        }
    } else {
        out.scheme(base, &bseg);
        out.authority(base, &bseg);
        if ref_path.starts_with('/') {
            out.path(&normalize_path(ref_path));
        } else {
            let mut merged = String::new();
            if bseg.authority.is_some() && base_path.is_empty() {
                merged.push('/');
            } else {
                merged.push_str(path_parent(base_path));
            }
            merged.push_str(ref_path);
            out.path(&normalize_path(&merged));
        }
        out.query(reference, &rseg);
    }

    out.fragment(reference, &rseg);
    Some(out.0)
}
