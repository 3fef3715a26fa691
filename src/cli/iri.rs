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

use mimetree::support::sysexits::*;
use mimetree::uri::{
    escape_uri, normalize_path, relative_resolve, split_iri, EscapeMode,
    IriSegments,
};

use super::main::{
    EscapeSubcommand, NormalizeSubcommand, ResolveSubcommand, SplitSubcommand,
};

/// Exit status for input which is not a valid reference.
const EX_INVALID_REFERENCE: Sysexit = Sysexit(1);

pub(super) fn split(cmd: SplitSubcommand) {
    match split_iri(cmd.iri.as_str(), cmd.mode) {
        Some(segments) => print!("{}", describe(&cmd.iri, &segments)),
        None => die!(
            EX_INVALID_REFERENCE,
            "Not a valid reference under {}: {}",
            cmd.mode,
            cmd.iri
        ),
    }
}

pub(super) fn resolve(cmd: ResolveSubcommand) {
    match relative_resolve(&cmd.reference, &cmd.base, cmd.mode) {
        Some(resolved) => println!("{}", resolved),
        None => die!(
            EX_INVALID_REFERENCE,
            "Not a valid reference under {}: {}",
            cmd.mode,
            cmd.reference
        ),
    }
}

pub(super) fn escape(cmd: EscapeSubcommand) {
    let mode = EscapeMode::from_number(cmd.mode).unwrap_or_else(|| {
        die!(EX_USAGE, "Escape mode must be 0, 1, 2 or 3, not {}", cmd.mode)
    });

    match escape_uri(cmd.string.as_str(), mode) {
        Some(escaped) => println!("{}", escaped),
        None => die!(EX_INVALID_REFERENCE, "Not a valid IRI: {}", cmd.string),
    }
}

pub(super) fn normalize(cmd: NormalizeSubcommand) {
    println!("{}", normalize_path(&cmd.path));
}

fn describe(iri: &str, segments: &IriSegments) -> String {
    let mut out = String::new();
    let components = [
        ("scheme", &segments.scheme),
        ("authority", &segments.authority),
        ("path", &Some(segments.path.clone())),
        ("query", &segments.query),
        ("fragment", &segments.fragment),
    ];

    for &(label, range) in &components {
        match *range {
            Some(ref range) => out.push_str(&format!(
                "{:<10}{:?}\n",
                label,
                &iri[range.clone()]
            )),
            None => out.push_str(&format!("{:<10}-\n", label)),
        }
    }

    out
}
