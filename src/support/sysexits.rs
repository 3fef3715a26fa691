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

//! Constants from `sysexits.h`
//!
//! The command-line front end reports failures with these, following the
//! conventions of other mail tools.

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    /// The conventional exit status for a failure caused by `error`.
    pub fn for_error(error: &Error) -> Self {
        match *error {
            Error::InvalidData(..) => EX_DATAERR,
            Error::InvalidArgument(..) => EX_SOFTWARE,
            Error::Io(..) => EX_IOERR,
        }
    }

    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use super::*;

    #[test]
    fn error_mapping() {
        assert_eq!(
            EX_DATAERR,
            Sysexit::for_error(&Error::data("Premature end of message"))
        );
        assert_eq!(
            EX_IOERR,
            Sysexit::for_error(&Error::from(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "pipe"
            )))
        );
    }
}
