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

use serde::{Deserialize, Serialize};

/// Top-level configuration for the `mimetree` tool.
///
/// This is read from the TOML file passed with `--config`. Every table is
/// optional.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Options controlling how messages are parsed.
    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ParserConfig {
    /// The longest encoded line accepted in quoted-printable content.
    ///
    /// RFC 2045 sets the limit at 76, but plenty of agents write longer
    /// lines, so the default is 200.
    pub quoted_printable_line_limit: usize,

    /// If true, quoted-printable and base64 content may use a bare CR or a
    /// bare LF as a line break instead of CRLF.
    pub lenient_line_breaks: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            quoted_printable_line_limit: 200,
            lenient_line_breaks: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(200, config.parser.quoted_printable_line_limit);
        assert!(!config.parser.lenient_line_breaks);

        let config: Config = toml::from_str(
            "[parser]\n\
             quoted_printable_line_limit = 76\n",
        )
        .unwrap();
        assert_eq!(76, config.parser.quoted_printable_line_limit);
        assert!(!config.parser.lenient_line_breaks);

        assert!(toml::from_str::<Config>(
            "[parser]\nlenient_line_breaks = \"yes\"\n"
        )
        .is_err());
    }
}
