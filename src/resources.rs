// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Static documentation shipped inside the binary.

/// The svg++ quick reference.
pub fn cheatsheet() -> &'static str {
    include_str!("../data/cheatsheet.md")
}

/// Canonical svg++ usage patterns.
pub fn patterns() -> &'static str {
    include_str!("../data/patterns.md")
}

/// A short prompt fragment for agents generating svg++.
pub fn prompt() -> &'static str {
    include_str!("../data/prompt.txt")
}

/// Integration instructions for agents driving the CLI.
pub fn skill() -> &'static str {
    include_str!("../data/skill.md")
}
