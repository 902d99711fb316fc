//! TOML front matter fenced by `+++` lines.
//!
//! ```text
//! +++
//! date = 2024-05-01
//! tags = ["rust"]
//! +++
//! # Document
//! ```

use crate::error::{Chainable, Result};

const FENCE: &str = "+++";

/// Splits `source` into its front matter table, if any, and the remaining
/// markdown body. A document that opens a fence but never closes it, or whose
/// front matter is not valid TOML, is a parse error.
pub fn split(source: &str) -> Result<(Option<toml::Table>, &str)> {
    let Some(rest) = strip_fence_line(source) else {
        return Ok((None, source));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let table = toml::from_str(&rest[..offset])
                .chain(error!("invalid front matter"))?;

            return Ok((Some(table), &rest[offset + line.len()..]));
        }

        offset += line.len();
    }

    err!(kind = Parse, "unterminated front matter",
        "hint" => "close the front matter with a line containing only `+++`")
}

fn strip_fence_line(source: &str) -> Option<&str> {
    let rest = source.strip_prefix(FENCE)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}
