use std::fmt;
use std::ops::Deref;
use std::path::Path;

use serde::Serialize;

use crate::target::Format;

/// A normalized, filesystem- and URL-safe document identifier.
///
/// Produced only by [`normalize()`], so every `Address` is already in normal
/// form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

/// Lowercases `name` and replaces each run of whitespace with a single `-`.
///
/// Every other character is left untouched: there is no transliteration and
/// no percent-encoding. The function is total, pure, and idempotent.
///
/// ```
/// use orthrus::address::normalize;
///
/// assert_eq!(normalize("My Post"), "my-post");
/// assert_eq!(normalize("Tabs\tand  Spaces"), "tabs-and-spaces");
/// assert_eq!(normalize(&normalize("Ünïcode Stays")), normalize("Ünïcode Stays"));
/// ```
pub fn normalize(name: &str) -> Address {
    let mut output = String::with_capacity(name.len());

    let mut in_space = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                output.push('-');
                in_space = true;
            }

            continue;
        }

        in_space = false;
        output.extend(ch.to_lowercase());
    }

    Address(output)
}

impl Address {
    /// Derives the address of the document at `path` from its base name.
    pub fn of_path(path: &Path) -> Address {
        normalize(&crate::util::basename(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The output file name for this address in `format`.
    pub fn with_suffix(&self, format: Format) -> String {
        format!("{}{}", self.0, format.suffix())
    }
}

impl Deref for Address {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Address {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<str> for Address {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl From<Address> for String {
    fn from(address: Address) -> String {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
