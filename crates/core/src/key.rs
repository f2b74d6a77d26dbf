//! Resource-type keys: `group::version::Kind` (wire/display) and the
//! `group_version_Kind` form used as navigation tree node ids.
//!
//! Nothing here fails. Malformed input degrades to a best-effort
//! `{group, version, kind}` or is passed through unchanged.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

const KEY_SEP: &str = "::";
const NAV_SEP: char = '_';
const CORE_GROUP: &str = "core";

/// Canonical identifier of one Kubernetes kind within an API group/version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTypeKey(String);

impl ResourceTypeKey {
    pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn parse(&self) -> KeyParts { parse(&self.0) }

    /// Navigation tree id for this key (`group_version_Kind`).
    pub fn to_nav_id(&self) -> String { to_nav_id(&self.0) }
}

impl fmt::Display for ResourceTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl Borrow<str> for ResourceTypeKey {
    fn borrow(&self) -> &str { &self.0 }
}

impl From<&str> for ResourceTypeKey {
    fn from(v: &str) -> Self { Self(v.to_string()) }
}

impl From<String> for ResourceTypeKey {
    fn from(v: String) -> Self { Self(v) }
}

/// Decomposed resource-type key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyParts {
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// Split a `group::version::Kind` key.
///
/// A bare token is a core kind with no version. With two segments the kind
/// falls back to the first segment; only one- and three-part keys are
/// produced in practice.
pub fn parse(key: &str) -> KeyParts {
    let segments: Vec<&str> = key.split(KEY_SEP).collect();
    if let [only] = segments.as_slice() {
        return KeyParts { group: CORE_GROUP.to_string(), version: String::new(), kind: (*only).to_string() };
    }
    let first = segments.first().copied().unwrap_or("");
    let group = if first.is_empty() { CORE_GROUP } else { first };
    let version = segments.get(1).copied().unwrap_or("");
    let kind = segments.get(2).copied().filter(|k| !k.is_empty()).unwrap_or(first);
    KeyParts { group: group.to_string(), version: version.to_string(), kind: kind.to_string() }
}

/// Display label for an API group: `""`/`"core"` become `"Core"`, anything
/// else gets its first character upper-cased and the rest left alone.
pub fn format_group_label(group: &str) -> String {
    if group.is_empty() || group == CORE_GROUP {
        return "Core".to_string();
    }
    let mut chars = group.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a navigation id (`group_version_Kind`) into a resource-type key.
///
/// Everything after the second underscore is the kind, so kinds containing
/// underscores survive. Ids with fewer than three segments are returned as-is.
pub fn to_resource_type_key(nav_id: &str) -> String {
    let segments: Vec<&str> = nav_id.splitn(3, NAV_SEP).collect();
    match segments.as_slice() {
        [group, version, kind] => format!("{}{}{}{}{}", group, KEY_SEP, version, KEY_SEP, kind),
        _ => nav_id.to_string(),
    }
}

/// Inverse of [`to_resource_type_key`] for three-part keys; other keys pass through.
pub fn to_nav_id(key: &str) -> String {
    let segments: Vec<&str> = key.split(KEY_SEP).collect();
    match segments.as_slice() {
        [group, version, kind] => format!("{}{}{}{}{}", group, NAV_SEP, version, NAV_SEP, kind),
        _ => key.to_string(),
    }
}

pub fn format_key(group: &str, version: &str, kind: &str) -> ResourceTypeKey {
    ResourceTypeKey(format!("{}{}{}{}{}", group, KEY_SEP, version, KEY_SEP, kind))
}
