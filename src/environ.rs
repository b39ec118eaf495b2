//! Discovery and redaction of `OS_*` environment variables.
//!
//! Everything carrying the `OS_` prefix is reported so that configuration
//! drift stays visible. Only the names in [`SENSITIVE_NAMES`] are masked, and
//! only on an exact, case-sensitive match: an alias such as `os_password` or
//! `OS_PASSWORD_FILE` is reported verbatim.

use serde::ser::{Serialize, Serializer};

/// Prefix of the variables this tool reports.
pub const PREFIX: &str = "OS_";

/// Replacement shown for sensitive values.
pub const MASK: &str = "***";

/// Variables whose values are always masked.
pub const SENSITIVE_NAMES: [&str; 4] = [
    "OS_ACCESS_TOKEN",
    "OS_APPLICATION_CREDENTIAL_SECRET",
    "OS_PASSWORD",
    "OS_TOKEN",
];

/// A single reported variable.
///
/// Ordering is by name, then value. Serializes as a `[name, value]` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConfigEntry {
    pub name: String,
    pub value: String,
}

impl ConfigEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Serialize for ConfigEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.name, &self.value).serialize(serializer)
    }
}

/// Whether `name` is one of the masked variables.
pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_NAMES.contains(&name)
}

/// Filter, mask and sort a snapshot of variables.
pub fn redact_environ<I, K, V>(vars: I) -> Vec<ConfigEntry>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut entries: Vec<ConfigEntry> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(name, _)| name.starts_with(PREFIX))
        .map(|(name, value)| {
            if is_sensitive(&name) {
                ConfigEntry::new(name, MASK)
            } else {
                ConfigEntry { name, value }
            }
        })
        .collect();

    entries.sort();
    entries
}

/// Read the process environment and return the redacted `OS_*` entries.
///
/// Variables whose name is not valid Unicode are skipped. A sensitive value is
/// masked whatever its bytes; any other non-Unicode value is decoded lossily.
pub fn extract_os_environ() -> Vec<ConfigEntry> {
    let vars = std::env::vars_os().filter_map(|(k, v)| {
        let name = match k.into_string() {
            Ok(name) => name,
            Err(k) => {
                tracing::debug!("Skipping non-unicode variable name {:?}", k);
                return None;
            },
        };
        let value = if is_sensitive(&name) {
            MASK.to_string()
        } else {
            v.to_string_lossy().into_owned()
        };
        Some((name, value))
    });

    redact_environ(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filters_prefix_and_masks_password() {
        let vars = vec![
            ("OS_AUTH_URL", "https://x"),
            ("OS_PASSWORD", "secret"),
            ("PATH", "/bin"),
        ];

        assert_eq!(
            redact_environ(vars),
            vec![
                ConfigEntry::new("OS_AUTH_URL", "https://x"),
                ConfigEntry::new("OS_PASSWORD", "***"),
            ]
        );
    }

    #[test]
    fn test_masks_every_sensitive_name() {
        let vars: Vec<(&str, &str)> = SENSITIVE_NAMES.iter().map(|n| (*n, "value")).collect();
        let entries = redact_environ(vars);

        assert_eq!(entries.len(), SENSITIVE_NAMES.len());
        assert!(entries.iter().all(|e| e.value == MASK));
    }

    #[test]
    fn test_masks_empty_sensitive_value() {
        let entries = redact_environ(vec![("OS_TOKEN", "")]);
        assert_eq!(entries, vec![ConfigEntry::new("OS_TOKEN", "***")]);
    }

    #[test]
    fn test_mask_is_exact_name_only() {
        let entries = redact_environ(vec![
            ("OS_PASSWORD_FILE", "/run/secrets/pw"),
            ("os_password", "hunter2"),
        ]);

        // lowercase is not OS_-prefixed; the suffixed name is not in the set
        assert_eq!(
            entries,
            vec![ConfigEntry::new("OS_PASSWORD_FILE", "/run/secrets/pw")]
        );
    }

    #[test]
    fn test_sorted_by_name() {
        let entries = redact_environ(vec![
            ("OS_REGION_NAME", "RegionOne"),
            ("OS_AUTH_URL", "https://keystone"),
            ("OS_INTERFACE", "public"),
        ]);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["OS_AUTH_URL", "OS_INTERFACE", "OS_REGION_NAME"]);
    }

    #[test]
    fn test_value_breaks_ties() {
        let mut entries = vec![
            ConfigEntry::new("OS_A", "b"),
            ConfigEntry::new("OS_A", "a"),
        ];
        entries.sort();
        assert_eq!(entries[0].value, "a");
    }

    #[test]
    fn test_empty_snapshot() {
        let entries = redact_environ(Vec::<(String, String)>::new());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_serializes_as_pair() {
        let entry = ConfigEntry::new("OS_PASSWORD", MASK);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!(["OS_PASSWORD", "***"]));
    }
}
