//! Config validation: unknown-key detection with Levenshtein suggestions.
//!
//! The raw TOML is parsed into `toml::Value` first, its key tree walked and
//! compared against the known field names. Unknown keys only produce
//! warnings; existing configs always keep loading.

use std::collections::HashSet;

/// A non-fatal config warning (typo, misplaced key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Tables whose children are user-chosen names (profile names).
const FREE_FORM_TABLES: &[&str] = &["profiles.thresholds"];

/// Every valid dotted key path of `MonitorConfig`.
///
/// Maintained by hand alongside monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        "server.cors_origins",
        // [storage]
        "storage",
        "storage.data_dir",
        // [analysis]
        "analysis",
        "analysis.gravity_stability_hours",
        "analysis.gravity_stability_min_span_hours",
        "analysis.gravity_stability_points",
        "analysis.temp_descent_hours",
        "analysis.temp_descent_min_span_hours",
        "analysis.temp_descent_threshold_c",
        "analysis.forecast_window_hours",
        "analysis.forecast_min_readings",
        "analysis.forecast_min_span_hours",
        "analysis.forecast_alert_horizon_hours",
        "analysis.cooldown_hours",
        "analysis.notify_timeout_secs",
        "analysis.auto_resting",
        // [profiles]
        "profiles",
        "profiles.default_attenuation_threshold",
        "profiles.thresholds",
        // [telegram]
        "telegram",
        "telegram.bot_token",
        "telegram.chat_id",
        "telegram.api_base",
        "telegram.webhook_secret",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() && !FREE_FORM_TABLES.contains(&path.as_str()) {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Return warnings for every unknown key in a raw TOML string.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // serde reports parse errors
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("cooldwn", "cooldown"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let value: toml::Value = r#"
            [analysis]
            cooldown_hours = 12.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&value, "");
        assert!(keys.contains(&"analysis".to_string()));
        assert!(keys.contains(&"analysis.cooldown_hours".to_string()));
    }

    #[test]
    fn test_typo_gets_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
            [analysis]
            cooldwn_hours = 12.0
        "#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "analysis.cooldwn_hours");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("analysis.cooldown_hours"));
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_profile_names_are_free_form() {
        let warnings = validate_unknown_keys(
            r#"
            [profiles.thresholds]
            kveik = 0.82
            belgian_tripel = 0.86
        "#,
        );
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_valid_config_has_no_warnings() {
        let warnings = validate_unknown_keys(
            r#"
            [server]
            addr = "127.0.0.1:9000"

            [telegram]
            chat_id = "42"
        "#,
        );
        assert!(warnings.is_empty());
    }
}
