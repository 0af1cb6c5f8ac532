//! settings node parsing

use super::value::arguments;
use crate::error::{CoreError, Result};
use crate::model::Settings;
use kdl::KdlNode;
use std::path::PathBuf;

/// Apply a `settings { ... }` block on top of `settings`
pub fn parse_settings(node: &KdlNode, settings: &mut Settings) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        let key = child.name().value();
        let value = arguments(child).first().map(|e| e.value().clone());
        let value = value
            .ok_or_else(|| CoreError::InvalidConfig(format!("settings.{key} requires a value")))?;

        match key {
            "jobs" => {
                settings.jobs = positive_integer(key, value.as_integer())? as usize;
            }
            "max_attempts" | "max-attempts" => {
                settings.max_attempts = positive_integer(key, value.as_integer())? as u32;
            }
            "initial_backoff_ms" | "initial-backoff-ms" => {
                settings.initial_backoff_ms = positive_integer(key, value.as_integer())?;
            }
            "max_backoff_ms" | "max-backoff-ms" => {
                settings.max_backoff_ms = positive_integer(key, value.as_integer())?;
            }
            "backoff_multiplier" | "backoff-multiplier" => {
                let multiplier = value
                    .as_float()
                    .or_else(|| value.as_integer().map(|i| i as f64))
                    .filter(|m| *m >= 1.0)
                    .ok_or_else(|| {
                        CoreError::InvalidConfig(format!("settings.{key} must be a number >= 1"))
                    })?;
                settings.backoff_multiplier = multiplier;
            }
            "action_timeout_secs" | "action-timeout-secs" => {
                settings.action_timeout_secs = positive_integer(key, value.as_integer())?;
            }
            "state_dir" | "state-dir" => {
                let dir = value.as_string().ok_or_else(|| {
                    CoreError::InvalidConfig(format!("settings.{key} must be a string"))
                })?;
                settings.state_dir = PathBuf::from(dir);
            }
            other => {
                tracing::warn!(setting = other, "Ignoring unknown setting");
            }
        }
    }

    Ok(())
}

fn positive_integer(key: &str, value: Option<i128>) -> Result<u64> {
    value
        .filter(|v| *v >= 1)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| CoreError::InvalidConfig(format!("settings.{key} must be a positive integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(kdl: &str) -> Result<Settings> {
        let doc: kdl::KdlDocument = kdl.parse().unwrap();
        let mut settings = Settings::default();
        parse_settings(doc.nodes().first().unwrap(), &mut settings)?;
        Ok(settings)
    }

    #[test]
    fn test_parse_settings() {
        let settings = parse(
            r#"
            settings {
                jobs 8
                max-attempts 3
                initial_backoff_ms 100
                max-backoff-ms 2000
                backoff-multiplier 1.5
                action-timeout-secs 30
                state-dir "state"
            }
            "#,
        )
        .unwrap();

        assert_eq!(settings.jobs, 8);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.initial_backoff_ms, 100);
        assert_eq!(settings.max_backoff_ms, 2000);
        assert_eq!(settings.backoff_multiplier, 1.5);
        assert_eq!(settings.action_timeout_secs, 30);
        assert_eq!(settings.state_dir, PathBuf::from("state"));
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = parse("settings { jobs 2; }").unwrap();
        assert_eq!(settings.jobs, 2);
        assert_eq!(settings.max_attempts, Settings::default().max_attempts);
    }

    #[test]
    fn test_zero_jobs_rejected() {
        assert!(parse("settings { jobs 0; }").is_err());
    }
}
