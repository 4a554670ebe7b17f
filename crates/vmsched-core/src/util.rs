//! Environment file loading

use std::path::Path;

/// Load environment variables from the vmsched env file if not already set.
/// Searches standard locations in order:
/// 1. ./vmsched.env
/// 2. /usr/local/etc/vmsched/vmsched.env
/// 3. User's config directory/vmsched/vmsched.env
///
/// Only the first file found is read.
pub fn load_env_file() {
    let env_paths = [
        "vmsched.env".to_string(),
        "/usr/local/etc/vmsched/vmsched.env".to_string(),
        dirs::config_dir()
            .map(|p| p.join("vmsched/vmsched.env").to_string_lossy().to_string())
            .unwrap_or_default(),
    ];

    for path in &env_paths {
        if path.is_empty() {
            continue;
        }
        if Path::new(path).exists() {
            if let Ok(contents) = std::fs::read_to_string(path) {
                parse_env_file(&contents);
            }
            break;
        }
    }
}

/// Parse env file contents and set environment variables (only if not already set).
/// Supports `KEY=value`, `export KEY=value`, quoted values and `#` comments.
pub fn parse_env_file(contents: &str) {
    for (key, value) in parse_env_pairs(contents) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_env_pairs(contents: &str) -> Vec<(&str, &str)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_prefix("export ").unwrap_or(line))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pairs() {
        let contents = r#"
            # exchange directory
            VMSCHED__EXCHANGE__DIR=/var/run/vmsched
            export VMSCHED__POLICY__EPSILON="0.2"
            VMSCHED__AGENT__LOG_LEVEL='debug'
            not a pair
        "#;

        let pairs = parse_env_pairs(contents);
        assert_eq!(
            pairs,
            vec![
                ("VMSCHED__EXCHANGE__DIR", "/var/run/vmsched"),
                ("VMSCHED__POLICY__EPSILON", "0.2"),
                ("VMSCHED__AGENT__LOG_LEVEL", "debug"),
            ]
        );
    }

    #[test]
    fn test_parse_env_file_keeps_existing() {
        std::env::set_var("TEST_VMSCHED_KEEP", "original");
        std::env::remove_var("TEST_VMSCHED_NEW");

        parse_env_file("TEST_VMSCHED_KEEP=replaced\nTEST_VMSCHED_NEW=fresh");

        assert_eq!(std::env::var("TEST_VMSCHED_KEEP").unwrap(), "original");
        assert_eq!(std::env::var("TEST_VMSCHED_NEW").unwrap(), "fresh");
    }
}
