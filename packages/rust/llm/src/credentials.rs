//! API key loading.
//!
//! The key is read once at process start and handed to the client
//! constructor. The secret file wins over the environment variable.

use std::path::Path;

use sitesmith_shared::{LlmConfig, Result, SitesmithError};

/// Load the generation-service API key from `api_key_file`, then `api_key_env`.
pub fn load_api_key(config: &LlmConfig) -> Result<String> {
    let file = Path::new(&config.api_key_file);
    if file.is_file() {
        let key = std::fs::read_to_string(file)
            .map_err(|e| SitesmithError::io(file, e))?
            .trim()
            .to_string();
        if !key.is_empty() {
            tracing::debug!(path = %file.display(), "API key loaded from file");
            return Ok(key);
        }
    }

    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(SitesmithError::config(format!(
            "API key not found. Put it in {} or set the {var_name} environment variable.",
            config.api_key_file
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_is_trimmed() {
        let dir = std::env::temp_dir().join(format!("sitesmith-key-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let key_path = dir.join("api_key.txt");
        std::fs::write(&key_path, "  sk-abc123\n").unwrap();

        let config = LlmConfig {
            api_key_file: key_path.to_string_lossy().to_string(),
            api_key_env: "SITESMITH_TEST_UNSET_KEY_1".into(),
            ..LlmConfig::default()
        };
        assert_eq!(load_api_key(&config).unwrap(), "sk-abc123");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_key_is_config_error() {
        let config = LlmConfig {
            api_key_file: "/nonexistent/sitesmith/api_key.txt".into(),
            // Use a unique env var name to avoid interfering with other tests
            api_key_env: "SITESMITH_TEST_UNSET_KEY_2".into(),
            ..LlmConfig::default()
        };
        let err = load_api_key(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("API key not found"));
    }
}
