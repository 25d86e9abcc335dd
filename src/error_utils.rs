use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Parse JSON from string with contextual error handling
pub fn parse_json_with_context<T: DeserializeOwned>(json_str: &str, data_desc: &str) -> Result<T> {
    serde_json::from_str(json_str).with_context(|| format!("Failed to parse {data_desc} from JSON"))
}

/// Parse HTTP response as JSON with contextual error handling
pub async fn parse_http_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
    api_desc: &str,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to parse {api_desc} response"))
}

/// Get optional environment variable, returning None if not set or empty
pub fn get_optional_env_var(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_json_parsing_with_context() {
        let parsed: TestData =
            parse_json_with_context(r#"{"name": "test", "value": 42}"#, "test data").unwrap();
        assert_eq!(
            parsed,
            TestData {
                name: "test".to_string(),
                value: 42
            }
        );

        let result: Result<TestData> = parse_json_with_context("not json", "test data");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_handling() {
        let result = get_optional_env_var("NONEXISTENT_VAR");
        assert!(result.is_none());

        // PATH is set on all systems this runs on.
        if std::env::var("PATH").is_ok() {
            assert!(get_optional_env_var("PATH").is_some());
        }
    }
}
