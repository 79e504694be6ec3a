//! Wire types for the control-plane API.

use serde::{Deserialize, Serialize};

/// Body of `POST /config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    pub path_to_config: String,
}

/// Body of the `GET /ping` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub http_api_version: String,
}

/// Body of the `GET /logs` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_request_uses_camel_case() {
        let request: ConfigRequest =
            serde_json::from_str(r#"{"pathToConfig": "server.ini"}"#).unwrap();
        assert_eq!(request.path_to_config, "server.ini");

        let encoded = serde_json::to_string(&request).unwrap();
        assert!(encoded.contains("pathToConfig"));
    }

    #[test]
    fn test_logs_response_round_trip() {
        let encoded = serde_json::to_string(&LogsResponse {
            logs: "line\n".to_string(),
        })
        .unwrap();
        let decoded: LogsResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.logs, "line\n");
    }
}
