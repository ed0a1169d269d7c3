//! §6.3 line protocol wire type: one JSON object per response line from the
//! fetch subprocess.

use serde::Deserialize;
use std::collections::HashMap;

/// Raw response line from the fetch subprocess, keys normalized to
/// lower-case on read (per §6.3).
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponseLine {
    pub url: String,
    pub status: String,
    #[serde(rename = "statuscode")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub cached: Option<bool>,
}

/// The fields `process()` derives from one `FetchResponseLine` (§6.3's
/// status/body -> result/content mapping).
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub result: String,
    pub status_code: Option<u16>,
    pub headers: HashMap<String, String>,
    pub content: Vec<u8>,
}

impl From<FetchResponseLine> for FetchOutcome {
    fn from(line: FetchResponseLine) -> Self {
        let result = if line.status == "200 OK" {
            "OK".to_string()
        } else {
            format!("non-200: {}", line.status)
        };
        Self {
            result,
            status_code: line.status_code,
            headers: line.headers,
            content: line.body.into_bytes(),
        }
    }
}

/// Parses one response line. Keys are normalized to lower-case per §6.3;
/// `serde_json` with the field renames above handles the common casings a
/// fetch engine might emit.
pub fn parse_response_line(line: &str) -> serde_json::Result<FetchResponseLine> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    let lowered = lowercase_keys(value);
    serde_json::from_value(lowered)
}

fn lowercase_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.to_lowercase(), v);
            }
            serde_json::Value::Object(out)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_200_ok_as_result_ok() {
        let line = r#"{"URL":"http://a/","Status":"200 OK","StatusCode":200,"Body":"hi"}"#;
        let parsed = parse_response_line(line).expect("parses");
        let outcome: FetchOutcome = parsed.into();
        assert_eq!(outcome.result, "OK");
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.content, b"hi");
    }

    #[test]
    fn non_200_status_becomes_non_200_result() {
        let line = r#"{"url":"http://a/","status":"404 Not Found","statusCode":404,"body":""}"#;
        let parsed = parse_response_line(line).expect("parses");
        let outcome: FetchOutcome = parsed.into();
        assert_eq!(outcome.result, "non-200: 404 Not Found");
    }
}
