//! The JSON request/response envelope.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One client command frame.
#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Data", default)]
    pub data: HashMap<String, String>,
}

impl Request {
    /// Fetch a data field, treating empty values as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// One server response frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "Code")]
    pub code: u16,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Info", default)]
    pub info: String,
    #[serde(rename = "Data", default)]
    pub data: HashMap<String, String>,
}

impl Response {
    /// Build a response with the canonical status text for a code.
    pub fn new(code: u16) -> Self {
        let status = match code {
            100 => "CONTINUE",
            101 => "PENDING",
            104 => "TRANSFER",
            200 => "OK",
            201 => "REGISTERED",
            202 => "UNREGISTERED",
            300 => "INTERNAL SERVER ERROR",
            304 => "REGISTRATION CLOSED",
            400 => "BAD REQUEST",
            401 => "UNAUTHORIZED",
            402 => "AUTHENTICATION FAILURE",
            404 => "NOT FOUND",
            407 => "UNAVAILABLE",
            408 => "RESOURCE EXISTS",
            _ => "UNKNOWN",
        };
        Self {
            code,
            status: status.to_string(),
            info: String::new(),
            data: HashMap::new(),
        }
    }

    pub fn with_info(mut self, info: &str) -> Self {
        self.info = info.to_string();
        self
    }

    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn cont() -> Self {
        Self::new(100)
    }

    pub fn bad_request(info: &str) -> Self {
        Self::new(400).with_info(info)
    }

    pub fn unauthorized() -> Self {
        Self::new(401)
    }

    pub fn not_found() -> Self {
        Self::new(404)
    }

    pub fn internal_error() -> Self {
        Self::new(300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_wire_shape() {
        let req: Request = serde_json::from_str(
            r#"{"Action":"LOGIN","Data":{"Workspace-ID":"11111111-1111-1111-1111-111111111111"}}"#,
        )
        .unwrap();
        assert_eq!(req.action, "LOGIN");
        assert_eq!(
            req.field("Workspace-ID"),
            Some("11111111-1111-1111-1111-111111111111")
        );
        assert_eq!(req.field("Missing"), None);
    }

    #[test]
    fn data_is_optional() {
        let req: Request = serde_json::from_str(r#"{"Action":"NOOP"}"#).unwrap();
        assert!(req.data.is_empty());
    }

    #[test]
    fn empty_fields_read_as_absent() {
        let req: Request =
            serde_json::from_str(r#"{"Action":"LOGIN","Data":{"Address":""}}"#).unwrap();
        assert_eq!(req.field("Address"), None);
    }

    #[test]
    fn response_carries_canonical_status_text() {
        let resp = Response::new(402);
        assert_eq!(resp.status, "AUTHENTICATION FAILURE");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"Code\":402"));
        assert!(json.contains("\"Status\":\"AUTHENTICATION FAILURE\""));
    }
}
