//! Application adapter (C6).
//!
//! A stateless text envelope carried inside the RDP payload:
//!
//! ```text
//! Method: <METHOD>
//! Data: <json>
//! ```
//!
//! answered with:
//!
//! ```text
//! Status-name: <STATUS>
//! Status-message: <free text>
//! Data: <json>
//! ```
//!
//! Parsing is line-based: split on `\n`, then on the first `:` per line,
//! trimming whitespace around key and value. This module only builds and
//! parses the envelope; it does not know what a `MESSAGE` or `FETCH` needs
//! inside `Data` — that is up to whatever handler consumes the parsed
//! request (see `rdp_server::chat_handler` for a concrete example).

use std::fmt;

use serde_json::Value;

/// The four methods this envelope understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Login,
    Message,
    Fetch,
    Exit,
}

impl Method {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "LOGIN" => Some(Method::Login),
            "MESSAGE" => Some(Method::Message),
            "FETCH" => Some(Method::Fetch),
            "EXIT" => Some(Method::Exit),
            _ => None,
        }
    }

    pub fn as_wire_token(&self) -> &'static str {
        match self {
            Method::Login => "LOGIN",
            Method::Message => "MESSAGE",
            Method::Fetch => "FETCH",
            Method::Exit => "EXIT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_token())
    }
}

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    AuthorizationError,
    DataRequired,
    UnsupportedMethod,
    FormatError,
}

impl Status {
    pub fn as_wire_token(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::AuthorizationError => "AUTHORIZATION-ERROR",
            Status::DataRequired => "DATA-REQUIRED",
            Status::UnsupportedMethod => "UNSUPPORTED-METHOD",
            Status::FormatError => "FORMAT-ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_token())
    }
}

/// A successfully parsed request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub method: Method,
    pub data: Value,
}

/// A successfully parsed response envelope.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub status: Status,
    pub message: String,
    pub data: Option<Value>,
}

/// Splits `payload` into line-based `key: value` pairs, trimming whitespace
/// around each. Returns `None` if any non-empty line has no `:`.
fn parse_fields(payload: &[u8]) -> Option<Vec<(String, String)>> {
    let text = std::str::from_utf8(payload).ok()?;
    let mut fields = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(':')?;
        fields.push((key.trim().to_string(), value.trim().to_string()));
    }
    Some(fields)
}

fn find<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Parses a request envelope out of an RDP payload.
///
/// A line that cannot be split on `:` yields [`Status::FormatError`]. A
/// missing or unrecognized `Method` yields [`Status::UnsupportedMethod`]. A
/// missing or unparsable `Data` yields [`Status::DataRequired`].
pub fn parse_request(payload: &[u8]) -> Result<ParsedRequest, Status> {
    let fields = parse_fields(payload).ok_or(Status::FormatError)?;

    let method = find(&fields, "Method")
        .and_then(Method::parse)
        .ok_or(Status::UnsupportedMethod)?;

    let data_str = find(&fields, "Data").ok_or(Status::DataRequired)?;
    let data: Value = serde_json::from_str(data_str).map_err(|_| Status::DataRequired)?;

    Ok(ParsedRequest { method, data })
}

/// Builds a request envelope, e.g. for a client to hand to `RdpClient::send`.
pub fn encode_request(method: Method, data: &Value) -> Vec<u8> {
    format!("Method: {}\nData: {}\n", method, data).into_bytes()
}

/// Builds a response envelope. The `Data` line is omitted entirely when
/// `data` is `None`, and carries no trailing newline when present.
pub fn encode_response(status: Status, message: &str, data: Option<&Value>) -> Vec<u8> {
    let mut out = format!("Status-name: {}\nStatus-message: {}\n", status, message);
    if let Some(data) = data {
        out.push_str("Data: ");
        out.push_str(&data.to_string());
    }
    out.into_bytes()
}

/// Parses a response envelope out of an RDP payload.
pub fn parse_response(payload: &[u8]) -> Result<ParsedResponse, Status> {
    let fields = parse_fields(payload).ok_or(Status::FormatError)?;

    let status_token = find(&fields, "Status-name").ok_or(Status::FormatError)?;
    let status = match status_token {
        "SUCCESS" => Status::Success,
        "AUTHORIZATION-ERROR" => Status::AuthorizationError,
        "DATA-REQUIRED" => Status::DataRequired,
        "UNSUPPORTED-METHOD" => Status::UnsupportedMethod,
        "FORMAT-ERROR" => Status::FormatError,
        _ => return Err(Status::FormatError),
    };

    let message = find(&fields, "Status-message").unwrap_or_default().to_string();
    let data = match find(&fields, "Data") {
        Some(data_str) => Some(serde_json::from_str(data_str).map_err(|_| Status::FormatError)?),
        None => None,
    };

    Ok(ParsedResponse { status, message, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_login_request() {
        let payload = b"Method: LOGIN\nData: {\"username\": \"alice\"}\n";
        let parsed = parse_request(payload).unwrap();
        assert_eq!(parsed.method, Method::Login);
        assert_eq!(parsed.data["username"], "alice");
    }

    #[test]
    fn unknown_method_is_unsupported() {
        let payload = b"Method: DANCE\nData: {}\n";
        assert_eq!(parse_request(payload), Err(Status::UnsupportedMethod));
    }

    #[test]
    fn missing_method_is_unsupported() {
        let payload = b"Data: {}\n";
        assert_eq!(parse_request(payload), Err(Status::UnsupportedMethod));
    }

    #[test]
    fn missing_data_is_data_required() {
        let payload = b"Method: LOGIN\n";
        assert_eq!(parse_request(payload), Err(Status::DataRequired));
    }

    #[test]
    fn invalid_json_data_is_data_required() {
        let payload = b"Method: LOGIN\nData: not json\n";
        assert_eq!(parse_request(payload), Err(Status::DataRequired));
    }

    #[test]
    fn malformed_line_is_format_error() {
        let payload = b"this has no colon\n";
        assert_eq!(parse_request(payload), Err(Status::FormatError));
    }

    #[test]
    fn response_roundtrip() {
        let encoded = encode_response(Status::Success, "Successfully authorized", Some(&json!({"username": "alice"})));
        assert_eq!(
            encoded,
            b"Status-name: SUCCESS\nStatus-message: Successfully authorized\nData: {\"username\":\"alice\"}"
        );
        let parsed = parse_response(&encoded).unwrap();
        assert_eq!(parsed.status, Status::Success);
        assert_eq!(parsed.message, "Successfully authorized");
        assert_eq!(parsed.data.unwrap()["username"], "alice");
    }

    #[test]
    fn response_without_data_omits_data_line() {
        let encoded = encode_response(Status::AuthorizationError, "nope", None);
        assert_eq!(encoded, b"Status-name: AUTHORIZATION-ERROR\nStatus-message: nope\n");
        let parsed = parse_response(&encoded).unwrap();
        assert!(parsed.data.is_none());
    }

    #[test]
    fn request_roundtrip() {
        let encoded = encode_request(Method::Message, &json!({"message": "hi", "username": "bob"}));
        let parsed = parse_request(&encoded).unwrap();
        assert_eq!(parsed.method, Method::Message);
        assert_eq!(parsed.data["message"], "hi");
    }
}
