//! Reference chat handler (demo/test-only).
//!
//! An in-memory stand-in for the chat application's persistence layer,
//! grounded in the original Chatter application's request handlers. This is
//! not production-grade storage: all state is lost on restart, there is no
//! durability, and nothing here should be mistaken for the key/value-backed
//! handler a real deployment would use. It exists to give the adapter and
//! the core protocol something real to exchange requests with.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rdp_shared::app::{self, Method, Status};
use serde_json::{json, Value};

struct StoredMessage {
    username: String,
    message: String,
    timestamp: f64,
}

struct ChatState {
    /// Logged-in username -> last-fetch timestamp.
    active_users: HashMap<String, f64>,
    messages: Vec<StoredMessage>,
}

/// An in-memory implementation of the `LOGIN`/`MESSAGE`/`FETCH`/`EXIT`
/// method set.
pub struct ChatHandler {
    state: Mutex<ChatState>,
}

impl Default for ChatHandler {
    fn default() -> Self {
        Self {
            state: Mutex::new(ChatState { active_users: HashMap::new(), messages: Vec::new() }),
        }
    }
}

fn now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)?.as_str().map(|s| s.to_string())
}

impl ChatHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one request payload, returning the encoded response payload.
    /// Suitable as the closure passed to `RdpServer::on_message`.
    pub fn handle(&self, payload: &[u8]) -> Vec<u8> {
        let request = match app::parse_request(payload) {
            Ok(request) => request,
            Err(status) => return app::encode_response(status, &default_message(status), None),
        };

        match request.method {
            Method::Login => self.login(&request.data),
            Method::Message => self.message(&request.data),
            Method::Fetch => self.fetch(&request.data),
            Method::Exit => self.exit(&request.data),
        }
    }

    fn login(&self, data: &Value) -> Vec<u8> {
        let Some(username) = string_field(data, "username") else {
            return app::encode_response(Status::DataRequired, "username is required", None);
        };

        let mut state = self.state.lock().unwrap();
        if state.active_users.contains_key(&username) {
            return app::encode_response(Status::AuthorizationError, "username already logged in", None);
        }
        state.active_users.insert(username.clone(), now());

        app::encode_response(Status::Success, "Successfully authorized", Some(&json!({"username": username})))
    }

    fn message(&self, data: &Value) -> Vec<u8> {
        let (Some(username), Some(message)) =
            (string_field(data, "username"), string_field(data, "message"))
        else {
            return app::encode_response(Status::DataRequired, "username and message are required", None);
        };

        let mut state = self.state.lock().unwrap();
        if !state.active_users.contains_key(&username) {
            return app::encode_response(Status::AuthorizationError, "not logged in", None);
        }
        state.messages.push(StoredMessage { username: username.clone(), message, timestamp: now() });

        app::encode_response(Status::Success, "Message stored", Some(&json!({"username": username})))
    }

    fn fetch(&self, data: &Value) -> Vec<u8> {
        let Some(username) = string_field(data, "username") else {
            return app::encode_response(Status::DataRequired, "username is required", None);
        };
        let since = data.get("timestamp").and_then(Value::as_f64).unwrap_or(0.0);

        let mut state = self.state.lock().unwrap();
        if !state.active_users.contains_key(&username) {
            return app::encode_response(Status::AuthorizationError, "not logged in", None);
        }

        let mut matched: Vec<&StoredMessage> =
            state.messages.iter().filter(|m| m.timestamp > since).collect();
        matched.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap());

        let payload: Vec<Value> = matched
            .iter()
            .map(|m| json!({"username": m.username, "message": m.message, "timestamp": m.timestamp}))
            .collect();

        if let Some(entry) = state.active_users.get_mut(&username) {
            *entry = now();
        }

        app::encode_response(Status::Success, "Fetched messages", Some(&Value::Array(payload)))
    }

    fn exit(&self, data: &Value) -> Vec<u8> {
        let Some(username) = string_field(data, "username") else {
            return app::encode_response(Status::DataRequired, "username is required", None);
        };

        let mut state = self.state.lock().unwrap();
        if state.active_users.remove(&username).is_none() {
            return app::encode_response(Status::AuthorizationError, "not logged in", None);
        }

        app::encode_response(Status::Success, "Logged out", None)
    }
}

fn default_message(status: Status) -> String {
    match status {
        Status::Success => "ok".to_string(),
        Status::AuthorizationError => "not authorized".to_string(),
        Status::DataRequired => "data required".to_string(),
        Status::UnsupportedMethod => "unsupported method".to_string(),
        Status::FormatError => "malformed request".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, data: Value) -> Vec<u8> {
        app::encode_request(method, &data)
    }

    #[test]
    fn login_then_duplicate_login_is_rejected() {
        let handler = ChatHandler::new();
        let first = handler.handle(&request(Method::Login, json!({"username": "alice"})));
        assert_eq!(app::parse_response(&first).unwrap().status, Status::Success);

        let second = handler.handle(&request(Method::Login, json!({"username": "alice"})));
        assert_eq!(app::parse_response(&second).unwrap().status, Status::AuthorizationError);
    }

    #[test]
    fn message_requires_login() {
        let handler = ChatHandler::new();
        let reply = handler.handle(&request(Method::Message, json!({"username": "bob", "message": "hi"})));
        assert_eq!(app::parse_response(&reply).unwrap().status, Status::AuthorizationError);
    }

    #[test]
    fn fetch_returns_messages_after_login() {
        let handler = ChatHandler::new();
        handler.handle(&request(Method::Login, json!({"username": "alice"})));
        handler.handle(&request(Method::Login, json!({"username": "bob"})));
        handler.handle(&request(Method::Message, json!({"username": "alice", "message": "hello bob"})));

        let reply = handler.handle(&request(Method::Fetch, json!({"username": "bob", "timestamp": 0.0})));
        let parsed = app::parse_response(&reply).unwrap();
        assert_eq!(parsed.status, Status::Success);
        let messages = parsed.data.unwrap();
        let messages = messages.as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["message"], "hello bob");
    }

    #[test]
    fn exit_requires_login_and_then_removes_user() {
        let handler = ChatHandler::new();
        let before = handler.handle(&request(Method::Exit, json!({"username": "alice"})));
        assert_eq!(app::parse_response(&before).unwrap().status, Status::AuthorizationError);

        handler.handle(&request(Method::Login, json!({"username": "alice"})));
        let after = handler.handle(&request(Method::Exit, json!({"username": "alice"})));
        assert_eq!(app::parse_response(&after).unwrap().status, Status::Success);

        let relogin = handler.handle(&request(Method::Login, json!({"username": "alice"})));
        assert_eq!(app::parse_response(&relogin).unwrap().status, Status::Success);
    }

    #[test]
    fn missing_required_field_is_data_required() {
        let handler = ChatHandler::new();
        let reply = handler.handle(&request(Method::Message, json!({"username": "alice"})));
        assert_eq!(app::parse_response(&reply).unwrap().status, Status::DataRequired);
    }
}
