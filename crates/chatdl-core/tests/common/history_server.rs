//! Minimal HTTP/1.1 chat-history server for integration tests.
//!
//! Serves one chat: `/health`, `/chats/{chat}`, `/chats/{chat}/messages` and
//! `/chats/{chat}/messages/{id}/content`. Content responses can be scripted
//! per message to return error statuses before the body.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub timestamp: i64,
    pub mime_type: Option<&'static str>,
    pub file_name: Option<&'static str>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn text(id: i64, name: &'static str, body: &str) -> Self {
        Self {
            id,
            timestamp: 1_700_000_000 + id,
            mime_type: Some("text/plain"),
            file_name: Some(name),
            body: body.as_bytes().to_vec(),
        }
    }
}

/// A scripted error response: status code and optional `Retry-After` seconds.
#[derive(Debug, Clone, Copy)]
pub struct Failure {
    pub status: u16,
    pub retry_after: Option<u64>,
}

struct State {
    chat: String,
    messages: Vec<Message>,
    failures: HashMap<i64, VecDeque<Failure>>,
    requests: Vec<String>,
}

#[derive(Clone)]
pub struct HistoryServer {
    pub base_url: String,
    state: Arc<Mutex<State>>,
}

impl HistoryServer {
    /// Starts a server in a background thread. It runs until the process exits.
    pub fn start(chat: &str, messages: Vec<Message>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State {
            chat: chat.to_string(),
            messages,
            failures: HashMap::new(),
            requests: Vec::new(),
        }));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base_url: format!("http://127.0.0.1:{}/", port),
            state,
        }
    }

    /// Queue error responses for a message's content before it is served.
    pub fn fail_content(&self, id: i64, failures: &[Failure]) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(id)
            .or_default()
            .extend(failures.iter().copied());
    }

    /// Request paths seen so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn content_requests(&self, id: i64) -> usize {
        let suffix = format!("/messages/{}/content", id);
        self.requests().iter().filter(|p| p.ends_with(&suffix)).count()
    }
}

fn json_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn message_json(m: &Message) -> String {
    let mime = m
        .mime_type
        .map(|t| format!("\"{}\"", json_escape(t)))
        .unwrap_or_else(|| "null".to_string());
    let name = m
        .file_name
        .map(|n| format!("\"{}\"", json_escape(n)))
        .unwrap_or_else(|| "null".to_string());
    format!(
        "{{\"id\":{},\"timestamp\":{},\"mime_type\":{},\"file_name\":{},\"file_size\":{}}}",
        m.id,
        m.timestamp,
        mime,
        name,
        m.body.len()
    )
}

fn respond(stream: &mut TcpStream, status: &str, extra_headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        extra_headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let mut first = request.lines().next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("");
    let path = first.next().unwrap_or("/").to_string();
    if !method.eq_ignore_ascii_case("GET") {
        respond(&mut stream, "405 Method Not Allowed", "", b"");
        return;
    }

    let mut st = state.lock().unwrap();
    st.requests.push(path.clone());
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health"] => respond(&mut stream, "200 OK", "", b"ok"),
        ["chats", chat] if *chat == st.chat => {
            let body = format!("{{\"id\":\"{}\",\"title\":\"Saved Messages\"}}", json_escape(chat));
            respond(&mut stream, "200 OK", "Content-Type: application/json\r\n", body.as_bytes());
        }
        ["chats", chat, "messages"] if *chat == st.chat => {
            let items: Vec<String> = st.messages.iter().map(message_json).collect();
            let body = format!("[{}]", items.join(","));
            respond(&mut stream, "200 OK", "Content-Type: application/json\r\n", body.as_bytes());
        }
        ["chats", chat, "messages", id, "content"] if *chat == st.chat => {
            let Ok(id) = id.parse::<i64>() else {
                respond(&mut stream, "400 Bad Request", "", b"");
                return;
            };
            if let Some(failure) = st.failures.get_mut(&id).and_then(|q| q.pop_front()) {
                let headers = failure
                    .retry_after
                    .map(|s| format!("Retry-After: {}\r\n", s))
                    .unwrap_or_default();
                let status = match failure.status {
                    429 => "429 Too Many Requests".to_string(),
                    404 => "404 Not Found".to_string(),
                    code => format!("{} Error", code),
                };
                respond(&mut stream, &status, &headers, b"error");
                return;
            }
            match st.messages.iter().find(|m| m.id == id) {
                Some(m) => {
                    let body = m.body.clone();
                    respond(&mut stream, "200 OK", "Content-Type: text/plain\r\n", &body);
                }
                None => respond(&mut stream, "404 Not Found", "", b""),
            }
        }
        _ => respond(&mut stream, "404 Not Found", "", b""),
    }
}
