//! Blocking curl transfers. Call from `spawn_blocking` when used from async code.

use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str;
use std::time::Duration;

use super::classify::{parse_retry_after, parse_status_line};

#[derive(Debug, Clone)]
pub(super) struct ClientSettings {
    pub token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

/// Status and (for in-memory fetches) body of a finished transfer.
#[derive(Debug)]
pub(super) struct Response {
    pub code: u32,
    pub body: Vec<u8>,
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
pub(super) enum TransferError {
    Curl(curl::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Io(e) => write!(f, "storage: {}", e),
        }
    }
}

impl From<curl::Error> for TransferError {
    fn from(e: curl::Error) -> Self {
        TransferError::Curl(e)
    }
}

fn prepare(url: &str, settings: &ClientSettings) -> Result<curl::easy::Easy, curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(settings.connect_timeout)?;
    easy.timeout(settings.request_timeout)?;
    if let Some(token) = &settings.token {
        let mut list = curl::easy::List::new();
        list.append(&format!("Authorization: Bearer {}", token.trim()))?;
        easy.http_headers(list)?;
    }
    Ok(easy)
}

/// Tracks the last status line and `Retry-After` across redirects.
fn on_header(data: &[u8], status: &Cell<u32>, retry_after: &Cell<Option<Duration>>) {
    let Ok(line) = str::from_utf8(data) else {
        return;
    };
    let line = line.trim_end();
    if let Some(code) = parse_status_line(line) {
        status.set(code);
        retry_after.set(None);
    } else if let Some((name, value)) = line.split_once(':') {
        if name.trim().eq_ignore_ascii_case("retry-after") {
            retry_after.set(parse_retry_after(value));
        }
    }
}

/// GET `url` into memory.
pub(super) fn get(url: &str, settings: &ClientSettings) -> Result<Response, TransferError> {
    let mut easy = prepare(url, settings)?;
    let status = Cell::new(0u32);
    let retry_after = Cell::new(None);
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            on_header(data, &status, &retry_after);
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    Ok(Response {
        code,
        body,
        retry_after: retry_after.get(),
    })
}

/// GET `url`, streaming a 2xx body into `dest`. Non-2xx bodies are discarded
/// and `dest` is left untouched.
pub(super) fn get_to_file(url: &str, dest: &Path, settings: &ClientSettings) -> Result<Response, TransferError> {
    let mut easy = prepare(url, settings)?;
    let status = Cell::new(0u32);
    let retry_after = Cell::new(None);
    let mut file: Option<File> = None;
    let mut io_error: Option<std::io::Error> = None;
    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            on_header(data, &status, &retry_after);
            true
        })?;
        transfer.write_function(|data| {
            if !(200..300).contains(&status.get()) {
                return Ok(data.len());
            }
            if file.is_none() {
                match File::create(dest) {
                    Ok(f) => file = Some(f),
                    Err(e) => {
                        io_error = Some(e);
                        return Ok(0);
                    }
                }
            }
            let Some(f) = file.as_mut() else {
                return Ok(0);
            };
            match f.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    io_error = Some(e);
                    Ok(0)
                }
            }
        })?;
        transfer.perform()
    };
    if let Some(e) = io_error {
        return Err(TransferError::Io(e));
    }
    perform_result?;
    let code = easy.response_code()?;
    if (200..300).contains(&code) {
        match file.as_mut() {
            Some(f) => f.flush().map_err(TransferError::Io)?,
            None => {
                File::create(dest).map_err(TransferError::Io)?;
            }
        }
    }
    Ok(Response {
        code,
        body: Vec::new(),
        retry_after: retry_after.get(),
    })
}
