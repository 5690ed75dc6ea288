//! One HTTP GET attempt that appends the response body to a `.part` file.

use curl::easy::Easy;
use std::cell::Cell;
use std::str;
use std::time::Duration;

use super::error::FetchError;
use crate::control::CancelToken;
use crate::storage::StorageWriter;

/// How a transfer attempt ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transferred {
    /// A 200 or 206 body was written in full.
    Body,
    /// The server answered 416 for a range starting at the end of the file.
    AlreadyComplete,
}

/// GETs `url` into `writer`, asking for the bytes after `writer.len()`.
///
/// A 200 answer to a range request restarts the file from zero. Bodies of
/// redirects and error responses are discarded. `received` is increased by
/// every body byte written, including those of a failed attempt.
pub(crate) fn transfer(
    easy: &mut Easy,
    url: &str,
    writer: &mut StorageWriter,
    timeout: Duration,
    cancel: &CancelToken,
    received: &mut u64,
) -> Result<Transferred, FetchError> {
    let offset = writer.len();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(timeout)?;
    // Stall timeout: abort when nothing arrives for `timeout`.
    easy.low_speed_limit(1)?;
    easy.low_speed_time(timeout)?;
    easy.useragent(concat!("msv6/", env!("CARGO_PKG_VERSION")))?;
    easy.progress(true)?;
    if offset > 0 {
        easy.range(&format!("{offset}-"))?;
    }

    let status = Cell::new(0u32);
    let total = Cell::new(None::<u64>);
    let mut storage_error: Option<std::io::Error> = None;
    let mut body_started = false;

    let perform_result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            let Ok(line) = str::from_utf8(line) else {
                return true;
            };
            if let Some(code) = parse_status_line(line) {
                status.set(code);
                total.set(None);
            } else if let Some(len) = parse_content_range_total(line) {
                total.set(Some(len));
            }
            true
        })?;
        transfer.write_function(|data| {
            if cancel.is_cancelled() {
                return Ok(0);
            }
            let code = status.get();
            if code != 200 && code != 206 {
                return Ok(data.len());
            }
            if code == 200 && writer.len() > 0 && !body_started {
                tracing::debug!(url, offset, "server ignored range request, restarting");
                if let Err(e) = writer.restart() {
                    storage_error = Some(e);
                    return Ok(0);
                }
            }
            body_started = true;
            match writer.append(data) {
                Ok(()) => {
                    *received += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    storage_error = Some(e);
                    Ok(0)
                }
            }
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.perform()
    };

    if let Err(e) = perform_result {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if e.is_write_error() {
            if let Some(io_err) = storage_error.take() {
                return Err(FetchError::Storage(io_err));
            }
        }
        return Err(FetchError::from(e));
    }

    let code = easy.response_code()?;
    match code {
        200 | 206 => Ok(Transferred::Body),
        416 if offset > 0 && total.get().map_or(true, |len| len == offset) => Ok(Transferred::AlreadyComplete),
        other => Err(FetchError::Http(other)),
    }
}

/// `HTTP/1.1 206 Partial Content` → 206.
fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// Total length from `Content-Range: bytes a-b/N` or `bytes */N`.
fn parse_content_range_total(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-range") {
        return None;
    }
    let (_, len) = value.trim().rsplit_once('/')?;
    len.trim().parse().ok()
}
