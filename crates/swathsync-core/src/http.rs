//! HTTP transport over libcurl.
//!
//! `HttpClient` is the seam between the pipeline and the network: the catalog
//! uses `get` for manifest listings and the fetcher uses `download_to` to
//! stream a file body to disk. Both calls block; run them from
//! `spawn_blocking` when used from async code.
//!
//! `CurlClient` keeps one easy handle per OS thread and resets it between
//! requests, so libcurl's connection cache is reused by whichever blocking
//! worker picks up the next request.

use crate::retry::AttemptError;
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Buffer size for the streamed write to disk.
pub const WRITE_CHUNK_BYTES: usize = 64 * 1024;

/// Identity sent with every request: user agent plus optional bearer token.
#[derive(Clone, Default)]
pub struct RequestIdentity {
    pub user_agent: String,
    pub token: Option<String>,
}

impl RequestIdentity {
    pub fn new(user_agent: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            token,
        }
    }

    /// Extra header lines (`Name: value`); the user agent is set separately.
    pub fn header_lines(&self) -> Vec<String> {
        self.token
            .iter()
            .map(|t| format!("Authorization: Bearer {}", t))
            .collect()
    }
}

impl std::fmt::Debug for RequestIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestIdentity")
            .field("user_agent", &self.user_agent)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Buffered response for small bodies (manifest listings).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Blocking HTTP operations used by the pipeline.
pub trait HttpClient: Send + Sync + 'static {
    /// GET `url` and buffer the body. Any status is returned as `Ok`.
    fn get(&self, url: &str, identity: &RequestIdentity) -> Result<HttpResponse, AttemptError>;

    /// GET `url` and stream a 200 body into `dest`, creating parent directories.
    /// Returns the number of bytes written. A non-200 status yields
    /// `AttemptError::Http` and nothing is written. On error a partial file
    /// may remain; the caller owns cleanup.
    fn download_to(
        &self,
        url: &str,
        identity: &RequestIdentity,
        dest: &Path,
    ) -> Result<u64, AttemptError>;
}

/// Timeouts applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when no bytes arrive for this long (the per-attempt stall timeout).
    pub stall_timeout: Duration,
    /// Hard cap for one transfer, so a trickling connection eventually fails.
    pub transfer_timeout: Duration,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            stall_timeout: Duration::from_secs(60),
            transfer_timeout: Duration::from_secs(3600),
        }
    }
}

/// libcurl-backed client. Cheap to share behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CurlClient {
    opts: CurlOptions,
}

thread_local! {
    static HANDLE: RefCell<Option<curl::easy::Easy>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's reusable easy handle, reset to defaults.
fn with_handle<T>(
    f: impl FnOnce(&mut curl::easy::Easy) -> Result<T, AttemptError>,
) -> Result<T, AttemptError> {
    HANDLE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let easy = slot.get_or_insert_with(curl::easy::Easy::new);
        easy.reset();
        f(easy)
    })
}

/// Parse `HTTP/1.1 200 OK` (or `HTTP/2 200`) into the status code.
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// File sink created on first write (or at finish for empty bodies).
struct LazyFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl LazyFile {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
            written: 0,
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(w) => w,
            None => {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                BufWriter::with_capacity(WRITE_CHUNK_BYTES, File::create(&self.path)?)
            }
        };
        Ok(self.writer.insert(writer))
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer()?.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    fn finish(mut self) -> io::Result<u64> {
        let writer = self.writer()?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(self.written)
    }
}

impl CurlClient {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }

    fn prepare(
        &self,
        easy: &mut curl::easy::Easy,
        url: &str,
        identity: &RequestIdentity,
    ) -> Result<(), AttemptError> {
        easy.url(url).map_err(AttemptError::Curl)?;
        easy.get(true).map_err(AttemptError::Curl)?;
        easy.follow_location(true).map_err(AttemptError::Curl)?;
        easy.max_redirections(10).map_err(AttemptError::Curl)?;
        easy.connect_timeout(self.opts.connect_timeout)
            .map_err(AttemptError::Curl)?;
        easy.low_speed_limit(1).map_err(AttemptError::Curl)?;
        easy.low_speed_time(self.opts.stall_timeout)
            .map_err(AttemptError::Curl)?;
        easy.timeout(self.opts.transfer_timeout)
            .map_err(AttemptError::Curl)?;
        if !identity.user_agent.is_empty() {
            easy.useragent(&identity.user_agent)
                .map_err(AttemptError::Curl)?;
        }
        let lines = identity.header_lines();
        if !lines.is_empty() {
            let mut list = curl::easy::List::new();
            for line in &lines {
                list.append(line).map_err(AttemptError::Curl)?;
            }
            easy.http_headers(list).map_err(AttemptError::Curl)?;
        }
        Ok(())
    }
}

impl HttpClient for CurlClient {
    fn get(&self, url: &str, identity: &RequestIdentity) -> Result<HttpResponse, AttemptError> {
        with_handle(|easy| {
            self.prepare(easy, url, identity)?;
            let mut body = Vec::new();
            {
                let mut transfer = easy.transfer();
                transfer
                    .write_function(|data| {
                        body.extend_from_slice(data);
                        Ok(data.len())
                    })
                    .map_err(AttemptError::Curl)?;
                transfer.perform().map_err(AttemptError::Curl)?;
            }
            let status = easy.response_code().map_err(AttemptError::Curl)?;
            Ok(HttpResponse { status, body })
        })
    }

    fn download_to(
        &self,
        url: &str,
        identity: &RequestIdentity,
        dest: &Path,
    ) -> Result<u64, AttemptError> {
        with_handle(|easy| {
            self.prepare(easy, url, identity)?;
            let status = Cell::new(0u32);
            let mut sink = LazyFile::new(dest);
            let mut storage_error: Option<io::Error> = None;

            let mut transfer = easy.transfer();
            transfer
                .header_function(|line| {
                    if let Some(code) = parse_status_line(line) {
                        status.set(code);
                    }
                    true
                })
                .map_err(AttemptError::Curl)?;
            transfer
                .write_function(|data| {
                    // Error pages and redirect bodies are never written to disk.
                    if status.get() != 200 {
                        return Ok(data.len());
                    }
                    match sink.write(data) {
                        Ok(()) => Ok(data.len()),
                        Err(e) => {
                            storage_error = Some(e);
                            Ok(0) // abort transfer
                        }
                    }
                })
                .map_err(AttemptError::Curl)?;
            let performed = transfer.perform();
            drop(transfer);

            if let Err(e) = performed {
                if e.is_write_error() {
                    if let Some(io_err) = storage_error.take() {
                        return Err(AttemptError::Storage(io_err));
                    }
                }
                return Err(AttemptError::Curl(e));
            }

            let code = easy.response_code().map_err(AttemptError::Curl)?;
            if code != 200 {
                return Err(AttemptError::Http(code));
            }
            sink.finish().map_err(AttemptError::Storage)
        })
    }
}
