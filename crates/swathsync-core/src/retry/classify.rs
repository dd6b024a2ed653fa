//! Classify HTTP status and curl errors into retry policy error kinds.

use super::error::AttemptError;
use super::policy::ErrorKind;

/// Classify an HTTP status code for retry decisions.
///
/// Only the gateway-style statuses 500, 502, 503 and 504 are retried.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        503 => ErrorKind::Throttled,
        500 | 502 | 504 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_ssl_connect_error()
        || e.is_http2_error()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify an attempt error into an ErrorKind.
pub fn classify(e: &AttemptError) -> ErrorKind {
    match e {
        AttemptError::Curl(ce) => classify_curl_error(ce),
        AttemptError::Http(code) => classify_http_status(*code),
        AttemptError::Storage(_) => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // libcurl error codes (CURLcode is unsigned on Unix)
    const COULDNT_CONNECT: u32 = 7;
    const PARTIAL_FILE: u32 = 18;
    const OPERATION_TIMEDOUT: u32 = 28;
    const URL_MALFORMAT: u32 = 3;

    #[test]
    fn gateway_statuses_retryable() {
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
        assert!(matches!(classify_http_status(504), ErrorKind::Http5xx(504)));
    }

    #[test]
    fn other_statuses_not_retried() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(401), ErrorKind::Other);
        assert_eq!(classify_http_status(501), ErrorKind::Other);
        assert_eq!(classify_http_status(429), ErrorKind::Other);
    }

    #[test]
    fn curl_transport_errors_retryable() {
        let timeout = AttemptError::Curl(curl::Error::new(OPERATION_TIMEDOUT));
        assert_eq!(classify(&timeout), ErrorKind::Timeout);
        let refused = AttemptError::Curl(curl::Error::new(COULDNT_CONNECT));
        assert_eq!(classify(&refused), ErrorKind::Connection);
        let short = AttemptError::Curl(curl::Error::new(PARTIAL_FILE));
        assert_eq!(classify(&short), ErrorKind::Connection);
    }

    #[test]
    fn malformed_url_and_storage_not_retried() {
        let bad_url = AttemptError::Curl(curl::Error::new(URL_MALFORMAT));
        assert_eq!(classify(&bad_url), ErrorKind::Other);
        let disk = AttemptError::Storage(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        assert_eq!(classify(&disk), ErrorKind::Other);
    }
}
