//! Map HTTP status codes and curl errors onto the access/download split.

use crate::error::Error;

/// `None` for 2xx; 403 is an access error; every other status is a download error.
pub fn classify_http_status(url: &str, code: u32) -> Option<Error> {
    match code {
        200..=299 => None,
        403 => Some(Error::access(url, "HTTP 403")),
        _ => Some(Error::download(url, format!("HTTP {}", code))),
    }
}

/// Login and permission refusals are access errors; TLS and everything else
/// are download errors.
pub fn classify_curl_error(url: &str, e: &curl::Error) -> Error {
    if e.is_login_denied() || e.is_remote_access_denied() {
        return Error::access(url, e);
    }
    if e.is_ssl_connect_error()
        || e.is_peer_failed_verification()
        || e.is_ssl_certproblem()
        || e.is_ssl_cipher()
        || e.is_ssl_cacert()
        || e.is_ssl_cacert_badfile()
        || e.is_ssl_engine_notfound()
    {
        return Error::download(url, format!("TLS failure: {}", e));
    }
    Error::download(url, e)
}
