//! MIME type and charset extraction from `Content-Type` values.

use url::Url;

/// The part before the first `;`, e.g. `text/html` from `text/html; charset=UTF-8`.
pub fn mime_of(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim();
    (!mime.is_empty()).then(|| mime.to_string())
}

/// What follows the first `=` of the parameter after the first `;`.
///
/// Only that one parameter is looked at: `text/html; charset=UTF-8` gives
/// `UTF-8`, `text/plain` and `text/plain; format` give nothing.
pub fn charset_of(content_type: &str) -> Option<String> {
    let param = content_type.split(';').nth(1)?;
    let (_, value) = param.split_once('=')?;
    let value = value.trim().trim_matches('"');
    (!value.is_empty()).then(|| value.to_string())
}

/// Guesses a MIME type from the extension of the URL's path.
pub fn guess_from_url(url: &Url) -> Option<String> {
    mime_guess::from_path(url.path())
        .first_raw()
        .map(str::to_string)
}
