//! Parsing API URLs and building endpoint paths beneath them.

use camino::Utf8Path;
use http::uri::PathAndQuery;
use http::Uri;
use thiserror::Error;
use url::Url;

/// A string which is not usable as an absolute API URL.
#[derive(Debug, Error)]
pub enum ParseUriError {
    /// Not a URL at all.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// A URL with no path hierarchy, like `mailto:`, which endpoints cannot join onto.
    #[error("cannot be a base URL: {0}")]
    CannotBeABase(Url),

    /// A valid URL that `http` still rejects.
    #[error("invalid URI: {0}")]
    Invalid(#[from] http::uri::InvalidUri),
}

/// Parse an absolute URL.
///
/// Parsing goes through [`Url`] first, so the result is normalized
/// (lower-cased scheme and host, a `/` path at minimum).
pub fn parse_absolute(input: &str) -> Result<Uri, ParseUriError> {
    let url = Url::parse(input)?;
    if url.cannot_be_a_base() {
        return Err(ParseUriError::CannotBeABase(url));
    }
    Ok(url.as_str().parse()?)
}

/// Place `path` beneath the path of `base`, dropping any query on `base`.
///
/// An absolute `path` replaces the base path outright.
pub fn join(base: &Uri, path: &str) -> Uri {
    let mut parts = base.clone().into_parts();

    let dir = parts
        .path_and_query
        .as_ref()
        .map_or("/", PathAndQuery::path);
    let joined = Utf8Path::new(dir).join(path);
    parts.path_and_query = PathAndQuery::from_maybe_shared(joined.into_string()).ok();

    Uri::from_parts(parts).unwrap_or_else(|_| base.clone())
}
