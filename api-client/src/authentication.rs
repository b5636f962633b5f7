//! Authentication for API clients.
//!
//! The `Authentication` trait is used to authenticate with an API queried via the `ApiClient`.
//!
//! Two implementations are provided:
//! - `BearerAuth` for Bearer token authentication
//! - `()` for no authentication, e.g. when requests carry their own signature

use std::sync::Arc;

use http::HeaderValue;
use secret::Secret;
use tower::layer::Layer;

/// Trait to represent authenticating with an API queried via an [`crate::ApiClient`].
pub trait Authentication {
    /// Called by the `ApiClient` to implement authorization.
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B>;
}

/// Authentication with a bearer token, often used with an API key.
///
/// The token is stored as a [Secret] to prevent it from being logged.
///
/// # Example
/// ```rust
/// use api_client::BearerAuth;
///
/// let key = "my-secret";
/// let auth = BearerAuth::new(key);
/// let header = auth.header_value().unwrap();
///
/// assert_eq!(header.to_str().unwrap(), "Bearer my-secret");
/// ```
#[derive(Debug, Clone)]
pub struct BearerAuth(Secret);

impl BearerAuth {
    /// Create a new Bearer authentication with a given key.
    pub fn new<K: Into<Secret>>(key: K) -> Self {
        BearerAuth(key.into())
    }

    /// Get the header value for the Bearer token.
    ///
    /// Returns `None` when the token contains bytes that are not allowed in a header.
    pub fn header_value(&self) -> Option<HeaderValue> {
        self.0.bearer().ok()
    }
}

impl Authentication for BearerAuth {
    fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        if req.headers().contains_key(http::header::AUTHORIZATION) {
            tracing::warn!("{} header already set", http::header::AUTHORIZATION);
            return req;
        }

        match self.header_value() {
            Some(value) => {
                req.headers_mut().append(http::header::AUTHORIZATION, value);
            }
            None => tracing::warn!("bearer token is not a valid header value, sending without it"),
        }
        req
    }
}

impl Authentication for () {
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B> {
        req
    }
}

/// A layer which authenticates every request passing through it.
#[derive(Debug)]
pub struct AuthenticationLayer<A> {
    auth: Arc<A>,
}

impl<A> Clone for AuthenticationLayer<A> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
        }
    }
}

impl<A> AuthenticationLayer<A> {
    /// Authenticate requests with `auth`.
    pub fn new(auth: A) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }
}

impl<A, S> Layer<S> for AuthenticationLayer<A> {
    type Service = AuthenticationService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

/// Service produced by [`AuthenticationLayer`].
#[derive(Debug)]
pub struct AuthenticationService<A, S> {
    inner: S,
    auth: Arc<A>,
}

impl<A, S: Clone> Clone for AuthenticationService<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<A, S, BIn, BOut> tower::Service<http::Request<BIn>> for AuthenticationService<A, S>
where
    A: Authentication,
    S: tower::Service<http::Request<BIn>, Response = http::Response<BOut>>,
{
    type Response = http::Response<BOut>;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<BIn>) -> Self::Future {
        let req = self.auth.authenticate(req);
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_sets_authorization() {
        let req = http::Request::get("https://api.github.com/")
            .body(())
            .unwrap();
        let req = BearerAuth::new("ghp_token").authenticate(req);

        let value = req.headers().get(http::header::AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer ghp_token");
        assert!(value.is_sensitive());
    }

    #[test]
    fn bearer_keeps_existing_authorization() {
        let req = http::Request::get("https://api.github.com/")
            .header(http::header::AUTHORIZATION, "token other")
            .body(())
            .unwrap();
        let req = BearerAuth::new("ghp_token").authenticate(req);

        let values: Vec<_> = req
            .headers()
            .get_all(http::header::AUTHORIZATION)
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["token other"]);
    }

    #[test]
    fn unit_auth_is_passthrough() {
        let req = http::Request::get("https://example.com/").body(()).unwrap();
        let req = ().authenticate(req);
        assert!(req.headers().is_empty());
    }
}
