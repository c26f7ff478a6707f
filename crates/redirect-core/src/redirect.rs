// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Registry path rewriting.
//!
//! Maps requests for `example.dev/<prefix>/<name>` onto the upstream
//! registry, e.g. `ghcr.io/<repo>/<name>`. Rewriting is a pure function of the
//! request line; [`Redirector::handle`] only adds the response and a log line.

use std::convert::Infallible;
use std::future::{ready, Ready};
use std::task::{Context, Poll};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use tower::Service;
use tracing::info;
use url::form_urlencoded;

use crate::config::RedirectConfig;

/// Response body used by the redirect service.
pub type Body = Full<Bytes>;

const TOKEN_PATH: &str = "/token";

/// Outcome of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Landing page redirect (302).
    Home(String),
    /// Registry API version check (200).
    ApiVersion,
    /// Registry API redirect (307), preserving the method.
    Registry(String),
    NotFound,
}

impl Route {
    pub fn status(&self) -> StatusCode {
        match self {
            Route::Home(_) => StatusCode::FOUND,
            Route::ApiVersion => StatusCode::OK,
            Route::Registry(_) => StatusCode::TEMPORARY_REDIRECT,
            Route::NotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Route::Home(location) | Route::Registry(location) => Some(location),
            Route::ApiVersion | Route::NotFound => None,
        }
    }
}

/// Rewrites registry requests to the configured upstream.
#[derive(Debug, Clone)]
pub struct Redirector {
    host: String,
    repo: String,
    prefix: String,
}

impl Redirector {
    /// `repo` and `prefix` may be empty; surrounding slashes are ignored.
    pub fn new(host: impl Into<String>, repo: &str, prefix: &str) -> Self {
        Self {
            host: host.into(),
            repo: repo.trim_matches('/').to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &RedirectConfig) -> Self {
        Self::new(config.registry_host(), &config.repo, &config.prefix)
    }

    /// Map a user-visible repository name onto the upstream one.
    pub fn rewrite_name(&self, name: &str) -> String {
        let name = name.trim_matches('/');
        let name = if self.prefix.is_empty() {
            name
        } else if name == self.prefix {
            ""
        } else {
            name.strip_prefix(&format!("{}/", self.prefix))
                .unwrap_or(name)
        };
        match (self.repo.is_empty(), name.is_empty()) {
            (true, _) => name.to_string(),
            (false, true) => self.repo.clone(),
            (false, false) => format!("{}/{}", self.repo, name),
        }
    }

    pub fn route(&self, method: &Method, path: &str, query: Option<&str>) -> Route {
        if path == "/" && (method == Method::GET || method == Method::HEAD) {
            return Route::Home(self.home());
        }
        if path == "/v2" || path == "/v2/" {
            return Route::ApiVersion;
        }
        if let Some(rest) = path.strip_prefix("/v2/") {
            return match split_api_suffix(rest) {
                Some((name, suffix)) => {
                    let mut location =
                        format!("https://{}/v2/{}/{}", self.host, self.rewrite_name(name), suffix);
                    if let Some(query) = query.filter(|q| !q.is_empty()) {
                        location.push('?');
                        location.push_str(query);
                    }
                    Route::Registry(location)
                }
                None => Route::NotFound,
            };
        }
        if path == TOKEN_PATH {
            let mut location = format!("https://{}{}", self.host, TOKEN_PATH);
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                location.push('?');
                location.push_str(&self.rewrite_token_query(query));
            }
            return Route::Registry(location);
        }
        Route::NotFound
    }

    /// Route `req`, log it and build the response.
    pub fn handle<B>(&self, req: &Request<B>) -> Response<Body> {
        let route = self.route(req.method(), req.uri().path(), req.uri().query());
        let status = route.status();
        info!(
            method = %req.method(),
            path = req.uri().path(),
            status = status.as_u16(),
            location = route.location().unwrap_or(""),
            "Received request"
        );

        let mut response = Response::new(Body::default());
        *response.status_mut() = status;
        if let Some(location) = route.location() {
            // Locations are built from the request URI, which is already
            // restricted to visible ASCII.
            if let Ok(value) = HeaderValue::from_str(location) {
                response.headers_mut().insert(LOCATION, value);
            }
        }
        response
    }

    fn home(&self) -> String {
        if self.repo.is_empty() {
            format!("https://{}", self.host)
        } else {
            format!("https://github.com/{}", self.repo)
        }
    }

    /// Rewrite the repository of every `repository:<name>:<actions>` scope.
    ///
    /// A `scope` parameter may repeat and may hold several space-separated
    /// scopes. Other parameters keep their values.
    fn rewrite_token_query(&self, query: &str) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key == "scope" {
                let scopes = value
                    .split(' ')
                    .map(|scope| self.rewrite_scope(scope))
                    .collect::<Vec<_>>()
                    .join(" ");
                serializer.append_pair(&key, &scopes);
            } else {
                serializer.append_pair(&key, &value);
            }
        }
        serializer.finish()
    }

    fn rewrite_scope(&self, scope: &str) -> String {
        let mut parts = scope.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("repository"), Some(name), Some(actions)) => {
                format!("repository:{}:{}", self.rewrite_name(name), actions)
            }
            _ => scope.to_string(),
        }
    }
}

/// Split `<name>/<manifests|blobs|tags|referrers>/...` into name and suffix.
fn split_api_suffix(rest: &str) -> Option<(&str, &str)> {
    const MARKERS: [&str; 4] = ["/manifests/", "/blobs/", "/tags/", "/referrers/"];
    MARKERS
        .iter()
        .filter_map(|marker| rest.find(marker))
        .min()
        .map(|idx| (&rest[..idx], &rest[idx + 1..]))
        .filter(|(name, _)| !name.is_empty())
}

impl<B> Service<Request<B>> for Redirector {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        ready(Ok(self.handle(&req)))
    }
}
