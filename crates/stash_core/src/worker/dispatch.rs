//! Request pipeline: parse, resolve, then serve from cache or fetch.

use bytes::Bytes;
use stash_cache::{CacheEntry, CacheKey, CachePolicy, Revalidation};
use stash_http::{
    responses::{ok_response, send_bytes, send_error},
    ClientStream, ParsedRequest, ProxyError,
};
use stash_proxy::{OriginError, OriginResponse, ResolvedTarget};
use tracing::{debug, info, warn};

use crate::ProxyContext;

/// How a 200 sent to the client was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Hit,
    /// Origin confirmed the cached copy with a 304.
    Revalidated,
    Stored,
    /// 200 without `Last-Modified`; served but not cached.
    Uncached,
    /// Revalidation could not reach the origin.
    StaleIfError,
}

impl Outcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Revalidated => "revalidated",
            Outcome::Stored => "stored",
            Outcome::Uncached => "uncached",
            Outcome::StaleIfError => "stale_if_error",
        }
    }
}

/// The single response written back for a request.
#[derive(Debug)]
pub(crate) enum Reply {
    Ok {
        body: Bytes,
        last_modified: Option<String>,
        outcome: Outcome,
    },
    Passthrough(Bytes),
    Error(ProxyError),
}

impl Reply {
    fn from_entry(entry: CacheEntry, outcome: Outcome) -> Self {
        Reply::Ok {
            body: entry.body,
            last_modified: Some(entry.last_modified),
            outcome,
        }
    }

    /// Writes the reply. The caller owns shutting the stream down.
    pub(crate) async fn write_to(&self, stream: &mut dyn ClientStream) -> std::io::Result<()> {
        match self {
            Reply::Ok {
                body,
                last_modified,
                ..
            } => send_bytes(stream, &ok_response(body, last_modified.as_deref())).await,
            Reply::Passthrough(raw) => send_bytes(stream, raw).await,
            Reply::Error(e) => send_error(stream, e.status()).await,
        }
    }

    pub(crate) fn status_label(&self) -> String {
        match self {
            Reply::Ok { outcome, .. } => format!("200 {}", outcome.as_str()),
            Reply::Passthrough(_) => "passthrough".to_string(),
            Reply::Error(e) => e.status().code().to_string(),
        }
    }
}

/// Turns raw request bytes into the reply for the client.
pub(crate) async fn dispatch(raw: Bytes, ctx: &ProxyContext) -> Reply {
    match process(raw, ctx).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(
                target: "stash::worker",
                error = %e,
                status = e.status().code(),
                "Request failed"
            );
            Reply::Error(e)
        }
    }
}

async fn process(raw: Bytes, ctx: &ProxyContext) -> Result<Reply, ProxyError> {
    let req = ParsedRequest::parse(raw)?;

    if !req.is_get() {
        return Err(ProxyError::MethodNotAllowed(req.method.clone()));
    }

    let target = ctx.resolver.resolve(&req)?;
    let key = CacheKey::new(target.canonical_url.clone());

    debug!(
        target: "stash::worker",
        cache_key = %key,
        upstream = %target.addr(),
        "Resolved request target"
    );

    match ctx.cache.lookup(&key) {
        Some(entry) if ctx.revalidate_on_hit => {
            let request = req.to_conditional(&entry.last_modified);
            fetch_and_settle(ctx, &req, &target, &key, request, Some(entry)).await
        }
        Some(entry) => Ok(Reply::from_entry(entry, Outcome::Hit)),
        None => serve_miss(ctx, &req, &target, &key).await,
    }
}

async fn serve_miss(
    ctx: &ProxyContext,
    req: &ParsedRequest,
    target: &ResolvedTarget,
    key: &CacheKey,
) -> Result<Reply, ProxyError> {
    let _fetch_guard = if ctx.coalesce_misses {
        let guard = ctx.cache.acquire_fetch(key).await;
        if let Some(entry) = ctx.cache.lookup(key) {
            debug!(
                target: "stash::worker",
                cache_key = %key,
                "Entry stored by a concurrent fetch"
            );
            return Ok(Reply::from_entry(entry, Outcome::Hit));
        }
        Some(guard)
    } else {
        None
    };

    fetch_and_settle(ctx, req, target, key, req.origin_request(), None).await
}

/// Fetches from the origin and applies the answer to the cache.
///
/// `fallback` is the cached entry being revalidated, if any; it is served
/// when the origin cannot be reached. A 304 whose `Last-Modified` no longer
/// matches triggers one unconditional refetch.
async fn fetch_and_settle(
    ctx: &ProxyContext,
    req: &ParsedRequest,
    target: &ResolvedTarget,
    key: &CacheKey,
    first_request: Bytes,
    mut fallback: Option<CacheEntry>,
) -> Result<Reply, ProxyError> {
    let mut request = first_request;
    let mut refetched = false;

    loop {
        let resp = match ctx.origin.fetch(target, &request).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    target: "stash::worker",
                    cache_key = %key,
                    error = %e,
                    "Origin fetch failed"
                );
                if matches!(e, OriginError::Unreachable { .. })
                    && let Some(entry) = fallback.take()
                {
                    debug!(
                        target: "stash::worker",
                        cache_key = %key,
                        "Serving cached copy instead"
                    );
                    return Ok(Reply::from_entry(entry, Outcome::StaleIfError));
                }
                return e.into_passthrough().map(Reply::Passthrough);
            }
        };

        match settle(ctx, key, resp)? {
            Settled::Done(reply) => return Ok(reply),
            Settled::Stale if !refetched => {
                info!(
                    target: "stash::worker",
                    cache_key = %key,
                    "Cached copy is stale; refetching without validators"
                );
                refetched = true;
                fallback = None;
                request = req.to_unconditional();
            }
            Settled::Stale => return Err(ProxyError::CacheInconsistency(key.to_string())),
        }
    }
}

enum Settled {
    Done(Reply),
    Stale,
}

fn settle(ctx: &ProxyContext, key: &CacheKey, resp: OriginResponse) -> Result<Settled, ProxyError> {
    match resp.status {
        200 => {
            let last_modified = resp.last_modified().map(str::to_string);
            let outcome = match &last_modified {
                Some(lm) if CachePolicy::is_storable(resp.status, Some(lm.as_str())) => {
                    ctx.cache
                        .put(key.clone(), CacheEntry::new(resp.body.clone(), lm.clone()));
                    Outcome::Stored
                }
                _ => Outcome::Uncached,
            };
            Ok(Settled::Done(Reply::Ok {
                body: resp.body,
                last_modified,
                outcome,
            }))
        }
        304 => match ctx.cache.validate_and_refresh(key, resp.last_modified()) {
            Revalidation::Fresh(entry) => {
                Ok(Settled::Done(Reply::from_entry(entry, Outcome::Revalidated)))
            }
            Revalidation::Stale => Ok(Settled::Stale),
            Revalidation::Missing => Err(ProxyError::CacheInconsistency(key.to_string())),
        },
        status => {
            debug!(
                target: "stash::worker",
                cache_key = %key,
                status,
                status_line = %resp.status_line,
                "Passing origin response through"
            );
            Ok(Settled::Done(Reply::Passthrough(resp.raw)))
        }
    }
}
