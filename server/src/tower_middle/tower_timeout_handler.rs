use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use tokio::time;
use tower::{Layer, Service};
use tracing::warn;

use crate::handlers::http::utils::{deliver_error_json, internal_error};

/// Tower layer bounding how long a handler may take to produce a response.
///
/// A handler that overruns is dropped and the client gets a JSON
/// 408 Request Timeout. Upgraded WebSocket streams are not affected: their
/// handler answers with 101 straight away and the stream lives on its own
/// task.
#[derive(Debug, Clone)]
pub struct RequestTimeoutLayer {
    duration: Duration,
}

impl RequestTimeoutLayer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl<S> Layer<S> for RequestTimeoutLayer {
    type Service = RequestTimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTimeoutService {
            inner,
            duration: self.duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestTimeoutService<S> {
    inner: S,
    duration: Duration,
}

impl<S, ReqBody> Service<Request<ReqBody>> for RequestTimeoutService<S>
where
    S: Service<Request<ReqBody>, Response = Response<BoxBody<Bytes, Infallible>>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let duration = self.duration;
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match time::timeout(duration, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} {} timed out after {:?}", method, path, duration);
                    Ok(deliver_error_json(
                        "REQUEST_TIMEOUT",
                        "The request took too long to process",
                        StatusCode::REQUEST_TIMEOUT,
                    )
                    .unwrap_or_else(|_| internal_error()))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::http::utils::full;
    use tower::{ServiceExt, service_fn};

    async fn call_with_delay(limit: Duration, delay: Duration) -> StatusCode {
        let inner = service_fn(move |_req: Request<()>| async move {
            time::sleep(delay).await;
            Ok::<_, Infallible>(Response::new(full("done")))
        });
        let svc = RequestTimeoutLayer::new(limit).layer(inner);
        svc.oneshot(Request::new(())).await.unwrap().status()
    }

    #[tokio::test]
    async fn fast_handler_passes_through() {
        let status = call_with_delay(Duration::from_millis(200), Duration::from_millis(1)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn slow_handler_gets_408() {
        let status = call_with_delay(Duration::from_millis(20), Duration::from_secs(5)).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    }
}
