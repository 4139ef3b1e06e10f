use futures::Future;
use http::{header, HeaderValue, Request, Response};
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Marks every API response as uncacheable.
///
/// A cached `/status` answer would hand the client a stale resume point, so the upload
/// routes are wrapped in this layer. Handlers that set their own `Cache-Control` keep it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadLayer;

impl<S> Layer<S> for UploadLayer {
    type Service = UploadService<S>;

    fn layer(&self, service: S) -> Self::Service {
        UploadService { service }
    }
}

#[derive(Debug, Clone)]
pub struct UploadService<S> {
    service: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for UploadService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let fut = self.service.call(request);

        Box::pin(async move {
            let mut response = fut.await?;

            response
                .headers_mut()
                .entry(header::CACHE_CONTROL)
                .or_insert(HeaderValue::from_static("no-store"));

            Ok(response)
        })
    }
}
