//! Static token authentication for incoming gRPC calls.
//!
//! When a token is configured, every request must carry it in the `token`
//! metadata key. Without a configured token the interceptor lets everything
//! through.

use tonic::service::Interceptor;
use tonic::{Request, Status};
use tracing::warn;

#[derive(Clone)]
pub struct TokenInterceptor {
    token: Option<String>,
}

impl TokenInterceptor {
    pub fn new(token: Option<String>) -> Self {
        TokenInterceptor { token }
    }
}

impl Interceptor for TokenInterceptor {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let Some(expected) = self.token.as_deref() else {
            return Ok(request);
        };
        match request.metadata().get("token") {
            Some(value) if value.as_bytes() == expected.as_bytes() => Ok(request),
            Some(_) => {
                warn!("request with invalid token rejected");
                Err(Status::unauthenticated("invalid token"))
            }
            None => Err(Status::unauthenticated("missing token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_token(token: &str) -> Request<()> {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("token", token.parse().unwrap());
        request
    }

    #[test]
    fn test_no_token_configured_allows_all() {
        let mut interceptor = TokenInterceptor::new(None);
        assert!(interceptor.call(Request::new(())).is_ok());
    }

    #[test]
    fn test_valid_token_accepted() {
        let mut interceptor = TokenInterceptor::new(Some("secret".to_string()));
        assert!(interceptor.call(request_with_token("secret")).is_ok());
    }

    #[test]
    fn test_invalid_token_rejected() {
        let mut interceptor = TokenInterceptor::new(Some("secret".to_string()));
        let err = interceptor.call(request_with_token("wrong")).unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut interceptor = TokenInterceptor::new(Some("secret".to_string()));
        let err = interceptor.call(Request::new(())).unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }
}
