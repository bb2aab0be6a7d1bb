//! gRPC service implementation.
//!
//! Thin layer over the persistence crate: validates arguments, runs the
//! store operation off the async runtime and maps domain errors onto gRPC
//! status codes.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::error;

use burrow_api::convert::{duration_from_proto, timestamp_from_datetime};
use burrow_api::grpc::burrow_server::Burrow;
use burrow_api::grpc::{
    DeleteRequest, DeleteResponse, GetRequest, GetResponse, LockRequest, LockResponse, PutRequest,
    PutResponse, ReleaseRequest, ReleaseResponse,
};
use burrow_persistence::store::Substrate;
use burrow_persistence::{Keyspace, LockService, StoreError};

pub struct BurrowService<S: Substrate> {
    keyspace: Keyspace<S>,
    locks: Arc<LockService<S>>,
}

impl<S: Substrate> BurrowService<S> {
    pub fn new(keyspace: Keyspace<S>, locks: Arc<LockService<S>>) -> Self {
        BurrowService { keyspace, locks }
    }
}

/// Runs a store operation on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, Status>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(status_from_store),
        Err(e) => {
            error!(error = %e, "store task panicked");
            Err(Status::internal("internal error"))
        }
    }
}

fn status_from_store(err: StoreError) -> Status {
    match err {
        StoreError::NoBucket | StoreError::IncompatibleValue(_) => {
            Status::invalid_argument(err.to_string())
        }
        StoreError::BucketNotFound(_) | StoreError::LockNotFound => {
            Status::not_found(err.to_string())
        }
        StoreError::NotOwner => Status::permission_denied(err.to_string()),
        other => {
            error!(error = %other, "store operation failed");
            Status::internal("internal error")
        }
    }
}

#[tonic::async_trait]
impl<S: Substrate> Burrow for BurrowService<S> {
    async fn put(
        &self,
        request: Request<PutRequest>,
    ) -> Result<Response<PutResponse>, Status> {
        let request = request.into_inner();
        if request.buckets.is_empty() {
            return Err(Status::invalid_argument("at least one bucket required"));
        }
        if request.key.is_empty() {
            return Err(Status::invalid_argument("key can't be empty"));
        }
        if request.value.is_empty() {
            return Err(Status::invalid_argument("value is nil or empty"));
        }
        let keyspace = self.keyspace.clone();
        run_blocking(move || keyspace.put(&request.buckets, &request.key, &request.value)).await?;
        Ok(Response::new(PutResponse {}))
    }

    async fn get(
        &self,
        request: Request<GetRequest>,
    ) -> Result<Response<GetResponse>, Status> {
        let request = request.into_inner();
        if request.buckets.is_empty() {
            return Err(Status::invalid_argument("at least one bucket required"));
        }
        if request.key.is_empty() {
            return Err(Status::invalid_argument("key can't be empty"));
        }
        let keyspace = self.keyspace.clone();
        let value = run_blocking(move || keyspace.get(&request.buckets, &request.key)).await?;
        // An absent key is an empty value on the wire.
        Ok(Response::new(GetResponse {
            value: value.unwrap_or_default(),
        }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let request = request.into_inner();
        if request.buckets.is_empty() {
            return Err(Status::invalid_argument("at least one bucket required"));
        }
        if request.key.is_empty() {
            return Err(Status::invalid_argument("key can't be empty"));
        }
        let keyspace = self.keyspace.clone();
        run_blocking(move || keyspace.delete(&request.buckets, &request.key)).await?;
        Ok(Response::new(DeleteResponse {}))
    }

    async fn claim_lock(
        &self,
        request: Request<LockRequest>,
    ) -> Result<Response<LockResponse>, Status> {
        let request = request.into_inner();
        if request.key.is_empty() {
            return Err(Status::invalid_argument("missing key argument"));
        }
        if request.who.is_empty() {
            return Err(Status::invalid_argument("missing who argument"));
        }
        let ttl = match request.ttl {
            Some(proto) => Some(
                duration_from_proto(&proto)
                    .ok_or_else(|| Status::invalid_argument("ttl must not be negative"))?,
            ),
            None => None,
        };
        let locks = Arc::clone(&self.locks);
        let (record, acquired) =
            run_blocking(move || locks.claim(&request.key, &request.who, ttl)).await?;
        Ok(Response::new(LockResponse {
            acquired,
            owner: record.owner,
            created_at: Some(timestamp_from_datetime(record.created_at)),
            valid_until: Some(timestamp_from_datetime(record.valid_until)),
        }))
    }

    async fn release_lock(
        &self,
        request: Request<ReleaseRequest>,
    ) -> Result<Response<ReleaseResponse>, Status> {
        let request = request.into_inner();
        if request.key.is_empty() {
            return Err(Status::invalid_argument("missing key argument"));
        }
        if request.who.is_empty() {
            return Err(Status::invalid_argument("missing who argument"));
        }
        let locks = Arc::clone(&self.locks);
        run_blocking(move || locks.release(&request.key, &request.who)).await?;
        Ok(Response::new(ReleaseResponse {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_persistence::RedbStore;
    use std::time::Duration;

    fn service() -> (tempfile::TempDir, BurrowService<RedbStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RedbStore::open(dir.path().join("test.redb")).unwrap());
        let keyspace = Keyspace::new(Arc::clone(&store));
        let locks = Arc::new(LockService::new(store, Duration::from_secs(300)));
        (dir, BurrowService::new(keyspace, locks))
    }

    fn put_request(buckets: &[&str], key: &str, value: &[u8]) -> Request<PutRequest> {
        Request::new(PutRequest {
            buckets: buckets.iter().map(|s| s.to_string()).collect(),
            key: key.to_string(),
            value: value.to_vec(),
        })
    }

    #[tokio::test]
    async fn test_put_get_delete_round_trip() {
        let (_dir, svc) = service();
        svc.put(put_request(&["app"], "k", b"v")).await.unwrap();

        let got = svc
            .get(Request::new(GetRequest {
                buckets: vec!["app".to_string()],
                key: "k".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(got.value, b"v");

        svc.delete(Request::new(DeleteRequest {
            buckets: vec!["app".to_string()],
            key: "k".to_string(),
        }))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_put_validation() {
        let (_dir, svc) = service();
        let err = svc.put(put_request(&[], "k", b"v")).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
        let err = svc.put(put_request(&["app"], "", b"v")).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
        let err = svc.put(put_request(&["app"], "k", b"")).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_unknown_bucket_is_not_found() {
        let (_dir, svc) = service();
        let err = svc
            .get(Request::new(GetRequest {
                buckets: vec!["nope".to_string()],
                key: "k".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_key_naming_bucket_is_invalid_argument() {
        let (_dir, svc) = service();
        svc.put(put_request(&["app", "sub"], "k", b"v")).await.unwrap();
        let err = svc
            .get(Request::new(GetRequest {
                buckets: vec!["app".to_string()],
                key: "sub".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_lock_claim_and_release() {
        let (_dir, svc) = service();
        let granted = svc
            .claim_lock(Request::new(LockRequest {
                key: "job".to_string(),
                who: "worker-1".to_string(),
                ttl: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(granted.acquired);
        assert_eq!(granted.owner, "worker-1");
        assert!(granted.created_at.is_some());
        assert!(granted.valid_until.is_some());

        let denied = svc
            .claim_lock(Request::new(LockRequest {
                key: "job".to_string(),
                who: "worker-2".to_string(),
                ttl: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!denied.acquired);
        assert_eq!(denied.owner, "worker-1");

        let err = svc
            .release_lock(Request::new(ReleaseRequest {
                key: "job".to_string(),
                who: "worker-2".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);

        svc.release_lock(Request::new(ReleaseRequest {
            key: "job".to_string(),
            who: "worker-1".to_string(),
        }))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_release_unknown_lock_is_not_found() {
        let (_dir, svc) = service();
        let err = svc
            .release_lock(Request::new(ReleaseRequest {
                key: "nope".to_string(),
                who: "worker-1".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_negative_ttl_rejected() {
        let (_dir, svc) = service();
        let err = svc
            .claim_lock(Request::new(LockRequest {
                key: "job".to_string(),
                who: "worker-1".to_string(),
                ttl: Some(prost_types::Duration {
                    seconds: -5,
                    nanos: 0,
                }),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_lock_validation() {
        let (_dir, svc) = service();
        let err = svc
            .claim_lock(Request::new(LockRequest {
                key: String::new(),
                who: "worker-1".to_string(),
                ttl: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
        let err = svc
            .release_lock(Request::new(ReleaseRequest {
                key: "job".to_string(),
                who: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
