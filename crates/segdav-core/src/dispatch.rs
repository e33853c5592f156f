use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::DavError;
use crate::ingest::PutIngestor;
use crate::lock::LockManager;
use crate::multistatus::{lock_discovery, multistatus, MultistatusEntry};
use crate::resource::ResourceRegistry;

/// Methods this layer serves, advertised via OPTIONS.
pub const ALLOWED_METHODS: &str = "OPTIONS, GET, PUT, PROPFIND, LOCK, UNLOCK";

/// DAV compliance classes advertised via OPTIONS.
pub const DAV_COMPLIANCE: &str = "1,2";

/// PROPFIND depth, parsed from the `Depth` request header.
///
/// With a one-level tree, `Infinity` and `One` list the same entries;
/// only `Zero` restricts a collection to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Depth {
    Zero,
    One,
    #[default]
    Infinity,
}

impl Depth {
    /// Parse a `Depth` header value. Absent or unrecognized values fall
    /// back to `Infinity`, the RFC 4918 default for PROPFIND.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("0") => Depth::Zero,
            Some("1") => Depth::One,
            _ => Depth::Infinity,
        }
    }
}

/// A transport-agnostic view of one incoming request.
#[derive(Debug, Clone)]
pub struct DavRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub depth: Depth,
    /// Token presented in the `Lock-Token` header, already unwrapped
    /// from `<opaquelocktoken:...>`.
    pub lock_token: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> DavRequest<'a> {
    pub fn new(method: &'a str, path: &'a str) -> Self {
        Self {
            method,
            path,
            depth: Depth::default(),
            lock_token: None,
            body: &[],
        }
    }

    /// Unwrap a `Lock-Token` header value: `<opaquelocktoken:TOKEN>`
    /// yields `TOKEN`; a bare token passes through unchanged.
    pub fn parse_lock_token(raw: &str) -> &str {
        let raw = raw.trim();
        raw.strip_prefix("<opaquelocktoken:")
            .and_then(|rest| rest.strip_suffix('>'))
            .unwrap_or(raw)
    }
}

/// Response descriptor handed back to the transport.
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

impl DavResponse {
    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    fn xml(status: u16, body: String) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/xml".to_string())],
            body: Some(body),
        }
    }
}

/// What the transport should do with a handled request.
#[derive(Debug, Clone)]
pub enum Dispatch {
    Respond(DavResponse),
    /// Plain GET for a known resource: hand the request to the static
    /// file layer.
    Delegate,
}

/// Entry point of the protocol layer: routes `(method, path)` to the
/// resource model, lock manager, or put ingestor.
///
/// Stateless across requests; all persistent state lives behind the
/// injected collaborators.
pub struct Dispatcher {
    registry: Arc<dyn ResourceRegistry>,
    locks: LockManager,
    ingestor: PutIngestor,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<dyn ResourceRegistry>,
        locks: LockManager,
        ingestor: PutIngestor,
    ) -> Self {
        Self {
            registry,
            locks,
            ingestor,
        }
    }

    #[instrument(skip(self, request), fields(method = request.method, path = request.path))]
    pub async fn handle(&self, request: DavRequest<'_>) -> Result<Dispatch, DavError> {
        match request.method {
            "OPTIONS" => Ok(Dispatch::Respond(self.options())),
            "PROPFIND" => self.propfind(request.path, request.depth).map(Dispatch::Respond),
            "LOCK" => self.lock(request.path).await.map(Dispatch::Respond),
            "UNLOCK" => Ok(Dispatch::Respond(
                self.unlock(request.path, request.lock_token).await,
            )),
            "GET" => self.get(request.path),
            "PUT" => self.put(request.path, request.body).await.map(Dispatch::Respond),
            other => Err(DavError::MethodNotAllowed(other.to_string())),
        }
    }

    fn options(&self) -> DavResponse {
        DavResponse {
            status: 200,
            headers: vec![
                ("Allow", ALLOWED_METHODS.to_string()),
                ("DAV", DAV_COMPLIANCE.to_string()),
            ],
            body: None,
        }
    }

    fn propfind(&self, path: &str, depth: Depth) -> Result<DavResponse, DavError> {
        let resource = self
            .registry
            .lookup(path)
            .ok_or_else(|| DavError::NotFound(path.to_string()))?;

        let mut entries = vec![MultistatusEntry::ok(resource)];
        if resource.is_collection && depth != Depth::Zero {
            entries.extend(self.registry.children().iter().map(MultistatusEntry::ok));
        }

        debug!("PROPFIND {} listing {} entries", path, entries.len());
        Ok(DavResponse::xml(207, multistatus(&entries)))
    }

    async fn lock(&self, path: &str) -> Result<DavResponse, DavError> {
        let token = self.locks.lock(path).await?;
        let mut response = DavResponse::xml(200, lock_discovery(&token.token));
        response
            .headers
            .push(("Lock-Token", format!("<opaquelocktoken:{}>", token.token)));
        Ok(response)
    }

    async fn unlock(&self, path: &str, token: Option<&str>) -> DavResponse {
        // Idempotent on the wire: 204 whether or not anything was held.
        self.locks.unlock(path, token.unwrap_or_default()).await;
        DavResponse::empty(204)
    }

    fn get(&self, path: &str) -> Result<Dispatch, DavError> {
        if self.registry.lookup(path).is_some() {
            Ok(Dispatch::Delegate)
        } else {
            Err(DavError::NotFound(path.to_string()))
        }
    }

    async fn put(&self, path: &str, body: &[u8]) -> Result<DavResponse, DavError> {
        self.ingestor.put(path, body).await?;
        Ok(DavResponse::empty(201))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobStore;
    use crate::error::StoreError;
    use crate::lock::{
        LockPolicy, LockRecord, LockStore, ReleaseOutcome, UuidTokenSource, DEFAULT_LOCK_TTL,
    };
    use crate::resource::StaticRegistry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestBlobStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStore for TestBlobStore {
        fn store_name(&self) -> &'static str {
            "test"
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.blobs.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
            self.blobs
                .lock()
                .unwrap()
                .insert(key.to_string(), bytes.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestLockStore {
        records: Mutex<HashMap<String, LockRecord>>,
    }

    #[async_trait]
    impl LockStore for TestLockStore {
        async fn try_insert(&self, path: &str, record: LockRecord) -> Result<bool, StoreError> {
            let mut records = self.records.lock().unwrap();
            let now = chrono::Utc::now().timestamp();
            if records.get(path).is_some_and(|r| r.is_active(now)) {
                return Ok(false);
            }
            records.insert(path.to_string(), record);
            Ok(true)
        }

        async fn put(&self, path: &str, record: LockRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .unwrap()
                .insert(path.to_string(), record);
            Ok(())
        }

        async fn remove(&self, path: &str, token: &str) -> Result<ReleaseOutcome, StoreError> {
            let mut records = self.records.lock().unwrap();
            match records.get(path) {
                Some(r) if r.token == token => {
                    records.remove(path);
                    Ok(ReleaseOutcome::Released)
                }
                _ => Ok(ReleaseOutcome::NoSuchLock),
            }
        }
    }

    fn dispatcher_with(policy: LockPolicy) -> (Dispatcher, Arc<TestBlobStore>) {
        let blobs = Arc::new(TestBlobStore::default());
        let locks = LockManager::new(
            Arc::new(TestLockStore::default()),
            Arc::new(UuidTokenSource),
            policy,
            DEFAULT_LOCK_TTL,
        );
        let dispatcher = Dispatcher::new(
            Arc::new(StaticRegistry::with_defaults()),
            locks,
            PutIngestor::with_defaults(blobs.clone()),
        );
        (dispatcher, blobs)
    }

    fn dispatcher() -> (Dispatcher, Arc<TestBlobStore>) {
        dispatcher_with(LockPolicy::Exclusive)
    }

    fn respond(dispatch: Dispatch) -> DavResponse {
        match dispatch {
            Dispatch::Respond(response) => response,
            Dispatch::Delegate => panic!("expected a direct response, got a delegation"),
        }
    }

    fn header<'a>(response: &'a DavResponse, name: &str) -> Option<&'a str> {
        response
            .headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_options_advertises_capabilities() {
        let (dispatcher, _) = dispatcher();
        let response = respond(
            dispatcher
                .handle(DavRequest::new("OPTIONS", "/"))
                .await
                .unwrap(),
        );

        assert_eq!(response.status, 200);
        assert_eq!(header(&response, "DAV"), Some("1,2"));
        let allow = header(&response, "Allow").unwrap();
        for method in ["OPTIONS", "LOCK", "UNLOCK", "GET", "PROPFIND"] {
            assert!(allow.contains(method), "Allow missing {}", method);
        }
    }

    #[tokio::test]
    async fn test_propfind_root_lists_children() {
        let (dispatcher, _) = dispatcher();
        let response = respond(
            dispatcher
                .handle(DavRequest::new("PROPFIND", "/"))
                .await
                .unwrap(),
        );

        assert_eq!(response.status, 207);
        assert_eq!(header(&response, "Content-Type"), Some("application/xml"));
        let body = response.body.unwrap();
        assert_eq!(body.matches("<D:response>").count(), 2);
        assert!(body.contains("<D:getcontentlength>11</D:getcontentlength>"));
        assert!(body.contains("<D:getcontenttype>text/plain</D:getcontenttype>"));
    }

    #[tokio::test]
    async fn test_propfind_depth_zero_lists_only_self() {
        let (dispatcher, _) = dispatcher();
        let mut request = DavRequest::new("PROPFIND", "/");
        request.depth = Depth::Zero;
        let response = respond(dispatcher.handle(request).await.unwrap());

        let body = response.body.unwrap();
        assert_eq!(body.matches("<D:response>").count(), 1);
        assert!(body.contains("<D:href>/</D:href>"));
    }

    #[tokio::test]
    async fn test_propfind_unknown_path_is_not_found() {
        let (dispatcher, _) = dispatcher();
        let result = dispatcher
            .handle(DavRequest::new("PROPFIND", "/missing.txt"))
            .await;
        assert!(matches!(result, Err(DavError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lock_issues_token_in_header_and_body() {
        let (dispatcher, _) = dispatcher();
        let response = respond(
            dispatcher
                .handle(DavRequest::new("LOCK", "/readme.txt"))
                .await
                .unwrap(),
        );

        assert_eq!(response.status, 200);
        let header_value = header(&response, "Lock-Token").unwrap().to_string();
        let token = DavRequest::parse_lock_token(&header_value);
        assert!(header_value.starts_with("<opaquelocktoken:"));
        assert!(header_value.ends_with('>'));
        assert!(response
            .body
            .unwrap()
            .contains(&format!("opaquelocktoken:{}", token)));
    }

    #[tokio::test]
    async fn test_second_lock_is_refused_when_exclusive() {
        let (dispatcher, _) = dispatcher();
        dispatcher
            .handle(DavRequest::new("LOCK", "/readme.txt"))
            .await
            .unwrap();
        let second = dispatcher
            .handle(DavRequest::new("LOCK", "/readme.txt"))
            .await;
        assert!(matches!(second, Err(DavError::Locked(_))));
    }

    #[tokio::test]
    async fn test_lock_unlock_relock_with_presented_token() {
        let (dispatcher, _) = dispatcher();
        let response = respond(
            dispatcher
                .handle(DavRequest::new("LOCK", "/readme.txt"))
                .await
                .unwrap(),
        );
        let header_value = header(&response, "Lock-Token").unwrap().to_string();

        let mut unlock = DavRequest::new("UNLOCK", "/readme.txt");
        let token = DavRequest::parse_lock_token(&header_value);
        unlock.lock_token = Some(token);
        let unlocked = respond(dispatcher.handle(unlock).await.unwrap());
        assert_eq!(unlocked.status, 204);

        dispatcher
            .handle(DavRequest::new("LOCK", "/readme.txt"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unlock_returns_204_without_a_lock() {
        let (dispatcher, _) = dispatcher();
        let response = respond(
            dispatcher
                .handle(DavRequest::new("UNLOCK", "/never-locked.txt"))
                .await
                .unwrap(),
        );
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn test_get_known_path_delegates() {
        let (dispatcher, _) = dispatcher();
        let dispatch = dispatcher
            .handle(DavRequest::new("GET", "/readme.txt"))
            .await
            .unwrap();
        assert!(matches!(dispatch, Dispatch::Delegate));
    }

    #[tokio::test]
    async fn test_get_unknown_dav_path_is_not_found() {
        let (dispatcher, _) = dispatcher();
        let result = dispatcher
            .handle(DavRequest::new("GET", "/unknown-dav-path"))
            .await;
        assert!(matches!(result, Err(DavError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_segment_round_trips_through_store() {
        let (dispatcher, blobs) = dispatcher();
        let mut request = DavRequest::new("PUT", "/segment1.ts");
        request.body = b"segment bytes";
        let response = respond(dispatcher.handle(request).await.unwrap());

        assert_eq!(response.status, 201);
        let stored = blobs.get("/segment1.ts").await.unwrap();
        assert_eq!(stored.as_deref(), Some(b"segment bytes".as_slice()));
    }

    #[tokio::test]
    async fn test_put_disallowed_extension_is_rejected() {
        let (dispatcher, blobs) = dispatcher();
        let mut request = DavRequest::new("PUT", "/x.exe");
        request.body = b"mz";
        let result = dispatcher.handle(request).await;

        assert!(matches!(result, Err(DavError::MethodNotAllowed(_))));
        assert!(blobs.blobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_method_is_rejected() {
        let (dispatcher, _) = dispatcher();
        let result = dispatcher.handle(DavRequest::new("MKCOL", "/media")).await;
        assert!(matches!(result, Err(DavError::MethodNotAllowed(_))));
    }

    #[test]
    fn test_depth_header_parsing() {
        assert_eq!(Depth::from_header(Some("0")), Depth::Zero);
        assert_eq!(Depth::from_header(Some("1")), Depth::One);
        assert_eq!(Depth::from_header(Some("infinity")), Depth::Infinity);
        assert_eq!(Depth::from_header(None), Depth::Infinity);
    }

    #[test]
    fn test_lock_token_unwrapping() {
        assert_eq!(
            DavRequest::parse_lock_token("<opaquelocktoken:abc-123>"),
            "abc-123"
        );
        assert_eq!(DavRequest::parse_lock_token("abc-123"), "abc-123");
    }
}
