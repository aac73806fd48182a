//! Backend resolution: which provider and sync processor serve a file.

use std::collections::HashMap;
use std::sync::Arc;

use vaultsync_common::{BackendKind, Error, FileDescriptor, Result};
use vaultsync_storage::FileSystemProvider;

use crate::processor::SyncProcessor;

struct Backend {
    provider: Arc<dyn FileSystemProvider>,
    processor: Arc<dyn SyncProcessor>,
}

/// Registry mapping each backend kind to its provider and sync processor.
#[derive(Default)]
pub struct FileSystemResolver {
    backends: HashMap<BackendKind, Backend>,
}

impl FileSystemResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the provider and processor serving `kind`.
    ///
    /// # Preconditions
    /// - `kind` must not be registered yet
    ///
    /// # Errors
    /// - `AlreadyExists` if `kind` is already registered
    pub fn register(
        &mut self,
        kind: BackendKind,
        provider: Arc<dyn FileSystemProvider>,
        processor: Arc<dyn SyncProcessor>,
    ) -> Result<()> {
        if self.backends.contains_key(&kind) {
            return Err(Error::AlreadyExists(format!(
                "Backend '{}' is already registered",
                kind
            )));
        }
        self.backends.insert(kind, Backend { provider, processor });
        Ok(())
    }

    /// # Errors
    /// - `NotFound` if `kind` is not registered
    pub fn provider(&self, kind: BackendKind) -> Result<Arc<dyn FileSystemProvider>> {
        self.backend(kind).map(|b| Arc::clone(&b.provider))
    }

    /// # Errors
    /// - `NotFound` if `kind` is not registered
    pub fn processor(&self, kind: BackendKind) -> Result<Arc<dyn SyncProcessor>> {
        self.backend(kind).map(|b| Arc::clone(&b.processor))
    }

    /// Provider serving the backend `file` lives on.
    pub fn provider_for(&self, file: &FileDescriptor) -> Result<Arc<dyn FileSystemProvider>> {
        self.provider(file.backend)
    }

    /// Sync processor for the backend `file` lives on.
    pub fn processor_for(&self, file: &FileDescriptor) -> Result<Arc<dyn SyncProcessor>> {
        self.processor(file.backend)
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.keys().copied().collect()
    }

    fn backend(&self, kind: BackendKind) -> Result<&Backend> {
        self.backends
            .get(&kind)
            .ok_or_else(|| Error::NotFound(format!("Backend '{}' is not registered", kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::LocalSyncProcessor;
    use chrono::Utc;
    use vaultsync_common::ErrorKind;
    use vaultsync_storage::LocalProvider;

    fn local_backend() -> (Arc<dyn FileSystemProvider>, Arc<dyn SyncProcessor>) {
        (Arc::new(LocalProvider::new()), Arc::new(LocalSyncProcessor))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut resolver = FileSystemResolver::new();
        let (provider, processor) = local_backend();
        resolver
            .register(BackendKind::Local, provider, processor)
            .unwrap();

        let file = FileDescriptor::file("/db.kdbx", "/db.kdbx", Utc::now(), BackendKind::Local);
        assert_eq!(resolver.provider_for(&file).unwrap().kind(), BackendKind::Local);
        assert!(resolver.processor_for(&file).is_ok());
        assert_eq!(resolver.kinds(), vec![BackendKind::Local]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut resolver = FileSystemResolver::new();
        let (provider, processor) = local_backend();
        resolver
            .register(BackendKind::Local, provider.clone(), processor.clone())
            .unwrap();

        let err = resolver
            .register(BackendKind::Local, provider, processor)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let resolver = FileSystemResolver::new();
        let err = resolver.processor(BackendKind::Remote).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
