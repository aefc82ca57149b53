use std::sync::Arc;

use super::LoopbackTransport;
use crate::SharedConfig;
use crate::SharedObjectRegistry;
use crate::SubjectType;

/// Registry wired to a fresh loopback transport
pub fn test_registry() -> (Arc<SharedObjectRegistry>, Arc<LoopbackTransport>) {
    test_registry_with(SharedConfig::default())
}

pub fn test_registry_with(config: SharedConfig) -> (Arc<SharedObjectRegistry>, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    let registry = Arc::new(SharedObjectRegistry::new(config, transport.clone()));
    (registry, transport)
}

/// Registry with the given hash subjects already created; the creation
/// events are drained
pub fn registry_with_hashes(subjects: &[&str]) -> (Arc<SharedObjectRegistry>, Arc<LoopbackTransport>) {
    let (registry, transport) = test_registry();
    for subject in subjects {
        registry
            .create_subject(subject, "/eos/*", SubjectType::Hash)
            .unwrap();
    }
    registry.event_receiver().try_iter().for_each(drop);
    (registry, transport)
}
