//! Extension registry
//!
//! Catalog of known module descriptors, keyed by module id. Registration
//! is an administrative action; a module id can be registered exactly
//! once.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthContext, Role, RoleRegistry};
use crate::types::error::GuardError;
use crate::types::extension_types::ExtensionDescriptor;
use crate::types::{CapabilityType, ModuleId, SubjectKind};

/// Catalog of registered extension descriptors
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    descriptors: Arc<RwLock<HashMap<ModuleId, ExtensionDescriptor>>>,
    roles: RoleRegistry,
}

impl ExtensionRegistry {
    /// Create an empty registry gated by `roles`
    pub fn new(roles: RoleRegistry) -> Self {
        Self {
            descriptors: Arc::new(RwLock::new(HashMap::new())),
            roles,
        }
    }

    /// Register a descriptor. ExtensionAdmin only; rejects the empty
    /// module id and re-registration.
    pub fn register_descriptor(
        &self,
        ctx: &AuthContext,
        module_id: ModuleId,
        capability_type: CapabilityType,
        compatible_kinds: HashSet<SubjectKind>,
    ) -> Result<(), GuardError> {
        self.roles.require(ctx, Role::ExtensionAdmin)?;
        if module_id.is_empty() {
            return Err(GuardError::invalid_request(
                "cannot register the zero module id",
            ));
        }

        let mut descriptors = self.descriptors.write();
        if descriptors.contains_key(&module_id) {
            return Err(GuardError::invalid_request(format!(
                "module {} is already registered",
                module_id
            )));
        }

        info!(%module_id, capability = %capability_type, "extension descriptor registered");
        descriptors.insert(
            module_id.clone(),
            ExtensionDescriptor {
                module_id,
                capability_type,
                compatible_kinds,
            },
        );
        Ok(())
    }

    /// Descriptor for `module_id`, cloned out
    pub fn descriptor(&self, module_id: &ModuleId) -> Option<ExtensionDescriptor> {
        self.descriptors.read().get(module_id).cloned()
    }

    /// Whether `module_id` is registered
    pub fn is_registered(&self, module_id: &ModuleId) -> bool {
        self.descriptors.read().contains_key(module_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ExtensionRegistry {
        ExtensionRegistry::new(RoleRegistry::new("root"))
    }

    fn admin() -> AuthContext {
        AuthContext::new("root")
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        registry
            .register_descriptor(
                &admin(),
                "royalty-v1".to_string(),
                CapabilityType::Royalty,
                [SubjectKind::Fungible].into_iter().collect(),
            )
            .expect("register");

        let descriptor = registry
            .descriptor(&"royalty-v1".to_string())
            .expect("descriptor exists");
        assert_eq!(descriptor.capability_type, CapabilityType::Royalty);
        assert!(descriptor.is_compatible_with(SubjectKind::Fungible));
        assert!(registry.is_registered(&"royalty-v1".to_string()));
    }

    #[test]
    fn test_re_registration_is_rejected() {
        let registry = registry();
        registry
            .register_descriptor(
                &admin(),
                "royalty-v1".to_string(),
                CapabilityType::Royalty,
                HashSet::new(),
            )
            .expect("register");

        let err = registry
            .register_descriptor(
                &admin(),
                "royalty-v1".to_string(),
                CapabilityType::Vesting,
                HashSet::new(),
            )
            .unwrap_err();
        assert!(matches!(err, GuardError::InvalidRequest { .. }));
    }

    #[test]
    fn test_registration_is_role_gated() {
        let registry = registry();
        let outsider = AuthContext::new("mallory");

        let err = registry
            .register_descriptor(
                &outsider,
                "royalty-v1".to_string(),
                CapabilityType::Royalty,
                HashSet::new(),
            )
            .unwrap_err();
        assert!(matches!(err, GuardError::Unauthorized { .. }));
        assert!(!registry.is_registered(&"royalty-v1".to_string()));
    }

    #[test]
    fn test_empty_module_id_is_rejected() {
        let registry = registry();
        assert!(registry
            .register_descriptor(&admin(), String::new(), CapabilityType::Royalty, HashSet::new())
            .is_err());
    }
}
