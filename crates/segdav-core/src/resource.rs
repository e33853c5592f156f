use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// One node in the virtual resource tree.
///
/// The tree is a single collection at `/` plus direct, non-collection
/// children. Resources are enumerated at configuration load and never
/// change for the lifetime of the process; PUT forwards bytes to the blob
/// store without adding registry entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Absolute path, e.g. `/` or `/readme.txt`.
    pub path: String,
    #[serde(default)]
    pub is_collection: bool,
    /// Only meaningful for non-collections with known content.
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Advertised quota; the encoder substitutes the default constant
    /// when unset.
    #[serde(default)]
    pub quota_available_bytes: Option<u64>,
}

impl Resource {
    /// A collection resource with no content properties.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_collection: true,
            content_length: None,
            content_type: None,
            quota_available_bytes: None,
        }
    }

    /// A plain file resource with known length and MIME type.
    pub fn file(
        path: impl Into<String>,
        content_length: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            is_collection: false,
            content_length: Some(content_length),
            content_type: Some(content_type.into()),
            quota_available_bytes: None,
        }
    }
}

/// Read-only provider for the virtual resource tree.
///
/// Injected into the dispatcher so the registry's source (built-in
/// defaults, config file, something else later) can change without
/// touching the protocol layer. No side effects.
pub trait ResourceRegistry: Send + Sync {
    /// Resolve a path to a resource. `lookup("/")` always succeeds.
    fn lookup(&self, path: &str) -> Option<&Resource>;

    /// The root collection's members, in configuration order.
    fn children(&self) -> &[Resource];
}

/// Statically configured registry backing the `ResourceRegistry` contract.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    root: Resource,
    children: Vec<Resource>,
}

impl StaticRegistry {
    /// Build a registry from a flat resource list, validating the tree
    /// invariants: exactly one root collection at `/`, unique absolute
    /// paths, no collections below the root, no nesting beyond one
    /// segment.
    pub fn new(resources: Vec<Resource>) -> Result<Self, RegistryError> {
        let mut root = None;
        let mut children: Vec<Resource> = Vec::new();

        for resource in resources {
            if resource.path == "/" {
                if !resource.is_collection || root.is_some() {
                    return Err(RegistryError::DuplicatePath(resource.path));
                }
                root = Some(resource);
                continue;
            }

            let Some(rest) = resource.path.strip_prefix('/') else {
                return Err(RegistryError::RelativePath(resource.path));
            };
            if rest.is_empty() || rest.contains('/') {
                return Err(RegistryError::NestedPath(resource.path));
            }
            if resource.is_collection {
                return Err(RegistryError::NonRootCollection(resource.path));
            }
            if children.iter().any(|c| c.path == resource.path) {
                return Err(RegistryError::DuplicatePath(resource.path));
            }
            children.push(resource);
        }

        let root = root.ok_or(RegistryError::MissingRoot)?;
        Ok(Self { root, children })
    }

    /// The built-in registry: the root collection plus a small readme.
    pub fn with_defaults() -> Self {
        Self {
            root: Resource::collection("/"),
            children: vec![Resource::file("/readme.txt", 11, "text/plain")],
        }
    }
}

impl ResourceRegistry for StaticRegistry {
    fn lookup(&self, path: &str) -> Option<&Resource> {
        if path == "/" {
            return Some(&self.root);
        }
        self.children.iter().find(|c| c.path == path)
    }

    fn children(&self) -> &[Resource] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_root_and_children() {
        let registry = StaticRegistry::with_defaults();

        let root = registry.lookup("/").unwrap();
        assert!(root.is_collection);

        let readme = registry.lookup("/readme.txt").unwrap();
        assert!(!readme.is_collection);
        assert_eq!(readme.content_length, Some(11));

        assert!(registry.lookup("/missing.txt").is_none());
        assert_eq!(registry.children().len(), 1);
    }

    #[test]
    fn test_rejects_missing_root() {
        let err = StaticRegistry::new(vec![Resource::file("/a.txt", 1, "text/plain")]);
        assert_eq!(err.unwrap_err(), RegistryError::MissingRoot);
    }

    #[test]
    fn test_rejects_duplicate_paths() {
        let err = StaticRegistry::new(vec![
            Resource::collection("/"),
            Resource::file("/a.txt", 1, "text/plain"),
            Resource::file("/a.txt", 2, "text/plain"),
        ]);
        assert_eq!(
            err.unwrap_err(),
            RegistryError::DuplicatePath("/a.txt".to_string())
        );
    }

    #[test]
    fn test_rejects_nested_and_relative_paths() {
        let nested = StaticRegistry::new(vec![
            Resource::collection("/"),
            Resource::file("/media/a.ts", 1, "video/mp2t"),
        ]);
        assert_eq!(
            nested.unwrap_err(),
            RegistryError::NestedPath("/media/a.ts".to_string())
        );

        let relative = StaticRegistry::new(vec![
            Resource::collection("/"),
            Resource::file("a.txt", 1, "text/plain"),
        ]);
        assert_eq!(
            relative.unwrap_err(),
            RegistryError::RelativePath("a.txt".to_string())
        );
    }

    #[test]
    fn test_rejects_non_root_collection() {
        let err = StaticRegistry::new(vec![
            Resource::collection("/"),
            Resource::collection("/media"),
        ]);
        assert_eq!(
            err.unwrap_err(),
            RegistryError::NonRootCollection("/media".to_string())
        );
    }
}
