use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Shared node of a dotted name chain. The full path is computed on first
/// request from the parent chain and cached.
struct DottedName {
    parent: Option<Arc<DottedName>>,
    local_name: String,
    full_path: OnceLock<String>,
}

impl DottedName {
    fn root(full_path: impl Into<String>) -> Arc<Self> {
        Arc::new(DottedName {
            parent: None,
            local_name: full_path.into(),
            full_path: OnceLock::new(),
        })
    }

    fn child(parent: &Arc<DottedName>, local_name: impl Into<String>) -> Arc<Self> {
        Arc::new(DottedName {
            parent: Some(Arc::clone(parent)),
            local_name: local_name.into(),
            full_path: OnceLock::new(),
        })
    }

    fn full_path(&self) -> &str {
        self.full_path.get_or_init(|| match &self.parent {
            None => self.local_name.clone(),
            Some(parent) => format!("{}.{}", parent.full_path(), self.local_name),
        })
    }

    fn depth(&self) -> usize {
        match &self.parent {
            None => 0,
            Some(parent) => parent.depth() + 1,
        }
    }
}

macro_rules! dotted_name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Arc<DottedName>);

        impl $name {
            /// Root node carrying its complete dotted path.
            pub fn root(full_path: impl Into<String>) -> Self {
                $name(DottedName::root(full_path))
            }

            /// Child of `parent` named `local_name`.
            pub fn child(parent: &$name, local_name: impl Into<String>) -> Self {
                $name(DottedName::child(&parent.0, local_name))
            }

            /// Shorthand for [`Self::child`] with `self` as parent.
            pub fn append(&self, local_name: impl Into<String>) -> Self {
                Self::child(self, local_name)
            }

            pub fn is_root(&self) -> bool {
                self.0.parent.is_none()
            }

            pub fn parent(&self) -> Option<$name> {
                self.0.parent.as_ref().map(|p| $name(Arc::clone(p)))
            }

            /// For a root this is the full path it was created with.
            pub fn local_name(&self) -> &str {
                &self.0.local_name
            }

            pub fn full_path(&self) -> &str {
                self.0.full_path()
            }

            /// Number of segments below the root.
            pub fn depth(&self) -> usize {
                self.0.depth()
            }

            /// True when `self` equals `other` or is one of its ancestors.
            pub fn is_parent_or_equal(&self, other: &$name) -> bool {
                let mut current = Some(other.clone());
                while let Some(node) = current {
                    if node == *self {
                        return true;
                    }
                    current = node.parent();
                }
                false
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.full_path() == other.full_path()
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.full_path().hash(state);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.full_path())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.full_path())
            }
        }
    };
}

dotted_name_type!(
    /// Position of a navigable within one query.
    NavigablePath
);

dotted_name_type!(
    /// Position of a navigable within the mapping model.
    NavigableRole
);

impl NavigableRole {
    /// Role for `attribute` of the entity named `entity_name`.
    pub fn attribute(entity_name: &str, attribute: &str) -> Self {
        NavigableRole::root(entity_name).append(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_full_path_is_parent_plus_local_name() {
        let root = NavigablePath::root("Order");
        let items = root.append("lineItems");
        let product = items.append("product");
        assert_eq!(product.full_path(), "Order.lineItems.product");
        assert_eq!(product.local_name(), "product");
        assert_eq!(product.depth(), 2);
        assert!(!product.is_root());
        assert!(root.is_root());
    }

    #[test]
    fn test_round_trip_through_parent() {
        let p = NavigablePath::root("Order").append("customer").append("address");
        let parent = p.parent().unwrap();
        assert_eq!(NavigablePath::child(&parent, p.local_name()), p);
    }

    #[test]
    fn test_structural_equality_across_instances() {
        let a = NavigablePath::root("Order").append("customer");
        let b = NavigablePath::root("Order").append("customer");
        assert_eq!(a, b);
        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_root_with_dotted_full_path() {
        let root = NavigableRole::root("com.acme.Order");
        assert_eq!(root.local_name(), "com.acme.Order");
        assert_eq!(root.append("lineItems").full_path(), "com.acme.Order.lineItems");
    }

    #[test]
    fn test_is_parent_or_equal() {
        let root = NavigablePath::root("Order");
        let child = root.append("customer");
        assert!(root.is_parent_or_equal(&child));
        assert!(child.is_parent_or_equal(&child));
        assert!(!child.is_parent_or_equal(&root));
    }
}
