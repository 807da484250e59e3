//! Exception kind identifiers and the registry they resolve against.
//!
//! Rust errors carry no runtime type hierarchy, so kinds are plain names with
//! an optional parent. "Is-a" matching walks the parent chain, which lets a
//! filter configured for `Io` also match `TimedOut`.

use serde::Deserialize;
use std::collections::HashMap;

/// Name of the root kind every built-in kind descends from.
pub const ROOT_KIND: &str = "Error";

/// Built-in kinds as `(name, parent)`, parents listed before children.
const BUILTIN_KINDS: &[(&str, Option<&str>)] = &[
    (ROOT_KIND, None),
    ("Io", Some(ROOT_KIND)),
    ("NotFound", Some("Io")),
    ("PermissionDenied", Some("Io")),
    ("ConnectionRefused", Some("Io")),
    ("ConnectionReset", Some("Io")),
    ("TimedOut", Some("Io")),
    ("UnexpectedEof", Some("Io")),
    ("Parse", Some(ROOT_KIND)),
    ("InvalidInput", Some(ROOT_KIND)),
    ("Arithmetic", Some(ROOT_KIND)),
    ("DivisionByZero", Some("Arithmetic")),
    ("Overflow", Some("Arithmetic")),
    ("Runtime", Some(ROOT_KIND)),
];

/// Error raised while registering or resolving exception kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKindError {
    #[error("unknown exception kind '{0}'")]
    UnknownKind(String),
    #[error("exception kind '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("exception kind names must not be empty")]
    EmptyName,
}

/// A kind that was successfully resolved against a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorKind(String);

impl ErrorKind {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Registry of known exception kinds and their parents.
#[derive(Debug, Clone)]
pub struct ErrorKindRegistry {
    parents: HashMap<String, Option<String>>,
}

impl ErrorKindRegistry {
    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            parents: HashMap::new(),
        }
    }

    /// A registry holding the built-in kinds rooted at [`ROOT_KIND`].
    pub fn builtin() -> Self {
        let parents = BUILTIN_KINDS
            .iter()
            .map(|(name, parent)| (name.to_string(), parent.map(str::to_string)))
            .collect();
        Self { parents }
    }

    /// Register a new kind under an already registered parent.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        parent: Option<&str>,
    ) -> Result<ErrorKind, ErrorKindError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ErrorKindError::EmptyName);
        }
        if self.parents.contains_key(&name) {
            return Err(ErrorKindError::AlreadyRegistered(name));
        }
        let parent = match parent {
            Some(parent) => Some(self.resolve(parent)?.0),
            None => None,
        };
        self.parents.insert(name.clone(), parent);
        Ok(ErrorKind(name))
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_kind(
        mut self,
        name: impl Into<String>,
        parent: Option<&str>,
    ) -> Result<Self, ErrorKindError> {
        self.register(name, parent)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parents.contains_key(name.trim())
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Resolve an identifier, failing on names that were never registered.
    pub fn resolve(&self, name: &str) -> Result<ErrorKind, ErrorKindError> {
        let name = name.trim();
        if self.parents.contains_key(name) {
            Ok(ErrorKind(name.to_string()))
        } else {
            Err(ErrorKindError::UnknownKind(name.to_string()))
        }
    }

    /// Whether `kind` is `ancestor` or one of its descendants.
    ///
    /// Unregistered kinds only match themselves, which never happens for a
    /// resolved ancestor.
    pub fn is_a(&self, kind: &str, ancestor: &ErrorKind) -> bool {
        let mut current = Some(kind);
        while let Some(name) = current {
            if name == ancestor.name() {
                return true;
            }
            current = self.parents.get(name).and_then(|parent| parent.as_deref());
        }
        false
    }
}

impl Default for ErrorKindRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Ordered list of configured kind identifiers.
///
/// Accepts either a list or a single comma-delimited string; both normalize
/// to trimmed, non-empty identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "KindList")]
pub struct ExceptionKinds(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum KindList {
    Joined(String),
    Many(Vec<String>),
}

impl From<KindList> for ExceptionKinds {
    fn from(list: KindList) -> Self {
        match list {
            KindList::Joined(joined) => ExceptionKinds::parse(&joined),
            KindList::Many(many) => many.into_iter().collect(),
        }
    }
}

impl ExceptionKinds {
    /// Split a comma-delimited list of identifiers.
    pub fn parse(joined: &str) -> Self {
        joined.split(',').collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExceptionKinds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ExceptionKinds(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl From<&str> for ExceptionKinds {
    fn from(joined: &str) -> Self {
        ExceptionKinds::parse(joined)
    }
}

impl From<String> for ExceptionKinds {
    fn from(joined: String) -> Self {
        ExceptionKinds::parse(&joined)
    }
}

impl From<Vec<String>> for ExceptionKinds {
    fn from(kinds: Vec<String>) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<&[&str]> for ExceptionKinds {
    fn from(kinds: &[&str]) -> Self {
        kinds.iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for ExceptionKinds {
    fn from(kinds: [&str; N]) -> Self {
        kinds.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_hierarchy() {
        let registry = ErrorKindRegistry::builtin();
        let io = registry.resolve("Io").unwrap();
        let root = registry.resolve(ROOT_KIND).unwrap();

        assert!(registry.is_a("TimedOut", &io));
        assert!(registry.is_a("TimedOut", &root));
        assert!(registry.is_a("Io", &io));
        assert!(!registry.is_a("Parse", &io));
        assert!(!registry.is_a("Unregistered", &root));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = ErrorKindRegistry::builtin();
        assert_eq!(
            registry.resolve("NoSuchError"),
            Err(ErrorKindError::UnknownKind("NoSuchError".to_string()))
        );
    }

    #[test]
    fn test_register_requires_known_parent() {
        let mut registry = ErrorKindRegistry::empty();
        assert_eq!(
            registry.register("ValueError", Some("Exception")),
            Err(ErrorKindError::UnknownKind("Exception".to_string()))
        );

        registry.register("Exception", None).unwrap();
        registry.register("ValueError", Some("Exception")).unwrap();
        assert_eq!(
            registry.register("ValueError", None),
            Err(ErrorKindError::AlreadyRegistered("ValueError".to_string()))
        );
        assert_eq!(registry.register("  ", None), Err(ErrorKindError::EmptyName));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_custom_kinds_extend_builtin() {
        let registry = ErrorKindRegistry::builtin()
            .with_kind("Database", Some(ROOT_KIND))
            .unwrap()
            .with_kind("Deadlock", Some("Database"))
            .unwrap();

        let database = registry.resolve("Database").unwrap();
        assert!(registry.is_a("Deadlock", &database));
        assert!(registry.is_a("Deadlock", &registry.resolve(ROOT_KIND).unwrap()));
    }

    #[test]
    fn test_kind_list_normalization() {
        let joined = ExceptionKinds::parse("RuntimeError, ValueError,,");
        let listed = ExceptionKinds::from(vec![
            "RuntimeError".to_string(),
            " ValueError".to_string(),
        ]);
        assert_eq!(joined, listed);
        assert_eq!(
            joined.iter().collect::<Vec<_>>(),
            vec!["RuntimeError", "ValueError"]
        );
        assert_eq!(ExceptionKinds::from("Io").len(), 1);
    }

    #[test]
    fn test_kind_list_deserialize() {
        let joined: ExceptionKinds = serde_json::from_str("\"Io,Parse\"").unwrap();
        let listed: ExceptionKinds = serde_json::from_str("[\"Io\", \"Parse\"]").unwrap();
        assert_eq!(joined, listed);
    }
}
