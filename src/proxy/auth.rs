use std::collections::HashSet;

/// Reasons a presented API key is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRejection {
    Missing,
    Invalid,
}

impl KeyRejection {
    pub fn message(self) -> &'static str {
        match self {
            KeyRejection::Missing => "缺少 API 密钥",
            KeyRejection::Invalid => "无效的 API 密钥",
        }
    }
}

/// Immutable set of accepted API keys, built once at startup and shared
/// read-only across requests.
#[derive(Debug, Clone)]
pub struct ApiKeySet {
    keys: HashSet<String>,
}

impl ApiKeySet {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    /// Membership check with distinct missing/invalid outcomes. Pure function
    /// of the presented key and the configured set.
    pub fn verify(&self, provided: Option<&str>) -> Result<(), KeyRejection> {
        match provided {
            None | Some("") => Err(KeyRejection::Missing),
            Some(key) if self.keys.contains(key) => Ok(()),
            Some(_) => Err(KeyRejection::Invalid),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_set() -> ApiKeySet {
        ApiKeySet::new(vec!["alpha".to_string(), "beta".to_string()])
    }

    #[test]
    fn test_accepts_configured_keys() {
        let keys = key_set();
        assert!(keys.verify(Some("alpha")).is_ok());
        assert!(keys.verify(Some("beta")).is_ok());
    }

    #[test]
    fn test_missing_key_is_distinct_from_invalid() {
        let keys = key_set();
        assert_eq!(keys.verify(None), Err(KeyRejection::Missing));
        assert_eq!(keys.verify(Some("")), Err(KeyRejection::Missing));
        assert_eq!(keys.verify(Some("gamma")), Err(KeyRejection::Invalid));
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(KeyRejection::Missing.message(), "缺少 API 密钥");
        assert_eq!(KeyRejection::Invalid.message(), "无效的 API 密钥");
    }

    #[test]
    fn test_empty_entries_are_not_members() {
        let keys = ApiKeySet::new(vec![String::new()]);
        assert!(keys.is_empty());
        assert_eq!(keys.verify(Some("")), Err(KeyRejection::Missing));
    }
}
