use compact_str::{CompactString, ToCompactString};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct RunnerId {
    value: u64,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct WorkflowId {
    value: u64,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct RunId {
    value: u64,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct JobId {
    value: u64,
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RepoName {
    /// owner/repo identifier for GitHub
    value: CompactString,
}

impl RunnerId {
    pub fn new(id: u64) -> Self {
        Self { value: id }
    }
}

impl WorkflowId {
    pub fn new(id: u64) -> Self {
        Self { value: id }
    }
}

impl RunId {
    pub fn new(id: u64) -> Self {
        Self { value: id }
    }
}

impl JobId {
    pub fn new(id: u64) -> Self {
        Self { value: id }
    }
}

impl RepoName {
    pub fn new<S: Into<CompactString>>(name: S) -> Self {
        Self { value: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

macro_rules! numeric_id {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<$ty, D::Error>
            where
                D: Deserializer<'de>,
            {
                let id = u64::deserialize(deserializer)?;
                Ok($ty::new(id))
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.value)
            }
        }
    };
}

numeric_id!(RunnerId);
numeric_id!(WorkflowId);
numeric_id!(RunId);
numeric_id!(JobId);

impl<'de> Deserialize<'de> for RepoName {
    fn deserialize<D>(deserializer: D) -> Result<RepoName, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = CompactString::deserialize(deserializer)?;
        Ok(RepoName::new(name))
    }
}

impl From<&str> for RepoName {
    fn from(value: &str) -> Self {
        RepoName::new(value.to_compact_string())
    }
}

impl std::fmt::Display for RepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
