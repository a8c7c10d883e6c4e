//! Service identity for process supervisors.

use std::borrow::Cow;
use std::fmt;

/// The name a supervisor uses to list and label a running service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceDescriptor {
    name: Cow<'static, str>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Implemented by anything a supervisor can enumerate.
pub trait Describe {
    fn describe(&self) -> ServiceDescriptor;
}
