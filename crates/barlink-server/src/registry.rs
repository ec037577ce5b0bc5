//! Name-to-factory mapping consulted at handshake.
//!
//! Factories are registered on a [`RegistryBuilder`] before the server starts
//! and frozen into an immutable [`IndicatorRegistry`] when it does, so lookups
//! during handshakes never contend with registration.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::capability::IndicatorCapability;
use crate::observer::Link;

/// Builds a fresh capability instance for each connection.
pub trait IndicatorFactory: Send + Sync {
    /// Creates the capability that will serve `link`.
    fn create(&self, link: &Link) -> Box<dyn IndicatorCapability>;
}

impl<F> IndicatorFactory for F
where
    F: Fn(&Link) -> Box<dyn IndicatorCapability> + Send + Sync,
{
    fn create(&self, link: &Link) -> Box<dyn IndicatorCapability> {
        self(link)
    }
}

/// Errors raised while registering or resolving indicators.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A factory is already registered under the name.
    #[error("indicator '{name}' is already registered")]
    DuplicateName {
        /// Offending name.
        name: String,
    },
    /// Indicator names must not be empty.
    #[error("indicator name must not be empty")]
    EmptyName,
    /// No factory is registered under the name.
    #[error("unknown indicator '{name}'")]
    UnknownIndicator {
        /// Requested name.
        name: String,
    },
}

/// Mutable registry used before the server starts.
#[derive(Default)]
pub struct RegistryBuilder {
    factories: HashMap<String, Arc<dyn IndicatorFactory>>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `name` with `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] when `name` is taken and
    /// [`RegistryError::EmptyName`] for an empty name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn IndicatorFactory>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.factories.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn freeze(self) -> IndicatorRegistry {
        IndicatorRegistry {
            factories: Arc::new(self.factories),
        }
    }
}

/// Immutable, cheaply cloneable registry shared by connection handlers.
#[derive(Clone)]
pub struct IndicatorRegistry {
    factories: Arc<HashMap<String, Arc<dyn IndicatorFactory>>>,
}

impl IndicatorRegistry {
    /// Creates a new capability for `name`.
    ///
    /// Names match exactly, including case.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownIndicator`] when nothing is registered
    /// under `name`.
    pub fn resolve(
        &self,
        name: &str,
        link: &Link,
    ) -> Result<Box<dyn IndicatorCapability>, RegistryError> {
        self.factories
            .get(name)
            .map(|factory| factory.create(link))
            .ok_or_else(|| RegistryError::UnknownIndicator {
                name: name.to_owned(),
            })
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
