//! Named command registry with typed parameters
//!
//! Hosts address driver operations by name ("Roll", "SetRGB", ...) and pass
//! parameters as a TOML table. Each handler declares its parameter struct, so
//! the table is checked against that type before the handler runs: a missing
//! key or a value of the wrong type is an error, never a panic.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

type Handler<O> = Box<dyn Fn(toml::Value) -> Result<O> + Send + Sync>;

/// Command name → typed handler table
pub struct CommandRegistry<O> {
    handlers: BTreeMap<&'static str, Handler<O>>,
}

impl<O> CommandRegistry<O> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register `handler` under `name`
    ///
    /// Fails if `name` is already taken.
    pub fn register<P, F>(&mut self, name: &'static str, handler: F) -> Result<()>
    where
        P: DeserializeOwned + 'static,
        F: Fn(P) -> Result<O> + Send + Sync + 'static,
    {
        if self.handlers.contains_key(name) {
            return Err(Error::DuplicateCommand(name.to_string()));
        }

        let typed = move |value: toml::Value| {
            let params: P = value
                .try_into()
                .map_err(|e| Error::InvalidParameter(format!("{}: {}", name, e)))?;
            handler(params)
        };
        self.handlers.insert(name, Box::new(typed));
        log::debug!("Registered command '{}'", name);
        Ok(())
    }

    /// Run the command registered as `name`
    pub fn dispatch(&self, name: &str, params: toml::Value) -> Result<O> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))?;
        handler(params)
    }

    /// Registered command names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl<O> Default for CommandRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Add {
        a: u8,
        b: u8,
    }

    fn table(src: &str) -> toml::Value {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn test_dispatch_typed_params() {
        let mut registry = CommandRegistry::new();
        registry
            .register("Add", |p: Add| Ok(u16::from(p.a) + u16::from(p.b)))
            .unwrap();

        assert_eq!(registry.dispatch("Add", table("a = 2\nb = 3")).unwrap(), 5);
    }

    #[test]
    fn test_bad_params_are_errors() {
        let mut registry = CommandRegistry::new();
        registry.register("Add", |p: Add| Ok(p.a)).unwrap();

        // Missing key
        assert!(matches!(
            registry.dispatch("Add", table("a = 2")),
            Err(Error::InvalidParameter(_))
        ));
        // Wrong type
        assert!(matches!(
            registry.dispatch("Add", table("a = 2\nb = \"x\"")),
            Err(Error::InvalidParameter(_))
        ));
        // Out of range for u8
        assert!(matches!(
            registry.dispatch("Add", table("a = 2\nb = 300")),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut registry: CommandRegistry<()> = CommandRegistry::new();
        registry.register("Noop", |_: toml::Table| Ok(())).unwrap();

        assert!(matches!(
            registry.register("Noop", |_: toml::Table| Ok(())),
            Err(Error::DuplicateCommand(_))
        ));
        assert!(matches!(
            registry.dispatch("Missing", table("")),
            Err(Error::UnknownCommand(_))
        ));
        assert_eq!(registry.names(), vec!["Noop"]);
    }
}
