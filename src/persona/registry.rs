//! Dynamic persona registration with validation.

use std::sync::Arc;

use crate::error::{Error, Result};

use super::builtin::builtin_personas;
use super::types::{Persona, MAX_PERSONA_WEIGHT};

/// Minimum length of a persona focus description.
const MIN_FOCUS_LEN: usize = 10;

/// Ordered registry of active personas.
///
/// Registration order is observable: it breaks ties when duplicate
/// expansions are collapsed.
pub struct PersonaRegistry {
    personas: Vec<Arc<dyn Persona>>,
}

impl PersonaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            personas: Vec::new(),
        }
    }

    /// Registry preloaded with the seven built-ins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for persona in builtin_personas() {
            registry
                .register(Arc::from(persona))
                .expect("builtin personas are valid");
        }
        registry
    }

    /// Register a persona, enforcing name uniqueness, a non-trivial focus,
    /// and a weight in [0, 2].
    pub fn register(&mut self, persona: Arc<dyn Persona>) -> Result<()> {
        let name = persona.name();
        if name.is_empty() {
            return Err(Error::Config("persona name must be non-empty".into()));
        }
        if self.personas.iter().any(|p| p.name() == name) {
            return Err(Error::Config(format!("persona {name:?} already registered")));
        }
        if persona.focus().len() < MIN_FOCUS_LEN {
            return Err(Error::Config(format!(
                "persona {name:?} focus must be at least {MIN_FOCUS_LEN} characters"
            )));
        }
        let weight = persona.weight();
        if !(0.0..=MAX_PERSONA_WEIGHT).contains(&weight) {
            return Err(Error::Config(format!(
                "persona {name:?} weight {weight} outside [0, {MAX_PERSONA_WEIGHT}]"
            )));
        }
        self.personas.push(persona);
        Ok(())
    }

    /// Remove a persona by name. Returns false if unknown.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.personas.len();
        self.personas.retain(|p| p.name() != name);
        self.personas.len() != before
    }

    /// Active personas in registration order.
    pub fn active(&self) -> &[Arc<dyn Persona>] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for PersonaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaRegistry")
            .field(
                "personas",
                &self.personas.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
