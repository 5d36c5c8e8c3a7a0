//! Variables
//!
//! Shell values are byte strings; integer meaning only exists inside
//! arithmetic contexts. Each name carries an attribute set (exported,
//! readonly). Function calls push a frame; `local` declares names in the
//! top frame, and lookups walk frames innermost-first before the globals.

use indexmap::IndexMap;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{name}: readonly variable")]
pub struct ReadonlyError {
    pub name: String,
}

/// A shell variable with its attributes
#[derive(Debug, Clone, Default)]
pub struct Variable {
    pub value: String,
    pub exported: bool,
    pub readonly: bool,
}

impl Variable {
    pub fn new(value: impl Into<String>) -> Self {
        Variable {
            value: value.into(),
            exported: false,
            readonly: false,
        }
    }

    pub fn exported(value: impl Into<String>) -> Self {
        Variable {
            value: value.into(),
            exported: true,
            readonly: false,
        }
    }
}

/// Global variables plus a stack of function-local frames.
///
/// Insertion order of the globals is preserved so `env` and `export -p`
/// print variables in the order they appeared.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    globals: IndexMap<String, Variable>,
    frames: Vec<HashMap<String, Variable>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the starting environment from the process environment.
    pub fn from_process_env() -> Self {
        let mut env = Environment::new();
        for (name, value) in std::env::vars() {
            env.globals.insert(name, Variable::exported(value));
        }
        env
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        for frame in self.frames.iter().rev() {
            if let Some(var) = frame.get(name) {
                return Some(var);
            }
        }
        self.globals.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|v| v.value.as_str())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Assign, honouring scope: an existing local is updated in its frame,
    /// anything else lands in the globals.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), ReadonlyError> {
        let value = value.into();
        for frame in self.frames.iter_mut().rev() {
            if let Some(var) = frame.get_mut(name) {
                if var.readonly {
                    return Err(ReadonlyError { name: name.into() });
                }
                var.value = value;
                return Ok(());
            }
        }
        match self.globals.get_mut(name) {
            Some(var) => {
                if var.readonly {
                    return Err(ReadonlyError { name: name.into() });
                }
                var.value = value;
            }
            None => {
                self.globals.insert(name.to_string(), Variable::new(value));
            }
        }
        Ok(())
    }

    /// Append (VAR+=value).
    pub fn append(&mut self, name: &str, suffix: &str) -> Result<(), ReadonlyError> {
        let current = self.value(name).unwrap_or("").to_string();
        self.set(name, current + suffix)
    }

    /// Declare a variable in the innermost frame (the `local` builtin).
    /// Falls back to a global assignment outside any function.
    pub fn set_local(&mut self, name: &str, value: impl Into<String>) -> Result<(), ReadonlyError> {
        match self.frames.last_mut() {
            Some(frame) => {
                if let Some(var) = frame.get(name) {
                    if var.readonly {
                        return Err(ReadonlyError { name: name.into() });
                    }
                }
                frame.insert(name.to_string(), Variable::new(value));
                Ok(())
            }
            None => self.set(name, value),
        }
    }

    pub fn unset(&mut self, name: &str) -> Result<(), ReadonlyError> {
        if let Some(var) = self.get(name) {
            if var.readonly {
                return Err(ReadonlyError { name: name.into() });
            }
        }
        for frame in self.frames.iter_mut().rev() {
            if frame.remove(name).is_some() {
                return Ok(());
            }
        }
        self.globals.shift_remove(name);
        Ok(())
    }

    pub fn export(&mut self, name: &str) {
        if let Some(var) = self.get_mut_anywhere(name) {
            var.exported = true;
        } else {
            self.globals.insert(
                name.to_string(),
                Variable {
                    value: String::new(),
                    exported: true,
                    readonly: false,
                },
            );
        }
    }

    pub fn unexport(&mut self, name: &str) {
        if let Some(var) = self.get_mut_anywhere(name) {
            var.exported = false;
        }
    }

    pub fn mark_readonly(&mut self, name: &str) {
        if let Some(var) = self.get_mut_anywhere(name) {
            var.readonly = true;
        } else {
            self.globals.insert(
                name.to_string(),
                Variable {
                    value: String::new(),
                    exported: false,
                    readonly: true,
                },
            );
        }
    }

    /// Current variable with attributes, for save/restore around
    /// command-scoped assignments.
    pub fn snapshot(&self, name: &str) -> Option<Variable> {
        self.get(name).cloned()
    }

    /// Put a snapshot back (or remove the name), bypassing readonly
    /// checks; only used to undo temporary assignments.
    pub fn restore_global(&mut self, name: &str, old: Option<Variable>) {
        match old {
            Some(var) => {
                self.globals.insert(name.to_string(), var);
            }
            None => {
                self.globals.shift_remove(name);
            }
        }
    }

    fn get_mut_anywhere(&mut self, name: &str) -> Option<&mut Variable> {
        for frame in self.frames.iter_mut().rev() {
            if frame.contains_key(name) {
                return frame.get_mut(name);
            }
        }
        self.globals.get_mut(name)
    }

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Exported name=value pairs for spawning children, in insertion order.
    pub fn exported_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: IndexMap<&str, &str> = self
            .globals
            .iter()
            .filter(|(_, v)| v.exported)
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
            .collect();
        for frame in &self.frames {
            for (k, v) in frame {
                if v.exported {
                    pairs.insert(k.as_str(), v.value.as_str());
                }
            }
        }
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// All visible variables in insertion order (globals, then locals).
    pub fn visible(&self) -> Vec<(String, Variable)> {
        let mut out: IndexMap<String, Variable> = self
            .globals
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for frame in &self.frames {
            for (k, v) in frame {
                out.insert(k.clone(), v.clone());
            }
        }
        out.into_iter().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut env = Environment::new();
        env.set("X", "1").unwrap();
        assert_eq!(env.value("X"), Some("1"));
        assert!(!env.get("X").unwrap().exported);
    }

    #[test]
    fn readonly_rejects_assignment_and_unset() {
        let mut env = Environment::new();
        env.set("R", "1").unwrap();
        env.mark_readonly("R");
        assert!(env.set("R", "2").is_err());
        assert!(env.unset("R").is_err());
        assert_eq!(env.value("R"), Some("1"));
    }

    #[test]
    fn locals_shadow_globals_and_pop() {
        let mut env = Environment::new();
        env.set("X", "global").unwrap();
        env.push_frame();
        env.set_local("X", "local").unwrap();
        assert_eq!(env.value("X"), Some("local"));
        // Plain assignment updates the local, not the global.
        env.set("X", "updated").unwrap();
        assert_eq!(env.value("X"), Some("updated"));
        env.pop_frame();
        assert_eq!(env.value("X"), Some("global"));
    }

    #[test]
    fn append_concatenates() {
        let mut env = Environment::new();
        env.set("X", "ab").unwrap();
        env.append("X", "cd").unwrap();
        assert_eq!(env.value("X"), Some("abcd"));
        env.append("NEW", "x").unwrap();
        assert_eq!(env.value("NEW"), Some("x"));
    }

    #[test]
    fn exported_pairs_order_preserved() {
        let mut env = Environment::new();
        env.set("B", "2").unwrap();
        env.set("A", "1").unwrap();
        env.export("B");
        env.export("A");
        let pairs = env.exported_pairs();
        assert_eq!(pairs[0].0, "B");
        assert_eq!(pairs[1].0, "A");
    }

    #[test]
    fn unset_removes_innermost() {
        let mut env = Environment::new();
        env.set("X", "global").unwrap();
        env.push_frame();
        env.set_local("X", "local").unwrap();
        env.unset("X").unwrap();
        assert_eq!(env.value("X"), Some("global"));
    }
}
