use std::collections::HashMap;

use crate::ast::Type;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Binding {
    pub ty: Type,
    pub value: Value,
}

pub type Scope = HashMap<String, Binding>;

/// Two-level scope chain: the global scope plus one frame per active call.
/// Only the innermost frame is visible, so callees never see caller locals.
pub struct Environment {
    globals: Scope,
    frames: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            globals: HashMap::new(),
            frames: Vec::new(),
        }
    }

    /// Defines `name` in the innermost frame, or globally outside any call.
    pub fn define(&mut self, name: String, ty: Type, value: Value) {
        let scope = self.frames.last_mut().unwrap_or(&mut self.globals);
        scope.insert(name, Binding { ty, value });
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        if let Some(frame) = self.frames.last_mut() {
            if frame.contains_key(name) {
                return frame.get_mut(name);
            }
        }
        self.globals.get_mut(name)
    }

    pub fn push_frame(&mut self, frame: Scope) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_shadows_global() {
        let mut env = Environment::new();
        env.define("x".to_string(), Type::Integer, Value::Integer(1));
        env.push_frame(Scope::new());
        env.define("x".to_string(), Type::Integer, Value::Integer(2));
        assert_eq!(env.get("x").unwrap().value, Value::Integer(2));
        env.pop_frame();
        assert_eq!(env.get("x").unwrap().value, Value::Integer(1));
    }

    #[test]
    fn test_callee_cannot_see_caller_frame() {
        let mut env = Environment::new();
        env.push_frame(Scope::new());
        env.define("local".to_string(), Type::Integer, Value::Integer(5));
        env.push_frame(Scope::new());
        assert!(env.get("local").is_none());
        assert_eq!(env.depth(), 2);
    }

    #[test]
    fn test_get_mut_falls_back_to_globals() {
        let mut env = Environment::new();
        env.define("g".to_string(), Type::Float, Value::Float(0.0));
        env.push_frame(Scope::new());
        env.get_mut("g").unwrap().value = Value::Float(1.5);
        env.pop_frame();
        assert_eq!(env.get("g").unwrap().value, Value::Float(1.5));
    }

    #[test]
    fn test_pop_frame_discards_locals() {
        let mut env = Environment::new();
        env.push_frame(Scope::new());
        env.define("tmp".to_string(), Type::Boolean, Value::Boolean(true));
        env.pop_frame();
        assert_eq!(env.depth(), 0);
        assert!(env.get("tmp").is_none());
        env.pop_frame();
        assert_eq!(env.depth(), 0);
    }
}
