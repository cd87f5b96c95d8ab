//! Variable storage for the interpreter
//!
//! Globals live in one flat map. Every subprogram activation gets a frame
//! holding a stack of block scopes, so leaving a block drops its bindings
//! immediately. Frames are numbered per subprogram to give each activation a
//! distinct [`Scope`].

use crate::backend::Scope;
use std::collections::HashMap;

/// One subprogram activation
#[derive(Debug)]
struct Frame<V> {
    scope: Scope,
    /// Block scopes, innermost last; index 0 holds the parameters
    blocks: Vec<HashMap<String, V>>,
}

/// Globals plus the stack of active frames
#[derive(Debug)]
pub struct Env<V> {
    globals: HashMap<String, V>,
    frames: Vec<Frame<V>>,
    /// Activations started so far, per subprogram
    instances: HashMap<String, u32>,
    /// Set while global initialisers run
    initialising: bool,
}

impl<V: Clone> Env<V> {
    pub fn new() -> Self {
        Env {
            globals: HashMap::new(),
            frames: Vec::new(),
            instances: HashMap::new(),
            initialising: false,
        }
    }

    pub fn set_initialising(&mut self, initialising: bool) {
        self.initialising = initialising;
    }

    fn global_scope(&self) -> Scope {
        Scope::Global {
            init: self.initialising,
        }
    }

    /// Scope that a declaration made right now would land in
    pub fn current_scope(&self) -> Scope {
        match self.frames.last() {
            Some(frame) => frame.scope.clone(),
            None => self.global_scope(),
        }
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn declare_global(&mut self, name: String, value: V) -> Scope {
        self.globals.insert(name, value);
        self.global_scope()
    }

    /// Start a new activation of `subprogram`
    pub fn push_frame(&mut self, subprogram: &str) -> Scope {
        let counter = self.instances.entry(subprogram.to_string()).or_insert(0);
        *counter += 1;
        let scope = Scope::Local {
            subprogram: subprogram.to_string(),
            instance: *counter,
        };
        self.frames.push(Frame {
            scope: scope.clone(),
            blocks: vec![HashMap::new()],
        });
        scope
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn push_block(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.blocks.push(HashMap::new());
        }
    }

    /// Leave the innermost block; the parameter block stays until the frame goes
    pub fn pop_block(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.blocks.len() > 1 {
                frame.blocks.pop();
            }
        }
    }

    /// Bind `name` in the innermost block, or globally outside any frame
    pub fn declare(&mut self, name: String, value: V) -> Scope {
        match self.frames.last_mut() {
            Some(frame) => {
                if let Some(block) = frame.blocks.last_mut() {
                    block.insert(name, value);
                }
                frame.scope.clone()
            }
            None => self.declare_global(name, value),
        }
    }

    /// Find `name`, innermost block first, then globals
    pub fn lookup(&self, name: &str) -> Option<(V, Scope)> {
        if let Some(frame) = self.frames.last() {
            for block in frame.blocks.iter().rev() {
                if let Some(v) = block.get(name) {
                    return Some((v.clone(), frame.scope.clone()));
                }
            }
        }
        self.globals.get(name).map(|v| (v.clone(), self.global_scope()))
    }

    /// Overwrite an existing binding, returning where it lives
    pub fn assign(&mut self, name: &str, value: V) -> Option<Scope> {
        if let Some(frame) = self.frames.last_mut() {
            for block in frame.blocks.iter_mut().rev() {
                if let Some(slot) = block.get_mut(name) {
                    *slot = value;
                    return Some(frame.scope.clone());
                }
            }
        }
        let scope = self.global_scope();
        self.globals.get_mut(name).map(|slot| {
            *slot = value;
            scope
        })
    }
}

impl<V: Clone> Default for Env<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str, instance: u32) -> Scope {
        Scope::Local {
            subprogram: name.to_string(),
            instance,
        }
    }

    #[test]
    fn test_globals_outside_frames() {
        let mut env: Env<i32> = Env::new();
        env.set_initialising(true);
        assert_eq!(env.declare("g".to_string(), 1), Scope::Global { init: true });
        env.set_initialising(false);
        assert_eq!(env.lookup("g"), Some((1, Scope::Global { init: false })));
        assert_eq!(env.lookup("missing"), None);
    }

    #[test]
    fn test_frame_instances_count_per_subprogram() {
        let mut env: Env<i32> = Env::new();
        assert_eq!(env.push_frame("f"), local("f", 1));
        assert_eq!(env.push_frame("f"), local("f", 2));
        assert_eq!(env.push_frame("g"), local("g", 1));
        assert_eq!(env.depth(), 3);
        env.pop_frame();
        env.pop_frame();
        env.pop_frame();
        assert_eq!(env.push_frame("f"), local("f", 3));
    }

    #[test]
    fn test_frames_do_not_see_callers_locals() {
        let mut env: Env<i32> = Env::new();
        env.declare_global("g".to_string(), 0);
        env.push_frame("main");
        env.declare("x".to_string(), 1);
        env.push_frame("f");
        assert_eq!(env.lookup("x"), None);
        assert!(env.lookup("g").is_some());
        env.pop_frame();
        assert_eq!(env.lookup("x"), Some((1, local("main", 1))));
    }

    #[test]
    fn test_block_shadowing_and_pop() {
        let mut env: Env<i32> = Env::new();
        env.push_frame("main");
        env.declare("x".to_string(), 1);
        env.push_block();
        env.declare("x".to_string(), 2);
        assert_eq!(env.lookup("x").map(|(v, _)| v), Some(2));
        env.pop_block();
        assert_eq!(env.lookup("x").map(|(v, _)| v), Some(1));

        // The parameter block survives extra pops
        env.pop_block();
        assert_eq!(env.lookup("x").map(|(v, _)| v), Some(1));
    }

    #[test]
    fn test_assign_prefers_innermost() {
        let mut env: Env<i32> = Env::new();
        env.declare_global("x".to_string(), 0);
        env.push_frame("main");
        assert_eq!(env.assign("x", 5), Some(Scope::Global { init: false }));
        env.declare("x".to_string(), 1);
        assert_eq!(env.assign("x", 7), Some(local("main", 1)));
        env.pop_frame();
        assert_eq!(env.lookup("x").map(|(v, _)| v), Some(5));
        assert_eq!(env.assign("nope", 1), None);
    }
}
