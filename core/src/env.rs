use super::eval::{Type, Value, error::Kind};
use std::{cell::RefCell, collections::HashMap, collections::hash_map::Entry};

/// Default limit of nested function calls.
pub const MAX_CALL_DEPTH: usize = 200;

/// A frame of bindings.
/// Frames borrow their parent, so a child never outlives the frame it reads through.
#[derive(Debug)]
pub struct Environment<'p> {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<&'p Environment<'p>>,

    /// Number of calls this frame is nested in.
    depth: usize,
    max_depth: usize,
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> Environment<'p> {
    /// Create a root frame.
    pub fn new() -> Self {
        Self::with_max_depth(MAX_CALL_DEPTH)
    }

    /// Create a root frame allowing at most `max_depth` nested calls.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
            depth: 0,
            max_depth,
        }
    }

    pub fn with_parent(parent: &'p Environment<'p>) -> Self {
        Self {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
            depth: parent.depth,
            max_depth: parent.max_depth,
        }
    }

    /// Frame for a function called from this frame.
    /// Its parent is the root frame.
    ///
    /// # Errors
    /// + [`Kind::RecursionLimit`] if the call would exceed the maximum depth.
    pub fn call_frame(&self) -> Result<Environment<'_>, Kind> {
        if self.depth >= self.max_depth {
            return Err(Kind::RecursionLimit(self.max_depth));
        }

        let mut frame = Environment::with_parent(self.root());
        frame.depth = self.depth + 1;
        Ok(frame)
    }

    /// Number of calls this frame is nested in.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<&'p Environment<'p>> {
        self.parent
    }

    /// Outermost frame of the chain.
    pub fn root(&self) -> &Environment<'p> {
        let mut env = self;
        while let Some(parent) = env.parent {
            env = parent;
        }
        env
    }

    /// Bind a new name in this frame.
    ///
    /// # Errors
    /// + [`Kind::Redeclared`] if the name is already bound in this frame.
    ///   Bindings in parent frames are shadowed.
    pub fn declare(&self, name: impl Into<String>, value: Value) -> Result<(), Kind> {
        match self.bindings.borrow_mut().entry(name.into()) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
            Entry::Occupied(entry) => Err(Kind::Redeclared(entry.key().clone())),
        }
    }

    /// If the name is bound in this frame, ignoring parents.
    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// If the name is bound anywhere in the chain.
    pub fn exists(&self, name: &str) -> bool {
        self.contains_local(name) || self.parent.is_some_and(|parent| parent.exists(name))
    }

    /// Look up a name, innermost frame first.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.bindings.borrow().get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.and_then(|parent| parent.get(name)),
        }
    }

    /// Overwrite the nearest binding of `name`, converting `value` to the
    /// type of the binding.
    /// Returns the stored value.
    ///
    /// # Errors
    /// + [`Kind::Undeclared`] if no frame binds the name.
    /// + [`Kind::NotAssignable`] if the binding holds a function.
    /// + [`Kind::InvalidStore`] if `value` can not be converted.
    pub fn assign(&self, name: &str, value: Value) -> Result<Value, Kind> {
        if !self.contains_local(name) {
            return match self.parent {
                Some(parent) => parent.assign(name, value),
                None => Err(Kind::Undeclared(name.to_string())),
            };
        }

        let mut bindings = self.bindings.borrow_mut();
        let Some(slot) = bindings.get_mut(name) else {
            return Err(Kind::Undeclared(name.to_string()));
        };

        let to = slot.kind();
        if to == Type::Function {
            return Err(Kind::NotAssignable(name.to_string()));
        }

        let Some(value) = value.convert(to) else {
            return Err(Kind::InvalidStore {
                name: name.to_string(),
                from: value.kind(),
                to,
            });
        };

        *slot = value.clone();
        Ok(value)
    }

    /// Names bound in this frame.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.bindings.borrow().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}
