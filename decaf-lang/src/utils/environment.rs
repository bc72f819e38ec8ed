use std::collections::LinkedList;

type EnvInner<T> = LinkedList<Vec<(String, T)>>;

/// Nested lexical scopes. The innermost scope sits at the front of the list,
/// the outermost (global) one at the back.
#[derive(Clone, Debug, PartialEq)]
pub struct Environment<T>(pub EnvInner<T>);

#[derive(Clone, Debug, PartialEq)]
pub enum LookupRes<T: Clone> {
    Local(T),
    Global(T),
    None,
}

impl<T: Clone> Default for Environment<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Environment<T> {
    pub fn new() -> Self {
        Self(EnvInner::new())
    }
    pub fn is_global(&self) -> bool {
        self.0.len() <= 1
    }
    pub fn depth(&self) -> usize {
        self.0.len()
    }
    pub fn extend(&mut self) {
        self.0.push_front(Vec::new());
    }
    pub fn to_outer(&mut self) {
        let _ = self.0.pop_front();
    }
    /// Binds `name` in the innermost scope. Returns the value back if the name
    /// is already bound in that same scope.
    pub fn add_bind(&mut self, name: &str, v: T) -> Result<(), T> {
        match self.0.front_mut() {
            Some(scope) if scope.iter().any(|(n, _)| n == name) => Err(v),
            Some(scope) => {
                scope.push((name.to_string(), v));
                Ok(())
            }
            None => Err(v),
        }
    }

    pub fn lookup_cls(&self, name: &str) -> LookupRes<&T> {
        let found = self.0.iter().enumerate().find_map(|(level, scope)| {
            scope
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| (level, v))
        });
        match found {
            None => LookupRes::None,
            Some((level, e)) if level + 1 >= self.0.len() => LookupRes::Global(e),
            Some((_, e)) => LookupRes::Local(e),
        }
    }
    pub fn lookup(&self, name: &str) -> Option<&T> {
        match self.lookup_cls(name) {
            LookupRes::None => None,
            LookupRes::Global(e) | LookupRes::Local(e) => Some(e),
        }
    }
}
