use crate::primitives;
use crate::source::Span;
use crate::value::{PrimitiveFunc, Procedure, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    #[error("Unbound name: '{0}'")]
    UnboundName(String, Span), // Name, span where lookup happened
    #[error("Cannot define '{0}' in the sealed root scope")]
    Sealed(String, Span),
}

impl ScopeError {
    pub fn span(&self) -> Span {
        match self {
            ScopeError::UnboundName(_, span) | ScopeError::Sealed(_, span) => *span,
        }
    }
}

/// One frame of the lexical scope chain.
#[derive(Debug)]
pub struct Scope {
    // A child holds its parent alive; closures hold their defining frame alive.
    outer: Option<Rc<RefCell<Scope>>>,
    bindings: HashMap<String, Value>,
    sealed: bool,
}

impl Scope {
    /// Creates a new, empty top-level scope.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Scope {
            outer: None,
            bindings: HashMap::new(),
            sealed: false,
        }))
    }

    /// Creates the root scope holding every built-in, sealed against further definitions.
    pub fn new_root_populated() -> Rc<RefCell<Scope>> {
        let scope_ptr = Scope::new();
        {
            let mut scope = scope_ptr.borrow_mut();
            scope.add_primitive("add", primitives::prim_add);
            scope.add_primitive("sub", primitives::prim_sub);
            scope.add_primitive("mul", primitives::prim_mul);
            scope.add_primitive("def", primitives::prim_def);
            scope.add_primitive("do", primitives::prim_do);
            scope.add_primitive("print", primitives::prim_print);

            scope.add_primitive("list", primitives::prim_list);
            scope.add_primitive("car", primitives::prim_car);
            scope.add_primitive("cdr", primitives::prim_cdr);

            scope.add_primitive("eq", primitives::prim_eq);
            scope.add_primitive("id", primitives::prim_id);
            scope.add_primitive("when", primitives::prim_when);
            scope.add_primitive("if", primitives::prim_if);
            scope.sealed = true;
        }
        scope_ptr
    }

    /// Creates a new scope enclosed within an outer one.
    pub fn new_enclosed(outer: Rc<RefCell<Scope>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Scope {
            outer: Some(outer),
            bindings: HashMap::new(),
            sealed: false,
        }))
    }

    /// Binds `name` in *this* frame, replacing any earlier binding here.
    pub fn define(&mut self, name: String, value: Value, span: Span) -> Result<(), ScopeError> {
        if self.sealed {
            return Err(ScopeError::Sealed(name, span));
        }
        self.bindings.insert(name, value);
        Ok(())
    }

    /// Looks a name up here, then outward through each enclosing scope.
    /// `lookup_span` is where the name was referenced, for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Value, ScopeError> {
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        match &self.outer {
            Some(outer) => outer.borrow().get(name, lookup_span),
            None => Err(ScopeError::UnboundName(name.to_string(), lookup_span)),
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn add_primitive(&mut self, name: &'static str, func: PrimitiveFunc) {
        self.bindings.insert(
            name.to_string(),
            Value::Function(Procedure::Primitive(func, name)),
        );
    }

    /// Every name visible from this scope.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer) = &self.outer {
            identifiers.extend(outer.borrow().get_identifiers());
        }
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn define(scope: &Rc<RefCell<Scope>>, name: &str, value: Value) {
        scope
            .borrow_mut()
            .define(name.to_string(), value, Span::default())
            .expect("define should succeed");
    }

    #[test]
    fn test_define_and_get() {
        let scope = Scope::new();
        define(&scope, "x", Value::Integer(10));
        assert_eq!(
            scope.borrow().get("x", Span::default()),
            Ok(Value::Integer(10))
        );
    }

    #[test]
    fn test_get_unbound() {
        let scope = Scope::new_enclosed(Scope::new());
        let span = Span::new(11, 12);
        assert_eq!(
            scope.borrow().get("z", span),
            Err(ScopeError::UnboundName("z".to_string(), span))
        );
    }

    #[test]
    fn test_lookup_walks_outward() {
        let global = Scope::new();
        define(&global, "x", Value::Integer(10));
        let local = Scope::new_enclosed(global.clone());
        define(&local, "y", Value::Integer(20));

        assert_eq!(local.borrow().get("y", Span::default()), Ok(Value::Integer(20)));
        assert_eq!(local.borrow().get("x", Span::default()), Ok(Value::Integer(10)));
        assert!(global.borrow().get("y", Span::default()).is_err());
    }

    #[test]
    fn test_shadowing() {
        let global = Scope::new();
        define(&global, "x", Value::Integer(10));
        let local = Scope::new_enclosed(global.clone());
        define(&local, "x", Value::Integer(50));
        let inner = Scope::new_enclosed(local.clone());

        assert_eq!(inner.borrow().get("x", Span::default()), Ok(Value::Integer(50)));
        assert_eq!(global.borrow().get("x", Span::default()), Ok(Value::Integer(10)));
    }

    #[test]
    fn test_sibling_scopes_are_isolated() {
        let root = Scope::new();
        let left = Scope::new_enclosed(root.clone());
        let right = Scope::new_enclosed(root);
        define(&left, "x", Value::Integer(7));
        assert!(matches!(
            right.borrow().get("x", Span::default()),
            Err(ScopeError::UnboundName(name, _)) if name == "x"
        ));
    }

    #[test]
    fn test_parent_outlives_dropped_handle() {
        let child = {
            let parent = Scope::new();
            define(&parent, "kept", Value::Integer(1));
            Scope::new_enclosed(parent)
        };
        assert_eq!(child.borrow().get("kept", Span::default()), Ok(Value::Integer(1)));
    }

    #[test]
    fn test_root_is_populated_and_sealed() {
        let root = Scope::new_root_populated();
        for name in [
            "add", "sub", "def", "do", "print", "list", "car", "cdr", "eq", "id", "when", "if",
        ] {
            assert!(
                matches!(root.borrow().get(name, Span::default()), Ok(Value::Function(_))),
                "missing built-in '{}'",
                name
            );
        }
        assert!(root.borrow().is_sealed());
        let result = root
            .borrow_mut()
            .define("add".to_string(), Value::Integer(0), Span::default());
        assert!(matches!(result, Err(ScopeError::Sealed(name, _)) if name == "add"));
    }

    #[test]
    fn test_get_identifiers_includes_outer() {
        let local = Scope::new_enclosed(Scope::new_root_populated());
        define(&local, "mine", Value::Integer(0));
        let identifiers = local.borrow().get_identifiers();
        assert!(identifiers.contains("mine"));
        assert!(identifiers.contains("car"));
    }
}
