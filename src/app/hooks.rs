use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Context;

/// Fired once per request, before routing.
pub const BEFORE: &str = "before";
/// Fired before each route attempt.
pub const BEFORE_DISPATCH: &str = "before.dispatch";
/// Fired after each route attempt that did not fail.
pub const AFTER_DISPATCH: &str = "after.dispatch";
/// Fired once per request, after the response is complete.
pub const AFTER: &str = "after";

/// A hook callable.
pub type Hook = Arc<dyn Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Named hook slots. Each name holds at most one callable; assigning again
/// replaces it, and firing an empty slot does nothing.
#[derive(Default, Clone)]
pub struct Hooks {
    slots: HashMap<String, Hook>,
}

impl Hooks {
    pub fn set(&mut self, name: &str, hook: Hook) {
        self.slots.insert(name.to_string(), hook);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Hook> {
        self.slots.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.slots.remove(name).is_some()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").field("names", &self.names()).finish()
    }
}
