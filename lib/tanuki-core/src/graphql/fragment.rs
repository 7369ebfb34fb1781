use std::collections::BTreeMap;

use crate::{Error, Result};

/// A named fragment: `fragment <name> on <type_condition> { <selection> }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    name: String,
    type_condition: String,
    selection: String,
}

impl Fragment {
    /// Create a fragment. The selection may spread other fragments.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            selection: selection.into(),
        }
    }

    /// Fragment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type the fragment applies to.
    #[must_use]
    pub fn type_condition(&self) -> &str {
        &self.type_condition
    }

    /// Selection set, without the surrounding braces.
    #[must_use]
    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// The fragment definition as it appears in a document.
    #[must_use]
    pub fn definition(&self) -> String {
        let mut out = format!("fragment {} on {} {{\n", self.name, self.type_condition);
        super::push_indented(&mut out, &self.selection);
        out.push('}');
        out
    }
}

/// Fragments by name.
///
/// Registering a name twice replaces the earlier fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentRegistry {
    fragments: BTreeMap<String, Fragment>,
}

impl FragmentRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment, builder style.
    #[must_use]
    pub fn with(mut self, fragment: Fragment) -> Self {
        self.register(fragment);
        self
    }

    /// Add a fragment, returning the one it replaced.
    pub fn register(&mut self, fragment: Fragment) -> Option<Fragment> {
        self.fragments.insert(fragment.name.clone(), fragment)
    }

    /// Look a fragment up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }

    /// Number of registered fragments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// No fragment registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Every fragment reachable from `selection`, each once, in discovery order.
    pub(crate) fn resolve(&self, selection: &str) -> Result<Vec<&Fragment>> {
        let mut resolved = Vec::new();
        let mut stack = Vec::new();
        self.visit(selection, &mut stack, &mut resolved)?;
        Ok(resolved)
    }

    fn visit<'a>(
        &'a self,
        selection: &str,
        stack: &mut Vec<&'a str>,
        resolved: &mut Vec<&'a Fragment>,
    ) -> Result<()> {
        for name in spreads(selection) {
            if stack.iter().any(|entry| *entry == name) {
                return Err(Error::FragmentCycle(name.to_string()));
            }
            if resolved.iter().any(|fragment| fragment.name == name) {
                continue;
            }
            let fragment = self
                .fragments
                .get(name)
                .ok_or_else(|| Error::UnknownFragment(name.to_string()))?;

            resolved.push(fragment);
            stack.push(&fragment.name);
            self.visit(&fragment.selection, stack, resolved)?;
            stack.pop();
        }
        Ok(())
    }
}

/// Names of the fragment spreads (`...Name`) in a selection.
///
/// Inline fragments (`... on Type`) and directive-only spreads are skipped.
fn spreads(selection: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = selection;

    while let Some(position) = rest.find("...") {
        rest = rest.get(position + 3..).unwrap_or_default();
        let candidate = rest.trim_start();
        let end = candidate
            .char_indices()
            .find(|(index, c)| !(c.is_ascii_alphabetic() || *c == '_' || (*index > 0 && c.is_ascii_digit())))
            .map_or(candidate.len(), |(index, _)| index);
        let name = candidate.get(..end).unwrap_or_default();

        if !name.is_empty() && name != "on" {
            names.push(name);
        }
    }

    names
}
