//! Field name case conversion.

/// Case conversion rules for `rename_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub(crate) enum RenameRule {
    /// `lowercase`
    LowerCase,
    /// `UPPERCASE`
    UpperCase,
    /// `camelCase`
    CamelCase,
    /// `PascalCase`
    PascalCase,
    /// `snake_case`
    SnakeCase,
    /// `SCREAMING_SNAKE_CASE`
    ScreamingSnakeCase,
}

impl RenameRule {
    pub(crate) const EXPECTED: &'static str =
        "lowercase, UPPERCASE, camelCase, PascalCase, snake_case, SCREAMING_SNAKE_CASE";

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "lowercase" => Some(Self::LowerCase),
            "UPPERCASE" => Some(Self::UpperCase),
            "camelCase" => Some(Self::CamelCase),
            "PascalCase" => Some(Self::PascalCase),
            "snake_case" => Some(Self::SnakeCase),
            "SCREAMING_SNAKE_CASE" => Some(Self::ScreamingSnakeCase),
            _ => None,
        }
    }

    /// Apply the rule to a Rust field name (snake case).
    pub(crate) fn apply(self, name: &str) -> String {
        match self {
            Self::LowerCase => name.replace('_', "").to_lowercase(),
            Self::UpperCase => name.replace('_', "").to_uppercase(),
            Self::CamelCase => to_camel_case(name),
            Self::PascalCase => to_pascal_case(name),
            Self::SnakeCase => name.to_string(),
            Self::ScreamingSnakeCase => name.to_uppercase(),
        }
    }
}

fn to_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.trim_start_matches('_').chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::*;

    #[test]
    fn parses_known_rules() {
        check!(RenameRule::parse("camelCase") == Some(RenameRule::CamelCase));
        check!(RenameRule::parse("SCREAMING_SNAKE_CASE") == Some(RenameRule::ScreamingSnakeCase));
        check!(RenameRule::parse("kebab-case").is_none());
    }

    #[test]
    fn applies_rules() {
        check!(RenameRule::CamelCase.apply("full_path") == "fullPath");
        check!(RenameRule::CamelCase.apply("iid") == "iid");
        check!(RenameRule::CamelCase.apply("include_ancestor_groups") == "includeAncestorGroups");
        check!(RenameRule::PascalCase.apply("full_path") == "FullPath");
        check!(RenameRule::SnakeCase.apply("full_path") == "full_path");
        check!(RenameRule::ScreamingSnakeCase.apply("full_path") == "FULL_PATH");
        check!(RenameRule::LowerCase.apply("full_path") == "fullpath");
        check!(RenameRule::UpperCase.apply("full_path") == "FULLPATH");
    }
}
