//! Package spec parsing.
//!
//! Parses package specifications like:
//! - `react`
//! - `react@18.2.0`
//! - `react@beta`
//! - `@types/node`
//! - `@types/node@20.0.0`
//!
//! Specifiers with range operators (`^18.0.0`, `>=1.2`) are accepted, but the
//! operators are stripped rather than solved: what remains is treated as an
//! exact version or a dist-tag name.

use super::error::PkgError;

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Bare package name without the scope (e.g. `node` for `@types/node`).
    pub name: String,
    /// Scope without the `@` prefix, if scoped.
    pub scope: Option<String>,
    /// Version or dist-tag (range operators stripped; `None` means latest).
    pub specifier: Option<String>,
}

impl PackageSpec {
    /// Parse a package specification string.
    ///
    /// # Errors
    /// Returns an error if the spec is empty or malformed.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        if let Some(rest) = input.strip_prefix('@') {
            Self::parse_scoped(input, rest)
        } else {
            Self::parse_unscoped(input)
        }
    }

    /// Build a spec for a dependency-map entry (`name` → `specifier`).
    ///
    /// Dependency names may themselves be scoped. The specifier has its range
    /// operators stripped; an empty result means "latest".
    ///
    /// # Errors
    /// Returns an error if the dependency name is malformed.
    pub fn for_dependency(name: &str, specifier: &str) -> Result<Self, PkgError> {
        let mut spec = Self::parse(name)?;
        let stripped = strip_range(specifier);
        spec.specifier = if stripped.is_empty() {
            None
        } else {
            Some(stripped.to_string())
        };
        Ok(spec)
    }

    fn parse_scoped(input: &str, rest: &str) -> Result<Self, PkgError> {
        let Some((scope, after_slash)) = rest.split_once('/') else {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: missing '/' in '{input}'"
            )));
        };

        if scope.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty scope in '{input}'"
            )));
        }

        let (name, specifier) = split_specifier(input, after_slash)?;
        validate_name(&name)?;

        Ok(Self {
            name,
            scope: Some(scope.to_string()),
            specifier,
        })
    }

    fn parse_unscoped(input: &str) -> Result<Self, PkgError> {
        let (name, specifier) = split_specifier(input, input)?;
        validate_name(&name)?;

        Ok(Self {
            name,
            scope: None,
            specifier,
        })
    }

    /// Full registry name, including the scope when present.
    ///
    /// For `@types/node` returns `@types/node`; for `react` returns `react`.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Check if this is a scoped package.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())?;
        if let Some(specifier) = &self.specifier {
            write!(f, "@{specifier}")?;
        }
        Ok(())
    }
}

/// Split `name@specifier` into name and stripped specifier.
fn split_specifier(input: &str, part: &str) -> Result<(String, Option<String>), PkgError> {
    match part.split_once('@') {
        Some((name, raw)) => {
            if name.is_empty() {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid package spec: empty name in '{input}'"
                )));
            }
            if raw.is_empty() {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid package spec: empty version in '{input}'"
                )));
            }

            let stripped = strip_range(raw);
            let specifier = if stripped.is_empty() {
                None
            } else {
                Some(stripped.to_string())
            };
            Ok((name.to_string(), specifier))
        }
        None => Ok((part.to_string(), None)),
    }
}

fn validate_name(name: &str) -> Result<(), PkgError> {
    if name.is_empty() {
        return Err(PkgError::spec_invalid("Empty package name"));
    }

    // Basic validation: no spaces, no special chars except - _ .
    for c in name.chars() {
        if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(PkgError::spec_invalid(format!(
                "Invalid character '{c}' in package name '{name}'"
            )));
        }
    }

    Ok(())
}

/// Strip range operators from a version specifier.
///
/// `^18.2.0` → `18.2.0`, `>= 1.2.3` → `1.2.3`, `v2.0.0` → `2.0.0`.
/// Tag names (`beta`, `nightly`) pass through untouched. The result is NOT a
/// solved range; it is whatever remains once the operators are removed.
#[must_use]
pub fn strip_range(specifier: &str) -> &str {
    let stripped = specifier
        .trim()
        .trim_start_matches(['^', '~', '>', '<', '='])
        .trim_start();

    // A leading `v` only counts as decoration when a digit follows (`v1.2.3`),
    // not when it starts a tag name (`vintage`).
    match stripped.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => stripped,
    }
}
