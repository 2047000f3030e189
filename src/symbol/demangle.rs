// Tue Feb 3 2026 - Alex

use crate::symbol::StructuredName;
use std::iter::Peekable;
use std::str::Chars;

/// The external demangling service. Maps a mangled linkage identifier to a
/// structured name, or `None` when the input is not recognized.
pub trait Demangler: Send + Sync {
    fn demangle(&self, mangled: &str) -> Option<StructuredName>;
}

/// Built-in demangler covering the subset the analysis needs: Itanium
/// `_ZTI`-prefixed type_info symbols and MSVC decorated type names.
#[derive(Debug, Default)]
pub struct BuiltinDemangler;

impl Demangler for BuiltinDemangler {
    fn demangle(&self, mangled: &str) -> Option<StructuredName> {
        if let Some(rest) = mangled.strip_prefix("_ZTI") {
            return demangle_itanium_type(rest);
        }
        if mangled.starts_with(".?A") {
            return demangle_msvc_type(mangled);
        }
        None
    }
}

/// Demangles an Itanium `<type>` encoding: a plain `<length><name>`, a
/// nested `N...E` sequence, or an `St` (std) abbreviated name.
fn demangle_itanium_type(encoded: &str) -> Option<StructuredName> {
    let mut chars = encoded.chars().peekable();
    let mut components = Vec::new();

    match chars.peek()? {
        'N' => {
            chars.next();
            if chars.peek() == Some(&'S') {
                chars.next();
                if chars.next() != Some('t') {
                    return None;
                }
                components.push("std".to_string());
            }
            while chars.peek().is_some() && chars.peek() != Some(&'E') {
                components.push(parse_source_name(&mut chars)?);
            }
            if chars.next() != Some('E') {
                return None;
            }
        }
        'S' => {
            chars.next();
            if chars.next() != Some('t') {
                return None;
            }
            components.push("std".to_string());
            components.push(parse_source_name(&mut chars)?);
        }
        '0'..='9' => {
            components.push(parse_source_name(&mut chars)?);
        }
        _ => return None,
    }

    let name = components.pop()?;
    Some(StructuredName {
        namespace: components,
        name,
    })
}

/// Parses a single `<length><chars>` component.
fn parse_source_name(chars: &mut Peekable<Chars>) -> Option<String> {
    let mut length_str = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            length_str.push(c);
            chars.next();
        } else {
            break;
        }
    }

    let length: usize = length_str.parse().ok()?;
    let name: String = chars.take(length).collect();
    (name.len() == length && length > 0).then_some(name)
}

/// Demangles an MSVC decorated type name such as `.?AVDerived@N@@`.
/// The namespace components follow the type name, innermost first.
fn demangle_msvc_type(decorated: &str) -> Option<StructuredName> {
    let body = decorated
        .strip_prefix(".?AV")
        .or_else(|| decorated.strip_prefix(".?AU"))
        .or_else(|| decorated.strip_prefix(".?AW4"))?;
    let body = body.strip_suffix("@@")?;
    if body.is_empty() {
        return None;
    }

    let mut parts = body.split('@');
    let name = parts.next()?.to_string();
    if name.is_empty() {
        return None;
    }
    let mut namespace: Vec<String> = parts.map(str::to_string).collect();
    if namespace.iter().any(String::is_empty) {
        return None;
    }
    namespace.reverse();
    Some(StructuredName { namespace, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itanium_simple() {
        let demangler = BuiltinDemangler;
        let name = demangler.demangle("_ZTI5Shape").unwrap();
        assert!(name.namespace.is_empty());
        assert_eq!(name.name, "Shape");
    }

    #[test]
    fn test_itanium_nested() {
        let demangler = BuiltinDemangler;
        let name = demangler.demangle("_ZTIN9namespace5ClassE").unwrap();
        assert_eq!(name.namespace, vec!["namespace"]);
        assert_eq!(name.name, "Class");

        let name = demangler.demangle("_ZTINSt6vectorE").unwrap();
        assert_eq!(name.namespace, vec!["std"]);
        assert_eq!(name.name, "vector");
    }

    #[test]
    fn test_itanium_std_abbreviation() {
        let demangler = BuiltinDemangler;
        let name = demangler.demangle("_ZTISt9type_info").unwrap();
        assert_eq!(name.namespace, vec!["std"]);
        assert_eq!(name.name, "type_info");
    }

    #[test]
    fn test_msvc_decorated() {
        let demangler = BuiltinDemangler;
        let name = demangler.demangle(".?AVDerived@N@@").unwrap();
        assert_eq!(name.namespace, vec!["N"]);
        assert_eq!(name.name, "Derived");

        let name = demangler.demangle(".?AUPoint@@").unwrap();
        assert!(name.namespace.is_empty());
        assert_eq!(name.name, "Point");
    }

    #[test]
    fn test_unrecognized_input() {
        let demangler = BuiltinDemangler;
        assert!(demangler.demangle("not mangled").is_none());
        assert!(demangler.demangle("_ZTI").is_none());
        assert!(demangler.demangle(".?AV@@").is_none());
    }
}
