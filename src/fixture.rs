// Mon Feb 9 2026 - Alex

//! JSON conformance fixtures: expected field offsets per class, checked
//! against recovered layouts.
//!
//! ```json
//! {
//!   "N::Derived": { "offsets": { "super_Base": "8" } }
//! }
//! ```

use crate::session::AnalysisSession;
use crate::symbol::SymbolPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected layout of one class: field name to decimal byte offset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureClass {
    #[serde(default)]
    pub offsets: IndexMap<String, String>,
}

/// A whole fixture document, keyed by qualified class path.
pub type Fixture = IndexMap<String, FixtureClass>;

pub fn parse(json: &str) -> Result<Fixture, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn to_json(fixture: &Fixture) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(fixture)
}

/// One divergence between a fixture and the recovered model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    MissingClass {
        class: String,
    },
    MissingField {
        class: String,
        field: String,
    },
    WrongOffset {
        class: String,
        field: String,
        expected: String,
        found: u64,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingClass { class } => write!(f, "class {} was not recovered", class),
            Self::MissingField { class, field } => {
                write!(f, "{} has no field {}", class, field)
            }
            Self::WrongOffset {
                class,
                field,
                expected,
                found,
            } => write!(
                f,
                "{}.{}: expected offset {}, found {}",
                class, field, expected, found
            ),
        }
    }
}

/// Checks every class in the fixture against the session's recovered
/// layouts, building layouts on demand. Returns the full mismatch list;
/// an empty list means conformance.
pub fn verify(session: &AnalysisSession, fixture: &Fixture) -> Vec<Mismatch> {
    let mut mismatches = Vec::new();

    for (class_name, expected) in fixture {
        let path = SymbolPath::parse(class_name);
        let Some(class) = session.class_by_path(&path) else {
            mismatches.push(Mismatch::MissingClass {
                class: class_name.clone(),
            });
            continue;
        };
        let layout = match session.build_layout(&class) {
            Ok(layout) => layout,
            Err(e) => {
                log::warn!("Could not build layout for {}: {}", class_name, e);
                mismatches.push(Mismatch::MissingClass {
                    class: class_name.clone(),
                });
                continue;
            }
        };

        for (field_name, expected_offset) in &expected.offsets {
            match layout.field_named(field_name) {
                None => mismatches.push(Mismatch::MissingField {
                    class: class_name.clone(),
                    field: field_name.clone(),
                }),
                Some(field) if field.offset.to_string() != expected_offset.trim() => {
                    mismatches.push(Mismatch::WrongOffset {
                        class: class_name.clone(),
                        field: field_name.clone(),
                        expected: expected_offset.clone(),
                        found: field.offset,
                    });
                }
                Some(_) => {}
            }
        }
    }
    mismatches
}

/// Captures the recovered layouts as a fixture document. The inverse of
/// [`verify`]: a captured fixture verifies cleanly against its own session.
pub fn capture(session: &AnalysisSession) -> Fixture {
    let mut fixture = Fixture::new();
    let mut classes = session.recovered_classes();
    classes.sort_by(|a, b| a.path().cmp(b.path()));

    for class in classes {
        let Some(layout) = class.layout() else {
            continue;
        };
        let mut offsets = IndexMap::new();
        for field in &layout.fields {
            offsets.insert(field.name.clone(), field.offset.to_string());
        }
        fixture.insert(class.path().to_string(), FixtureClass { offsets });
    }
    fixture
}
