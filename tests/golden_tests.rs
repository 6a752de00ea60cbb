//! Golden tests - fixture-based tests that lock expected behavior
//!
//! These tests use JSON fixtures to verify that critical functions produce
//! expected outputs. Any change in behavior will cause these tests to fail,
//! signaling a potential breaking change.
//!
//! Run with: cargo test --test golden_tests

use serde::Deserialize;
use std::fs;

fn load_fixture<T: for<'de> Deserialize<'de>>(name: &str) -> T {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    let content =
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e));
    serde_json::from_str(&content).unwrap_or_else(|e| panic!("Failed to parse {}: {}", path, e))
}

// ============================================================================
// TENANT ID NORMALIZATION GOLDEN TESTS
// ============================================================================

mod tenant_id_golden {
    use super::*;
    use supportdesk::types::normalize_tenant_id;

    #[derive(Debug, Deserialize)]
    struct TestCase {
        name: String,
        input: String,
        expected: Expected,
    }

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    enum Expected {
        Ok { ok: String },
        Err { err: String },
    }

    #[derive(Debug, Deserialize)]
    struct Fixture {
        test_cases: Vec<TestCase>,
    }

    #[test]
    fn test_tenant_id_normalization_golden() {
        let fixture: Fixture = load_fixture("tenant_ids.json");

        for case in fixture.test_cases {
            let result = normalize_tenant_id(&case.input);
            match case.expected {
                Expected::Ok { ok } => {
                    assert_eq!(result.as_ref().ok(), Some(&ok), "Case '{}'", case.name);
                }
                Expected::Err { err } => {
                    let actual = result.err().map(|e| format!("{:?}", e));
                    assert_eq!(actual.as_deref(), Some(err.as_str()), "Case '{}'", case.name);
                }
            }
        }
    }
}

// ============================================================================
// ROUTING AND PRIORITY GOLDEN TESTS
// ============================================================================

mod routing_golden {
    use super::*;
    use supportdesk::agents::{keyword_route, AgentKind};
    use supportdesk::escalation::priority_from_text;
    use supportdesk::types::TicketPriority;

    #[derive(Debug, Deserialize)]
    struct Route {
        message: String,
        agent: AgentKind,
    }

    #[derive(Debug, Deserialize)]
    struct Priority {
        message: String,
        priority: TicketPriority,
    }

    #[derive(Debug, Deserialize)]
    struct Fixture {
        routes: Vec<Route>,
        priorities: Vec<Priority>,
    }

    #[test]
    fn test_keyword_routes_golden() {
        let fixture: Fixture = load_fixture("routing.json");
        for route in fixture.routes {
            assert_eq!(keyword_route(&route.message), route.agent, "{:?}", route.message);
        }
    }

    #[test]
    fn test_ticket_priority_golden() {
        let fixture: Fixture = load_fixture("routing.json");
        for case in fixture.priorities {
            assert_eq!(
                priority_from_text(&case.message),
                case.priority,
                "{:?}",
                case.message
            );
        }
    }
}

// ============================================================================
// FORM PARSING GOLDEN TESTS
// ============================================================================

mod form_golden {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use supportdesk::forms::ProfessionalForm;

    #[derive(Debug, Deserialize, PartialEq)]
    struct ExpectedField {
        name: String,
        label: String,
        field_type: String,
    }

    #[derive(Debug, Deserialize)]
    struct Expected {
        title: String,
        form_type: String,
        sections: Vec<String>,
        fields: Vec<ExpectedField>,
    }

    #[derive(Debug, Deserialize)]
    struct TestCase {
        name: String,
        input: Value,
        expected: Expected,
    }

    #[derive(Debug, Deserialize)]
    struct Fixture {
        test_cases: Vec<TestCase>,
    }

    #[test]
    fn test_form_parsing_golden() {
        let fixture: Fixture = load_fixture("forms.json");

        for case in fixture.test_cases {
            let form = ProfessionalForm::from_json(&case.input)
                .unwrap_or_else(|e| panic!("Case '{}': {}", case.name, e));

            assert_eq!(form.title, case.expected.title, "Case '{}'", case.name);
            assert_eq!(form.form_type, case.expected.form_type, "Case '{}'", case.name);
            let sections: Vec<String> = form.sections.iter().map(|s| s.title.clone()).collect();
            assert_eq!(sections, case.expected.sections, "Case '{}'", case.name);

            let fields: Vec<ExpectedField> = form
                .sections
                .iter()
                .flat_map(|s| &s.fields)
                .map(|f| ExpectedField {
                    name: f.name.clone(),
                    label: f.label.clone(),
                    field_type: f.field_type.clone(),
                })
                .collect();
            assert_eq!(fields, case.expected.fields, "Case '{}'", case.name);
            assert_eq!(form.field_count(), case.expected.fields.len());
        }
    }
}
