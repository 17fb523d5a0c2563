//! Flattening of FHIR search-result Bundles into domain records.
//!
//! A Bundle is a list of entries, each wrapping one resource tagged by `resourceType`. The parser
//! walks the entries once, dispatches on the resource kind and appends to flat lists. A Bundle
//! returned by `Patient/$everything` may embed unrelated Patient resources, so only the Patient
//! whose id matches the requested one is accepted.

use crate::clinical::{Condition, Encounter, Procedure};
use crate::id::PatientId;
use crate::patient::Patient;
use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// The resource kinds the claim workflow understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Patient,
    Encounter,
    Condition,
    Procedure,
    /// Any other resource type; ignored by the parser.
    Other,
}

impl ResourceKind {
    pub fn from_resource_type(resource_type: &str) -> Self {
        match resource_type {
            "Patient" => ResourceKind::Patient,
            "Encounter" => ResourceKind::Encounter,
            "Condition" => ResourceKind::Condition,
            "Procedure" => ResourceKind::Procedure,
            _ => ResourceKind::Other,
        }
    }
}

/// Clinical lists for one patient.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientData {
    /// Most recent first.
    pub encounters: Vec<Encounter>,
    pub conditions: Vec<Condition>,
    pub procedures: Vec<Procedure>,
}

/// Result of parsing a Bundle for one target patient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedBundle {
    /// `None` when the Bundle held no usable Patient with the requested id. Callers are expected
    /// to fall back to reading the Patient resource directly.
    pub patient: Option<Patient>,
    pub data: PatientData,
}

/// Parse a Bundle (as JSON) for the patient identified by `patient_id`.
///
/// Entries without a `resource` or without a `resourceType` are skipped. A Patient entry that
/// matches `patient_id` but cannot be mapped is logged and treated as absent.
///
/// # Errors
///
/// Returns [`FhirError`] if the value is not a Bundle or its `entry` member is not a list.
pub fn parse_bundle(bundle: &Value, patient_id: &PatientId) -> FhirResult<ParsedBundle> {
    let resource_type = bundle.get("resourceType").and_then(Value::as_str);
    if resource_type != Some("Bundle") {
        return Err(FhirError::InvalidInput(format!(
            "Expected resourceType 'Bundle', got '{}'",
            resource_type.unwrap_or("<missing>")
        )));
    }

    let entries: &[Value] = match bundle.get("entry") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(entries)) => entries.as_slice(),
        Some(_) => {
            return Err(FhirError::Translation(
                "Bundle schema mismatch at entry: expected a list".into(),
            ))
        }
    };

    let mut parsed = ParsedBundle::default();
    let mut encounters = Vec::new();
    let mut conditions = Vec::new();
    let mut procedures = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let Some(resource) = entry.get("resource") else {
            continue;
        };
        let Some(resource_type) = resource.get("resourceType").and_then(Value::as_str) else {
            continue;
        };

        match ResourceKind::from_resource_type(resource_type) {
            ResourceKind::Patient => {
                let matches =
                    resource.get("id").and_then(Value::as_str) == Some(patient_id.as_str());
                if !matches || parsed.patient.is_some() {
                    continue;
                }
                match Patient::from_resource(resource) {
                    Ok(patient) => parsed.patient = Some(patient),
                    Err(err) => {
                        tracing::warn!("failed to map Patient/{}: {}", patient_id, err);
                    }
                }
            }
            ResourceKind::Encounter => encounters.push((
                Encounter::from_resource(resource, &fallback_id("encounter", index)),
                has_id(resource),
            )),
            ResourceKind::Condition => conditions.push((
                Condition::from_resource(resource, &fallback_id("condition", index)),
                has_id(resource),
            )),
            ResourceKind::Procedure => procedures.push((
                Procedure::from_resource(resource, &fallback_id("procedure", index)),
                has_id(resource),
            )),
            ResourceKind::Other => {}
        }
    }

    parsed.data.encounters = unique_ids(encounters);
    parsed.data.conditions = unique_ids(conditions);
    parsed.data.procedures = unique_ids(procedures);

    sort_most_recent_first(&mut parsed.data.encounters);

    tracing::debug!(
        patient_found = parsed.patient.is_some(),
        encounters = parsed.data.encounters.len(),
        conditions = parsed.data.conditions.len(),
        procedures = parsed.data.procedures.len(),
        "parsed bundle"
    );

    Ok(parsed)
}

/// Parse a Bundle from JSON text. See [`parse_bundle`].
pub fn parse_bundle_str(json_text: &str, patient_id: &PatientId) -> FhirResult<ParsedBundle> {
    let bundle: Value = serde_json::from_str(json_text)?;
    parse_bundle(&bundle, patient_id)
}

/// The `next` page link of a paged Bundle, if any.
pub fn next_page_link(bundle: &Value) -> Option<&str> {
    bundle
        .get("link")?
        .as_array()?
        .iter()
        .find(|link| link.get("relation").and_then(Value::as_str) == Some("next"))?
        .get("url")?
        .as_str()
}

/// Move the entries of `page` onto the end of `bundle`'s entry list.
pub fn append_entries(bundle: &mut Value, page: Value) {
    let Value::Object(mut page) = page else {
        return;
    };
    let Some(Value::Array(mut more)) = page.remove("entry") else {
        return;
    };
    let Some(bundle) = bundle.as_object_mut() else {
        return;
    };

    match bundle
        .entry("entry")
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(existing) => existing.append(&mut more),
        other => *other = Value::Array(more),
    }
}

/// Sort by date string, descending. Stable, so same-day encounters keep bundle order.
fn sort_most_recent_first(encounters: &mut [Encounter]) {
    encounters.sort_by(|a, b| b.date.cmp(&a.date));
}

fn fallback_id(kind: &str, index: usize) -> String {
    format!("{kind}-{index}")
}

fn has_id(resource: &Value) -> bool {
    resource
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty())
}

/// Records addressed by id within one list.
trait Keyed {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

impl Keyed for Encounter {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Keyed for Condition {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Keyed for Procedure {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Make ids unique within one list, keeping bundle order.
///
/// Each entry is paired with whether the server gave it an id. The first record for a server id
/// wins and later ones are dropped. Generated ids never take an id the server used; on a clash
/// they gain a numeric suffix.
fn unique_ids<T: Keyed>(records: Vec<(T, bool)>) -> Vec<T> {
    let server_ids: HashSet<String> = records
        .iter()
        .filter(|(_, from_server)| *from_server)
        .map(|(record, _)| record.id().to_string())
        .collect();

    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());

    for (mut record, from_server) in records {
        if from_server {
            if !seen.insert(record.id().to_string()) {
                tracing::debug!("dropping duplicate resource id {}", record.id());
                continue;
            }
        } else {
            let base = record.id().to_string();
            let mut candidate = base.clone();
            let mut suffix = 2;
            while server_ids.contains(&candidate) || seen.contains(&candidate) {
                candidate = format!("{base}-{suffix}");
                suffix += 1;
            }
            seen.insert(candidate.clone());
            record.set_id(candidate);
        }
        unique.push(record);
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::Gender;
    use serde_json::json;

    fn target() -> PatientId {
        PatientId::new("12345").expect("valid id")
    }

    fn entry(resource: Value) -> Value {
        json!({ "fullUrl": "urn:uuid:x", "resource": resource })
    }

    fn sample_bundle() -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "searchset",
            "entry": [
                entry(json!({
                    "resourceType": "Patient",
                    "id": "99999",
                    "name": [{ "given": ["Someone"], "family": "Else" }]
                })),
                entry(json!({
                    "resourceType": "Patient",
                    "id": "12345",
                    "name": [{ "given": ["John"], "family": ["Appleseed"] }],
                    "birthDate": "1985-04-12",
                    "gender": "male",
                    "address": [{
                        "line": ["123 Main St"],
                        "city": "Anytown",
                        "state": "CA",
                        "postalCode": "90210"
                    }]
                })),
                entry(json!({
                    "resourceType": "Encounter",
                    "id": "enc2",
                    "period": { "start": "2023-08-15T10:00:00Z" },
                    "type": [{ "text": "Follow-up" }],
                    "participant": [{ "individual": { "display": "Dr. Emily Carter" } }]
                })),
                entry(json!({
                    "resourceType": "Encounter",
                    "id": "enc1",
                    "period": { "start": "2023-10-26T09:30:00Z" },
                    "type": [{ "text": "Office Visit" }],
                    "participant": [{ "individual": { "display": "Dr. Emily Carter" } }]
                })),
                entry(json!({
                    "resourceType": "Condition",
                    "id": "cond1",
                    "code": { "coding": [{ "code": "J02.9" }], "text": "Acute pharyngitis, unspecified" }
                })),
                entry(json!({
                    "resourceType": "Procedure",
                    "id": "proc1",
                    "code": { "coding": [{ "code": "87880" }], "text": "Rapid strep test" }
                })),
                entry(json!({ "resourceType": "Observation", "id": "obs1" }))
            ]
        })
    }

    #[test]
    fn parses_matching_patient_and_lists() {
        let parsed = parse_bundle(&sample_bundle(), &target()).expect("should parse bundle");

        let patient = parsed.patient.expect("patient should be found");
        assert_eq!(patient.id, "12345");
        assert_eq!(patient.name, "John Appleseed");
        assert_eq!(patient.birth_date, "1985-04-12");
        assert_eq!(patient.gender, Gender::Male);
        assert_eq!(patient.address, "123 Main St, Anytown, CA 90210");

        assert_eq!(parsed.data.encounters.len(), 2);
        assert_eq!(parsed.data.conditions.len(), 1);
        assert_eq!(parsed.data.procedures.len(), 1);
        assert_eq!(parsed.data.conditions[0].code, "J02.9");
        assert_eq!(parsed.data.procedures[0].description, "Rapid strep test");
    }

    #[test]
    fn encounters_are_most_recent_first() {
        let parsed = parse_bundle(&sample_bundle(), &target()).expect("should parse bundle");
        let dates: Vec<&str> = parsed
            .data
            .encounters
            .iter()
            .map(|e| e.date.as_str())
            .collect();
        assert_eq!(dates, vec!["2023-10-26", "2023-08-15"]);
    }

    #[test]
    fn unrelated_patient_is_not_accepted() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [entry(json!({ "resourceType": "Patient", "id": "99999" }))]
        });
        let parsed = parse_bundle(&bundle, &target()).expect("should parse bundle");
        assert!(parsed.patient.is_none());
    }

    #[test]
    fn empty_bundle_has_no_patient_and_empty_lists() {
        let bundle = json!({ "resourceType": "Bundle", "type": "searchset", "total": 0 });
        let parsed = parse_bundle(&bundle, &target()).expect("should parse bundle");
        assert_eq!(parsed, ParsedBundle::default());
    }

    #[test]
    fn malformed_matching_patient_yields_none_but_keeps_lists() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                entry(json!({ "resourceType": "Patient", "id": "12345", "name": "John" })),
                entry(json!({ "resourceType": "Condition", "id": "c1" }))
            ]
        });
        let parsed = parse_bundle(&bundle, &target()).expect("should parse bundle");
        assert!(parsed.patient.is_none());
        assert_eq!(parsed.data.conditions.len(), 1);
    }

    #[test]
    fn entries_without_resource_or_type_are_skipped() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                { "fullUrl": "urn:uuid:a" },
                entry(json!({ "id": "untyped" })),
                "not an entry",
                entry(json!({ "resourceType": "Procedure" }))
            ]
        });
        let parsed = parse_bundle(&bundle, &target()).expect("should parse bundle");
        assert_eq!(parsed.data.procedures.len(), 1);
        assert_eq!(parsed.data.procedures[0].id, "procedure-3");
    }

    #[test]
    fn duplicate_server_ids_keep_the_first_record() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                entry(json!({
                    "resourceType": "Procedure", "id": "p1",
                    "code": { "coding": [{ "code": "87880" }], "text": "Rapid strep test" }
                })),
                entry(json!({
                    "resourceType": "Procedure", "id": "p1",
                    "code": { "coding": [{ "code": "99213" }], "text": "Office visit" }
                })),
                entry(json!({ "resourceType": "Procedure", "id": "p2" }))
            ]
        });
        let parsed = parse_bundle(&bundle, &target()).expect("should parse bundle");
        let ids: Vec<&str> = parsed.data.procedures.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert_eq!(parsed.data.procedures[0].code, "87880");
    }

    #[test]
    fn generated_ids_do_not_collide_with_server_ids() {
        let bundle = json!({
            "resourceType": "Bundle",
            "entry": [
                entry(json!({ "resourceType": "Condition", "id": "condition-1", "code": { "text": "Cough" } })),
                entry(json!({ "resourceType": "Condition", "code": { "text": "Fever" } })),
                entry(json!({ "resourceType": "Condition", "id": "condition-1-2" })),
                entry(json!({ "resourceType": "Condition", "id": "  " }))
            ]
        });
        let parsed = parse_bundle(&bundle, &target()).expect("should parse bundle");
        let ids: Vec<&str> = parsed.data.conditions.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["condition-1", "condition-1-3", "condition-1-2", "condition-3"]);
        assert_eq!(parsed.data.conditions[1].description, "Fever");
    }

    #[test]
    fn rejects_non_bundle() {
        let err = parse_bundle(&json!({ "resourceType": "Patient" }), &target())
            .expect_err("should reject non-bundle");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("Patient")),
            other => panic!("expected InvalidInput error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_list_entry() {
        let bundle = json!({ "resourceType": "Bundle", "entry": {} });
        assert!(matches!(
            parse_bundle(&bundle, &target()),
            Err(FhirError::Translation(_))
        ));
    }

    #[test]
    fn parse_bundle_str_reports_bad_json() {
        assert!(matches!(
            parse_bundle_str("{ not json", &target()),
            Err(FhirError::InvalidJson(_))
        ));
    }

    #[test]
    fn follows_next_link_and_appends_entries() {
        let mut first = json!({
            "resourceType": "Bundle",
            "link": [
                { "relation": "self", "url": "http://fhir/Patient/1/$everything" },
                { "relation": "next", "url": "http://fhir/page2" }
            ],
            "entry": [entry(json!({ "resourceType": "Condition", "id": "c1" }))]
        });
        assert_eq!(next_page_link(&first), Some("http://fhir/page2"));

        let second = json!({
            "resourceType": "Bundle",
            "entry": [entry(json!({ "resourceType": "Condition", "id": "c2" }))]
        });
        assert_eq!(next_page_link(&second), None);

        append_entries(&mut first, second);
        let parsed = parse_bundle(&first, &target()).expect("should parse bundle");
        let ids: Vec<&str> = parsed
            .data
            .conditions
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[test]
    fn append_entries_creates_missing_entry_list() {
        let mut first = json!({ "resourceType": "Bundle" });
        append_entries(
            &mut first,
            json!({ "entry": [entry(json!({ "resourceType": "Procedure", "id": "p1" }))] }),
        );
        assert_eq!(first["entry"].as_array().map(Vec::len), Some(1));
    }
}
