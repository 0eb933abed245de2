//! Built-in table of known-bad nested parameter shapes.
//!
//! Each entry pairs the invalid paths an agent tends to produce for a node
//! family with the canonical shape the node actually accepts.

use serde::{Deserialize, Serialize};

/// How an offending value is reshaped into the canonical structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutofixStrategy {
    /// `rules.conditions[.values]` → `rules.values[{ conditions, outputKey }]`.
    SwitchRules,
    /// `conditions.values` → `conditions.conditions[]` with a combinator.
    FilterConditions,
    /// `a.b.c` → `a.b = [..c]`: drop one wrapping level and force an array.
    FlattenCollection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralPattern {
    /// Normalized node kinds this entry applies to.
    pub node_type_aliases: Vec<String>,
    pub display_name: String,
    /// Top-level parameter the pattern lives under.
    pub property_path: String,
    /// Dotted paths that must not resolve, deepest first.
    pub invalid_patterns: Vec<String>,
    pub expected_structure: String,
    pub autofix_strategy: AutofixStrategy,
}

fn entry(
    aliases: &[&str],
    display_name: &str,
    property_path: &str,
    invalid_patterns: &[&str],
    expected_structure: &str,
    autofix_strategy: AutofixStrategy,
) -> StructuralPattern {
    StructuralPattern {
        node_type_aliases: aliases.iter().map(|a| a.to_string()).collect(),
        display_name: display_name.to_string(),
        property_path: property_path.to_string(),
        invalid_patterns: invalid_patterns.iter().map(|p| p.to_string()).collect(),
        expected_structure: expected_structure.to_string(),
        autofix_strategy,
    }
}

pub fn builtin_patterns() -> Vec<StructuralPattern> {
    use AutofixStrategy::*;

    vec![
        entry(
            &["switch"],
            "Switch",
            "rules",
            &["rules.conditions.values", "rules.conditions"],
            r#"{ "rules": { "values": [{ "conditions": {...}, "outputKey": "output1" }] } }"#,
            SwitchRules,
        ),
        entry(
            &["if"],
            "If",
            "conditions",
            &["conditions.values"],
            r#"{ "conditions": { "combinator": "and", "conditions": [...] } }"#,
            FilterConditions,
        ),
        entry(
            &["filter"],
            "Filter",
            "conditions",
            &["conditions.values"],
            r#"{ "conditions": { "combinator": "and", "conditions": [...] } }"#,
            FilterConditions,
        ),
        entry(
            &["summarize"],
            "Summarize",
            "fieldsToSummarize",
            &["fieldsToSummarize.values.values"],
            r#"{ "fieldsToSummarize": { "values": [{ "field": "...", "aggregation": "sum" }] } }"#,
            FlattenCollection,
        ),
        entry(
            &["aggregate"],
            "Aggregate",
            "fieldsToAggregate",
            &["fieldsToAggregate.fieldToAggregate.values"],
            r#"{ "fieldsToAggregate": { "fieldToAggregate": [{ "fieldToAggregate": "..." }] } }"#,
            FlattenCollection,
        ),
        entry(
            &["comparedatasets"],
            "Compare Datasets",
            "mergeByFields",
            &["mergeByFields.values.values"],
            r#"{ "mergeByFields": { "values": [{ "field1": "...", "field2": "..." }] } }"#,
            FlattenCollection,
        ),
        entry(
            &["sort"],
            "Sort",
            "sortFieldsUi",
            &["sortFieldsUi.sortField.values"],
            concat!(
                r#"{ "sortFieldsUi": { "sortField": "#,
                r#"[{ "fieldName": "...", "order": "ascending" }] } }"#,
            ),
            FlattenCollection,
        ),
        entry(
            &["set"],
            "Set",
            "fields",
            &["fields.values.values"],
            r#"{ "fields": { "values": [{ "name": "...", "stringValue": "..." }] } }"#,
            FlattenCollection,
        ),
        entry(
            &["html", "htmlextract"],
            "HTML Extract",
            "extractionValues",
            &["extractionValues.values.values"],
            r#"{ "extractionValues": { "values": [{ "key": "...", "cssSelector": "..." }] } }"#,
            FlattenCollection,
        ),
        entry(
            &["httprequest"],
            "HTTP Request",
            "body",
            &["body.parameters.values"],
            r#"{ "body": { "parameters": [{ "name": "...", "value": "..." }] } }"#,
            FlattenCollection,
        ),
        entry(
            &["airtable"],
            "Airtable",
            "sort",
            &["sort.sortField.values"],
            r#"{ "sort": { "sortField": [{ "field": "...", "direction": "asc" }] } }"#,
            FlattenCollection,
        ),
    ]
}
