//! Rule predicate evaluation: logical-field extraction from an observation,
//! the operator table, and the condition-group tree combinators.

use anyhow::{Result, bail};

use super::rules::{CompiledCondition, CompiledRule, CompiledTree, Logic};
use crate::observations::AircraftObservation;

/// Comparison operators supported by rule conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Startswith,
    Endswith,
    Regex,
}

impl Operator {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(match raw.trim().to_lowercase().as_str() {
            "eq" | "==" | "equals" => Operator::Eq,
            "neq" | "!=" | "not_equals" => Operator::Neq,
            "lt" | "<" => Operator::Lt,
            "le" | "lte" | "<=" => Operator::Le,
            "gt" | ">" => Operator::Gt,
            "ge" | "gte" | ">=" => Operator::Ge,
            "contains" => Operator::Contains,
            "startswith" | "starts_with" => Operator::Startswith,
            "endswith" | "ends_with" => Operator::Endswith,
            "regex" => Operator::Regex,
            other => bail!("unsupported operator: {}", other),
        })
    }
}

/// A logical field value pulled off an observation. Carries both the string
/// form (for equality/substring operators) and, when meaningful, the numeric
/// form (for ordering operators).
#[derive(Debug, Clone)]
pub struct FieldValue {
    text: String,
    number: Option<f64>,
}

impl FieldValue {
    fn text(value: impl Into<String>) -> Self {
        FieldValue {
            text: value.into(),
            number: None,
        }
    }

    fn numeric(value: f64) -> Self {
        FieldValue {
            text: format_number(value),
            number: Some(value),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Map a logical field name to the concrete observation attribute. Returns
/// None when the aircraft has no value for the field; a missing value
/// compares false under every operator.
pub fn get_field(
    obs: &AircraftObservation,
    distance_nm: Option<f64>,
    field: &str,
) -> Option<FieldValue> {
    match field {
        "icao" | "hex" => Some(FieldValue::text(obs.icao.clone())),
        "callsign" | "flight" => obs.callsign.clone().map(FieldValue::text),
        "squawk" => obs.squawk.clone().map(FieldValue::text),
        "altitude" => obs.altitude().map(|alt| FieldValue::numeric(alt as f64)),
        "distance" => distance_nm.map(FieldValue::numeric),
        "speed" | "gs" => obs.ground_speed.map(FieldValue::numeric),
        "vertical_rate" => obs.vertical_rate.map(|vr| FieldValue::numeric(vr as f64)),
        "type" => obs.aircraft_type.clone().map(FieldValue::text),
        "category" => obs.category.clone().map(FieldValue::text),
        "military" => Some(FieldValue::text(if obs.is_military {
            "true"
        } else {
            "false"
        })),
        _ => None,
    }
}

/// Apply one compiled condition to one observation.
pub fn condition_matches(
    condition: &CompiledCondition,
    obs: &AircraftObservation,
    distance_nm: Option<f64>,
) -> bool {
    let Some(value) = get_field(obs, distance_nm, &condition.field) else {
        return false;
    };
    compare(&value, condition)
}

fn compare(value: &FieldValue, condition: &CompiledCondition) -> bool {
    let target = condition.value.as_str();
    match condition.operator {
        Operator::Eq => value.text.eq_ignore_ascii_case(target),
        Operator::Neq => !value.text.eq_ignore_ascii_case(target),
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            let lhs = value
                .number
                .or_else(|| value.text.trim().parse::<f64>().ok());
            let rhs = target.trim().parse::<f64>().ok();
            match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => match condition.operator {
                    Operator::Lt => lhs < rhs,
                    Operator::Le => lhs <= rhs,
                    Operator::Gt => lhs > rhs,
                    Operator::Ge => lhs >= rhs,
                    _ => unreachable!(),
                },
                // Non-numeric on either side compares false
                _ => false,
            }
        }
        Operator::Contains => value
            .text
            .to_lowercase()
            .contains(&target.to_lowercase()),
        Operator::Startswith => value
            .text
            .to_lowercase()
            .starts_with(&target.to_lowercase()),
        Operator::Endswith => value.text.to_lowercase().ends_with(&target.to_lowercase()),
        Operator::Regex => condition
            .regex
            .as_ref()
            .is_some_and(|re| re.is_match(&value.text)),
    }
}

fn group_matches(
    logic: Logic,
    conditions: &[CompiledCondition],
    obs: &AircraftObservation,
    distance_nm: Option<f64>,
) -> bool {
    // An empty condition list is vacuously true
    if conditions.is_empty() {
        return true;
    }
    match logic {
        Logic::And => conditions
            .iter()
            .all(|c| condition_matches(c, obs, distance_nm)),
        Logic::Or => conditions
            .iter()
            .any(|c| condition_matches(c, obs, distance_nm)),
    }
}

/// Evaluate the condition-group tree. Empty `groups` is true.
pub fn tree_matches(
    tree: &CompiledTree,
    obs: &AircraftObservation,
    distance_nm: Option<f64>,
) -> bool {
    if tree.groups.is_empty() {
        return true;
    }
    match tree.logic {
        Logic::And => tree
            .groups
            .iter()
            .all(|g| group_matches(g.logic, &g.conditions, obs, distance_nm)),
        Logic::Or => tree
            .groups
            .iter()
            .any(|g| group_matches(g.logic, &g.conditions, obs, distance_nm)),
    }
}

/// A rule matches iff its simple predicate AND its condition tree both hold;
/// each defaults true when absent, so a bare rule matches everything.
pub fn rule_matches(
    rule: &CompiledRule,
    obs: &AircraftObservation,
    distance_nm: Option<f64>,
) -> bool {
    if let Some(simple) = &rule.simple
        && !condition_matches(simple, obs, distance_nm)
    {
        return false;
    }
    if let Some(tree) = &rule.tree
        && !tree_matches(tree, obs, distance_nm)
    {
        return false;
    }
    true
}
