use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-defined alert rule as stored. A rule carries a simple
/// (field, operator, value) predicate, a condition-group tree, or both;
/// a rule with neither matches every aircraft.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::alert_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    pub owner: Option<String>,
    /// private | shared | public
    pub visibility: String,
    pub enabled: bool,
    /// info | warning | critical
    pub priority: String,
    pub field: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
    /// Condition-group tree, JSON: {logic, groups: [{logic, conditions: [...]}]}
    pub conditions: Option<serde_json::Value>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cooldown_seconds: i32,
    pub api_url: Option<String>,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    /// Minimal rule for construction sites and tests
    pub fn simple(
        name: &str,
        field: &str,
        operator: &str,
        value: &str,
        cooldown_seconds: i32,
    ) -> Self {
        let now = Utc::now();
        AlertRule {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: None,
            visibility: "private".to_string(),
            enabled: true,
            priority: "info".to_string(),
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            value: Some(value.to_string()),
            conditions: None,
            starts_at: None,
            expires_at: None,
            cooldown_seconds,
            api_url: None,
            last_triggered: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// How groups/conditions combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Logic {
    #[serde(alias = "AND", alias = "and")]
    And,
    #[serde(alias = "OR", alias = "or")]
    Or,
}

impl Default for Logic {
    fn default() -> Self {
        Logic::And
    }
}

/// Wire shape of one condition inside a group
#[derive(Debug, Clone, Deserialize)]
pub struct WireCondition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireGroup {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub conditions: Vec<WireCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTree {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub groups: Vec<WireGroup>,
}

/// A condition with its operator parsed and any regex pre-compiled
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub field: String,
    pub operator: super::eval::Operator,
    pub value: String,
    pub regex: Option<regex::Regex>,
}

impl CompiledCondition {
    pub fn build(field: &str, operator: &str, value: &str) -> Result<Self> {
        let operator = super::eval::Operator::parse(operator)
            .with_context(|| format!("unknown operator '{}'", operator))?;
        let regex = if operator == super::eval::Operator::Regex {
            Some(
                RegexBuilder::new(value)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid regex '{}'", value))?,
            )
        } else {
            None
        };
        Ok(CompiledCondition {
            field: field.to_lowercase(),
            operator,
            value: value.to_string(),
            regex,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub logic: Logic,
    pub conditions: Vec<CompiledCondition>,
}

#[derive(Debug, Clone)]
pub struct CompiledTree {
    pub logic: Logic,
    pub groups: Vec<CompiledGroup>,
}

/// A rule ready for evaluation: operators parsed, regexes compiled, the
/// schedule window and cooldown carried along.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: Uuid,
    pub name: String,
    pub priority: String,
    pub cooldown_seconds: i64,
    pub api_url: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub simple: Option<CompiledCondition>,
    pub tree: Option<CompiledTree>,
}

impl CompiledRule {
    /// Compile a stored rule. Rules with malformed operators, regexes, or
    /// condition JSON are rejected here so the hot path never sees them.
    pub fn compile(rule: &AlertRule) -> Result<Self> {
        let simple = match (&rule.field, &rule.operator) {
            (Some(field), Some(operator)) => Some(CompiledCondition::build(
                field,
                operator,
                rule.value.as_deref().unwrap_or(""),
            )?),
            _ => None,
        };

        let tree = match &rule.conditions {
            Some(raw) if !raw.is_null() => {
                let wire: WireTree = serde_json::from_value(raw.clone())
                    .with_context(|| format!("invalid conditions for rule '{}'", rule.name))?;
                let groups = wire
                    .groups
                    .iter()
                    .map(|group| {
                        let conditions = group
                            .conditions
                            .iter()
                            .map(|c| {
                                let value = match &c.value {
                                    serde_json::Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                };
                                CompiledCondition::build(&c.field, &c.operator, &value)
                            })
                            .collect::<Result<Vec<_>>>()?;
                        Ok(CompiledGroup {
                            logic: group.logic,
                            conditions,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(CompiledTree {
                    logic: wire.logic,
                    groups,
                })
            }
            _ => None,
        };

        Ok(CompiledRule {
            id: rule.id,
            name: rule.name.clone(),
            priority: rule.priority.clone(),
            cooldown_seconds: rule.cooldown_seconds as i64,
            api_url: rule.api_url.clone(),
            starts_at: rule.starts_at,
            expires_at: rule.expires_at,
            simple,
            tree,
        })
    }

    /// Is the rule inside its schedule window?
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if let Some(starts) = self.starts_at
            && now < starts
        {
            return false;
        }
        if let Some(expires) = self.expires_at
            && now > expires
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_simple_rule() {
        let rule = AlertRule::simple("watch", "icao", "eq", "ABC123", 300);
        let compiled = CompiledRule::compile(&rule).unwrap();
        assert!(compiled.simple.is_some());
        assert!(compiled.tree.is_none());
    }

    #[test]
    fn test_compile_rejects_bad_operator() {
        let rule = AlertRule::simple("watch", "icao", "matches_vaguely", "ABC123", 300);
        assert!(CompiledRule::compile(&rule).is_err());
    }

    #[test]
    fn test_compile_rejects_bad_regex() {
        let rule = AlertRule::simple("watch", "callsign", "regex", "([", 300);
        assert!(CompiledRule::compile(&rule).is_err());
    }

    #[test]
    fn test_compile_tree_with_default_logic() {
        let mut rule = AlertRule::simple("watch", "icao", "eq", "ABC123", 300);
        rule.field = None;
        rule.operator = None;
        rule.conditions = Some(json!({
            "groups": [
                {"conditions": [
                    {"field": "altitude", "operator": "lt", "value": 5000},
                    {"field": "military", "operator": "eq", "value": "true"}
                ]}
            ]
        }));
        let compiled = CompiledRule::compile(&rule).unwrap();
        let tree = compiled.tree.unwrap();
        assert_eq!(tree.logic, Logic::And);
        assert_eq!(tree.groups[0].logic, Logic::And);
        assert_eq!(tree.groups[0].conditions.len(), 2);
        // Numeric JSON values are carried as their string form
        assert_eq!(tree.groups[0].conditions[0].value, "5000");
    }

    #[test]
    fn test_schedule_window() {
        let now = Utc::now();
        let mut rule = AlertRule::simple("watch", "icao", "eq", "ABC123", 300);
        rule.starts_at = Some(now + chrono::Duration::hours(1));
        let compiled = CompiledRule::compile(&rule).unwrap();
        assert!(!compiled.is_active(now));
        assert!(compiled.is_active(now + chrono::Duration::hours(2)));

        rule.starts_at = None;
        rule.expires_at = Some(now - chrono::Duration::hours(1));
        let compiled = CompiledRule::compile(&rule).unwrap();
        assert!(!compiled.is_active(now));
    }
}
