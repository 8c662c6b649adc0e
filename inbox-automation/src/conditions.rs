use inbox_core::types::TriggerType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing;

/// The item fields rules can predicate on, projected out of the row and
/// its owning account so evaluation stays free of storage concerns.
#[derive(Debug, Clone)]
pub struct ItemView<'a> {
    pub content_text: &'a str,
    pub author_name: &'a str,
    pub author_username: Option<&'a str>,
    pub item_type: &'a str,
    pub platform: &'a str,
    pub sentiment: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    ContentText,
    AuthorName,
    AuthorUsername,
    ItemType,
    Platform,
    Sentiment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: Operator,
    pub value: String,
}

/// The structured predicate stored in a rule's `trigger_conditions`
/// column. An empty condition list matches everything.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerConditions {
    #[serde(rename = "match", default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Whether a rule fires for an item. The trigger type gates which items
/// are even considered; the condition list refines the match.
pub fn rule_matches(
    trigger: TriggerType,
    conditions: &TriggerConditions,
    item: &ItemView<'_>,
) -> bool {
    match trigger {
        TriggerType::ItemCreated => {}
        // A matcher trigger with nothing to match is a misconfigured
        // rule, not a match-everything rule.
        TriggerType::KeywordMatch | TriggerType::AuthorMatch => {
            if conditions.conditions.is_empty() {
                return false;
            }
        }
        // Sentiment is supplied by an upstream enrichment step through
        // item metadata; unscored items never match.
        TriggerType::Sentiment => {
            if item.sentiment.is_none() {
                return false;
            }
        }
    }

    evaluate_conditions(conditions, item)
}

pub fn evaluate_conditions(spec: &TriggerConditions, item: &ItemView<'_>) -> bool {
    if spec.conditions.is_empty() {
        return true;
    }

    match spec.match_mode {
        MatchMode::All => spec.conditions.iter().all(|c| condition_matches(c, item)),
        MatchMode::Any => spec.conditions.iter().any(|c| condition_matches(c, item)),
    }
}

fn condition_matches(condition: &Condition, item: &ItemView<'_>) -> bool {
    let actual = match condition.field {
        ConditionField::ContentText => item.content_text,
        ConditionField::AuthorName => item.author_name,
        ConditionField::AuthorUsername => item.author_username.unwrap_or(""),
        ConditionField::ItemType => item.item_type,
        ConditionField::Platform => item.platform,
        ConditionField::Sentiment => item.sentiment.unwrap_or(""),
    };

    apply_operator(condition.operator, actual, &condition.value)
}

fn apply_operator(operator: Operator, actual: &str, expected: &str) -> bool {
    match operator {
        Operator::Equals => actual.eq_ignore_ascii_case(expected),
        Operator::NotEquals => !actual.eq_ignore_ascii_case(expected),
        Operator::Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
        Operator::NotContains => !actual.to_lowercase().contains(&expected.to_lowercase()),
        Operator::StartsWith => actual.to_lowercase().starts_with(&expected.to_lowercase()),
        Operator::Regex => match Regex::new(expected) {
            Ok(re) => re.is_match(actual),
            Err(e) => {
                tracing::warn!("Invalid rule regex {:?}: {}", expected, e);
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ItemView<'static> {
        ItemView {
            content_text: "I want a refund for my order",
            author_name: "Jane Doe",
            author_username: Some("jane"),
            item_type: "comment",
            platform: "facebook",
            sentiment: None,
        }
    }

    fn condition(field: ConditionField, operator: Operator, value: &str) -> Condition {
        Condition {
            field,
            operator,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        assert!(evaluate_conditions(&TriggerConditions::default(), &item()));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let spec = TriggerConditions {
            match_mode: MatchMode::All,
            conditions: vec![condition(
                ConditionField::ContentText,
                Operator::Contains,
                "REFUND",
            )],
        };
        assert!(evaluate_conditions(&spec, &item()));
    }

    #[test]
    fn test_all_requires_every_condition() {
        let spec = TriggerConditions {
            match_mode: MatchMode::All,
            conditions: vec![
                condition(ConditionField::ContentText, Operator::Contains, "refund"),
                condition(ConditionField::Platform, Operator::Equals, "twitter"),
            ],
        };
        assert!(!evaluate_conditions(&spec, &item()));
    }

    #[test]
    fn test_any_requires_one_condition() {
        let spec = TriggerConditions {
            match_mode: MatchMode::Any,
            conditions: vec![
                condition(ConditionField::ContentText, Operator::Contains, "shipping"),
                condition(ConditionField::Platform, Operator::Equals, "facebook"),
            ],
        };
        assert!(evaluate_conditions(&spec, &item()));
    }

    #[test]
    fn test_regex_operator() {
        let spec = TriggerConditions {
            match_mode: MatchMode::All,
            conditions: vec![condition(
                ConditionField::ContentText,
                Operator::Regex,
                r"(?i)refund|chargeback",
            )],
        };
        assert!(evaluate_conditions(&spec, &item()));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let spec = TriggerConditions {
            match_mode: MatchMode::All,
            conditions: vec![condition(ConditionField::ContentText, Operator::Regex, "(")],
        };
        assert!(!evaluate_conditions(&spec, &item()));
    }

    #[test]
    fn test_item_created_with_no_conditions_fires() {
        assert!(rule_matches(
            TriggerType::ItemCreated,
            &TriggerConditions::default(),
            &item()
        ));
    }

    #[test]
    fn test_keyword_trigger_needs_conditions() {
        assert!(!rule_matches(
            TriggerType::KeywordMatch,
            &TriggerConditions::default(),
            &item()
        ));
    }

    #[test]
    fn test_sentiment_trigger_needs_score() {
        let spec = TriggerConditions {
            match_mode: MatchMode::All,
            conditions: vec![condition(
                ConditionField::Sentiment,
                Operator::Equals,
                "negative",
            )],
        };
        assert!(!rule_matches(TriggerType::Sentiment, &spec, &item()));

        let mut scored = item();
        scored.sentiment = Some("negative");
        assert!(rule_matches(TriggerType::Sentiment, &spec, &scored));
    }

    #[test]
    fn test_conditions_parse_from_stored_json() {
        let raw = serde_json::json!({
            "match": "any",
            "conditions": [
                {"field": "content_text", "operator": "contains", "value": "refund"},
                {"field": "author_username", "operator": "equals", "value": "jane"}
            ]
        });

        let spec: TriggerConditions = serde_json::from_value(raw).unwrap();
        assert_eq!(spec.match_mode, MatchMode::Any);
        assert_eq!(spec.conditions.len(), 2);
        assert!(evaluate_conditions(&spec, &item()));
    }
}
