use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Reference to the form field an answer belongs to. Form platforms expose a
/// generated `id` and a human-assigned `ref`; submissions may carry either.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

impl FieldRef {
    pub fn matches(&self, alias: &str) -> bool {
        self.id.as_deref() == Some(alias) || self.reference.as_deref() == Some(alias)
    }

    pub fn key_contains(&self, fragment: &str) -> bool {
        let fragment = fragment.to_lowercase();
        [self.id.as_deref(), self.reference.as_deref()]
            .into_iter()
            .flatten()
            .any(|key| key.to_lowercase().contains(&fragment))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choices {
    #[serde(default)]
    pub labels: Vec<String>,
}

/// One answer as delivered by the form provider. Exactly which value slot is
/// filled depends on the answer type and on the schema version of the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub field: FieldRef,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub answer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Choices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Answer {
    pub fn is_text(&self) -> bool {
        self.answer_type.as_deref() == Some("text")
            || (self.answer_type.is_none() && self.text.is_some())
    }

    /// First non-empty value slot, in priority order: text, email, phone,
    /// number, free-form value, choice label, then file and date slots.
    pub fn value(&self) -> Option<String> {
        non_empty(self.text.as_deref())
            .or_else(|| non_empty(self.email.as_deref()))
            .or_else(|| non_empty(self.phone_number.as_deref()))
            .or_else(|| self.number.map(format_number))
            .or_else(|| match &self.value {
                Some(JsonValue::String(s)) => non_empty(Some(s)),
                Some(JsonValue::Number(n)) => n.as_f64().map(format_number),
                _ => None,
            })
            .or_else(|| non_empty(self.choice.as_ref().and_then(|c| c.label.as_deref())))
            .or_else(|| {
                self.choices
                    .as_ref()
                    .map(|c| c.labels.join(", "))
                    .filter(|joined| !joined.trim().is_empty())
            })
            .or_else(|| non_empty(self.file_url.as_deref()))
            .or_else(|| non_empty(self.date.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One inbound form response. `form_id` is present on webhook deliveries and is
/// filled in by the listing client for paginated imports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub form_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Submission {
    /// Idempotency key: the response id, falling back to the response token.
    pub fn submission_id(&self) -> Option<&str> {
        self.response_id
            .as_deref()
            .or(self.token.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn variable_number(&self, key: &str) -> Option<f64> {
        self.variables
            .iter()
            .find(|v| v.key == key)
            .and_then(|v| v.number.or_else(|| v.text.as_deref()?.trim().parse().ok()))
    }
}
