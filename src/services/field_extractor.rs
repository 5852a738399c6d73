use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::submission::{Answer, Submission};
use crate::services::resolver::Identifiers;
use crate::utils::dates::parse_birth_date;
use crate::utils::normalize::digits_or_none;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Name,
    Cpf,
    Phone,
    Email,
    BirthDate,
    Role,
    Resume,
}

impl LogicalField {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalField::Name => "name",
            LogicalField::Cpf => "cpf",
            LogicalField::Phone => "phone",
            LogicalField::Email => "email",
            LogicalField::BirthDate => "birth_date",
            LogicalField::Role => "role",
            LogicalField::Resume => "resume",
        }
    }
}

/// One way of locating the answer that carries a logical field. Strategies are
/// tried in the order they are listed; the first that finds an answer decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// Answer whose field id or field ref equals the alias.
    Alias(String),
    /// Answer whose field id or ref contains the fragment, case-insensitively.
    KeyContains(String),
    /// Answer of the given provider type, e.g. `email` or `phone_number`.
    AnswerType(String),
    /// First text answer that looks like a date.
    DateShapedText,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    #[default]
    Application,
    Exam,
}

/// Field lookup table of one form, at one schema version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaAliases {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: SchemaKind,
    #[serde(default)]
    pub fields: BTreeMap<LogicalField, Vec<LookupStrategy>>,
}

/// Versioned schema-to-alias table. Owned by the application state and passed
/// to the extractor explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAliasMap {
    pub schemas: BTreeMap<String, SchemaAliases>,
}

fn alias(id: &str) -> LookupStrategy {
    LookupStrategy::Alias(id.to_string())
}

fn contains(fragment: &str) -> LookupStrategy {
    LookupStrategy::KeyContains(fragment.to_string())
}

fn of_type(answer_type: &str) -> LookupStrategy {
    LookupStrategy::AnswerType(answer_type.to_string())
}

const APPLICATION_NAME_FIELD: &str = "6VkDMDJph5Jc";
const APPLICATION_ROLE_FIELD: &str = "JNuaMlqdlJkT";
const APPLICATION_ROLE_REF: &str = "a347f0fa-431c-4f86-8ffe-3239e8f1b800";
const APPLICATION_RESUME_FIELD: &str = "dmlXVJZuZ7BH";

fn application_schema(label: &str) -> SchemaAliases {
    let fields = BTreeMap::from([
        (
            LogicalField::Name,
            vec![alias(APPLICATION_NAME_FIELD), alias("nome_completo"), contains("nome")],
        ),
        (LogicalField::Cpf, vec![alias("cpf"), contains("cpf")]),
        (
            LogicalField::Phone,
            vec![alias("telefone"), contains("telefone"), of_type("phone_number")],
        ),
        (LogicalField::Email, vec![alias("email"), of_type("email")]),
        (
            LogicalField::BirthDate,
            vec![
                alias("data_nascimento"),
                contains("nascimento"),
                of_type("date"),
                LookupStrategy::DateShapedText,
            ],
        ),
        (
            LogicalField::Role,
            vec![alias(APPLICATION_ROLE_REF), alias(APPLICATION_ROLE_FIELD)],
        ),
        (LogicalField::Resume, vec![alias(APPLICATION_RESUME_FIELD), of_type("file_url")]),
    ]);
    SchemaAliases {
        version: 2,
        label: label.to_string(),
        kind: SchemaKind::Application,
        fields,
    }
}

fn exam_schema(label: &str, name_field: &str, cpf_field: &str) -> SchemaAliases {
    let fields = BTreeMap::from([
        (LogicalField::Name, vec![alias(name_field), contains("nome")]),
        (LogicalField::Cpf, vec![alias(cpf_field), contains("cpf")]),
        (LogicalField::Email, vec![of_type("email")]),
        (LogicalField::Phone, vec![of_type("phone_number")]),
    ]);
    SchemaAliases {
        version: 1,
        label: label.to_string(),
        kind: SchemaKind::Exam,
        fields,
    }
}

impl FieldAliasMap {
    /// Forms known at build time. Replace with [`FieldAliasMap::from_json_file`]
    /// when a form is republished with new field ids.
    pub fn builtin() -> Self {
        let schemas = BTreeMap::from([
            ("ynFUyrAc".to_string(), application_schema("Candidatura geral")),
            ("i6GB06nW".to_string(), application_schema("Candidatura operacional")),
            ("OrKerl6D".to_string(), exam_schema("Português e matemática", "syzxhm3Z3iGG", "dcpqtJoWbXds")),
            ("OejwZ32V".to_string(), application_schema("Candidatura administrativa")),
            ("Z59Mv1sY".to_string(), exam_schema("Direção", "cPBR2RtoMRBN", "ZwvjaHmu1l0b")),
            ("qWTxbaIK".to_string(), exam_schema("Português para administrativo", "wR9LPPhM4Fw5", "csRM2ZPjJAuZ")),
        ]);
        Self { schemas }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read alias map {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn strategies(&self, schema_id: &str, field: LogicalField) -> Option<&[LookupStrategy]> {
        self.schemas
            .get(schema_id)
            .and_then(|schema| schema.fields.get(&field))
            .map(Vec::as_slice)
    }

    pub fn schema_kind(&self, schema_id: &str) -> Option<SchemaKind> {
        self.schemas.get(schema_id).map(|schema| schema.kind)
    }
}

static DATE_SHAPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{8}|\d{1,2}[/.\- ]\d{1,2}[/.\- ]\d{4})$").expect("valid date-shape regex")
});

fn looks_like_date(answer: &Answer) -> bool {
    answer.is_text()
        && answer
            .text
            .as_deref()
            .is_some_and(|text| DATE_SHAPED.is_match(text.trim()))
}

fn locate<'a>(strategy: &LookupStrategy, answers: &'a [Answer]) -> Option<&'a Answer> {
    match strategy {
        LookupStrategy::Alias(id) => answers.iter().find(|a| a.field.matches(id)),
        LookupStrategy::KeyContains(fragment) => {
            answers.iter().find(|a| a.field.key_contains(fragment))
        }
        LookupStrategy::AnswerType(kind) => answers
            .iter()
            .find(|a| a.answer_type.as_deref() == Some(kind.as_str())),
        LookupStrategy::DateShapedText => answers.iter().find(|a| looks_like_date(a)),
    }
}

/// Value of `field` in a submission of schema `schema_id`.
///
/// Unmapped schemas and fields yield `None` with a warning. Once a strategy
/// locates an answer the search stops, even if that answer turns out empty.
pub fn extract_field(
    map: &FieldAliasMap,
    schema_id: &str,
    answers: &[Answer],
    field: LogicalField,
) -> Option<String> {
    let Some(strategies) = map.strategies(schema_id, field) else {
        tracing::warn!(schema_id, field = field.as_str(), "No alias mapping configured");
        return None;
    };

    let found = strategies
        .iter()
        .find_map(|strategy| locate(strategy, answers).map(|answer| (strategy, answer)));

    match found {
        Some((strategy, answer)) => {
            let value = answer.value();
            if value.is_none() {
                tracing::warn!(
                    schema_id,
                    field = field.as_str(),
                    ?strategy,
                    "Matched answer carries no value"
                );
            }
            value
        }
        None => {
            tracing::warn!(schema_id, field = field.as_str(), "Field not present in submission");
            None
        }
    }
}

/// Normalized identity and intake fields of one submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date_raw: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub role: Option<String>,
    pub resume_url: Option<String>,
}

impl ExtractedFields {
    pub fn from_answers(map: &FieldAliasMap, schema_id: &str, answers: &[Answer]) -> Self {
        let get = |field| extract_field(map, schema_id, answers, field);

        let birth_date_raw = get(LogicalField::BirthDate);
        let birth_date = birth_date_raw.as_deref().and_then(parse_birth_date);
        if birth_date_raw.is_some() && birth_date.is_none() {
            tracing::warn!(schema_id, raw = ?birth_date_raw, "Unparseable birth date");
        }

        Self {
            name: get(LogicalField::Name).map(|n| n.trim().to_string()),
            cpf: digits_or_none(get(LogicalField::Cpf).as_deref()),
            phone: digits_or_none(get(LogicalField::Phone).as_deref()),
            email: get(LogicalField::Email)
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
            birth_date_raw,
            birth_date,
            role: get(LogicalField::Role),
            resume_url: get(LogicalField::Resume),
        }
    }

    pub fn from_submission(map: &FieldAliasMap, submission: &Submission) -> Self {
        Self::from_answers(map, &submission.form_id, &submission.answers)
    }

    pub fn identifiers(&self, submission_id: Option<&str>) -> Identifiers {
        Identifiers {
            submission_id: submission_id.map(str::to_string),
            email: self.email.clone(),
            cpf: self.cpf.clone(),
            phone: self.phone.clone(),
            name: self.name.clone(),
        }
    }
}
