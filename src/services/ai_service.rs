use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::models::candidate::{StructuredProfile, SuitabilityAnalysis};
use crate::models::requirement::RoleRequirements;
use crate::models::submission::Answer;

/// AI enrichment collaborator. Both calls are best effort: `None` means the
/// record is stored without that block.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn structure(&self, answers: &[Answer]) -> Option<StructuredProfile>;

    async fn score(
        &self,
        profile: &StructuredProfile,
        requirements: Option<&RoleRequirements>,
    ) -> Option<SuitabilityAnalysis>;
}

/// Used when no API key is configured.
pub struct DisabledEnricher;

#[async_trait]
impl Enricher for DisabledEnricher {
    async fn structure(&self, _answers: &[Answer]) -> Option<StructuredProfile> {
        None
    }

    async fn score(
        &self,
        _profile: &StructuredProfile,
        _requirements: Option<&RoleRequirements>,
    ) -> Option<SuitabilityAnalysis> {
        None
    }
}

const STRUCTURE_PROMPT: &str = r#"Organize as respostas de um formulário de candidatura no JSON abaixo.
Use null para o que não estiver nas respostas. Responda apenas com o JSON.
{
  "pessoal": { "nome": "", "email": "", "telefone": "", "cpf": "", "cidade": "" },
  "profissional": { "vaga": "", "experiencia": "", "escolaridade": "" }
}"#;

const SCORE_PROMPT: &str = r#"Você avalia candidatos para vagas operacionais e administrativas.
Compare o perfil com os requisitos e diferenciais da vaga, sem presumir nada que não esteja nos dados.
Pré-requisitos ausentes reduzem bastante a nota. Responda apenas com JSON:
{
  "resumo_profissional": "",
  "pontos_fortes": [ { "ponto": "", "evidencia": "" } ],
  "pontos_fracos": [ { "ponto": "", "evidencia": "" } ],
  "pontuacao_final": 0,
  "justificativa_pontuacao": "",
  "recomendacao": "Não Recomendado | Recomendado | Altamente Recomendado",
  "perguntas_entrevista": [ "" ]
}"#;

#[derive(Clone)]
pub struct AiService {
    client: Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AiService {
    pub fn new(api_key: String, model: String, client: Client, timeout: Duration) -> Self {
        Self {
            client,
            api_key,
            model,
            timeout,
        }
    }

    fn payload(&self, system_prompt: &str, user_content: String) -> JsonValue {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.1
        })
    }

    async fn chat_openai(&self, payload: JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenAI API Error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;
        message_json(&body).ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response format").into())
    }

    pub async fn structure_answers(&self, answers: &[Answer]) -> Result<StructuredProfile> {
        let content = serde_json::to_string(answers)?;
        let json = self.chat_openai(self.payload(STRUCTURE_PROMPT, content)).await?;
        Ok(serde_json::from_value(json)?)
    }

    pub async fn analyze(
        &self,
        profile: &StructuredProfile,
        requirements: Option<&RoleRequirements>,
    ) -> Result<SuitabilityAnalysis> {
        let context = serde_json::json!({
            "candidato": profile,
            "vaga": requirements.map(|r| serde_json::json!({
                "nome": r.role_name,
                "requisitos": r.requirement_list(),
                "diferenciais": r.differential_list(),
                "locais": r.location_list(),
            })),
        });
        let json = self
            .chat_openai(self.payload(SCORE_PROMPT, context.to_string()))
            .await?;
        let analysis: SuitabilityAnalysis = serde_json::from_value(json)?;
        Ok(analysis.normalized())
    }
}

/// JSON object carried in the first choice's message content.
fn message_json(body: &JsonValue) -> Option<JsonValue> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
}

#[async_trait]
impl Enricher for AiService {
    async fn structure(&self, answers: &[Answer]) -> Option<StructuredProfile> {
        match self.structure_answers(answers).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::error!("Profile structuring failed: {:?}", e);
                None
            }
        }
    }

    async fn score(
        &self,
        profile: &StructuredProfile,
        requirements: Option<&RoleRequirements>,
    ) -> Option<SuitabilityAnalysis> {
        match self.analyze(profile, requirements).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                tracing::error!("Suitability analysis failed: {:?}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_json_from_message_content() {
        let body = serde_json::json!({
            "choices": [ { "message": { "content": "{\"pontuacao_final\": 82}" } } ]
        });
        let analysis: SuitabilityAnalysis =
            serde_json::from_value(message_json(&body).unwrap()).unwrap();
        assert_eq!(analysis.normalized().recommendation.as_deref(), Some("Altamente Recomendado"));

        let broken = serde_json::json!({ "choices": [ { "message": { "content": "not json" } } ] });
        assert!(message_json(&broken).is_none());
    }

    #[tokio::test]
    async fn disabled_enricher_returns_nothing() {
        let enricher = DisabledEnricher;
        assert!(enricher.structure(&[]).await.is_none());
        assert!(enricher.score(&StructuredProfile::default(), None).await.is_none());
    }
}
