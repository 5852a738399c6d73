use std::time::Duration;

use reqwest::Client;

use crate::models::status::CandidateStatus;

/// Outbound messaging collaborator. Fire and forget: delivery problems are
/// logged by the implementation and never reach the caller.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn send(&self, phone: &str, message: &str);
}

/// Used when no messaging provider is configured.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, phone: &str, _message: &str) {
        tracing::debug!(phone, "Messaging disabled, notification dropped");
    }
}

/// Chat-message provider reached with a form-encoded POST of `token`, `to` and `body`.
#[derive(Clone)]
pub struct MessagingService {
    client: Client,
    url: String,
    token: String,
    timeout: Duration,
}

impl MessagingService {
    pub fn new(client: Client, url: String, token: String, timeout: Duration) -> Self {
        Self {
            client,
            url,
            token,
            timeout,
        }
    }
}

impl Notifier for MessagingService {
    fn send(&self, phone: &str, message: &str) {
        let request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .form(&[
                ("token", self.token.as_str()),
                ("to", phone),
                ("body", message),
            ]);
        let phone = phone.to_string();
        tokio::spawn(async move {
            match request.send().await {
                Ok(res) if res.status().is_success() => {
                    tracing::info!(phone = %phone, "Notification delivered");
                }
                Ok(res) => {
                    let status = res.status();
                    let body = res.text().await.unwrap_or_default();
                    tracing::error!(phone = %phone, %status, body = %body, "Notification rejected");
                }
                Err(e) => tracing::error!(phone = %phone, "Notification failed: {:?}", e),
            }
        });
    }
}

/// Message sent when a candidate enters `status`, if that status notifies.
pub fn transition_message(status: &CandidateStatus, first_name: &str) -> Option<String> {
    let body = match status {
        CandidateStatus::Rejected => format!(
            "Olá, {first_name}! Tudo bem?\n\n\
             Agradecemos por demonstrar interesse em fazer parte da nossa equipe.\n\
             Após análise do seu perfil, não seguiremos com o seu processo no momento.\n\
             Desejamos sucesso na sua jornada profissional!\n\n\
             Atenciosamente,\nGente e Gestão."
        ),
        CandidateStatus::Interview => format!(
            "Olá, {first_name}! Tudo bem?\n\n\
             Seu perfil avançou no nosso processo seletivo e gostaríamos de convidar você para uma entrevista.\n\
             Em breve nossa equipe entrará em contato com data e horário.\n\n\
             Atenciosamente,\nGente e Gestão."
        ),
        CandidateStatus::Exams => format!(
            "Olá, {first_name}! Tudo bem?\n\n\
             Você foi selecionado(a) para a etapa de provas do nosso processo seletivo.\n\
             Enviaremos os links das provas por aqui. Fique atento(a)!\n\n\
             Atenciosamente,\nGente e Gestão."
        ),
        CandidateStatus::TalentPool => format!(
            "Olá, {first_name}! Tudo bem?\n\n\
             Gostamos do seu perfil e ele passou a fazer parte do nosso banco de talentos.\n\
             Quando surgir uma vaga compatível, entraremos em contato.\n\n\
             Atenciosamente,\nGente e Gestão."
        ),
        _ => return None,
    };
    Some(body)
}
