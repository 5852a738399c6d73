use crate::database::CandidateStore;
use crate::models::candidate::StructuredProfile;
use crate::models::requirement::RoleRequirements;
use crate::utils::normalize::normalize_text;

/// Requirements whose role name equals `role` after text normalization.
pub fn find_for_role<'a>(
    requirements: &'a [RoleRequirements],
    role: &str,
) -> Option<&'a RoleRequirements> {
    let key = normalize_text(role);
    if key.is_empty() {
        return None;
    }
    requirements
        .iter()
        .find(|r| normalize_text(&r.role_name) == key)
}

/// Loads the requirements of `role`. Store failures are logged and treated as
/// "no requirements", since scoring without them is still useful.
pub async fn lookup(store: &dyn CandidateStore, role: &str) -> Option<RoleRequirements> {
    match store.list_requirements().await {
        Ok(all) => find_for_role(&all, role).cloned(),
        Err(e) => {
            tracing::warn!(role, "Could not load role requirements: {:?}", e);
            None
        }
    }
}

/// Copies the requirement snapshot into the professional block.
pub fn apply_snapshot(profile: &mut StructuredProfile, role: &str, requirements: Option<&RoleRequirements>) {
    let professional = &mut profile.professional;
    if professional.role.as_deref().map_or(true, |r| r.trim().is_empty()) {
        professional.role = Some(role.to_string());
    }
    professional.role_title = Some(
        requirements
            .map(|r| r.role_name.clone())
            .unwrap_or_else(|| role.to_string()),
    );
    professional.requirements = requirements.map(|r| r.requirement_list()).unwrap_or_default();
    professional.differentials = requirements.map(|r| r.differential_list()).unwrap_or_default();
}
