//! Template service for reply templates and `{{var}}` rendering.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::account_service::ensure_account_exists;
use super::error::{ensure_max_len, ensure_not_blank, ensure_opt_max_len, ServiceError, ServiceResult};
use crate::domain::{
    AccountId, NewTemplate, RenderedTemplate, Template, TemplateId, TemplateUpdate,
};
use crate::storage::{queries::templates, Database};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"));

/// Replaces each `{{name}}` that has a value in `variables`.
///
/// Placeholders without a value are left as written.
pub fn render_text(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Collects placeholder names from each text, sorted and de-duplicated.
pub fn extract_variables<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let names: BTreeSet<String> = texts
        .into_iter()
        .flat_map(|text| PLACEHOLDER.captures_iter(text).map(|c| c[1].to_string()))
        .collect();
    names.into_iter().collect()
}

/// Service for template CRUD and rendering.
#[derive(Debug, Clone)]
pub struct TemplateService {
    db: Database,
}

impl TemplateService {
    /// Creates a new template service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates a template.
    pub async fn create(&self, template: &NewTemplate) -> ServiceResult<Template> {
        ensure_not_blank("name", &template.name)?;
        ensure_max_len("name", &template.name, 200)?;
        ensure_opt_max_len("description", template.description.as_deref(), 1000)?;
        ensure_opt_max_len("subject_template", template.subject_template.as_deref(), 500)?;
        ensure_max_len("body_template", &template.body_template, 10_000)?;
        ensure_opt_max_len("category", template.category.as_deref(), 100)?;
        ensure_opt_max_len("tags", template.tags.as_deref(), 500)?;
        ensure_account_exists(&self.db, template.account_id).await?;

        Ok(templates::insert(&self.db, template).await?)
    }

    /// Gets a template by ID.
    pub async fn get(&self, id: TemplateId) -> ServiceResult<Template> {
        templates::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Template not found".to_string()))
    }

    /// Lists templates, most used first.
    pub async fn list(
        &self,
        category: Option<String>,
        account_id: Option<AccountId>,
    ) -> ServiceResult<Vec<Template>> {
        Ok(templates::list(&self.db, category, account_id).await?)
    }

    /// Applies a partial update.
    pub async fn update(&self, id: TemplateId, update: &TemplateUpdate) -> ServiceResult<Template> {
        if let Some(name) = &update.name {
            ensure_not_blank("name", name)?;
            ensure_max_len("name", name, 200)?;
        }
        ensure_opt_max_len("description", update.description.as_deref(), 1000)?;
        ensure_opt_max_len("subject_template", update.subject_template.as_deref(), 500)?;
        ensure_opt_max_len("body_template", update.body_template.as_deref(), 10_000)?;
        ensure_opt_max_len("category", update.category.as_deref(), 100)?;
        ensure_opt_max_len("tags", update.tags.as_deref(), 500)?;

        if templates::update(&self.db, id, update).await? == 0 {
            return Err(ServiceError::NotFound("Template not found".to_string()));
        }
        self.get(id).await
    }

    /// Deletes a template.
    pub async fn delete(&self, id: TemplateId) -> ServiceResult<()> {
        if !templates::delete(&self.db, id).await? {
            return Err(ServiceError::NotFound("Template not found".to_string()));
        }
        Ok(())
    }

    /// Renders a template and records the use.
    pub async fn render(
        &self,
        id: TemplateId,
        variables: &HashMap<String, String>,
    ) -> ServiceResult<RenderedTemplate> {
        let template = templates::record_use(&self.db, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Template not found".to_string()))?;

        Ok(RenderedTemplate {
            subject: template
                .subject_template
                .as_deref()
                .map(|s| render_text(s, variables)),
            body: render_text(&template.body_template, variables),
        })
    }

    /// Lists the placeholder names used by a template.
    ///
    /// A missing template has no variables.
    pub async fn variables(&self, id: TemplateId) -> ServiceResult<Vec<String>> {
        let Some(template) = templates::get_by_id(&self.db, id).await? else {
            return Ok(Vec::new());
        };
        let texts = template
            .subject_template
            .as_deref()
            .into_iter()
            .chain(std::iter::once(template.body_template.as_str()));
        Ok(extract_variables(texts))
    }
}
