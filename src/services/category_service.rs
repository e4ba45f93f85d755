//! Category service for the labeling taxonomy.
//!
//! Provides:
//! - Seeding of the built-in system categories
//! - Scoped CRUD with idempotent creation
//! - Auto-creation of categories produced by classification
//! - Per-category email counters

use tracing::{debug, info};

use super::account_service::ensure_account_exists;
use super::error::{ensure_max_len, ensure_not_blank, ensure_opt_max_len, ServiceError, ServiceResult};
use crate::domain::{
    default_categories, AccountId, Category, CategoryId, CategoryUpdate, NewCategory, UNLABELED,
};
use crate::storage::{queries::categories, Database};

/// Service for category operations.
#[derive(Debug, Clone)]
pub struct CategoryService {
    db: Database,
}

impl CategoryService {
    /// Creates a new category service.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Adds any missing built-in categories as global system categories.
    ///
    /// Returns the number of categories created.
    pub async fn initialize_defaults(&self) -> ServiceResult<usize> {
        let mut created = 0;
        for category in default_categories::new_categories() {
            let (_, inserted) = categories::insert(&self.db, &category).await?;
            if inserted {
                created += 1;
            }
        }
        if created > 0 {
            info!(created, "Seeded default categories");
        }
        Ok(created)
    }

    /// Creates a category, or returns the existing one with the same name
    /// in the same scope.
    pub async fn create(&self, category: &NewCategory) -> ServiceResult<Category> {
        validate_new(category)?;
        ensure_account_exists(&self.db, category.account_id).await?;

        let (stored, _) = categories::insert(&self.db, category).await?;
        Ok(stored)
    }

    /// Gets a category by ID.
    pub async fn get(&self, id: CategoryId) -> ServiceResult<Category> {
        categories::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()))
    }

    /// Finds a category by name within a scope.
    pub async fn find_by_name(
        &self,
        name: &str,
        account_id: Option<AccountId>,
    ) -> ServiceResult<Option<Category>> {
        Ok(categories::find_by_name(&self.db, name, account_id).await?)
    }

    /// Lists the categories visible from a scope.
    pub async fn list(
        &self,
        account_id: Option<AccountId>,
        include_global: bool,
    ) -> ServiceResult<Vec<Category>> {
        Ok(categories::list(&self.db, account_id, include_global).await?)
    }

    /// Applies a partial update.
    pub async fn update(&self, id: CategoryId, update: &CategoryUpdate) -> ServiceResult<Category> {
        if let Some(name) = &update.name {
            ensure_not_blank("name", name)?;
            ensure_max_len("name", name, 100)?;
        }
        ensure_opt_max_len("description", update.description.as_deref(), 500)?;
        ensure_opt_max_len("color", update.color.as_deref(), 7)?;
        ensure_opt_max_len("icon", update.icon.as_deref(), 50)?;

        let current = self.get(id).await?;
        if let Some(name) = &update.name {
            let taken = categories::find_by_name(&self.db, name, current.account_id).await?;
            if taken.is_some_and(|other| other.id != id) {
                return Err(duplicate_name());
            }
        }

        match categories::update(&self.db, id, update).await {
            Ok(0) => return Err(ServiceError::NotFound("Category not found".to_string())),
            Ok(_) => {}
            Err(e) if e.is_constraint_violation() => return Err(duplicate_name()),
            Err(e) => return Err(e.into()),
        }
        self.get(id).await
    }

    /// Deletes a custom category. System and missing categories are refused.
    pub async fn delete(&self, id: CategoryId) -> ServiceResult<()> {
        if !categories::delete_custom(&self.db, id).await? {
            return Err(ServiceError::Rejected(
                "Category not found or cannot delete system category".to_string(),
            ));
        }
        Ok(())
    }

    /// Increments the email counter of a category.
    pub async fn increment_count(
        &self,
        name: &str,
        account_id: Option<AccountId>,
    ) -> ServiceResult<()> {
        categories::increment_count(&self.db, name, account_id).await?;
        Ok(())
    }

    /// Ensures a category produced by classification exists.
    ///
    /// Returns the category name to store on the email. `Unlabeled` and
    /// blank names are never created.
    pub async fn auto_create_if_needed(
        &self,
        name: &str,
        account_id: Option<AccountId>,
    ) -> ServiceResult<String> {
        let name = name.trim();
        if name.is_empty() || name == UNLABELED {
            return Ok(UNLABELED.to_string());
        }

        if categories::find_by_name(&self.db, name, account_id)
            .await?
            .is_some()
        {
            return Ok(name.to_string());
        }
        // Global categories also satisfy account-scoped lookups.
        if account_id.is_some()
            && categories::find_by_name(&self.db, name, None)
                .await?
                .is_some()
        {
            return Ok(name.to_string());
        }

        let created = self
            .create(&NewCategory {
                name: name.to_string(),
                description: Some(format!("Auto-created category for {name} emails")),
                account_id,
                ..Default::default()
            })
            .await?;
        debug!(category = %created.name, "Auto-created category");
        Ok(created.name)
    }
}

fn duplicate_name() -> ServiceError {
    ServiceError::Rejected("Category with this name already exists".to_string())
}

fn validate_new(category: &NewCategory) -> ServiceResult<()> {
    ensure_not_blank("name", &category.name)?;
    ensure_max_len("name", &category.name, 100)?;
    ensure_opt_max_len("description", category.description.as_deref(), 500)?;
    ensure_opt_max_len("color", category.color.as_deref(), 7)?;
    ensure_opt_max_len("icon", category.icon.as_deref(), 50)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn service() -> CategoryService {
        CategoryService::new(Database::open_in_memory().await.unwrap())
    }

    fn named(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn initialize_defaults_is_idempotent() {
        let svc = service().await;
        assert_eq!(svc.initialize_defaults().await.unwrap(), 6);
        assert_eq!(svc.initialize_defaults().await.unwrap(), 0);

        let all = svc.list(None, true).await.unwrap();
        assert_eq!(all.len(), 6);
        assert!(all.iter().all(|c| c.is_system));
    }

    #[tokio::test]
    async fn create_returns_existing_in_scope() {
        let svc = service().await;
        let first = svc.create(&named("Travel")).await.unwrap();
        let second = svc.create(&named("Travel")).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn rename_to_taken_name_is_rejected() {
        let svc = service().await;
        svc.initialize_defaults().await.unwrap();
        let travel = svc.create(&named("Travel")).await.unwrap();

        let err = svc
            .update(
                travel.id,
                &CategoryUpdate {
                    name: Some("Billing".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Rejected(_)));
        assert_eq!(err.to_string(), "Category with this name already exists");

        // Keeping its own name is not a conflict.
        let same = svc
            .update(
                travel.id,
                &CategoryUpdate {
                    name: Some("Travel".to_string()),
                    color: Some("#000000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.color, "#000000");
    }

    #[tokio::test]
    async fn create_requires_existing_account() {
        let svc = service().await;
        let scoped = NewCategory {
            account_id: Some(AccountId(999)),
            ..named("Travel")
        };
        assert!(matches!(
            svc.create(&scoped).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.auto_create_if_needed("Travel", Some(AccountId(999))).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_auto_create_yields_one_category() {
        let svc = service().await;
        let (a, b) = tokio::join!(
            svc.auto_create_if_needed("Receipts", None),
            svc.auto_create_if_needed("Receipts", None)
        );
        assert_eq!(a.unwrap(), "Receipts");
        assert_eq!(b.unwrap(), "Receipts");
        assert_eq!(svc.list(None, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_validates_lengths() {
        let svc = service().await;
        let long = NewCategory {
            color: Some("#12345678".to_string()),
            ..named("Colors")
        };
        assert!(matches!(
            svc.create(&long).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.create(&named(&"x".repeat(101))).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn system_categories_cannot_be_deleted() {
        let svc = service().await;
        svc.initialize_defaults().await.unwrap();
        let billing = svc.find_by_name("Billing", None).await.unwrap().unwrap();

        let err = svc.delete(billing.id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Category not found or cannot delete system category"
        );

        let custom = svc.create(&named("Custom")).await.unwrap();
        svc.delete(custom.id).await.unwrap();
        assert!(matches!(
            svc.get(custom.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn auto_create_skips_unlabeled() {
        let svc = service().await;
        assert_eq!(svc.auto_create_if_needed("", None).await.unwrap(), "Unlabeled");
        assert_eq!(
            svc.auto_create_if_needed("Unlabeled", None).await.unwrap(),
            "Unlabeled"
        );
        assert!(svc.list(None, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_create_builds_description() {
        let svc = service().await;
        let name = svc.auto_create_if_needed("Receipts", None).await.unwrap();
        assert_eq!(name, "Receipts");

        let created = svc.find_by_name("Receipts", None).await.unwrap().unwrap();
        assert_eq!(
            created.description.as_deref(),
            Some("Auto-created category for Receipts emails")
        );
        assert!(!created.is_system);

        svc.auto_create_if_needed("Receipts", None).await.unwrap();
        assert_eq!(svc.list(None, true).await.unwrap().len(), 1);
    }
}
