//! Template resolution for one account.

use crate::model::account::AccountId;
use crate::model::asset::Asset;
use crate::model::template::MaintenanceTemplate;
use crate::repo::store::{MaintenanceStore, RejectedRecord};
use crate::schedule::SchedulerError;

/// Assets of an account plus the templates that target at least one of them.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTemplates {
    pub assets: Vec<Asset>,
    pub templates: Vec<MaintenanceTemplate>,
    /// Asset and template rows the store could not decode.
    pub rejected: Vec<RejectedRecord>,
}

pub struct TemplateResolver<'s, S: MaintenanceStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: MaintenanceStore + ?Sized> TemplateResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Loads the account's assets and applicable templates.
    ///
    /// # Errors
    /// - `AccountNotFound` when the account does not exist.
    /// - `StoreUnavailable` when the store itself fails.
    ///
    /// An account without matching templates resolves to an empty set. Rows
    /// that fail to decode are returned in `rejected` and do not fail the call.
    pub fn resolve(&self, account_id: AccountId) -> Result<ResolvedTemplates, SchedulerError> {
        if !self.store.account_exists(account_id)? {
            return Err(SchedulerError::AccountNotFound(account_id));
        }

        let assets = self.store.find_assets_for_account(account_id)?;
        let templates = self.store.find_templates_for_account(account_id)?;

        let mut rejected = assets.rejected;
        rejected.extend(templates.rejected);
        let assets = assets.records;
        let templates = templates
            .records
            .into_iter()
            .filter(|template| {
                assets
                    .iter()
                    .any(|asset| asset.matches_any_class(&template.asset_classes))
            })
            .collect();

        Ok(ResolvedTemplates {
            assets,
            templates,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateResolver;
    use crate::model::account::Account;
    use crate::model::asset::Asset;
    use crate::model::template::{MaintenanceTemplate, TemplateScope};
    use crate::repo::catalog::CatalogRepository;
    use crate::repo::memory_store::InMemoryStore;
    use crate::schedule::SchedulerError;
    use uuid::Uuid;

    #[test]
    fn keeps_only_templates_matching_an_asset_class() {
        let store = InMemoryStore::new();
        let account = store.create_account(&Account::new("Home")).unwrap();
        store
            .create_asset(&Asset::new(account, "Vehicle", "Car"))
            .unwrap();
        let oil =
            MaintenanceTemplate::new(TemplateScope::Global, "Oil", "oil", &["vehicle"], 6);
        let gutters =
            MaintenanceTemplate::new(TemplateScope::Global, "Gutters", "gutters", &["house"], 12);
        store.create_template(&oil).unwrap();
        store.create_template(&gutters).unwrap();

        let resolved = TemplateResolver::new(&store).resolve(account).unwrap();
        assert_eq!(resolved.assets.len(), 1);
        let ids: Vec<Uuid> = resolved.templates.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![oil.id]);
    }

    #[test]
    fn account_without_assets_resolves_empty() {
        let store = InMemoryStore::new();
        let account = store.create_account(&Account::new("Empty")).unwrap();
        store
            .create_template(&MaintenanceTemplate::new(
                TemplateScope::Global,
                "Oil",
                "oil",
                &["vehicle"],
                6,
            ))
            .unwrap();

        let resolved = TemplateResolver::new(&store).resolve(account).unwrap();
        assert!(resolved.assets.is_empty());
        assert!(resolved.templates.is_empty());
    }

    #[test]
    fn missing_account_is_reported() {
        let store = InMemoryStore::new();
        let missing = Uuid::new_v4();
        let err = TemplateResolver::new(&store).resolve(missing).unwrap_err();
        assert!(matches!(err, SchedulerError::AccountNotFound(id) if id == missing));
    }
}
