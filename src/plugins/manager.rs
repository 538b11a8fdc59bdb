use std::collections::HashMap;

use super::resolvers::{HeuristicResolver, SelectOptionResolver};
use super::traits::AvailabilityResolver;
use crate::config::{AppConfig, Template};
use crate::utils::error::AppError;

pub type ResolverBox = Box<dyn AvailabilityResolver>;

/// Maps a site id to the resolver for that site's page template.
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, ResolverBox>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one resolver per configured site.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let mut registry = Self::new();
        for (site_id, site) in &config.sites {
            let resolver: ResolverBox = match site.template {
                Template::SelectOption => {
                    let select_id = site.select_id.as_deref().ok_or_else(|| {
                        AppError::Validation(format!("Site {} needs a select_id", site_id))
                    })?;
                    Box::new(SelectOptionResolver::new(site_id.clone(), select_id)?)
                }
                Template::Heuristic => Box::new(HeuristicResolver::new(site_id.clone(), config.heuristics.clone())),
            };
            registry.register(site_id.clone(), resolver);
        }
        Ok(registry)
    }

    /// Register a resolver, replacing any previous one for the site.
    pub fn register(&mut self, site_id: impl Into<String>, resolver: ResolverBox) {
        let site_id = site_id.into();
        tracing::debug!("Registered {:?} resolver for site {}", resolver.template(), site_id);
        self.resolvers.insert(site_id, resolver);
    }

    pub fn get(&self, site_id: &str) -> Result<&dyn AvailabilityResolver, AppError> {
        self.resolvers
            .get(site_id)
            .map(|resolver| resolver.as_ref())
            .ok_or_else(|| AppError::UnknownSite {
                site: site_id.to_string(),
            })
    }

    /// Registered site ids, sorted.
    pub fn site_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.resolvers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
