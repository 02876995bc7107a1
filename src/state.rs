//! Workflow services wired together over one pool

use std::sync::Arc;

use sqlx::PgPool;

use crate::application::ApplicationService;
use crate::commission::CommissionService;
use crate::config::Config;
use crate::directory::DirectoryService;
use crate::document::DocumentService;
use crate::marketplace::MarketplaceService;
use crate::notify::Notifier;

/// Shared service bundle handed to the embedding layer
#[derive(Clone)]
pub struct Services {
    pub applications: ApplicationService,
    pub marketplace: MarketplaceService,
    pub documents: DocumentService,
    pub commissions: CommissionService,
    pub directory: DirectoryService,
}

impl Services {
    pub fn new(db_pool: PgPool, config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let directory = DirectoryService::new(db_pool.clone());
        let documents = DocumentService::new(db_pool.clone(), directory.clone());
        let commissions = CommissionService::new(
            db_pool.clone(),
            notifier.clone(),
            config.default_commission_percent,
        );
        let marketplace = MarketplaceService::new(
            db_pool.clone(),
            directory.clone(),
            commissions.clone(),
            notifier.clone(),
            config.distribution_due_hours,
        );
        let applications = ApplicationService::new(
            db_pool,
            directory.clone(),
            documents.clone(),
            commissions.clone(),
            notifier,
        );

        Self {
            applications,
            marketplace,
            documents,
            commissions,
            directory,
        }
    }
}
