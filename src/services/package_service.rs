use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::{KycRepository, PackageRepository, RiskParameterRepository};
use crate::errors::{AppError, Result};
use crate::models::auth::AuthContext;
use crate::models::package::Package;

#[derive(Debug, Clone)]
pub struct PackageInput {
    pub name: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub risk_parameter_id: Uuid,
}

pub struct PackageService {
    packages: Arc<dyn PackageRepository>,
    risk_parameters: Arc<dyn RiskParameterRepository>,
    submissions: Arc<dyn KycRepository>,
}

impl PackageService {
    pub fn new(
        packages: Arc<dyn PackageRepository>,
        risk_parameters: Arc<dyn RiskParameterRepository>,
        submissions: Arc<dyn KycRepository>,
    ) -> Self {
        Self {
            packages,
            risk_parameters,
            submissions,
        }
    }

    async fn ensure_risk_parameter(&self, auth: &AuthContext, id: &Uuid) -> Result<()> {
        self.risk_parameters
            .get_risk_parameter_by_id(id)
            .await?
            .filter(|p| p.org_id == auth.org_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Risk parameter".to_string()))
    }

    pub async fn create(&self, auth: &AuthContext, input: PackageInput) -> Result<Package> {
        self.ensure_risk_parameter(auth, &input.risk_parameter_id).await?;

        let now = Utc::now();
        let package = Package {
            id: Uuid::new_v4(),
            org_id: auth.org_id.clone(),
            name: input.name,
            description: input.description,
            logo_url: input.logo_url,
            risk_parameter_id: input.risk_parameter_id,
            created_at: now,
            updated_at: now,
        };
        self.packages.create_package(&package).await?;

        info!(action = "package_created", package_id = %package.id, org_id = %package.org_id);
        Ok(package)
    }

    pub async fn list(&self, auth: &AuthContext) -> Result<Vec<Package>> {
        self.packages.get_packages_by_org(&auth.org_id).await
    }

    pub async fn get(&self, auth: &AuthContext, id: &Uuid) -> Result<Package> {
        self.packages
            .get_package_by_id(id)
            .await?
            .filter(|p| p.org_id == auth.org_id)
            .ok_or_else(|| AppError::NotFound("Package".to_string()))
    }

    pub async fn update(&self, auth: &AuthContext, id: &Uuid, input: PackageInput) -> Result<Package> {
        let mut package = self.get(auth, id).await?;
        self.ensure_risk_parameter(auth, &input.risk_parameter_id).await?;

        package.name = input.name;
        package.description = input.description;
        package.logo_url = input.logo_url;
        package.risk_parameter_id = input.risk_parameter_id;
        package.updated_at = Utc::now();
        self.packages.update_package(&package).await?;

        info!(action = "package_updated", package_id = %id, org_id = %auth.org_id);
        Ok(package)
    }

    /// Submissions are kept forever, so a package that owns any cannot go.
    pub async fn delete(&self, auth: &AuthContext, id: &Uuid) -> Result<()> {
        self.get(auth, id).await?;
        let owned = self.submissions.count_submissions_for_package(id).await?;
        if owned > 0 {
            return Err(AppError::ValidationError(format!("Package has {} KYC submission(s)", owned)));
        }
        if !self.packages.delete_package(id, &auth.org_id).await? {
            return Err(AppError::NotFound("Package".to_string()));
        }

        info!(action = "package_deleted", package_id = %id, org_id = %auth.org_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteDatabase;
    use crate::models::auth::Role;
    use crate::services::risk_parameter_service::{RiskParameterInput, RiskParameterService};

    fn auth(org: &str) -> AuthContext {
        AuthContext {
            org_id: org.to_string(),
            user_id: "user_1".to_string(),
            role: Role::Admin,
        }
    }

    async fn services() -> (PackageService, RiskParameterService) {
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        (
            PackageService::new(db.clone(), db.clone(), db.clone()),
            RiskParameterService::new(db.clone(), db),
        )
    }

    fn thresholds() -> RiskParameterInput {
        RiskParameterInput {
            name: "standard".to_string(),
            account_balance: 1000.0,
            average_salary: 500.0,
            employment_status: true,
        }
    }

    fn package_input(risk_parameter_id: Uuid) -> PackageInput {
        PackageInput {
            name: "Student Visa".to_string(),
            description: "Checks for student visas".to_string(),
            logo_url: None,
            risk_parameter_id,
        }
    }

    #[tokio::test]
    async fn test_package_requires_risk_parameter_in_org() {
        let (packages, params) = services().await;
        let foreign = params.create(&auth("org_b"), thresholds()).await.unwrap();

        let result = packages.create(&auth("org_a"), package_input(foreign.id)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = packages.create(&auth("org_a"), package_input(Uuid::new_v4())).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_package_crud_is_org_scoped() {
        let (packages, params) = services().await;
        let p = params.create(&auth("org_a"), thresholds()).await.unwrap();
        let package = packages.create(&auth("org_a"), package_input(p.id)).await.unwrap();

        assert_eq!(packages.list(&auth("org_a")).await.unwrap().len(), 1);
        assert!(packages.list(&auth("org_b")).await.unwrap().is_empty());
        assert!(matches!(packages.get(&auth("org_b"), &package.id).await, Err(AppError::NotFound(_))));

        let mut input = package_input(p.id);
        input.name = "Work Visa".to_string();
        let updated = packages.update(&auth("org_a"), &package.id, input).await.unwrap();
        assert_eq!(updated.name, "Work Visa");
        assert_eq!(packages.get(&auth("org_a"), &package.id).await.unwrap().name, "Work Visa");

        packages.delete(&auth("org_a"), &package.id).await.unwrap();
        assert!(packages.list(&auth("org_a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_risk_parameter_in_use_cannot_be_deleted() {
        let (packages, params) = services().await;
        let p = params.create(&auth("org_a"), thresholds()).await.unwrap();
        let package = packages.create(&auth("org_a"), package_input(p.id)).await.unwrap();

        let result = params.delete(&auth("org_a"), &p.id).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        packages.delete(&auth("org_a"), &package.id).await.unwrap();
        params.delete(&auth("org_a"), &p.id).await.unwrap();
        assert!(params.list(&auth("org_a")).await.unwrap().is_empty());
    }
}
