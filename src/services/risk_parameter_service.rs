use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::{PackageRepository, RiskParameterRepository};
use crate::errors::{AppError, Result};
use crate::models::auth::AuthContext;
use crate::models::risk_parameter::RiskParameter;

#[derive(Debug, Clone)]
pub struct RiskParameterInput {
    pub name: String,
    pub account_balance: f64,
    pub average_salary: f64,
    pub employment_status: bool,
}

pub struct RiskParameterService {
    risk_parameters: Arc<dyn RiskParameterRepository>,
    packages: Arc<dyn PackageRepository>,
}

impl RiskParameterService {
    pub fn new(risk_parameters: Arc<dyn RiskParameterRepository>, packages: Arc<dyn PackageRepository>) -> Self {
        Self { risk_parameters, packages }
    }

    pub async fn create(&self, auth: &AuthContext, input: RiskParameterInput) -> Result<RiskParameter> {
        let now = Utc::now();
        let params = RiskParameter {
            id: Uuid::new_v4(),
            org_id: auth.org_id.clone(),
            name: input.name,
            account_balance: input.account_balance,
            average_salary: input.average_salary,
            employment_status: input.employment_status,
            created_at: now,
            updated_at: now,
        };
        self.risk_parameters.create_risk_parameter(&params).await?;

        info!(action = "risk_parameter_created", risk_parameter_id = %params.id, org_id = %params.org_id);
        Ok(params)
    }

    pub async fn list(&self, auth: &AuthContext) -> Result<Vec<RiskParameter>> {
        self.risk_parameters.get_risk_parameters_by_org(&auth.org_id).await
    }

    pub async fn get(&self, auth: &AuthContext, id: &Uuid) -> Result<RiskParameter> {
        self.risk_parameters
            .get_risk_parameter_by_id(id)
            .await?
            .filter(|p| p.org_id == auth.org_id)
            .ok_or_else(|| AppError::NotFound("Risk parameter".to_string()))
    }

    pub async fn update(&self, auth: &AuthContext, id: &Uuid, input: RiskParameterInput) -> Result<RiskParameter> {
        let mut params = self.get(auth, id).await?;
        params.name = input.name;
        params.account_balance = input.account_balance;
        params.average_salary = input.average_salary;
        params.employment_status = input.employment_status;
        params.updated_at = Utc::now();
        self.risk_parameters.update_risk_parameter(&params).await?;

        info!(action = "risk_parameter_updated", risk_parameter_id = %id, org_id = %auth.org_id);
        Ok(params)
    }

    /// Refused while a package still scores against these thresholds.
    pub async fn delete(&self, auth: &AuthContext, id: &Uuid) -> Result<()> {
        self.get(auth, id).await?;
        let in_use = self.packages.count_packages_for_risk_parameter(id).await?;
        if in_use > 0 {
            return Err(AppError::ValidationError(format!(
                "Risk parameter is used by {} package(s)",
                in_use
            )));
        }
        if !self.risk_parameters.delete_risk_parameter(id, &auth.org_id).await? {
            return Err(AppError::NotFound("Risk parameter".to_string()));
        }

        info!(action = "risk_parameter_deleted", risk_parameter_id = %id, org_id = %auth.org_id);
        Ok(())
    }
}
