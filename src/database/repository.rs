use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::kyc::{KycSubmission, NewKycSubmission, ProviderCallback, SubmissionStatus};
use crate::models::package::Package;
use crate::models::risk_parameter::RiskParameter;

#[async_trait]
pub trait KycRepository: Send + Sync {
    /// Persists the submission and its user info in one transaction, stamping
    /// the owning package's organization. Fails with `NotFound` for an unknown package.
    async fn create_submission(&self, submission: &NewKycSubmission) -> Result<KycSubmission>;

    async fn get_submission_by_id(&self, id: &Uuid) -> Result<Option<KycSubmission>>;

    async fn get_submissions_by_package(&self, package_id: &Uuid, org_id: &str) -> Result<Vec<KycSubmission>>;

    async fn get_submissions_by_org(&self, org_id: &str) -> Result<Vec<KycSubmission>>;

    /// Moves a `queued` submission to `status`. Returns false when the
    /// submission was no longer queued.
    async fn update_submission_status(&self, id: &Uuid, status: SubmissionStatus) -> Result<bool>;

    async fn has_queued_submission_for_id_number(&self, id_number: &str) -> Result<bool>;

    async fn queued_submission_ids_for_id_number(&self, id_number: &str) -> Result<Vec<Uuid>>;

    /// Inserts every sub-record carried by `records` for `submission_id` in one transaction.
    async fn create_sub_records(&self, submission_id: &Uuid, records: &ProviderCallback) -> Result<()>;

    async fn count_submissions_for_package(&self, package_id: &Uuid) -> Result<i64>;
}

#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn create_package(&self, package: &Package) -> Result<()>;

    async fn get_package_by_id(&self, id: &Uuid) -> Result<Option<Package>>;

    async fn get_packages_by_org(&self, org_id: &str) -> Result<Vec<Package>>;

    async fn update_package(&self, package: &Package) -> Result<()>;

    async fn delete_package(&self, id: &Uuid, org_id: &str) -> Result<bool>;

    async fn count_packages_for_risk_parameter(&self, risk_parameter_id: &Uuid) -> Result<i64>;
}

#[async_trait]
pub trait RiskParameterRepository: Send + Sync {
    async fn create_risk_parameter(&self, params: &RiskParameter) -> Result<()>;

    async fn get_risk_parameter_by_id(&self, id: &Uuid) -> Result<Option<RiskParameter>>;

    async fn get_risk_parameters_by_org(&self, org_id: &str) -> Result<Vec<RiskParameter>>;

    async fn update_risk_parameter(&self, params: &RiskParameter) -> Result<()>;

    async fn delete_risk_parameter(&self, id: &Uuid, org_id: &str) -> Result<bool>;
}
