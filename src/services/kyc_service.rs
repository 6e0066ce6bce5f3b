use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::{KycRepository, PackageRepository, RiskParameterRepository};
use crate::errors::{AppError, Result};
use crate::models::auth::AuthContext;
use crate::models::kyc::{
    KycSubmission, NewKycSubmission, ProviderCallback, SubmissionStatus, UserInfo,
    EMPLOYMENT_VERIFICATION_LINK, INCOME_VERIFICATION_LINK, PASSPORT_VERIFICATION_LINK,
};
use crate::models::package::Package;
use crate::providers::{ProviderKind, ProviderRegistry, RoutingTable};
use crate::services::notification_service::{status_email, Notifier};
use crate::services::risk;

/// Input for a new submission. `nationality` may be in any case.
#[derive(Debug, Clone)]
pub struct CreateSubmission {
    pub package_id: Uuid,
    pub user_info: UserInfo,
}

/// The submission engine: dispatch to providers, reconcile their callbacks,
/// score what they report and record staff decisions.
pub struct KycService {
    submissions: Arc<dyn KycRepository>,
    packages: Arc<dyn PackageRepository>,
    risk_parameters: Arc<dyn RiskParameterRepository>,
    providers: ProviderRegistry,
    routes: RoutingTable,
    notifier: Arc<dyn Notifier>,
}

impl KycService {
    pub fn new(
        submissions: Arc<dyn KycRepository>,
        packages: Arc<dyn PackageRepository>,
        risk_parameters: Arc<dyn RiskParameterRepository>,
        providers: ProviderRegistry,
        routes: RoutingTable,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        routes.validate(&providers)?;
        Ok(Self {
            submissions,
            packages,
            risk_parameters,
            providers,
            routes,
            notifier,
        })
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub async fn create(&self, request: CreateSubmission) -> Result<KycSubmission> {
        let mut user_info = request.user_info;
        user_info.nationality = user_info.nationality.trim().to_lowercase();

        let route = self.routes.resolve(&user_info.nationality)?;

        // Early rejection only; the repository enforces the guard again on insert.
        let exclusive_id_number = if route.guard_by_id_number {
            let id_number = user_info
                .id_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    AppError::ValidationError(format!("ID number is required for {}", user_info.nationality))
                })?;
            if self.submissions.has_queued_submission_for_id_number(&id_number).await? {
                warn!(action = "kyc_duplicate_in_progress", package_id = %request.package_id);
                return Err(AppError::DuplicateInProgress);
            }
            user_info.id_number = Some(id_number.clone());
            Some(id_number)
        } else {
            None
        };

        if self.packages.get_package_by_id(&request.package_id).await?.is_none() {
            return Err(AppError::NotFound("Package".to_string()));
        }

        let submission_id = Uuid::new_v4();
        let slots = [
            (PASSPORT_VERIFICATION_LINK, self.routes.document_provider()),
            (INCOME_VERIFICATION_LINK, route.income),
            (EMPLOYMENT_VERIFICATION_LINK, route.employment),
        ];

        // A provider covering more than one slot is asked once.
        let mut links: HashMap<ProviderKind, String> = HashMap::new();
        let mut checklist = BTreeMap::new();
        for (slot, kind) in slots {
            let link = match links.get(&kind) {
                Some(link) => link.clone(),
                None => {
                    let provider = self.providers.get(kind)?;
                    let link = provider
                        .create_link(&submission_id, &user_info.first_name, &user_info.last_name)
                        .await
                        .map_err(|e| {
                            error!(action = "kyc_link_creation_failed", provider = %kind, error = %e);
                            match e {
                                AppError::ProviderError(_) => e,
                                other => AppError::ProviderError(format!("{}: {}", kind, other)),
                            }
                        })?;
                    links.insert(kind, link.clone());
                    link
                }
            };
            checklist.insert(slot.to_string(), link);
        }

        user_info.kyc_submission_id = submission_id;
        let submission = self
            .submissions
            .create_submission(&NewKycSubmission {
                id: submission_id,
                package_id: request.package_id,
                checklist,
                user_info,
                exclusive_id_number,
            })
            .await
            .map_err(|e| {
                if matches!(e, AppError::DuplicateInProgress) {
                    warn!(action = "kyc_duplicate_in_progress", package_id = %request.package_id, stage = "insert");
                }
                e
            })?;

        info!(
            action = "kyc_submission_created",
            submission_id = %submission.id,
            package_id = %submission.package_id,
            org_id = %submission.org_id,
            nationality = %submission.user_info.nationality
        );
        Ok(submission)
    }

    pub async fn get_by_id(&self, auth: &AuthContext, package_id: &Uuid, id: &Uuid) -> Result<KycSubmission> {
        self.scoped_submission(auth, Some(package_id), id).await
    }

    pub async fn get_by_package(&self, auth: &AuthContext, package_id: &Uuid) -> Result<Vec<KycSubmission>> {
        self.scoped_package(auth, package_id).await?;
        self.submissions.get_submissions_by_package(package_id, &auth.org_id).await
    }

    pub async fn get_by_org(&self, auth: &AuthContext) -> Result<Vec<KycSubmission>> {
        self.submissions.get_submissions_by_org(&auth.org_id).await
    }

    /// Records the staff decision, then e-mails the applicant.
    ///
    /// The status write is not rolled back when the e-mail fails; the caller
    /// gets `NotificationError` and the submission stays decided.
    pub async fn update_status_by_id(
        &self,
        auth: &AuthContext,
        package_id: &Uuid,
        id: &Uuid,
        status: SubmissionStatus,
    ) -> Result<KycSubmission> {
        if !status.is_final() {
            return Err(AppError::ValidationError("Status must be accepted or rejected".to_string()));
        }

        let package = self.scoped_package(auth, package_id).await?;
        let mut submission = self.scoped_submission(auth, Some(package_id), id).await?;

        if submission.status.is_final() {
            return Err(AppError::InvalidStatusTransition(format!(
                "submission is already {}",
                submission.status
            )));
        }
        if !self.submissions.update_submission_status(id, status).await? {
            return Err(AppError::InvalidStatusTransition("submission is no longer queued".to_string()));
        }
        submission.status = status;

        info!(
            action = "kyc_status_updated",
            submission_id = %id,
            status = %status,
            user_id = %auth.user_id
        );

        let (subject, body) = status_email(&package.name, &submission.user_info, id, status);
        let recipients = vec![submission.user_info.email.clone()];
        self.notifier
            .send_email(&recipients, &subject, &body, true)
            .await
            .map_err(|e| {
                error!(action = "kyc_status_email_failed", submission_id = %id, error = %e);
                match e {
                    AppError::NotificationError(_) => e,
                    other => AppError::NotificationError(other.to_string()),
                }
            })?;

        Ok(submission)
    }

    /// Reconciles one provider callback into sub-records of its submission.
    ///
    /// Each present sub-record becomes a new row. Two deliveries of the same
    /// kind for a submission leave two rows; readers take the latest.
    pub async fn update_by_provider_info(&self, callback: ProviderCallback) -> Result<()> {
        if !callback.has_records() {
            info!(action = "kyc_callback_without_records");
            return Ok(());
        }

        let submission_id = self.resolve_submission(&callback).await?;
        let submission = self
            .submissions
            .get_submission_by_id(&submission_id)
            .await?
            .ok_or_else(|| AppError::ReconciliationFailed(format!("no submission {}", submission_id)))?;

        let package = self
            .packages
            .get_package_by_id(&submission.package_id)
            .await?
            .ok_or_else(|| {
                AppError::ConfigurationError(format!("package {} for submission {} is missing", submission.package_id, submission_id))
            })?;
        let params = self
            .risk_parameters
            .get_risk_parameter_by_id(&package.risk_parameter_id)
            .await?
            .ok_or_else(|| {
                AppError::ConfigurationError(format!("risk parameter {} for package {} is missing", package.risk_parameter_id, package.id))
            })?;

        let kinds = callback.kinds();
        let records = ProviderCallback {
            submission_id: Some(submission_id),
            id_number: callback.id_number,
            passport_info: callback.passport_info.map(|mut p| {
                p.kyc_submission_id = submission_id;
                p
            }),
            address_info: callback.address_info.map(|mut a| {
                a.kyc_submission_id = submission_id;
                a
            }),
            bank_info: callback.bank_info.map(|mut b| {
                b.kyc_submission_id = submission_id;
                risk::assess_bank_info(b, &params)
            }),
            employment_info: callback.employment_info.map(|mut e| {
                e.kyc_submission_id = submission_id;
                risk::assess_employment_info(e, &params)
            }),
        };

        self.submissions.create_sub_records(&submission_id, &records).await?;

        info!(
            action = "kyc_callback_reconciled",
            submission_id = %submission_id,
            records = ?kinds,
            bank_risk = ?records.bank_info.as_ref().and_then(|b| b.account_balance_risk_level),
            salary_risk = ?records.employment_info.as_ref().and_then(|e| e.average_salary_risk_level)
        );
        Ok(())
    }

    async fn resolve_submission(&self, callback: &ProviderCallback) -> Result<Uuid> {
        if let Some(id) = callback.submission_id {
            return Ok(id);
        }

        let id_number = callback
            .id_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::ReconciliationFailed("callback carries no submission identifier".to_string()))?;

        let mut matches = self.submissions.queued_submission_ids_for_id_number(id_number).await?;
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(AppError::ReconciliationFailed("no queued submission for ID number".to_string())),
            n => Err(AppError::ReconciliationFailed(format!("{} queued submissions share the ID number", n))),
        }
    }

    async fn scoped_package(&self, auth: &AuthContext, package_id: &Uuid) -> Result<Package> {
        self.packages
            .get_package_by_id(package_id)
            .await?
            .filter(|p| p.org_id == auth.org_id)
            .ok_or_else(|| AppError::NotFound("Package".to_string()))
    }

    async fn scoped_submission(&self, auth: &AuthContext, package_id: Option<&Uuid>, id: &Uuid) -> Result<KycSubmission> {
        self.submissions
            .get_submission_by_id(id)
            .await?
            .filter(|s| s.org_id == auth.org_id)
            .filter(|s| package_id.map_or(true, |p| &s.package_id == p))
            .ok_or_else(|| AppError::NotFound("KYC submission".to_string()))
    }
}
