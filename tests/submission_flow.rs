use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use kyc_backend::database::{KycRepository, PackageRepository, RiskParameterRepository, SqliteDatabase};
use kyc_backend::errors::{AppError, Result};
use kyc_backend::models::auth::{AuthContext, Role};
use kyc_backend::models::kyc::{
    BankInfo, EmploymentInfo, KycSubmission, ProviderCallback, RiskLevel, SubmissionStatus, UserInfo,
    EMPLOYMENT_VERIFICATION_LINK, INCOME_VERIFICATION_LINK, PASSPORT_VERIFICATION_LINK,
};
use kyc_backend::models::package::Package;
use kyc_backend::models::risk_parameter::RiskParameter;
use kyc_backend::providers::{KycProvider, ProviderKind, ProviderRegistry, RoutingTable};
use kyc_backend::services::kyc_service::{CreateSubmission, KycService};
use kyc_backend::services::notification_service::Notifier;

struct FakeProvider {
    kind: ProviderKind,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl KycProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn create_link(&self, submission_id: &Uuid, _first_name: &str, _last_name: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(AppError::ProviderError(format!("{} is down", self.kind)));
        }
        Ok(format!("https://{}.test/verify/{}", self.kind, submission_id))
    }

    async fn parse_callback(&self, _body: &[u8]) -> Result<ProviderCallback> {
        Ok(ProviderCallback::empty())
    }
}

/// Risk parameters that have vanished from under their package.
struct MissingRiskParameters;

#[async_trait]
impl RiskParameterRepository for MissingRiskParameters {
    async fn create_risk_parameter(&self, _params: &RiskParameter) -> Result<()> {
        Ok(())
    }

    async fn get_risk_parameter_by_id(&self, _id: &Uuid) -> Result<Option<RiskParameter>> {
        Ok(None)
    }

    async fn get_risk_parameters_by_org(&self, _org_id: &str) -> Result<Vec<RiskParameter>> {
        Ok(Vec::new())
    }

    async fn update_risk_parameter(&self, _params: &RiskParameter) -> Result<()> {
        Ok(())
    }

    async fn delete_risk_parameter(&self, _id: &Uuid, _org_id: &str) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    sent: Mutex<Vec<(Vec<String>, String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, recipients: &[String], subject: &str, body: &str, _is_plain_text: bool) -> Result<()> {
        if self.fail {
            return Err(AppError::NotificationError("smtp unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipients.to_vec(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

struct Harness {
    db: Arc<SqliteDatabase>,
    kyc: KycService,
    notifier: Arc<RecordingNotifier>,
    package: Package,
    auth: AuthContext,
}

async fn harness_with(notifier: RecordingNotifier, failing: Option<ProviderKind>) -> Harness {
    let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
    let now = Utc::now();

    let params = RiskParameter {
        id: Uuid::new_v4(),
        org_id: "org_a".to_string(),
        name: "standard".to_string(),
        account_balance: 1000.0,
        average_salary: 500.0,
        employment_status: true,
        created_at: now,
        updated_at: now,
    };
    db.create_risk_parameter(&params).await.unwrap();

    let package = Package {
        id: Uuid::new_v4(),
        org_id: "org_a".to_string(),
        name: "Student Visa".to_string(),
        description: "Study abroad checks".to_string(),
        logo_url: None,
        risk_parameter_id: params.id,
        created_at: now,
        updated_at: now,
    };
    db.create_package(&package).await.unwrap();

    let notifier = Arc::new(notifier);
    let kyc = KycService::new(
        db.clone(),
        db.clone(),
        db.clone(),
        registry(failing, Duration::ZERO),
        RoutingTable::default(),
        notifier.clone(),
    )
    .unwrap();

    Harness {
        db,
        kyc,
        notifier,
        package,
        auth: AuthContext {
            org_id: "org_a".to_string(),
            user_id: "staff_1".to_string(),
            role: Role::Admin,
        },
    }
}

fn registry(failing: Option<ProviderKind>, delay: Duration) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    for kind in ProviderKind::ALL {
        providers.register(Arc::new(FakeProvider {
            kind,
            fail: failing == Some(kind),
            delay,
        }));
    }
    providers
}

async fn harness() -> Harness {
    harness_with(RecordingNotifier::default(), None).await
}

fn applicant(nationality: &str, id_number: Option<&str>) -> UserInfo {
    UserInfo {
        first_name: "Ada".to_string(),
        last_name: "Obi".to_string(),
        nationality: nationality.to_string(),
        address: "1 Marina".to_string(),
        email: "ada@example.com".to_string(),
        phone_number: "+2348012345678".to_string(),
        id_number: id_number.map(str::to_string),
        ..Default::default()
    }
}

impl Harness {
    async fn submit(&self, nationality: &str, id_number: Option<&str>) -> Result<KycSubmission> {
        self.kyc
            .create(CreateSubmission {
                package_id: self.package.id,
                user_info: applicant(nationality, id_number),
            })
            .await
    }

    async fn reload(&self, id: &Uuid) -> KycSubmission {
        self.db.get_submission_by_id(id).await.unwrap().unwrap()
    }

    /// A second engine over the same database with its own providers and thresholds.
    fn engine(&self, providers: ProviderRegistry, risk_parameters: Arc<dyn RiskParameterRepository>) -> KycService {
        KycService::new(
            self.db.clone(),
            self.db.clone(),
            risk_parameters,
            providers,
            RoutingTable::default(),
            self.notifier.clone(),
        )
        .unwrap()
    }
}

fn bank_callback(submission_id: Uuid, balance: f64) -> ProviderCallback {
    ProviderCallback {
        submission_id: Some(submission_id),
        bank_info: Some(BankInfo {
            bank_name: Some("BCA".to_string()),
            balance,
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_indonesia_submission_scores_each_bank_callback() {
    let h = harness().await;
    let submission = h.submit("Indonesia", None).await.unwrap();

    assert_eq!(submission.status, SubmissionStatus::Queued);
    assert_eq!(submission.org_id, "org_a");
    assert_eq!(submission.user_info.nationality, "indonesia");
    assert!(submission.checklist[PASSPORT_VERIFICATION_LINK].starts_with("https://idenfy.test/"));
    assert!(submission.checklist[INCOME_VERIFICATION_LINK].starts_with("https://onebrick.test/"));
    assert_eq!(
        submission.checklist[INCOME_VERIFICATION_LINK],
        submission.checklist[EMPLOYMENT_VERIFICATION_LINK]
    );

    h.kyc.update_by_provider_info(bank_callback(submission.id, 500.0)).await.unwrap();
    let stored = h.reload(&submission.id).await;
    assert_eq!(stored.bank_infos.len(), 1);
    assert_eq!(stored.bank_infos[0].account_balance_risk_level, Some(RiskLevel::High));

    h.kyc.update_by_provider_info(bank_callback(submission.id, 1500.0)).await.unwrap();
    let stored = h.reload(&submission.id).await;
    assert_eq!(stored.bank_infos.len(), 2);
    assert_eq!(stored.bank_infos[0].account_balance_risk_level, Some(RiskLevel::High));
    assert_eq!(stored.bank_infos[1].account_balance_risk_level, Some(RiskLevel::Low));
    assert_eq!(stored.bank_infos[1].balance, 1500.0);

    // Callbacks never decide the submission or rewrite the applicant.
    assert_eq!(stored.status, SubmissionStatus::Queued);
    assert_eq!(stored.user_info, submission.user_info);
}

#[tokio::test]
async fn test_unsupported_country_persists_nothing() {
    let h = harness().await;
    let result = h.submit("France", None).await;
    assert!(matches!(result, Err(AppError::UnsupportedCountry(_))));
    assert!(h.kyc.get_by_org(&h.auth).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_package_is_not_found() {
    let h = harness().await;
    let result = h
        .kyc
        .create(CreateSubmission {
            package_id: Uuid::new_v4(),
            user_info: applicant("indonesia", None),
        })
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_provider_failure_persists_nothing() {
    let h = harness_with(RecordingNotifier::default(), Some(ProviderKind::OneBrick)).await;
    let result = h.submit("indonesia", None).await;
    assert!(matches!(result, Err(AppError::ProviderError(_))));
    assert!(h.kyc.get_by_org(&h.auth).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_nigeria_duplicate_guard() {
    let h = harness().await;
    let first = h.submit("nigeria", Some("22212345678")).await.unwrap();
    assert!(first.checklist[INCOME_VERIFICATION_LINK].starts_with("https://creditcheck.test/"));
    assert!(first.checklist[EMPLOYMENT_VERIFICATION_LINK].starts_with("https://okra.test/"));

    let again = h.submit("Nigeria", Some("22212345678")).await;
    assert!(matches!(again, Err(AppError::DuplicateInProgress)));

    h.submit("nigeria", Some("22299999999")).await.unwrap();

    let missing = h.submit("nigeria", None).await;
    assert!(matches!(missing, Err(AppError::ValidationError(_))));

    // Once decided, the number may apply again.
    h.kyc
        .update_status_by_id(&h.auth, &h.package.id, &first.id, SubmissionStatus::Rejected)
        .await
        .unwrap();
    h.submit("nigeria", Some("22212345678")).await.unwrap();
}

#[tokio::test]
async fn test_employment_callback_by_id_number() {
    let h = harness().await;
    let submission = h.submit("nigeria", Some("22212345678")).await.unwrap();

    let callback = ProviderCallback {
        id_number: Some("22212345678".to_string()),
        employment_info: Some(EmploymentInfo {
            employer_name: Some("Dangote".to_string()),
            average_salary: 400.0,
            employment_status: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    h.kyc.update_by_provider_info(callback).await.unwrap();

    let stored = h.reload(&submission.id).await;
    assert_eq!(stored.employment_infos.len(), 1);
    assert_eq!(stored.employment_infos[0].kyc_submission_id, submission.id);
    assert_eq!(stored.employment_infos[0].average_salary_risk_level, Some(RiskLevel::High));
    assert_eq!(stored.employment_infos[0].employment_risk_level, Some(RiskLevel::Low));
    assert!(stored.bank_infos.is_empty());
    assert!(stored.passport_infos.is_empty());
    assert!(stored.address_infos.is_empty());
}

#[tokio::test]
async fn test_unresolvable_callback_writes_nothing() {
    let h = harness().await;
    let submission = h.submit("nigeria", Some("22212345678")).await.unwrap();

    let by_number = ProviderCallback {
        id_number: Some("00000000000".to_string()),
        bank_info: Some(BankInfo {
            balance: 5000.0,
            ..Default::default()
        }),
        ..Default::default()
    };
    let result = h.kyc.update_by_provider_info(by_number).await;
    assert!(matches!(result, Err(AppError::ReconciliationFailed(_))));

    let result = h.kyc.update_by_provider_info(bank_callback(Uuid::new_v4(), 5000.0)).await;
    assert!(matches!(result, Err(AppError::ReconciliationFailed(_))));

    let stored = h.reload(&submission.id).await;
    assert!(stored.bank_infos.is_empty());
}

#[tokio::test]
async fn test_accepting_emails_the_applicant_once() {
    let h = harness().await;
    let submission = h.submit("indonesia", None).await.unwrap();

    let updated = h
        .kyc
        .update_status_by_id(&h.auth, &h.package.id, &submission.id, SubmissionStatus::Accepted)
        .await
        .unwrap();
    assert_eq!(updated.status, SubmissionStatus::Accepted);
    assert_eq!(h.reload(&submission.id).await.status, SubmissionStatus::Accepted);

    {
        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (recipients, subject, body) = &sent[0];
        assert_eq!(recipients, &vec!["ada@example.com".to_string()]);
        assert!(subject.contains("Student Visa"));
        assert!(body.contains("accepted"));
    }

    let again = h
        .kyc
        .update_status_by_id(&h.auth, &h.package.id, &submission.id, SubmissionStatus::Rejected)
        .await;
    assert!(matches!(again, Err(AppError::InvalidStatusTransition(_))));
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_survives_failed_email() {
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };
    let h = harness_with(notifier, None).await;
    let submission = h.submit("indonesia", None).await.unwrap();

    let result = h
        .kyc
        .update_status_by_id(&h.auth, &h.package.id, &submission.id, SubmissionStatus::Rejected)
        .await;
    assert!(matches!(result, Err(AppError::NotificationError(_))));
    assert_eq!(h.reload(&submission.id).await.status, SubmissionStatus::Rejected);
}

#[tokio::test]
async fn test_reads_are_scoped_to_the_organization() {
    let h = harness().await;
    let submission = h.submit("indonesia", None).await.unwrap();

    let outsider = AuthContext {
        org_id: "org_b".to_string(),
        ..h.auth.clone()
    };
    let result = h.kyc.get_by_id(&outsider, &h.package.id, &submission.id).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(h.kyc.get_by_org(&outsider).await.unwrap().is_empty());

    let result = h
        .kyc
        .update_status_by_id(&outsider, &h.package.id, &submission.id, SubmissionStatus::Accepted)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let listed = h.kyc.get_by_package(&h.auth, &h.package.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, submission.id);
}

#[tokio::test]
async fn test_concurrent_nigeria_creates_queue_one_submission() {
    let h = harness().await;
    let slow = h.engine(registry(None, Duration::from_millis(200)), h.db.clone());
    let request = || CreateSubmission {
        package_id: h.package.id,
        user_info: applicant("nigeria", Some("22212345678")),
    };

    // Both pass the early check while their provider links are still pending.
    let (first, second) = tokio::join!(slow.create(request()), slow.create(request()));
    let mut created = Vec::new();
    for result in [first, second] {
        match result {
            Ok(submission) => created.push(submission),
            Err(AppError::DuplicateInProgress) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(created.len(), 1);
    assert_eq!(h.kyc.get_by_org(&h.auth).await.unwrap().len(), 1);

    // The BVN still resolves to exactly one submission.
    let callback = ProviderCallback {
        id_number: Some("22212345678".to_string()),
        bank_info: Some(BankInfo {
            balance: 2500.0,
            ..Default::default()
        }),
        ..Default::default()
    };
    h.kyc.update_by_provider_info(callback).await.unwrap();
    let stored = h.reload(&created[0].id).await;
    assert_eq!(stored.bank_infos.len(), 1);
    assert_eq!(stored.bank_infos[0].account_balance_risk_level, Some(RiskLevel::Low));
}

#[tokio::test]
async fn test_callback_with_missing_risk_parameter_is_a_configuration_error() {
    let h = harness().await;
    let submission = h.submit("indonesia", None).await.unwrap();
    let detached = h.engine(registry(None, Duration::ZERO), Arc::new(MissingRiskParameters));

    let result = detached.update_by_provider_info(bank_callback(submission.id, 500.0)).await;
    assert!(matches!(result, Err(AppError::ConfigurationError(ref msg)) if msg.contains("risk parameter")));

    let stored = h.reload(&submission.id).await;
    assert!(stored.bank_infos.is_empty());
    assert!(stored.employment_infos.is_empty());
}

#[tokio::test]
async fn test_callback_matching_several_queued_submissions_writes_nothing() {
    let h = harness().await;
    // Indonesia does not guard its ID numbers, so both stay queued.
    let first = h.submit("indonesia", Some("3171012345678901")).await.unwrap();
    let second = h.submit("indonesia", Some("3171012345678901")).await.unwrap();

    let callback = ProviderCallback {
        id_number: Some("3171012345678901".to_string()),
        employment_info: Some(EmploymentInfo {
            average_salary: 900.0,
            employment_status: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    let result = h.kyc.update_by_provider_info(callback).await;
    assert!(matches!(result, Err(AppError::ReconciliationFailed(ref msg)) if msg.contains("2 queued")));

    for id in [first.id, second.id] {
        let stored = h.reload(&id).await;
        assert!(stored.employment_infos.is_empty());
        assert!(stored.bank_infos.is_empty());
    }
}
