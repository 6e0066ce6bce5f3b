use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::database::repository::{KycRepository, PackageRepository, RiskParameterRepository};
use crate::errors::{AppError, Result};
use crate::models::kyc::{
    AddressInfo, BankInfo, EmploymentInfo, KycSubmission, NewKycSubmission, PassportInfo,
    ProviderCallback, RiskLevel, SubmissionStatus, UserInfo,
};
use crate::models::package::Package;
use crate::models::risk_parameter::RiskParameter;

#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::StorageError(format!("Invalid {}: {}", field, e)))
}

fn parse_time(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::StorageError(format!("Invalid {} date: {}", field, e)))
}

fn parse_risk(raw: Option<String>) -> Result<Option<RiskLevel>> {
    raw.map(|r| r.parse()).transpose()
}

fn parse_payload(raw: Option<String>) -> Result<serde_json::Value> {
    match raw {
        Some(r) => serde_json::from_str(&r)
            .map_err(|e| AppError::StorageError(format!("Invalid provider response: {}", e))),
        None => Ok(serde_json::Value::Null),
    }
}

impl SqliteDatabase {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid DATABASE_URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives and dies with its connection.
        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(if in_memory { None } else { Some(std::time::Duration::from_secs(600)) })
            .max_lifetime(if in_memory { None } else { Some(std::time::Duration::from_secs(1800)) })
            .connect_with(options)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.create_tables().await?;

        info!(action = "database_connected", url = %database_url);
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn create_tables(&self) -> Result<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS risk_parameters (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                account_balance REAL NOT NULL,
                average_salary REAL NOT NULL,
                employment_status BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS packages (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                logo_url TEXT,
                risk_parameter_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (risk_parameter_id) REFERENCES risk_parameters (id)
            );

            CREATE TABLE IF NOT EXISTS kyc_submissions (
                id TEXT PRIMARY KEY,
                package_id TEXT NOT NULL,
                org_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'queued', -- 'queued', 'accepted', 'rejected'
                checklist TEXT NOT NULL,
                exclusive_id_number TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (package_id) REFERENCES packages (id)
            );

            CREATE TABLE IF NOT EXISTS user_infos (
                kyc_submission_id TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                nationality TEXT NOT NULL,
                address TEXT NOT NULL,
                email TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                id_number TEXT,
                image_url TEXT,
                signature_url TEXT,
                FOREIGN KEY (kyc_submission_id) REFERENCES kyc_submissions (id)
            );

            CREATE TABLE IF NOT EXISTS passport_infos (
                kyc_submission_id TEXT NOT NULL,
                status TEXT NOT NULL,
                document_number TEXT,
                full_name TEXT,
                sex TEXT,
                nationality TEXT,
                date_of_birth TEXT,
                date_of_issue TEXT,
                expiry_date TEXT,
                birth_place TEXT,
                authority TEXT,
                age_estimate TEXT,
                face_match BOOLEAN NOT NULL DEFAULT FALSE,
                front_image_url TEXT,
                face_image_url TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (kyc_submission_id) REFERENCES kyc_submissions (id)
            );

            CREATE TABLE IF NOT EXISTS employment_infos (
                kyc_submission_id TEXT NOT NULL,
                employer_name TEXT,
                average_salary REAL NOT NULL,
                employment_status BOOLEAN NOT NULL DEFAULT FALSE,
                average_salary_risk_level TEXT,
                employment_risk_level TEXT,
                provider_response TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (kyc_submission_id) REFERENCES kyc_submissions (id)
            );

            CREATE TABLE IF NOT EXISTS bank_infos (
                kyc_submission_id TEXT NOT NULL,
                account_holder TEXT,
                bank_name TEXT,
                account_number TEXT,
                balance REAL NOT NULL,
                account_balance_risk_level TEXT,
                provider_response TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (kyc_submission_id) REFERENCES kyc_submissions (id)
            );

            CREATE TABLE IF NOT EXISTS address_infos (
                kyc_submission_id TEXT NOT NULL,
                address TEXT,
                proof_of_address_url TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (kyc_submission_id) REFERENCES kyc_submissions (id)
            );

            CREATE INDEX IF NOT EXISTS idx_kyc_submissions_package ON kyc_submissions (package_id);
            CREATE INDEX IF NOT EXISTS idx_kyc_submissions_org ON kyc_submissions (org_id);
            CREATE INDEX IF NOT EXISTS idx_user_infos_id_number ON user_infos (id_number);
            -- At most one queued submission per guarded ID number.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_kyc_submissions_queued_id_number
                ON kyc_submissions (exclusive_id_number) WHERE status = 'queued';
        "#;

        sqlx::raw_sql(query)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Hydrates submission rows with one query per sub-record table, however
    /// many submissions are listed.
    async fn load_submissions(&self, rows: Vec<SqliteRow>) -> Result<Vec<KycSubmission>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|row| row.get::<String, _>("id")).collect();

        let mut users = group_rows(&self.fetch_sub_rows("user_infos", &ids).await?, |r, id| {
            Ok(UserInfo {
                kyc_submission_id: id,
                first_name: r.get("first_name"),
                last_name: r.get("last_name"),
                nationality: r.get("nationality"),
                address: r.get("address"),
                email: r.get("email"),
                phone_number: r.get("phone_number"),
                id_number: r.get("id_number"),
                image_url: r.get("image_url"),
                signature_url: r.get("signature_url"),
            })
        })?;

        let mut passports = group_rows(&self.fetch_sub_rows("passport_infos", &ids).await?, |r, id| {
            Ok(PassportInfo {
                kyc_submission_id: id,
                status: r.get("status"),
                document_number: r.get("document_number"),
                full_name: r.get("full_name"),
                sex: r.get("sex"),
                nationality: r.get("nationality"),
                date_of_birth: r.get("date_of_birth"),
                date_of_issue: r.get("date_of_issue"),
                expiry_date: r.get("expiry_date"),
                birth_place: r.get("birth_place"),
                authority: r.get("authority"),
                age_estimate: r.get("age_estimate"),
                face_match: r.get("face_match"),
                front_image_url: r.get("front_image_url"),
                face_image_url: r.get("face_image_url"),
            })
        })?;

        let mut employments = group_rows(&self.fetch_sub_rows("employment_infos", &ids).await?, |r, id| {
            Ok(EmploymentInfo {
                kyc_submission_id: id,
                employer_name: r.get("employer_name"),
                average_salary: r.get("average_salary"),
                employment_status: r.get("employment_status"),
                average_salary_risk_level: parse_risk(r.get("average_salary_risk_level"))?,
                employment_risk_level: parse_risk(r.get("employment_risk_level"))?,
                provider_response: parse_payload(r.get("provider_response"))?,
            })
        })?;

        let mut banks = group_rows(&self.fetch_sub_rows("bank_infos", &ids).await?, |r, id| {
            Ok(BankInfo {
                kyc_submission_id: id,
                account_holder: r.get("account_holder"),
                bank_name: r.get("bank_name"),
                account_number: r.get("account_number"),
                balance: r.get("balance"),
                account_balance_risk_level: parse_risk(r.get("account_balance_risk_level"))?,
                provider_response: parse_payload(r.get("provider_response"))?,
            })
        })?;

        let mut addresses = group_rows(&self.fetch_sub_rows("address_infos", &ids).await?, |r, id| {
            Ok(AddressInfo {
                kyc_submission_id: id,
                address: r.get("address"),
                proof_of_address_url: r.get("proof_of_address_url"),
            })
        })?;

        let mut submissions = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = parse_uuid(&row.get::<String, _>("id"), "submission id")?;
            let checklist: BTreeMap<String, String> = serde_json::from_str(&row.get::<String, _>("checklist"))?;
            let user_info = users
                .remove(&id)
                .and_then(|mut found| found.pop())
                .unwrap_or_else(|| UserInfo {
                    kyc_submission_id: id,
                    ..Default::default()
                });

            submissions.push(KycSubmission {
                id,
                package_id: parse_uuid(&row.get::<String, _>("package_id"), "package id")?,
                org_id: row.get("org_id"),
                status: row.get::<String, _>("status").parse()?,
                checklist,
                user_info,
                passport_infos: passports.remove(&id).unwrap_or_default(),
                employment_infos: employments.remove(&id).unwrap_or_default(),
                bank_infos: banks.remove(&id).unwrap_or_default(),
                address_infos: addresses.remove(&id).unwrap_or_default(),
                created_at: parse_time(&row.get::<String, _>("created_at"), "created_at")?,
                updated_at: parse_time(&row.get::<String, _>("updated_at"), "updated_at")?,
            });
        }
        Ok(submissions)
    }

    async fn fetch_sub_rows(&self, table: &'static str, ids: &[String]) -> Result<Vec<SqliteRow>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {} WHERE kyc_submission_id IN (", table));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY rowid");

        query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch {}: {}", table, e)))
    }
}

/// Buckets sub-record rows by submission, keeping arrival order.
fn group_rows<T>(
    rows: &[SqliteRow],
    build: impl Fn(&SqliteRow, Uuid) -> Result<T>,
) -> Result<HashMap<Uuid, Vec<T>>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        let id = parse_uuid(&row.get::<String, _>("kyc_submission_id"), "submission id")?;
        grouped.entry(id).or_default().push(build(row, id)?);
    }
    Ok(grouped)
}

fn package_from_row(row: &SqliteRow) -> Result<Package> {
    Ok(Package {
        id: parse_uuid(&row.get::<String, _>("id"), "package id")?,
        org_id: row.get("org_id"),
        name: row.get("name"),
        description: row.get("description"),
        logo_url: row.get("logo_url"),
        risk_parameter_id: parse_uuid(&row.get::<String, _>("risk_parameter_id"), "risk parameter id")?,
        created_at: parse_time(&row.get::<String, _>("created_at"), "created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "updated_at")?,
    })
}

fn risk_parameter_from_row(row: &SqliteRow) -> Result<RiskParameter> {
    Ok(RiskParameter {
        id: parse_uuid(&row.get::<String, _>("id"), "risk parameter id")?,
        org_id: row.get("org_id"),
        name: row.get("name"),
        account_balance: row.get("account_balance"),
        average_salary: row.get("average_salary"),
        employment_status: row.get("employment_status"),
        created_at: parse_time(&row.get::<String, _>("created_at"), "created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "updated_at")?,
    })
}

#[async_trait]
impl KycRepository for SqliteDatabase {
    async fn create_submission(&self, submission: &NewKycSubmission) -> Result<KycSubmission> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to begin transaction: {}", e)))?;

        let org_id: String = sqlx::query("SELECT org_id FROM packages WHERE id = ?1")
            .bind(submission.package_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch package: {}", e)))?
            .map(|row| row.get("org_id"))
            .ok_or_else(|| AppError::NotFound("Package".to_string()))?;

        if let Some(id_number) = &submission.exclusive_id_number {
            let queued: i64 = sqlx::query(
                r#"
                SELECT COUNT(*) AS count FROM kyc_submissions s
                JOIN user_infos u ON u.kyc_submission_id = s.id
                WHERE u.id_number = ?1 AND s.status = ?2
                "#,
            )
            .bind(id_number)
            .bind(SubmissionStatus::Queued.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to look up queued submissions: {}", e)))?
            .get("count");
            if queued > 0 {
                return Err(AppError::DuplicateInProgress);
            }
        }

        let now = Utc::now();
        let checklist = serde_json::to_string(&submission.checklist)?;

        // The partial unique index catches a writer that committed after the count above.
        sqlx::query(
            r#"
            INSERT INTO kyc_submissions (id, package_id, org_id, status, checklist, exclusive_id_number, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(submission.id.to_string())
        .bind(submission.package_id.to_string())
        .bind(&org_id)
        .bind(SubmissionStatus::Queued.as_str())
        .bind(&checklist)
        .bind(&submission.exclusive_id_number)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() && submission.exclusive_id_number.is_some() => {
                AppError::DuplicateInProgress
            }
            e => AppError::StorageError(format!("Failed to create KYC submission: {}", e)),
        })?;

        let user = &submission.user_info;
        sqlx::query(
            r#"
            INSERT INTO user_infos (kyc_submission_id, first_name, last_name, nationality, address, email, phone_number, id_number, image_url, signature_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(submission.id.to_string())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.nationality)
        .bind(&user.address)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.id_number)
        .bind(&user.image_url)
        .bind(&user.signature_url)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to create user info: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to commit KYC submission: {}", e)))?;

        Ok(KycSubmission {
            id: submission.id,
            package_id: submission.package_id,
            org_id,
            status: SubmissionStatus::Queued,
            checklist: submission.checklist.clone(),
            user_info: UserInfo {
                kyc_submission_id: submission.id,
                ..submission.user_info.clone()
            },
            passport_infos: Vec::new(),
            employment_infos: Vec::new(),
            bank_infos: Vec::new(),
            address_infos: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_submission_by_id(&self, id: &Uuid) -> Result<Option<KycSubmission>> {
        let row = sqlx::query("SELECT * FROM kyc_submissions WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch KYC submission: {}", e)))?;

        match row {
            Some(row) => Ok(self.load_submissions(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_submissions_by_package(&self, package_id: &Uuid, org_id: &str) -> Result<Vec<KycSubmission>> {
        let rows = sqlx::query(
            "SELECT * FROM kyc_submissions WHERE package_id = ?1 AND org_id = ?2 ORDER BY created_at DESC",
        )
        .bind(package_id.to_string())
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to fetch KYC submissions: {}", e)))?;

        self.load_submissions(rows).await
    }

    async fn get_submissions_by_org(&self, org_id: &str) -> Result<Vec<KycSubmission>> {
        let rows = sqlx::query("SELECT * FROM kyc_submissions WHERE org_id = ?1 ORDER BY created_at DESC")
            .bind(org_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch KYC submissions: {}", e)))?;

        self.load_submissions(rows).await
    }

    async fn update_submission_status(&self, id: &Uuid, status: SubmissionStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE kyc_submissions SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .bind(SubmissionStatus::Queued.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update KYC status: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn has_queued_submission_for_id_number(&self, id_number: &str) -> Result<bool> {
        Ok(!self.queued_submission_ids_for_id_number(id_number).await?.is_empty())
    }

    async fn queued_submission_ids_for_id_number(&self, id_number: &str) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id FROM kyc_submissions s
            JOIN user_infos u ON u.kyc_submission_id = s.id
            WHERE u.id_number = ?1 AND s.status = ?2
            "#,
        )
        .bind(id_number)
        .bind(SubmissionStatus::Queued.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to look up queued submissions: {}", e)))?;

        rows.iter()
            .map(|row| parse_uuid(&row.get::<String, _>("id"), "submission id"))
            .collect()
    }

    async fn create_sub_records(&self, submission_id: &Uuid, records: &ProviderCallback) -> Result<()> {
        let id = submission_id.to_string();
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to begin transaction: {}", e)))?;

        if let Some(p) = &records.passport_info {
            sqlx::query(
                r#"
                INSERT INTO passport_infos (kyc_submission_id, status, document_number, full_name, sex, nationality, date_of_birth, date_of_issue, expiry_date, birth_place, authority, age_estimate, face_match, front_image_url, face_image_url, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
            )
            .bind(&id)
            .bind(&p.status)
            .bind(&p.document_number)
            .bind(&p.full_name)
            .bind(&p.sex)
            .bind(&p.nationality)
            .bind(&p.date_of_birth)
            .bind(&p.date_of_issue)
            .bind(&p.expiry_date)
            .bind(&p.birth_place)
            .bind(&p.authority)
            .bind(&p.age_estimate)
            .bind(p.face_match)
            .bind(&p.front_image_url)
            .bind(&p.face_image_url)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create passport info: {}", e)))?;
        }

        if let Some(a) = &records.address_info {
            sqlx::query(
                "INSERT INTO address_infos (kyc_submission_id, address, proof_of_address_url, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&id)
            .bind(&a.address)
            .bind(&a.proof_of_address_url)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create address info: {}", e)))?;
        }

        if let Some(b) = &records.bank_info {
            sqlx::query(
                r#"
                INSERT INTO bank_infos (kyc_submission_id, account_holder, bank_name, account_number, balance, account_balance_risk_level, provider_response, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&id)
            .bind(&b.account_holder)
            .bind(&b.bank_name)
            .bind(&b.account_number)
            .bind(b.balance)
            .bind(b.account_balance_risk_level.map(|r| r.as_str()))
            .bind(serde_json::to_string(&b.provider_response)?)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to create bank info: {}", e)))?;
        }

        if let Some(e) = &records.employment_info {
            sqlx::query(
                r#"
                INSERT INTO employment_infos (kyc_submission_id, employer_name, average_salary, employment_status, average_salary_risk_level, employment_risk_level, provider_response, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&id)
            .bind(&e.employer_name)
            .bind(e.average_salary)
            .bind(e.employment_status)
            .bind(e.average_salary_risk_level.map(|r| r.as_str()))
            .bind(e.employment_risk_level.map(|r| r.as_str()))
            .bind(serde_json::to_string(&e.provider_response)?)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|err| AppError::StorageError(format!("Failed to create employment info: {}", err)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to commit sub-records: {}", e)))?;

        Ok(())
    }

    async fn count_submissions_for_package(&self, package_id: &Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM kyc_submissions WHERE package_id = ?1")
            .bind(package_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to count KYC submissions: {}", e)))?;

        Ok(row.get("count"))
    }
}

#[async_trait]
impl PackageRepository for SqliteDatabase {
    async fn create_package(&self, package: &Package) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO packages (id, org_id, name, description, logo_url, risk_parameter_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(package.id.to_string())
        .bind(&package.org_id)
        .bind(&package.name)
        .bind(&package.description)
        .bind(&package.logo_url)
        .bind(package.risk_parameter_id.to_string())
        .bind(package.created_at.to_rfc3339())
        .bind(package.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to create package: {}", e)))?;

        Ok(())
    }

    async fn get_package_by_id(&self, id: &Uuid) -> Result<Option<Package>> {
        sqlx::query("SELECT * FROM packages WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch package: {}", e)))?
            .as_ref()
            .map(package_from_row)
            .transpose()
    }

    async fn get_packages_by_org(&self, org_id: &str) -> Result<Vec<Package>> {
        sqlx::query("SELECT * FROM packages WHERE org_id = ?1 ORDER BY created_at DESC")
            .bind(org_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch packages: {}", e)))?
            .iter()
            .map(package_from_row)
            .collect()
    }

    async fn update_package(&self, package: &Package) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE packages SET name = ?1, description = ?2, logo_url = ?3, risk_parameter_id = ?4, updated_at = ?5
            WHERE id = ?6 AND org_id = ?7
            "#,
        )
        .bind(&package.name)
        .bind(&package.description)
        .bind(&package.logo_url)
        .bind(package.risk_parameter_id.to_string())
        .bind(package.updated_at.to_rfc3339())
        .bind(package.id.to_string())
        .bind(&package.org_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update package: {}", e)))?;

        Ok(())
    }

    async fn delete_package(&self, id: &Uuid, org_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM packages WHERE id = ?1 AND org_id = ?2")
            .bind(id.to_string())
            .bind(org_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to delete package: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_packages_for_risk_parameter(&self, risk_parameter_id: &Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM packages WHERE risk_parameter_id = ?1")
            .bind(risk_parameter_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to count packages: {}", e)))?;

        Ok(row.get("count"))
    }
}

#[async_trait]
impl RiskParameterRepository for SqliteDatabase {
    async fn create_risk_parameter(&self, params: &RiskParameter) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO risk_parameters (id, org_id, name, account_balance, average_salary, employment_status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(params.id.to_string())
        .bind(&params.org_id)
        .bind(&params.name)
        .bind(params.account_balance)
        .bind(params.average_salary)
        .bind(params.employment_status)
        .bind(params.created_at.to_rfc3339())
        .bind(params.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to create risk parameter: {}", e)))?;

        Ok(())
    }

    async fn get_risk_parameter_by_id(&self, id: &Uuid) -> Result<Option<RiskParameter>> {
        sqlx::query("SELECT * FROM risk_parameters WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch risk parameter: {}", e)))?
            .as_ref()
            .map(risk_parameter_from_row)
            .transpose()
    }

    async fn get_risk_parameters_by_org(&self, org_id: &str) -> Result<Vec<RiskParameter>> {
        sqlx::query("SELECT * FROM risk_parameters WHERE org_id = ?1 ORDER BY created_at DESC")
            .bind(org_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to fetch risk parameters: {}", e)))?
            .iter()
            .map(risk_parameter_from_row)
            .collect()
    }

    async fn update_risk_parameter(&self, params: &RiskParameter) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE risk_parameters SET name = ?1, account_balance = ?2, average_salary = ?3, employment_status = ?4, updated_at = ?5
            WHERE id = ?6 AND org_id = ?7
            "#,
        )
        .bind(&params.name)
        .bind(params.account_balance)
        .bind(params.average_salary)
        .bind(params.employment_status)
        .bind(params.updated_at.to_rfc3339())
        .bind(params.id.to_string())
        .bind(&params.org_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageError(format!("Failed to update risk parameter: {}", e)))?;

        Ok(())
    }

    async fn delete_risk_parameter(&self, id: &Uuid, org_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM risk_parameters WHERE id = ?1 AND org_id = ?2")
            .bind(id.to_string())
            .bind(org_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to delete risk parameter: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }
}
