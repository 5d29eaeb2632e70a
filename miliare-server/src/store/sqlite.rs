//! SQLite-based storage implementation

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use miliare_core::{
    CommissionSplit, Company, CompanyId, CompanyStatus, CompensationStructure,
    Error as CoreError, Group, Payment, PaymentId, PaymentStatus, PaymentType, Principal,
    PrincipalId, Referral, ReferralId, ReferralStatus, ShareRole, YearMonth,
};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    Affiliation, DataStore, PaymentFilter, ReferralFilter, Session, SessionId, SessionStore,
    StoreResult,
};
use crate::error::ServerError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const PRINCIPAL_COLUMNS: &str =
    "id, display_name, email, groups, company_id, team_lead_id, org_lead_id";

const COMPANY_COLUMNS: &str = "id, name, contact_email, website, description, status, \
     agent_bps, team_lead_bps, org_lead_bps, bonus_pool_bps, mrn_bps, contractor_bps, \
     webhook_secret_hash";

const REFERRAL_COLUMNS: &str = "id, company_id, submitted_by, client_name, client_contact, \
     approximate_value, status, payment_status, amount, per_role_amounts, team_lead_id, \
     org_lead_id, created_at, updated_at, paid_at, payment_failure_reason, version";

const PAYMENT_COLUMNS: &str =
    "id, principal_id, referral_id, company_id, role, amount, payment_type, period, processed_at";

/// SQLite-based store implementing both DataStore and SessionStore
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, ServerError> {
        let conn = Connection::open(path)?;

        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Run migrations
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), ServerError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, ServerError> {
        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })?)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), ServerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS principals (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                groups TEXT NOT NULL DEFAULT '[]',
                company_id TEXT,
                team_lead_id TEXT,
                org_lead_id TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                contact_email TEXT NOT NULL,
                website TEXT,
                description TEXT,
                status TEXT NOT NULL,
                agent_bps INTEGER NOT NULL,
                team_lead_bps INTEGER NOT NULL,
                org_lead_bps INTEGER NOT NULL,
                bonus_pool_bps INTEGER NOT NULL,
                mrn_bps INTEGER NOT NULL,
                contractor_bps INTEGER NOT NULL,
                webhook_secret_hash TEXT UNIQUE
            );

            -- Referrals are never deleted, only transitioned
            CREATE TABLE IF NOT EXISTS referrals (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL REFERENCES companies(id),
                submitted_by TEXT NOT NULL,
                client_name TEXT NOT NULL,
                client_contact TEXT NOT NULL,
                approximate_value INTEGER NOT NULL,
                status TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                amount INTEGER,
                per_role_amounts TEXT,
                team_lead_id TEXT,
                org_lead_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                paid_at TEXT,
                payment_failure_reason TEXT,
                version INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_referrals_company ON referrals(company_id);
            CREATE INDEX IF NOT EXISTS idx_referrals_submitted_by ON referrals(submitted_by);
            CREATE INDEX IF NOT EXISTS idx_referrals_team_lead ON referrals(team_lead_id);

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                principal_id TEXT,
                referral_id TEXT REFERENCES referrals(id),
                company_id TEXT,
                role TEXT,
                amount INTEGER NOT NULL,
                payment_type TEXT NOT NULL,
                period TEXT NOT NULL,
                processed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_payments_principal ON payments(principal_id);
            CREATE INDEX IF NOT EXISTS idx_payments_referral ON payments(referral_id);

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                principal_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Conditional referral write on an open connection or transaction
    fn update_referral_on(
        conn: &Connection,
        referral: &Referral,
        expected_version: u64,
    ) -> StoreResult<Referral> {
        let split = referral
            .per_role_amounts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let next_version = expected_version + 1;

        // Identity, ownership and upline snapshot columns are never rewritten
        let rows_affected = conn.execute(
            "UPDATE referrals SET status = ?1, payment_status = ?2, amount = ?3,
                 per_role_amounts = ?4, updated_at = ?5, paid_at = ?6,
                 payment_failure_reason = ?7, version = ?8
             WHERE id = ?9 AND version = ?10",
            params![
                referral.status.as_str(),
                referral.payment_status.as_str(),
                referral.amount,
                split,
                referral.updated_at.to_rfc3339(),
                referral.paid_at.map(|t| t.to_rfc3339()),
                referral.payment_failure_reason,
                next_version as i64,
                referral.id.as_str(),
                expected_version as i64,
            ],
        )?;

        if rows_affected == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM referrals WHERE id = ?1)",
                params![referral.id.as_str()],
                |row| row.get(0),
            )?;
            return Err(if exists {
                CoreError::Conflict {
                    kind: "referral",
                    id: referral.id.to_string(),
                    expected: expected_version,
                }
                .into()
            } else {
                ServerError::not_found("referral", referral.id.as_str())
            });
        }

        let mut stored = referral.clone();
        stored.version = next_version;
        Ok(stored)
    }

    fn insert_payment_on(conn: &Connection, payment: &Payment) -> StoreResult<()> {
        conn.execute(
            &format!(
                "INSERT INTO payments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                PAYMENT_COLUMNS
            ),
            params![
                payment.id.0,
                payment.principal_id.as_ref().map(PrincipalId::as_str),
                payment.referral_id.as_ref().map(ReferralId::as_str),
                payment.company_id.as_ref().map(CompanyId::as_str),
                payment.role.map(|r| r.as_str()),
                payment.amount,
                payment.payment_type.as_str(),
                payment.period.to_string(),
                payment.processed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn principal_from_row(row: &Row<'_>) -> rusqlite::Result<Principal> {
    let groups: String = row.get(3)?;
    let groups: BTreeSet<Group> =
        serde_json::from_str(&groups).map_err(|e| conversion_error(3, e.to_string()))?;
    Ok(Principal {
        id: PrincipalId(row.get(0)?),
        display_name: row.get(1)?,
        email: row.get(2)?,
        groups,
        company_id: row.get::<_, Option<String>>(4)?.map(CompanyId),
        team_lead_id: row.get::<_, Option<String>>(5)?.map(PrincipalId),
        org_lead_id: row.get::<_, Option<String>>(6)?.map(PrincipalId),
    })
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<Company> {
    let status: String = row.get(5)?;
    Ok(Company {
        id: CompanyId(row.get(0)?),
        name: row.get(1)?,
        contact_email: row.get(2)?,
        website: row.get(3)?,
        description: row.get(4)?,
        status: CompanyStatus::parse(&status)
            .ok_or_else(|| conversion_error(5, format!("unknown company status {}", status)))?,
        compensation: CompensationStructure {
            agent_bps: row.get(6)?,
            team_lead_bps: row.get(7)?,
            org_lead_bps: row.get(8)?,
            bonus_pool_bps: row.get(9)?,
            mrn_bps: row.get(10)?,
            contractor_bps: row.get(11)?,
        },
        webhook_secret_hash: row.get(12)?,
    })
}

fn referral_from_row(row: &Row<'_>) -> rusqlite::Result<Referral> {
    let status: String = row.get(6)?;
    let payment_status: String = row.get(7)?;
    let split: Option<String> = row.get(9)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;
    let paid_at: Option<String> = row.get(14)?;
    let version: i64 = row.get(16)?;

    Ok(Referral {
        id: ReferralId(row.get(0)?),
        company_id: CompanyId(row.get(1)?),
        submitted_by: PrincipalId(row.get(2)?),
        client_name: row.get(3)?,
        client_contact: row.get(4)?,
        approximate_value: row.get(5)?,
        status: ReferralStatus::parse(&status)
            .ok_or_else(|| conversion_error(6, format!("unknown referral status {}", status)))?,
        payment_status: PaymentStatus::parse(&payment_status).ok_or_else(|| {
            conversion_error(7, format!("unknown payment status {}", payment_status))
        })?,
        amount: row.get(8)?,
        per_role_amounts: split
            .map(|s| serde_json::from_str::<CommissionSplit>(&s))
            .transpose()
            .map_err(|e| conversion_error(9, e.to_string()))?,
        team_lead_id: row.get::<_, Option<String>>(10)?.map(PrincipalId),
        org_lead_id: row.get::<_, Option<String>>(11)?.map(PrincipalId),
        created_at: parse_time(12, &created_at)?,
        updated_at: parse_time(13, &updated_at)?,
        paid_at: paid_at.map(|s| parse_time(14, &s)).transpose()?,
        payment_failure_reason: row.get(15)?,
        version: version as u64,
    })
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    let role: Option<String> = row.get(4)?;
    let payment_type: String = row.get(6)?;
    let period: String = row.get(7)?;
    let processed_at: String = row.get(8)?;

    Ok(Payment {
        id: PaymentId(row.get(0)?),
        principal_id: row.get::<_, Option<String>>(1)?.map(PrincipalId),
        referral_id: row.get::<_, Option<String>>(2)?.map(ReferralId),
        company_id: row.get::<_, Option<String>>(3)?.map(CompanyId),
        role: role
            .map(|r| {
                ShareRole::parse(&r).ok_or_else(|| conversion_error(4, format!("unknown role {}", r)))
            })
            .transpose()?,
        amount: row.get(5)?,
        payment_type: PaymentType::parse(&payment_type).ok_or_else(|| {
            conversion_error(6, format!("unknown payment type {}", payment_type))
        })?,
        period: YearMonth::parse(&period).map_err(|e| conversion_error(7, e.to_string()))?,
        processed_at: parse_time(8, &processed_at)?,
    })
}

impl DataStore for SqliteStore {
    fn create_principal(&self, principal: &Principal) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let groups = serde_json::to_string(&principal.groups)
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        conn.execute(
            "INSERT INTO principals (id, display_name, email, groups, company_id, team_lead_id, org_lead_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                principal.id.as_str(),
                principal.display_name,
                principal.email.to_lowercase(),
                groups,
                principal.company_id.as_ref().map(CompanyId::as_str),
                principal.team_lead_id.as_ref().map(PrincipalId::as_str),
                principal.org_lead_id.as_ref().map(PrincipalId::as_str),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.code == rusqlite::ErrorCode::ConstraintViolation {
                    return ServerError::EmailAlreadyExists;
                }
            }
            ServerError::Internal(e.to_string())
        })?;

        Ok(())
    }

    fn get_principal(&self, id: &PrincipalId) -> StoreResult<Option<Principal>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM principals WHERE id = ?1", PRINCIPAL_COLUMNS),
                params![id.as_str()],
                principal_from_row,
            )
            .optional()?)
    }

    fn get_principal_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let normalized = email.to_lowercase();
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM principals WHERE email = ?1", PRINCIPAL_COLUMNS),
                params![normalized],
                principal_from_row,
            )
            .optional()?)
    }

    fn set_groups(&self, id: &PrincipalId, groups: &BTreeSet<Group>) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let groups =
            serde_json::to_string(groups).map_err(|e| ServerError::Internal(e.to_string()))?;

        let rows_affected = conn.execute(
            "UPDATE principals SET groups = ?1 WHERE id = ?2",
            params![groups, id.as_str()],
        )?;

        if rows_affected == 0 {
            return Err(ServerError::not_found("principal", id.as_str()));
        }

        Ok(())
    }

    fn set_affiliation(&self, id: &PrincipalId, affiliation: &Affiliation) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows_affected = conn.execute(
            "UPDATE principals SET company_id = ?1, team_lead_id = ?2, org_lead_id = ?3
             WHERE id = ?4",
            params![
                affiliation.company_id.as_ref().map(CompanyId::as_str),
                affiliation.team_lead_id.as_ref().map(PrincipalId::as_str),
                affiliation.org_lead_id.as_ref().map(PrincipalId::as_str),
                id.as_str()
            ],
        )?;

        if rows_affected == 0 {
            return Err(ServerError::not_found("principal", id.as_str()));
        }

        Ok(())
    }

    fn create_company(&self, company: &Company) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let c = &company.compensation;

        conn.execute(
            &format!(
                "INSERT INTO companies ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                COMPANY_COLUMNS
            ),
            params![
                company.id.as_str(),
                company.name,
                company.contact_email,
                company.website,
                company.description,
                company.status.as_str(),
                c.agent_bps,
                c.team_lead_bps,
                c.org_lead_bps,
                c.bonus_pool_bps,
                c.mrn_bps,
                c.contractor_bps,
                company.webhook_secret_hash,
            ],
        )?;

        Ok(())
    }

    fn get_company(&self, id: &CompanyId) -> StoreResult<Option<Company>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLUMNS),
                params![id.as_str()],
                company_from_row,
            )
            .optional()?)
    }

    fn list_companies(&self) -> StoreResult<Vec<Company>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM companies ORDER BY name, id",
            COMPANY_COLUMNS
        ))?;
        let companies = stmt
            .query_map([], company_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(companies)
    }

    fn update_company(&self, company: &Company) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let c = &company.compensation;

        let rows_affected = conn.execute(
            "UPDATE companies SET name = ?1, contact_email = ?2, website = ?3, description = ?4,
                 status = ?5, agent_bps = ?6, team_lead_bps = ?7, org_lead_bps = ?8,
                 bonus_pool_bps = ?9, mrn_bps = ?10, contractor_bps = ?11, webhook_secret_hash = ?12
             WHERE id = ?13",
            params![
                company.name,
                company.contact_email,
                company.website,
                company.description,
                company.status.as_str(),
                c.agent_bps,
                c.team_lead_bps,
                c.org_lead_bps,
                c.bonus_pool_bps,
                c.mrn_bps,
                c.contractor_bps,
                company.webhook_secret_hash,
                company.id.as_str(),
            ],
        )?;

        if rows_affected == 0 {
            return Err(ServerError::not_found("company", company.id.as_str()));
        }

        Ok(())
    }

    fn find_company_by_webhook_hash(&self, hash: &str) -> StoreResult<Option<Company>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM companies WHERE webhook_secret_hash = ?1",
                    COMPANY_COLUMNS
                ),
                params![hash],
                company_from_row,
            )
            .optional()?)
    }

    fn create_referral(&self, referral: &Referral) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let split = referral
            .per_role_amounts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        conn.execute(
            &format!(
                "INSERT INTO referrals ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                REFERRAL_COLUMNS
            ),
            params![
                referral.id.as_str(),
                referral.company_id.as_str(),
                referral.submitted_by.as_str(),
                referral.client_name,
                referral.client_contact,
                referral.approximate_value,
                referral.status.as_str(),
                referral.payment_status.as_str(),
                referral.amount,
                split,
                referral.team_lead_id.as_ref().map(PrincipalId::as_str),
                referral.org_lead_id.as_ref().map(PrincipalId::as_str),
                referral.created_at.to_rfc3339(),
                referral.updated_at.to_rfc3339(),
                referral.paid_at.map(|t| t.to_rfc3339()),
                referral.payment_failure_reason,
                referral.version as i64,
            ],
        )?;

        Ok(())
    }

    fn get_referral(&self, id: &ReferralId) -> StoreResult<Option<Referral>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM referrals WHERE id = ?1", REFERRAL_COLUMNS),
                params![id.as_str()],
                referral_from_row,
            )
            .optional()?)
    }

    fn list_referrals(&self, filter: &ReferralFilter) -> StoreResult<Vec<Referral>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(company_id) = &filter.company_id {
            values.push(company_id.0.clone());
            clauses.push(format!("company_id = ?{}", values.len()));
        }
        if let Some(submitted_by) = &filter.submitted_by {
            values.push(submitted_by.0.clone());
            clauses.push(format!("submitted_by = ?{}", values.len()));
        }
        if let Some(lead) = &filter.team_of {
            values.push(lead.0.clone());
            let n = values.len();
            clauses.push(format!("(team_lead_id = ?{n} OR submitted_by = ?{n})"));
        }
        if let Some(principal) = &filter.involving {
            values.push(principal.0.clone());
            let n = values.len();
            clauses.push(format!(
                "(submitted_by = ?{n} OR team_lead_id = ?{n} OR org_lead_id = ?{n})"
            ));
        }
        if let Some(status) = filter.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(payment_status) = filter.payment_status {
            values.push(payment_status.as_str().to_string());
            clauses.push(format!("payment_status = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM referrals {} ORDER BY created_at DESC, id",
            REFERRAL_COLUMNS, where_clause
        ))?;
        let referrals = stmt
            .query_map(params_from_iter(values.iter()), referral_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(referrals)
    }

    fn update_referral(&self, referral: &Referral, expected_version: u64) -> StoreResult<Referral> {
        let conn = self.conn.lock().unwrap();
        Self::update_referral_on(&conn, referral, expected_version)
    }

    fn record_payout(
        &self,
        referral: &Referral,
        expected_version: u64,
        payments: &[Payment],
    ) -> StoreResult<Referral> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let stored = Self::update_referral_on(&tx, referral, expected_version)?;
        for payment in payments {
            Self::insert_payment_on(&tx, payment)?;
        }

        tx.commit()?;
        Ok(stored)
    }

    fn create_payment(&self, payment: &Payment) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::insert_payment_on(&conn, payment)
    }

    fn list_payments(&self, filter: &PaymentFilter) -> StoreResult<Vec<Payment>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(principal_id) = &filter.principal_id {
            values.push(principal_id.0.clone());
            clauses.push(format!("principal_id = ?{}", values.len()));
        }
        if let Some(referral_id) = &filter.referral_id {
            values.push(referral_id.0.clone());
            clauses.push(format!("referral_id = ?{}", values.len()));
        }
        if let Some(company_id) = &filter.company_id {
            values.push(company_id.0.clone());
            clauses.push(format!("company_id = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payments {} ORDER BY processed_at, id",
            PAYMENT_COLUMNS, where_clause
        ))?;
        let payments = stmt
            .query_map(params_from_iter(values.iter()), payment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(payments)
    }
}

impl SessionStore for SqliteStore {
    fn create(&self, principal_id: &PrincipalId) -> StoreResult<Session> {
        let conn = self.conn.lock().unwrap();
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            principal_id: principal_id.clone(),
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO sessions (id, principal_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.id.0,
                session.principal_id.as_str(),
                session.created_at.to_rfc3339(),
            ],
        )?;

        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        let conn = self.conn.lock().unwrap();

        Ok(conn
            .query_row(
                "SELECT id, principal_id, created_at FROM sessions WHERE id = ?1",
                params![session_id.0],
                |row| {
                    let id: String = row.get(0)?;
                    let principal_id: String = row.get(1)?;
                    let created_at: String = row.get(2)?;
                    Ok(Session {
                        id: SessionId(id),
                        principal_id: PrincipalId(principal_id),
                        created_at: parse_time(2, &created_at)?,
                    })
                },
            )
            .optional()?)
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id.0])?;

        Ok(())
    }
}
