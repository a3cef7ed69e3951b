//! PostgreSQL entity store
//!
//! Each workflow transition runs in one transaction. Rows a decision is
//! taken on are read `FOR UPDATE`; contract numbers are handed out under a
//! transaction-scoped advisory lock and guarded by a UNIQUE index.

use super::queries::*;
use super::{not_found, EditedContract, NewSourceBundle, ResolvedRound, RoundResolution, Store};
use crate::config::DatabaseConfig;
use crate::constants::{Frequency, ARCHIVING_STATES, STATES_WITH_POTENTIAL, VOTE_STATES};
use crate::dashboard::{CardKind, CardRow};
use crate::error::AppError;
use crate::models::{
    Contract, ContractFilter, EmailNegotiation, Harvest, QaCheck, Seed, Source, SourceFilter, User, Vote,
    VotingRound,
};
use crate::negotiation::{plan_submission, ScheduleSubmission};
use crate::workflow::contract::next_contract_number;
use crate::workflow::{ContractEdit, NumberAssignment, WorkflowEngine};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::fmt;
use std::str::FromStr;
use tokio_postgres::error::SqlState;
use tokio_postgres::{GenericClient, NoTls, Row};
use tracing::{debug, info};
use uuid::Uuid;

pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build the pool (TLS through rustls when required) and check it answers
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.dbname = Some(config.database.clone());
        cfg.pool = Some(PoolConfig::new(config.max_pool_size));
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = if config.require_tls {
            let certs = rustls_native_certs::load_native_certs();
            let mut root_store = rustls::RootCertStore::empty();
            for cert in certs.certs {
                root_store.add(cert).ok();
            }
            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
            cfg.create_pool(Some(Runtime::Tokio1), tls)
        } else {
            cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        }
        .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))?;

        let client = pool.get().await?;
        client.query_one("SELECT 1", &[]).await?;
        drop(client);

        info!(
            "Connected to PostgreSQL at {}:{}/{} (TLS: {})",
            config.host, config.port, config.database, config.require_tls
        );
        Ok(Self::new(pool))
    }

    /// Create missing tables and indexes
    pub async fn init_schema(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        for statement in SCHEMA {
            client.batch_execute(statement).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}

fn code<T>(row: &Row, column: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| AppError::Internal(format!("Column {}: {}", column, e)))
}

fn optional_code<T>(row: &Row, column: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|r| r.parse())
        .transpose()
        .map_err(|e| AppError::Internal(format!("Column {}: {}", column, e)))
}

fn frequency_code(raw: i16) -> Result<Frequency, AppError> {
    u16::try_from(raw)
        .ok()
        .and_then(|c| Frequency::try_from(c).ok())
        .ok_or_else(|| AppError::Internal(format!("Unknown harvest frequency {}", raw)))
}

fn frequency(row: &Row) -> Result<Frequency, AppError> {
    frequency_code(row.try_get("frequency")?)
}

fn user_from_row(row: &Row) -> Result<User, AppError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        name: row.try_get("name")?,
        role: code(row, "role")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn source_from_row(row: &Row) -> Result<Source, AppError> {
    Ok(Source {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        created_by: row.try_get("created_by")?,
        name: row.try_get("name")?,
        publisher: row.try_get("publisher")?,
        publisher_contact: row.try_get("publisher_contact")?,
        state: code(row, "state")?,
        frequency: frequency(row)?,
        category: row.try_get("category")?,
        sub_category: row.try_get("sub_category")?,
        comment: row.try_get("comment")?,
        suggested_by: optional_code(row, "suggested_by")?,
        web_proposal: row.try_get("web_proposal")?,
        aleph_id: row.try_get("aleph_id")?,
        issn: row.try_get("issn")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn seed_from_row(row: &Row) -> Result<Seed, AppError> {
    Ok(Seed {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        url: row.try_get("url")?,
        state: code(row, "state")?,
        redirect: row.try_get("redirect")?,
        robots: row.try_get("robots")?,
        comment: row.try_get("comment")?,
        from_time: row.try_get("from_time")?,
        to_time: row.try_get("to_time")?,
        created_at: row.try_get("created_at")?,
    })
}

fn round_from_row(row: &Row) -> Result<VotingRound, AppError> {
    Ok(VotingRound {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        state: code(row, "state")?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
        resolved_by: row.try_get("resolved_by")?,
    })
}

fn vote_from_row(row: &Row) -> Result<Vote, AppError> {
    Ok(Vote {
        id: row.try_get("id")?,
        voting_round_id: row.try_get("voting_round_id")?,
        author: row.try_get("author")?,
        decision: code(row, "decision")?,
        created_at: row.try_get("created_at")?,
    })
}

fn contract_from_row(row: &Row) -> Result<Contract, AppError> {
    Ok(Contract {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        state: code(row, "state")?,
        contract_type: code(row, "contract_type")?,
        contract_number: row.try_get("contract_number")?,
        valid_from: row.try_get("valid_from")?,
        valid_to: row.try_get("valid_to")?,
        publisher_responds: row.try_get("publisher_responds")?,
        in_communication: row.try_get("in_communication")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn email_from_row(row: &Row) -> Result<EmailNegotiation, AppError> {
    Ok(EmailNegotiation {
        id: row.try_get("id")?,
        contract_id: row.try_get("contract_id")?,
        scheduled_date: row.try_get("scheduled_date")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

fn qa_from_row(row: &Row) -> Result<QaCheck, AppError> {
    Ok(QaCheck {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        checked_by: row.try_get("checked_by")?,
        source_action: row.try_get("source_action")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

fn harvest_from_row(row: &Row) -> Result<Harvest, AppError> {
    let target: Option<i16> = row.try_get("target_frequency")?;
    Ok(Harvest {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        scheduled_on: row.try_get("scheduled_on")?,
        target_frequency: target.map(frequency_code).transpose()?,
        custom_seeds: row.try_get("custom_seeds")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn id_from_row(row: &Row) -> Result<Uuid, AppError> {
    Ok(row.try_get(0)?)
}

fn collect<T>(rows: Vec<Row>, map: fn(&Row) -> Result<T, AppError>) -> Result<Vec<T>, AppError> {
    rows.iter().map(map).collect()
}

fn unique_violation(e: tokio_postgres::Error, message: impl Into<String>) -> AppError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        AppError::Conflict(message.into())
    } else {
        AppError::Database(e)
    }
}

/// Fetch one row by id, optionally locking it for the transaction
async fn fetch<C, T>(
    client: &C,
    table: &str,
    columns: &str,
    kind: &str,
    id: Uuid,
    for_update: bool,
    map: fn(&Row) -> Result<T, AppError>,
) -> Result<T, AppError>
where
    C: GenericClient + Sync,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE id = $1{}",
        columns,
        table,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = client
        .query_opt(sql.as_str(), &[&id])
        .await?
        .ok_or_else(|| not_found(kind, id))?;
    map(&row)
}

/// Next contract number; holds the numbering lock until the transaction ends
async fn reserve_contract_number<C>(client: &C) -> Result<i64, AppError>
where
    C: GenericClient + Sync,
{
    client
        .execute(LOCK_CONTRACT_NUMBERS, &[&CONTRACT_NUMBER_LOCK])
        .await?;
    let row = client.query_one(MAX_CONTRACT_NUMBER, &[]).await?;
    Ok(next_contract_number(row.try_get(0)?))
}

async fn insert_contract_row<C>(client: &C, contract: &Contract) -> Result<(), AppError>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            INSERT_CONTRACT,
            &[
                &contract.id,
                &contract.source_id,
                &contract.state.as_str(),
                &contract.contract_type.as_str(),
                &contract.contract_number,
                &contract.valid_from,
                &contract.valid_to,
                &contract.publisher_responds,
                &contract.in_communication,
                &contract.description,
                &contract.created_at,
                &contract.updated_at,
            ],
        )
        .await
        .map_err(|e| unique_violation(e, "Contract number already in use"))?;
    Ok(())
}

async fn insert_round_row<C>(client: &C, round: &VotingRound) -> Result<(), AppError>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            INSERT_ROUND,
            &[
                &round.id,
                &round.source_id,
                &round.state.as_str(),
                &round.created_at,
                &round.resolved_at,
                &round.resolved_by,
            ],
        )
        .await?;
    Ok(())
}

async fn insert_seed_row<C>(client: &C, seed: &Seed) -> Result<(), AppError>
where
    C: GenericClient + Sync,
{
    client
        .execute(
            INSERT_SEED,
            &[
                &seed.id,
                &seed.source_id,
                &seed.url,
                &seed.state.as_str(),
                &seed.redirect,
                &seed.robots,
                &seed.comment,
                &seed.from_time,
                &seed.to_time,
                &seed.created_at,
            ],
        )
        .await?;
    Ok(())
}

async fn list_where<T>(
    pool: &Pool,
    table: &str,
    columns: &str,
    column: &str,
    id: Uuid,
    map: fn(&Row) -> Result<T, AppError>,
) -> Result<Vec<T>, AppError> {
    let client = pool.get().await?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = $1 ORDER BY created_at, id",
        columns, table, column
    );
    let rows = client.query(sql.as_str(), &[&id]).await?;
    collect(rows, map)
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                INSERT_USER,
                &[
                    &user.id,
                    &user.email,
                    &user.password_hash,
                    &user.name,
                    &user.role.as_str(),
                    &user.created_at,
                    &user.updated_at,
                ],
            )
            .await
            .map_err(|e| {
                unique_violation(e, format!("User with email '{}' already exists", user.email))
            })?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = client.query_opt(sql.as_str(), &[&email]).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "users", USER_COLUMNS, "User", id, false, user_from_row).await
    }

    async fn update_user(&self, user: User) -> Result<User, AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                UPDATE_USER,
                &[&user.id, &user.name, &user.role.as_str(), &user.updated_at],
            )
            .await?;
        if updated == 0 {
            return Err(not_found("User", user.id));
        }
        Ok(user)
    }

    async fn create_source(&self, bundle: NewSourceBundle) -> Result<Source, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let source = &bundle.source;

        tx.execute(
            INSERT_SOURCE,
            &[
                &source.id,
                &source.owner,
                &source.created_by,
                &source.name,
                &source.publisher,
                &source.publisher_contact,
                &source.state.as_str(),
                &(source.frequency.code() as i16),
                &source.category,
                &source.sub_category,
                &source.comment,
                &source.suggested_by.map(|s| s.as_str()),
                &source.web_proposal,
                &source.aleph_id,
                &source.issn,
                &source.created_at,
                &source.updated_at,
            ],
        )
        .await
        .map_err(|e| unique_violation(e, format!("Source {} already exists", source.id)))?;

        insert_round_row(&*tx, &bundle.round).await?;
        for seed in &bundle.seeds {
            insert_seed_row(&*tx, seed).await?;
        }
        if let Some(contract) = &bundle.contract {
            insert_contract_row(&*tx, contract).await?;
        }

        tx.commit().await?;
        Ok(bundle.source)
    }

    async fn get_source(&self, id: Uuid) -> Result<Source, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "sources", SOURCE_COLUMNS, "Source", id, false, source_from_row).await
    }

    async fn list_sources(&self, filter: &SourceFilter) -> Result<Vec<Source>, AppError> {
        let client = self.pool.get().await?;
        let state = filter.state.map(|s| s.as_str());
        let sql = format!(
            "SELECT {} FROM sources \
             WHERE ($1::VARCHAR IS NULL OR state = $1) AND ($2::UUID IS NULL OR owner = $2) \
             ORDER BY created_at, id",
            SOURCE_COLUMNS
        );
        let rows = client.query(sql.as_str(), &[&state, &filter.owner]).await?;
        collect(rows, source_from_row)
    }

    async fn update_source(&self, source: Source) -> Result<Source, AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                UPDATE_SOURCE,
                &[
                    &source.id,
                    &source.owner,
                    &source.name,
                    &source.publisher,
                    &source.publisher_contact,
                    &source.state.as_str(),
                    &(source.frequency.code() as i16),
                    &source.category,
                    &source.sub_category,
                    &source.comment,
                    &source.suggested_by.map(|s| s.as_str()),
                    &source.web_proposal,
                    &source.aleph_id,
                    &source.issn,
                    &source.updated_at,
                ],
            )
            .await?;
        if updated == 0 {
            return Err(not_found("Source", source.id));
        }
        Ok(source)
    }

    async fn insert_seed(&self, seed: Seed) -> Result<Seed, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "sources", "id", "Source", seed.source_id, false, id_from_row).await?;
        insert_seed_row(&**client, &seed).await?;
        Ok(seed)
    }

    async fn get_seed(&self, id: Uuid) -> Result<Seed, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "seeds", SEED_COLUMNS, "Seed", id, false, seed_from_row).await
    }

    async fn update_seed(&self, seed: Seed) -> Result<Seed, AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                UPDATE_SEED,
                &[
                    &seed.id,
                    &seed.url,
                    &seed.state.as_str(),
                    &seed.redirect,
                    &seed.robots,
                    &seed.comment,
                    &seed.from_time,
                    &seed.to_time,
                ],
            )
            .await?;
        if updated == 0 {
            return Err(not_found("Seed", seed.id));
        }
        Ok(seed)
    }

    async fn list_seeds(&self, source_id: Uuid) -> Result<Vec<Seed>, AppError> {
        list_where(&self.pool, "seeds", SEED_COLUMNS, "source_id", source_id, seed_from_row).await
    }

    async fn get_round(&self, id: Uuid) -> Result<VotingRound, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "voting_rounds", ROUND_COLUMNS, "Voting round", id, false, round_from_row)
            .await
    }

    async fn list_rounds(&self, source_id: Uuid) -> Result<Vec<VotingRound>, AppError> {
        list_where(
            &self.pool,
            "voting_rounds",
            ROUND_COLUMNS,
            "source_id",
            source_id,
            round_from_row,
        )
        .await
    }

    async fn open_round(
        &self,
        round: VotingRound,
        engine: &WorkflowEngine,
    ) -> Result<VotingRound, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let source = fetch(
            &*tx,
            "sources",
            SOURCE_COLUMNS,
            "Source",
            round.source_id,
            true,
            source_from_row,
        )
        .await?;
        let sql = format!("SELECT {} FROM voting_rounds WHERE source_id = $1", ROUND_COLUMNS);
        let rounds = collect(tx.query(sql.as_str(), &[&source.id]).await?, round_from_row)?;
        engine.check_reopen(&source, &rounds)?;

        insert_round_row(&*tx, &round).await?;
        tx.commit().await?;
        Ok(round)
    }

    async fn list_votes(&self, round_id: Uuid) -> Result<Vec<Vote>, AppError> {
        list_where(&self.pool, "votes", VOTE_COLUMNS, "voting_round_id", round_id, vote_from_row)
            .await
    }

    async fn upsert_vote(&self, vote: Vote) -> Result<Vote, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let round = fetch(
            &*tx,
            "voting_rounds",
            ROUND_COLUMNS,
            "Voting round",
            vote.voting_round_id,
            true,
            round_from_row,
        )
        .await?;
        if !round.is_open() {
            return Err(AppError::Conflict(format!(
                "Voting round {} is closed",
                round.id
            )));
        }

        let row = tx
            .query_one(
                UPSERT_VOTE,
                &[
                    &vote.id,
                    &vote.voting_round_id,
                    &vote.author,
                    &vote.decision.as_str(),
                    &vote.created_at,
                ],
            )
            .await?;
        let stored = vote_from_row(&row)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn resolve_round(
        &self,
        resolution: RoundResolution,
        engine: &WorkflowEngine,
    ) -> Result<ResolvedRound, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let mut round = fetch(
            &*tx,
            "voting_rounds",
            ROUND_COLUMNS,
            "Voting round",
            resolution.round_id,
            true,
            round_from_row,
        )
        .await?;
        let source = fetch(
            &*tx,
            "sources",
            SOURCE_COLUMNS,
            "Source",
            round.source_id,
            true,
            source_from_row,
        )
        .await?;
        engine.check_resolution(&resolution.actor, &round, &source, resolution.state)?;

        round.state = resolution.state;
        round.resolved_at = Some(Utc::now());
        round.resolved_by = Some(resolution.actor.id);
        tx.execute(
            RESOLVE_ROUND,
            &[
                &round.id,
                &round.state.as_str(),
                &round.resolved_at,
                &round.resolved_by,
            ],
        )
        .await?;

        let valid = tx
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM contracts WHERE source_id = $1 AND state = 'VALID')",
                &[&source.id],
            )
            .await?;
        let outcome = engine.on_round_updated(&round, &source, valid.try_get(0)?)?;
        let source = outcome.apply(&source);

        if outcome.source_state.is_some() {
            tx.execute(
                UPDATE_SOURCE_STATE,
                &[&source.id, &source.state.as_str(), &source.updated_at],
            )
            .await?;
        }
        if let Some(contract) = &outcome.new_contract {
            insert_contract_row(&*tx, contract).await?;
        }
        tx.commit().await?;

        info!(
            "Voting round {} resolved as {}, source {} is {}",
            round.id, round.state, source.id, source.state
        );
        Ok(ResolvedRound {
            round,
            source,
            contract: outcome.new_contract,
        })
    }

    async fn insert_contract(&self, contract: Contract) -> Result<Contract, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        fetch(&*tx, "sources", "id", "Source", contract.source_id, false, id_from_row).await?;
        insert_contract_row(&*tx, &contract).await?;
        tx.commit().await?;
        Ok(contract)
    }

    async fn get_contract(&self, id: Uuid) -> Result<Contract, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "contracts", CONTRACT_COLUMNS, "Contract", id, false, contract_from_row)
            .await
    }

    async fn list_contracts(&self, filter: &ContractFilter) -> Result<Vec<Contract>, AppError> {
        let client = self.pool.get().await?;
        let state = filter.state.map(|s| s.as_str());
        let sql = format!(
            "SELECT {} FROM contracts \
             WHERE ($1::VARCHAR IS NULL OR state = $1) \
                AND ($2::UUID IS NULL OR source_id = $2) \
                AND ($3::BOOLEAN IS NULL OR in_communication = $3) \
             ORDER BY created_at, id",
            CONTRACT_COLUMNS
        );
        let rows = client
            .query(
                sql.as_str(),
                &[&state, &filter.source_id, &filter.in_communication],
            )
            .await?;
        collect(rows, contract_from_row)
    }

    async fn edit_contract(
        &self,
        id: Uuid,
        edit: &ContractEdit,
        engine: &WorkflowEngine,
    ) -> Result<EditedContract, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let current = fetch(
            &*tx,
            "contracts",
            CONTRACT_COLUMNS,
            "Contract",
            id,
            true,
            contract_from_row,
        )
        .await?;
        let plan = engine.plan_contract_edit(&current, edit)?;
        let number_assigned = plan.assignment == NumberAssignment::Assign;
        let plan = if number_assigned {
            let number = reserve_contract_number(&*tx).await?;
            plan.with_number(number)
        } else {
            plan
        };

        let contract = &plan.contract;
        tx.execute(
            UPDATE_CONTRACT,
            &[
                &contract.id,
                &contract.state.as_str(),
                &contract.contract_type.as_str(),
                &contract.contract_number,
                &contract.valid_from,
                &contract.valid_to,
                &contract.publisher_responds,
                &contract.in_communication,
                &contract.description,
                &contract.updated_at,
            ],
        )
        .await
        .map_err(|e| unique_violation(e, "Contract number already in use"))?;

        if let Some(state) = plan.source_state {
            tx.execute(
                UPDATE_SOURCE_STATE,
                &[&contract.source_id, &state.as_str(), &Utc::now()],
            )
            .await?;
        }
        tx.commit().await?;

        if number_assigned {
            info!(
                "Contract {} validated with number {:?}",
                id, plan.contract.contract_number
            );
        }
        Ok(EditedContract {
            contract: plan.contract,
            number_assigned,
            source_state: plan.source_state,
        })
    }

    async fn list_emails(&self, contract_id: Uuid) -> Result<Vec<EmailNegotiation>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM email_negotiations WHERE contract_id = $1 ORDER BY scheduled_date, id",
            EMAIL_COLUMNS
        );
        let rows = client.query(sql.as_str(), &[&contract_id]).await?;
        collect(rows, email_from_row)
    }

    async fn save_schedule(
        &self,
        contract_id: Uuid,
        submission: &ScheduleSubmission,
    ) -> Result<Vec<EmailNegotiation>, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        fetch(&*tx, "contracts", "id", "Contract", contract_id, true, id_from_row).await?;
        let sql = format!(
            "SELECT {} FROM email_negotiations WHERE contract_id = $1 ORDER BY scheduled_date, id",
            EMAIL_COLUMNS
        );
        let existing = collect(tx.query(sql.as_str(), &[&contract_id]).await?, email_from_row)?;
        let changes = plan_submission(contract_id, &existing, submission)?;

        for id in &changes.deletes {
            tx.execute(DELETE_EMAIL, &[id, &contract_id]).await?;
        }
        for email in &changes.upserts {
            tx.execute(
                UPSERT_EMAIL,
                &[
                    &email.id,
                    &email.contract_id,
                    &email.scheduled_date,
                    &email.title,
                    &email.content,
                    &email.created_at,
                ],
            )
            .await?;
        }
        let saved = collect(tx.query(sql.as_str(), &[&contract_id]).await?, email_from_row)?;
        tx.commit().await?;

        debug!(
            "Schedule of contract {}: {} saved, {} removed",
            contract_id,
            changes.upserts.len(),
            changes.deletes.len()
        );
        Ok(saved)
    }

    async fn insert_qa(&self, check: QaCheck) -> Result<QaCheck, AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                INSERT_QA,
                &[
                    &check.id,
                    &check.source_id,
                    &check.checked_by,
                    &check.source_action,
                    &check.comment,
                    &check.created_at,
                ],
            )
            .await?;
        Ok(check)
    }

    async fn get_qa(&self, id: Uuid) -> Result<QaCheck, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "qa_checks", QA_COLUMNS, "QA check", id, false, qa_from_row).await
    }

    async fn update_qa(&self, check: QaCheck) -> Result<QaCheck, AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(UPDATE_QA, &[&check.id, &check.source_action, &check.comment])
            .await?;
        if updated == 0 {
            return Err(not_found("QA check", check.id));
        }
        Ok(check)
    }

    async fn list_qa(&self, source_id: Uuid) -> Result<Vec<QaCheck>, AppError> {
        list_where(&self.pool, "qa_checks", QA_COLUMNS, "source_id", source_id, qa_from_row).await
    }

    async fn insert_harvest(&self, harvest: Harvest) -> Result<Harvest, AppError> {
        let client = self.pool.get().await?;
        let target = harvest.target_frequency.map(|f| f.code() as i16);
        client
            .execute(
                INSERT_HARVEST,
                &[
                    &harvest.id,
                    &harvest.title,
                    &harvest.scheduled_on,
                    &target,
                    &harvest.custom_seeds,
                    &harvest.created_by,
                    &harvest.created_at,
                ],
            )
            .await
            .map_err(|e| unique_violation(e, format!("Harvest {} already exists", harvest.id)))?;
        Ok(harvest)
    }

    async fn get_harvest(&self, id: Uuid) -> Result<Harvest, AppError> {
        let client = self.pool.get().await?;
        fetch(&**client, "harvests", HARVEST_COLUMNS, "Harvest", id, false, harvest_from_row).await
    }

    async fn list_harvests(&self) -> Result<Vec<Harvest>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM harvests ORDER BY scheduled_on, created_at, id",
            HARVEST_COLUMNS
        );
        collect(client.query(sql.as_str(), &[]).await?, harvest_from_row)
    }

    async fn harvest_seeds(&self, frequency: Frequency) -> Result<Vec<String>, AppError> {
        let client = self.pool.get().await?;
        let archiving: Vec<&str> = ARCHIVING_STATES.iter().map(|s| s.as_str()).collect();
        let rows = client
            .query(HARVEST_SEEDS, &[&(frequency.code() as i16), &archiving])
            .await?;
        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(AppError::from))
            .collect()
    }

    async fn card_rows(&self, kind: CardKind, user: Uuid) -> Result<Vec<CardRow>, AppError> {
        let client = self.pool.get().await?;

        let contract_rows = |rows: Vec<Row>| -> Result<Vec<CardRow>, AppError> {
            rows.iter()
                .map(|r| {
                    Ok(CardRow::Contract {
                        contract: contract_from_row(r)?,
                        source_name: r.try_get("source_name")?,
                    })
                })
                .collect()
        };
        let round_rows = |rows: Vec<Row>| -> Result<Vec<CardRow>, AppError> {
            rows.iter()
                .map(|r| {
                    let votes: i64 = r.try_get("vote_count")?;
                    Ok(CardRow::Round {
                        round: round_from_row(r)?,
                        source_name: r.try_get("source_name")?,
                        vote_count: usize::try_from(votes).unwrap_or_default(),
                    })
                })
                .collect()
        };
        let source_query = |condition: &str| {
            format!(
                "SELECT {} FROM sources WHERE {} ORDER BY created_at, id",
                SOURCE_COLUMNS, condition
            )
        };

        let vote_states: Vec<&str> = VOTE_STATES.iter().map(|s| s.as_str()).collect();
        let rows = match kind {
            CardKind::Contracts => {
                contract_rows(client.query(CARD_CONTRACTS, &[&user, &false]).await?)?
            }
            CardKind::NoCommunication => {
                contract_rows(client.query(CARD_CONTRACTS, &[&user, &true]).await?)?
            }
            CardKind::VotingRounds => {
                round_rows(client.query(CARD_MANAGED_ROUNDS, &[&user]).await?)?
            }
            CardKind::OpenVotes => round_rows(
                client
                    .query(CARD_OPEN_ROUNDS, &[&user, &vote_states])
                    .await?,
            )?,
            CardKind::SourcesOwned => {
                let potential: Vec<&str> = STATES_WITH_POTENTIAL
                    .iter()
                    .map(|s| s.as_str())
                    .collect();
                let sql = source_query("owner = $1 AND state = ANY($2)");
                sources_to_rows(client.query(sql.as_str(), &[&user, &potential]).await?)?
            }
            CardKind::Technical => {
                let sql = source_query("state = 'technical'");
                sources_to_rows(client.query(sql.as_str(), &[]).await?)?
            }
            CardKind::WithoutAleph => {
                let archiving: Vec<&str> = ARCHIVING_STATES
                    .iter()
                    .map(|s| s.as_str())
                    .collect();
                let sql = source_query("state = ANY($1) AND aleph_id IS NULL");
                sources_to_rows(client.query(sql.as_str(), &[&archiving]).await?)?
            }
            CardKind::QaOpened => client
                .query(CARD_QA, &[&user])
                .await?
                .iter()
                .map(|r| {
                    Ok(CardRow::Qa {
                        check: qa_from_row(r)?,
                        source_name: r.try_get("source_name")?,
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()?,
        };
        Ok(rows)
    }
}

fn sources_to_rows(rows: Vec<Row>) -> Result<Vec<CardRow>, AppError> {
    rows.iter()
        .map(|r| {
            Ok(CardRow::Source {
                source: source_from_row(r)?,
            })
        })
        .collect()
}
