//! SQL statements of the PostgreSQL store
//!
//! Coded enums are stored as their text codes, the harvest frequency as its
//! number of harvests per year.

/// Tables and indexes, created at startup when missing
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email VARCHAR(255) UNIQUE NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        name VARCHAR(255) NOT NULL,
        role VARCHAR(16) NOT NULL DEFAULT 'curator',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id UUID PRIMARY KEY,
        owner UUID NOT NULL,
        created_by UUID NOT NULL,
        name VARCHAR(255) NOT NULL,
        publisher VARCHAR(255),
        publisher_contact VARCHAR(255),
        state VARCHAR(32) NOT NULL,
        frequency SMALLINT NOT NULL,
        category VARCHAR(255),
        sub_category VARCHAR(255),
        comment TEXT,
        suggested_by VARCHAR(16),
        web_proposal BOOLEAN NOT NULL DEFAULT false,
        aleph_id VARCHAR(64),
        issn VARCHAR(9),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS seeds (
        id UUID PRIMARY KEY,
        source_id UUID NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
        url TEXT NOT NULL,
        state VARCHAR(8) NOT NULL,
        redirect BOOLEAN NOT NULL DEFAULT false,
        robots BOOLEAN NOT NULL DEFAULT false,
        comment TEXT,
        from_time TIMESTAMPTZ,
        to_time TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS voting_rounds (
        id UUID PRIMARY KEY,
        source_id UUID NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
        state VARCHAR(16) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        resolved_at TIMESTAMPTZ,
        resolved_by UUID
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        id UUID PRIMARY KEY,
        voting_round_id UUID NOT NULL REFERENCES voting_rounds(id) ON DELETE CASCADE,
        author UUID NOT NULL,
        decision VARCHAR(16) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (voting_round_id, author)
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS contracts (
        id UUID PRIMARY KEY,
        source_id UUID NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
        state VARCHAR(16) NOT NULL,
        contract_type VARCHAR(16) NOT NULL,
        contract_number BIGINT UNIQUE,
        valid_from DATE,
        valid_to DATE,
        publisher_responds BOOLEAN NOT NULL DEFAULT false,
        in_communication BOOLEAN NOT NULL DEFAULT false,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS email_negotiations (
        id UUID PRIMARY KEY,
        contract_id UUID NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
        scheduled_date TIMESTAMPTZ NOT NULL,
        title VARCHAR(255) NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS qa_checks (
        id UUID PRIMARY KEY,
        source_id UUID NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
        checked_by UUID NOT NULL,
        source_action VARCHAR(64),
        comment TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS harvests (
        id UUID PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        scheduled_on DATE NOT NULL,
        target_frequency SMALLINT,
        custom_seeds TEXT[] NOT NULL DEFAULT '{}',
        created_by UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_sources_owner ON sources(owner)",
    "CREATE INDEX IF NOT EXISTS idx_voting_rounds_source ON voting_rounds(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_contracts_source ON contracts(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_emails_contract ON email_negotiations(contract_id)",
];

/// Advisory lock key serializing contract number assignment
pub const CONTRACT_NUMBER_LOCK: i64 = 0x5eed_c0de;

pub const LOCK_CONTRACT_NUMBERS: &str = "SELECT pg_advisory_xact_lock($1)";

pub const MAX_CONTRACT_NUMBER: &str = "SELECT MAX(contract_number) FROM contracts";

// Users

pub const USER_COLUMNS: &str = "id, email, password_hash, name, role, created_at, updated_at";

pub const INSERT_USER: &str = r#"
    INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

pub const UPDATE_USER: &str =
    "UPDATE users SET name = $2, role = $3, updated_at = $4 WHERE id = $1";

// Sources

pub const SOURCE_COLUMNS: &str = "id, owner, created_by, name, publisher, publisher_contact, \
    state, frequency, category, sub_category, comment, suggested_by, web_proposal, aleph_id, \
    issn, created_at, updated_at";

pub const INSERT_SOURCE: &str = r#"
    INSERT INTO sources (id, owner, created_by, name, publisher, publisher_contact, state,
        frequency, category, sub_category, comment, suggested_by, web_proposal, aleph_id,
        issn, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
"#;

pub const UPDATE_SOURCE: &str = r#"
    UPDATE sources SET owner = $2, name = $3, publisher = $4, publisher_contact = $5,
        state = $6, frequency = $7, category = $8, sub_category = $9, comment = $10,
        suggested_by = $11, web_proposal = $12, aleph_id = $13, issn = $14, updated_at = $15
    WHERE id = $1
"#;

pub const UPDATE_SOURCE_STATE: &str =
    "UPDATE sources SET state = $2, updated_at = $3 WHERE id = $1";

// Seeds

pub const SEED_COLUMNS: &str =
    "id, source_id, url, state, redirect, robots, comment, from_time, to_time, created_at";

pub const INSERT_SEED: &str = r#"
    INSERT INTO seeds (id, source_id, url, state, redirect, robots, comment, from_time,
        to_time, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

pub const UPDATE_SEED: &str = r#"
    UPDATE seeds SET url = $2, state = $3, redirect = $4, robots = $5, comment = $6,
        from_time = $7, to_time = $8
    WHERE id = $1
"#;

// Voting

pub const ROUND_COLUMNS: &str = "id, source_id, state, created_at, resolved_at, resolved_by";

pub const INSERT_ROUND: &str = r#"
    INSERT INTO voting_rounds (id, source_id, state, created_at, resolved_at, resolved_by)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const RESOLVE_ROUND: &str = r#"
    UPDATE voting_rounds SET state = $2, resolved_at = $3, resolved_by = $4
    WHERE id = $1
"#;

pub const VOTE_COLUMNS: &str = "id, voting_round_id, author, decision, created_at";

/// Insert a vote or replace the author's decision in that round
pub const UPSERT_VOTE: &str = r#"
    INSERT INTO votes (id, voting_round_id, author, decision, created_at)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (voting_round_id, author) DO UPDATE SET decision = EXCLUDED.decision
    RETURNING id, voting_round_id, author, decision, created_at
"#;

// Contracts

pub const CONTRACT_COLUMNS: &str = "id, source_id, state, contract_type, contract_number, \
    valid_from, valid_to, publisher_responds, in_communication, description, created_at, \
    updated_at";

pub const INSERT_CONTRACT: &str = r#"
    INSERT INTO contracts (id, source_id, state, contract_type, contract_number, valid_from,
        valid_to, publisher_responds, in_communication, description, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

pub const UPDATE_CONTRACT: &str = r#"
    UPDATE contracts SET state = $2, contract_type = $3, contract_number = $4,
        valid_from = $5, valid_to = $6, publisher_responds = $7, in_communication = $8,
        description = $9, updated_at = $10
    WHERE id = $1
"#;

pub const EMAIL_COLUMNS: &str = "id, contract_id, scheduled_date, title, content, created_at";

pub const UPSERT_EMAIL: &str = r#"
    INSERT INTO email_negotiations (id, contract_id, scheduled_date, title, content, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (id) DO UPDATE SET scheduled_date = EXCLUDED.scheduled_date,
        title = EXCLUDED.title, content = EXCLUDED.content
"#;

pub const DELETE_EMAIL: &str = "DELETE FROM email_negotiations WHERE id = $1 AND contract_id = $2";

// Quality assurance

pub const QA_COLUMNS: &str = "id, source_id, checked_by, source_action, comment, created_at";

pub const INSERT_QA: &str = r#"
    INSERT INTO qa_checks (id, source_id, checked_by, source_action, comment, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

pub const UPDATE_QA: &str =
    "UPDATE qa_checks SET source_action = $2, comment = $3 WHERE id = $1";

// Harvests

pub const HARVEST_COLUMNS: &str =
    "id, title, scheduled_on, target_frequency, custom_seeds, created_by, created_at";

pub const INSERT_HARVEST: &str = r#"
    INSERT INTO harvests (id, title, scheduled_on, target_frequency, custom_seeds, created_by, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

/// Included seeds of sources harvested at frequency $1 in one of the states $2
pub const HARVEST_SEEDS: &str = r#"
    SELECT DISTINCT seeds.url
    FROM seeds
    JOIN sources ON sources.id = seeds.source_id
    WHERE seeds.state = 'inc' AND sources.frequency = $1 AND sources.state = ANY($2)
    ORDER BY seeds.url
"#;

// Dashboard cards

/// Contracts in negotiation of sources owned by $1; $2 limits to silent ones
pub const CARD_CONTRACTS: &str = r#"
    SELECT c.id, c.source_id, c.state, c.contract_type, c.contract_number, c.valid_from,
        c.valid_to, c.publisher_responds, c.in_communication, c.description, c.created_at,
        c.updated_at, s.name AS source_name
    FROM contracts c
    JOIN sources s ON s.id = c.source_id
    WHERE c.state = 'NEGOTIATION'
        AND s.owner = $1
        AND (NOT $2 OR (NOT c.in_communication
            AND NOT EXISTS (SELECT 1 FROM email_negotiations e WHERE e.contract_id = c.id)))
    ORDER BY c.created_at, c.id
"#;

/// Open rounds of sources owned by $1
pub const CARD_MANAGED_ROUNDS: &str = r#"
    SELECT r.id, r.source_id, r.state, r.created_at, r.resolved_at, r.resolved_by,
        s.name AS source_name,
        (SELECT COUNT(*) FROM votes v WHERE v.voting_round_id = r.id) AS vote_count
    FROM voting_rounds r
    JOIN sources s ON s.id = r.source_id
    WHERE r.state = 'initial' AND s.owner = $1
    ORDER BY vote_count, r.created_at, r.id
"#;

/// Open rounds of other curators' sources waiting for a vote of $1
pub const CARD_OPEN_ROUNDS: &str = r#"
    SELECT r.id, r.source_id, r.state, r.created_at, r.resolved_at, r.resolved_by,
        s.name AS source_name,
        (SELECT COUNT(*) FROM votes v WHERE v.voting_round_id = r.id) AS vote_count
    FROM voting_rounds r
    JOIN sources s ON s.id = r.source_id
    WHERE r.state = 'initial'
        AND s.owner <> $1
        AND s.state = ANY($2)
        AND NOT EXISTS (
            SELECT 1 FROM votes v WHERE v.voting_round_id = r.id AND v.author = $1)
    ORDER BY vote_count, r.created_at, r.id
"#;

/// Open QA checks of $1
pub const CARD_QA: &str = r#"
    SELECT q.id, q.source_id, q.checked_by, q.source_action, q.comment, q.created_at,
        s.name AS source_name
    FROM qa_checks q
    JOIN sources s ON s.id = q.source_id
    WHERE q.checked_by = $1 AND q.source_action IS NULL
    ORDER BY q.created_at, q.id
"#;
