//! Table definitions, one block per schema version.

/// Version 1: every entity table.
pub(crate) const V1_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                TEXT PRIMARY KEY,
    email             TEXT UNIQUE,
    phone             TEXT UNIQUE,
    display_name      TEXT NOT NULL,
    credential_digest TEXT NOT NULL,
    status            TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chamas (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    status     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships (
    group_id   TEXT NOT NULL REFERENCES chamas(id),
    user_id    TEXT NOT NULL REFERENCES users(id),
    role       TEXT NOT NULL,
    active     INTEGER NOT NULL,
    joined_at  TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (group_id, user_id)
);

CREATE TABLE IF NOT EXISTS role_changes (
    id         TEXT PRIMARY KEY,
    group_id   TEXT NOT NULL REFERENCES chamas(id),
    user_id    TEXT NOT NULL REFERENCES users(id),
    old_role   TEXT NOT NULL,
    new_role   TEXT NOT NULL,
    changed_by TEXT NOT NULL,
    reason     TEXT NOT NULL,
    at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallets (
    id         TEXT PRIMARY KEY,
    owner_kind TEXT NOT NULL,
    owner_id   TEXT NOT NULL,
    balance    INTEGER NOT NULL CHECK (balance >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (owner_kind, owner_id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    amount      INTEGER NOT NULL CHECK (amount >= 0),
    currency    TEXT NOT NULL,
    group_id    TEXT,
    initiator   TEXT NOT NULL,
    recipient   TEXT,
    from_wallet TEXT REFERENCES wallets(id),
    to_wallet   TEXT REFERENCES wallets(id),
    status      TEXT NOT NULL,
    metadata    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS polls (
    id                   TEXT PRIMARY KEY,
    group_id             TEXT NOT NULL REFERENCES chamas(id),
    title                TEXT NOT NULL,
    description          TEXT NOT NULL,
    kind                 TEXT NOT NULL,
    creator              TEXT NOT NULL,
    start_at             TEXT NOT NULL,
    end_at               TEXT NOT NULL,
    status               TEXT NOT NULL,
    anonymous            INTEGER NOT NULL,
    requires_majority    INTEGER NOT NULL,
    threshold_bps        INTEGER NOT NULL CHECK (threshold_bps BETWEEN 1 AND 10000),
    eligible_voter_count INTEGER NOT NULL,
    votes_cast_count     INTEGER NOT NULL,
    result               TEXT NOT NULL,
    winning_option       INTEGER,
    result_declared_at   TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS poll_options (
    poll_id    TEXT NOT NULL REFERENCES polls(id),
    ordinal    INTEGER NOT NULL,
    text       TEXT NOT NULL,
    vote_count INTEGER NOT NULL,
    PRIMARY KEY (poll_id, ordinal)
);

CREATE TABLE IF NOT EXISTS votes (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    poll_id        TEXT NOT NULL,
    option_ordinal INTEGER NOT NULL,
    voter_hash     BLOB NOT NULL,
    cast_at        TEXT NOT NULL,
    valid          INTEGER NOT NULL,
    FOREIGN KEY (poll_id, option_ordinal) REFERENCES poll_options(poll_id, ordinal)
);

CREATE TABLE IF NOT EXISTS role_escalations (
    id             TEXT PRIMARY KEY,
    group_id       TEXT NOT NULL REFERENCES chamas(id),
    candidate      TEXT NOT NULL,
    current_role   TEXT NOT NULL,
    requested_role TEXT NOT NULL,
    requester      TEXT NOT NULL,
    poll_id        TEXT NOT NULL UNIQUE REFERENCES polls(id),
    justification  TEXT NOT NULL,
    status         TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS share_offerings (
    id               TEXT PRIMARY KEY,
    group_id         TEXT NOT NULL REFERENCES chamas(id),
    name             TEXT NOT NULL,
    kind             TEXT NOT NULL,
    total_shares     INTEGER NOT NULL CHECK (total_shares >= 0),
    original_shares  INTEGER NOT NULL,
    price_per_share  INTEGER NOT NULL,
    minimum_purchase INTEGER NOT NULL,
    status           TEXT NOT NULL,
    created_by       TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    CHECK (total_shares <= original_shares)
);

CREATE TABLE IF NOT EXISTS share_holdings (
    id                 TEXT PRIMARY KEY,
    group_id           TEXT NOT NULL REFERENCES chamas(id),
    member_id          TEXT NOT NULL,
    offering_id        TEXT REFERENCES share_offerings(id),
    offering_name      TEXT NOT NULL,
    kind               TEXT NOT NULL,
    shares_owned       INTEGER NOT NULL CHECK (shares_owned >= 0),
    share_value        INTEGER NOT NULL,
    total_value        INTEGER NOT NULL,
    certificate_number TEXT NOT NULL,
    purchase_date      TEXT NOT NULL,
    status             TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    CHECK (total_value = shares_owned * share_value)
);

CREATE TABLE IF NOT EXISTS share_transactions (
    id           TEXT PRIMARY KEY,
    group_id     TEXT NOT NULL REFERENCES chamas(id),
    from_member  TEXT,
    to_member    TEXT,
    holding_id   TEXT,
    kind         TEXT NOT NULL,
    shares_count INTEGER NOT NULL,
    unit_value   INTEGER NOT NULL,
    total_amount INTEGER NOT NULL,
    date         TEXT NOT NULL,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dividend_declarations (
    id               TEXT PRIMARY KEY,
    group_id         TEXT NOT NULL REFERENCES chamas(id),
    declaration_date TEXT NOT NULL,
    per_share_amount INTEGER NOT NULL,
    total_amount     INTEGER NOT NULL,
    status           TEXT NOT NULL,
    declared_by      TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meetings (
    id                   TEXT PRIMARY KEY,
    group_id             TEXT NOT NULL REFERENCES chamas(id),
    title                TEXT NOT NULL,
    description          TEXT NOT NULL,
    scheduled_at         TEXT NOT NULL,
    duration_minutes     INTEGER NOT NULL,
    kind                 TEXT NOT NULL,
    location             TEXT,
    conference_room_id   TEXT,
    conference_room_name TEXT,
    status               TEXT NOT NULL,
    started_at           TEXT,
    ended_at             TEXT,
    recording_enabled    INTEGER NOT NULL,
    created_by           TEXT NOT NULL,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    meeting_id       TEXT NOT NULL REFERENCES meetings(id),
    user_id          TEXT NOT NULL,
    kind             TEXT NOT NULL,
    joined_at        TEXT,
    left_at          TEXT,
    duration_minutes INTEGER NOT NULL,
    present          INTEGER NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    PRIMARY KEY (meeting_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships (user_id);
CREATE INDEX IF NOT EXISTS idx_transactions_from ON transactions (from_wallet);
CREATE INDEX IF NOT EXISTS idx_transactions_to ON transactions (to_wallet);
CREATE INDEX IF NOT EXISTS idx_transactions_group ON transactions (group_id);
CREATE INDEX IF NOT EXISTS idx_polls_group ON polls (group_id, status);
CREATE INDEX IF NOT EXISTS idx_polls_due ON polls (status, end_at);
CREATE INDEX IF NOT EXISTS idx_holdings_member ON share_holdings (group_id, member_id);
CREATE INDEX IF NOT EXISTS idx_meetings_due ON meetings (status, scheduled_at);
"#;

/// Version 2: invariants enforced by the database itself.
pub(crate) const V2_CONSTRAINTS: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS uniq_valid_ballot
    ON votes (poll_id, voter_hash) WHERE valid = 1;

CREATE UNIQUE INDEX IF NOT EXISTS uniq_singleton_role
    ON memberships (group_id, role)
    WHERE active = 1 AND role IN ('chairperson', 'secretary', 'treasurer');

CREATE TRIGGER IF NOT EXISTS transactions_no_update
    BEFORE UPDATE ON transactions
    BEGIN SELECT RAISE(ABORT, 'transactions are append-only'); END;

CREATE TRIGGER IF NOT EXISTS transactions_no_delete
    BEFORE DELETE ON transactions
    BEGIN SELECT RAISE(ABORT, 'transactions are append-only'); END;
"#;
