//! SQL schema for the academy SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS curricula (
    curriculum_id TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS levels (
    level_id       TEXT PRIMARY KEY,
    curriculum_id  TEXT NOT NULL REFERENCES curricula(curriculum_id),
    name           TEXT NOT NULL,
    sequence_order INTEGER NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS modules (
    module_id      TEXT PRIMARY KEY,
    level_id       TEXT NOT NULL REFERENCES levels(level_id),
    name           TEXT NOT NULL,
    sequence_order INTEGER NOT NULL,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lessons (
    lesson_id      TEXT PRIMARY KEY,
    module_id      TEXT NOT NULL REFERENCES modules(module_id),
    name           TEXT NOT NULL,
    sequence_order INTEGER NOT NULL,
    max_stars      INTEGER NOT NULL DEFAULT 3 CHECK (max_stars BETWEEN 1 AND 3),
    created_at     TEXT NOT NULL
);

-- Settings rows are never deleted; at most one is active per curriculum.
CREATE TABLE IF NOT EXISTS progression_settings (
    settings_id                         TEXT PRIMARY KEY,
    curriculum_id                       TEXT NOT NULL REFERENCES curricula(curriculum_id),
    module_unlock_threshold_percentage  REAL NOT NULL DEFAULT 70.0,
    require_minimum_one_star_per_lesson INTEGER NOT NULL DEFAULT 0,
    allow_cross_level_progression       INTEGER NOT NULL DEFAULT 1,
    allow_lesson_retakes                INTEGER NOT NULL DEFAULT 1,
    passing_score_percentage            REAL NOT NULL,
    track_time_spent                    INTEGER NOT NULL DEFAULT 1,
    track_star_distribution             INTEGER NOT NULL DEFAULT 1,
    status                              TEXT NOT NULL DEFAULT 'active', -- 'active' | 'inactive'
    created_at                          TEXT NOT NULL,
    updated_at                          TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS settings_active_idx
    ON progression_settings(curriculum_id) WHERE status = 'active';

CREATE TABLE IF NOT EXISTS assessment_criteria (
    criterion_id      TEXT PRIMARY KEY,
    level_id          TEXT NOT NULL REFERENCES levels(level_id),
    name              TEXT NOT NULL,
    description       TEXT,
    sequence_order    INTEGER NOT NULL,
    weight            REAL NOT NULL DEFAULT 1.0,
    max_score         INTEGER NOT NULL DEFAULT 3,
    min_passing_score INTEGER NOT NULL DEFAULT 1,
    score_descriptors TEXT NOT NULL DEFAULT '{}', -- JSON object: score -> text
    created_at        TEXT NOT NULL,
    CHECK (min_passing_score <= max_score)
);

-- Rows are updated in place across attempts but never deleted.
CREATE TABLE IF NOT EXISTS lesson_progress (
    progress_id              TEXT PRIMARY KEY,
    student_id               TEXT NOT NULL,
    lesson_id                TEXT NOT NULL REFERENCES lessons(lesson_id),
    stars_earned             INTEGER CHECK (stars_earned BETWEEN 0 AND 3),
    is_completed             INTEGER NOT NULL DEFAULT 0,
    attempt_count            INTEGER NOT NULL DEFAULT 0,
    total_time_spent_minutes INTEGER NOT NULL DEFAULT 0,
    graded_by_instructor_id  TEXT,
    graded_date              TEXT,
    version                  INTEGER NOT NULL,
    created_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL,
    UNIQUE (student_id, lesson_id)
);

CREATE TABLE IF NOT EXISTS module_unlocks (
    unlock_id            TEXT PRIMARY KEY,
    student_id           TEXT NOT NULL,
    module_id            TEXT NOT NULL REFERENCES modules(module_id),
    is_unlocked          INTEGER NOT NULL,
    unlocked_date        TEXT,
    stars_earned         INTEGER NOT NULL,
    total_possible_stars INTEGER NOT NULL,
    unlock_percentage    REAL NOT NULL,
    threshold_met        INTEGER NOT NULL,
    evaluated_at         TEXT NOT NULL,
    UNIQUE (student_id, module_id)
);

CREATE TABLE IF NOT EXISTS level_assessments (
    assessment_id           TEXT PRIMARY KEY,
    student_id              TEXT NOT NULL,
    level_id                TEXT NOT NULL REFERENCES levels(level_id),
    instructor_id           TEXT,
    status                  TEXT NOT NULL, -- pending | completed | suspended | passed | failed
    criteria_scores         TEXT NOT NULL DEFAULT '{}', -- JSON object: criterion id -> score
    overall_score           REAL,
    passed                  INTEGER NOT NULL DEFAULT 0,
    can_continue_next_level INTEGER NOT NULL DEFAULT 0,
    progression_suspended   INTEGER NOT NULL DEFAULT 0,
    suspension_reason       TEXT,
    suspended_from          TEXT,
    assessed_at             TEXT,
    version                 INTEGER NOT NULL,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
);

-- One open cycle per student and level.
CREATE UNIQUE INDEX IF NOT EXISTS assessments_open_idx
    ON level_assessments(student_id, level_id) WHERE status NOT IN ('passed', 'failed');

-- Strictly append-only.
CREATE TABLE IF NOT EXISTS progression_analytics (
    analytics_id TEXT PRIMARY KEY,
    entity_type  TEXT NOT NULL, -- student | instructor | curriculum
    entity_id    TEXT NOT NULL,
    period_type  TEXT NOT NULL, -- daily | weekly | monthly | custom
    period_start TEXT NOT NULL,
    period_end   TEXT NOT NULL,
    metrics_json TEXT NOT NULL,
    generated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS levels_curriculum_idx  ON levels(curriculum_id);
CREATE INDEX IF NOT EXISTS modules_level_idx      ON modules(level_id);
CREATE INDEX IF NOT EXISTS lessons_module_idx     ON lessons(module_id);
CREATE INDEX IF NOT EXISTS criteria_level_idx     ON assessment_criteria(level_id);
CREATE INDEX IF NOT EXISTS progress_grader_idx    ON lesson_progress(graded_by_instructor_id);
CREATE INDEX IF NOT EXISTS assessments_level_idx  ON level_assessments(level_id);
CREATE INDEX IF NOT EXISTS analytics_key_idx
    ON progression_analytics(entity_type, entity_id, period_type, period_start);

PRAGMA user_version = 1;
";
