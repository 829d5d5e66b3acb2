use sqlx::PgPool;

/// Runs database query units (see `entities`) against a connection pool.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
