use sqlx::PgPool;

#[derive(Clone)]
pub struct SqlxImageRepo {
    pub pool: PgPool,
}

#[derive(Clone)]
pub struct SqlxDocumentRepo {
    pub pool: PgPool,
}
