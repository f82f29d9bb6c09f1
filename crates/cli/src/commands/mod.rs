pub(crate) mod check_db;
pub(crate) mod serve;
