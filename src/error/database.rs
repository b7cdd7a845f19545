use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("数据库连接失败: {0}")]
    Connection(String),

    #[error("查询执行失败: {0}")]
    Query(#[from] DbErr),

    #[error("唯一约束冲突: {resource_type} {identifier}")]
    UniqueViolation {
        resource_type: String,
        identifier: String,
    },

    #[error("事务错误: {0}")]
    Transaction(String),
}

impl DatabaseError {
    /// 将数据库错误归类，唯一约束冲突单独识别
    pub fn classify(
        err: DbErr,
        resource_type: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::UniqueViolation {
                resource_type: resource_type.into(),
                identifier: identifier.into(),
            },
            _ => Self::Query(err),
        }
    }
}
