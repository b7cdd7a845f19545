//! # 错误处理宏

/// 立即返回错误
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err(::std::convert::Into::into($err))
    };
}

/// 确保条件成立，否则返回给定错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
}
