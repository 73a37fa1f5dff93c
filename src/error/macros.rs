//! # 错误处理宏

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        crate::error::GuardError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::error::GuardError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建数据库错误的宏
#[macro_export]
macro_rules! database_error {
    ($msg:expr) => {
        crate::error::GuardError::database($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::error::GuardError::database(format!($fmt, $($arg)*))
    };
}

/// 快速创建内部错误的宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        crate::error::GuardError::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::error::GuardError::internal(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回配置错误
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err(crate::config_error!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err(crate::config_error!($fmt, $($arg)*));
        }
    };
}
