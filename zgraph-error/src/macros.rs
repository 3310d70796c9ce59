/// Немедленно возвращает ошибку (аналогично `anyhow::bail!`).
///
/// Макрос возвращает `Err(StackError)` из текущей функции. Поддерживает три
/// формы:
/// - `bail!(err)` — принимает готовый тип ошибки, реализующий `ErrorExt`;
/// - `bail!(code, "msg")` — создаёт `GenericError` с кодом и сообщением;
/// - `bail!(code, "fmt {}", arg)` — форматирует сообщение.
///
/// Пример:
///
/// ```ignore
/// use zgraph_error::{bail, StatusCode};
///
/// fn check_chunk_size(size: usize) -> zgraph_error::ZgraphResult<()> {
///     if size == 0 {
///         bail!(StatusCode::InvalidOptions, "chunk size must be positive");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Проверяет условие и вызывает `bail!`, если условие ложно.
///
/// Формы аналогичны `bail!`:
/// - `ensure!(cond, err)`;
/// - `ensure!(cond, code, "msg")`;
/// - `ensure!(cond, code, "fmt {}", arg)`.
///
/// ```ignore
/// use zgraph_error::{ensure, DecodeError};
///
/// fn check_flag(flag: u8, offset: u64) -> zgraph_error::ZgraphResult<()> {
///     ensure!(flag <= 1, DecodeError::malformed("bad byte-order flag", Some(offset)));
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Добавляет контекст к `Result`.
///
/// `Ok(val)` проходит без изменений, `Err(e)` превращается в `StackError` с
/// указанным контекстом.
#[macro_export]
macro_rules! context {
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context($msg)),
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)*) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context(format!($fmt, $($arg)*))),
        }
    };
}

/// Трейт-расширение для `Result`, добавляющее методы контекстирования.
///
/// Позволяет вызывать `.context(...)` и `.with_context(...)` на результатах,
/// превращая ошибку в [`StackError`](crate::StackError) и приклеивая к ней
/// контекст.
pub trait ResultExt<T> {
    /// Добавляет контекст к ошибке.
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Добавляет ленивый контекст (вычисляется только в случае ошибки).
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
