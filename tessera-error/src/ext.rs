use crate::TesseraResult;

/// Extension trait for TesseraResult
pub trait ResultExt<T>: private::Sealed {
    /// Flatten a nested [`TesseraResult`]. Helper function until <https://github.com/rust-lang/rust/issues/70142> is stabilized.
    fn flatten(self) -> TesseraResult<T>;
}

mod private {
    use crate::TesseraResult;

    pub trait Sealed {}

    impl<T> Sealed for TesseraResult<TesseraResult<T>> {}
}

impl<T> ResultExt<T> for TesseraResult<TesseraResult<T>> {
    fn flatten(self) -> TesseraResult<T> {
        match self {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) | Err(e) => Err(e),
        }
    }
}
