macro_rules! precondition {
	($($arg:tt)*) => {
		$crate::AppError::PreconditionFailed(format!($($arg)*))
	};
}

macro_rules! bail_precondition {
	($($arg:tt)*) => {
		return Err(precondition!($($arg)*))
	};
}
