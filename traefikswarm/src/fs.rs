use std::{
	ffi::OsStr,
	fs::File,
	path::{Path, PathBuf, absolute},
};

use serde::de::DeserializeOwned;

use crate::*;

pub(crate) fn get_extension(file: &Path) -> AppResult<&OsStr> {
	file.extension()
		.ok_or_else(|| AppError::DeserializationError {
			file: file.to_path_buf(),
			error: "the file has no extension".to_string(),
		})
}

/// Makes `path` absolute against the current directory, without requiring it to exist.
pub(crate) fn get_abs_path(path: &Path) -> AppResult<PathBuf> {
	absolute(path).map_err(|e| AppError::PathCanonicalization {
		path: path.to_path_buf(),
		source: e,
	})
}

pub(crate) fn read_file(path: &Path) -> AppResult<File> {
	File::open(path).map_err(|e| AppError::ReadError {
		path: path.to_path_buf(),
		source: e,
	})
}

pub(crate) fn deserialize_toml<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
	let contents = std::fs::read_to_string(path).map_err(|e| AppError::ReadError {
		path: path.to_path_buf(),
		source: e,
	})?;

	toml::from_str(&contents).map_err(|e| AppError::DeserializationError {
		file: path.to_path_buf(),
		error: e.to_string(),
	})
}

pub(crate) fn deserialize_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
	let file = read_file(path)?;

	serde_json::from_reader(file).map_err(|e| AppError::DeserializationError {
		file: path.to_path_buf(),
		error: e.to_string(),
	})
}

pub(crate) fn deserialize_yaml<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
	let file = read_file(path)?;

	serde_yaml_ng::from_reader(file).map_err(|e| AppError::DeserializationError {
		file: path.to_path_buf(),
		error: e.to_string(),
	})
}
