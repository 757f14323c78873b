use std::{io, path::PathBuf};

use thiserror::Error;

use crate::cluster::ClusterError;

pub type AppResult<T = ()> = Result<T, AppError>;

/// The kinds of errors that can occur during a run.
#[derive(Debug, Error)]
pub enum AppError {
	// Reconciliation errors
	#[error("Service `{service}` has a malformed definition: {detail}")]
	MalformedSpec { service: String, detail: String },

	#[error("{0}")]
	PreconditionFailed(String),

	#[error("Failed to apply the changes to the service `{service}`: {source}")]
	Apply {
		service: String,
		source: ClusterError,
	},

	#[error(transparent)]
	Cluster(#[from] ClusterError),

	// I/O errors
	#[error("Could not read the contents of `{path}`: {source}")]
	ReadError { path: PathBuf, source: io::Error },

	#[error("Failed to canonicalize the path `{path}`: {source}")]
	PathCanonicalization { path: PathBuf, source: io::Error },

	#[error("Could not write to the terminal: {0}")]
	Terminal(#[source] io::Error),

	// Serde errors
	#[error("Error while serializing {target}: {error}")]
	SerializationError { target: String, error: String },

	#[error("Error while deserializing the contents of `{file:?}`: {error}")]
	DeserializationError { file: PathBuf, error: String },

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl AppError {
	pub(crate) fn malformed(service: &str, detail: impl Into<String>) -> Self {
		Self::MalformedSpec {
			service: service.to_string(),
			detail: detail.into(),
		}
	}
}
