// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Error types for drum filters.

use fillin_core::ScoreError;
use std::fmt;

/// Everything that can go wrong inside a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// A setter or settings file asked for something impossible: a
    /// non-positive bar count or tempo, or a phrase name nobody knows.
    InvalidConfiguration(String),
    /// The score for a matched event couldn't be built.
    ScoreConstruction(ScoreError),
    /// A phrase or the output failed while a detached job was playing. This
    /// never reaches the caller of a dispatch.
    Playback(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::InvalidConfiguration(msg) => {
                write!(f, "invalid configuration - {}", msg)
            }
            FilterError::ScoreConstruction(err) => {
                write!(f, "score construction failed - {}", err)
            }
            FilterError::Playback(msg) => write!(f, "playback failed - {}", msg),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FilterError::ScoreConstruction(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScoreError> for FilterError {
    fn from(err: ScoreError) -> Self {
        FilterError::ScoreConstruction(err)
    }
}

/// Result alias for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
