// Copyright 2025 OpenObserve Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("IoError# {0}")]
    IoError(#[from] std::io::Error),
    #[error("Message# {0}")]
    Message(String),
    #[error("ErrorCode# {0}")]
    ErrorCode(#[from] ErrorCodes),
    #[error("SerdeJsonError# {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("CorruptedCatalog# {0}")]
    CorruptedCatalog(String),
}

/// The taxonomy surfaced across the service boundary. No stack traces leave
/// the process; callers see one of these codes and a short message.
#[derive(ThisError, Debug)]
pub enum ErrorCodes {
    #[error("no matching data")]
    NoMatchingData,
    #[error("retry later: {0}")]
    RetryLater(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    ServerInternalError(String),
}

impl ErrorCodes {
    pub fn get_code(&self) -> u16 {
        match self {
            ErrorCodes::NoMatchingData => 404,
            ErrorCodes::RetryLater(_) => 503,
            ErrorCodes::BadRequest(_) => 400,
            ErrorCodes::ServerInternalError(_) => 500,
        }
    }

    pub fn get_message(&self) -> String {
        self.to_string()
    }
}

impl Error {
    pub fn is_no_matching_data(&self) -> bool {
        matches!(self, Error::ErrorCode(ErrorCodes::NoMatchingData))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ErrorCode(ErrorCodes::RetryLater(_)))
    }
}
