//! Storage adapters: one sea-orm entity per table plus the conversions between
//! rows and the plain domain records.
//!
//! The `Column` enums are public so callers can build [`FindOptions`]
//! criteria for the generic repository calls.
//!
//! [`FindOptions`]: crate::FindOptions

use sea_orm::DbErr;
use serde_json::Value as JsonValue;
use serde::{Serialize, de::DeserializeOwned};

use crate::{RepositoryError, ResultRepo};

pub mod accounts;
pub mod categories;
pub mod transactions;
pub mod users;

pub(crate) fn encode_json<T: Serialize>(value: &T, field: &str) -> ResultRepo<JsonValue> {
    serde_json::to_value(value)
        .map_err(|err| RepositoryError::Validation(format!("cannot encode {field}: {err}")))
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    value: JsonValue,
    entity: &str,
    field: &str,
) -> ResultRepo<T> {
    serde_json::from_value(value).map_err(|err| {
        RepositoryError::storage(format!("decode {entity}.{field}"), DbErr::Json(err.to_string()))
    })
}

/// Reads a stored enum label back into its domain type.
pub(crate) fn decode_label<T>(value: &str, entity: &str, field: &str) -> ResultRepo<T>
where
    T: for<'a> TryFrom<&'a str, Error = RepositoryError>,
{
    T::try_from(value).map_err(|err| {
        RepositoryError::storage(
            format!("decode {entity}.{field}"),
            DbErr::Type(err.to_string()),
        )
    })
}
