use std::str::FromStr;

use shared::types::{Gender, House, Sexuality, Year};

use super::error::CommandError;
use crate::AppState;
use crate::database::characters::names_with_prefix;

/// Most name suggestions offered for one prefix.
pub const MAX_NAME_SUGGESTIONS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutocompleteField {
    Name,
    Gender,
    Sexuality,
    House,
    Year,
}

impl FromStr for AutocompleteField {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "gender" => Ok(Self::Gender),
            "sexuality" => Ok(Self::Sexuality),
            "house" => Ok(Self::House),
            "year" => Ok(Self::Year),
            other => Err(CommandError::UnknownField(other.to_string())),
        }
    }
}

/// Suggestions for `field` starting with `prefix`, case-insensitively.
pub async fn autocomplete(
    state: &AppState,
    field: AutocompleteField,
    prefix: &str,
) -> Result<Vec<String>, CommandError> {
    let labels = match field {
        AutocompleteField::Name => {
            return Ok(names_with_prefix(&state.db, prefix, MAX_NAME_SUGGESTIONS).await?);
        }
        AutocompleteField::Gender => Gender::choices(prefix),
        AutocompleteField::Sexuality => Sexuality::choices(prefix),
        AutocompleteField::House => House::choices(prefix),
        AutocompleteField::Year => Year::choices(prefix),
    };
    Ok(labels.into_iter().map(str::to_string).collect())
}
