use std::future::Future;

use shared::types::{CharacterEdit, CharacterSheet, CharacterView, ChangeEvent, NewCharacter};
use tracing::{info, warn};

use super::error::CommandError;
use super::validation::is_valid_image_url;
use crate::AppState;
use crate::database::characters::{self as store, CharacterRecord};
use crate::database::is_unique_violation;

/// Create a record and announce it to viewers.
pub async fn create_character(
    state: &AppState,
    new: NewCharacter,
) -> Result<CharacterView, CommandError> {
    run_detached(create(state.clone(), new)).await
}

/// Apply the supplied, non-empty fields of `changes` to the record `name`.
///
/// `password` must be the record's own or the admin password. Returns the
/// record as it stands after the edit.
pub async fn edit_character(
    state: &AppState,
    name: &str,
    password: &str,
    changes: CharacterEdit,
) -> Result<CharacterView, CommandError> {
    run_detached(edit(
        state.clone(),
        name.to_string(),
        password.to_string(),
        changes,
    ))
    .await
}

/// Remove the record `name`. Same credential rule as [`edit_character`].
pub async fn delete_character(
    state: &AppState,
    name: &str,
    password: &str,
) -> Result<(), CommandError> {
    run_detached(delete(state.clone(), name.to_string(), password.to_string())).await
}

/// Run a mutation on its own task, so its write and the notification that
/// follows complete even when the caller is dropped.
async fn run_detached<T>(
    mutation: impl Future<Output = Result<T, CommandError>> + Send + 'static,
) -> Result<T, CommandError>
where
    T: Send + 'static,
{
    tokio::spawn(mutation).await?
}

async fn create(state: AppState, new: NewCharacter) -> Result<CharacterView, CommandError> {
    if !is_valid_image_url(&new.image) {
        return Err(CommandError::InvalidImageUrl);
    }

    let record = CharacterRecord::from(&new);
    store::insert_character(&state.db, &record)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CommandError::DuplicateName(record.name.clone())
            } else {
                CommandError::Database(e)
            }
        })?;

    info!("Character '{}' created", record.name);

    let view = record.view();
    state.broadcaster.notify(ChangeEvent::Create(view.clone()));
    Ok(view)
}

async fn edit(
    state: AppState,
    name: String,
    password: String,
    changes: CharacterEdit,
) -> Result<CharacterView, CommandError> {
    let mut tx = state.db.begin().await?;

    let mut record = store::get_character(&mut *tx, &name)
        .await?
        .ok_or(CommandError::InvalidCredentials)?;
    authorize(&state, &record, &password)?;

    if let Some(image) = CharacterEdit::text(&changes.image) {
        if !is_valid_image_url(image) {
            return Err(CommandError::InvalidImageUrl);
        }
    }
    if changes.is_empty() {
        return Err(CommandError::NothingToChange);
    }

    apply_changes(&mut record, &changes);

    let updated = store::update_character(&mut *tx, &name, &record)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CommandError::DuplicateName(record.name.clone())
            } else {
                CommandError::Database(e)
            }
        })?;
    if !updated {
        return Err(CommandError::NotFound);
    }
    tx.commit().await?;

    info!("Character '{}' updated to '{}'", name, record.name);

    let view = record.view();
    state.broadcaster.notify(ChangeEvent::Edit {
        name,
        new_name: record.name,
    });
    Ok(view)
}

async fn delete(state: AppState, name: String, password: String) -> Result<(), CommandError> {
    let mut tx = state.db.begin().await?;

    let record = store::get_character(&mut *tx, &name)
        .await?
        .ok_or(CommandError::InvalidCredentials)?;
    authorize(&state, &record, &password)?;

    if !store::delete_character(&mut *tx, &name).await? {
        return Err(CommandError::NotFound);
    }
    tx.commit().await?;

    info!("Character '{}' deleted", name);

    state.broadcaster.notify(ChangeEvent::Delete { name });
    Ok(())
}

pub async fn show_character(state: &AppState, name: &str) -> Result<CharacterSheet, CommandError> {
    let record = store::get_character(&state.db, name)
        .await?
        .ok_or(CommandError::NotFound)?;
    Ok(CharacterSheet::for_character(&record.view()))
}

pub async fn list_characters(state: &AppState) -> Result<Vec<CharacterView>, CommandError> {
    let records = store::list_characters(&state.db).await?;
    Ok(records.iter().map(CharacterRecord::view).collect())
}

/// Public page that lists every character.
pub fn directory_link(state: &AppState) -> &str {
    &state.config.directory.site_url
}

fn authorize(
    state: &AppState,
    record: &CharacterRecord,
    password: &str,
) -> Result<(), CommandError> {
    if record.password == password || state.config.directory.is_admin_password(password) {
        return Ok(());
    }
    warn!("Rejected credentials for character '{}'", record.name);
    Err(CommandError::InvalidCredentials)
}

fn apply_changes(record: &mut CharacterRecord, changes: &CharacterEdit) {
    if let Some(name) = CharacterEdit::text(&changes.new_name) {
        record.name = name.to_string();
    }
    if let Some(faceclaim) = CharacterEdit::text(&changes.faceclaim) {
        record.faceclaim = faceclaim.to_string();
    }
    if let Some(image) = CharacterEdit::text(&changes.image) {
        record.image = image.to_string();
    }
    if let Some(bio) = CharacterEdit::text(&changes.bio) {
        record.bio = bio.to_string();
    }
    record.gender = changes.gender.or(record.gender);
    record.sexuality = changes.sexuality.or(record.sexuality);
    record.house = changes.house.or(record.house);
    record.year = changes.year.or(record.year);
}
