use std::str::FromStr;

use shared::types::{CharacterView, Gender, House, NewCharacter, Sexuality, Year};
use sqlx::any::AnyRow;
use sqlx::{Any, Executor, Row};

/// A stored character, password included. Never serialize this outward;
/// use [`CharacterRecord::view`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRecord {
    pub name: String,
    pub faceclaim: String,
    pub image: String,
    pub bio: String,
    pub password: String,
    pub gender: Option<Gender>,
    pub sexuality: Option<Sexuality>,
    pub house: Option<House>,
    pub year: Option<Year>,
}

impl CharacterRecord {
    pub fn view(&self) -> CharacterView {
        CharacterView {
            name: self.name.clone(),
            faceclaim: self.faceclaim.clone(),
            image: self.image.clone(),
            bio: self.bio.clone(),
            gender: self.gender,
            sexuality: self.sexuality,
            house: self.house,
            year: self.year,
        }
    }

    fn from_row(row: &AnyRow) -> sqlx::Result<Self> {
        Ok(Self {
            name: row.try_get("name")?,
            faceclaim: row.try_get("faceclaim")?,
            image: row.try_get("image")?,
            bio: row.try_get("bio")?,
            password: row.try_get("password")?,
            gender: choice(row, "gender")?,
            sexuality: choice(row, "sexuality")?,
            house: choice(row, "house")?,
            year: choice(row, "year")?,
        })
    }
}

impl From<&NewCharacter> for CharacterRecord {
    fn from(c: &NewCharacter) -> Self {
        Self {
            name: c.name.clone(),
            faceclaim: c.faceclaim.clone(),
            image: c.image.clone(),
            bio: c.bio.clone(),
            password: c.password.clone(),
            gender: Some(c.gender),
            sexuality: Some(c.sexuality),
            house: Some(c.house),
            year: Some(c.year),
        }
    }
}

/// Decode a nullable label column into its enumeration.
fn choice<T>(row: &AnyRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    row.try_get::<Option<String>, _>(column)?
        .map(|label| label.parse::<T>())
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

const SELECT_COLUMNS: &str =
    "SELECT name, faceclaim, image, bio, password, gender, sexuality, house, year FROM characters";

/// Insert a new character. A taken name surfaces as a unique violation.
pub async fn insert_character<'e, E>(executor: E, record: &CharacterRecord) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Any>,
{
    sqlx::query(
        "INSERT INTO characters (name, faceclaim, image, bio, password, gender, sexuality, house, year)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(record.name.as_str())
    .bind(record.faceclaim.as_str())
    .bind(record.image.as_str())
    .bind(record.bio.as_str())
    .bind(record.password.as_str())
    .bind(record.gender.map(|g| g.as_str()))
    .bind(record.sexuality.map(|s| s.as_str()))
    .bind(record.house.map(|h| h.as_str()))
    .bind(record.year.map(|y| y.as_str()))
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_character<'e, E>(executor: E, name: &str) -> sqlx::Result<Option<CharacterRecord>>
where
    E: Executor<'e, Database = Any>,
{
    let row = sqlx::query(&format!("{} WHERE name = $1", SELECT_COLUMNS))
        .bind(name)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(CharacterRecord::from_row).transpose()
}

pub async fn list_characters<'e, E>(executor: E) -> sqlx::Result<Vec<CharacterRecord>>
where
    E: Executor<'e, Database = Any>,
{
    let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_COLUMNS))
        .fetch_all(executor)
        .await?;

    rows.iter().map(CharacterRecord::from_row).collect()
}

/// Names starting with `prefix`, case-insensitively, at most `limit` of them.
pub async fn names_with_prefix<'e, E>(
    executor: E,
    prefix: &str,
    limit: i64,
) -> sqlx::Result<Vec<String>>
where
    E: Executor<'e, Database = Any>,
{
    let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));

    let rows = sqlx::query(
        "SELECT name FROM characters
         WHERE LOWER(name) LIKE $1 ESCAPE '\\'
         ORDER BY name
         LIMIT $2",
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(executor)
    .await?;

    rows.iter().map(|row| row.try_get("name")).collect()
}

/// Overwrite the row currently named `old_name` with `record`, which may
/// carry a new name. Returns false when no such row exists.
pub async fn update_character<'e, E>(
    executor: E,
    old_name: &str,
    record: &CharacterRecord,
) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Any>,
{
    let result = sqlx::query(
        "UPDATE characters
         SET name = $1, faceclaim = $2, image = $3, bio = $4,
             gender = $5, sexuality = $6, house = $7, year = $8
         WHERE name = $9",
    )
    .bind(record.name.as_str())
    .bind(record.faceclaim.as_str())
    .bind(record.image.as_str())
    .bind(record.bio.as_str())
    .bind(record.gender.map(|g| g.as_str()))
    .bind(record.sexuality.map(|s| s.as_str()))
    .bind(record.house.map(|h| h.as_str()))
    .bind(record.year.map(|y| y.as_str()))
    .bind(old_name)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns false when no such row exists.
pub async fn delete_character<'e, E>(executor: E, name: &str) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Any>,
{
    let result = sqlx::query("DELETE FROM characters WHERE name = $1")
        .bind(name)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{connect, create::create_tables, is_unique_violation};
    use sqlx::AnyPool;

    async fn pool() -> AnyPool {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        create_tables(&pool).await.unwrap();
        pool
    }

    fn record(name: &str) -> CharacterRecord {
        CharacterRecord {
            name: name.to_string(),
            faceclaim: "Zendaya".to_string(),
            image: "https://img.example/iris.png".to_string(),
            bio: "Quiet, sharp.".to_string(),
            password: "pw".to_string(),
            gender: Some(Gender::Female),
            sexuality: Some(Sexuality::Bisexual),
            house: Some(House::Athena),
            year: Some(Year::Second),
        }
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("iris"), "iris");
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_choices() {
        let pool = pool().await;
        insert_character(&pool, &record("Iris")).await.unwrap();

        let found = get_character(&pool, "Iris").await.unwrap().unwrap();
        assert_eq!(found, record("Iris"));
        assert!(get_character(&pool, "Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_name_is_a_unique_violation() {
        let pool = pool().await;
        insert_character(&pool, &record("Iris")).await.unwrap();

        let err = insert_character(&pool, &record("Iris")).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn null_choices_decode_as_none() {
        let pool = pool().await;
        sqlx::query(
            "INSERT INTO characters (name, faceclaim, image, bio, password)
             VALUES ('Old', 'F', 'https://x/y.png', 'b', 'pw')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let found = get_character(&pool, "Old").await.unwrap().unwrap();
        assert!(found.gender.is_none());
        assert!(found.view().year.is_none());
    }

    #[tokio::test]
    async fn list_is_ordered_by_name() {
        let pool = pool().await;
        for name in ["Zed", "Amy", "Iris"] {
            insert_character(&pool, &record(name)).await.unwrap();
        }

        let names: Vec<String> = list_characters(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Amy", "Iris", "Zed"]);
    }

    #[tokio::test]
    async fn prefix_search_is_case_insensitive_and_limited() {
        let pool = pool().await;
        for name in ["Iris", "ivy", "Ida", "Ines", "Ila", "Imogen", "Zed"] {
            insert_character(&pool, &record(name)).await.unwrap();
        }

        let names = names_with_prefix(&pool, "I", 5).await.unwrap();
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n.to_lowercase().starts_with('i')));

        assert_eq!(names_with_prefix(&pool, "ZE", 5).await.unwrap(), vec!["Zed"]);
        assert!(names_with_prefix(&pool, "%", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_can_rename() {
        let pool = pool().await;
        insert_character(&pool, &record("Iris")).await.unwrap();

        let mut renamed = record("Iris Vale");
        renamed.house = Some(House::Nyx);
        assert!(update_character(&pool, "Iris", &renamed).await.unwrap());

        assert!(get_character(&pool, "Iris").await.unwrap().is_none());
        let found = get_character(&pool, "Iris Vale").await.unwrap().unwrap();
        assert_eq!(found.house, Some(House::Nyx));
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let pool = pool().await;
        assert!(!update_character(&pool, "Nobody", &record("Nobody")).await.unwrap());
        assert!(!delete_character(&pool, "Nobody").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let pool = pool().await;
        insert_character(&pool, &record("Iris")).await.unwrap();

        assert!(delete_character(&pool, "Iris").await.unwrap());
        assert!(list_characters(&pool).await.unwrap().is_empty());
    }
}
