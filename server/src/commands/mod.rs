//! Character commands, independent of the transport that invokes them.
//!
//! Every mutation notifies the broadcaster only after its write committed;
//! a rejected or failed command emits nothing.

mod autocomplete;
mod characters;
mod error;
mod validation;

pub use autocomplete::{AutocompleteField, MAX_NAME_SUGGESTIONS, autocomplete};
pub use characters::{
    create_character, delete_character, directory_link, edit_character, list_characters,
    show_character,
};
pub use error::CommandError;
pub use validation::{MAX_IMAGE_URL_LEN, is_valid_image_url};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use crate::broadcast::{SessionError, ViewerSink};
    use crate::database::{connect, create::create_tables};
    use async_trait::async_trait;
    use shared::types::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    struct ChannelSink(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl ViewerSink for ChannelSink {
        async fn send_text(&self, text: &str) -> Result<(), SessionError> {
            self.0.send(text.to_string()).map_err(|_| SessionError::Closed)
        }

        async fn close(&self) {}
    }

    async fn state() -> (AppState, mpsc::UnboundedReceiver<String>) {
        let db = connect("sqlite::memory:", 1).await.unwrap();
        create_tables(&db).await.unwrap();

        let mut config = AppConfig::default();
        config.directory.admin_password = Some("letmein".to_string());
        config.directory.site_url = "https://roster.example/".to_string();
        config.broadcast.send_timeout_ms = 300;
        let state = AppState::new(config, db);

        let (tx, rx) = mpsc::unbounded_channel();
        state.broadcaster.register(Arc::new(ChannelSink(tx))).await;
        (state, rx)
    }

    async fn events(
        state: &AppState,
        rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Vec<ChangeEvent> {
        state.broadcaster.flush().await;
        let mut events = Vec::new();
        while let Ok(text) = rx.try_recv() {
            events.push(serde_json::from_str(&text).unwrap());
        }
        events
    }

    fn iris() -> NewCharacter {
        NewCharacter {
            name: "Iris".to_string(),
            faceclaim: "Zendaya".to_string(),
            image: "https://img.example/iris.png".to_string(),
            bio: "Quiet, sharp.".to_string(),
            password: "pw".to_string(),
            gender: Gender::Female,
            sexuality: Sexuality::Bisexual,
            house: House::Athena,
            year: Year::Second,
        }
    }

    #[tokio::test]
    async fn create_notifies_with_public_snapshot() {
        let (state, mut rx) = state().await;

        let view = create_character(&state, iris()).await.unwrap();
        assert_eq!(view, iris().view());
        assert_eq!(events(&state, &mut rx).await, vec![ChangeEvent::Create(iris().view())]);
    }

    /// Never accepts a frame.
    struct StalledSink;

    #[async_trait]
    impl ViewerSink for StalledSink {
        async fn send_text(&self, _text: &str) -> Result<(), SessionError> {
            std::future::pending().await
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn create_is_announced_even_if_the_caller_gives_up() {
        let (state, mut rx) = state().await;
        state.broadcaster.register(Arc::new(StalledSink)).await;

        // A fan-out stuck on the stalled viewer holds up delivery.
        let in_flight = {
            let broadcaster = Arc::clone(&state.broadcaster);
            tokio::spawn(async move {
                broadcaster
                    .broadcast(&ChangeEvent::Delete {
                        name: "Nobody".to_string(),
                    })
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let abandoned =
            tokio::time::timeout(std::time::Duration::ZERO, create_character(&state, iris()))
                .await;
        assert!(abandoned.is_err());

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while list_characters(&state).await.unwrap().is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("abandoned create never committed");

        in_flight.await.unwrap();
        assert_eq!(
            events(&state, &mut rx).await,
            vec![
                ChangeEvent::Delete {
                    name: "Nobody".to_string()
                },
                ChangeEvent::Create(iris().view())
            ]
        );
    }

    #[tokio::test]
    async fn create_with_bad_image_is_rejected_silently() {
        let (state, mut rx) = state().await;
        let mut bad = iris();
        bad.image = "http://img.example/iris.png".to_string();

        let err = assert_err!(create_character(&state, bad).await);
        assert!(matches!(err, CommandError::InvalidImageUrl));
        assert!(events(&state, &mut rx).await.is_empty());
        assert!(list_characters(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected_without_event() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        events(&state, &mut rx).await;

        let err = create_character(&state, iris()).await.unwrap_err();
        assert!(matches!(err, CommandError::DuplicateName(ref n) if n == "Iris"));
        assert!(events(&state, &mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn edit_applies_only_supplied_fields() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        events(&state, &mut rx).await;

        let changes = CharacterEdit {
            bio: Some("Louder now.".to_string()),
            faceclaim: Some(String::new()),
            house: Some(House::Nyx),
            ..Default::default()
        };
        let view = edit_character(&state, "Iris", "pw", changes).await.unwrap();

        assert_eq!(view.bio, "Louder now.");
        assert_eq!(view.faceclaim, "Zendaya");
        assert_eq!(view.house, Some(House::Nyx));
        assert_eq!(view.year, Some(Year::Second));
        assert_eq!(
            events(&state, &mut rx).await,
            vec![ChangeEvent::Edit {
                name: "Iris".to_string(),
                new_name: "Iris".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn edit_can_rename_with_admin_password() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        events(&state, &mut rx).await;

        let changes = CharacterEdit {
            new_name: Some("Iris Vale".to_string()),
            ..Default::default()
        };
        edit_character(&state, "Iris", "letmein", changes)
            .await
            .unwrap();

        assert_eq!(
            events(&state, &mut rx).await,
            vec![ChangeEvent::Edit {
                name: "Iris".to_string(),
                new_name: "Iris Vale".to_string()
            }]
        );
        assert!(matches!(
            show_character(&state, "Iris").await,
            Err(CommandError::NotFound)
        ));
        assert_eq!(
            show_character(&state, "Iris Vale").await.unwrap().title,
            "IRIS VALE"
        );
    }

    #[tokio::test]
    async fn edit_rename_collision_is_rejected() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        let mut other = iris();
        other.name = "Ada".to_string();
        create_character(&state, other).await.unwrap();
        events(&state, &mut rx).await;

        let changes = CharacterEdit {
            new_name: Some("Ada".to_string()),
            ..Default::default()
        };
        let err = edit_character(&state, "Iris", "pw", changes)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::DuplicateName(ref n) if n == "Ada"));
        assert!(events(&state, &mut rx).await.is_empty());
        assert_ok!(show_character(&state, "Iris").await);
    }

    #[tokio::test]
    async fn edit_with_wrong_password_changes_nothing() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        events(&state, &mut rx).await;

        let changes = CharacterEdit {
            bio: Some("hijacked".to_string()),
            ..Default::default()
        };
        let err = edit_character(&state, "Iris", "nope", changes)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidCredentials));
        assert!(events(&state, &mut rx).await.is_empty());

        let listed = list_characters(&state).await.unwrap();
        assert_eq!(listed[0].bio, "Quiet, sharp.");
    }

    #[tokio::test]
    async fn edit_rejects_bad_image_and_empty_changes() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        events(&state, &mut rx).await;

        let bad_image = CharacterEdit {
            image: Some("https://img.example/iris.bmp".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            edit_character(&state, "Iris", "pw", bad_image).await,
            Err(CommandError::InvalidImageUrl)
        ));
        assert!(matches!(
            edit_character(&state, "Iris", "pw", CharacterEdit::default()).await,
            Err(CommandError::NothingToChange)
        ));
        assert!(events(&state, &mut rx).await.is_empty());
    }

    #[tokio::test]
    async fn delete_requires_credentials() {
        let (state, mut rx) = state().await;
        create_character(&state, iris()).await.unwrap();
        events(&state, &mut rx).await;

        assert!(matches!(
            delete_character(&state, "Iris", "nope").await,
            Err(CommandError::InvalidCredentials)
        ));
        assert!(matches!(
            delete_character(&state, "Nobody", "pw").await,
            Err(CommandError::InvalidCredentials)
        ));
        assert!(events(&state, &mut rx).await.is_empty());

        assert_ok!(delete_character(&state, "Iris", "pw").await);
        assert_eq!(
            events(&state, &mut rx).await,
            vec![ChangeEvent::Delete {
                name: "Iris".to_string()
            }]
        );
        assert!(list_characters(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn show_builds_character_sheet() {
        let (state, _rx) = state().await;
        let mut linked = iris();
        linked.bio = "https://docs.example/iris".to_string();
        create_character(&state, linked).await.unwrap();

        let sheet = show_character(&state, "Iris").await.unwrap();
        assert_eq!(sheet.title, "IRIS [Character Sheet]");
        assert_eq!(sheet.footer, "Zendaya");
        assert_eq!(sheet.image, "https://img.example/iris.png");
        assert_eq!(sheet.color, CharacterSheet::ACCENT_COLOR);
    }

    #[tokio::test]
    async fn directory_link_is_configured_site() {
        let (state, _rx) = state().await;
        assert_eq!(directory_link(&state), "https://roster.example/");
    }

    #[tokio::test]
    async fn autocomplete_names_and_choices() {
        let (state, _rx) = state().await;
        create_character(&state, iris()).await.unwrap();

        assert_eq!(
            autocomplete(&state, AutocompleteField::Name, "ir")
                .await
                .unwrap(),
            vec!["Iris"]
        );
        assert_eq!(
            autocomplete(&state, AutocompleteField::Year, "1")
                .await
                .unwrap(),
            vec!["1st Year"]
        );
        assert_eq!(
            autocomplete(&state, AutocompleteField::Gender, "")
                .await
                .unwrap()
                .len(),
            Gender::ALL.len()
        );
    }
}
