use axum::{routing::post, Router};
use rand::seq::IndexedRandom;
use tower_sessions::Session;

use crate::{chat::Identity, session::USER_NAME, AppState};

mod login;
mod logout;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login::login))
        .route("/logout/", post(logout::logout))
}

/// Resolves who is behind a request: whoever logged in on this session, or nobody.
pub async fn identity(session: &Session) -> Result<Identity, tower_sessions::session::Error> {
    Ok(Identity::from_username(session.get::<String>(USER_NAME).await?))
}

pub(crate) fn random_alias() -> String {
    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
    ];

    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
        "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
    ];

    let mut rng = rand::rng();
    match (adjectives.choose(&mut rng), nouns.choose(&mut rng)) {
        (Some(adjective), Some(noun)) => format!("{adjective} {noun}"),
        _ => "Nameless User".to_owned(),
    }
}
