#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use quizladder_api::{
    config::{Config, GameSettings},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::{question::AnswerKey, user::Player},
    services::{
        game_repository::{GameRepository, InMemoryGameRepository},
        question_bank::InMemoryQuestionBank,
        user_store::{InMemoryUserStore, UserStore},
        AppState,
    },
    utils::time::ManualClock,
};

pub const PLAYER_ID: &str = "player-1";
pub const OTHER_PLAYER_ID: &str = "player-2";

/// 35 minutes, the default game time limit.
pub fn time_limit() -> Duration {
    Duration::seconds(35 * 60)
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub users: Arc<InMemoryUserStore>,
    pub games: Arc<InMemoryGameRepository>,
    jwt: JwtService,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(GameSettings::default(), InMemoryQuestionBank::generated(15, 4)).await
}

pub async fn create_test_app_with(settings: GameSettings, bank: InMemoryQuestionBank) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let mut config = Config::for_tests();
    config.game = settings;

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let users = Arc::new(InMemoryUserStore::new());
    users.insert(Player::new(PLAYER_ID, "Vadim")).await;
    users.insert(Player::new(OTHER_PLAYER_ID, "Zhenya")).await;
    let games = Arc::new(InMemoryGameRepository::new());

    let jwt = JwtService::new(&config.jwt_secret);
    let state = Arc::new(
        AppState::with_backends(
            config,
            Arc::new(bank),
            users.clone(),
            games.clone(),
            clock.clone(),
        )
        .expect("Failed to initialize test app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        users,
        games,
        jwt,
    }
}

impl TestApp {
    pub fn token_for(&self, user_id: &str) -> String {
        self.jwt
            .generate_token(&JwtClaims::for_player(user_id, 3600))
            .expect("Failed to sign test token")
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    /// Starts a game for `user_id` over HTTP and returns its id.
    pub async fn start_game(&self, user_id: &str) -> String {
        let token = self.token_for(user_id);
        let (status, body) = self
            .request("POST", "/api/v1/games", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn correct_key(&self, game_id: &str) -> AnswerKey {
        let game = self.games.find(game_id).await.unwrap().unwrap();
        game.current_game_question().unwrap().correct_answer_key()
    }

    pub async fn wrong_key(&self, game_id: &str) -> AnswerKey {
        let correct = self.correct_key(game_id).await;
        AnswerKey::ALL
            .into_iter()
            .find(|&key| key != correct)
            .unwrap()
    }

    pub async fn answer(&self, user_id: &str, game_id: &str, key: AnswerKey) -> (StatusCode, Value) {
        let token = self.token_for(user_id);
        self.request(
            "POST",
            &format!("/api/v1/games/{}/answers", game_id),
            Some(&token),
            Some(serde_json::json!({ "answer": key.as_str() })),
        )
        .await
    }

    /// Answers the next `count` questions correctly.
    pub async fn climb(&self, user_id: &str, game_id: &str, count: usize) {
        for _ in 0..count {
            let key = self.correct_key(game_id).await;
            let (status, body) = self.answer(user_id, game_id, key).await;
            assert_eq!(status, StatusCode::OK, "unexpected body {}", body);
        }
    }

    pub async fn balance(&self, user_id: &str) -> i64 {
        self.users.current_balance(user_id).await.unwrap().unwrap()
    }
}
