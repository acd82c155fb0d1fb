use axum::{
    extract::FromRef,
    routing::{delete, get, post},
    Router,
};
use dotenv::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

mod auth;
mod comments;
mod config;
mod error;
mod follows;
mod posts;
mod response;
mod stories;

use config::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    settings: Settings,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> PgPool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    info!("database connected");

    let app_state = AppState {
        pool,
        settings: settings.clone(),
    };

    let auth_router = Router::new()
        .route("/register", post(auth::handler::register))
        .route("/login", post(auth::handler::login))
        .route("/refresh", post(auth::handler::refresh_token))
        .route(
            "/profile",
            get(auth::handler::get_profile).put(auth::handler::update_profile),
        )
        .route("/profile/password", post(auth::handler::change_password));

    let user_router = Router::new()
        .route("/", get(auth::handler::list_users))
        .route("/:username", get(auth::handler::get_user_detail))
        .route("/:username/follow", post(follows::handler::follow_user))
        .route(
            "/:username/unfollow",
            delete(follows::handler::unfollow_user),
        )
        .route("/:username/followers", get(follows::handler::get_followers))
        .route("/:username/following", get(follows::handler::get_following))
        .route("/:username/posts", get(posts::handler::get_user_posts));

    let post_router = Router::new()
        .route(
            "/",
            post(posts::handler::create_post).get(posts::handler::list_posts),
        )
        .route("/feed", get(posts::handler::get_feed))
        .route("/explore", get(posts::handler::get_explore))
        .route(
            "/:id",
            get(posts::handler::get_post)
                .put(posts::handler::update_post)
                .delete(posts::handler::delete_post),
        )
        .route("/:id/like", post(posts::handler::like_post))
        .route("/:id/unlike", delete(posts::handler::unlike_post))
        .route("/:id/likes", get(posts::handler::get_post_likes))
        .route(
            "/:id/comments",
            post(comments::handler::create_comment).get(comments::handler::list_comments),
        )
        .route(
            "/:id/comments/:comment_id",
            axum::routing::put(comments::handler::update_comment)
                .delete(comments::handler::delete_comment),
        );

    let story_router = Router::new()
        .route(
            "/",
            post(stories::handler::create_story).get(stories::handler::get_stories),
        )
        .route("/following", get(stories::handler::get_following_stories))
        .route(
            "/:id",
            get(stories::handler::get_story)
                .put(stories::handler::update_story)
                .delete(stories::handler::delete_story),
        );

    let app = Router::new()
        .nest("/api/auth", auth_router)
        .nest("/api/users", user_router)
        .nest("/api/posts", post_router)
        .nest("/api/stories", story_router)
        .with_state(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
