//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with a connection pool shared by the HTTP server and the
//! queue consumer.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use super::models::*;
use super::repository::Repository;
use crate::error::AppError;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file (and its parent directory) if it doesn't
    /// exist. Does not run migrations; call [`Database::migrate`] next.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    /// * `max_connections` - Pool size
    ///
    /// # Errors
    /// Returns error if the file cannot be created or opened
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(&connection_string)
            .await?;

        tracing::info!(path = %path.display(), "Database connected");

        Ok(Self { pool })
    }

    /// Run pending migrations from `./migrations`
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Migration(e)
            })?;

        tracing::info!("Database migrated successfully");
        Ok(())
    }

    /// Connect and migrate in one step
    pub async fn connect_and_migrate(path: &Path, max_connections: u32) -> Result<Self, AppError> {
        let db = Self::connect(path, max_connections).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Upserts skip the UPDATE when nothing but timestamps would change, so a
// redelivered event leaves the row exactly as the first delivery wrote it.
// An event older than the stored row (a requeued update redelivered after a
// newer one) is also skipped.

#[async_trait]
impl Repository for Database {
    async fn upsert_actor(&self, actor: &Actor) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO actors (
                id, actor_type, username, name, bio, matrix_user_id,
                public_key, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                actor_type = excluded.actor_type,
                username = excluded.username,
                name = excluded.name,
                bio = excluded.bio,
                matrix_user_id = excluded.matrix_user_id,
                public_key = excluded.public_key,
                updated_at = excluded.updated_at
            WHERE julianday(excluded.updated_at) >= julianday(actors.updated_at)
              AND (actors.actor_type IS NOT excluded.actor_type
                   OR actors.username IS NOT excluded.username
                   OR actors.name IS NOT excluded.name
                   OR actors.bio IS NOT excluded.bio
                   OR actors.matrix_user_id IS NOT excluded.matrix_user_id
                   OR actors.public_key IS NOT excluded.public_key)
            "#,
        )
        .bind(&actor.id)
        .bind(&actor.actor_type)
        .bind(&actor.username)
        .bind(&actor.name)
        .bind(&actor.bio)
        .bind(&actor.matrix_user_id)
        .bind(&actor.public_key)
        .bind(actor.created_at)
        .bind(actor.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO posts (
                id, author_id, community_id, title, body, url, nsfw,
                published, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                author_id = excluded.author_id,
                community_id = excluded.community_id,
                title = excluded.title,
                body = excluded.body,
                url = excluded.url,
                nsfw = excluded.nsfw,
                updated_at = excluded.updated_at
            WHERE julianday(excluded.updated_at) >= julianday(posts.updated_at)
              AND (posts.author_id IS NOT excluded.author_id
                   OR posts.community_id IS NOT excluded.community_id
                   OR posts.title IS NOT excluded.title
                   OR posts.body IS NOT excluded.body
                   OR posts.url IS NOT excluded.url
                   OR posts.nsfw IS NOT excluded.nsfw)
            "#,
        )
        .bind(&post.id)
        .bind(&post.author_id)
        .bind(&post.community_id)
        .bind(&post.title)
        .bind(&post.body)
        .bind(&post.url)
        .bind(post.nsfw)
        .bind(post.published)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_comment(&self, comment: &Comment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO comments (
                id, post_id, author_id, parent_id, body, nsfw,
                published, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                post_id = excluded.post_id,
                author_id = excluded.author_id,
                parent_id = excluded.parent_id,
                body = excluded.body,
                nsfw = excluded.nsfw,
                updated_at = excluded.updated_at
            WHERE julianday(excluded.updated_at) >= julianday(comments.updated_at)
              AND (comments.post_id IS NOT excluded.post_id
                   OR comments.author_id IS NOT excluded.author_id
                   OR comments.parent_id IS NOT excluded.parent_id
                   OR comments.body IS NOT excluded.body
                   OR comments.nsfw IS NOT excluded.nsfw)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.author_id)
        .bind(&comment.parent_id)
        .bind(&comment.body)
        .bind(comment.nsfw)
        .bind(comment.published)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_actor(&self, id: &str) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>("SELECT * FROM actors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(actor)
    }

    async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(post)
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }
}
