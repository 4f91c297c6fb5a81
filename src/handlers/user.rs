use bcrypt::{hash, verify, DEFAULT_COST};
use crate::auth::capability::{authorize, Capability, Role};
use crate::dtos::user::{RegisterUserRequest, UserResponse, LoginRequest, LoginResponse};
use crate::auth::jwt::sign_token;
use crate::error::AppError;
use axum::{extract::State, http::StatusCode, Json};
use crate::models::user::User;
use crate::state::AppState;
use crate::middleware::auth::AuthContext;
use axum::extract::Extension;
use sqlx::PgConnection;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, owner_id, is_active, created_at";

// POST /users - admin creates an account
pub async fn register_user(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    authorize(&auth, Capability::ManageUsers)?;

    let role = payload.role.trim().parse::<Role>()?;
    let mut conn = db_pool.acquire().await?;
    let user = insert_user(&mut *conn, &payload, role).await?;

    tracing::info!(user_id = user.id, role = %role, created_by = auth.user_id, "User registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

// POST /users/bootstrap - first account, only while the users table is empty
pub async fn bootstrap_admin(
    State(AppState { db_pool, .. }): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut tx = db_pool.begin().await?;

    // Serializes concurrent bootstraps so only one of them sees an empty table.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext('users:bootstrap'))")
        .execute(&mut *tx)
        .await?;

    let has_users: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users)")
        .fetch_one(&mut *tx)
        .await?;
    if has_users {
        return Err(AppError::forbidden("Bootstrap is only available before the first user exists"));
    }

    let user = insert_user(&mut *tx, &payload, Role::Admin).await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "Bootstrap administrator created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login_user(
    State(AppState { db_pool, auth }): State<AppState>,
    Json(payload): Json<LoginRequest>
) -> Result<Json<LoginResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::validation("Email required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::validation("Password required"));
    }

    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(&email)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

    if !user.is_active {
        return Err(AppError::forbidden("User inactive"));
    }

    let ok = verify(&payload.password, &user.password_hash)
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))?;

    if !ok {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    let token = sign_token(user.id, &user.email, &user.role, user.owner_id, &auth.jwt_secret, auth.ttl_hours)?;

    tracing::info!(user_id = user.id, role = %user.role, "User logged in");
    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer",
        expires_in_seconds: auth.ttl_hours * 60 * 60,
    }))
}

// GET /users - admin only
pub async fn list_users(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    authorize(&auth, Capability::ManageUsers)?;

    let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(&db_pool)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

// Authenticated endpoint: returns full user profile from DB using the id in AuthContext
pub async fn get_me(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(auth.user_id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(UserResponse::from(user)))
}

async fn insert_user(
    conn: &mut PgConnection,
    payload: &RegisterUserRequest,
    role: Role,
) -> Result<User, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Name required"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::validation("Password too short"));
    }
    if role == Role::Owner && payload.owner_id.is_none() {
        return Err(AppError::validation("Owner accounts must reference an owner"));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("Hash error: {e}")))?;

    sqlx::query_as::<_, User>(&format!(
        r#"INSERT INTO users (email, name, password_hash, role, owner_id)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING {USER_COLUMNS}"#
    ))
    .bind(&email)
    .bind(payload.name.trim())
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(if role == Role::Owner { payload.owner_id } else { None })
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            match db_err.code().as_deref() {
                Some("23505") => return AppError::conflict("Email already registered"),
                Some("23503") => return AppError::validation("Referenced owner does not exist"),
                _ => {}
            }
        }
        AppError::db(e)
    })
}
