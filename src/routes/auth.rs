use crate::{
    auth::{
        AuthResponse, AuthenticatedUserId, LoginRequest, PasswordHasher, ProfileUpdate,
        RefreshResponse, RefreshUserId, RegisterRequest, TokenService,
    },
    error::{AppError, TokenError},
    models::{NewUser, UserChanges},
    response::{message_only, ApiResponse},
    store::Store,
    validation::{message_of, validate_email, validate_name, validate_password},
};
use actix_web::{delete, get, post, put, web, Responder};

fn checked_email(email: &str) -> Result<String, AppError> {
    validate_email(email).map_err(|e| AppError::field("Invalid email", "email", message_of(&e)))
}

fn checked_password(password: &str) -> Result<String, AppError> {
    validate_password(password)
        .map_err(|e| AppError::field("Invalid password", "password", message_of(&e)))
}

fn checked_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    validate_name(name).map_err(|e| AppError::field("Invalid name", "name", message_of(&e)))?;
    Ok(name.to_string())
}

/// Register a new user
///
/// Creates the account and returns it together with an access and a refresh
/// token.
#[post("/register")]
pub async fn register(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenService>,
    hasher: web::Data<PasswordHasher>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let RegisterRequest {
        name,
        email,
        password,
    } = register_data.into_inner();
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(AppError::BadRequest("Missing required fields".into()));
    };

    let email = checked_email(&email)?;
    checked_password(&password)?;
    let name = checked_name(&name)?;

    if store.find_user_by_email(&email).await?.is_some() {
        log::info!("Registration rejected, email already registered: {}", email);
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hasher.hash(&password)?;
    let user = store
        .create_user(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;
    log::info!("Registered user {}", user.id);

    let pair = tokens.issue_pair(user.id)?;
    Ok(ApiResponse::created(
        AuthResponse::new(user, pair),
        "User registered successfully",
    ))
}

/// Login user
///
/// Authenticates a user and returns fresh access and refresh tokens.
#[post("/login")]
pub async fn login(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenService>,
    hasher: web::Data<PasswordHasher>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let LoginRequest { email, password } = login_data.into_inner();
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::BadRequest("Missing email or password".into()));
    };

    // Stored addresses are normalized; fall back to the raw input so an
    // unparseable address still gets the generic credentials error.
    let lookup = validate_email(&email).unwrap_or(email);
    let user = match store.find_user_by_email(&lookup).await? {
        Some(user) if hasher.verify(&password, &user.password_hash)? => user,
        _ => {
            log::info!("Failed login attempt for {}", lookup);
            return Err(AppError::Unauthorized("Invalid email or password".into()));
        }
    };

    let pair = tokens.issue_pair(user.id)?;
    log::info!("User {} logged in", user.id);
    Ok(ApiResponse::ok(AuthResponse::new(user, pair), "Login successful"))
}

/// Exchange a refresh token for a new access token. The refresh token itself
/// is not rotated.
#[post("/refresh")]
pub async fn refresh(
    store: web::Data<dyn Store>,
    tokens: web::Data<TokenService>,
    user_id: RefreshUserId,
) -> Result<impl Responder, AppError> {
    if store.find_user(user_id.0).await?.is_none() {
        return Err(AppError::Token(TokenError::Invalid));
    }
    let access_token = tokens.access_token(user_id.0)?;
    Ok(ApiResponse::ok(
        RefreshResponse { access_token },
        "Token refreshed successfully",
    ))
}

#[get("/profile")]
pub async fn get_profile(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    let user = store
        .find_user(user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok(user, "Profile retrieved successfully"))
}

/// Update the caller's name, email and/or password. Every field is optional;
/// all accepted changes are written together.
#[put("/profile")]
pub async fn update_profile(
    store: web::Data<dyn Store>,
    hasher: web::Data<PasswordHasher>,
    user_id: AuthenticatedUserId,
    update: web::Json<ProfileUpdate>,
) -> Result<impl Responder, AppError> {
    let current = store
        .find_user(user_id.0)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let update = update.into_inner();

    let mut changes = UserChanges::default();
    if let Some(name) = update.name {
        changes.name = Some(checked_name(&name)?);
    }
    if let Some(email) = update.email {
        let email = checked_email(&email)?;
        if email != current.email {
            if let Some(other) = store.find_user_by_email(&email).await? {
                if other.id != current.id {
                    return Err(AppError::Conflict("Email already in use".into()));
                }
            }
            changes.email = Some(email);
        }
    }
    if let Some(password) = update.password {
        checked_password(&password)?;
        changes.password_hash = Some(hasher.hash(&password)?);
    }

    let user = if changes.is_empty() {
        current
    } else {
        store
            .update_user(user_id.0, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?
    };
    log::info!("Updated profile of user {}", user.id);
    Ok(ApiResponse::ok(user, "Profile updated successfully"))
}

/// Delete the caller's account along with all of their projects and tasks.
#[delete("/profile")]
pub async fn delete_profile(
    store: web::Data<dyn Store>,
    user_id: AuthenticatedUserId,
) -> Result<impl Responder, AppError> {
    if !store.delete_user(user_id.0).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    log::info!("Deleted user {}", user_id.0);
    Ok(message_only("Account deleted successfully"))
}
