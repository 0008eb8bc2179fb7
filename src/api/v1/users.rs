use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, generate_key, generate_salt, hash_password, verify_password, Claims};
use crate::database::{Object, Query, Session};
use crate::error::ApiError;
use crate::filter::{ByCurrentUserId, BySearchFields, CollectionByPrimaryKey, FilterOp, SearchField};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::USER;
use crate::resource::{ActionDescriptor, ConfigurationError, ModelResource, RequestMethod, ResourceDef};
use crate::schemas::definitions::{USER_SCHEMA, USER_SIGNIN_SCHEMA, USER_SIGNUP_SCHEMA};
use crate::schemas::{FieldType, Mode};
use crate::security::{Identity, PUBLIC};

pub fn resource() -> Result<ResourceDef, ConfigurationError> {
    let search = BySearchFields::new()
        .field(
            "email",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains, FilterOp::Ends]),
        )
        .field(
            "first_name",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains]),
        )
        .field(
            "last_name",
            SearchField::with_ops(FieldType::String, &[FilterOp::Eq, FilterOp::Contains]),
        );

    ResourceDef::builder("users", &USER, &USER_SCHEMA)
        .doc("Users of the application")
        .filter(CollectionByPrimaryKey)
        .filter(search)
        .filter(ByCurrentUserId)
        .create_hook(prepare_user)
        .update_hook(rehash_password)
        .action(
            ActionDescriptor::collection("signin", signin)
                .methods(&[RequestMethod::Post])
                .permission(PUBLIC)
                .doc("Sign in with email and password"),
        )
        .action(
            ActionDescriptor::collection("signup", signup)
                .methods(&[RequestMethod::Post])
                .permission(PUBLIC)
                .doc("Create a new user account"),
        )
        .action(
            ActionDescriptor::collection("search", search_user)
                .methods(&[RequestMethod::Get])
                .doc("Find a user by `email` or `key`"),
        )
        .build()
}

/// Give a new user its salt and API key, and hash the submitted password
fn prepare_user(values: &mut Object, _identity: &Identity) -> Result<(), ApiError> {
    let salt = generate_salt();
    values.insert("key".to_string(), Value::from(generate_key(&salt)));

    if let Some(password) = values.get("password").and_then(Value::as_str) {
        let hashed = hash_password(password, &salt);
        values.insert("password".to_string(), Value::from(hashed));
    }
    values.insert("salt".to_string(), Value::from(salt));
    Ok(())
}

/// Hash a changed password with the salt stored for the user
fn rehash_password(values: &mut Object, current: &Object, _identity: &Identity) -> Result<(), ApiError> {
    let Some(password) = values.get("password").and_then(Value::as_str) else {
        return Ok(());
    };
    let salt = current
        .get("salt")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::internal_server_error("User has no password salt"))?;
    let hashed = hash_password(password, salt);
    values.insert("password".to_string(), Value::from(hashed));
    Ok(())
}

/// Create a user outside of a request, e.g. the initial administrator
pub async fn create_user(session: &mut Session, email: &str, password: &str, is_admin: bool) -> Result<i64, ApiError> {
    let mut values = Object::new();
    values.insert("email".to_string(), Value::from(email));
    values.insert("first_name".to_string(), Value::from(""));
    values.insert("last_name".to_string(), Value::from(""));
    values.insert("password".to_string(), Value::from(password));
    values.insert("is_admin".to_string(), Value::from(is_admin));
    prepare_user(&mut values, &Identity::anonymous())?;
    Ok(session.insert(&USER, &values).await?)
}

fn by_email(email: &str) -> Result<Query, ApiError> {
    Ok(USER.query().filter("email", FilterOp::Eq, Value::from(email))?)
}

fn issue_token(resource: &ModelResource, user: &Object) -> Result<String, ApiError> {
    let id = user.get("id").and_then(Value::as_i64).unwrap_or_default();
    let email = user.get("email").and_then(Value::as_str).unwrap_or_default();
    let is_admin = user.get("is_admin").and_then(Value::as_bool).unwrap_or(false);

    let security = &resource.config().security;
    let claims = Claims::new(id, email.to_string(), is_admin, security.jwt_expiry_hours);
    generate_jwt(&claims, &security.jwt_secret).map_err(|e| {
        tracing::error!("Token generation failed: {}", e);
        ApiError::internal_server_error("Token generation failed")
    })
}

fn signin(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
    sign_in(resource).boxed()
}

async fn sign_in(resource: &mut ModelResource) -> ApiResult {
    let data = resource.request().request_data()?.clone();
    let credentials = USER_SIGNIN_SCHEMA.deserialize(&data, Mode::Full, resource.identity())?;
    let email = credentials.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = credentials.get("password").and_then(Value::as_str).unwrap_or_default();

    let user = resource
        .session_mut()
        .first(&by_email(email)?)
        .await?
        .filter(|user| {
            let salt = user.get("salt").and_then(Value::as_str).unwrap_or_default();
            let hash = user.get("password").and_then(Value::as_str);
            hash.map(|hash| verify_password(password, salt, hash)).unwrap_or(false)
        })
        .ok_or_else(|| ApiError::coded("INVALID_SIGNIN", "Invalid sign in credentials"))?;

    tracing::info!("User {} signed in", email);
    let token = issue_token(resource, &user)?;
    let user = resource.serialize(&USER, user).await?;
    Ok(ApiResponse::success(json!({ "token": token, "user": user })))
}

fn signup(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
    sign_up(resource).boxed()
}

async fn sign_up(resource: &mut ModelResource) -> ApiResult {
    let data = resource.request().request_data()?.clone();
    let mut values = USER_SIGNUP_SCHEMA.deserialize(&data, Mode::Full, resource.identity())?;
    let email = values.get("email").and_then(Value::as_str).unwrap_or_default().to_string();

    if resource.session_mut().first(&by_email(&email)?).await?.is_some() {
        return Err(ApiError::coded("USER_EMAIL_EXISTS", "A user with this email already exists"));
    }

    prepare_user(&mut values, resource.identity())?;
    let id = resource.session_mut().insert(&USER, &values).await?;
    let user = resource
        .session_mut()
        .get(&USER, id)
        .await?
        .ok_or_else(|| ApiError::internal_server_error("Created user could not be loaded"))?;

    tracing::info!("User {} signed up", email);
    let token = issue_token(resource, &user)?;
    let user = resource.serialize(&USER, user).await?;
    Ok(ApiResponse::success(json!({ "token": token, "user": user })))
}

fn search_user(resource: &mut ModelResource) -> BoxFuture<'_, ApiResult> {
    find_user(resource).boxed()
}

async fn find_user(resource: &mut ModelResource) -> ApiResult {
    let request = resource.request();
    let query = if let Some(email) = request.query_param("email") {
        by_email(email)?
    } else if let Some(key) = request.query_param("key") {
        USER.query().filter("key", FilterOp::Eq, Value::from(key))?
    } else {
        return Err(ApiError::field_error("email", "Either email or key is required"));
    };

    let user = resource
        .session_mut()
        .first(&query)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let user = resource.serialize(&USER, user).await?;
    Ok(ApiResponse::success(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::RouteType;

    #[test]
    fn prepares_salt_key_and_password() {
        let mut values = Object::new();
        values.insert("password".to_string(), json!("secret123"));
        prepare_user(&mut values, &Identity::anonymous()).unwrap();

        let salt = values["salt"].as_str().unwrap();
        let password = values["password"].as_str().unwrap();
        assert_ne!(password, "secret123");
        assert!(verify_password("secret123", salt, password));
        assert_eq!(values["key"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn declares_public_actions() {
        let def = resource().unwrap();
        let signin = def
            .get_actions_by_type(RouteType::Collection)
            .find(|a| a.name == "signin")
            .unwrap();
        assert_eq!(signin.get_permission(def.model), PUBLIC);
        assert!(!signin.allows(RequestMethod::Get));

        let search = def.get_actions_by_type(RouteType::Collection).find(|a| a.name == "search").unwrap();
        assert_eq!(search.get_permission(def.model), "time_user_action");
    }

    #[test]
    fn rehashes_changed_password_with_stored_salt() {
        let mut current = Object::new();
        current.insert("password".to_string(), json!("old-password"));
        prepare_user(&mut current, &Identity::anonymous()).unwrap();
        let salt = current["salt"].as_str().unwrap().to_string();

        let mut changes = Object::new();
        changes.insert("password".to_string(), json!("new-password"));
        rehash_password(&mut changes, &current, &Identity::user(1)).unwrap();
        let hashed = changes["password"].as_str().unwrap();
        assert_ne!(hashed, "new-password");
        assert!(verify_password("new-password", &salt, hashed));

        let mut changes = Object::new();
        changes.insert("first_name".to_string(), json!("Ada"));
        rehash_password(&mut changes, &current, &Identity::user(1)).unwrap();
        assert!(!changes.contains_key("password"));
    }
}
