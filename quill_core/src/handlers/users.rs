//! Registration, login and profile lookup.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::Utc;
use rusqlite::Connection;

use super::{immediate, not_found};
use crate::db::users::{self, UserRow};
use crate::models::{Actor, Id, NewUser, User, BASELINE_PERMISSIONS};
use crate::{Error, Policy, Result};

const USERNAME_MAX: usize = 150;
const PASSWORD_MIN: usize = 8;

fn validate_username(username: &str) -> Result<()> {
    let valid_char = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if username.is_empty()
        || username.chars().count() > USERNAME_MAX
        || !username.chars().all(valid_char)
    {
        return Err(Error::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    let invalid = || Error::validation("email", "Enter a valid email address.");
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || domain.contains("..")
    {
        return Err(invalid());
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(Error::validation(
            "password",
            format!("This password is too short. It must contain at least {PASSWORD_MIN} characters."),
        ));
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

pub(crate) fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn insert_user(conn: &mut Connection, input: &NewUser, is_superuser: bool) -> Result<User> {
    validate_username(&input.username)?;
    let email = input.email.as_deref().filter(|e| !e.is_empty());
    if let Some(email) = email {
        validate_email(email)?;
    }
    validate_password(&input.password)?;
    let password_hash = hash_password(&input.password)?;
    let taken = || Error::Conflict("A user with that username already exists.".to_string());
    immediate(conn, |tx| {
        if users::exists(tx, &input.username)? {
            return Err(taken());
        }
        let row = UserRow {
            username: &input.username,
            email,
            password_hash: &password_hash,
            is_superuser,
            is_staff: true,
            created_at: Utc::now(),
        };
        let id = match users::insert(tx, &row) {
            Ok(id) => id,
            Err(e) if e.is_unique_violation() => return Err(taken()),
            Err(e) => return Err(e),
        };
        let user = users::find(tx, id)?.ok_or_else(|| not_found("User"))?;
        if !is_superuser {
            grant_admin_permissions(tx, &user)?;
        }
        users::find(tx, id)?.ok_or_else(|| not_found("User"))
    })
}

/// Give a staff user view/add/change/delete on blogs, posts and tags.
pub fn grant_admin_permissions(conn: &Connection, user: &User) -> Result<()> {
    if !user.is_staff {
        return Err(Error::PermissionDenied(
            "Only staff users can receive admin permissions.".to_string(),
        ));
    }
    users::grant(conn, user.id, &BASELINE_PERMISSIONS)
}

/// Register a staff user holding the baseline permissions.
pub fn register(conn: &mut Connection, input: NewUser) -> Result<User> {
    let user = insert_user(conn, &input, false)?;
    log::info!("registered user {} ({})", user.username, user.id);
    Ok(user)
}

pub fn create_superuser(conn: &mut Connection, input: NewUser) -> Result<User> {
    let user = insert_user(conn, &input, true)?;
    log::info!("created superuser {} ({})", user.username, user.id);
    Ok(user)
}

/// Check a username and password.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Actor> {
    let (id, stored) = users::credentials(conn, username)?.ok_or(Error::AuthenticationRequired)?;
    if !verify_password(password, &stored)? {
        log::debug!("bad password for {username}");
        return Err(Error::AuthenticationRequired);
    }
    load_actor(conn, id)
}

/// The current state of user `id` as an actor. A user that no longer
/// exists cannot act.
pub fn load_actor(conn: &Connection, id: Id) -> Result<Actor> {
    users::find(conn, id)?
        .map(Actor::from)
        .ok_or(Error::AuthenticationRequired)
}

pub fn get_user(conn: &Connection, actor: &Actor, id: Id) -> Result<User> {
    let user = users::find(conn, id)?.ok_or_else(|| not_found("User"))?;
    Policy::AuthenticatedOrReadOnlyOwner.check(actor, &user)?;
    Ok(user)
}
