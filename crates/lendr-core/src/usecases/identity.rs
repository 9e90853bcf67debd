//! Account use case
//!
//! Registration, credential checks and profile maintenance. Passwords are
//! hashed with bcrypt on the blocking pool so hashing never stalls the
//! async workers.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info};

use super::{
    booking::DEFAULT_STORE_TIMEOUT,
    error::{guarded, LendingError, LendingResult},
    listings::{check_photo, upload_photo},
};
use crate::{
    domain::{CommunityId, Email, NewUser, Reputation, User, UserId},
    ports::{IBlobStore, IIdentityStore, PhotoUpload},
};

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 8;

/// Raw registration form
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub community: String,
}

/// Use case for user accounts
pub struct AccountService {
    identity: Arc<dyn IIdentityStore + Send + Sync>,
    blobs: Arc<dyn IBlobStore + Send + Sync>,
    store_timeout: Duration,
    upload_timeout: Duration,
    bcrypt_cost: u32,
    initial_reputation: Reputation,
}

impl AccountService {
    pub fn new(
        identity: Arc<dyn IIdentityStore + Send + Sync>,
        blobs: Arc<dyn IBlobStore + Send + Sync>,
    ) -> Self {
        Self {
            identity,
            blobs,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            upload_timeout: Duration::from_secs(30),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            initial_reputation: Reputation::default(),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn with_initial_reputation(mut self, reputation: Reputation) -> Self {
        self.initial_reputation = reputation;
        self
    }

    /// Registers a new member
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if any field is missing or malformed, or the
    ///   password is shorter than [`MIN_PASSWORD_LEN`]
    /// - `InvalidState` if the email is already registered
    pub async fn register(&self, form: Registration) -> LendingResult<User> {
        let missing: Vec<&str> = [
            ("name", &form.name),
            ("email", &form.email),
            ("password", &form.password),
            ("phone", &form.phone),
            ("community", &form.community),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(LendingError::invalid_input(format!(
                "Please provide all fields (missing: {})",
                missing.join(", ")
            )));
        }
        check_password(&form.password)?;

        let email = Email::new(form.email)?;
        let community_id = CommunityId::new(form.community)?;

        let hash = self.hash(form.password).await?;
        let user = User::register(
            NewUser {
                name: form.name,
                email,
                phone: form.phone,
                community_id,
            },
            hash,
            self.initial_reputation,
        )?;

        let inserted = guarded(
            self.store_timeout,
            "register user",
            self.identity.insert_user(&user),
        )
        .await?;
        if !inserted {
            return Err(LendingError::invalid_state(format!(
                "Email {} is already taken",
                user.email()
            )));
        }

        info!(user = %user.id(), community = %user.community_id(), "User registered");
        Ok(user)
    }

    /// Checks an email/password pair and returns the matching user
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the email is malformed
    /// - `NotFound` if no user has that email
    /// - `Unauthorized` if the password does not match
    pub async fn verify_credentials(&self, email: &str, password: &str) -> LendingResult<User> {
        let email = Email::new(email.to_string())?;
        let user = guarded(
            self.store_timeout,
            "look up user",
            self.identity.get_user_by_email(&email),
        )
        .await?
        .ok_or_else(|| LendingError::not_found("Email is not registered"))?;

        if !self.verify(password, user.password_hash()).await? {
            debug!(user = %user.id(), "Password mismatch");
            return Err(LendingError::unauthorized("Invalid email or password"));
        }
        Ok(user)
    }

    /// Returns the user with their listing sets joined
    pub async fn profile(&self, user_id: &UserId) -> LendingResult<User> {
        self.load_user(user_id).await
    }

    /// Changes display name and/or phone number
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if neither field is given, or a given field is blank
    /// - `NotFound` if the user does not exist
    pub async fn update_details(
        &self,
        user_id: &UserId,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> LendingResult<User> {
        if name.is_none() && phone.is_none() {
            return Err(LendingError::invalid_input("Nothing to update"));
        }
        let mut user = self.load_user(user_id).await?;
        user.update_details(name, phone)?;
        self.save(&user).await?;
        info!(user = %user_id, "Profile details updated");
        Ok(user)
    }

    /// Replaces the password after checking the current one
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    /// - `Unauthorized` if `current` does not match
    /// - `InvalidInput` if `new_password` is too short
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current: &str,
        new_password: &str,
    ) -> LendingResult<User> {
        check_password(new_password)?;
        let mut user = self.load_user(user_id).await?;
        if !self.verify(current, user.password_hash()).await? {
            return Err(LendingError::unauthorized("Current password is incorrect"));
        }

        let hash = self.hash(new_password.to_string()).await?;
        user.set_password_hash(hash);
        self.save(&user).await?;
        info!(user = %user_id, "Password changed");
        Ok(user)
    }

    /// Uploads and sets a profile picture
    pub async fn set_profile_picture(
        &self,
        user_id: &UserId,
        photo: PhotoUpload,
    ) -> LendingResult<User> {
        check_photo(&photo, None)?;
        let mut user = self.load_user(user_id).await?;
        let url = upload_photo(self.blobs.as_ref(), &photo, self.upload_timeout).await?;
        user.set_photo_url(url);
        self.save(&user).await?;
        info!(user = %user_id, "Profile picture updated");
        Ok(user)
    }

    /// Makes the user their community's leader
    ///
    /// # Errors
    ///
    /// - `NotFound` if the user does not exist
    /// - `InvalidState` if the community already has a different leader
    pub async fn promote_to_leader(&self, user_id: &UserId) -> LendingResult<User> {
        let mut user = self.load_user(user_id).await?;
        let current = guarded(
            self.store_timeout,
            "find community leader",
            self.identity.find_leader(user.community_id()),
        )
        .await?;
        if let Some(current) = current {
            if current.id() != user_id {
                return Err(LendingError::invalid_state(format!(
                    "Community {} is already led by {}",
                    user.community_id(),
                    current.name()
                )));
            }
            return Ok(user);
        }

        user.promote_to_leader();
        self.save(&user).await?;
        info!(user = %user_id, community = %user.community_id(), "User promoted to leader");
        Ok(user)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load_user(&self, id: &UserId) -> LendingResult<User> {
        guarded(self.store_timeout, "load user", self.identity.get_user(id))
            .await?
            .ok_or_else(|| LendingError::not_found(format!("User {id} not found")))
    }

    async fn save(&self, user: &User) -> LendingResult<()> {
        guarded(
            self.store_timeout,
            "save profile",
            self.identity.save_profile(user),
        )
        .await
    }

    async fn hash(&self, password: String) -> LendingResult<String> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing task failed");
                LendingError::internal("Could not hash password")
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing failed");
                LendingError::internal("Could not hash password")
            })
    }

    async fn verify(&self, password: &str, hash: &str) -> LendingResult<bool> {
        let (password, hash) = (password.to_string(), hash.to_string());
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password check task failed");
                LendingError::internal("Could not check password")
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "Stored password hash is unreadable");
                LendingError::internal("Could not check password")
            })
    }
}

fn check_password(password: &str) -> LendingResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LendingError::invalid_input(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
