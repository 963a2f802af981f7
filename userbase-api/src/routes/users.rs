/// User resource
///
/// Request payloads for `/api/users` and the [`Resource`] binding that lets
/// the generic handlers in [`super::resource`] serve users.
///
/// # Validation
///
/// - `first_name`, `last_name`: 2 to 50 characters
/// - `email`: valid email address
/// - `password`: at least 6 characters
///
/// Update payloads apply the same rules to whichever fields are present.

use serde::Deserialize;
use userbase_shared::entity::User;
use validator::Validate;

use super::resource::Resource;

/// Create (and register) payload
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 50, message = "first_name must be between 2 and 50 characters"))]
    pub first_name: String,

    #[validate(length(min = 2, max = 50, message = "last_name must be between 2 and 50 characters"))]
    pub last_name: String,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

/// Partial update payload
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 50, message = "first_name must be between 2 and 50 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 2, max = 50, message = "last_name must be between 2 and 50 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,

    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
}

impl Resource for User {
    type Create = CreateUserRequest;
    type Update = UpdateUserRequest;

    const NAME: &'static str = "User";

    fn from_create(input: CreateUserRequest) -> Self {
        User::new(input.first_name, input.last_name, input.email, input.password)
    }

    fn apply_update(&mut self, input: UpdateUserRequest) {
        if let Some(first_name) = input.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            self.last_name = last_name;
        }
        if let Some(email) = input.email {
            self.email = email;
        }
        if let Some(password) = input.password {
            self.set_password(password);
        }
    }
}
