use std::collections::HashSet;

use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::{
    error::{ApiError, Error, FieldErrors},
    schema::{Id, Recipe},
};

fn trim(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Runs the derived field rules of `form`.
fn check(form: &impl Validate) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::default(),
        Err(errors) => errors.into(),
    }
}

/// The submitted value, else the stored one, else a "required" error.
fn merged<T: Default>(errors: &mut FieldErrors, field: &str, value: Option<T>, stored: Option<T>) -> T {
    value.or(stored).unwrap_or_else(|| {
        errors.required(field);
        T::default()
    })
}

fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        return Ok(());
    }
    Err(ValidationError::new("username").with_message(
        "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
            .into(),
    ))
}

fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(());
    }
    Err(ValidationError::new("slug").with_message(
        "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".into(),
    ))
}

fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    let is_hex = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if is_hex {
        return Ok(());
    }
    Err(ValidationError::new("color").with_message("Enter a color in #RRGGBB format.".into()))
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmountForm {
    pub id: Id,
    pub amount: i32,
}

/// Body of `POST /recipes/`, `PUT /recipes/{id}/` and `PATCH /recipes/{id}/`.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct RecipeForm {
    pub ingredients: Option<Vec<IngredientAmountForm>>,
    pub tags: Option<Vec<Id>>,
    #[validate(length(min = 1))]
    pub image: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub text: Option<String>,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub cooking_time: Option<i32>,
}

/// A recipe payload that passed validation. `tags` is `None` only for a
/// partial update that leaves the tag set untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Vec<IngredientAmountForm>,
}

impl RecipeForm {
    /// Validates without touching the database. With `current` set, missing
    /// scalar fields and tags keep their stored values; the ingredient list is
    /// always required.
    pub fn validate(self, current: Option<&Recipe>) -> Result<ValidRecipe, Error> {
        let form = RecipeForm {
            name: trim(self.name),
            text: trim(self.text),
            image: trim(self.image),
            ..self
        };
        let mut errors = check(&form);

        let ingredients = match form.ingredients {
            None => {
                errors.add("ingredients", "Ingredients must be specified.");
                vec![]
            }
            Some(ingredients) if ingredients.is_empty() => {
                errors.add("ingredients", "Ingredients must be specified.");
                ingredients
            }
            Some(ingredients) => {
                if ingredients.iter().any(|i| i.amount < 1) {
                    errors.add("ingredients", "Ingredient amount must be at least 1.");
                }
                let mut seen = HashSet::new();
                if let Some(duplicate) = ingredients.iter().find(|i| !seen.insert(i.id)) {
                    errors.add(
                        "ingredients",
                        format!("Ingredients must be unique, id {} is repeated.", duplicate.id),
                    );
                }
                ingredients
            }
        };

        let tags = match (form.tags, current) {
            (None, Some(_)) => None,
            (None, None) => {
                errors.required("tags");
                None
            }
            (Some(tags), _) => {
                if tags.is_empty() {
                    errors.add("tags", "At least one tag must be specified.");
                }
                let mut seen = HashSet::new();
                if tags.iter().any(|id| !seen.insert(*id)) {
                    errors.add("tags", "Tags must be unique.");
                }
                Some(tags)
            }
        };

        let name = merged(&mut errors, "name", form.name, current.map(|r| r.name.clone()));
        let text = merged(&mut errors, "text", form.text, current.map(|r| r.text.clone()));
        let image = merged(&mut errors, "image", form.image, current.map(|r| r.image.clone()));
        let cooking_time = merged(
            &mut errors,
            "cooking_time",
            form.cooking_time,
            current.map(|r| r.cooking_time),
        );

        errors.into_result()?;

        Ok(ValidRecipe {
            name,
            text,
            image,
            cooking_time,
            tags,
            ingredients,
        })
    }
}

/// Body of `POST /users/`.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct UserForm {
    #[validate(
        required,
        length(min = 1, max = 254),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,
    #[validate(required, length(min = 1, max = 150), custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(required, length(min = 1, max = 150))]
    pub first_name: Option<String>,
    #[validate(required, length(min = 1, max = 150))]
    pub last_name: Option<String>,
    #[validate(required, length(min = 1))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(self) -> Result<ValidUser, Error> {
        let form = UserForm {
            email: trim(self.email),
            username: trim(self.username),
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
            password: self.password,
        };
        check(&form).into_result()?;

        Ok(ValidUser {
            email: form.email.unwrap_or_default().to_lowercase(),
            username: form.username.unwrap_or_default(),
            first_name: form.first_name.unwrap_or_default(),
            last_name: form.last_name.unwrap_or_default(),
            password: form.password.unwrap_or_default(),
        })
    }
}

/// Body of `POST /users/set_password/`.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct PasswordForm {
    #[validate(required, length(min = 1))]
    pub new_password: Option<String>,
    #[validate(required)]
    pub current_password: Option<String>,
}

impl PasswordForm {
    /// Returns `(current_password, new_password)`.
    pub fn validate(self) -> Result<(String, String), Error> {
        check(&self).into_result()?;
        Ok((
            self.current_password.unwrap_or_default(),
            self.new_password.unwrap_or_default(),
        ))
    }
}

/// Body of `POST /auth/token/login/`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    pub fn validate(self) -> Result<(String, String), Error> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Ok((email.trim().to_lowercase(), password))
            }
            _ => Err(ApiError::InvalidRequest.field(
                "non_field_errors",
                "Must include \"email\" and \"password\".",
            )),
        }
    }
}

/// Body of `POST /tags/`.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct TagForm {
    #[validate(required, length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(required, custom(function = "validate_hex_color"))]
    pub color: Option<String>,
    #[validate(required, length(min = 1, max = 50), custom(function = "validate_slug"))]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagForm {
    pub fn validate(self) -> Result<ValidTag, Error> {
        let form = TagForm {
            name: trim(self.name),
            color: trim(self.color),
            slug: trim(self.slug),
        };
        check(&form).into_result()?;

        Ok(ValidTag {
            name: form.name.unwrap_or_default(),
            color: form.color.unwrap_or_default().to_uppercase(),
            slug: form.slug.unwrap_or_default(),
        })
    }
}

/// Body of `POST /ingredients/` and one entry of an ingredient fixture file.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct IngredientForm {
    #[validate(required, length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(required, length(min = 1, max = 50))]
    pub measurement_unit: Option<String>,
}

impl IngredientForm {
    /// Returns `(name, measurement_unit)`.
    pub fn validate(self) -> Result<(String, String), Error> {
        let form = IngredientForm {
            name: trim(self.name),
            measurement_unit: trim(self.measurement_unit),
        };
        check(&form).into_result()?;
        Ok((
            form.name.unwrap_or_default(),
            form.measurement_unit.unwrap_or_default(),
        ))
    }
}
