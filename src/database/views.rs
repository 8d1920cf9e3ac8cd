//! API representations of the stored rows.
//!
//! Read views and write views are separate types; handlers pick the shape they
//! return. Everything that depends on the acting user (`is_subscribed`,
//! `is_favorited`, `is_in_shopping_cart`) is resolved before a view is built
//! and passed in explicitly.

use serde::Serialize;

use super::schema::{Id, Recipe, RecipePart, Tag, User, UserRow};

/// User as returned by `GET /users/...`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

impl From<UserRow> for UserView {
    fn from(value: UserRow) -> Self {
        Self::new(value.user, value.is_subscribed)
    }
}

/// User as returned by registration; no `is_subscribed`, never the password.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreatedUserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUserView {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// A followed author with a preview of their recipes.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FollowedAuthorView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<ShortRecipeView>,
    pub recipes_count: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ShortRecipeView {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<Recipe> for ShortRecipeView {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

/// Ingredient flattened together with the amount used by one recipe.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeIngredientView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredientView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Everything a recipe view needs besides the recipe row itself.
#[derive(Debug, Clone)]
pub struct RecipeRelations {
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipePart>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeView {
    pub fn new(recipe: Recipe, relations: RecipeRelations) -> Self {
        Self {
            id: recipe.id,
            tags: relations.tags,
            author: relations.author,
            ingredients: relations
                .ingredients
                .into_iter()
                .map(RecipeIngredientView::from)
                .collect(),
            is_favorited: relations.is_favorited,
            is_in_shopping_cart: relations.is_in_shopping_cart,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::schema::UserRole;

    fn user() -> User {
        User {
            id: 3,
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Cook".to_string(),
            password: "$argon2id$secret".to_string(),
            role: UserRole::User,
            token_version: 0,
        }
    }

    #[test]
    fn created_user_view_has_no_password_or_subscription() {
        let value = serde_json::to_value(CreatedUserView::from(user())).unwrap();
        assert_eq!(
            value,
            json!({
                "email": "cook@example.com",
                "id": 3,
                "username": "cook",
                "first_name": "Ada",
                "last_name": "Cook",
            })
        );
    }

    #[test]
    fn followed_author_flattens_user_fields() {
        let view = FollowedAuthorView {
            user: UserView::new(user(), true),
            recipes: vec![],
            recipes_count: 4,
        };
        let value = serde_json::to_value(view).unwrap();
        assert_eq!(value["is_subscribed"], true);
        assert_eq!(value["username"], "cook");
        assert_eq!(value["recipes_count"], 4);
        assert!(value.get("password").is_none());
    }

    #[test]
    fn recipe_view_expands_nested_objects() {
        let recipe = Recipe {
            id: 10,
            author_id: 3,
            name: "Borscht".to_string(),
            image: "img".to_string(),
            text: "Boil".to_string(),
            cooking_time: 90,
            pub_date: Utc::now(),
        };
        let relations = RecipeRelations {
            tags: vec![Tag {
                id: 1,
                name: "Lunch".to_string(),
                color: "#49B64E".to_string(),
                slug: "lunch".to_string(),
            }],
            author: UserView::new(user(), false),
            ingredients: vec![RecipePart {
                recipe_id: 10,
                ingredient_id: 5,
                name: "beet".to_string(),
                measurement_unit: "g".to_string(),
                amount: 200,
            }],
            is_favorited: true,
            is_in_shopping_cart: false,
        };

        let value = serde_json::to_value(RecipeView::new(recipe, relations)).unwrap();
        assert_eq!(value["author"]["id"], 3);
        assert_eq!(value["tags"][0]["slug"], "lunch");
        assert_eq!(
            value["ingredients"][0],
            json!({"id": 5, "name": "beet", "measurement_unit": "g", "amount": 200})
        );
        assert_eq!(value["is_favorited"], true);
        assert_eq!(value["cooking_time"], 90);
    }
}
