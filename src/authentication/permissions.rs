use warp::http::Method;

use crate::{
    error::{ApiError, Error},
    jwt::SessionData,
    schema::Id,
};

/// Per endpoint access rules. Each policy answers twice: once for the
/// collection (`has_permission`) and once for a concrete object
/// (`has_object_permission`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Tags and ingredients.
    AdminOrReadOnly,
    /// User accounts; registration is open to everyone.
    AuthenticatedOrSignUp,
    /// Recipes; writes on an instance are limited to its author.
    AuthorOrReadOnly,
    /// Favorites, cart, subscriptions and the current user's endpoints.
    Authenticated,
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Policy {
    pub fn has_permission(self, method: &Method, session: Option<&SessionData>) -> bool {
        let is_admin = session.is_some_and(|s| s.is_admin);

        match self {
            Policy::AdminOrReadOnly => is_safe(method) || is_admin,
            Policy::AuthenticatedOrSignUp => {
                is_safe(method) || *method == Method::POST || session.is_some()
            }
            Policy::AuthorOrReadOnly => is_safe(method) || session.is_some(),
            Policy::Authenticated => session.is_some(),
        }
    }

    pub fn has_object_permission(
        self,
        method: &Method,
        session: Option<&SessionData>,
        owner_id: Id,
    ) -> bool {
        let is_admin = session.is_some_and(|s| s.is_admin);
        let is_owner = session.is_some_and(|s| s.is_owner(owner_id));

        match self {
            Policy::AdminOrReadOnly => is_safe(method) || is_admin,
            Policy::AuthenticatedOrSignUp | Policy::AuthorOrReadOnly => {
                is_safe(method) || is_owner || is_admin
            }
            Policy::Authenticated => session.is_some(),
        }
    }

    /// Collection check. Anonymous callers get a 401, everyone else a 403.
    pub fn authenticate(self, method: &Method, session: Option<&SessionData>) -> Result<(), Error> {
        if self.has_permission(method, session) {
            return Ok(());
        }
        Err(denied(session))
    }

    /// Instance check against the owner of the object.
    pub fn authenticate_object(
        self,
        method: &Method,
        session: Option<&SessionData>,
        owner_id: Id,
    ) -> Result<(), Error> {
        self.authenticate(method, session)?;
        if self.has_object_permission(method, session, owner_id) {
            return Ok(());
        }
        Err(denied(session))
    }
}

fn denied(session: Option<&SessionData>) -> Error {
    match session {
        Some(_) => ApiError::Forbidden.default(),
        None => ApiError::Unauthorized.default(),
    }
}
