use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::password::Argon2Verifier;
use crate::auth::service::AuthService;
use crate::auth::token::JwtIssuer;
use crate::users::store::UserStore;

pub struct AppState {
    pub auth: AuthService,
    pub users: Arc<RwLock<UserStore>>,
    pub tokens: Arc<JwtIssuer>,
    pub passwords: Arc<Argon2Verifier>,
}
