pub mod json_error;
pub mod jwt;
pub mod login;
pub mod server_config;
pub mod user;

pub use self::json_error::ErrorResponse;
pub use self::jwt::TokenClaims;
pub use self::login::{LoginData, LoginError, LoginResponse, VerifyResponse};
pub use self::server_config::{AppConfig, ConfigError};
pub use self::user::{
    AdminError, CreateUserData, DeleteUserData, NewUser, Pagination, UpdateUserData, UserPage,
    UserProfile, UserStatus, UserUpdate,
};
