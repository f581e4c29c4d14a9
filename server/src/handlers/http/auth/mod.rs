pub mod login;
pub mod logout;
pub mod verify;

pub use login::handle_login;
pub use logout::handle_logout;
pub use verify::handle_verify;
