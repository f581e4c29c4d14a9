pub mod users;

pub use users::{handle_create_user, handle_delete_user, handle_list_users, handle_update_user};
