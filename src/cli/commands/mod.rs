mod health;
mod search;
mod user;

pub use health::cmd_health;
pub use search::{SearchArgs, cmd_search};
pub use user::cmd_user_add;
