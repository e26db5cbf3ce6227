//! Keys stored in the cookie session.

pub const USER_NAME: &str = "user_name";
