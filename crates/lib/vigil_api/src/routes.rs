//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/auth/logout-all";
pub const POST_AUTH_REFRESH_SESSION: &str = "/auth/refresh-session";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const GET_OAUTH2_AUTHORIZE: &str = "/oauth2/authorize";
pub const GET_OAUTH2_CALLBACK: &str = "/oauth2/callback";
