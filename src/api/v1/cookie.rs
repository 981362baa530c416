use crate::application_impl::ACCESS_TOKEN_COOKIE;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::reply::Response;

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// How token cookies are written. Lifetimes follow the token TTLs.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_max_age_secs: u64,
    pub refresh_max_age_secs: u64,
}

impl CookiePolicy {
    pub fn set_access(&self, response: &mut Response, token: &str) -> Result<(), String> {
        self.append(response, ACCESS_TOKEN_COOKIE, token, self.access_max_age_secs)
    }

    pub fn set_refresh(&self, response: &mut Response, token: &str) -> Result<(), String> {
        self.append(response, REFRESH_TOKEN_COOKIE, token, self.refresh_max_age_secs)
    }

    pub fn clear_all(&self, response: &mut Response) -> Result<(), String> {
        self.append(response, ACCESS_TOKEN_COOKIE, "", 0)?;
        self.append(response, REFRESH_TOKEN_COOKIE, "", 0)
    }

    fn append(
        &self,
        response: &mut Response,
        name: &str,
        value: &str,
        max_age_secs: u64,
    ) -> Result<(), String> {
        let cookie = self.render(name, value, max_age_secs);
        let header = HeaderValue::from_str(&cookie).map_err(|e| e.to_string())?;
        // One header per cookie; `insert` would drop the earlier one.
        response.headers_mut().append(SET_COOKIE, header);
        Ok(())
    }

    fn render(&self, name: &str, value: &str, max_age_secs: u64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!("{name}={value}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Strict{secure}")
    }
}
