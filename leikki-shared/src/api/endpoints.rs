use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::{AUTH_V1_PREFIX, REST_V1_PREFIX};

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn auth_password_grant(base: &str) -> String {
    base_join(base, &format!("{}/token?grant_type=password", AUTH_V1_PREFIX))
}
pub fn auth_refresh_grant(base: &str) -> String {
    base_join(
        base,
        &format!("{}/token?grant_type=refresh_token", AUTH_V1_PREFIX),
    )
}
pub fn auth_signup(base: &str) -> String {
    base_join(base, &format!("{}/signup", AUTH_V1_PREFIX))
}
pub fn auth_logout(base: &str) -> String {
    base_join(base, &format!("{}/logout", AUTH_V1_PREFIX))
}

/// `table?select=...&order=...`; `order` is a PostgREST order list such as `axis.asc,name.asc`.
pub fn select(base: &str, table: &str, columns: &str, order: Option<&str>) -> String {
    let mut path = format!("{}/{}?select={}", REST_V1_PREFIX, table, columns);
    if let Some(order) = order {
        path.push_str("&order=");
        path.push_str(order);
    }
    base_join(base, &path)
}
pub fn select_by_id(base: &str, table: &str, columns: &str, id: &str) -> String {
    base_join(
        base,
        &format!(
            "{}/{}?select={}&id=eq.{}",
            REST_V1_PREFIX,
            table,
            columns,
            enc(id)
        ),
    )
}
pub fn table(base: &str, table: &str) -> String {
    base_join(base, &format!("{}/{}", REST_V1_PREFIX, table))
}
pub fn table_by_id(base: &str, table: &str, id: &str) -> String {
    base_join(base, &format!("{}/{}?id=eq.{}", REST_V1_PREFIX, table, enc(id)))
}
pub fn table_filtered(base: &str, table: &str, filter: &str) -> String {
    base_join(base, &format!("{}/{}?{}", REST_V1_PREFIX, table, filter))
}
pub fn rpc(base: &str, function: &str) -> String {
    base_join(base, &format!("{}/rpc/{}", REST_V1_PREFIX, function))
}
