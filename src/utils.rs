//! URL helpers shared by the orchestrator and the HTTP collaborators

/// Join a base URL and a relative path with exactly one `/` between them
///
/// Either side may be empty, in which case the other is returned unchanged.
///
/// # Examples
///
/// ```
/// use mapfiles_dl::utils::join_url;
///
/// assert_eq!(join_url("https://m1.example.com/", "/maps/1/a.mwm"), "https://m1.example.com/maps/1/a.mwm");
/// assert_eq!(join_url("https://m1.example.com", "maps/1/a.mwm"), "https://m1.example.com/maps/1/a.mwm");
/// ```
pub fn join_url(base: &str, relative: &str) -> String {
    if base.is_empty() {
        return relative.to_string();
    }
    if relative.is_empty() {
        return base.to_string();
    }

    match (base.ends_with('/'), relative.starts_with('/')) {
        (true, true) => format!("{}{}", base, &relative[1..]),
        (false, false) => format!("{}/{}", base, relative),
        _ => format!("{}{}", base, relative),
    }
}

/// Relative path of a map file for a given data version
///
/// Layout is `maps/<data_version>/<url-encoded file name>`.
pub fn file_download_url(file_name: &str, data_version: i64) -> String {
    format!("maps/{}/{}", data_version, urlencoding::encode(file_name))
}

/// Absolute URL of a map file on one mirror
///
/// Kept for callers that still build URLs from a single base themselves.
pub fn make_full_url(base_url: &str, file_name: &str, data_version: i64) -> String {
    join_url(base_url, &file_download_url(file_name, data_version))
}

/// One absolute URL per mirror, in mirror list order
pub fn make_url_list(servers: &[String], relative: &str) -> Vec<String> {
    servers
        .iter()
        .map(|server| join_url(server, relative))
        .collect()
}
