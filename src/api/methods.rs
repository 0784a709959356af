//! Typed REST method parameters.

/// Results per page for `flickr.photos.search`. 500 is the API maximum.
pub const SEARCH_PAGE_SIZE: u32 = 500;

/// Every REST call the tool makes, with exactly the parameters it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod<'a> {
    /// Echo the authorized user; validates a stored access token.
    TestLogin,
    FindByUsername { username: &'a str },
    /// One page of a user's photos (`safe_search=3` includes restricted).
    Search { user_id: &'a str, page: u32 },
    GetInfo { photo_id: &'a str },
    /// Only the `total` attribute is read, so one person per page suffices.
    GetFavorites { photo_id: &'a str },
}

impl ApiMethod<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            ApiMethod::TestLogin => "flickr.test.login",
            ApiMethod::FindByUsername { .. } => "flickr.people.findByUsername",
            ApiMethod::Search { .. } => "flickr.photos.search",
            ApiMethod::GetInfo { .. } => "flickr.photos.getInfo",
            ApiMethod::GetFavorites { .. } => "flickr.photos.getFavorites",
        }
    }

    /// Method-specific parameters, excluding `method`, `api_key`, format and
    /// OAuth fields which the client adds.
    pub fn params(&self) -> Vec<(String, String)> {
        let pairs: Vec<(&str, String)> = match *self {
            ApiMethod::TestLogin => vec![],
            ApiMethod::FindByUsername { username } => vec![("username", username.to_string())],
            ApiMethod::Search { user_id, page } => vec![
                ("user_id", user_id.to_string()),
                ("safe_search", "3".to_string()),
                ("per_page", SEARCH_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ],
            ApiMethod::GetInfo { photo_id } => vec![("photo_id", photo_id.to_string())],
            ApiMethod::GetFavorites { photo_id } => vec![
                ("photo_id", photo_id.to_string()),
                ("per_page", "1".to_string()),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}
