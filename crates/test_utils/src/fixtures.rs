//! Pre-built domain values for tests

use domain_page::Page;
use domain_user::User;

/// An anonymous user with the given identity-provider uid
pub fn anonymous_user(uid: &str) -> User {
    User::new(uid)
}

/// A user who already logged in with Google
pub fn google_user(uid: &str) -> User {
    let mut user = User::new(uid);
    let email = format!("{uid}@example.com");
    if let Err(err) = user.login("google", Some(email)) {
        panic!("fixture login for {uid} rejected: {err}");
    }
    user
}

/// A page owned by `owner` with one link per URL
pub fn page_with_links(owner: &User, title: &str, urls: &[&str]) -> Page {
    let mut page = match Page::new(title, owner) {
        Ok(page) => page,
        Err(err) => panic!("invalid fixture title {title:?}: {err}"),
    };
    for url in urls {
        if let Err(err) = page.add_link(owner, url, "") {
            panic!("fixture link {url} rejected: {err}");
        }
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_user::Provider;

    #[test]
    fn test_fixtures() {
        assert_eq!(google_user("ann").email(), Some("ann@example.com"));
        assert_eq!(google_user("ann").provider(), Provider::Google);

        let owner = anonymous_user("owner");
        let page = page_with_links(&owner, "Links", &["https://a", "https://b"]);
        assert_eq!(page.links().len(), 2);
    }
}
