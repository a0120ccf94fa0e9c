//! Navigation routes between the booth screens

use std::fmt;

/// Screens of the booth, addressed the same way the web gallery does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Welcome screen
    Start,
    /// Consent, capture and upload
    Take,
    /// Result display for an upload identifier
    Image(String),
}

impl Route {
    /// Parse a route path. `/` redirects to the start screen.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim();
        match path {
            "" | "/" | "/photo/start" => Some(Route::Start),
            "/photo/take" => Some(Route::Take),
            _ => {
                let uuid = path.strip_prefix("/image/")?;
                if uuid.is_empty() || uuid.contains('/') {
                    None
                } else {
                    Some(Route::Image(uuid.to_string()))
                }
            }
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Start => f.write_str("/photo/start"),
            Route::Take => f.write_str("/photo/take"),
            Route::Image(uuid) => write!(f, "/image/{}", uuid),
        }
    }
}

/// Navigation history for one booth session
#[derive(Debug, Default)]
pub struct Navigator {
    history: Vec<Route>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigate(&mut self, route: Route) {
        log::info!("Navigating to {}", route);
        self.history.push(route);
    }

    pub fn current(&self) -> Option<&Route> {
        self.history.last()
    }

    pub fn history(&self) -> &[Route] {
        &self.history
    }
}
