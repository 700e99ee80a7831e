//! Server-rendered landing page.
//!
//! The markup is built with `format!` templates and styled with Tailwind
//! utility classes loaded from the CDN.

pub mod home;
pub mod layout;

pub use home::home;
pub use layout::root_layout;

/// The full landing page document.
pub fn render_home_page() -> String {
    root_layout(&home())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_home_page_wraps_home_in_layout() {
        let page = render_home_page();

        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(&home()));
        assert!(page.contains(r#"<html lang="zh-CN">"#));
    }

    #[test]
    fn test_render_is_idempotent() {
        assert_eq!(render_home_page(), render_home_page());
    }
}
