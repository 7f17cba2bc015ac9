pub mod blog_helpers;
pub mod form_helpers;
pub mod media_helpers;
pub mod ownership_helpers;
pub mod sanitization_helpers;
pub mod visibility_helpers;
