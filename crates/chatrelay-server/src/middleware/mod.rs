//! Request middleware: correlation ids, authentication, request logging.

pub mod auth;
pub mod logging;
pub mod request_id;
