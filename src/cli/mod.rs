pub mod commands;

pub use commands::{build_client_cli, build_server_cli, client_target, client_timeout, request_from_matches};
