//! Integration tests for vaultdrive-graph
//!
//! Uses wiremock to simulate the identity platform token endpoint and the
//! Microsoft Graph drive API, and verifies end-to-end behavior of the token
//! manager, chunked uploads, listing, deletes and downloads.

mod common;

mod test_drive_operations;
mod test_token_refresh;
mod test_upload_session;
