//! HTTP protocol implementation.
//!
//! # Architecture
//!
//! - **`parser`**: Splits raw bytes into request line, headers and body, and assembles the request
//! - **`decode`**: URL-encoded query/form decoding and cookie parsing
//! - **`multipart`**: `multipart/form-data` bodies, split into fields and files
//! - **`request`**: The immutable request model handed to handlers
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes and writes HTTP responses to the client
//! - **`connection`**: Drives one connection through a single request/response cycle
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Head, then body per content-length or until close
//!        └──────┬──────┘
//!               │ Request parsed          (parse error → error response)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Static prefix or dispatcher → handler
//!        └──────┬───────────┘
//!               │ Response ready          (JSON not-found → close silently)
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               ▼
//!            Closed
//! ```

pub mod connection;
pub mod decode;
pub mod mime;
pub mod multipart;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
