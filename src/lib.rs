//! Generate a typed TypeScript client from the source of an Axum server.
//!
//! The crate reads a server's route registrations and serde types without compiling
//! it, and emits three artifacts: a client file with one class per API module, a
//! types file with the declarations those classes use, and an OpenAPI 3.0.3
//! document describing the same surface.
//!
//! # Architecture
//!
//! 1. [`scanner`] - walks the server's source tree and any shared crates
//! 2. [`parser`] - parses files with `syn`, keeping the text of files it rejects
//! 3. [`extractor`] - reads routes, handler signatures, types and imports
//! 4. [`type_resolver`] - qualifies type text and applies serde's naming rules
//! 5. [`closure`] - keeps the types reachable from endpoints and names them
//! 6. [`typescript`] - renders the client and types files
//! 7. [`schema_generator`] and [`openapi_builder`] - build the OpenAPI document
//! 8. [`serializer`] - JSON/YAML encoding and file output
//!
//! [`pipeline`] strings the stages together.
//!
//! # Example Usage
//!
//! ```no_run
//! use client_from_source::config::GeneratorConfig;
//! use client_from_source::pipeline::{generate, write_outputs};
//! use std::path::PathBuf;
//!
//! let config = GeneratorConfig {
//!     server_root: PathBuf::from("./server"),
//!     ..GeneratorConfig::default()
//! };
//! let output = generate(&config).unwrap();
//! write_outputs(&output, &config).unwrap();
//! println!("{} endpoints", output.endpoint_count);
//! ```

pub mod cli;
pub mod closure;
pub mod config;
pub mod error;
pub mod extractor;
pub mod lexer;
pub mod openapi_builder;
pub mod parser;
pub mod pipeline;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
pub mod typescript;
